pub mod color;
pub mod ids;
pub mod time;
