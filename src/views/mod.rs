//! Read models behind the board and agenda endpoints

pub mod agenda;
pub mod kanban;

pub use agenda::{group_by_day, tab_range, Agenda, AgendaItem, AgendaTab};
pub use kanban::{build_board, column_for, move_task_to_column, KanbanColumn, KanbanColumnId};
