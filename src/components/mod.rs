use crate::config::Config;
use crate::error::AppResult;
use crate::events::EventBus;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub mod google_calendar;
pub mod local_store;
pub mod notifications;
pub mod voice;

pub use google_calendar::GoogleCalendarHandle;
pub use local_store::LocalStore;

/// Shared services handed to every component on init
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<RwLock<Config>>,
    pub store: Arc<LocalStore>,
    pub bus: EventBus,
    pub http: reqwest::Client,
    /// Cancelled once on shutdown; background loops stop on it
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(config: Arc<RwLock<Config>>, store: Arc<LocalStore>) -> Self {
        Self {
            config,
            store,
            bus: EventBus::new(),
            http: reqwest::Client::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// A long-lived service part with an explicit lifecycle.
///
/// `init` may run again after a failed attempt and should be idempotent.
#[async_trait]
pub trait Component: Send + Sync + Any {
    /// Key used in `components.toml`
    fn name(&self) -> &'static str;

    async fn init(&self, ctx: &AppContext) -> AppResult<()>;

    async fn shutdown(&self) -> AppResult<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Owns the registered components. Init and shutdown both run in
/// registration order.
pub struct ComponentManager {
    components: Vec<Box<dyn Component>>,
    config: Arc<RwLock<Config>>,
}

impl std::fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.components.iter().map(|c| c.name()).collect();
        f.debug_struct("ComponentManager").field("components", &names).finish()
    }
}

impl ComponentManager {
    pub fn new(config: Arc<RwLock<Config>>) -> Self {
        Self {
            config,
            components: Vec::new(),
        }
    }

    /// Register a component unless it is disabled in `components.toml`
    pub async fn register<T: Component + 'static>(&mut self, component: T) {
        let name = component.name();
        if !self.config.read().await.is_component_enabled(name) {
            info!("Component {} is disabled, skipping", name);
            return;
        }
        info!("Registered component {}", name);
        self.components.push(Box::new(component));
    }

    /// A failing component is logged and skipped; the others still start
    pub async fn init_all(&self, ctx: &AppContext) -> AppResult<()> {
        for component in &self.components {
            match component.init(ctx).await {
                Ok(()) => info!("Component {} ready", component.name()),
                Err(e) => error!("Component {} failed to start: {}", component.name(), e),
            }
        }
        Ok(())
    }

    pub async fn shutdown_all(&self) -> AppResult<()> {
        for component in &self.components {
            match component.shutdown().await {
                Ok(()) => info!("Component {} stopped", component.name()),
                Err(e) => error!("Component {} failed to stop: {}", component.name(), e),
            }
        }
        Ok(())
    }

    pub fn get_component_by_name(&self, name: &str) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.name() == name)
            .map(|c| &**c)
    }

    /// Look a component up by its concrete type
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.components
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
