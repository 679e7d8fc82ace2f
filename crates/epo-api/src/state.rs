//! Application state shared across API handlers

use std::sync::Arc;

use epo::TradeExecutor;
use epo_core::AppConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    executor: Arc<TradeExecutor>,
}

impl AppState {
    pub fn new(config: AppConfig, executor: Arc<TradeExecutor>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, executor }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// The engine behind every route
    pub fn executor(&self) -> &TradeExecutor {
        &self.inner.executor
    }
}
