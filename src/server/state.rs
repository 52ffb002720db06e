use crate::dispatch::ChatDispatcher;
use crate::logs::LogStore;
use crate::models::AppSettings;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ChatDispatcher>,

    /// `None` when request logging is disabled.
    pub log_store: Option<Arc<dyn LogStore>>,

    pub settings: Arc<AppSettings>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<ChatDispatcher>,
        log_store: Option<Arc<dyn LogStore>>,
        settings: AppSettings,
    ) -> Self {
        Self {
            dispatcher,
            log_store,
            settings: Arc::new(settings),
        }
    }
}
