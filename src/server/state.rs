use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::dispatcher::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Dispatcher,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings, dispatcher: Dispatcher) -> Self {
        Self {
            settings: Arc::new(settings),
            dispatcher,
            started_at: Instant::now(),
        }
    }
}
