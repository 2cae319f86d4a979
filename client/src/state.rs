use crate::config::AppConfig;
use crate::messaging::Messenger;
use std::sync::Arc;

pub struct AppState {
    config: AppConfig,
    messenger: Messenger,
}

impl AppState {
    pub fn new(config: AppConfig, messenger: Messenger) -> Arc<Self> {
        Arc::new(Self { config, messenger })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build_id(&self) -> &str {
        &self.config.build_id
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }
}
