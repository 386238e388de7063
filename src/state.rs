// src/state.rs
use std::sync::Arc;

use crate::config::{AllowedOrigins, AppConfig};
use crate::services::assistant::AssistantService;
use crate::services::rate_limiter::RateLimiter;
use crate::services::relay::ChatRelay;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub assistant: Arc<dyn AssistantService>,
    pub relay: ChatRelay,
    pub rate_limiter: RateLimiter,
    pub allowed_origins: AllowedOrigins,
}

impl AppState {
    pub fn new(config: &AppConfig, assistant: Arc<dyn AssistantService>) -> Self {
        Self {
            relay: ChatRelay::new(Arc::clone(&assistant), config.chat_timeout),
            rate_limiter: RateLimiter::new(config.rate_limit),
            allowed_origins: config.allowed_origins.clone(),
            assistant,
        }
    }
}
