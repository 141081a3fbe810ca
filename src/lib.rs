// Library exports for binaries and tests
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Instant;

use config::Config;
use middleware::rate_limit::RateLimiter;
use services::store::AnnouncementStore;

pub use routes::build_router;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AnnouncementStore>,
    pub config: Arc<Config>,
    pub general_limiter: Arc<RateLimiter>,
    pub admin_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            store: Arc::new(AnnouncementStore::new()),
            config: Arc::new(config),
            general_limiter: Arc::new(RateLimiter::new()),
            admin_limiter: Arc::new(RateLimiter::new()),
            started_at: Instant::now(),
        }
    }
}
