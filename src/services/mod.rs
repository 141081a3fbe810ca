pub mod fallback;
pub mod metrics;
pub mod moderation;
pub mod store;
