pub mod admin_key;
pub mod rate_limit;
