pub mod app_config;
pub mod portal_codes;
pub mod rate_limit;
pub mod redis_repo;
pub mod sessions;
pub mod token_cache;
pub mod upsell_requests;

pub use redis_repo::RedisClient;
