pub mod app_config;
pub mod redis_repo;

pub use app_config::Config;
pub use redis_repo::RedisClient;
