pub mod app_config;
pub mod database;
pub mod flight_repo;
pub mod booking_repo;
pub mod user_repo;
pub mod memory;
pub mod redis_repo;
pub mod events;
pub mod seed;

pub use database::DbClient;
pub use redis_repo::RedisClient;
pub use events::{EventProducer, LogEventPublisher};
pub use memory::{MemoryStore, MemorySessionStore, MemoryRateLimiter};
