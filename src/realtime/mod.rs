//! Realtime
//!
//! Puente opcional entre el feed de cambios en proceso y Redis pub/sub.

pub mod redis_client;

pub use redis_client::{RedisClient, RedisConfig};
