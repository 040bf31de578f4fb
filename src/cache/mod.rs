//! Best-effort weather cache in front of the Open-Meteo provider.
//!
//! Every failure in here degrades to "cache miss"; nothing propagates to the request.

pub mod backend;
pub mod store;

pub use backend::{CacheBackend, CacheError, MemoryBackend, RedisBackend};
pub use store::WeatherCache;
