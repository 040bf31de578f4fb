pub mod logger;
pub mod server;
pub mod stats;
