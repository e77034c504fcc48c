//! MongoDB connector and configuration

mod config;
mod connector;

pub use config::MongoConfig;
pub use connector::{connect, connect_from_config, connect_from_config_with_retry};

// Re-export MongoDB types for convenience
pub use mongodb::{Client, Collection, Database};
