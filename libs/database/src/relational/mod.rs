//! Relational (PostgreSQL / SQLite) connector and configuration via SeaORM

mod config;
mod connector;

pub use config::{Dialect, RelationalConfig};
pub use connector::{connect, connect_from_config, connect_from_config_with_retry};

// Re-export SeaORM types for convenience
pub use sea_orm::{DatabaseConnection, DbBackend, DbErr};
