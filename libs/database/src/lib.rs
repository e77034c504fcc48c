//! Database library providing connectors and utilities for MongoDB and
//! relational stores (PostgreSQL, SQLite) via SeaORM
//!
//! # Features
//!
//! - `relational` (default) - PostgreSQL and SQLite support with SeaORM
//! - `mongodb` - MongoDB support
//! - `config` - Configuration support with `core_config::FromEnv`
//! - `all` - All features
//!
//! # Examples
//!
//! ## Relational
//!
//! ```ignore
//! use database::relational::{self, RelationalConfig};
//!
//! let config = RelationalConfig::postgres("localhost", 5432, "app", "secret", "waitlist");
//! let db = relational::connect_from_config_with_retry(&config, None).await?;
//! ```
//!
//! ## MongoDB
//!
//! ```ignore
//! use database::mongodb::{self, MongoConfig};
//!
//! let config = MongoConfig::with_database("mongodb://localhost:27017", "waitlist");
//! let client = mongodb::connect_from_config_with_retry(&config, None).await?;
//! let db = client.database(config.database());
//! ```

pub mod common;

#[cfg(feature = "relational")]
pub mod relational;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{DatabaseError, DatabaseResult, RetryConfig, retry, retry_with_backoff};
