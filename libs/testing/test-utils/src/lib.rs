//! Shared test utilities for domain testing
//!
//! This crate provides reusable test infrastructure for all domain crates:
//! - `TestPostgres`: PostgreSQL container with automatic cleanup (feature: "postgres")
//! - `TestMongo`: MongoDB container with automatic cleanup (feature: "mongo")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Features
//!
//! - `postgres` (default): Enables PostgreSQL test infrastructure
//! - `mongo`: Enables MongoDB test infrastructure
//! - `all`: Enables all database test infrastructure
//!
//! Container-backed tests need Docker and are marked `#[ignore]`; run them
//! with `cargo test -- --ignored`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDataBuilder, TestPostgres};
//!
//! #[tokio::test]
//! #[ignore]
//! async fn my_postgres_test() {
//!     let pg = TestPostgres::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let address = builder.address("alice");
//!     let url = pg.url();
//! }
//! ```

use uuid::Uuid;

// Conditionally compile database modules based on features
#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "postgres")]
mod postgres;

// Re-export based on enabled features
#[cfg(feature = "mongo")]
pub use mongo::TestMongo;

#[cfg(feature = "postgres")]
pub use postgres::{POSTGRES_DB, POSTGRES_PASSWORD, POSTGRES_USER, TestPostgres};

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded random data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_add_email");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// A valid, test-unique email address
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.address("alice"), "alice-7@example.com");
    /// ```
    pub fn address(&self, local_part: &str) -> String {
        format!("{}-{}@example.com", local_part, self.seed)
    }

    /// `count` distinct addresses: `user0-<seed>@example.com`, ...
    pub fn addresses(&self, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| self.address(&format!("user{}", i)))
            .collect()
    }

    /// Name for a per-test database, collection or file
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Fresh random identifier, for resources that must not collide across runs
    pub fn unique_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert two collections hold the same members, ignoring order
    pub fn assert_same_members<T>(actual: &[T], expected: &[T], context: &str)
    where
        T: Ord + Clone + std::fmt::Debug,
    {
        let mut actual = actual.to_vec();
        let mut expected = expected.to_vec();
        actual.sort();
        expected.sort();
        assert_eq!(
            actual, expected,
            "{}: expected members {:?}, got {:?}",
            context, expected, actual
        );
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
