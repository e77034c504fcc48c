//! Persistence strategies for the waitlist
//!
//! All three stores implement the same [`WaitlistStore`] contract. The one
//! deliberate divergence is that [`LocalStore`] has no persisted timestamps to
//! filter on, so `count_in_range` ignores its bounds and returns the total.

mod entity;
mod local;
mod mongodb;
mod relational;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::RetryConfig;
use std::fmt;
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::error::WaitlistResult;
use crate::models::WaitlistEntry;

pub use local::LocalStore;
pub use self::mongodb::MongoWaitlistStore;
pub use relational::RelationalWaitlistStore;

/// Which persistence strategy a store implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Local,
    Document,
    Relational,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Local => write!(f, "local"),
            StoreKind::Document => write!(f, "document"),
            StoreKind::Relational => write!(f, "relational"),
        }
    }
}

/// Repository contract shared by every waitlist backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WaitlistStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    /// Establish the connection. Calling it again is a no-op.
    async fn connect(&self) -> WaitlistResult<()>;

    /// Every stored entry
    async fn load_all(&self) -> WaitlistResult<Vec<WaitlistEntry>>;

    /// Insert one entry. A uniqueness violation surfaces as a persistence error.
    async fn create(&self, entry: &WaitlistEntry) -> WaitlistResult<()>;

    /// Remove an entry if present; absent entries are not an error
    async fn delete_one(&self, email: &str) -> WaitlistResult<()>;

    async fn delete_all(&self) -> WaitlistResult<()>;

    /// Addresses containing `pattern`, ignoring case
    async fn find_by_pattern(&self, pattern: &str) -> WaitlistResult<Vec<String>>;

    /// Entries created within the inclusive bounds; `None` is unbounded
    async fn count_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> WaitlistResult<u64>;

    /// Delete everything and insert `entries` as one logical operation
    async fn replace_all(&self, entries: &[WaitlistEntry]) -> WaitlistResult<()>;

    /// Release connection resources
    async fn close(&self) -> WaitlistResult<()>;
}

/// Build the store selected by `config`. Nothing connects until `connect`.
///
/// `retry` governs the initial connection of networked stores; `None` uses
/// the default backoff.
pub fn build_store(config: &BackendConfig, retry: Option<RetryConfig>) -> Arc<dyn WaitlistStore> {
    match (config, retry) {
        (BackendConfig::Local, _) => Arc::new(LocalStore::new()),
        (BackendConfig::Document(document), None) => {
            Arc::new(MongoWaitlistStore::new(document.clone()))
        }
        (BackendConfig::Document(document), Some(retry)) => {
            Arc::new(MongoWaitlistStore::new(document.clone()).with_retry(retry))
        }
        (BackendConfig::Relational(relational), None) => {
            Arc::new(RelationalWaitlistStore::new(relational.clone()))
        }
        (BackendConfig::Relational(relational), Some(retry)) => {
            Arc::new(RelationalWaitlistStore::new(relational.clone()).with_retry(retry))
        }
    }
}

/// Escape LIKE wildcards so a pattern matches literally (`ESCAPE '!'`)
pub(crate) fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_store_kinds() {
        assert_eq!(build_store(&BackendConfig::Local, None).kind(), StoreKind::Local);
        assert_eq!(
            build_store(
                &BackendConfig::relational(database::relational::RelationalConfig::sqlite(
                    ":memory:"
                )),
                Some(RetryConfig::new().with_max_retries(0)),
            )
            .kind(),
            StoreKind::Relational
        );
        assert_eq!(
            build_store(
                &BackendConfig::document("mongodb://localhost:27017", "waitlist"),
                None
            )
            .kind(),
            StoreKind::Document
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_off!"), "100!%!_off!!");
        assert_eq!(escape_like("plain"), "plain");
    }
}
