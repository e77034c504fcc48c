//! Memory-only store

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{StoreKind, WaitlistStore};
use crate::error::WaitlistResult;
use crate::models::WaitlistEntry;
use crate::roster::Roster;

/// Keeps entries in process memory only
///
/// Nothing survives a restart. `count_in_range` returns the total regardless
/// of bounds.
#[derive(Default)]
pub struct LocalStore {
    mirror: Roster,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WaitlistStore for LocalStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Local
    }

    async fn connect(&self) -> WaitlistResult<()> {
        Ok(())
    }

    async fn load_all(&self) -> WaitlistResult<Vec<WaitlistEntry>> {
        Ok(self.mirror.entries())
    }

    async fn create(&self, entry: &WaitlistEntry) -> WaitlistResult<()> {
        self.mirror.insert(entry);
        Ok(())
    }

    async fn delete_one(&self, email: &str) -> WaitlistResult<()> {
        self.mirror.remove(email);
        Ok(())
    }

    async fn delete_all(&self) -> WaitlistResult<()> {
        self.mirror.clear();
        Ok(())
    }

    async fn find_by_pattern(&self, pattern: &str) -> WaitlistResult<Vec<String>> {
        Ok(self.mirror.matching(pattern))
    }

    async fn count_in_range(
        &self,
        _start: Option<DateTime<Utc>>,
        _end: Option<DateTime<Utc>>,
    ) -> WaitlistResult<u64> {
        Ok(self.mirror.len() as u64)
    }

    async fn replace_all(&self, entries: &[WaitlistEntry]) -> WaitlistResult<()> {
        self.mirror.replace(entries.iter().cloned());
        Ok(())
    }

    async fn close(&self) -> WaitlistResult<()> {
        Ok(())
    }
}
