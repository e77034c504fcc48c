//! The in-memory waitlist
//!
//! Every check-then-mutate (`insert`, `remove`) happens under a single lock
//! acquisition, and the lock is never held across an `.await`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::WaitlistEntry;

/// Shared handle to the set of accepted addresses and their acceptance time
///
/// Only `WaitlistService` mutates the roster; the delivery pipeline holds a
/// clone for membership checks.
#[derive(Clone, Default)]
pub struct Roster {
    entries: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.read().contains_key(address)
    }

    /// Insert unless present. Returns false for a duplicate.
    pub fn insert(&self, entry: &WaitlistEntry) -> bool {
        let mut entries = self.write();
        if entries.contains_key(&entry.email) {
            return false;
        }
        entries.insert(entry.email.clone(), entry.created_at);
        true
    }

    /// Remove if present. Returns false if the address was absent.
    pub fn remove(&self, address: &str) -> bool {
        self.write().remove(address).is_some()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Replace the whole roster, e.g. after hydration from a store
    pub fn replace(&self, entries: impl IntoIterator<Item = WaitlistEntry>) {
        let fresh: HashMap<_, _> = entries
            .into_iter()
            .map(|entry| (entry.email, entry.created_at))
            .collect();
        *self.write() = fresh;
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Addresses in arbitrary order
    pub fn addresses(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<WaitlistEntry> {
        self.read()
            .iter()
            .map(|(email, created_at)| WaitlistEntry::new(email.clone(), *created_at))
            .collect()
    }

    /// Addresses containing `pattern`, ignoring case
    pub fn matching(&self, pattern: &str) -> Vec<String> {
        let needle = pattern.to_lowercase();
        self.read()
            .keys()
            .filter(|address| address.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
