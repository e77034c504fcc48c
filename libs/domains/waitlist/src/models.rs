use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A persisted waitlist entry
///
/// `created_at` is stamped by the service when the address is accepted, never
/// by the store, so every backend answers date-range queries the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl WaitlistEntry {
    pub fn new(email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            email: email.into(),
            created_at,
        }
    }

    /// Entry stamped with the current time
    pub fn now(email: impl Into<String>) -> Self {
        Self::new(email, Utc::now())
    }
}

/// Outcome of address validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Fixed-delay retry policy for a single delivery
///
/// A send is attempted at most `max_retries + 1` times with `delay` between a
/// failed attempt and the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_millis(max_retries: u32, delay_ms: u64) -> Self {
        Self::new(max_retries, Duration::from_millis(delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(3, 1000)
    }
}
