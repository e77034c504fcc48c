//! Mock email provider for testing

use super::{EmailProvider, SendResult};
use crate::models::Email;
use async_trait::async_trait;
use eyre::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// How the mock responds to `send`
#[derive(Debug, Clone)]
enum FailureMode {
    Never,
    Always(String),
    /// Fail this many sends, then succeed
    FirstN(usize),
}

/// Mock email provider that records delivered emails
///
/// Clones share state, so a test can keep one handle for assertions while the
/// code under test owns another.
#[derive(Clone)]
pub struct MockSmtpProvider {
    sent_emails: Arc<Mutex<Vec<Email>>>,
    attempts: Arc<AtomicUsize>,
    mode: FailureMode,
    healthy: bool,
    closed: Arc<AtomicBool>,
}

impl MockSmtpProvider {
    /// Create a mock provider that accepts every email
    pub fn new() -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            mode: FailureMode::Never,
            healthy: true,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a mock provider that always fails to send
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            mode: FailureMode::Always(message.into()),
            ..Self::new()
        }
    }

    /// Create a mock provider whose first `n` sends fail
    pub fn failing_first(n: usize) -> Self {
        Self {
            mode: FailureMode::FirstN(n),
            ..Self::new()
        }
    }

    /// Make `health_check` fail
    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Get all successfully sent emails
    pub async fn sent_emails(&self) -> Vec<Email> {
        self.sent_emails.lock().await.clone()
    }

    /// Get the count of successfully sent emails
    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    /// Number of times `send` was invoked, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Check if an email was sent to a specific address
    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent_emails
            .lock()
            .await
            .iter()
            .any(|e| e.to == address)
    }
}

impl Default for MockSmtpProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockSmtpProvider {
    async fn send(&self, email: &Email) -> Result<SendResult> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        match &self.mode {
            FailureMode::Always(message) => return Err(eyre::eyre!(message.clone())),
            FailureMode::FirstN(n) if attempt < *n => {
                return Err(eyre::eyre!("Mock failure {} of {}", attempt + 1, n));
            }
            _ => {}
        }

        self.sent_emails.lock().await.push(email.clone());

        Ok(SendResult {
            message_id: format!("mock-{}", email.id),
        })
    }

    async fn health_check(&self) -> Result<()> {
        if !self.healthy {
            return Err(eyre::eyre!("Mock health check failed"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
