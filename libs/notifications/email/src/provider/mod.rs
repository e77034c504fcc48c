//! Email provider implementations

pub mod mock;
pub mod smtp;

pub use mock::MockSmtpProvider;
pub use smtp::{SmtpConfig, SmtpProvider};

use crate::models::Email;
use async_trait::async_trait;
use eyre::Result;

/// Result of sending an email
#[derive(Debug)]
pub struct SendResult {
    /// Provider-specific message ID
    pub message_id: String,
}

/// Trait for email providers
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email
    async fn send(&self, email: &Email) -> Result<SendResult>;

    /// Check that the provider is reachable and accepts our credentials
    async fn health_check(&self) -> Result<()>;

    /// Release transport resources. Providers without persistent
    /// connections keep the default no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Get provider name
    fn name(&self) -> &'static str;
}
