//! Email delivery library
//!
//! This crate is the mail-transport boundary of the workspace: it knows how to
//! hand a composed message to a provider and how to render `{{ key }}`
//! placeholders in template files. It does not know about waitlists.
//!
//! ## Components
//!
//! - **Models**: `Email` message and `SendResult`
//! - **Providers**: `EmailProvider` trait with `SmtpProvider` (lettre) and
//!   `MockSmtpProvider` (always available, scriptable failures)
//! - **Templates**: `load_template` and `render_placeholders`
//!
//! ## Usage
//!
//! ```ignore
//! use email::{Email, EmailProvider, SmtpConfig, SmtpProvider};
//!
//! let provider = SmtpProvider::new(config)?;
//! provider.health_check().await?;
//! provider.send(&Email::new("user@example.com", "Hi").with_html("<p>Hello</p>")).await?;
//! ```

pub mod models;
pub mod provider;
pub mod templates;

pub use models::Email;
pub use provider::{EmailProvider, MockSmtpProvider, SendResult, SmtpConfig, SmtpProvider};
pub use templates::{load_template, render_placeholders};
