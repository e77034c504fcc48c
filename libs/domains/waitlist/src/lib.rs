//! Waitlist Domain
//!
//! Keeps a set of subscriber addresses, mirrors it to an interchangeable
//! store and sends notification emails to the people on it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  WaitlistService │  ← Façade: validation, membership, orchestration
//! └───┬─────────┬────┘
//!     │         │
//! ┌───▼───┐ ┌───▼──────────────┐
//! │ Store │ │ DeliveryPipeline │  ← compose, retry, bulk fan-out
//! └───────┘ └──────────────────┘
//!     Local | Document (MongoDB) | Relational (SeaORM)
//! ```
//!
//! Every state change is published on the [`NotificationBus`]. Operations are
//! gated by an [`InitializationGate`] that opens once the transport has been
//! verified, the store connected and the in-memory set hydrated.
//!
//! # Usage
//!
//! ```rust,no_run
//! use core_config::FromEnv;
//! use domain_waitlist::{RetryPolicy, WaitlistConfig, WaitlistService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = WaitlistService::new(WaitlistConfig::from_env()?)?;
//! service.subscribe(|event| tracing::info!(event = event.name(), "waitlist event"));
//! service.initialize().await?;
//!
//! service.add_email("ada@example.com").await?;
//! let sent = service
//!     .send_bulk(
//!         |_| "You're in".to_string(),
//!         |address| format!("Welcome {}, thanks for joining [Company Name]", address),
//!         RetryPolicy::default(),
//!     )
//!     .await?;
//! # let _ = sent;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod delivery;
pub mod error;
pub mod events;
pub mod gate;
pub mod models;
pub mod roster;
pub mod service;
pub mod store;
pub mod validator;

// Re-export commonly used types
pub use bus::{NotificationBus, SubscriptionId};
pub use config::{BackendConfig, DocumentStoreConfig, WaitlistConfig};
pub use delivery::DeliveryPipeline;
pub use error::{WaitlistError, WaitlistResult};
pub use events::{BulkSummary, OperationFailure, WaitlistEvent};
pub use gate::{InitState, InitializationGate};
pub use models::{RetryPolicy, Validation, WaitlistEntry};
pub use service::WaitlistService;
pub use store::{StoreKind, WaitlistStore, build_store};
pub use self::validator::EmailValidator;
