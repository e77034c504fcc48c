//! The waitlist façade

use chrono::{DateTime, Utc};
use email::{EmailProvider, SmtpProvider};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::instrument;

use crate::bus::{NotificationBus, SubscriptionId};
use crate::config::WaitlistConfig;
use crate::delivery::DeliveryPipeline;
use crate::error::{WaitlistError, WaitlistResult};
use crate::events::WaitlistEvent;
use crate::gate::{InitState, InitializationGate};
use crate::models::{RetryPolicy, WaitlistEntry};
use crate::roster::Roster;
use crate::store::{StoreKind, WaitlistStore, build_store};
use crate::validator::EmailValidator;

/// Owns the in-memory waitlist and coordinates validation, persistence,
/// delivery and event publication
///
/// Construction only validates configuration. Call [`initialize`] (or
/// [`await_ready`] from another task) before any other operation; until the
/// gate reaches `Ready` every operation fails with `NotInitialized`.
///
/// Only `Configuration`, `NotInitialized`, `InitializationFailed` and `Closed`
/// are returned as `Err`. Everything else is reported through an event plus a
/// `false`, zero or empty return value.
///
/// [`initialize`]: WaitlistService::initialize
/// [`await_ready`]: WaitlistService::await_ready
pub struct WaitlistService {
    validator: EmailValidator,
    store: Arc<dyn WaitlistStore>,
    provider: Arc<dyn EmailProvider>,
    bus: Arc<NotificationBus>,
    gate: InitializationGate,
    roster: Roster,
    /// Orders roster mutations together with their store calls
    mutations: tokio::sync::Mutex<()>,
    delivery: DeliveryPipeline,
    started: AtomicBool,
    closed: AtomicBool,
}

impl WaitlistService {
    /// Validate `config` and build the SMTP transport and the configured store
    ///
    /// Fails with `Configuration` before anything is published when a required
    /// transport field is missing.
    pub fn new(config: WaitlistConfig) -> WaitlistResult<Self> {
        config.validate()?;

        let provider = SmtpProvider::new(config.smtp.clone())
            .map_err(|err| WaitlistError::Configuration(format!("{:#}", err)))?;
        let store = build_store(&config.backend, config.connect_retry.clone());

        Self::with_components(config, store, Arc::new(provider))
    }

    /// Like [`new`](Self::new) with caller-supplied store and transport
    pub fn with_components(
        config: WaitlistConfig,
        store: Arc<dyn WaitlistStore>,
        provider: Arc<dyn EmailProvider>,
    ) -> WaitlistResult<Self> {
        config.validate()?;

        let bus = Arc::new(NotificationBus::new());
        let roster = Roster::new();
        let delivery = DeliveryPipeline::new(
            provider.clone(),
            bus.clone(),
            roster.clone(),
            config.company_name.clone(),
        )
        .with_bulk_concurrency(config.bulk_concurrency);

        Ok(Self {
            validator: EmailValidator::new().with_require_tld(config.require_tld),
            store,
            provider,
            bus,
            gate: InitializationGate::new(),
            roster,
            mutations: tokio::sync::Mutex::new(()),
            delivery,
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// Shorthand for `bus().subscribe(..)`
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&WaitlistEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    pub fn store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    pub fn state(&self) -> InitState {
        self.gate.state()
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Wait until initialization finishes, returning its outcome
    pub async fn await_ready(&self) -> WaitlistResult<()> {
        self.gate.wait_ready().await
    }

    /// Verify the transport, connect the store and hydrate the waitlist
    ///
    /// Runs once; later calls wait for the first run's outcome. A failure is
    /// terminal and is not retried. Dropping the first call before it finishes
    /// fails the gate with "initialization cancelled".
    #[instrument(skip(self), fields(store = %self.store.kind()))]
    pub async fn initialize(&self) -> WaitlistResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WaitlistError::Closed);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return self.gate.wait_ready().await;
        }
        let _cancelled = self.gate.fail_on_drop("initialization cancelled");

        match self.provider.health_check().await {
            Ok(()) => {
                tracing::info!(provider = self.provider.name(), "Mail transport reachable");
                self.bus.publish(WaitlistEvent::TransportReady);
            }
            Err(err) => {
                let cause = format!("{:#}", err);
                self.bus.publish(WaitlistEvent::TransportFailed(cause.clone()));
                return Err(self.fail(format!("mail transport unreachable: {}", cause)));
            }
        }

        match self.store.connect().await {
            Ok(()) => self.bus.publish(WaitlistEvent::BackendConnected),
            Err(err) => {
                self.bus.publish(WaitlistEvent::BackendFailed(err.to_string()));
                return Err(self.fail(format!("backend connection failed: {}", err)));
            }
        }

        self.gate.mark_hydrating();
        let entries = match self.store.load_all().await {
            Ok(entries) => entries,
            Err(err) => {
                self.bus.publish(WaitlistEvent::operation_failed(
                    "initialize",
                    "failed to load the waitlist",
                    &err,
                ));
                return Err(self.fail(format!("hydration failed: {}", err)));
            }
        };

        let count = entries.len();
        self.roster.replace(entries);
        self.gate.mark_ready();

        tracing::info!(entries = count, "Waitlist initialized");
        self.bus.publish(WaitlistEvent::Initialized);
        Ok(())
    }

    fn fail(&self, reason: String) -> WaitlistError {
        tracing::error!(%reason, "Waitlist initialization failed");
        self.gate.mark_failed(reason.clone());
        WaitlistError::InitializationFailed(reason)
    }

    fn ensure_ready(&self) -> WaitlistResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WaitlistError::Closed);
        }
        self.gate.ensure_ready()
    }

    /// Accept `address`; `Ok(false)` if it is invalid or already present
    ///
    /// The address is visible in memory before persistence completes. A
    /// persistence failure is reported via `operationFailed` and the in-memory
    /// insertion stands. Mutations reach the store in the order they were
    /// applied in memory.
    #[instrument(skip(self))]
    pub async fn add_email(&self, address: &str) -> WaitlistResult<bool> {
        self.ensure_ready()?;

        let validation = self.validator.validate(address);
        if !validation.valid {
            let reason = validation.reason.unwrap_or_default();
            tracing::debug!(%reason, "Rejected invalid address");
            self.bus.publish(WaitlistEvent::ValidationRejected {
                address: address.to_string(),
                reason,
            });
            return Ok(false);
        }

        let _ordered = self.mutations.lock().await;
        let entry = WaitlistEntry::now(address);
        if !self.roster.insert(&entry) {
            self.bus
                .publish(WaitlistEvent::DuplicateRejected(address.to_string()));
            return Ok(false);
        }
        self.bus.publish(WaitlistEvent::EntryAdded(address.to_string()));

        if let Err(err) = self.store.create(&entry).await {
            self.delivery
                .report_failure("addEmail", "failed to persist entry", &err);
        }
        Ok(true)
    }

    /// Remove `address`; `Ok(false)` if it was not present
    #[instrument(skip(self))]
    pub async fn remove_email(&self, address: &str) -> WaitlistResult<bool> {
        self.ensure_ready()?;

        let _ordered = self.mutations.lock().await;
        if !self.roster.remove(address) {
            return Ok(false);
        }
        self.bus
            .publish(WaitlistEvent::EntryRemoved(address.to_string()));

        if let Err(err) = self.store.delete_one(address).await {
            self.delivery
                .report_failure("removeEmail", "failed to delete entry", &err);
        }
        Ok(true)
    }

    /// Snapshot of the in-memory waitlist, arbitrary order
    pub fn get_waitlist(&self) -> WaitlistResult<Vec<String>> {
        self.ensure_ready()?;
        Ok(self.roster.addresses())
    }

    #[instrument(skip(self))]
    pub async fn clear_waitlist(&self) -> WaitlistResult<()> {
        self.ensure_ready()?;

        let _ordered = self.mutations.lock().await;
        self.roster.clear();
        self.bus.publish(WaitlistEvent::ListCleared);

        if let Err(err) = self.store.delete_all().await {
            self.delivery
                .report_failure("clearWaitlist", "failed to clear stored entries", &err);
        }
        Ok(())
    }

    /// Addresses containing `pattern`, ignoring case
    ///
    /// The Local store answers from memory; other stores answer from persisted
    /// state.
    #[instrument(skip(self))]
    pub async fn find_by_pattern(&self, pattern: &str) -> WaitlistResult<Vec<String>> {
        self.ensure_ready()?;

        if self.store.kind() == StoreKind::Local {
            return Ok(self.roster.matching(pattern));
        }

        match self.store.find_by_pattern(pattern).await {
            Ok(found) => Ok(found),
            Err(err) => {
                self.delivery
                    .report_failure("findByPattern", "pattern search failed", &err);
                Ok(Vec::new())
            }
        }
    }

    /// Entries created within the inclusive bounds
    ///
    /// The Local store ignores the bounds and returns the total.
    #[instrument(skip(self))]
    pub async fn count_by_date_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> WaitlistResult<u64> {
        self.ensure_ready()?;

        match self.store.count_in_range(start, end).await {
            Ok(count) => Ok(count),
            Err(err) => {
                self.delivery
                    .report_failure("countByDateRange", "range count failed", &err);
                Ok(0)
            }
        }
    }

    /// Replace the stored waitlist with the in-memory one
    #[instrument(skip(self))]
    pub async fn save_waitlist(&self) -> WaitlistResult<bool> {
        self.ensure_ready()?;

        let _ordered = self.mutations.lock().await;
        let entries = self.roster.entries();
        match self.store.replace_all(&entries).await {
            Ok(()) => {
                tracing::info!(entries = entries.len(), "Waitlist saved");
                self.bus.publish(WaitlistEvent::ListSaved(
                    entries.into_iter().map(|entry| entry.email).collect(),
                ));
                Ok(true)
            }
            Err(err) => {
                self.delivery
                    .report_failure("saveWaitlist", "failed to save the waitlist", &err);
                Ok(false)
            }
        }
    }

    /// Compose and send one message to a waitlisted address, without retries
    #[instrument(skip(self, subject_fn, body_fn))]
    pub async fn send_confirmation<S, B>(
        &self,
        address: &str,
        subject_fn: S,
        body_fn: B,
    ) -> WaitlistResult<bool>
    where
        S: Fn(&str) -> String,
        B: Fn(&str) -> String,
    {
        self.ensure_ready()?;
        let email = self.delivery.compose(address, &subject_fn, &body_fn);
        Ok(self.delivery.send(&email).await)
    }

    /// Render a template file for `address` and send it once
    #[instrument(skip(self, subject_fn, replacements))]
    pub async fn send_template<S>(
        &self,
        address: &str,
        subject_fn: S,
        template_path: impl AsRef<Path> + std::fmt::Debug,
        replacements: &HashMap<String, String>,
    ) -> WaitlistResult<bool>
    where
        S: Fn(&str) -> String,
    {
        self.ensure_ready()?;

        match self
            .delivery
            .compose_from_template(address, &subject_fn, template_path.as_ref(), replacements)
            .await
        {
            Ok(email) => Ok(self.delivery.send(&email).await),
            Err(err) => {
                self.delivery
                    .report_failure("sendTemplate", "could not compose message", &err);
                Ok(false)
            }
        }
    }

    /// Compose and send with up to `policy.max_retries` retries
    #[instrument(skip(self, subject_fn, body_fn))]
    pub async fn send_with_retry<S, B>(
        &self,
        address: &str,
        subject_fn: S,
        body_fn: B,
        policy: RetryPolicy,
    ) -> WaitlistResult<bool>
    where
        S: Fn(&str) -> String,
        B: Fn(&str) -> String,
    {
        self.ensure_ready()?;
        Ok(self
            .delivery
            .send_with_retry(address, &subject_fn, &body_fn, policy)
            .await)
    }

    /// Send to every waitlisted address; returns the success count
    #[instrument(skip(self, subject_fn, body_fn))]
    pub async fn send_bulk<S, B>(
        &self,
        subject_fn: S,
        body_fn: B,
        policy: RetryPolicy,
    ) -> WaitlistResult<usize>
    where
        S: Fn(&str) -> String + Sync,
        B: Fn(&str) -> String + Sync,
    {
        self.ensure_ready()?;
        Ok(self.delivery.send_bulk(&subject_fn, &body_fn, policy).await)
    }

    /// Template variant of [`send_bulk`](Self::send_bulk)
    #[instrument(skip(self, subject_fn, replacements))]
    pub async fn send_bulk_template<S>(
        &self,
        subject_fn: S,
        template_path: impl AsRef<Path> + std::fmt::Debug,
        replacements: &HashMap<String, String>,
        policy: RetryPolicy,
    ) -> WaitlistResult<usize>
    where
        S: Fn(&str) -> String + Sync,
    {
        self.ensure_ready()?;
        Ok(self
            .delivery
            .send_bulk_template(&subject_fn, template_path.as_ref(), replacements, policy)
            .await)
    }

    /// Close the store and the transport. Idempotent.
    #[instrument(skip(self))]
    pub async fn close(&self) -> WaitlistResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Err(err) = self.store.close().await {
            self.delivery
                .report_failure("close", "failed to close the store", &err);
        }
        if let Err(err) = self.provider.close().await {
            let err = WaitlistError::Transport(format!("{:#}", err));
            self.delivery
                .report_failure("close", "failed to close the mail transport", &err);
        }

        tracing::info!("Waitlist closed");
        Ok(())
    }
}
