//! Message composition, retrying sends and bulk fan-out

use email::{Email, EmailProvider, load_template, render_placeholders};
use futures::{StreamExt, future, stream};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use crate::bus::NotificationBus;
use crate::error::{WaitlistError, WaitlistResult};
use crate::events::{BulkSummary, OperationFailure, WaitlistEvent};
use crate::models::RetryPolicy;
use crate::roster::Roster;

/// Literal token in composed bodies replaced by the company name
pub const COMPANY_NAME_TOKEN: &str = "[Company Name]";

/// Turns templates into messages and hands them to the mail transport
///
/// Only addresses on the roster are eligible; anything else fails closed
/// without contacting the transport.
pub struct DeliveryPipeline {
    provider: Arc<dyn EmailProvider>,
    bus: Arc<NotificationBus>,
    roster: Roster,
    company_name: String,
    bulk_concurrency: usize,
}

impl DeliveryPipeline {
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        bus: Arc<NotificationBus>,
        roster: Roster,
        company_name: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            bus,
            roster,
            company_name: company_name.into(),
            bulk_concurrency: 1,
        }
    }

    /// Bound on in-flight sends during bulk fan-out (minimum 1)
    pub fn with_bulk_concurrency(mut self, bulk_concurrency: usize) -> Self {
        self.bulk_concurrency = bulk_concurrency.max(1);
        self
    }

    /// Build a message from caller-supplied subject and HTML body functions
    pub fn compose<S, B>(&self, address: &str, subject_fn: &S, body_fn: &B) -> Email
    where
        S: Fn(&str) -> String + ?Sized,
        B: Fn(&str) -> String + ?Sized,
    {
        let body = body_fn(address).replace(COMPANY_NAME_TOKEN, &self.company_name);
        Email::new(address, subject_fn(address)).with_html(body)
    }

    /// Build a message from a template file with `{{ key }}` placeholders
    ///
    /// `address` and `companyName` are always available; entries in
    /// `replacements` override them.
    pub async fn compose_from_template<S>(
        &self,
        address: &str,
        subject_fn: &S,
        template_path: &Path,
        replacements: &HashMap<String, String>,
    ) -> WaitlistResult<Email>
    where
        S: Fn(&str) -> String + ?Sized,
    {
        let template = read_template(template_path).await?;
        Ok(self.render(address, subject_fn, &template, replacements))
    }

    fn render<S>(
        &self,
        address: &str,
        subject_fn: &S,
        template: &str,
        replacements: &HashMap<String, String>,
    ) -> Email
    where
        S: Fn(&str) -> String + ?Sized,
    {
        let mut merged = HashMap::with_capacity(replacements.len() + 2);
        merged.insert("address".to_string(), address.to_string());
        merged.insert("companyName".to_string(), self.company_name.clone());
        merged.extend(replacements.iter().map(|(k, v)| (k.clone(), v.clone())));

        Email::new(address, subject_fn(address)).with_html(render_placeholders(template, &merged))
    }

    /// Hand a message to the transport once
    ///
    /// Emits `messageSent` on success and `operationFailed` otherwise.
    pub async fn send(&self, email: &Email) -> bool {
        if !self.is_eligible(&email.to) {
            return false;
        }
        self.attempt(email).await
    }

    /// Compose once, then attempt up to `policy.max_retries + 1` times
    ///
    /// After each failed attempt except the last, emits
    /// `messageRetried(address, n)` (n starting at 1) and sleeps `policy.delay`.
    pub async fn send_with_retry<S, B>(
        &self,
        address: &str,
        subject_fn: &S,
        body_fn: &B,
        policy: RetryPolicy,
    ) -> bool
    where
        S: Fn(&str) -> String + ?Sized,
        B: Fn(&str) -> String + ?Sized,
    {
        self.deliver_with_retry(self.compose(address, subject_fn, body_fn), policy)
            .await
    }

    /// Retry loop shared by the closure and template paths
    pub async fn deliver_with_retry(&self, email: Email, policy: RetryPolicy) -> bool {
        if !self.is_eligible(&email.to) {
            return false;
        }

        for attempt in 0..=policy.max_retries {
            if self.attempt(&email).await {
                return true;
            }

            if attempt < policy.max_retries {
                let retry = attempt + 1;
                tracing::debug!(to = %email.to, retry, delay_ms = policy.delay.as_millis() as u64, "Retrying send");
                self.bus.publish(WaitlistEvent::MessageRetried {
                    address: email.to.clone(),
                    attempt: retry,
                });
                tokio::time::sleep(policy.delay).await;
            }
        }

        tracing::warn!(to = %email.to, attempts = policy.max_retries + 1, "Send failed after all attempts");
        false
    }

    /// `send_with_retry` for every address currently on the roster
    ///
    /// Returns the number of successful deliveries and emits
    /// `bulkSendCompleted` once.
    pub async fn send_bulk<S, B>(&self, subject_fn: &S, body_fn: &B, policy: RetryPolicy) -> usize
    where
        S: Fn(&str) -> String + Sync + ?Sized,
        B: Fn(&str) -> String + Sync + ?Sized,
    {
        self.fan_out(|address| async move {
            self.send_with_retry(&address, subject_fn, body_fn, policy)
                .await
        })
        .await
    }

    /// Template variant of [`send_bulk`](Self::send_bulk)
    ///
    /// The template is read once. If it cannot be read, no message is sent and
    /// the summary reports zero successes.
    pub async fn send_bulk_template<S>(
        &self,
        subject_fn: &S,
        template_path: &Path,
        replacements: &HashMap<String, String>,
        policy: RetryPolicy,
    ) -> usize
    where
        S: Fn(&str) -> String + Sync + ?Sized,
    {
        let template = match read_template(template_path).await {
            Ok(template) => template,
            Err(err) => {
                self.report_failure("sendBulkTemplate", "could not load template", &err);
                return self.fan_out(|_| future::ready(false)).await;
            }
        };

        let template = template.as_str();
        self.fan_out(|address| async move {
            let email = self.render(&address, subject_fn, template, replacements);
            self.deliver_with_retry(email, policy).await
        })
        .await
    }

    async fn fan_out<F, Fut>(&self, send_one: F) -> usize
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = bool>,
    {
        let addresses = self.roster.addresses();
        let total = addresses.len();

        let success_count = stream::iter(addresses)
            .map(send_one)
            .buffer_unordered(self.bulk_concurrency)
            .fold(0usize, |count, delivered| {
                future::ready(count + usize::from(delivered))
            })
            .await;

        tracing::info!(success_count, total, "Bulk send completed");
        self.bus.publish(WaitlistEvent::BulkSendCompleted(BulkSummary {
            success_count,
            total,
        }));
        success_count
    }

    async fn attempt(&self, email: &Email) -> bool {
        match self.provider.send(email).await {
            Ok(result) => {
                tracing::debug!(to = %email.to, message_id = %result.message_id, provider = self.provider.name(), "Message sent");
                self.bus.publish(WaitlistEvent::MessageSent(email.to.clone()));
                true
            }
            Err(err) => {
                let err = WaitlistError::Transport(format!("{:#}", err));
                self.report_failure("sendEmail", "mail transport rejected the message", &err);
                false
            }
        }
    }

    fn is_eligible(&self, address: &str) -> bool {
        if self.roster.contains(address) {
            return true;
        }
        tracing::warn!(to = %address, "Refusing to send to an address not on the waitlist");
        self.bus.publish(WaitlistEvent::OperationFailed(OperationFailure::new(
            "sendEmail",
            format!("{} is not on the waitlist", address),
        )));
        false
    }

    pub(crate) fn report_failure(&self, context: &str, message: &str, err: &WaitlistError) {
        tracing::warn!(context, error = %err, "{}", message);
        self.bus
            .publish(WaitlistEvent::operation_failed(context, message, err));
    }
}

async fn read_template(path: &Path) -> WaitlistResult<String> {
    load_template(path)
        .await
        .map_err(|err| WaitlistError::TemplateNotFound {
            path: path.display().to_string(),
            message: format!("{:#}", err),
        })
}
