//! Lifecycle events published by the waitlist

use serde::Serialize;

/// Payload of `bulkSendCompleted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSummary {
    pub success_count: usize,
    pub total: usize,
}

/// Payload of `operationFailed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationFailure {
    /// Operation that failed, e.g. `addEmail` or `sendEmail`
    pub context: String,
    pub message: String,
    pub cause: Option<String>,
}

impl OperationFailure {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl ToString) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

/// Every state transition observers can see
///
/// Serializes as `{"event": "<name>", "payload": ...}` where `<name>` is the
/// value returned by [`WaitlistEvent::name`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum WaitlistEvent {
    EntryAdded(String),
    EntryRemoved(String),
    ListCleared,
    ListSaved(Vec<String>),
    MessageSent(String),
    MessageRetried { address: String, attempt: u32 },
    BulkSendCompleted(BulkSummary),
    ValidationRejected { address: String, reason: String },
    DuplicateRejected(String),
    OperationFailed(OperationFailure),
    TransportReady,
    TransportFailed(String),
    BackendConnected,
    BackendFailed(String),
    Initialized,
}

impl WaitlistEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WaitlistEvent::EntryAdded(_) => "entryAdded",
            WaitlistEvent::EntryRemoved(_) => "entryRemoved",
            WaitlistEvent::ListCleared => "listCleared",
            WaitlistEvent::ListSaved(_) => "listSaved",
            WaitlistEvent::MessageSent(_) => "messageSent",
            WaitlistEvent::MessageRetried { .. } => "messageRetried",
            WaitlistEvent::BulkSendCompleted(_) => "bulkSendCompleted",
            WaitlistEvent::ValidationRejected { .. } => "validationRejected",
            WaitlistEvent::DuplicateRejected(_) => "duplicateRejected",
            WaitlistEvent::OperationFailed(_) => "operationFailed",
            WaitlistEvent::TransportReady => "transportReady",
            WaitlistEvent::TransportFailed(_) => "transportFailed",
            WaitlistEvent::BackendConnected => "backendConnected",
            WaitlistEvent::BackendFailed(_) => "backendFailed",
            WaitlistEvent::Initialized => "initialized",
        }
    }

    pub fn operation_failed(
        context: impl Into<String>,
        message: impl Into<String>,
        cause: impl ToString,
    ) -> Self {
        WaitlistEvent::OperationFailed(OperationFailure::new(context, message).with_cause(cause))
    }
}
