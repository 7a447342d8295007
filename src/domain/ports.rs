use crate::domain::compose::RequestFragment;
use crate::domain::money::Money;
use crate::domain::notification::{EventCode, Notification};
use crate::domain::payment::{Payment, PaymentState};
use crate::error::{RemoteError, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type ProcessorClientRef = Arc<dyn ProcessorClient>;
pub type EventSinkRef = Arc<dyn EventSink>;
pub type ObserverRef = Arc<dyn GatewayObserver>;

/// Persistence port with optimistic-concurrency semantics.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Payment>>;

    /// Saves a payment. When `expected` is set, the stored payment must
    /// currently be in that state or the save fails with `StateConflict`
    /// and nothing is written. `None` skips the guard (first insert).
    async fn save(&self, payment: Payment, expected: Option<PaymentState>) -> Result<()>;

    async fn all(&self) -> Result<Vec<Payment>>;
}

/// Remote processor port. Implementations own retry/timeout concerns; a
/// timeout must surface as `RemoteError::Transient`, never mutate state.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    async fn authorize(
        &self,
        payment: &Payment,
        request: &RequestFragment,
    ) -> std::result::Result<String, RemoteError>;

    async fn capture(&self, remote_id: &str, amount: &Money)
    -> std::result::Result<(), RemoteError>;

    async fn void(&self, remote_id: &str) -> std::result::Result<(), RemoteError>;

    async fn refund(&self, remote_id: &str, amount: &Money)
    -> std::result::Result<(), RemoteError>;
}

/// Authenticity check for inbound notifications.
pub trait NotificationVerifier: Send + Sync {
    fn verify(&self, notification: &Notification, signature: &str) -> bool;
}

/// Domain events emitted for observability and downstream workflows.
/// Fire-and-forget; nothing in the core consumes a return value.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Authorized { payment: String },
    Captured { payment: String },
    Voided { payment: String },
    Refunded { payment: String, amount: Money },
    CaptureReceived { payment: String },
    CaptureRejected { payment: String },
    RefundReceived { payment: String },
    RefundRejected { payment: String },
    Cancelled { payment: String },
    Failed { payment: String },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// Typed extension points, registered at startup and invoked synchronously in
/// registration order. Replaces runtime-discovered hooks with a plain
/// observer list.
pub trait GatewayObserver: Send + Sync {
    /// Runs before the authorisation request is sent; may amend the request
    /// fragment or veto the operation by returning an error.
    fn before_authorize(&self, _payment: &Payment, _request: &mut RequestFragment) -> Result<()> {
        Ok(())
    }

    /// Runs after a notification has been applied (or found to be a no-op).
    fn on_notification(&self, _payment: &Payment, _event: &EventCode) {}
}
