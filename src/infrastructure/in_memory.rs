use crate::domain::payment::{Payment, PaymentState};
use crate::domain::ports::{DomainEvent, EventSink, PaymentStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// A thread-safe in-memory payment store.
///
/// The expected-state guard is checked and the write applied under a single
/// write lock, giving the compare-and-set semantics the reconciler relies on
/// when notifications race with synchronous operations.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<String, Payment>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn get(&self, id: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(id).cloned())
    }

    async fn save(&self, payment: Payment, expected: Option<PaymentState>) -> Result<()> {
        let mut payments = self.payments.write().await;
        if let Some(expected) = expected {
            let current = payments.get(&payment.id).map(|p| p.state);
            if current != Some(expected) {
                return Err(PaymentError::StateConflict {
                    id: payment.id,
                    expected,
                });
            }
        }
        payments.insert(payment.id.clone(), payment);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut all: Vec<Payment> = payments.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// Event sink that records everything it sees. Used by tests and available
/// for downstream workflows that poll rather than subscribe.
#[derive(Default, Clone)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().expect("event sink poisoned").clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: DomainEvent) {
        self.events.lock().expect("event sink poisoned").push(event);
    }
}

/// Event sink that forwards domain events to the tracing subscriber.
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: DomainEvent) {
        tracing::info!(?event, "domain event");
    }
}
