use crate::domain::notification::{EventCode, Notification};
use crate::domain::payment::{Payment, PaymentState};
use crate::domain::ports::{
    DomainEvent, EventSinkRef, NotificationVerifier, ObserverRef, PaymentStoreRef,
};
use crate::error::{PaymentError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Applies asynchronous processor notifications to payments.
///
/// Policy highlights:
/// - "received" acknowledgements are advisory; the processor acknowledges a
///   request before validating it, so only the distinct confirmation event
///   (or the synchronous response) finalizes a capture,
/// - rejections are unambiguous and wind the payment back immediately,
/// - unknown event codes are logged and skipped,
/// - duplicate deliveries are a no-op, both via the psp-reference ledger and
///   via state checks that survive a restart.
pub struct NotificationReconciler {
    store: PaymentStoreRef,
    verifier: Arc<dyn NotificationVerifier>,
    events: EventSinkRef,
    observers: Vec<ObserverRef>,
    applied: Mutex<HashSet<String>>,
}

impl NotificationReconciler {
    pub fn new(
        store: PaymentStoreRef,
        verifier: Arc<dyn NotificationVerifier>,
        events: EventSinkRef,
    ) -> Self {
        Self {
            store,
            verifier,
            events,
            observers: Vec::new(),
            applied: Mutex::new(HashSet::new()),
        }
    }

    pub fn register_observer(&mut self, observer: ObserverRef) {
        self.observers.push(observer);
    }

    /// Verifies authenticity, then applies the notification. Refuses to act
    /// on an invalid signature.
    pub async fn process(
        &self,
        notification: &Notification,
        signature: &str,
    ) -> Result<Option<PaymentState>> {
        if !self.verifier.verify(notification, signature) {
            tracing::warn!(
                psp = %notification.psp_reference,
                payment = %notification.merchant_reference,
                "rejected notification with invalid signature"
            );
            return Err(PaymentError::AuthenticityFailure);
        }
        self.apply(notification).await
    }

    /// Applies an already-authenticated notification. Returns the new state
    /// when a transition was committed, `None` for a no-op.
    pub async fn apply(&self, notification: &Notification) -> Result<Option<PaymentState>> {
        if let EventCode::Other(code) = &notification.event_code {
            tracing::info!(code = %code, "ignoring unknown notification event");
            return Ok(None);
        }

        let ledger_key = format!(
            "{}:{}",
            notification.psp_reference, notification.event_code
        );
        if self.seen(&ledger_key) {
            tracing::debug!(psp = %notification.psp_reference, "duplicate notification, skipped");
            return Ok(None);
        }

        let Some(mut payment) = self.store.get(&notification.merchant_reference).await? else {
            tracing::warn!(
                payment = %notification.merchant_reference,
                event = %notification.event_code,
                "notification for unknown payment, skipped"
            );
            return Ok(None);
        };
        let prior = payment.state;

        let (changed, event) = self.transition(&mut payment, notification)?;
        if changed {
            self.store.save(payment.clone(), Some(prior)).await?;
        }
        for observer in &self.observers {
            observer.on_notification(&payment, &notification.event_code);
        }
        if let Some(event) = event {
            self.events.emit(event);
        }
        self.mark_applied(ledger_key);

        Ok(changed.then_some(payment.state))
    }

    /// Pure policy: mutates the payment copy, reports whether it changed and
    /// which domain event to emit.
    fn transition(
        &self,
        payment: &mut Payment,
        notification: &Notification,
    ) -> Result<(bool, Option<DomainEvent>)> {
        let id = payment.id.clone();
        let result = match (&notification.event_code, notification.success) {
            // Hosted-page flow: the authorisation outcome only arrives here.
            (EventCode::Authorisation, true) => {
                if payment.state == PaymentState::New {
                    payment.authorize(notification.psp_reference.clone(), false)?;
                    (true, Some(DomainEvent::Authorized { payment: id }))
                } else {
                    (false, None)
                }
            }
            (EventCode::Authorisation, false) => {
                let changed = payment.reject_authorization();
                (changed, changed.then_some(DomainEvent::Failed { payment: id }))
            }
            // Acknowledgement only: the processor accepted the request, which
            // says nothing about the outcome yet.
            (EventCode::CaptureReceived, _) => {
                (false, Some(DomainEvent::CaptureReceived { payment: id }))
            }
            (EventCode::Capture, true) => {
                let changed = payment.confirm_capture();
                (
                    changed,
                    changed.then_some(DomainEvent::Captured { payment: id }),
                )
            }
            (EventCode::Capture, false) | (EventCode::CaptureFailed, _) => {
                let changed = payment.reverse_capture();
                (
                    changed,
                    changed.then_some(DomainEvent::CaptureRejected { payment: id }),
                )
            }
            (EventCode::RefundReceived, _) => {
                (false, Some(DomainEvent::RefundReceived { payment: id }))
            }
            // Refund bookkeeping is committed by the synchronous path; the
            // confirmation carries no further transition.
            (EventCode::Refund, true) => (false, None),
            (EventCode::Refund, false) | (EventCode::RefundFailed, _) => {
                let changed = payment.reverse_refund(notification.amount.as_ref())?;
                (
                    changed,
                    changed.then_some(DomainEvent::RefundRejected { payment: id }),
                )
            }
            (EventCode::Cancellation, true) => {
                let changed = payment.cancel();
                (
                    changed,
                    changed.then_some(DomainEvent::Cancelled { payment: id }),
                )
            }
            (EventCode::Cancellation, false) => (false, None),
            // Filtered out before the store lookup.
            (EventCode::Other(_), _) => (false, None),
        };
        Ok(result)
    }

    fn seen(&self, key: &str) -> bool {
        self.applied
            .lock()
            .expect("notification ledger poisoned")
            .contains(key)
    }

    fn mark_applied(&self, key: String) {
        self.applied
            .lock()
            .expect("notification ledger poisoned")
            .insert(key);
    }
}
