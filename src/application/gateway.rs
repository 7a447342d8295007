use crate::domain::compose::{ComposerRegistry, Order};
use crate::domain::money::Amount;
use crate::domain::payment::{Payment, PaymentState};
use crate::domain::ports::{
    DomainEvent, EventSinkRef, ObserverRef, PaymentStoreRef, ProcessorClientRef,
};
use crate::error::{PaymentError, RemoteError, Result};
use serde::{Deserialize, Serialize};

/// Gateway settings, typically loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub merchant_account: String,
    /// Hex-encoded shared secret for notification signatures.
    pub hmac_key: String,
    /// Payment type used to compose authorisation requests.
    pub default_payment_type: String,
    /// Whether `authorize` also captures when the caller does not say.
    pub capture_on_authorize: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            merchant_account: "test-merchant".to_string(),
            // hex("payflow-dev-key"); never use outside local development.
            hmac_key: "706179666c6f772d6465762d6b6579".to_string(),
            default_payment_type: "card".to_string(),
            capture_on_authorize: true,
        }
    }
}

/// Synchronous payment operations.
///
/// The gateway validates an operation against the stored payment, performs
/// the remote call, and only then commits the state transition, guarded by
/// the store's expected-state check. A transient processor failure therefore
/// leaves the stored payment exactly as it was.
pub struct PaymentGateway {
    store: PaymentStoreRef,
    processor: ProcessorClientRef,
    composers: ComposerRegistry,
    observers: Vec<ObserverRef>,
    events: EventSinkRef,
    config: GatewayConfig,
}

impl PaymentGateway {
    pub fn new(
        store: PaymentStoreRef,
        processor: ProcessorClientRef,
        composers: ComposerRegistry,
        events: EventSinkRef,
        config: GatewayConfig,
    ) -> Self {
        Self {
            store,
            processor,
            composers,
            observers: Vec::new(),
            events,
            config,
        }
    }

    /// Registers an extension point; observers run in registration order.
    pub fn register_observer(&mut self, observer: ObserverRef) {
        self.observers.push(observer);
    }

    pub async fn load(&self, id: &str) -> Result<Payment> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::UnknownPayment(id.to_string()))
    }

    pub async fn all_payments(&self) -> Result<Vec<Payment>> {
        self.store.all().await
    }

    /// Authorizes a new payment, capturing in the same request when `capture`
    /// is set. On success the payment carries the processor's reference and
    /// is persisted in `Authorization` or `Completed`.
    pub async fn authorize(
        &self,
        mut payment: Payment,
        order: &Order,
        capture: bool,
    ) -> Result<Payment> {
        if payment.state != PaymentState::New {
            return Err(PaymentError::InvalidState {
                operation: "authorize",
                state: payment.state,
            });
        }
        // Must fail before the remote call is made.
        if !payment.amount.is_positive() {
            return Err(PaymentError::InvalidAmount(format!(
                "authorization amount must be positive, got {}",
                payment.amount
            )));
        }
        // A payment id already on file means this is a duplicate request.
        if let Some(existing) = self.store.get(&payment.id).await? {
            return Err(PaymentError::InvalidState {
                operation: "authorize",
                state: existing.state,
            });
        }

        let composer = self
            .composers
            .get(&self.config.default_payment_type)
            .ok_or_else(|| {
                PaymentError::ConfigError(format!(
                    "unknown payment type '{}'",
                    self.config.default_payment_type
                ))
            })?;
        let mut request = composer.compose(order)?;
        request.insert("merchantAccount", &self.config.merchant_account);
        for observer in &self.observers {
            observer.before_authorize(&payment, &mut request)?;
        }

        match self.processor.authorize(&payment, &request).await {
            Ok(remote_id) => {
                payment.authorize(remote_id, capture)?;
                self.store.save(payment.clone(), None).await?;
                self.events.emit(DomainEvent::Authorized {
                    payment: payment.id.clone(),
                });
                if capture {
                    self.events.emit(DomainEvent::Captured {
                        payment: payment.id.clone(),
                    });
                }
                Ok(payment)
            }
            Err(error @ RemoteError::HardDecline(_)) => {
                tracing::warn!(payment = %payment.id, %error, "authorisation declined");
                payment.mark_failed();
                self.store.save(payment.clone(), None).await?;
                self.events.emit(DomainEvent::Failed {
                    payment: payment.id,
                });
                Err(error.into())
            }
            // Transient: nothing persisted, the caller may retry.
            Err(error) => Err(error.into()),
        }
    }

    /// Captures an authorized payment. The amount defaults to — and must
    /// equal — the full authorized amount.
    pub async fn capture(&self, id: &str, amount: Option<Amount>) -> Result<Payment> {
        let stored = self.load(id).await?;
        let prior = stored.state;
        let mut payment = stored.clone();
        payment.capture(amount.as_ref())?;

        let remote_id = remote_reference(&payment)?;
        let capture_amount = match amount {
            Some(amount) => amount.into_money(),
            None => payment.amount.clone(),
        };
        match self.processor.capture(&remote_id, &capture_amount).await {
            Ok(()) => {
                self.store.save(payment.clone(), Some(prior)).await?;
                self.events.emit(DomainEvent::Captured {
                    payment: payment.id.clone(),
                });
                Ok(payment)
            }
            Err(error) => self.modification_failed(stored, error).await,
        }
    }

    /// Voids an authorization.
    pub async fn void(&self, id: &str) -> Result<Payment> {
        let stored = self.load(id).await?;
        let prior = stored.state;
        let mut payment = stored.clone();
        payment.void()?;

        let remote_id = remote_reference(&payment)?;
        match self.processor.void(&remote_id).await {
            Ok(()) => {
                self.store.save(payment.clone(), Some(prior)).await?;
                self.events.emit(DomainEvent::Voided {
                    payment: payment.id.clone(),
                });
                Ok(payment)
            }
            Err(error) => self.modification_failed(stored, error).await,
        }
    }

    /// Refunds a captured payment, partially or fully. The amount defaults to
    /// the outstanding refundable balance.
    pub async fn refund(&self, id: &str, amount: Option<Amount>) -> Result<Payment> {
        let stored = self.load(id).await?;
        let prior = stored.state;
        let mut payment = stored.clone();
        let applied = payment.refund(amount.as_ref())?;

        let remote_id = remote_reference(&payment)?;
        match self.processor.refund(&remote_id, &applied).await {
            Ok(()) => {
                self.store.save(payment.clone(), Some(prior)).await?;
                self.events.emit(DomainEvent::Refunded {
                    payment: payment.id.clone(),
                    amount: applied,
                });
                Ok(payment)
            }
            Err(error) => self.modification_failed(stored, error).await,
        }
    }

    /// A hard decline of a modification is terminal for the payment; a
    /// transient failure leaves it untouched for a later retry.
    async fn modification_failed(&self, mut stored: Payment, error: RemoteError) -> Result<Payment> {
        if matches!(error, RemoteError::HardDecline(_)) {
            tracing::warn!(payment = %stored.id, %error, "modification declined");
            let prior = stored.state;
            if stored.mark_failed() {
                self.store.save(stored.clone(), Some(prior)).await?;
                self.events.emit(DomainEvent::Failed { payment: stored.id });
            }
        }
        Err(error.into())
    }
}

fn remote_reference(payment: &Payment) -> Result<String> {
    payment.remote_id.clone().ok_or_else(|| {
        PaymentError::InternalError(Box::new(std::io::Error::other(format!(
            "payment '{}' has no remote reference",
            payment.id
        ))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compose::RequestFragment;
    use crate::domain::money::Money;
    use crate::domain::ports::{GatewayObserver, PaymentStore};
    use crate::infrastructure::in_memory::{InMemoryPaymentStore, RecordingEventSink};
    use crate::infrastructure::sandbox::SandboxProcessor;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Harness {
        gateway: PaymentGateway,
        store: InMemoryPaymentStore,
        processor: Arc<SandboxProcessor>,
        events: RecordingEventSink,
    }

    fn harness() -> Harness {
        let store = InMemoryPaymentStore::new();
        let processor = Arc::new(SandboxProcessor::new());
        let events = RecordingEventSink::new();
        let gateway = PaymentGateway::new(
            Arc::new(store.clone()),
            processor.clone(),
            ComposerRegistry::with_defaults(),
            Arc::new(events.clone()),
            GatewayConfig::default(),
        );
        Harness {
            gateway,
            store,
            processor,
            events,
        }
    }

    fn usd(value: Decimal) -> Money {
        Money::new(value, "USD".parse().unwrap())
    }

    fn order() -> Order {
        Order {
            id: "order-1".to_string(),
            shopper_reference: "shopper-1".to_string(),
            shopper_email: "shopper@example.com".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_authorize_without_capture() {
        let h = harness();
        let payment = Payment::new("p1", usd(dec!(100.00)));
        let payment = h.gateway.authorize(payment, &order(), false).await.unwrap();

        assert_eq!(payment.state, PaymentState::Authorization);
        assert_eq!(payment.remote_id.as_deref(), Some("SBX000001"));
        assert_eq!(
            h.store.get("p1").await.unwrap().unwrap().state,
            PaymentState::Authorization
        );
        assert_eq!(
            h.events.events(),
            vec![DomainEvent::Authorized {
                payment: "p1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_authorize_with_capture() {
        let h = harness();
        let payment = Payment::new("p1", usd(dec!(100.00)));
        let payment = h.gateway.authorize(payment, &order(), true).await.unwrap();
        assert_eq!(payment.state, PaymentState::Completed);
    }

    #[tokio::test]
    async fn test_non_positive_amount_never_authorized() {
        let h = harness();
        let negative = Payment::new("p1", usd(dec!(-100.00)));
        let result = h.gateway.authorize(negative, &order(), true).await;
        assert!(matches!(result, Err(PaymentError::InvalidAmount(_))));
        assert!(h.store.get("p1").await.unwrap().is_none());
        assert!(h.events.events().is_empty());

        let zero = Payment::new("p2", usd(dec!(0.00)));
        assert!(matches!(
            h.gateway.authorize(zero, &order(), false).await,
            Err(PaymentError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_authorize_rejected() {
        let h = harness();
        let payment = Payment::new("p1", usd(dec!(100.00)));
        h.gateway
            .authorize(payment.clone(), &order(), false)
            .await
            .unwrap();

        let duplicate = Payment::new("p1", usd(dec!(100.00)));
        let result = h.gateway.authorize(duplicate, &order(), false).await;
        assert!(matches!(
            result,
            Err(PaymentError::InvalidState {
                operation: "authorize",
                state: PaymentState::Authorization,
            })
        ));
    }

    #[tokio::test]
    async fn test_hard_decline_fails_payment() {
        let h = harness();
        h.processor
            .fail_next_with(RemoteError::HardDecline("fraud".to_string()));

        let payment = Payment::new("p1", usd(dec!(100.00)));
        let result = h.gateway.authorize(payment, &order(), true).await;
        assert!(matches!(
            result,
            Err(PaymentError::Remote(RemoteError::HardDecline(_)))
        ));
        assert_eq!(
            h.store.get("p1").await.unwrap().unwrap().state,
            PaymentState::Failed
        );
    }

    #[tokio::test]
    async fn test_transient_authorize_leaves_no_trace() {
        let h = harness();
        h.processor
            .fail_next_with(RemoteError::Transient("timeout".to_string()));

        let payment = Payment::new("p1", usd(dec!(100.00)));
        let result = h.gateway.authorize(payment.clone(), &order(), true).await;
        assert!(matches!(
            result,
            Err(PaymentError::Remote(RemoteError::Transient(_)))
        ));
        assert!(h.store.get("p1").await.unwrap().is_none());

        // Retry succeeds.
        h.gateway.authorize(payment, &order(), true).await.unwrap();
    }

    #[tokio::test]
    async fn test_capture_flow() {
        let h = harness();
        let payment = Payment::new("p1", usd(dec!(100.00)));
        h.gateway.authorize(payment, &order(), false).await.unwrap();

        let payment = h.gateway.capture("p1", None).await.unwrap();
        assert_eq!(payment.state, PaymentState::Completed);
        assert!(h.events.events().contains(&DomainEvent::Captured {
            payment: "p1".to_string()
        }));
    }

    #[tokio::test]
    async fn test_partial_capture_rejected_before_remote_call() {
        let h = harness();
        let payment = Payment::new("p1", usd(dec!(100.00)));
        h.gateway.authorize(payment, &order(), false).await.unwrap();

        let partial = Amount::new(usd(dec!(60.00))).unwrap();
        let result = h.gateway.capture("p1", Some(partial)).await;
        assert!(matches!(result, Err(PaymentError::InvalidAmount(_))));
        assert_eq!(
            h.store.get("p1").await.unwrap().unwrap().state,
            PaymentState::Authorization
        );
    }

    #[tokio::test]
    async fn test_transient_capture_leaves_authorization() {
        let h = harness();
        let payment = Payment::new("p1", usd(dec!(100.00)));
        h.gateway.authorize(payment, &order(), false).await.unwrap();

        h.processor
            .fail_next_with(RemoteError::Transient("timeout".to_string()));
        assert!(h.gateway.capture("p1", None).await.is_err());
        assert_eq!(
            h.store.get("p1").await.unwrap().unwrap().state,
            PaymentState::Authorization
        );

        h.gateway.capture("p1", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_void_flow() {
        let h = harness();
        let payment = Payment::new("p1", usd(dec!(100.00)));
        h.gateway.authorize(payment, &order(), false).await.unwrap();

        let payment = h.gateway.void("p1").await.unwrap();
        assert_eq!(payment.state, PaymentState::AuthorizationVoided);

        // Void is not repeatable.
        assert!(matches!(
            h.gateway.void("p1").await,
            Err(PaymentError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_refund_partial_then_full() {
        let h = harness();
        let payment = Payment::new("p1", usd(dec!(100.00)));
        h.gateway.authorize(payment, &order(), true).await.unwrap();

        let partial = Amount::new(usd(dec!(40.00))).unwrap();
        let payment = h.gateway.refund("p1", Some(partial)).await.unwrap();
        assert_eq!(payment.state, PaymentState::PartiallyRefunded);

        let payment = h.gateway.refund("p1", None).await.unwrap();
        assert_eq!(payment.state, PaymentState::Refunded);
        assert_eq!(payment.refunded_amount.value, dec!(100.00));
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let h = harness();
        assert!(matches!(
            h.gateway.capture("ghost", None).await,
            Err(PaymentError::UnknownPayment(_))
        ));
    }

    struct VetoObserver;

    impl GatewayObserver for VetoObserver {
        fn before_authorize(
            &self,
            _payment: &Payment,
            _request: &mut RequestFragment,
        ) -> crate::error::Result<()> {
            Err(PaymentError::InvalidOrder("vetoed".to_string()))
        }
    }

    struct TaggingObserver;

    impl GatewayObserver for TaggingObserver {
        fn before_authorize(
            &self,
            _payment: &Payment,
            request: &mut RequestFragment,
        ) -> crate::error::Result<()> {
            request.insert("sessionValidity", "7200");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_observer_can_veto_authorization() {
        let mut h = harness();
        h.gateway.register_observer(Arc::new(TaggingObserver));
        h.gateway.register_observer(Arc::new(VetoObserver));

        let payment = Payment::new("p1", usd(dec!(100.00)));
        let result = h.gateway.authorize(payment, &order(), true).await;
        assert!(matches!(result, Err(PaymentError::InvalidOrder(_))));
        assert!(h.store.get("p1").await.unwrap().is_none());
    }
}
