use crate::domain::compose::RequestFragment;
use crate::domain::money::Money;
use crate::domain::payment::Payment;
use crate::domain::ports::ProcessorClient;
use crate::error::RemoteError;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A postal code that always triggers a hard decline, for exercising the
/// decline path without a real processor account.
pub const DECLINE_POSTAL_CODE: &str = "53140";

/// Deterministic stand-in for the remote processor.
///
/// Assigns sequential remote references and never touches the network. The
/// next call can be primed to fail, which is how tests exercise the
/// transient-failure and hard-decline paths of capture/void/refund.
#[derive(Default)]
pub struct SandboxProcessor {
    seq: AtomicU64,
    fail_next: Mutex<Option<RemoteError>>,
}

impl SandboxProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primes the next modification call (capture/void/refund) to fail.
    pub fn fail_next_with(&self, error: RemoteError) {
        *self.fail_next.lock().expect("sandbox poisoned") = Some(error);
    }

    fn take_failure(&self) -> Option<RemoteError> {
        self.fail_next.lock().expect("sandbox poisoned").take()
    }

    fn next_reference(&self) -> String {
        format!("SBX{:06}", self.seq.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl ProcessorClient for SandboxProcessor {
    async fn authorize(
        &self,
        _payment: &Payment,
        request: &RequestFragment,
    ) -> Result<String, RemoteError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        if request.get("billingAddress.postalCode") == Some(DECLINE_POSTAL_CODE) {
            return Err(RemoteError::HardDecline(
                "the payment was declined".to_string(),
            ));
        }
        Ok(self.next_reference())
    }

    async fn capture(&self, _remote_id: &str, _amount: &Money) -> Result<(), RemoteError> {
        match self.take_failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn void(&self, _remote_id: &str) -> Result<(), RemoteError> {
        match self.take_failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn refund(&self, _remote_id: &str, _amount: &Money) -> Result<(), RemoteError> {
        match self.take_failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
