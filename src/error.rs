use crate::domain::payment::PaymentState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("operation '{operation}' is not permitted from state '{state}'")]
    InvalidState {
        operation: &'static str,
        state: PaymentState,
    },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("remote processor failure: {0}")]
    Remote(#[from] RemoteError),
    #[error("notification signature rejected")]
    AuthenticityFailure,
    #[error("payment '{id}' was modified concurrently (expected state '{expected}')")]
    StateConflict { id: String, expected: PaymentState },
    #[error("unknown payment: {0}")]
    UnknownPayment(String),
    #[error("invalid order data: {0}")]
    InvalidOrder(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Failure reported by the remote processor.
///
/// Hard declines are final: the payment cannot proceed and moves to `Failed`.
/// Transient failures leave the payment untouched and may be retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("hard decline: {0}")]
    HardDecline(String),
    #[error("transient failure: {0}")]
    Transient(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
