use crate::domain::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event vocabulary of the processor's asynchronous notifications.
///
/// "Received" codes acknowledge that the processor accepted a request for
/// processing; they are advisory and never finalize anything. `Capture` and
/// `Refund` are the matching confirmations. Codes outside the vocabulary are
/// carried as `Other` so new processor events do not break parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCode {
    Authorisation,
    Capture,
    CaptureReceived,
    CaptureFailed,
    Refund,
    RefundReceived,
    RefundFailed,
    Cancellation,
    Other(String),
}

impl EventCode {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AUTHORISATION" => Self::Authorisation,
            "CAPTURE" => Self::Capture,
            "CAPTURE_RECEIVED" => Self::CaptureReceived,
            "CAPTURE_FAILED" => Self::CaptureFailed,
            "REFUND" => Self::Refund,
            "REFUND_RECEIVED" => Self::RefundReceived,
            "REFUND_FAILED" => Self::RefundFailed,
            "CANCELLATION" => Self::Cancellation,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Authorisation => "AUTHORISATION",
            Self::Capture => "CAPTURE",
            Self::CaptureReceived => "CAPTURE_RECEIVED",
            Self::CaptureFailed => "CAPTURE_FAILED",
            Self::Refund => "REFUND",
            Self::RefundReceived => "REFUND_RECEIVED",
            Self::RefundFailed => "REFUND_FAILED",
            Self::Cancellation => "CANCELLATION",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An out-of-band message from the processor reporting the outcome of a
/// previously requested operation. Authenticity must be verified before the
/// reconciler acts on one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Processor-side reference, unique per notification. Used for
    /// duplicate-delivery detection.
    pub psp_reference: String,
    /// Our payment id.
    pub merchant_reference: String,
    pub event_code: EventCode,
    pub success: bool,
    pub amount: Option<Money>,
}
