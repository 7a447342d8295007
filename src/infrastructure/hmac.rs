use crate::domain::notification::Notification;
use crate::domain::ports::NotificationVerifier;
use crate::error::{PaymentError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::hmac;

/// HMAC-SHA256 authenticity check over the canonical concatenation of a
/// notification's fields, following the processor's wire convention: values
/// joined with `:`, with `\` and `:` inside a value escaped, key supplied as
/// hex, signature as base64.
pub struct HmacSha256Verifier {
    key: hmac::Key,
}

impl HmacSha256Verifier {
    pub fn from_hex_key(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| PaymentError::ConfigError(format!("invalid HMAC key: {e}")))?;
        if bytes.is_empty() {
            return Err(PaymentError::ConfigError("empty HMAC key".to_string()));
        }
        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, &bytes),
        })
    }

    fn escape(value: &str) -> String {
        value.replace('\\', "\\\\").replace(':', "\\:")
    }

    fn canonical(notification: &Notification) -> String {
        let (value, currency) = match &notification.amount {
            Some(money) => (money.value.to_string(), money.currency.to_string()),
            None => (String::new(), String::new()),
        };
        [
            Self::escape(&notification.psp_reference),
            Self::escape(&notification.merchant_reference),
            Self::escape(&value),
            Self::escape(&currency),
            Self::escape(notification.event_code.as_str()),
            notification.success.to_string(),
        ]
        .join(":")
    }

    /// Computes the base64 signature for a notification. Exposed so tests and
    /// fixtures can produce authentic payloads.
    pub fn sign(&self, notification: &Notification) -> String {
        let tag = hmac::sign(&self.key, Self::canonical(notification).as_bytes());
        BASE64.encode(tag.as_ref())
    }
}

impl NotificationVerifier for HmacSha256Verifier {
    fn verify(&self, notification: &Notification, signature: &str) -> bool {
        let Ok(signature) = BASE64.decode(signature) else {
            return false;
        };
        hmac::verify(
            &self.key,
            Self::canonical(notification).as_bytes(),
            &signature,
        )
        .is_ok()
    }
}
