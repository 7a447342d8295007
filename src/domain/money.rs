use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ISO 4217 alphabetic currency code, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self> {
        let code = value.trim().to_ascii_uppercase();
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(code))
        } else {
            Err(PaymentError::InvalidAmount(format!(
                "invalid currency code: '{value}'"
            )))
        }
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl FromStr for CurrencyCode {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_from(s.to_string())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monetary value: a decimal amount in a single currency.
///
/// Arithmetic is only defined between values of the same currency; mixing
/// currencies is a domain error, never a silent coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub value: Decimal,
    pub currency: CurrencyCode,
}

impl Money {
    pub fn new(value: Decimal, currency: CurrencyCode) -> Self {
        Self { value, currency }
    }

    pub fn zero(currency: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    pub fn assert_same_currency(&self, other: &Money) -> Result<()> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(PaymentError::InvalidAmount(format!(
                "currency mismatch: expected {}, got {}",
                self.currency, other.currency
            )))
        }
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        self.assert_same_currency(other)?;
        let value = self.value.checked_add(other.value).ok_or_else(|| {
            PaymentError::InvalidAmount(format!("overflow adding {other} to {self}"))
        })?;
        Ok(Money::new(value, self.currency.clone()))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money> {
        self.assert_same_currency(other)?;
        let value = self.value.checked_sub(other.value).ok_or_else(|| {
            PaymentError::InvalidAmount(format!("overflow subtracting {other} from {self}"))
        })?;
        Ok(Money::new(value, self.currency.clone()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// A strictly positive monetary amount supplied to an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Amount(Money);

impl Amount {
    pub fn new(money: Money) -> Result<Self> {
        if money.is_positive() {
            Ok(Self(money))
        } else {
            Err(PaymentError::InvalidAmount(format!(
                "amount must be positive, got {money}"
            )))
        }
    }

    pub fn money(&self) -> &Money {
        &self.0
    }

    pub fn into_money(self) -> Money {
        self.0
    }
}

impl TryFrom<Money> for Amount {
    type Error = PaymentError;

    fn try_from(money: Money) -> Result<Self> {
        Self::new(money)
    }
}
