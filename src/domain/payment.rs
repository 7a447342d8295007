use crate::domain::money::{Amount, Money};
use crate::error::{PaymentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    New,
    Authorization,
    Completed,
    AuthorizationVoided,
    PartiallyRefunded,
    Refunded,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Authorization => "authorization",
            Self::Completed => "completed",
            Self::AuthorizationVoided => "authorization_voided",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }

    /// `Completed` is only conditionally terminal (it still accepts refunds),
    /// so it is not included here.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationVoided | Self::Refunded | Self::Failed
        )
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single payment and its lifecycle bookkeeping.
///
/// The transition methods validate preconditions and mutate state; they never
/// perform I/O. Callers (the gateway, the reconciler) are responsible for the
/// remote call preceding a transition and for persisting the result. The
/// struct assumes exclusive access while a transition is applied; serializing
/// concurrent operations on the same payment id is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub state: PaymentState,
    /// Fixed at authorization time.
    pub amount: Money,
    /// Monotonically non-decreasing on the synchronous path, never above
    /// `amount`. A rejected-refund notification may wind it back.
    pub refunded_amount: Money,
    /// Reference assigned by the processor; set on the first transition out
    /// of `New`.
    pub remote_id: Option<String>,
}

impl Payment {
    pub fn new(id: impl Into<String>, amount: Money) -> Self {
        let refunded_amount = Money::zero(amount.currency.clone());
        Self {
            id: id.into(),
            state: PaymentState::New,
            amount,
            refunded_amount,
            remote_id: None,
        }
    }

    fn assert_state(&self, allowed: &[PaymentState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(PaymentError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Outstanding refundable balance: `amount - refunded_amount`.
    pub fn refundable_amount(&self) -> Money {
        Money::new(
            self.amount.value - self.refunded_amount.value,
            self.amount.currency.clone(),
        )
    }

    /// Commits a successful authorisation: `New -> Completed` when the funds
    /// were captured in the same request, `New -> Authorization` otherwise.
    /// Authorisation is the one place the amount is supplied, so it is also
    /// validated here.
    pub fn authorize(&mut self, remote_id: impl Into<String>, capture: bool) -> Result<()> {
        self.assert_state(&[PaymentState::New], "authorize")?;
        if !self.amount.is_positive() {
            return Err(PaymentError::InvalidAmount(format!(
                "authorization amount must be positive, got {}",
                self.amount
            )));
        }
        self.remote_id = Some(remote_id.into());
        self.state = if capture {
            PaymentState::Completed
        } else {
            PaymentState::Authorization
        };
        Ok(())
    }

    /// Commits a capture: `Authorization -> Completed`.
    ///
    /// Partial capture is not supported: a supplied amount must equal the
    /// full authorized amount.
    pub fn capture(&mut self, amount: Option<&Amount>) -> Result<()> {
        self.assert_state(&[PaymentState::Authorization], "capture")?;
        if let Some(amount) = amount {
            let money = amount.money();
            self.amount.assert_same_currency(money)?;
            if money.value != self.amount.value {
                return Err(PaymentError::InvalidAmount(format!(
                    "capture of {} does not match authorized amount {}",
                    money, self.amount
                )));
            }
        }
        self.state = PaymentState::Completed;
        Ok(())
    }

    /// Commits a void: `Authorization -> AuthorizationVoided`.
    pub fn void(&mut self) -> Result<()> {
        self.assert_state(&[PaymentState::Authorization], "void")?;
        self.state = PaymentState::AuthorizationVoided;
        Ok(())
    }

    /// Commits a refund. Defaults to the outstanding balance. A running total
    /// equal to `amount` resolves to `Refunded`, anything below it to
    /// `PartiallyRefunded`. Returns the amount actually applied.
    pub fn refund(&mut self, amount: Option<&Amount>) -> Result<Money> {
        self.assert_state(
            &[PaymentState::Completed, PaymentState::PartiallyRefunded],
            "refund",
        )?;
        let outstanding = self.refundable_amount();
        let applied = match amount {
            Some(amount) => {
                let money = amount.money();
                self.amount.assert_same_currency(money)?;
                if money.value > outstanding.value {
                    return Err(PaymentError::InvalidAmount(format!(
                        "refund of {} exceeds refundable balance {}",
                        money, outstanding
                    )));
                }
                money.clone()
            }
            None => {
                if !outstanding.is_positive() {
                    return Err(PaymentError::InvalidAmount(format!(
                        "nothing left to refund on payment '{}'",
                        self.id
                    )));
                }
                outstanding
            }
        };
        self.refunded_amount = self.refunded_amount.checked_add(&applied)?;
        self.state = if self.refunded_amount.value < self.amount.value {
            PaymentState::PartiallyRefunded
        } else {
            PaymentState::Refunded
        };
        Ok(applied)
    }

    /// Drives the payment to `Failed` after a hard decline or an authorisation
    /// rejection. Returns `false` when the payment already reached a terminal
    /// state (duplicate notifications are a no-op).
    pub fn mark_failed(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = PaymentState::Failed;
        true
    }

    /// Applies an authorisation rejection arriving out of band: `New` or
    /// `Authorization` -> `Failed`. Anything else is a no-op; a stale
    /// rejection must not clobber the bookkeeping of a payment that already
    /// captured funds.
    pub fn reject_authorization(&mut self) -> bool {
        if matches!(self.state, PaymentState::New | PaymentState::Authorization) {
            self.state = PaymentState::Failed;
            true
        } else {
            false
        }
    }

    /// Applies a capture confirmation arriving out of band:
    /// `Authorization -> Completed`. Anything else is a no-op.
    pub fn confirm_capture(&mut self) -> bool {
        if self.state == PaymentState::Authorization {
            self.state = PaymentState::Completed;
            true
        } else {
            false
        }
    }

    /// Winds a rejected capture back to the prior stable state:
    /// `Completed -> Authorization`. Anything else is a no-op.
    pub fn reverse_capture(&mut self) -> bool {
        if self.state == PaymentState::Completed {
            self.state = PaymentState::Authorization;
            true
        } else {
            false
        }
    }

    /// Winds back the bookkeeping of a rejected refund. Without an amount the
    /// full refunded total is reversed. Amounts that do not fit the current
    /// bookkeeping are treated as already applied and ignored.
    pub fn reverse_refund(&mut self, amount: Option<&Money>) -> Result<bool> {
        if !matches!(
            self.state,
            PaymentState::PartiallyRefunded | PaymentState::Refunded
        ) {
            return Ok(false);
        }
        let reversed = match amount {
            Some(money) => {
                self.amount.assert_same_currency(money)?;
                money.clone()
            }
            None => self.refunded_amount.clone(),
        };
        if !reversed.is_positive() || reversed.value > self.refunded_amount.value {
            return Ok(false);
        }
        self.refunded_amount = self.refunded_amount.checked_sub(&reversed)?;
        self.state = if self.refunded_amount.is_zero() {
            PaymentState::Completed
        } else {
            PaymentState::PartiallyRefunded
        };
        Ok(true)
    }

    /// Applies an out-of-band cancellation: `Authorization ->
    /// AuthorizationVoided`. Anything else is a no-op.
    pub fn cancel(&mut self) -> bool {
        if self.state == PaymentState::Authorization {
            self.state = PaymentState::AuthorizationVoided;
            true
        } else {
            false
        }
    }
}
