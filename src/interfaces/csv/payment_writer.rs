use crate::domain::payment::Payment;
use crate::error::Result;
use std::io::Write;

/// Writes final payment states as CSV.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    pub fn write_payments(mut self, payments: Vec<Payment>) -> Result<()> {
        self.writer.write_record([
            "payment", "state", "amount", "currency", "refunded", "remote",
        ])?;
        for payment in payments {
            self.writer.write_record([
                payment.id.as_str(),
                payment.state.as_str(),
                &payment.amount.value.to_string(),
                payment.amount.currency.as_str(),
                &payment.refunded_amount.value.to_string(),
                payment.remote_id.as_deref().unwrap_or(""),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
