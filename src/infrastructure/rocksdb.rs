use crate::domain::payment::{Payment, PaymentState};
use crate::domain::ports::PaymentStore;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Column Family for storing payment states.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent payment store backed by RocksDB, values as JSON.
///
/// The expected-state guard is a read-compare-write under an internal mutex:
/// enough for the single-process model this crate assumes (concurrent
/// operations on the same payment must be serialized by the caller anyway).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

fn internal(err: impl std::error::Error + Send + Sync + 'static) -> PaymentError {
    PaymentError::InternalError(Box::new(err))
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the payments column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payments]).map_err(internal)?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(CF_PAYMENTS).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(
                "payments column family not found",
            )))
        })
    }

    fn read(&self, id: &str) -> Result<Option<Payment>> {
        let cf = self.cf()?;
        match self.db.get_cf(cf, id.as_bytes()).map_err(internal)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(internal)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn get(&self, id: &str) -> Result<Option<Payment>> {
        self.read(id)
    }

    async fn save(&self, payment: Payment, expected: Option<PaymentState>) -> Result<()> {
        let _guard = self.write_guard.lock().expect("rocksdb write guard poisoned");
        if let Some(expected) = expected {
            let current = self.read(&payment.id)?.map(|p| p.state);
            if current != Some(expected) {
                return Err(PaymentError::StateConflict {
                    id: payment.id,
                    expected,
                });
            }
        }
        let cf = self.cf()?;
        let value = serde_json::to_vec(&payment).map_err(internal)?;
        self.db
            .put_cf(cf, payment.id.as_bytes(), value)
            .map_err(internal)?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Payment>> {
        let cf = self.cf()?;
        let mut payments = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(internal)?;
            payments.push(serde_json::from_slice(&value).map_err(internal)?);
        }
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn payment(id: &str) -> Payment {
        Payment::new(id, Money::new(dec!(100.00), "USD".parse().unwrap()))
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");
        assert!(store.db.cf_handle(CF_PAYMENTS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_roundtrip() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let mut p = payment("p1");
        p.authorize("R1", false).unwrap();
        store.save(p.clone(), None).await.unwrap();

        let retrieved = store.get("p1").await.unwrap().unwrap();
        assert_eq!(retrieved, p);
        assert!(store.get("p2").await.unwrap().is_none());
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rocksdb_expected_state_guard() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let mut p = payment("p1");
        p.authorize("R1", false).unwrap();
        store.save(p.clone(), None).await.unwrap();

        let stale = payment("p1");
        let result = store.save(stale, Some(PaymentState::New)).await;
        assert!(matches!(result, Err(PaymentError::StateConflict { .. })));

        p.capture(None).unwrap();
        store
            .save(p, Some(PaymentState::Authorization))
            .await
            .unwrap();
        assert_eq!(
            store.get("p1").await.unwrap().unwrap().state,
            PaymentState::Completed
        );
    }
}
