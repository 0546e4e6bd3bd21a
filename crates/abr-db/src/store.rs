use std::path::Path;

use native_db::Database;
use native_db::transaction::RwTransaction;
use tokio::sync::MutexGuard;
use tracing::instrument;

use crate::models::MODELS;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Native(#[from] native_db::db_type::Error),
    #[error("database write lock unavailable")]
    Busy,
}

/// Owns the `native_db` handle. Single-writer-per-row is enforced the
/// same way `mlm_db::DatabaseExt` does: a process-wide mutex serializes
/// `rw_transaction`s so two background tasks never race a write
/// transaction against each other.
pub struct Store {
    db: Database<'static>,
    write_lock: tokio::sync::Mutex<()>,
}

impl Store {
    #[instrument]
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let db = native_db::Builder::new().create(&MODELS, path)?;
        Ok(Self {
            db,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn open_in_memory() -> Result<Self, DbError> {
        let db = native_db::Builder::new().create_in_memory(&MODELS)?;
        Ok(Self {
            db,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn db(&self) -> &Database<'static> {
        &self.db
    }

    pub async fn rw(&self) -> Result<(MutexGuard<'_, ()>, RwTransaction<'_>), DbError> {
        let guard = self.write_lock.lock().await;
        let rw = self.db.rw_transaction()?;
        Ok((guard, rw))
    }

    pub fn rw_try(&self) -> Result<(MutexGuard<'_, ()>, RwTransaction<'_>), DbError> {
        let guard = self.write_lock.try_lock().map_err(|_| DbError::Busy)?;
        let rw = self.db.rw_transaction()?;
        Ok((guard, rw))
    }
}
