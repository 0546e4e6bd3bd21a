use abr_config::{ConfigBackend, ConfigError};

use crate::models::ConfigEntryRecord;
use crate::store::Store;

impl ConfigBackend for Store {
    async fn backend_get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let r = self.db().r_transaction().map_err(|e| ConfigError::Backend(e.into()))?;
        let entry: Option<ConfigEntryRecord> = r
            .get()
            .primary(key.to_string())
            .map_err(|e| ConfigError::Backend(e.into()))?;
        Ok(entry.map(|e| e.value))
    }

    async fn backend_set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let (_guard, rw) = self.rw().await.map_err(|e| ConfigError::Backend(e.into()))?;
        rw.upsert(ConfigEntryRecord {
            key: key.to_string(),
            value: value.to_string(),
        })
        .map_err(|e| ConfigError::Backend(e.into()))?;
        rw.commit().map_err(|e| ConfigError::Backend(e.into()))?;
        Ok(())
    }

    async fn backend_delete(&self, key: &str) -> Result<(), ConfigError> {
        let (_guard, rw) = self.rw().await.map_err(|e| ConfigError::Backend(e.into()))?;
        let existing: Option<ConfigEntryRecord> = rw
            .get()
            .primary(key.to_string())
            .map_err(|e| ConfigError::Backend(e.into()))?;
        if let Some(existing) = existing {
            rw.remove(existing).map_err(|e| ConfigError::Backend(e.into()))?;
        }
        rw.commit().map_err(|e| ConfigError::Backend(e.into()))?;
        Ok(())
    }
}
