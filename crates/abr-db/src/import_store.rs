use crate::models::{ImportItemRecord, ImportItemStatus, ImportSessionRecord, ImportSessionStatus};
use crate::store::{DbError, Store};

impl Store {
    pub async fn create_import_session(
        &self,
        root_path: String,
        owner: String,
    ) -> Result<ImportSessionRecord, DbError> {
        let session = ImportSessionRecord::new(root_path, owner);
        let (_guard, rw) = self.rw().await?;
        rw.insert(session.clone())?;
        rw.commit()?;
        Ok(session)
    }

    pub fn get_import_session(&self, id: &str) -> Result<Option<ImportSessionRecord>, DbError> {
        let r = self.db().r_transaction()?;
        Ok(r.get().primary(id.to_string())?)
    }

    pub async fn set_import_session_status(
        &self,
        id: &str,
        status: ImportSessionStatus,
    ) -> Result<(), DbError> {
        let (_guard, rw) = self.rw().await?;
        let record: Option<ImportSessionRecord> = rw.get().primary(id.to_string())?;
        if let Some(mut record) = record {
            record.status = status;
            rw.upsert(record)?;
        }
        rw.commit()?;
        Ok(())
    }

    pub async fn add_import_item(&self, item: ImportItemRecord) -> Result<(), DbError> {
        let (_guard, rw) = self.rw().await?;
        rw.insert(item)?;
        rw.commit()?;
        Ok(())
    }

    pub fn items_for_session(&self, session_id: &str) -> Result<Vec<ImportItemRecord>, DbError> {
        let r = self.db().r_transaction()?;
        let items = r
            .scan()
            .primary::<ImportItemRecord>()?
            .all()?
            .filter_map(|i| i.ok())
            .filter(|i| i.session_id == session_id)
            .collect();
        Ok(items)
    }

    pub fn items_for_session_with_status(
        &self,
        session_id: &str,
        status: ImportItemStatus,
    ) -> Result<Vec<ImportItemRecord>, DbError> {
        Ok(self
            .items_for_session(session_id)?
            .into_iter()
            .filter(|i| i.status == status)
            .collect())
    }

    pub async fn save_import_item(&self, item: ImportItemRecord) -> Result<(), DbError> {
        let (_guard, rw) = self.rw().await?;
        rw.upsert(item)?;
        rw.commit()?;
        Ok(())
    }
}
