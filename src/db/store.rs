use tracing::debug;

use crate::client::prefs::{PreferenceStore, StoreError};
use crate::db::{service::DbService, DbPool};

/// Durable [`PreferenceStore`] backed by the DuckDB `preferences` table.
#[derive(Clone)]
pub struct DuckDbStore {
    pool: DbPool,
}

impl DuckDbStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, duckdb::Connection>, StoreError> {
        self.pool
            .lock()
            .map_err(|_| StoreError::Backend("preference store lock poisoned".to_string()))
    }
}

impl PreferenceStore for DuckDbStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let pref = DbService::get_preference(&conn, key)?;
        Ok(pref.map(|p| p.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        debug!(key, "Writing preference");
        DbService::set_preference(&conn, key, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        DbService::delete_preference(&conn, key)?;
        Ok(())
    }
}
