use crate::error::{LedgerError, Result};
use crate::storage::Storage;
use crate::types::BlockHeight;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct SnapshotStore<'a> {
    storage: &'a Storage,
}

impl<'a> SnapshotStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_snapshot<T: Serialize>(
        &self,
        name: &str,
        height: BlockHeight,
        state: &T,
    ) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let data = serde_json::to_string(state)?;

        conn.execute(
            "INSERT OR REPLACE INTO snapshots (name, height, data, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, height as i64, data, Utc::now().timestamp()],
        )?;

        tracing::debug!("Saved snapshot '{}' at height {}", name, height);
        Ok(())
    }

    pub async fn load_snapshot<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let conn = self.storage.get_connection().await;

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM snapshots WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        let data = data.ok_or_else(|| LedgerError::SnapshotNotFound(name.to_string()))?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Load a snapshot, let `f` modify it, and write it back inside one
    /// immediate transaction. Writers on other connections to the same file
    /// wait on the sqlite write lock, so no update is lost between load and
    /// save. Nothing is written when `f` fails.
    pub async fn update_snapshot<T, R, E, F>(&self, name: &str, f: F) -> std::result::Result<R, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<LedgerError>,
        F: FnOnce(&mut T) -> std::result::Result<(BlockHeight, R), E>,
    {
        let mut conn = self.storage.get_connection().await;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(LedgerError::from)?;

        let data: Option<String> = tx
            .query_row(
                "SELECT data FROM snapshots WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(LedgerError::from)?;
        let data = data.ok_or_else(|| LedgerError::SnapshotNotFound(name.to_string()))?;
        let mut state: T = serde_json::from_str(&data).map_err(LedgerError::from)?;

        let (height, result) = f(&mut state)?;

        let data = serde_json::to_string(&state).map_err(LedgerError::from)?;
        tx.execute(
            "UPDATE snapshots SET height = ?2, data = ?3, updated_at = ?4 WHERE name = ?1",
            params![name, height as i64, data, Utc::now().timestamp()],
        )
        .map_err(LedgerError::from)?;
        tx.commit().map_err(LedgerError::from)?;

        tracing::debug!("Updated snapshot '{}' at height {}", name, height);
        Ok(result)
    }

    pub async fn snapshot_height(&self, name: &str) -> Result<Option<BlockHeight>> {
        let conn = self.storage.get_connection().await;

        let height: Option<i64> = conn
            .query_row(
                "SELECT height FROM snapshots WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(height.map(|h| h as BlockHeight))
    }

    pub async fn snapshot_exists(&self, name: &str) -> Result<bool> {
        Ok(self.snapshot_height(name).await?.is_some())
    }
}
