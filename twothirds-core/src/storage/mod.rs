pub mod secret_store;
pub mod snapshot_store;

pub use secret_store::{CommitSecret, SecretStore};
pub use snapshot_store::SnapshotStore;

use crate::error::{LedgerError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

const BUSY_TIMEOUT_SECS: u64 = 10;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        // Other CLI processes may hold the write lock briefly
        conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    /// Throwaway database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Serialized ledger state, one row per named snapshot
        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                name TEXT PRIMARY KEY,
                height INTEGER NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Client-side keystore for commit openings
        conn.execute(
            "CREATE TABLE IF NOT EXISTS commit_secrets (
                game TEXT NOT NULL,
                player TEXT NOT NULL,
                number INTEGER NOT NULL,
                salt TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (game, player)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
