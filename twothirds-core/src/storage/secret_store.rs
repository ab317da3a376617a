use crate::error::Result;
use crate::storage::Storage;
use crate::types::Address;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Opening of a commitment, kept by the player until reveal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSecret {
    pub game: Address,
    pub player: Address,
    pub number: u64,
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

pub struct SecretStore<'a> {
    storage: &'a Storage,
}

impl<'a> SecretStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_secret(&self, secret: &CommitSecret) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO commit_secrets (game, player, number, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                secret.game.to_string(),
                secret.player.to_string(),
                secret.number as i64,
                secret.salt,
                secret.created_at.timestamp(),
            ],
        )?;

        tracing::info!("Stored commit secret for {} in game {}", secret.player, secret.game);
        Ok(())
    }

    pub async fn load_secret(&self, game: &Address, player: &Address) -> Result<Option<CommitSecret>> {
        let conn = self.storage.get_connection().await;

        let row = conn
            .query_row(
                "SELECT number, salt, created_at FROM commit_secrets
                 WHERE game = ?1 AND player = ?2",
                params![game.to_string(), player.to_string()],
                |row| {
                    let number: i64 = row.get(0)?;
                    let salt: String = row.get(1)?;
                    let created_at: i64 = row.get(2)?;
                    Ok((number, salt, created_at))
                },
            )
            .optional()?;

        Ok(row.map(|(number, salt, created_at)| CommitSecret {
            game: *game,
            player: *player,
            number: number as u64,
            salt,
            created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
        }))
    }

    pub async fn delete_secret(&self, game: &Address, player: &Address) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "DELETE FROM commit_secrets WHERE game = ?1 AND player = ?2",
            params![game.to_string(), player.to_string()],
        )?;

        Ok(())
    }
}
