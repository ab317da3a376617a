pub mod chain;
pub mod game;

pub use chain::{fund, init_chain, mine, send, show_balance, show_events};
pub use game::{
    commit, create_game, finalize, list_games, reveal, show_game_status, withdraw, CreateArgs,
};

use crate::config::CliConfig;
use anyhow::{anyhow, Context as _, Result};
use std::str::FromStr;
use twothirds_core::{Address, SnapshotStore, Storage};
use twothirds_game::{Host, Receipt, Transaction, SNAPSHOT_NAME};

/// Everything a command needs: paths and the open database
pub struct Context {
    pub config: CliConfig,
    pub storage: Storage,
}

impl Context {
    pub async fn open(config: CliConfig) -> Result<Self> {
        tokio::fs::create_dir_all(config.data_dir()).await?;
        let storage = Storage::new(&config.db_path())
            .await
            .with_context(|| format!("opening {}", config.db_path().display()))?;
        Ok(Self { config, storage })
    }

    async fn ensure_chain(&self) -> Result<()> {
        let exists = SnapshotStore::new(&self.storage)
            .snapshot_exists(SNAPSHOT_NAME)
            .await?;
        if !exists {
            return Err(anyhow!(
                "No chain in {}. Run 'twothirds init <operator>' first",
                self.config.data_dir().display()
            ));
        }
        Ok(())
    }

    /// Read-only copy of the stored chain
    pub async fn load_host(&self) -> Result<Host> {
        self.ensure_chain().await?;
        Ok(Host::load(&self.storage).await?)
    }

    /// Replace the stored chain outright. Only `init` does this.
    pub async fn save_host(&self, host: &Host) -> Result<()> {
        host.save(&self.storage).await?;
        Ok(())
    }

    /// Run `f` against the stored chain under the database write lock and
    /// persist the result. Concurrent invocations against the same data
    /// directory are applied one after another; when `f` fails nothing is
    /// written.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Host) -> Result<R>) -> Result<R> {
        self.ensure_chain().await?;
        SnapshotStore::new(&self.storage)
            .update_snapshot(SNAPSHOT_NAME, |host: &mut Host| {
                host.config().validate()?;
                let result = f(host)?;
                Ok((host.height(), result))
            })
            .await
    }

    /// Execute `tx` against the stored chain and persist the result
    pub async fn submit(&self, tx: Transaction) -> Result<(Host, Receipt)> {
        self.update(|host| {
            let receipt = host.execute(tx)?;
            Ok((host.clone(), receipt))
        })
        .await
    }
}

/// Account names map to fixed addresses; `0x` strings are taken literally
pub fn account(name: &str) -> Result<Address> {
    if name.starts_with("0x") {
        Ok(Address::from_str(name)?)
    } else {
        Ok(Address::from_label(name))
    }
}

/// A game is named by its registry index or its address
pub fn resolve_game(host: &Host, reference: &str) -> Result<Address> {
    if let Ok(index) = reference.parse::<usize>() {
        return host.registry().instance(index).ok_or_else(|| {
            anyhow!(
                "No game #{} (registry has {})",
                index,
                host.registry().count()
            )
        });
    }
    let address = Address::from_str(reference)?;
    host.game(&address)?;
    Ok(address)
}

pub fn print_receipt(receipt: &Receipt) {
    println!("Included in block {}", receipt.height);
    for record in &receipt.events {
        println!("  #{} {}", record.seq, record.event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use twothirds_core::ChainConfig;
    use twothirds_game::{Call, GameParams};
    use bitcoin::Amount;

    fn config(dir: &std::path::Path) -> CliConfig {
        CliConfig::new(Some(dir.to_path_buf()), false)
    }

    #[test]
    fn test_account_names() {
        let alice = account("alice").unwrap();
        assert_eq!(alice, Address::from_label("alice"));
        assert_eq!(account(&alice.to_string()).unwrap(), alice);
        assert!(account("0xnothex").is_err());
    }

    #[tokio::test]
    async fn test_uninitialized_chain() {
        let dir = tempdir().unwrap();
        let ctx = Context::open(config(dir.path())).await.unwrap();
        let err = ctx.load_host().await.unwrap_err();
        assert!(err.to_string().contains("twothirds init"));
    }

    #[tokio::test]
    async fn test_submit_persists_and_resolves() {
        let dir = tempdir().unwrap();
        let ctx = Context::open(config(dir.path())).await.unwrap();
        let operator = account("operator").unwrap();
        ctx.save_host(&Host::new(ChainConfig::default(), operator).unwrap())
            .await
            .unwrap();

        let params = GameParams {
            entry_fee: Amount::from_sat(1_000),
            service_fee_percent: 10,
            deposit_percent: 50,
            commit_window: 10,
            reveal_window: 10,
            max_players: 3,
        };
        let (_, receipt) = ctx
            .submit(Transaction::new(operator, Call::CreateInstance(params)))
            .await
            .unwrap();
        let created = receipt.created_game().unwrap();

        let host = ctx.load_host().await.unwrap();
        assert_eq!(resolve_game(&host, "0").unwrap(), created);
        assert_eq!(resolve_game(&host, &created.to_string()).unwrap(), created);
        assert!(resolve_game(&host, "1").is_err());
        assert!(resolve_game(&host, &operator.to_string()).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_invocations_keep_every_transaction() {
        let dir = tempdir().unwrap();
        let operator = account("operator").unwrap();
        Context::open(config(dir.path()))
            .await
            .unwrap()
            .save_host(&Host::new(ChainConfig::default(), operator).unwrap())
            .await
            .unwrap();

        let params = GameParams {
            entry_fee: Amount::from_sat(1_000),
            service_fee_percent: 10,
            deposit_percent: 50,
            commit_window: 10,
            reveal_window: 10,
            max_players: 3,
        };

        // Two processes on one data directory, each with its own connection
        let mut handles = Vec::new();
        for _ in 0..2 {
            let cfg = config(dir.path());
            handles.push(tokio::spawn(async move {
                let ctx = Context::open(cfg).await.unwrap();
                let mut created = Vec::new();
                for _ in 0..5 {
                    let (_, receipt) = ctx
                        .submit(Transaction::new(operator, Call::CreateInstance(params)))
                        .await
                        .unwrap();
                    created.push(receipt.created_game().unwrap());
                }
                created
            }));
        }
        let mut created = Vec::new();
        for handle in handles {
            created.extend(handle.await.unwrap());
        }

        let host = Context::open(config(dir.path()))
            .await
            .unwrap()
            .load_host()
            .await
            .unwrap();
        assert_eq!(host.registry().count(), 10);
        for game in &created {
            assert!(host.game(game).is_ok());
        }
        // One block per accepted transaction, none overwritten
        assert_eq!(host.height(), 10);
    }

    #[tokio::test]
    async fn test_failed_update_writes_nothing() {
        let dir = tempdir().unwrap();
        let ctx = Context::open(config(dir.path())).await.unwrap();
        let operator = account("operator").unwrap();
        ctx.save_host(&Host::new(ChainConfig::default(), operator).unwrap())
            .await
            .unwrap();

        let other = Context::open(config(dir.path())).await.unwrap();
        let err = other
            .update(|host| {
                host.mine(3);
                Err::<(), _>(anyhow!("rejected"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "rejected");
        assert_eq!(ctx.load_host().await.unwrap().height(), 0);

        let height = other.update(|host| Ok(host.mine(2))).await.unwrap();
        assert_eq!(height, 2);
        assert_eq!(ctx.load_host().await.unwrap().height(), 2);
    }
}
