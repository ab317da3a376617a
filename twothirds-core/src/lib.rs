//! twothirds core - ledger primitives for the two-thirds guessing game
//!
//! Accounts, native value and the logical block clock live here, together with
//! sqlite persistence for ledger snapshots and players' commit openings. Game
//! logic is built on top of these in `twothirds-game`.

pub mod bank;
pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use bank::Bank;
pub use config::{ChainConfig, FaucetPolicy};
pub use error::{LedgerError, Result};
pub use storage::{CommitSecret, SecretStore, SnapshotStore, Storage};
pub use types::{parse_btc, percent_of, Address, BlockHeight};

pub use ::bitcoin::Amount;
