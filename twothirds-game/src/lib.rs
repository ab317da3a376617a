//! Two-thirds of the average guessing game
//!
//! Players commit a salted hash of a number in 0..=1000 together with an
//! entry fee and a refundable deposit, reveal it once commits close, and the
//! revealed number closest to two-thirds of the average takes the pot minus
//! the operator's service fee. Payouts are pulled with `withdraw`.
//!
//! Games are created by a [`Registry`] and run on a [`Host`], a deterministic
//! ledger with a logical block clock. [`Node`] shares a host between threads.

pub mod commitment;
pub mod error;
pub mod events;
pub mod game;
pub mod host;
pub mod node;
pub mod player;
pub mod registry;

pub use commitment::{generate_salt, Commitment, CommitmentScheme, Guess, PackedSha256};
pub use error::{ErrorKind, GameError, Result};
pub use events::{Event, EventRecord};
pub use game::{Game, GameInfo, GameParams, Outcome, Payout, Phase, MAX_GUESS};
pub use host::{Call, Host, Receipt, Transaction, SNAPSHOT_NAME};
pub use node::Node;
pub use player::{PlayerRecord, PlayerState};
pub use registry::Registry;
