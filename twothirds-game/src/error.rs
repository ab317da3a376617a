use thiserror::Error;
use twothirds_core::{Address, LedgerError};

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Caller is not the operator")]
    NotOperator,

    #[error("Game is not in the commit phase")]
    NotInCommitPhase,

    #[error("Game is not in the reveal phase")]
    NotInRevealPhase,

    #[error("Reveal phase has not ended yet")]
    RevealPhaseNotOver,

    #[error("Maximum number of players reached")]
    CapacityReached,

    #[error("Player has already committed")]
    AlreadyCommitted,

    #[error("Player has already revealed")]
    AlreadyRevealed,

    #[error("Game has already been finalized")]
    AlreadyFinalized,

    #[error("Wrong value: expected {expected} sats, got {actual} sats")]
    WrongValue { expected: u64, actual: u64 },

    #[error("Number {0} is out of range (0-1000)")]
    OutOfRange(u64),

    #[error("Revealed number and salt do not match the commitment")]
    HashMismatch,

    #[error("No commitment found for caller")]
    NoCommitment,

    #[error("Nothing owed to caller")]
    NothingOwed,

    #[error("Direct value transfers to a game are not allowed")]
    DirectTransferNotAllowed,

    #[error("Invalid game parameter: {0}")]
    InvalidParameter(String),

    #[error("Game not found: {0}")]
    GameNotFound(Address),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error categories, one per failure class a caller can react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Phase,
    Capacity,
    StateConflict,
    Validation,
    Funds,
    Invariant,
    Ledger,
}

impl GameError {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NotOperator => ErrorKind::Authorization,
            GameError::NotInCommitPhase
            | GameError::NotInRevealPhase
            | GameError::RevealPhaseNotOver => ErrorKind::Phase,
            GameError::CapacityReached => ErrorKind::Capacity,
            GameError::AlreadyCommitted
            | GameError::AlreadyRevealed
            | GameError::AlreadyFinalized => ErrorKind::StateConflict,
            GameError::WrongValue { .. }
            | GameError::OutOfRange(_)
            | GameError::HashMismatch
            | GameError::NoCommitment
            | GameError::InvalidParameter(_)
            | GameError::GameNotFound(_) => ErrorKind::Validation,
            GameError::NothingOwed => ErrorKind::Funds,
            GameError::DirectTransferNotAllowed | GameError::Internal(_) => ErrorKind::Invariant,
            GameError::Ledger(LedgerError::InsufficientFunds { .. }) => ErrorKind::Funds,
            GameError::Ledger(_) => ErrorKind::Ledger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(GameError::NotOperator.kind(), ErrorKind::Authorization);
        assert_eq!(GameError::RevealPhaseNotOver.kind(), ErrorKind::Phase);
        assert_eq!(GameError::CapacityReached.kind(), ErrorKind::Capacity);
        assert_eq!(GameError::AlreadyFinalized.kind(), ErrorKind::StateConflict);
        assert_eq!(GameError::HashMismatch.kind(), ErrorKind::Validation);
        assert_eq!(GameError::NothingOwed.kind(), ErrorKind::Funds);
        assert_eq!(
            GameError::DirectTransferNotAllowed.kind(),
            ErrorKind::Invariant
        );
        assert_eq!(
            GameError::from(LedgerError::InsufficientFunds {
                need: 2,
                available: 1
            })
            .kind(),
            ErrorKind::Funds
        );
    }
}
