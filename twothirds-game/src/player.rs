use crate::commitment::{Commitment, CommitmentScheme, Guess, PackedSha256};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};

/// Player state in a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Committed,
    Revealed,
    /// Committed but never revealed; deposit swept at finalize
    Forfeited,
}

/// Per-player record. Its presence in a game is what "has committed" means;
/// no field doubles as an existence sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    commitment: Commitment,
    deposit: Amount,
    revealed_value: Option<u64>,
    state: PlayerState,
}

impl PlayerRecord {
    pub fn new(commitment: Commitment, deposit: Amount) -> Self {
        Self {
            commitment,
            deposit,
            revealed_value: None,
            state: PlayerState::Committed,
        }
    }

    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    pub fn deposit(&self) -> Amount {
        self.deposit
    }

    pub fn revealed_value(&self) -> Option<u64> {
        self.revealed_value
    }

    pub fn has_revealed(&self) -> bool {
        self.revealed_value.is_some()
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn opens_with(&self, guess: &Guess) -> bool {
        PackedSha256::verify(&self.commitment, guess)
    }

    /// Record the opened guess and release the deposit. Returns the released amount.
    pub(crate) fn reveal(&mut self, number: u64) -> Amount {
        self.revealed_value = Some(number);
        self.state = PlayerState::Revealed;
        std::mem::replace(&mut self.deposit, Amount::ZERO)
    }

    /// Give up the deposit of an unrevealed commitment. Returns the forfeited amount.
    pub(crate) fn forfeit(&mut self) -> Amount {
        self.state = PlayerState::Forfeited;
        std::mem::replace(&mut self.deposit, Amount::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_releases_deposit_once() {
        let guess = Guess::new(300, "salt1");
        let mut record = PlayerRecord::new(guess.commitment(), Amount::from_sat(50));

        assert!(record.opens_with(&guess));
        assert!(!record.has_revealed());

        assert_eq!(record.reveal(300), Amount::from_sat(50));
        assert_eq!(record.deposit(), Amount::ZERO);
        assert_eq!(record.revealed_value(), Some(300));
        assert_eq!(record.state(), PlayerState::Revealed);
    }

    #[test]
    fn test_zero_hash_commitment_still_counts() {
        let record = PlayerRecord::new(Commitment::from_bytes([0u8; 32]), Amount::from_sat(1));
        assert_eq!(record.commitment().as_bytes(), &[0u8; 32]);
        assert_eq!(record.state(), PlayerState::Committed);
    }

    #[test]
    fn test_forfeit() {
        let mut record = PlayerRecord::new(Guess::new(1, "a").commitment(), Amount::from_sat(9));
        assert_eq!(record.forfeit(), Amount::from_sat(9));
        assert_eq!(record.deposit(), Amount::ZERO);
        assert_eq!(record.state(), PlayerState::Forfeited);
    }
}
