pub mod scheme;

pub use scheme::{Commitment, CommitmentScheme};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A player's hidden guess and the salt blinding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guess {
    pub number: u64,
    pub salt: String,
}

impl Guess {
    pub fn new(number: u64, salt: impl Into<String>) -> Self {
        Self {
            number,
            salt: salt.into(),
        }
    }

    pub fn commitment(&self) -> Commitment {
        PackedSha256::commit(self)
    }
}

/// SHA-256 over the packed `(uint256 number, string salt)` encoding:
/// the number as a 32-byte big-endian word followed by the raw salt bytes.
pub struct PackedSha256;

impl CommitmentScheme for PackedSha256 {
    type Secret = Guess;
    type Commitment = Commitment;

    fn commit(secret: &Guess) -> Commitment {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&secret.number.to_be_bytes());

        let mut hasher = Sha256::new();
        hasher.update(word);
        hasher.update(secret.salt.as_bytes());
        Commitment::from_bytes(hasher.finalize().into())
    }
}

/// Random salt for a new commitment, hex encoded
pub fn generate_salt() -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_commitment_scheme() {
        let guess = Guess::new(500, "mysecret");
        let commitment = guess.commitment();

        assert!(PackedSha256::verify(&commitment, &guess));
        assert!(!PackedSha256::verify(&commitment, &Guess::new(500, "wrongsalt")));
        assert!(!PackedSha256::verify(&commitment, &Guess::new(501, "mysecret")));
    }

    #[test]
    fn test_number_is_a_full_word() {
        // "1" ++ "23" and "12" ++ "3" must not collide
        assert_ne!(
            Guess::new(1, "23").commitment(),
            Guess::new(12, "3").commitment()
        );
    }

    #[test]
    fn test_commitment_matches_packed_encoding() {
        let mut preimage = vec![0u8; 31];
        preimage.push(7);
        preimage.extend_from_slice(b"salt");
        let expected: [u8; 32] = Sha256::digest(&preimage).into();

        assert_eq!(Guess::new(7, "salt").commitment().as_bytes(), &expected);
    }

    #[test]
    fn test_commitment_hex_round_trip() {
        let commitment = Guess::new(42, "x").commitment();
        let parsed = Commitment::from_str(&commitment.to_string()).unwrap();
        assert_eq!(parsed, commitment);
        assert!(Commitment::from_str("0xdead").is_err());
    }

    #[test]
    fn test_generated_salts_differ() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
