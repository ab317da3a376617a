use crate::commitment::Commitment;
use crate::game::GameParams;
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use twothirds_core::{Address, BlockHeight};

/// Records emitted by the registry and by game instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    GameCreated {
        game: Address,
        operator: Address,
        params: GameParams,
    },
    Committed {
        game: Address,
        player: Address,
        commitment: Commitment,
    },
    Revealed {
        game: Address,
        player: Address,
        number: u64,
    },
    GameFinalized {
        game: Address,
        winner: Address,
        winning_number: u64,
        payout: Amount,
    },
    /// Finalized with no reveals; every committed player got the entry fee back
    GameRefunded {
        game: Address,
        players: u32,
        refund_each: Amount,
        forfeited: Amount,
    },
    Withdrawn {
        game: Address,
        recipient: Address,
        amount: Amount,
    },
}

impl Event {
    /// Instance the record concerns
    pub fn game(&self) -> Address {
        match self {
            Event::GameCreated { game, .. }
            | Event::Committed { game, .. }
            | Event::Revealed { game, .. }
            | Event::GameFinalized { game, .. }
            | Event::GameRefunded { game, .. }
            | Event::Withdrawn { game, .. } => *game,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::GameCreated { .. } => "GameCreated",
            Event::Committed { .. } => "Committed",
            Event::Revealed { .. } => "Revealed",
            Event::GameFinalized { .. } => "GameFinalized",
            Event::GameRefunded { .. } => "GameRefunded",
            Event::Withdrawn { .. } => "Withdrawn",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::GameCreated { game, operator, params } => write!(
                f,
                "GameCreated game={} operator={} entry_fee={} service_fee={}% deposit={}% max_players={}",
                game,
                operator,
                params.entry_fee.to_sat(),
                params.service_fee_percent,
                params.deposit_percent,
                params.max_players
            ),
            Event::Committed { game, player, .. } => {
                write!(f, "Committed game={} player={}", game, player)
            }
            Event::Revealed { game, player, number } => {
                write!(f, "Revealed game={} player={} number={}", game, player, number)
            }
            Event::GameFinalized {
                game,
                winner,
                winning_number,
                payout,
            } => write!(
                f,
                "GameFinalized game={} winner={} number={} payout={}",
                game,
                winner,
                winning_number,
                payout.to_sat()
            ),
            Event::GameRefunded {
                game,
                players,
                refund_each,
                forfeited,
            } => write!(
                f,
                "GameRefunded game={} players={} refund_each={} forfeited={}",
                game,
                players,
                refund_each.to_sat(),
                forfeited.to_sat()
            ),
            Event::Withdrawn {
                game,
                recipient,
                amount,
            } => write!(
                f,
                "Withdrawn game={} recipient={} amount={}",
                game,
                recipient,
                amount.to_sat()
            ),
        }
    }
}

/// An event as sealed in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub height: BlockHeight,
    pub event: Event,
}
