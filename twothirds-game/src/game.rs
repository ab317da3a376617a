use crate::commitment::{Commitment, Guess};
use crate::events::Event;
use crate::player::{PlayerRecord, PlayerState};
use crate::{GameError, Result};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use twothirds_core::{percent_of, Address, BlockHeight};

/// Largest number a player may guess
pub const MAX_GUESS: u64 = 1000;
pub const MIN_PHASE_WINDOW: u64 = 10;
pub const MIN_PLAYERS: u32 = 3;

/// Phase derived from the logical clock. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Commit = 0,
    Reveal = 1,
    Finalizable = 2,
}

impl Phase {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Construction parameters of a game, as passed to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameParams {
    pub entry_fee: Amount,
    pub service_fee_percent: u8,
    pub deposit_percent: u8,
    pub commit_window: u64,
    pub reveal_window: u64,
    pub max_players: u32,
}

impl GameParams {
    pub fn validate(&self) -> Result<()> {
        if self.entry_fee == Amount::ZERO {
            return Err(GameError::invalid_parameter("entry fee must be greater than 0"));
        }
        if !(1..=100).contains(&self.service_fee_percent) {
            return Err(GameError::invalid_parameter(format!(
                "service fee percent must be between 1 and 100, got {}",
                self.service_fee_percent
            )));
        }
        if !(1..=100).contains(&self.deposit_percent) {
            return Err(GameError::invalid_parameter(format!(
                "deposit percent must be between 1 and 100, got {}",
                self.deposit_percent
            )));
        }
        if self.commit_window < MIN_PHASE_WINDOW {
            return Err(GameError::invalid_parameter(format!(
                "commit window must be at least {} blocks, got {}",
                MIN_PHASE_WINDOW, self.commit_window
            )));
        }
        if self.reveal_window < MIN_PHASE_WINDOW {
            return Err(GameError::invalid_parameter(format!(
                "reveal window must be at least {} blocks, got {}",
                MIN_PHASE_WINDOW, self.reveal_window
            )));
        }
        if self.max_players < MIN_PLAYERS {
            return Err(GameError::invalid_parameter(format!(
                "at least {} players required, got {}",
                MIN_PLAYERS, self.max_players
            )));
        }
        // A full game must not overflow the pot
        self.entry_fee
            .checked_mul(u64::from(self.max_players))
            .ok_or_else(|| GameError::invalid_parameter("entry fee times max players overflows"))?;
        Ok(())
    }
}

/// How a finalized game was settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Won {
        winner: Address,
        winning_number: u64,
        target: u64,
        payout: Amount,
        service_fee: Amount,
        forfeited: Amount,
    },
    /// Nobody revealed: entry fees go back to every committed player
    Refunded {
        players: u32,
        refund_each: Amount,
        forfeited: Amount,
    },
}

/// Receives value leaving a game during `withdraw`.
pub trait Payout {
    /// Transfer `amount` to `to`. `game` is the state with the owed entry
    /// already cleared, which is all a re-entrant caller can observe.
    fn pay(&mut self, game: &Game, to: &Address, amount: Amount) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    address: Address,
    registry: Address,
    operator: Address,
    entry_fee: Amount,
    service_fee_percent: u8,
    deposit_percent: u8,
    deposit_amount: Amount,
    commit_deadline: BlockHeight,
    reveal_deadline: BlockHeight,
    max_players: u32,

    pot: Amount,
    total_players: u32,
    executed: bool,
    winner: Option<Address>,
    outcome: Option<Outcome>,

    players: BTreeMap<Address, PlayerRecord>,
    commit_order: Vec<Address>,
    reveal_order: Vec<Address>,
    owed: BTreeMap<Address, Amount>,
}

impl Game {
    /// Validate `params` and open the commit phase at `now`
    pub fn new(
        address: Address,
        registry: Address,
        operator: Address,
        params: GameParams,
        now: BlockHeight,
    ) -> Result<Self> {
        params.validate()?;

        let deposit_amount = percent_of(params.entry_fee, params.deposit_percent)?;
        params
            .entry_fee
            .checked_add(deposit_amount)
            .ok_or_else(|| GameError::invalid_parameter("entry fee plus deposit overflows"))?;

        let commit_deadline = now
            .checked_add(params.commit_window)
            .ok_or_else(|| GameError::invalid_parameter("commit deadline overflows"))?;
        let reveal_deadline = commit_deadline
            .checked_add(params.reveal_window)
            .ok_or_else(|| GameError::invalid_parameter("reveal deadline overflows"))?;

        Ok(Self {
            address,
            registry,
            operator,
            entry_fee: params.entry_fee,
            service_fee_percent: params.service_fee_percent,
            deposit_percent: params.deposit_percent,
            deposit_amount,
            commit_deadline,
            reveal_deadline,
            max_players: params.max_players,
            pot: Amount::ZERO,
            total_players: 0,
            executed: false,
            winner: None,
            outcome: None,
            players: BTreeMap::new(),
            commit_order: Vec::new(),
            reveal_order: Vec::new(),
            owed: BTreeMap::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registry(&self) -> Address {
        self.registry
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn entry_fee(&self) -> Amount {
        self.entry_fee
    }

    pub fn service_fee_percent(&self) -> u8 {
        self.service_fee_percent
    }

    pub fn deposit_percent(&self) -> u8 {
        self.deposit_percent
    }

    pub fn deposit_amount(&self) -> Amount {
        self.deposit_amount
    }

    /// Exact value `commit` must carry
    pub fn commit_value(&self) -> Amount {
        self.entry_fee
            .checked_add(self.deposit_amount)
            .unwrap_or(Amount::MAX)
    }

    pub fn commit_deadline(&self) -> BlockHeight {
        self.commit_deadline
    }

    pub fn reveal_deadline(&self) -> BlockHeight {
        self.reveal_deadline
    }

    pub fn max_players(&self) -> u32 {
        self.max_players
    }

    pub fn total_players(&self) -> u32 {
        self.total_players
    }

    pub fn executed(&self) -> bool {
        self.executed
    }

    pub fn pot(&self) -> Amount {
        self.pot
    }

    pub fn winner(&self) -> Option<Address> {
        self.winner
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn phase(&self, now: BlockHeight) -> Phase {
        if now < self.commit_deadline {
            Phase::Commit
        } else if now < self.reveal_deadline {
            Phase::Reveal
        } else {
            Phase::Finalizable
        }
    }

    pub fn current_phase(&self, now: BlockHeight) -> u8 {
        self.phase(now).as_u8()
    }

    pub fn owed_balance(&self, address: &Address) -> Amount {
        self.owed.get(address).copied().unwrap_or(Amount::ZERO)
    }

    pub fn deposit(&self, address: &Address) -> Amount {
        self.players
            .get(address)
            .map_or(Amount::ZERO, |p| p.deposit())
    }

    pub fn has_revealed(&self, address: &Address) -> bool {
        self.players
            .get(address)
            .map_or(false, |p| p.has_revealed())
    }

    pub fn commitment(&self, address: &Address) -> Option<&Commitment> {
        self.players.get(address).map(|p| p.commitment())
    }

    pub fn revealed_value(&self, address: &Address) -> Option<u64> {
        self.players.get(address).and_then(|p| p.revealed_value())
    }

    pub fn player(&self, address: &Address) -> Option<&PlayerRecord> {
        self.players.get(address)
    }

    /// Players in commit order
    pub fn players(&self) -> impl Iterator<Item = (&Address, &PlayerRecord)> {
        self.commit_order
            .iter()
            .filter_map(move |addr| self.players.get(addr).map(|p| (addr, p)))
    }

    /// Successful reveals, earliest first
    pub fn reveal_order(&self) -> &[Address] {
        &self.reveal_order
    }

    pub fn owed_balances(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.owed.iter()
    }

    /// Value this game must hold: open deposits, owed balances and, until
    /// settlement, the pot.
    pub fn custodied(&self) -> Amount {
        let deposits = self
            .players
            .values()
            .map(|p| p.deposit().to_sat())
            .sum::<u64>();
        let owed = self.owed.values().map(|a| a.to_sat()).sum::<u64>();
        let pot = if self.executed { 0 } else { self.pot.to_sat() };
        Amount::from_sat(deposits + owed + pot)
    }

    /// Commit a hidden guess, paying entry fee plus deposit
    pub fn commit(
        &mut self,
        caller: &Address,
        commitment: Commitment,
        value: Amount,
        now: BlockHeight,
    ) -> Result<Event> {
        if self.phase(now) != Phase::Commit {
            return Err(GameError::NotInCommitPhase);
        }
        if self.total_players >= self.max_players {
            return Err(GameError::CapacityReached);
        }
        if self.players.contains_key(caller) {
            return Err(GameError::AlreadyCommitted);
        }
        let expected = self.commit_value();
        if value != expected {
            return Err(GameError::WrongValue {
                expected: expected.to_sat(),
                actual: value.to_sat(),
            });
        }

        let pot = self
            .pot
            .checked_add(self.entry_fee)
            .ok_or_else(|| GameError::internal("pot overflow"))?;

        self.players
            .insert(*caller, PlayerRecord::new(commitment, self.deposit_amount));
        self.commit_order.push(*caller);
        self.pot = pot;
        self.total_players += 1;

        tracing::info!(
            "Player {} committed to game {} ({}/{})",
            caller,
            self.address,
            self.total_players,
            self.max_players
        );

        Ok(Event::Committed {
            game: self.address,
            player: *caller,
            commitment,
        })
    }

    /// Open a commitment. The deposit becomes withdrawable immediately.
    pub fn reveal(
        &mut self,
        caller: &Address,
        number: u64,
        salt: &str,
        now: BlockHeight,
    ) -> Result<Event> {
        if self.phase(now) != Phase::Reveal {
            return Err(GameError::NotInRevealPhase);
        }
        let owed = self.owed_balance(caller);
        let player = self.players.get_mut(caller).ok_or(GameError::NoCommitment)?;
        if player.has_revealed() {
            return Err(GameError::AlreadyRevealed);
        }
        if number > MAX_GUESS {
            return Err(GameError::OutOfRange(number));
        }
        if !player.opens_with(&Guess::new(number, salt)) {
            return Err(GameError::HashMismatch);
        }

        let credited = owed
            .checked_add(player.deposit())
            .ok_or_else(|| GameError::internal("owed balance overflow"))?;
        let refund = player.reveal(number);
        self.owed.insert(*caller, credited);
        self.reveal_order.push(*caller);

        tracing::info!(
            "Player {} revealed in game {}; {} sats deposit refunded",
            caller,
            self.address,
            refund.to_sat()
        );

        Ok(Event::Revealed {
            game: self.address,
            player: *caller,
            number,
        })
    }

    /// Settle the game once the reveal phase is over. Callable by anyone, once.
    pub fn finalize(&mut self, now: BlockHeight) -> Result<Event> {
        if self.phase(now) != Phase::Finalizable {
            return Err(GameError::RevealPhaseNotOver);
        }
        if self.executed {
            return Err(GameError::AlreadyFinalized);
        }

        // Stage every credit first so a failure leaves the game untouched
        let mut owed = self.owed.clone();

        let unrevealed: Vec<Address> = self
            .commit_order
            .iter()
            .filter(|addr| !self.has_revealed(addr))
            .copied()
            .collect();
        let forfeited = unrevealed
            .iter()
            .map(|addr| self.deposit(addr).to_sat())
            .sum::<u64>();
        let forfeited = Amount::from_sat(forfeited);
        credit(&mut owed, self.operator, forfeited)?;

        let revealed: Vec<(Address, u64)> = self
            .reveal_order
            .iter()
            .filter_map(|addr| self.revealed_value(addr).map(|value| (*addr, value)))
            .collect();

        let (outcome, event) = if revealed.is_empty() {
            for addr in &self.commit_order {
                credit(&mut owed, *addr, self.entry_fee)?;
            }

            tracing::warn!(
                "Game {} finalized without reveals; refunding {} players",
                self.address,
                self.total_players
            );

            (
                Outcome::Refunded {
                    players: self.total_players,
                    refund_each: self.entry_fee,
                    forfeited,
                },
                Event::GameRefunded {
                    game: self.address,
                    players: self.total_players,
                    refund_each: self.entry_fee,
                    forfeited,
                },
            )
        } else {
            let (winner, winning_number, target) = select_winner(&revealed)
                .ok_or_else(|| GameError::internal("no revealed players"))?;

            let service_fee = percent_of(self.pot, self.service_fee_percent)?;
            let payout = self
                .pot
                .checked_sub(service_fee)
                .ok_or_else(|| GameError::internal("service fee exceeds pot"))?;
            credit(&mut owed, self.operator, service_fee)?;
            credit(&mut owed, winner, payout)?;

            tracing::info!(
                "Game {} finalized: target {}, winner {} guessed {} and receives {} sats",
                self.address,
                target,
                winner,
                winning_number,
                payout.to_sat()
            );

            (
                Outcome::Won {
                    winner,
                    winning_number,
                    target,
                    payout,
                    service_fee,
                    forfeited,
                },
                Event::GameFinalized {
                    game: self.address,
                    winner,
                    winning_number,
                    payout,
                },
            )
        };

        for addr in &unrevealed {
            if let Some(player) = self.players.get_mut(addr) {
                player.forfeit();
            }
        }
        self.owed = owed;
        if let Outcome::Won { winner, .. } = &outcome {
            self.winner = Some(*winner);
        }
        self.outcome = Some(outcome);
        self.executed = true;

        Ok(event)
    }

    /// Pull everything owed to `caller`. The ledger entry is cleared before
    /// the transfer and restored if the transfer fails.
    pub fn withdraw<P: Payout + ?Sized>(&mut self, caller: &Address, payout: &mut P) -> Result<Event> {
        let amount = self.owed_balance(caller);
        if amount == Amount::ZERO {
            return Err(GameError::NothingOwed);
        }

        self.owed.remove(caller);

        if let Err(e) = payout.pay(self, caller, amount) {
            self.owed.insert(*caller, amount);
            tracing::warn!(
                "Withdrawal of {} sats from game {} to {} failed: {}",
                amount.to_sat(),
                self.address,
                caller,
                e
            );
            return Err(e);
        }

        tracing::info!(
            "Withdrew {} sats from game {} to {}",
            amount.to_sat(),
            self.address,
            caller
        );

        Ok(Event::Withdrawn {
            game: self.address,
            recipient: *caller,
            amount,
        })
    }

    /// Value sent outside `commit` is always refused
    pub fn receive(&self, _value: Amount) -> Result<()> {
        Err(GameError::DirectTransferNotAllowed)
    }

    pub fn get_info(&self, now: BlockHeight) -> GameInfo {
        GameInfo {
            address: self.address,
            operator: self.operator,
            entry_fee: self.entry_fee,
            service_fee_percent: self.service_fee_percent,
            deposit_percent: self.deposit_percent,
            deposit_amount: self.deposit_amount,
            commit_deadline: self.commit_deadline,
            reveal_deadline: self.reveal_deadline,
            max_players: self.max_players,
            total_players: self.total_players,
            phase: self.phase(now),
            executed: self.executed,
            pot: self.pot,
            winner: self.winner,
            winning_number: self.winner.and_then(|w| self.revealed_value(&w)),
        }
    }

    pub fn player_state(&self, address: &Address) -> Option<PlayerState> {
        self.player(address).map(|p| p.state())
    }
}

fn credit(owed: &mut BTreeMap<Address, Amount>, to: Address, amount: Amount) -> Result<()> {
    if amount == Amount::ZERO {
        return Ok(());
    }
    let current = owed.get(&to).copied().unwrap_or(Amount::ZERO);
    let updated = current
        .checked_add(amount)
        .ok_or_else(|| GameError::internal("owed balance overflow"))?;
    owed.insert(to, updated);
    Ok(())
}

/// Closest guess to two-thirds of the average. `revealed` is in reveal order,
/// so ties go to the earliest reveal. Returns `(winner, number, target)`.
pub fn select_winner(revealed: &[(Address, u64)]) -> Option<(Address, u64, u64)> {
    if revealed.is_empty() {
        return None;
    }
    let sum: u64 = revealed.iter().map(|(_, value)| value).sum();
    let average = sum / revealed.len() as u64;
    let target = 2 * average / 3;

    revealed
        .iter()
        .min_by_key(|(_, value)| value.abs_diff(target))
        .map(|(addr, value)| (*addr, *value, target))
}

/// Game info for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInfo {
    pub address: Address,
    pub operator: Address,
    pub entry_fee: Amount,
    pub service_fee_percent: u8,
    pub deposit_percent: u8,
    pub deposit_amount: Amount,
    pub commit_deadline: BlockHeight,
    pub reveal_deadline: BlockHeight,
    pub max_players: u32,
    pub total_players: u32,
    pub phase: Phase,
    pub executed: bool,
    pub pot: Amount,
    pub winner: Option<Address>,
    pub winning_number: Option<u64>,
}
