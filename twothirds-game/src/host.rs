use crate::commitment::Commitment;
use crate::events::{Event, EventRecord};
use crate::game::{Game, GameParams, Payout};
use crate::registry::Registry;
use crate::{GameError, Result};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use twothirds_core::{
    Address, Bank, BlockHeight, ChainConfig, LedgerError, SnapshotStore, Storage,
};

/// Snapshot row holding the serialized host
pub const SNAPSHOT_NAME: &str = "chain";

/// A call carried by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    CreateInstance(GameParams),
    Commit { game: Address, commitment: Commitment },
    Reveal { game: Address, number: u64, salt: String },
    Finalize { game: Address },
    Withdraw { game: Address },
    /// Plain value transfer
    Transfer { to: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub value: Amount,
    pub call: Call,
}

impl Transaction {
    pub fn new(from: Address, call: Call) -> Self {
        Self {
            from,
            value: Amount::ZERO,
            call,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}

/// Result of a successful transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub height: BlockHeight,
    pub events: Vec<EventRecord>,
}

impl Receipt {
    /// Address of the instance created by this transaction, if any
    pub fn created_game(&self) -> Option<Address> {
        self.events.iter().find_map(|record| match &record.event {
            Event::GameCreated { game, .. } => Some(*game),
            _ => None,
        })
    }
}

/// Sends withdrawals out of a game's bank account
struct BankPayout<'a> {
    bank: &'a mut Bank,
    from: Address,
}

impl Payout for BankPayout<'_> {
    fn pay(&mut self, _game: &Game, to: &Address, amount: Amount) -> Result<()> {
        self.bank.transfer(&self.from, to, amount)?;
        Ok(())
    }
}

/// Deterministic ledger the games run on: block clock, bank, registry,
/// instances and event log. Transactions apply atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    config: ChainConfig,
    height: BlockHeight,
    bank: Bank,
    registry: Registry,
    games: BTreeMap<Address, Game>,
    events: Vec<EventRecord>,
}

impl Host {
    /// Start a chain with a registry owned by `operator`
    pub fn new(config: ChainConfig, operator: Address) -> Result<Self> {
        config.validate()?;
        let registry = Registry::new(Address::derive(&operator, 0), operator);

        tracing::info!(
            "Started chain at height {} with registry {} (operator {})",
            config.genesis_height,
            registry.address(),
            operator
        );

        Ok(Self {
            height: config.genesis_height,
            config,
            bank: Bank::new(),
            registry,
            games: BTreeMap::new(),
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.bank.balance(address)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn game(&self, address: &Address) -> Result<&Game> {
        self.games
            .get(address)
            .ok_or(GameError::GameNotFound(*address))
    }

    /// Instances in creation order
    pub fn games(&self) -> impl Iterator<Item = &Game> {
        self.registry
            .list_instances()
            .iter()
            .filter_map(move |addr| self.games.get(addr))
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn events_for(&self, game: &Address) -> impl Iterator<Item = &EventRecord> {
        let game = *game;
        self.events.iter().filter(move |r| r.event.game() == game)
    }

    /// Advance the clock by `blocks` empty blocks
    pub fn mine(&mut self, blocks: u64) -> BlockHeight {
        self.height = self.height.saturating_add(blocks);
        tracing::debug!("Mined {} blocks, height now {}", blocks, self.height);
        self.height
    }

    /// Dev faucet. Subject to the configured per-request limit.
    pub fn faucet(&mut self, to: Address, amount: Amount) -> Result<Amount> {
        let policy = &self.config.faucet;
        if !policy.enabled {
            return Err(LedgerError::config("Faucet is disabled").into());
        }
        if amount > policy.max_per_request {
            return Err(LedgerError::invalid_amount(format!(
                "Faucet limit is {} sats per request, asked for {}",
                policy.max_per_request.to_sat(),
                amount.to_sat()
            ))
            .into());
        }
        let balance = self.bank.credit(to, amount)?;
        tracing::info!("Faucet sent {} sats to {}", amount.to_sat(), to);
        Ok(balance)
    }

    /// Simulate a recipient whose receive hook fails
    pub fn set_rejecting(&mut self, address: Address, rejecting: bool) {
        self.bank.set_rejecting(address, rejecting);
    }

    /// Apply `tx` atomically. On failure the host is left exactly as it was.
    pub fn execute(&mut self, tx: Transaction) -> Result<Receipt> {
        let checkpoint = self.clone();

        let applied = self
            .apply(&tx)
            .and_then(|events| self.check_custody().map(|_| events));

        match applied {
            Ok(events) => {
                let receipt = self.seal(events);
                if self.config.automine {
                    self.height += 1;
                }
                Ok(receipt)
            }
            Err(e) => {
                *self = checkpoint;
                tracing::warn!("Transaction from {} rejected: {}", tx.from, e);
                Err(e)
            }
        }
    }

    fn apply(&mut self, tx: &Transaction) -> Result<Vec<Event>> {
        let now = self.height;
        let caller = tx.from;

        match &tx.call {
            Call::CreateInstance(params) => {
                self.reject_value(tx.value)?;
                let (game, event) = self.registry.create_instance(&caller, *params, now)?;
                self.games.insert(game.address(), game);
                Ok(vec![event])
            }
            Call::Commit { game, commitment } => {
                let target = self.games.get_mut(game).ok_or(GameError::GameNotFound(*game))?;
                // Game checks come first; the host restores both on a failed transfer
                let event = target.commit(&caller, *commitment, tx.value, now)?;
                self.bank.transfer(&caller, game, tx.value)?;
                Ok(vec![event])
            }
            Call::Reveal { game, number, salt } => {
                let target = self.games.get_mut(game).ok_or(GameError::GameNotFound(*game))?;
                if tx.value > Amount::ZERO {
                    target.receive(tx.value)?;
                }
                Ok(vec![target.reveal(&caller, *number, salt, now)?])
            }
            Call::Finalize { game } => {
                let target = self.games.get_mut(game).ok_or(GameError::GameNotFound(*game))?;
                if tx.value > Amount::ZERO {
                    target.receive(tx.value)?;
                }
                Ok(vec![target.finalize(now)?])
            }
            Call::Withdraw { game } => {
                let target = self.games.get_mut(game).ok_or(GameError::GameNotFound(*game))?;
                if tx.value > Amount::ZERO {
                    target.receive(tx.value)?;
                }
                let mut payout = BankPayout {
                    bank: &mut self.bank,
                    from: *game,
                };
                Ok(vec![target.withdraw(&caller, &mut payout)?])
            }
            Call::Transfer { to } => {
                if let Some(target) = self.games.get(to) {
                    target.receive(tx.value)?;
                }
                if *to == self.registry.address() {
                    self.reject_value(tx.value)?;
                }
                self.bank.transfer(&caller, to, tx.value)?;
                tracing::info!(
                    "Transferred {} sats from {} to {}",
                    tx.value.to_sat(),
                    caller,
                    to
                );
                Ok(Vec::new())
            }
        }
    }

    /// The registry holds no value
    fn reject_value(&self, value: Amount) -> Result<()> {
        if value > Amount::ZERO {
            return Err(GameError::DirectTransferNotAllowed);
        }
        Ok(())
    }

    /// Every instance's bank balance must equal what it custodies
    pub fn check_custody(&self) -> Result<()> {
        for (address, game) in &self.games {
            let held = self.bank.balance(address);
            let owed = game.custodied();
            if held != owed {
                return Err(GameError::internal(format!(
                    "game {} holds {} sats but custodies {} sats",
                    address,
                    held.to_sat(),
                    owed.to_sat()
                )));
            }
        }
        Ok(())
    }

    fn seal(&mut self, events: Vec<Event>) -> Receipt {
        let mut sealed = Vec::with_capacity(events.len());
        for event in events {
            let record = EventRecord {
                seq: self.events.len() as u64,
                height: self.height,
                event,
            };
            self.events.push(record.clone());
            sealed.push(record);
        }
        Receipt {
            height: self.height,
            events: sealed,
        }
    }

    /// Persist the whole host as the `chain` snapshot
    pub async fn save(&self, storage: &Storage) -> Result<()> {
        SnapshotStore::new(storage)
            .save_snapshot(SNAPSHOT_NAME, self.height, self)
            .await?;
        Ok(())
    }

    pub async fn load(storage: &Storage) -> Result<Self> {
        let host: Host = SnapshotStore::new(storage)
            .load_snapshot(SNAPSHOT_NAME)
            .await?;
        host.config.validate()?;
        tracing::debug!("Loaded chain at height {}", host.height);
        Ok(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::Guess;
    use crate::ErrorKind;

    const ENTRY: u64 = 10_000_000;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn params() -> GameParams {
        GameParams {
            entry_fee: Amount::from_sat(ENTRY),
            service_fee_percent: 10,
            deposit_percent: 50,
            commit_window: 50,
            reveal_window: 50,
            max_players: 10,
        }
    }

    fn host() -> Host {
        let mut host = Host::new(ChainConfig::default(), addr("operator")).unwrap();
        for name in ["alice", "bob", "carol"] {
            host.faucet(addr(name), Amount::from_sat(100_000_000)).unwrap();
        }
        host
    }

    fn create(host: &mut Host) -> Address {
        host.execute(Transaction::new(addr("operator"), Call::CreateInstance(params())))
            .unwrap()
            .created_game()
            .unwrap()
    }

    fn commit(host: &mut Host, game: Address, who: &str, number: u64) -> Result<Receipt> {
        let value = host.game(&game).unwrap().commit_value();
        let commitment = Guess::new(number, format!("{}-salt", who)).commitment();
        host.execute(
            Transaction::new(addr(who), Call::Commit { game, commitment }).with_value(value),
        )
    }

    fn reveal(host: &mut Host, game: Address, who: &str, number: u64) -> Result<Receipt> {
        host.execute(Transaction::new(
            addr(who),
            Call::Reveal {
                game,
                number,
                salt: format!("{}-salt", who),
            },
        ))
    }

    fn withdraw(host: &mut Host, game: Address, who: &str) -> Result<Receipt> {
        host.execute(Transaction::new(addr(who), Call::Withdraw { game }))
    }

    #[test]
    fn test_full_game() {
        let mut host = host();
        let game = create(&mut host);
        assert_eq!(host.registry().count(), 1);

        commit(&mut host, game, "alice", 300).unwrap();
        commit(&mut host, game, "bob", 600).unwrap();
        commit(&mut host, game, "carol", 900).unwrap();
        assert_eq!(host.balance(&game), Amount::from_sat(45_000_000));
        assert_eq!(host.balance(&addr("alice")), Amount::from_sat(85_000_000));

        let deadline = host.game(&game).unwrap().commit_deadline();
        host.mine(deadline - host.height());

        reveal(&mut host, game, "alice", 300).unwrap();
        reveal(&mut host, game, "bob", 600).unwrap();
        reveal(&mut host, game, "carol", 900).unwrap();

        let deadline = host.game(&game).unwrap().reveal_deadline();
        host.mine(deadline - host.height());

        let receipt = host
            .execute(Transaction::new(addr("bob"), Call::Finalize { game }))
            .unwrap();
        assert!(matches!(
            receipt.events[0].event,
            Event::GameFinalized { winner, winning_number: 300, .. } if winner == addr("alice")
        ));

        withdraw(&mut host, game, "alice").unwrap();
        withdraw(&mut host, game, "bob").unwrap();
        withdraw(&mut host, game, "carol").unwrap();
        withdraw(&mut host, game, "operator").unwrap();

        assert_eq!(host.balance(&addr("alice")), Amount::from_sat(117_000_000));
        assert_eq!(host.balance(&addr("bob")), Amount::from_sat(90_000_000));
        assert_eq!(host.balance(&addr("carol")), Amount::from_sat(90_000_000));
        assert_eq!(host.balance(&addr("operator")), Amount::from_sat(3_000_000));
        assert_eq!(host.balance(&game), Amount::ZERO);
        assert_eq!(host.bank().total_supply(), Amount::from_sat(300_000_000));

        let names: Vec<&str> = host.events_for(&game).map(|r| r.event.name()).collect();
        assert_eq!(
            names,
            vec![
                "GameCreated",
                "Committed",
                "Committed",
                "Committed",
                "Revealed",
                "Revealed",
                "Revealed",
                "GameFinalized",
                "Withdrawn",
                "Withdrawn",
                "Withdrawn",
                "Withdrawn"
            ]
        );
        let seqs: Vec<u64> = host.events().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, (0..12).collect::<Vec<u64>>());
    }

    #[test]
    fn test_automine_seals_one_tx_per_block() {
        let mut host = host();
        let start = host.height();
        let game = create(&mut host);
        assert_eq!(host.height(), start + 1);
        assert_eq!(host.game(&game).unwrap().commit_deadline(), start + 50);

        let receipt = commit(&mut host, game, "alice", 1).unwrap();
        assert_eq!(receipt.height, start + 1);
        assert_eq!(host.height(), start + 2);

        // Failed transactions do not advance the clock
        commit(&mut host, game, "alice", 1).unwrap_err();
        assert_eq!(host.height(), start + 2);
    }

    #[test]
    fn test_manual_mining() {
        let mut host = Host::new(ChainConfig::manual(), addr("operator")).unwrap();
        create(&mut host);
        assert_eq!(host.height(), 0);
        assert_eq!(host.mine(5), 5);
        assert!(host.faucet(addr("alice"), Amount::from_sat(1)).is_err());
    }

    #[test]
    fn test_failed_transaction_leaves_host_identical() {
        let mut host = host();
        let game = create(&mut host);
        commit(&mut host, game, "alice", 300).unwrap();
        let before = host.clone();
        let before_json = serde_json::to_string(&host).unwrap();

        let err = commit(&mut host, game, "alice", 300).unwrap_err();
        assert!(matches!(err, GameError::AlreadyCommitted));
        assert_eq!(host, before);
        assert_eq!(serde_json::to_string(&host).unwrap(), before_json);

        let err = host
            .execute(
                Transaction::new(
                    addr("bob"),
                    Call::Commit {
                        game,
                        commitment: Guess::new(1, "x").commitment(),
                    },
                )
                .with_value(Amount::from_sat(ENTRY)),
            )
            .unwrap_err();
        assert!(matches!(err, GameError::WrongValue { .. }));
        assert_eq!(host, before);
    }

    #[test]
    fn test_commit_without_funds() {
        let mut host = host();
        let game = create(&mut host);
        let err = commit(&mut host, game, "dave", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Funds);
        assert_eq!(host.game(&game).unwrap().total_players(), 0);
        assert_eq!(host.balance(&game), Amount::ZERO);

        // Phase errors win over missing funds
        host.mine(60);
        let err = commit(&mut host, game, "dave", 1).unwrap_err();
        assert!(matches!(err, GameError::NotInCommitPhase));
    }

    #[test]
    fn test_only_operator_creates_games() {
        let mut host = host();
        let err = host
            .execute(Transaction::new(addr("alice"), Call::CreateInstance(params())))
            .unwrap_err();
        assert!(matches!(err, GameError::NotOperator));
        assert_eq!(host.registry().count(), 0);
        assert!(host.events().is_empty());
    }

    #[test]
    fn test_direct_transfers_rejected() {
        let mut host = host();
        let game = create(&mut host);

        let err = host
            .execute(
                Transaction::new(addr("alice"), Call::Transfer { to: game })
                    .with_value(Amount::from_sat(1)),
            )
            .unwrap_err();
        assert!(matches!(err, GameError::DirectTransferNotAllowed));

        let err = host
            .execute(
                Transaction::new(addr("alice"), Call::Finalize { game })
                    .with_value(Amount::from_sat(1)),
            )
            .unwrap_err();
        assert!(matches!(err, GameError::DirectTransferNotAllowed));

        let registry = host.registry().address();
        let err = host
            .execute(
                Transaction::new(addr("alice"), Call::Transfer { to: registry })
                    .with_value(Amount::from_sat(1)),
            )
            .unwrap_err();
        assert!(matches!(err, GameError::DirectTransferNotAllowed));

        assert_eq!(host.balance(&game), Amount::ZERO);

        host.execute(
            Transaction::new(addr("alice"), Call::Transfer { to: addr("bob") })
                .with_value(Amount::from_sat(1)),
        )
        .unwrap();
        assert_eq!(host.balance(&addr("bob")), Amount::from_sat(100_000_001));
    }

    #[test]
    fn test_rejected_payout_keeps_owed_balance() {
        let mut host = host();
        let game = create(&mut host);
        commit(&mut host, game, "alice", 300).unwrap();
        host.mine(50);
        reveal(&mut host, game, "alice", 300).unwrap();

        host.set_rejecting(addr("alice"), true);
        let err = withdraw(&mut host, game, "alice").unwrap_err();
        assert!(matches!(err, GameError::Ledger(LedgerError::TransferRejected(_))));
        assert_eq!(
            host.game(&game).unwrap().owed_balance(&addr("alice")),
            Amount::from_sat(5_000_000)
        );

        host.set_rejecting(addr("alice"), false);
        withdraw(&mut host, game, "alice").unwrap();
        assert_eq!(host.balance(&addr("alice")), Amount::from_sat(90_000_000));
    }

    #[test]
    fn test_custody_holds_after_every_transaction() {
        let mut host = host();
        let game = create(&mut host);
        host.check_custody().unwrap();

        commit(&mut host, game, "alice", 10).unwrap();
        commit(&mut host, game, "bob", 20).unwrap();
        commit(&mut host, game, "carol", 30).unwrap();
        host.check_custody().unwrap();

        host.mine(50);
        reveal(&mut host, game, "alice", 10).unwrap();
        host.check_custody().unwrap();

        host.mine(50);
        host.execute(Transaction::new(addr("carol"), Call::Finalize { game }))
            .unwrap();
        host.check_custody().unwrap();

        // bob and carol never revealed; their deposits went to the operator
        assert_eq!(
            host.game(&game).unwrap().owed_balance(&addr("operator")),
            Amount::from_sat(3_000_000 + 10_000_000)
        );
        withdraw(&mut host, game, "operator").unwrap();
        withdraw(&mut host, game, "alice").unwrap();
        host.check_custody().unwrap();
        assert_eq!(host.balance(&game), Amount::ZERO);
    }

    #[test]
    fn test_unknown_game() {
        let mut host = host();
        let missing = addr("nowhere");
        let err = host
            .execute(Transaction::new(addr("alice"), Call::Finalize { game: missing }))
            .unwrap_err();
        assert!(matches!(err, GameError::GameNotFound(a) if a == missing));
        assert!(host.game(&missing).is_err());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let storage = Storage::in_memory().await.unwrap();
        let mut host = host();
        let game = create(&mut host);
        commit(&mut host, game, "alice", 300).unwrap();

        host.save(&storage).await.unwrap();
        let restored = Host::load(&storage).await.unwrap();

        assert_eq!(restored, host);
        assert_eq!(
            SnapshotStore::new(&storage)
                .snapshot_height(SNAPSHOT_NAME)
                .await
                .unwrap(),
            Some(host.height())
        );
    }

    #[tokio::test]
    async fn test_load_missing_snapshot() {
        let storage = Storage::in_memory().await.unwrap();
        let err = Host::load(&storage).await.unwrap_err();
        assert!(matches!(
            err,
            GameError::Ledger(LedgerError::SnapshotNotFound(_))
        ));
    }
}
