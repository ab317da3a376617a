use crate::events::Event;
use crate::game::{Game, GameParams};
use crate::{GameError, Result};
use serde::{Deserialize, Serialize};
use twothirds_core::{Address, BlockHeight};

/// Factory of game instances. The operator is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    address: Address,
    operator: Address,
    instances: Vec<Address>,
    nonce: u64,
}

impl Registry {
    pub fn new(address: Address, operator: Address) -> Self {
        Self {
            address,
            operator,
            instances: Vec::new(),
            nonce: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    /// Instances in creation order
    pub fn list_instances(&self) -> &[Address] {
        &self.instances
    }

    pub fn count(&self) -> usize {
        self.instances.len()
    }

    pub fn instance(&self, index: usize) -> Option<Address> {
        self.instances.get(index).copied()
    }

    /// Address the next instance will be created at
    pub fn next_instance_address(&self) -> Address {
        Address::derive(&self.address, self.nonce)
    }

    /// Create and record a new game. Only the operator may call this; a
    /// rejected construction leaves the registry unchanged.
    pub fn create_instance(
        &mut self,
        caller: &Address,
        params: GameParams,
        now: BlockHeight,
    ) -> Result<(Game, Event)> {
        if *caller != self.operator {
            return Err(GameError::NotOperator);
        }

        let address = self.next_instance_address();
        let game = Game::new(address, self.address, self.operator, params, now)?;

        self.instances.push(address);
        self.nonce += 1;

        tracing::info!(
            "Created game {} (#{}) with entry fee {} sats, {} players max",
            address,
            self.instances.len() - 1,
            params.entry_fee.to_sat(),
            params.max_players
        );

        let event = Event::GameCreated {
            game: address,
            operator: self.operator,
            params,
        };
        Ok((game, event))
    }
}
