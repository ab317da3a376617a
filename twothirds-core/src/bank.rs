use crate::error::{LedgerError, Result};
use crate::types::Address;
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Native value balances of every account on the ledger, contracts included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    balances: BTreeMap<Address, Amount>,
    /// Accounts whose receive hook fails; any incoming transfer is rejected
    rejecting: BTreeSet<Address>,
}

impl Bank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or(Amount::ZERO)
    }

    /// Mint value into an account (genesis allocations and the dev faucet)
    pub fn credit(&mut self, address: Address, amount: Amount) -> Result<Amount> {
        let current = self.balance(&address);
        let updated = current
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?;
        self.balances.insert(address, updated);
        tracing::debug!("Credited {} sats to {}", amount.to_sat(), address);
        Ok(updated)
    }

    /// Move value between accounts. Nothing changes unless the whole move succeeds.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        if self.rejecting.contains(to) {
            return Err(LedgerError::TransferRejected(*to));
        }

        let available = self.balance(from);
        let debited = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                need: amount.to_sat(),
                available: available.to_sat(),
            })?;

        if from == to {
            return Ok(());
        }

        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?;

        self.balances.insert(*from, debited);
        self.balances.insert(*to, credited);
        Ok(())
    }

    pub fn set_rejecting(&mut self, address: Address, rejecting: bool) {
        if rejecting {
            self.rejecting.insert(address);
        } else {
            self.rejecting.remove(&address);
        }
    }

    pub fn is_rejecting(&self, address: &Address) -> bool {
        self.rejecting.contains(address)
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> Amount {
        self.balances
            .values()
            .fold(Amount::ZERO, |acc, amount| acc.checked_add(*amount).unwrap_or(Amount::MAX))
    }
}
