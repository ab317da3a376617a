use crate::host::{Host, Receipt, Transaction};
use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use twothirds_core::BlockHeight;

/// Shared handle to a host. Submissions from any thread are applied one at
/// a time in lock order, which is the ledger's total order.
#[derive(Clone)]
pub struct Node {
    host: Arc<Mutex<Host>>,
}

impl Node {
    pub fn new(host: Host) -> Self {
        Self {
            host: Arc::new(Mutex::new(host)),
        }
    }

    pub fn submit(&self, tx: Transaction) -> Result<Receipt> {
        self.host.lock().execute(tx)
    }

    /// Run a read-only view against the current state
    pub fn read<R>(&self, f: impl FnOnce(&Host) -> R) -> R {
        f(&*self.host.lock())
    }

    pub fn mine(&self, blocks: u64) -> BlockHeight {
        self.host.lock().mine(blocks)
    }

    pub fn height(&self) -> BlockHeight {
        self.host.lock().height()
    }

    /// Copy of the current state, e.g. for persistence
    pub fn snapshot(&self) -> Host {
        self.host.lock().clone()
    }
}
