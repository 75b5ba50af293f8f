//! A simple, volatile, in-memory implementation of [`RecoveryLedger`].

use std::sync::{Arc, Mutex};

use abba_rs::{recovery::RecoveryLedger, types::data_types::BlockHeight};

/// An in-memory implementation of [`RecoveryLedger`]. Clones share the same entries, so a test can keep
/// a handle to a ledger after moving it into a replica, and hand it to the replica's successor.
#[derive(Clone)]
pub(crate) struct MemLedger(Arc<Mutex<Vec<(BlockHeight, Vec<u8>)>>>);

impl MemLedger {
    /// Create a new, empty `MemLedger`.
    pub(crate) fn new() -> MemLedger {
        MemLedger(Arc::new(Mutex::new(Vec::new())))
    }

    pub(crate) fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub(crate) fn heights(&self) -> Vec<BlockHeight> {
        self.0.lock().unwrap().iter().map(|(height, _)| *height).collect()
    }
}

impl RecoveryLedger for MemLedger {
    fn append(&mut self, height: BlockHeight, entry: Vec<u8>) {
        self.0.lock().unwrap().push((height, entry));
    }

    fn entries(&self) -> Vec<Vec<u8>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    fn prune_below(&mut self, height: BlockHeight) {
        self.0.lock().unwrap().retain(|(entry_height, _)| *entry_height >= height);
    }
}
