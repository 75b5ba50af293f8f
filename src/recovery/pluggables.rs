/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait for pluggable recovery-ledger persistence.

use crate::types::data_types::BlockHeight;

/// Durable, append-only log of the inputs a replica has accepted.
///
/// Implementations only store opaque byte strings tagged with the height they belong to. They must
/// return entries in the order they were appended, and an entry must be durable once
/// [`append`](Self::append) returns.
pub trait RecoveryLedger: Send + 'static {
    /// Durably append `entry`, which belongs to `height`.
    fn append(&mut self, height: BlockHeight, entry: Vec<u8>);

    /// Get every retained entry, oldest first.
    fn entries(&self) -> Vec<Vec<u8>>;

    /// Discard every entry that belongs to a height lower than `height`.
    fn prune_below(&mut self, height: BlockHeight);
}
