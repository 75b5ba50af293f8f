/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Crash recovery through a durable input log.
//!
//! Binary agreement is deterministic: the same inputs, applied in the same order, lead to the same
//! state and the same broadcasts. So instead of persisting its state, a replica persists the inputs that
//! changed it, as [`LedgerEntry`]s, into a [`RecoveryLedger`]. Retransmitted copies of a vote that was
//! already counted are not logged again. The
//! [`BlockConsensusAgent`](crate::block_consensus::BlockConsensusAgent) requests each append through an
//! [`Effect::AppendToLedger`](crate::effects::Effect::AppendToLedger) that precedes every other effect
//! of the same input.
//!
//! On restart, [`read_entries`] decodes the ledger and
//! [`BlockConsensusAgent::recover`](crate::block_consensus::BlockConsensusAgent::recover) replays it
//! before any new input is accepted. The replica therefore never sends a vote that contradicts one it
//! sent before crashing.

pub mod pluggables;

pub use pluggables::RecoveryLedger;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::binary_agreement::messages::AgreementMessage;
use crate::types::data_types::BlockHeight;

/// One accepted input.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum LedgerEntry {
    /// This replica started consensus for `height` with `proposals`, one per proposer index.
    StartConsensus {
        height: BlockHeight,
        proposals: Vec<bool>,
    },

    /// This replica accepted `message` from the network.
    Received(AgreementMessage),
}

impl LedgerEntry {
    /// The height this entry belongs to.
    pub fn height(&self) -> BlockHeight {
        match self {
            LedgerEntry::StartConsensus { height, .. } => *height,
            LedgerEntry::Received(message) => message.key().height,
        }
    }
}

#[derive(Debug)]
pub enum LedgerError {
    /// The entry at `index` could not be decoded. The ledger is corrupt.
    DeserializeEntryError { index: usize, reason: String },

    SerializeEntryError { reason: String },
}

/// Decode every entry of `ledger`, oldest first.
pub fn read_entries<L: RecoveryLedger>(ledger: &L) -> Result<Vec<LedgerEntry>, LedgerError> {
    ledger
        .entries()
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            LedgerEntry::try_from_slice(bytes).map_err(|err| LedgerError::DeserializeEntryError {
                index,
                reason: err.to_string(),
            })
        })
        .collect()
}

/// Encode `entry` and append it to `ledger`.
pub fn append_entry<L: RecoveryLedger>(ledger: &mut L, entry: &LedgerEntry) -> Result<(), LedgerError> {
    let bytes = entry
        .try_to_vec()
        .map_err(|err| LedgerError::SerializeEntryError {
            reason: err.to_string(),
        })?;
    ledger.append(entry.height(), bytes);
    Ok(())
}
