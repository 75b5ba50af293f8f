/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Outbound work requested by binary agreement and the block consensus agent.
//!
//! Neither [`BinaryAgreement`](crate::binary_agreement::BinaryAgreement) nor
//! [`BlockConsensusAgent`](crate::block_consensus::BlockConsensusAgent) performs I/O. Every operation
//! returns the effects it produced, in order, and the caller carries them out. Applying effects in the
//! returned order guarantees that an input is written to the recovery ledger before any broadcast it
//! caused.

use crate::binary_agreement::messages::AgreementMessage;
use crate::binary_agreement::types::Decision;
use crate::block_consensus::types::BlockDecision;
use crate::recovery::LedgerEntry;
use crate::types::data_types::{BlockHeight, ParticipantIndex};
use crate::types::protocol_key::ProtocolKey;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Send `message` to every participant. At-least-once delivery is enough.
    Broadcast(AgreementMessage),

    /// Send `message` to `peer` only.
    SendTo {
        peer: ParticipantIndex,
        message: AgreementMessage,
    },

    /// The instance identified by `key` has decided.
    InstanceDecided { key: ProtocolKey, decision: Decision },

    /// `height` has been finalized. Emitted once per height.
    CommitBlock {
        height: BlockHeight,
        decision: BlockDecision,
    },

    /// Durably append `entry` to the recovery ledger.
    AppendToLedger(LedgerEntry),

    /// Entries for heights below `below` are no longer needed for recovery.
    PruneLedger { below: BlockHeight },
}
