/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types specific to the [block consensus agent](super).

use crate::binary_agreement::types::AgreementError;
use crate::types::data_types::{BlockHeight, ChainID, NodeCount, ParticipantIndex, Round};

/// The final, write-once outcome of a height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockDecision {
    /// Commit the block proposed by this participant.
    Proposer(ParticipantIndex),

    /// Every proposer was decided `false`: commit an empty block.
    Empty,
}

/// Parameters of a [`BlockConsensusAgent`](super::BlockConsensusAgent).
#[derive(Clone, Copy, Debug)]
pub struct AgentConfiguration {
    pub chain_id: ChainID,
    pub me: ParticipantIndex,
    pub node_count: NodeCount,
    pub max_round: Round,
    /// How many finalized heights keep their instances alive for slower peers. With a value of `w`,
    /// finalizing height `h` evicts the instances of every finalized height `<= h - w`.
    pub instance_retention_heights: u64,
    /// Live-instance count above which the agent warns that heights are not being finalized.
    pub max_live_instances: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AgentError {
    /// Error raised by the binary agreement instance the input was routed to.
    Agreement(AgreementError),

    /// Consensus for `height` was already started by this replica.
    DuplicateStart { height: BlockHeight },

    /// The number of proposals does not match the participant set size.
    WrongProposalCount { expected: u64, found: u64 },

    /// Heights start at 1.
    InvalidHeight { height: BlockHeight },

    /// The message is addressed to a proposer outside the participant set.
    InvalidProposer { proposer: ParticipantIndex },

    /// `height` has already been finalized.
    HeightAlreadyDecided { height: BlockHeight },
}

impl From<AgreementError> for AgentError {
    fn from(value: AgreementError) -> Self {
        AgentError::Agreement(value)
    }
}
