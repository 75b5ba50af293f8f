/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Registry of [binary agreement](crate::binary_agreement) instances and aggregation of their decisions
//! into one decision per block height.
//!
//! For every height, each of the `N` participants may propose a block. The [`BlockConsensusAgent`]
//! runs one [`BinaryAgreement`](crate::binary_agreement::BinaryAgreement) per proposer to decide
//! whether that proposer's block is admitted, and then commits:
//! - the block of the lowest-indexed proposer decided `true`, once every lower-indexed proposer has
//!   been decided `false`, or
//! - an [empty block](types::BlockDecision::Empty) if every proposer was decided `false`.
//!
//! The decision for a height is written once and never changes afterwards.
//!
//! ## Instance lifecycle
//!
//! An instance is created by whichever comes first: this replica
//! [starting consensus](BlockConsensusAgent::start_consensus_for_height) for the height, or the first
//! valid message addressed to it. Once a height is finalized its instances stay alive for
//! [`instance_retention_heights`](types::AgentConfiguration::instance_retention_heights) more
//! finalized heights, to let slower participants finish, and are then evicted. Messages for evicted
//! heights are dropped.

pub mod implementation;

pub mod types;

pub use implementation::BlockConsensusAgent;
