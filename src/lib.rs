/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! ABBA-rs is a Rust library of asynchronous binary Byzantine agreement, and of a block consensus
//! engine built on it.
//!
//! For every block height, each of the `N` participants may propose a block. A replica runs one
//! [binary agreement](binary_agreement) instance per proposer, in which the participants decide whether
//! that proposer's block is available. The [block consensus agent](block_consensus) combines the `N`
//! binary decisions of a height into one [block decision](block_consensus::types::BlockDecision) that
//! every correct replica shares. Agreement tolerates `f < N/3` Byzantine participants and needs no
//! timing assumptions: rounds end on message quorums and on a [threshold common coin](common_coin).
//!
//! The protocol modules are sans-IO: their operations return [effects](effects::Effect) instead of
//! sending messages or touching storage. The [replica] module drives them on background threads,
//! with pluggable [networking], a pluggable [common coin](common_coin) and a pluggable
//! [recovery ledger](recovery).

pub mod binary_agreement;

pub mod block_consensus;

pub mod common_coin;

pub mod effects;

pub mod events;

pub(crate) mod event_bus;

pub(crate) mod logging;

pub mod networking;

pub mod recovery;

pub mod replica;

pub(crate) mod algorithm;

pub mod types;
