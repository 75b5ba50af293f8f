/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Asynchronous binary Byzantine agreement (ABBA) on a single boolean.
//!
//! One [`BinaryAgreement`] runs per [`ProtocolKey`](crate::types::protocol_key::ProtocolKey), that is,
//! per (height, proposer) pair. It decides whether the proposer's block for the height should be
//! admitted, tolerating up to `⌊(N-1)/3⌋` Byzantine participants without any timing assumption.
//!
//! ## Rounds
//!
//! An instance proceeds in rounds, starting at round 0 with the replica's own
//! [proposal](BinaryAgreement::propose). A round `r` goes as follows:
//! 1. **BV phase**: the replica [BV-broadcasts](messages::BVBroadcast) its estimate for `r`. When a value
//!    collects a [weak quorum](crate::types::quorum::weak_quorum) of BV votes, at least one correct
//!    participant supports it, so the replica relays it (once per value) and adds it to `r`'s
//!    **bin values**.
//! 2. **AUX phase**: as soon as `r` has a bin value, the replica [AUX-broadcasts](messages::AUXBroadcast)
//!    it, once per round, attaching its share of the round's common coin.
//! 3. **Coin**: when AUX votes from a [strong quorum](crate::types::quorum::strong_quorum) of distinct
//!    participants, restricted to values in `r`'s bin values, have arrived, their shares are combined
//!    by the [`CommonCoin`](crate::common_coin::CommonCoin) into one bit.
//! 4. **Decision**: with `S` the set of values in those AUX votes, the instance decides `v` if `S = {v}`,
//!    `v` is `r`'s only bin value, and the coin is `v`. Otherwise it enters `r + 1` with `v` if
//!    `S = {v}`, or with the coin if `S = {true, false}`.
//!
//! Votes for rounds other than the current one are kept and counted. Votes for earlier rounds never
//! cause a broadcast; votes for later rounds are acted on when the instance gets there.
//!
//! ## After deciding
//!
//! A decision is permanent. The instance keeps counting votes and follows the other participants into
//! later rounds with its decided value, so that participants that have not decided yet still see enough
//! correct votes to decide too.

pub mod implementation;

pub mod messages;

pub mod types;

pub use implementation::BinaryAgreement;
