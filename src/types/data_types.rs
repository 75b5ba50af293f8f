/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store numbers or bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
    ops::{Add, Sub},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Number that uniquely identifies a blockchain.
///
/// Every agreement message carries the `ChainID` of the chain it was produced for, so that replicas
/// never mistake votes for one chain for votes for another. All replicas of the same chain should be
/// configured with the same `ChainID`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct ChainID(u64);

impl ChainID {
    /// Create a new `ChainID` with an `int` value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the `u64` value of this `ChainID`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

/// Height of a block in the chain being agreed upon.
///
/// Exactly one block (or the empty-block marker) is committed per height.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BlockHeight(u64);

impl BlockHeight {
    /// Create a new `BlockHeight` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `BlockHeight`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Add<u64> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: u64) -> Self::Output {
        BlockHeight::new(self.0 + rhs)
    }
}

impl Sub<BlockHeight> for BlockHeight {
    type Output = u64;
    fn sub(self, rhs: BlockHeight) -> Self::Output {
        self.0 - rhs.0
    }
}

/// 1-based position of a participant in the participant set.
///
/// Participant indices identify both the proposer whose block an agreement instance is deciding on
/// and the sender of every vote. Valid indices for a participant set of size `N` are `1..=N`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ParticipantIndex(u64);

impl ParticipantIndex {
    /// Create a new `ParticipantIndex` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `ParticipantIndex`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Check whether this index names a member of a participant set with `node_count` members.
    pub fn is_within(&self, node_count: NodeCount) -> bool {
        self.0 >= 1 && self.0 <= node_count.int()
    }
}

impl Display for ParticipantIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Round number of an agreement instance. Every instance starts in round 0.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshDeserialize,
    BorshSerialize,
)]
pub struct Round(u64);

impl Round {
    /// Create a new `Round` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `Round`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// The round immediately following this one.
    pub const fn next(&self) -> Round {
        Round(self.0 + 1)
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Add<u64> for Round {
    type Output = Round;
    fn add(self, rhs: u64) -> Self::Output {
        Round(self.0 + rhs)
    }
}

/// Size of the participant set. Fixed for the lifetime of an agreement instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct NodeCount(u64);

impl NodeCount {
    /// Create a new `NodeCount` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `NodeCount`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Iterate through every valid participant index, in ascending order.
    pub fn participants(&self) -> impl Iterator<Item = ParticipantIndex> {
        (1..=self.0).map(ParticipantIndex::new)
    }
}

/// 32-byte cryptographic hash. Within this crate these are always SHA256 hashes, for example the
/// seed of a round's [common coin](crate::common_coin::coin_seed).
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the byte-array representation of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// One participant's share of the common-coin signature for a round.
///
/// The byte layout is owned by the [`CommonCoin`](crate::common_coin::CommonCoin) provider: an
/// Ed25519 provider produces 64-byte shares, a threshold BLS provider produces compressed curve
/// points.
#[derive(Clone, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct SignatureShare(Vec<u8>);

impl SignatureShare {
    /// Create a new `SignatureShare` wrapping `bytes`.
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get a reference to the bytes of this `SignatureShare`.
    pub fn bytes(&self) -> &Vec<u8> {
        &self.0
    }
}

impl Debug for SignatureShare {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureShare({} bytes)", self.0.len())
    }
}

/// Signature obtained by combining enough [`SignatureShare`]s for the same seed.
#[derive(Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct CombinedSignature(Vec<u8>);

impl CombinedSignature {
    /// Create a new `CombinedSignature` wrapping `bytes`.
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get a reference to the bytes of this `CombinedSignature`.
    pub fn bytes(&self) -> &Vec<u8> {
        &self.0
    }
}

impl Debug for CombinedSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "CombinedSignature({} bytes)", self.0.len())
    }
}
