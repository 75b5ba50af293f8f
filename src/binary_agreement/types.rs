/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types specific to [binary agreement](super).

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{
    data_types::{ChainID, NodeCount, ParticipantIndex, Round, SignatureShare},
    protocol_key::ProtocolKey,
};

/// Parameters shared by every [`BinaryAgreement`](super::BinaryAgreement) of a replica.
#[derive(Clone, Copy, Debug)]
pub struct AgreementConfiguration {
    pub chain_id: ChainID,
    pub me: ParticipantIndex,
    pub node_count: NodeCount,
    /// The highest round an instance may enter. Messages for later rounds are rejected.
    pub max_round: Round,
}

/// The permanent outcome of a [`BinaryAgreement`](super::BinaryAgreement).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub value: bool,
    pub round: Round,
}

/// A subset of `{true, false}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BinValues {
    has_true: bool,
    has_false: bool,
}

impl BinValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value`, returning whether it was absent.
    pub fn insert(&mut self, value: bool) -> bool {
        let slot = if value {
            &mut self.has_true
        } else {
            &mut self.has_false
        };
        let inserted = !*slot;
        *slot = true;
        inserted
    }

    pub fn contains(&self, value: bool) -> bool {
        if value {
            self.has_true
        } else {
            self.has_false
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.has_true && !self.has_false
    }

    pub fn len(&self) -> usize {
        self.has_true as usize + self.has_false as usize
    }

    /// The only value in the set, if the set has exactly one.
    pub fn single(&self) -> Option<bool> {
        match (self.has_true, self.has_false) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        }
    }

    /// Any value in the set, preferring `true`.
    pub fn any(&self) -> Option<bool> {
        if self.has_true {
            Some(true)
        } else if self.has_false {
            Some(false)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> {
        let values = *self;
        [true, false]
            .into_iter()
            .filter(move |value| values.contains(*value))
    }
}

/// BV votes received in one round, as a set of senders per value.
///
/// A sender may appear under both values; an equivocating vote is kept, never replaces the first one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BVVotes {
    true_votes: BTreeSet<ParticipantIndex>,
    false_votes: BTreeSet<ParticipantIndex>,
}

impl BVVotes {
    /// Record that `sender` voted for `value`, returning whether the vote is new.
    pub fn insert(&mut self, value: bool, sender: ParticipantIndex) -> bool {
        self.votes_mut(value).insert(sender)
    }

    pub fn contains(&self, value: bool, sender: ParticipantIndex) -> bool {
        self.votes(value).contains(&sender)
    }

    pub fn count(&self, value: bool) -> u64 {
        self.votes(value).len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.true_votes.is_empty() && self.false_votes.is_empty()
    }

    fn votes(&self, value: bool) -> &BTreeSet<ParticipantIndex> {
        if value {
            &self.true_votes
        } else {
            &self.false_votes
        }
    }

    fn votes_mut(&mut self, value: bool) -> &mut BTreeSet<ParticipantIndex> {
        if value {
            &mut self.true_votes
        } else {
            &mut self.false_votes
        }
    }
}

/// AUX votes received in one round, each with the sender's common-coin share.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AUXVotes {
    true_votes: BTreeMap<ParticipantIndex, SignatureShare>,
    false_votes: BTreeMap<ParticipantIndex, SignatureShare>,
}

impl AUXVotes {
    /// Record that `sender` voted for `value` with `share`, returning whether the vote is new.
    pub fn insert(&mut self, value: bool, sender: ParticipantIndex, share: SignatureShare) -> bool {
        let votes = self.votes_mut(value);
        if votes.contains_key(&sender) {
            return false;
        }
        votes.insert(sender, share);
        true
    }

    pub fn contains(&self, value: bool, sender: ParticipantIndex) -> bool {
        self.votes(value).contains_key(&sender)
    }

    /// The share `sender` attached to its vote for `value`.
    pub fn share(&self, value: bool, sender: ParticipantIndex) -> Option<&SignatureShare> {
        self.votes(value).get(&sender)
    }

    pub fn count(&self, value: bool) -> u64 {
        self.votes(value).len() as u64
    }

    /// Distinct senders of votes for any value in `allowed`.
    ///
    /// A sender that voted for both values is counted once.
    pub fn senders_within(&self, allowed: BinValues) -> BTreeSet<ParticipantIndex> {
        allowed
            .iter()
            .flat_map(|value| self.votes(value).keys().copied())
            .collect()
    }

    /// Distinct senders of votes for any value.
    pub fn senders(&self) -> BTreeSet<ParticipantIndex> {
        self.senders_within(BinValues {
            has_true: true,
            has_false: true,
        })
    }

    /// The values in `allowed` that received at least one vote.
    pub fn values_within(&self, allowed: BinValues) -> BinValues {
        let mut values = BinValues::new();
        for value in allowed.iter() {
            if !self.votes(value).is_empty() {
                values.insert(value);
            }
        }
        values
    }

    /// One share per distinct sender of a vote for a value in `allowed`.
    pub fn shares_within(&self, allowed: BinValues) -> Vec<(ParticipantIndex, SignatureShare)> {
        let mut shares: BTreeMap<ParticipantIndex, SignatureShare> = BTreeMap::new();
        for value in allowed.iter() {
            for (sender, share) in self.votes(value) {
                shares.entry(*sender).or_insert_with(|| share.clone());
            }
        }
        shares.into_iter().collect()
    }

    fn votes(&self, value: bool) -> &BTreeMap<ParticipantIndex, SignatureShare> {
        if value {
            &self.true_votes
        } else {
            &self.false_votes
        }
    }

    fn votes_mut(&mut self, value: bool) -> &mut BTreeMap<ParticipantIndex, SignatureShare> {
        if value {
            &mut self.true_votes
        } else {
            &mut self.false_votes
        }
    }
}

/// Values this replica has already broadcast in a round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastGuard {
    pub bv: BinValues,
    pub aux: Option<bool>,
}

/// Everything a [`BinaryAgreement`](super::BinaryAgreement) knows, exposed read-only so that callers can
/// compare snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgreementState {
    pub current_round: Round,
    pub decision: Option<Decision>,
    pub proposals: BTreeMap<Round, bool>,
    pub bv_votes: BTreeMap<Round, BVVotes>,
    pub bin_values: BTreeMap<Round, BinValues>,
    pub aux_votes: BTreeMap<Round, AUXVotes>,
    pub broadcast_guard: BTreeMap<Round, BroadcastGuard>,
    pub coins: BTreeMap<Round, bool>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AgreementError {
    /// The message was produced for a different chain.
    WrongChain { expected: ChainID, found: ChainID },

    /// The message embeds the key of a different instance.
    WrongProtocolKey { expected: ProtocolKey, found: ProtocolKey },

    /// The sender is not a member of the participant set.
    UnknownSender { sender: ParticipantIndex },

    /// The message is for a round beyond [`max_round`](AgreementConfiguration::max_round).
    RoundTooLarge { round: Round, max_round: Round },

    /// The AUX vote's common-coin share does not verify against its sender.
    InvalidSignatureShare { sender: ParticipantIndex, round: Round },

    /// [`propose`](super::BinaryAgreement::propose) was called more than once.
    AlreadyProposed { key: ProtocolKey },
}

impl AgreementError {
    /// Whether this error was caused by a message from another participant, as opposed to a local
    /// misuse or a local limit.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            AgreementError::WrongChain { .. }
                | AgreementError::WrongProtocolKey { .. }
                | AgreementError::UnknownSender { .. }
                | AgreementError::RoundTooLarge { .. }
                | AgreementError::InvalidSignatureShare { .. }
        )
    }
}
