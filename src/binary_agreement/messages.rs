/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the messages that replicas exchange as part of [binary agreement](super).
//!
//! Both message kinds are plain data. They are authenticated by the transport layer before they reach
//! this crate, and they are safe to deliver more than once.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    data_types::{ChainID, ParticipantIndex, Round, SignatureShare},
    protocol_key::ProtocolKey,
};

/// Every message kind consumed by a [`BinaryAgreement`](super::BinaryAgreement).
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum AgreementMessage {
    BVBroadcast(BVBroadcast),
    AUXBroadcast(AUXBroadcast),
}

impl AgreementMessage {
    pub fn bv_broadcast(
        chain_id: ChainID,
        key: ProtocolKey,
        round: Round,
        value: bool,
        sender: ParticipantIndex,
    ) -> AgreementMessage {
        AgreementMessage::BVBroadcast(BVBroadcast {
            chain_id,
            key,
            round,
            value,
            sender,
        })
    }

    pub fn aux_broadcast(
        chain_id: ChainID,
        key: ProtocolKey,
        round: Round,
        value: bool,
        sender: ParticipantIndex,
        signature_share: SignatureShare,
    ) -> AgreementMessage {
        AgreementMessage::AUXBroadcast(AUXBroadcast {
            chain_id,
            key,
            round,
            value,
            sender,
            signature_share,
        })
    }

    pub fn chain_id(&self) -> ChainID {
        match self {
            AgreementMessage::BVBroadcast(BVBroadcast { chain_id, .. }) => *chain_id,
            AgreementMessage::AUXBroadcast(AUXBroadcast { chain_id, .. }) => *chain_id,
        }
    }

    /// Get the identity of the instance this message is addressed to.
    pub fn key(&self) -> ProtocolKey {
        match self {
            AgreementMessage::BVBroadcast(BVBroadcast { key, .. }) => *key,
            AgreementMessage::AUXBroadcast(AUXBroadcast { key, .. }) => *key,
        }
    }

    pub fn round(&self) -> Round {
        match self {
            AgreementMessage::BVBroadcast(BVBroadcast { round, .. }) => *round,
            AgreementMessage::AUXBroadcast(AUXBroadcast { round, .. }) => *round,
        }
    }

    pub fn value(&self) -> bool {
        match self {
            AgreementMessage::BVBroadcast(BVBroadcast { value, .. }) => *value,
            AgreementMessage::AUXBroadcast(AUXBroadcast { value, .. }) => *value,
        }
    }

    pub fn sender(&self) -> ParticipantIndex {
        match self {
            AgreementMessage::BVBroadcast(BVBroadcast { sender, .. }) => *sender,
            AgreementMessage::AUXBroadcast(AUXBroadcast { sender, .. }) => *sender,
        }
    }
}

/// First-phase vote: `sender` supports `value` as a candidate in `round`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BVBroadcast {
    pub chain_id: ChainID,
    pub key: ProtocolKey,
    pub round: Round,
    pub value: bool,
    pub sender: ParticipantIndex,
}

/// Second-phase vote: `sender` has seen `value` reach a weak quorum of BV votes in `round`.
///
/// `signature_share` is the sender's share of the round's common coin, signed over
/// [`coin_seed`](crate::common_coin::coin_seed).
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AUXBroadcast {
    pub chain_id: ChainID,
    pub key: ProtocolKey,
    pub round: Round,
    pub value: bool,
    pub sender: ParticipantIndex,
    pub signature_share: SignatureShare,
}

impl From<BVBroadcast> for AgreementMessage {
    fn from(value: BVBroadcast) -> Self {
        AgreementMessage::BVBroadcast(value)
    }
}

impl From<AUXBroadcast> for AgreementMessage {
    fn from(value: AUXBroadcast) -> Self {
        AgreementMessage::AUXBroadcast(value)
    }
}
