//! Deterministic keys and common coins for test participant sets.

use std::collections::BTreeMap;

use abba_rs::{
    block_consensus::types::AgentConfiguration,
    binary_agreement::types::AgreementConfiguration,
    common_coin::Ed25519Coin,
    types::data_types::{ChainID, NodeCount, ParticipantIndex, Round},
};
use ed25519_dalek::SigningKey;

pub(crate) const CHAIN_ID: ChainID = ChainID::new(0);

pub(crate) const MAX_ROUND: Round = Round::new(100);

/// Signing key of `participant`, derived from its index so that every run uses the same keys.
pub(crate) fn signing_key(participant: ParticipantIndex) -> SigningKey {
    SigningKey::from_bytes(&[participant.int() as u8; 32])
}

/// One [`Ed25519Coin`] per participant of a set of `node_count`, all verifying each other's shares.
pub(crate) fn test_coins(node_count: NodeCount) -> BTreeMap<ParticipantIndex, Ed25519Coin> {
    let verifying_keys: BTreeMap<_, _> = node_count
        .participants()
        .map(|participant| (participant, signing_key(participant).verifying_key()))
        .collect();

    node_count
        .participants()
        .map(|participant| {
            (
                participant,
                Ed25519Coin::new(signing_key(participant), verifying_keys.clone()),
            )
        })
        .collect()
}

pub(crate) fn agreement_configuration(
    me: ParticipantIndex,
    node_count: NodeCount,
) -> AgreementConfiguration {
    AgreementConfiguration {
        chain_id: CHAIN_ID,
        me,
        node_count,
        max_round: MAX_ROUND,
    }
}

pub(crate) fn agent_configuration(me: ParticipantIndex, node_count: NodeCount) -> AgentConfiguration {
    AgentConfiguration {
        chain_id: CHAIN_ID,
        me,
        node_count,
        max_round: MAX_ROUND,
        instance_retention_heights: 4,
        max_live_instances: 1024,
    }
}
