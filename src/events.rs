/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by binary agreement and the block consensus agent, for event
//! handling and logging.
//!
//! An event for a given action indicates that the action has been completed. Events are sent to an
//! optional [`Sender`]; when none is configured nothing is published, and nothing in this crate keeps
//! process-wide state for diagnostics.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::binary_agreement::messages::{AUXBroadcast, AgreementMessage, BVBroadcast};
use crate::binary_agreement::types::Decision;
use crate::block_consensus::types::BlockDecision;
use crate::types::data_types::{BlockHeight, Round};
use crate::types::protocol_key::ProtocolKey;

pub enum Event {
    // Events that change the outcome of a height.
    StartConsensus(StartConsensusEvent),
    Decide(DecideEvent),
    CommitBlock(CommitBlockEvent),
    EvictInstances(EvictInstancesEvent),
    Recover(RecoverEvent),
    // Events that involve broadcasting an agreement message.
    BVBroadcast(BVBroadcastEvent),
    AUXBroadcast(AUXBroadcastEvent),
    // Events that involve receiving an agreement message.
    ReceiveBVBroadcast(ReceiveBVBroadcastEvent),
    ReceiveAUXBroadcast(ReceiveAUXBroadcastEvent),
    RejectMessage(RejectMessageEvent),
    // Round progress events.
    AddBinValue(AddBinValueEvent),
    CommonCoin(CommonCoinEvent),
    AdvanceRound(AdvanceRoundEvent),
}

impl Event {
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            // The subscriber only goes away during shutdown.
            let _ = event_publisher.send(self);
        }
    }
}

pub struct StartConsensusEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub proposals: Vec<bool>,
}

pub struct DecideEvent {
    pub timestamp: SystemTime,
    pub key: ProtocolKey,
    pub decision: Decision,
}

pub struct CommitBlockEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub decision: BlockDecision,
}

pub struct EvictInstancesEvent {
    pub timestamp: SystemTime,
    pub oldest_retained_height: BlockHeight,
    pub evicted: usize,
}

pub struct RecoverEvent {
    pub timestamp: SystemTime,
    pub entries: usize,
}

pub struct BVBroadcastEvent {
    pub timestamp: SystemTime,
    pub bv_broadcast: BVBroadcast,
}

pub struct AUXBroadcastEvent {
    pub timestamp: SystemTime,
    pub aux_broadcast: AUXBroadcast,
}

pub struct ReceiveBVBroadcastEvent {
    pub timestamp: SystemTime,
    pub bv_broadcast: BVBroadcast,
}

pub struct ReceiveAUXBroadcastEvent {
    pub timestamp: SystemTime,
    pub aux_broadcast: AUXBroadcast,
}

pub struct RejectMessageEvent {
    pub timestamp: SystemTime,
    pub message: AgreementMessage,
    pub reason: String,
}

pub struct AddBinValueEvent {
    pub timestamp: SystemTime,
    pub key: ProtocolKey,
    pub round: Round,
    pub value: bool,
}

pub struct CommonCoinEvent {
    pub timestamp: SystemTime,
    pub key: ProtocolKey,
    pub round: Round,
    pub coin: bool,
}

pub struct AdvanceRoundEvent {
    pub timestamp: SystemTime,
    pub key: ProtocolKey,
    pub round: Round,
    pub proposal: bool,
}
