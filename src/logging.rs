/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the replica's
//! [configuration](crate::replica::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! Events about a single agreement instance continue with the height and the proposer index of the
//! instance. For example, the following snippet is how an
//! [AUXBroadcast](crate::events::AUXBroadcastEvent) is printed:
//!
//! ```text
//! AUXBroadcast, 1701329264, 12, 3, 0, true, Id5u7f6
//! ```
//!
//! In the snippet:
//! - The third and fourth values are the height and the proposer index.
//! - The fifth value is the round.
//! - The sixth value is the AUX-broadcast value.
//! - The seventh value is the first seven characters of the Base64 encoding of the common-coin share.

use crate::block_consensus::types::BlockDecision;
use crate::events::*;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

// Names of each event in PascalCase for printing:
pub const START_CONSENSUS: &str = "StartConsensus";
pub const DECIDE: &str = "Decide";
pub const COMMIT_BLOCK: &str = "CommitBlock";
pub const EVICT_INSTANCES: &str = "EvictInstances";
pub const RECOVER: &str = "Recover";

pub const BV_BROADCAST: &str = "BVBroadcast";
pub const AUX_BROADCAST: &str = "AUXBroadcast";

pub const RECEIVE_BV_BROADCAST: &str = "ReceiveBVBroadcast";
pub const RECEIVE_AUX_BROADCAST: &str = "ReceiveAUXBroadcast";
pub const REJECT_MESSAGE: &str = "RejectMessage";

pub const ADD_BIN_VALUE: &str = "AddBinValue";
pub const COMMON_COIN: &str = "CommonCoin";
pub const ADVANCE_ROUND: &str = "AdvanceRound";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for StartConsensusEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_consensus_event: &StartConsensusEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_CONSENSUS,
                secs_since_unix_epoch(start_consensus_event.timestamp),
                start_consensus_event.height,
                proposals_bitmap(&start_consensus_event.proposals)
            )
        };
        Box::new(logger)
    }
}

impl Logger for DecideEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |decide_event: &DecideEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                DECIDE,
                secs_since_unix_epoch(decide_event.timestamp),
                decide_event.key.height,
                decide_event.key.proposer,
                decide_event.decision.round,
                decide_event.decision.value
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_block_event: &CommitBlockEvent| {
            let decision = match commit_block_event.decision {
                BlockDecision::Proposer(proposer) => proposer.to_string(),
                BlockDecision::Empty => String::from("empty"),
            };
            log::info!(
                "{}, {}, {}, {}",
                COMMIT_BLOCK,
                secs_since_unix_epoch(commit_block_event.timestamp),
                commit_block_event.height,
                decision
            )
        };
        Box::new(logger)
    }
}

impl Logger for EvictInstancesEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |evict_instances_event: &EvictInstancesEvent| {
            log::info!(
                "{}, {}, {}, {}",
                EVICT_INSTANCES,
                secs_since_unix_epoch(evict_instances_event.timestamp),
                evict_instances_event.oldest_retained_height,
                evict_instances_event.evicted
            )
        };
        Box::new(logger)
    }
}

impl Logger for RecoverEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |recover_event: &RecoverEvent| {
            log::info!(
                "{}, {}, {}",
                RECOVER,
                secs_since_unix_epoch(recover_event.timestamp),
                recover_event.entries
            )
        };
        Box::new(logger)
    }
}

impl Logger for BVBroadcastEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |bv_broadcast_event: &BVBroadcastEvent| {
            let bv_broadcast = &bv_broadcast_event.bv_broadcast;
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                BV_BROADCAST,
                secs_since_unix_epoch(bv_broadcast_event.timestamp),
                bv_broadcast.key.height,
                bv_broadcast.key.proposer,
                bv_broadcast.round,
                bv_broadcast.value
            )
        };
        Box::new(logger)
    }
}

impl Logger for AUXBroadcastEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |aux_broadcast_event: &AUXBroadcastEvent| {
            let aux_broadcast = &aux_broadcast_event.aux_broadcast;
            log::info!(
                "{}, {}, {}, {}, {}, {}, {}",
                AUX_BROADCAST,
                secs_since_unix_epoch(aux_broadcast_event.timestamp),
                aux_broadcast.key.height,
                aux_broadcast.key.proposer,
                aux_broadcast.round,
                aux_broadcast.value,
                first_seven_base64_chars(aux_broadcast.signature_share.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveBVBroadcastEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_bv_broadcast_event: &ReceiveBVBroadcastEvent| {
            let bv_broadcast = &receive_bv_broadcast_event.bv_broadcast;
            log::info!(
                "{}, {}, {}, {}, {}, {}, {}",
                RECEIVE_BV_BROADCAST,
                secs_since_unix_epoch(receive_bv_broadcast_event.timestamp),
                bv_broadcast.key.height,
                bv_broadcast.key.proposer,
                bv_broadcast.round,
                bv_broadcast.value,
                bv_broadcast.sender
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveAUXBroadcastEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_aux_broadcast_event: &ReceiveAUXBroadcastEvent| {
            let aux_broadcast = &receive_aux_broadcast_event.aux_broadcast;
            log::info!(
                "{}, {}, {}, {}, {}, {}, {}, {}",
                RECEIVE_AUX_BROADCAST,
                secs_since_unix_epoch(receive_aux_broadcast_event.timestamp),
                aux_broadcast.key.height,
                aux_broadcast.key.proposer,
                aux_broadcast.round,
                aux_broadcast.value,
                aux_broadcast.sender,
                first_seven_base64_chars(aux_broadcast.signature_share.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectMessageEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_message_event: &RejectMessageEvent| {
            let key = reject_message_event.message.key();
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                REJECT_MESSAGE,
                secs_since_unix_epoch(reject_message_event.timestamp),
                key.height,
                key.proposer,
                reject_message_event.message.sender(),
                reject_message_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for AddBinValueEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |add_bin_value_event: &AddBinValueEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                ADD_BIN_VALUE,
                secs_since_unix_epoch(add_bin_value_event.timestamp),
                add_bin_value_event.key.height,
                add_bin_value_event.key.proposer,
                add_bin_value_event.round,
                add_bin_value_event.value
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommonCoinEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |common_coin_event: &CommonCoinEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                COMMON_COIN,
                secs_since_unix_epoch(common_coin_event.timestamp),
                common_coin_event.key.height,
                common_coin_event.key.proposer,
                common_coin_event.round,
                common_coin_event.coin
            )
        };
        Box::new(logger)
    }
}

impl Logger for AdvanceRoundEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |advance_round_event: &AdvanceRoundEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                ADVANCE_ROUND,
                secs_since_unix_epoch(advance_round_event.timestamp),
                advance_round_event.key.height,
                advance_round_event.key.proposer,
                advance_round_event.round,
                advance_round_event.proposal
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

// Print proposals as a string of 1s and 0s, proposer 1 first.
fn proposals_bitmap(proposals: &[bool]) -> String {
    proposals
        .iter()
        .map(|proposal| if *proposal { '1' } else { '0' })
        .collect()
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
