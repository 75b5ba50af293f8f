/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`BlockConsensusAgent`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::binary_agreement::messages::AgreementMessage;
use crate::binary_agreement::types::{AgreementConfiguration, Decision};
use crate::binary_agreement::BinaryAgreement;
use crate::common_coin::CommonCoin;
use crate::effects::Effect;
use crate::events::*;
use crate::recovery::LedgerEntry;
use crate::types::{
    data_types::{BlockHeight, ParticipantIndex},
    protocol_key::ProtocolKey,
};

use super::types::{AgentConfiguration, AgentError, BlockDecision};

/// Owns every [`BinaryAgreement`] of a chain and turns their decisions into one [`BlockDecision`] per
/// height.
pub struct BlockConsensusAgent<C: CommonCoin> {
    config: AgentConfiguration,
    coin: C,
    children: BTreeMap<ProtocolKey, BinaryAgreement>,
    true_decisions: BTreeMap<BlockHeight, BTreeSet<ParticipantIndex>>,
    false_decisions: BTreeMap<BlockHeight, BTreeSet<ParticipantIndex>>,
    decided_blocks: BTreeMap<BlockHeight, BlockDecision>,
    proposed_blocks: BTreeSet<BlockHeight>,
    oldest_retained_height: BlockHeight,
    event_publisher: Option<Sender<Event>>,
}

impl<C: CommonCoin> BlockConsensusAgent<C> {
    pub fn new(config: AgentConfiguration, coin: C, event_publisher: Option<Sender<Event>>) -> Self {
        Self {
            config,
            coin,
            children: BTreeMap::new(),
            true_decisions: BTreeMap::new(),
            false_decisions: BTreeMap::new(),
            decided_blocks: BTreeMap::new(),
            proposed_blocks: BTreeSet::new(),
            oldest_retained_height: BlockHeight::new(0),
            event_publisher,
        }
    }

    /// Start this replica's agreement instances for `height`.
    ///
    /// `proposals[i]` is this replica's claim about proposer `i + 1`: whether it received a valid,
    /// timely block proposal from that proposer for `height`.
    ///
    /// # Errors
    ///
    /// Fails without changing any state if `height` is 0, if consensus for `height` was already started
    /// here, if `height` was already finalized, or if there is not exactly one proposal per participant.
    pub fn start_consensus_for_height(
        &mut self,
        height: BlockHeight,
        proposals: Vec<bool>,
    ) -> Result<Vec<Effect>, AgentError> {
        if proposals.len() as u64 != self.config.node_count.int() {
            return Err(AgentError::WrongProposalCount {
                expected: self.config.node_count.int(),
                found: proposals.len() as u64,
            });
        }
        if height == BlockHeight::new(0) {
            return Err(AgentError::InvalidHeight { height });
        }
        if self.proposed_blocks.contains(&height) {
            return Err(AgentError::DuplicateStart { height });
        }
        if self.is_finalized(height) {
            return Err(AgentError::HeightAlreadyDecided { height });
        }

        self.proposed_blocks.insert(height);
        let mut effects = vec![Effect::AppendToLedger(LedgerEntry::StartConsensus {
            height,
            proposals: proposals.clone(),
        })];

        Event::StartConsensus(StartConsensusEvent {
            timestamp: SystemTime::now(),
            height,
            proposals: proposals.clone(),
        })
        .publish(&self.event_publisher);

        for (proposer, value) in self.config.node_count.participants().zip(proposals) {
            let key = ProtocolKey::new(height, proposer);
            if !self.children.contains_key(&key) {
                self.warn_if_registry_is_large(&key);
                let instance = self.new_instance(key);
                self.children.insert(key, instance);
            }
            let Some(instance) = self.children.get_mut(&key) else {
                continue;
            };
            // An instance that messages already carried past round 0 keeps its own estimate.
            match instance.propose(value, &self.coin) {
                Ok(instance_effects) => self.absorb(instance_effects, &mut effects),
                Err(err) => log::debug!("Skipping proposal for {:?}: {:?}", key, err),
            }
        }

        Ok(effects)
    }

    /// Deliver `message` to the instance it is addressed to, creating the instance if needed.
    ///
    /// Messages for heights below [`oldest_retained_height`](Self::oldest_retained_height) that have no
    /// live instance are dropped and produce no effects. Only votes the instance had not counted yet are
    /// written to the recovery ledger.
    ///
    /// # Errors
    ///
    /// Fails without changing any state if the message is addressed to height 0 or to a proposer
    /// outside the participant set, or if the instance rejects it.
    pub fn route_message(&mut self, message: AgreementMessage) -> Result<Vec<Effect>, AgentError> {
        let key = message.key();
        if key.height == BlockHeight::new(0) {
            let err = AgentError::InvalidHeight { height: key.height };
            self.reject(message, &err);
            return Err(err);
        }
        if !key.proposer.is_within(self.config.node_count) {
            let err = AgentError::InvalidProposer {
                proposer: key.proposer,
            };
            self.reject(message, &err);
            return Err(err);
        }

        if !self.children.contains_key(&key) && key.height < self.oldest_retained_height {
            log::debug!(
                "Dropping message for instance {} below the retention window",
                key
            );
            return Ok(Vec::new());
        }

        let is_new_vote = self
            .children
            .get(&key)
            .map_or(true, |instance| instance.is_new_vote(&message));

        // A new instance only joins the registry if the message that references it is valid.
        let result = if let Some(instance) = self.children.get_mut(&key) {
            instance.process_network_message(message.clone(), &self.coin)
        } else {
            let mut instance = self.new_instance(key);
            let result = instance.process_network_message(message.clone(), &self.coin);
            if result.is_ok() {
                self.warn_if_registry_is_large(&key);
                self.children.insert(key, instance);
            }
            result
        };

        let instance_effects = match result {
            Ok(instance_effects) => instance_effects,
            Err(err) => {
                let err = AgentError::from(err);
                self.reject(message, &err);
                return Err(err);
            }
        };

        let mut effects = Vec::new();
        if is_new_vote {
            effects.push(Effect::AppendToLedger(LedgerEntry::Received(message)));
        }
        self.absorb(instance_effects, &mut effects);
        Ok(effects)
    }

    /// Get the final decision for `height`, if it is known.
    pub fn decision(&self, height: BlockHeight) -> Option<BlockDecision> {
        self.decided_blocks.get(&height).copied()
    }

    /// Replay `entries`, read from the recovery ledger, through the normal input paths.
    ///
    /// The returned effects are the ones the replay produced, except for ledger appends: the entries are
    /// already in the ledger. Re-broadcasting the returned messages is safe since receivers deduplicate.
    pub fn recover(&mut self, entries: Vec<LedgerEntry>) -> Vec<Effect> {
        let mut effects = Vec::new();
        let num_entries = entries.len();

        for entry in entries {
            let result = match entry {
                LedgerEntry::StartConsensus { height, proposals } => {
                    self.start_consensus_for_height(height, proposals)
                }
                LedgerEntry::Received(message) => self.route_message(message),
            };

            match result {
                Ok(entry_effects) => effects.extend(
                    entry_effects
                        .into_iter()
                        .filter(|effect| !matches!(effect, Effect::AppendToLedger(_))),
                ),
                Err(err) => log::warn!("Skipping ledger entry during recovery: {:?}", err),
            }
        }

        Event::Recover(RecoverEvent {
            timestamp: SystemTime::now(),
            entries: num_entries,
        })
        .publish(&self.event_publisher);

        effects
    }

    /// Get the live instance identified by `key`, if any.
    pub fn instance(&self, key: &ProtocolKey) -> Option<&BinaryAgreement> {
        self.children.get(key)
    }

    /// Number of live instances.
    pub fn live_instances(&self) -> usize {
        self.children.len()
    }

    /// Messages for heights below this one are dropped unless the instance they address is still alive.
    /// The only instances alive below it belong to heights this replica started and has not finalized.
    pub fn oldest_retained_height(&self) -> BlockHeight {
        self.oldest_retained_height
    }

    /// Proposers whose instance for `height` decided `true`.
    pub fn true_decisions(&self, height: BlockHeight) -> BTreeSet<ParticipantIndex> {
        self.true_decisions.get(&height).cloned().unwrap_or_default()
    }

    /// Proposers whose instance for `height` decided `false`.
    pub fn false_decisions(&self, height: BlockHeight) -> BTreeSet<ParticipantIndex> {
        self.false_decisions.get(&height).cloned().unwrap_or_default()
    }

    fn absorb(&mut self, instance_effects: Vec<Effect>, effects: &mut Vec<Effect>) {
        for effect in instance_effects {
            if let Effect::InstanceDecided { key, decision } = effect {
                effects.push(effect);
                self.record_decision(key, decision, effects);
            } else {
                effects.push(effect);
            }
        }
    }

    fn record_decision(&mut self, key: ProtocolKey, decision: Decision, effects: &mut Vec<Effect>) {
        let decisions = if decision.value {
            &mut self.true_decisions
        } else {
            &mut self.false_decisions
        };
        decisions.entry(key.height).or_default().insert(key.proposer);

        // Decisions that arrive after the height was finalized are only kept for auditing.
        if !self.decided_blocks.contains_key(&key.height) {
            self.try_finalize(key.height, effects);
        }
    }

    /// Finalize `height` if its outcome is already determined.
    ///
    /// Proposers are scanned in ascending index order. The first proposer decided `true` wins, but only
    /// once every lower proposer is known to have been decided `false`, so that every correct replica
    /// commits the same proposer whatever order its instances decide in. If every proposer is decided
    /// `false`, the height commits an empty block.
    fn try_finalize(&mut self, height: BlockHeight, effects: &mut Vec<Effect>) {
        let no_decisions = BTreeSet::new();
        let trues = self.true_decisions.get(&height).unwrap_or(&no_decisions);
        let falses = self.false_decisions.get(&height).unwrap_or(&no_decisions);

        let mut decision = BlockDecision::Empty;
        for proposer in self.config.node_count.participants() {
            if trues.contains(&proposer) {
                decision = BlockDecision::Proposer(proposer);
                break;
            }
            if !falses.contains(&proposer) {
                return;
            }
        }

        self.finalize(height, decision, effects);
    }

    /// # Panics
    ///
    /// If `height` was already finalized. Block decisions are write-once.
    fn finalize(&mut self, height: BlockHeight, decision: BlockDecision, effects: &mut Vec<Effect>) {
        if let Some(existing) = self.decided_blocks.insert(height, decision) {
            panic!(
                "Height {} was finalized as {:?} and then as {:?}",
                height, existing, decision
            )
        }

        Event::CommitBlock(CommitBlockEvent {
            timestamp: SystemTime::now(),
            height,
            decision,
        })
        .publish(&self.event_publisher);

        effects.push(Effect::CommitBlock { height, decision });
        self.collect_garbage(height, effects);
    }

    /// Evict the instances of heights that have fallen out of the retention window behind
    /// `finalized_height`, unless this replica started them and has not finalized them yet.
    fn collect_garbage(&mut self, finalized_height: BlockHeight, effects: &mut Vec<Effect>) {
        let retention = self.config.instance_retention_heights;
        if finalized_height.int() < retention {
            return;
        }
        let cutoff = BlockHeight::new(finalized_height.int() - retention);

        // Instances of heights this replica never started were created by peer traffic alone.
        let evictable: BTreeSet<BlockHeight> = self
            .children
            .keys()
            .map(|key| key.height)
            .chain(self.proposed_blocks.iter().copied())
            .filter(|height| {
                *height <= cutoff && (self.is_finalized(*height) || !self.proposed_blocks.contains(height))
            })
            .collect();

        let evicted: Vec<ProtocolKey> = self
            .children
            .keys()
            .filter(|key| evictable.contains(&key.height))
            .copied()
            .collect();
        for key in &evicted {
            self.children.remove(key);
        }
        self.true_decisions.retain(|height, _| !evictable.contains(height));
        self.false_decisions.retain(|height, _| !evictable.contains(height));
        self.proposed_blocks.retain(|height| !evictable.contains(height));

        if cutoff + 1 > self.oldest_retained_height {
            self.oldest_retained_height = cutoff + 1;
        }

        if !evicted.is_empty() {
            log::debug!(
                "Evicted {} instances, oldest retained height is now {}",
                evicted.len(),
                self.oldest_retained_height
            );

            Event::EvictInstances(EvictInstancesEvent {
                timestamp: SystemTime::now(),
                oldest_retained_height: self.oldest_retained_height,
                evicted: evicted.len(),
            })
            .publish(&self.event_publisher);

            // Heights this replica started and has not finalized keep their ledger entries.
            let below = self
                .children
                .keys()
                .next()
                .map_or(self.oldest_retained_height, |key| {
                    std::cmp::min(key.height, self.oldest_retained_height)
                });
            effects.push(Effect::PruneLedger { below });
        }
    }

    fn is_finalized(&self, height: BlockHeight) -> bool {
        self.decided_blocks.contains_key(&height)
    }

    fn new_instance(&self, key: ProtocolKey) -> BinaryAgreement {
        BinaryAgreement::new(
            agreement_configuration(&self.config),
            key,
            self.event_publisher.clone(),
        )
    }

    fn warn_if_registry_is_large(&self, key: &ProtocolKey) {
        if self.children.len() >= self.config.max_live_instances {
            log::warn!(
                "{} instances are alive while creating instance {}; heights are not being finalized",
                self.children.len(),
                key
            );
        }
    }

    fn reject(&self, message: AgreementMessage, err: &AgentError) {
        log::warn!(
            "Rejected message for instance {} from participant {}: {:?}",
            message.key(),
            message.sender(),
            err
        );

        Event::RejectMessage(RejectMessageEvent {
            timestamp: SystemTime::now(),
            message,
            reason: format!("{:?}", err),
        })
        .publish(&self.event_publisher);
    }
}

fn agreement_configuration(config: &AgentConfiguration) -> AgreementConfiguration {
    AgreementConfiguration {
        chain_id: config.chain_id,
        me: config.me,
        node_count: config.node_count,
        max_round: config.max_round,
    }
}
