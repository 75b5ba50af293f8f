/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`BinaryAgreement`] state machine.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::common_coin::{coin_seed, CommonCoin};
use crate::effects::Effect;
use crate::events::*;
use crate::types::{
    data_types::{ParticipantIndex, Round},
    protocol_key::ProtocolKey,
    quorum::{is_strong_quorum, is_weak_quorum},
};

use super::messages::{AUXBroadcast, AgreementMessage, BVBroadcast};
use super::types::{AgreementConfiguration, AgreementError, AgreementState, BinValues, Decision};

/// A single asynchronous binary agreement, deciding one boolean for one [`ProtocolKey`].
///
/// `BinaryAgreement` never performs I/O and never calls into its owner. Its two entry points,
/// [`propose`](Self::propose) and [`process_network_message`](Self::process_network_message), return
/// the [`Effect`]s they produced: this replica's own votes, to everyone or to one lagging participant,
/// and, at most once, the instance's decision.
pub struct BinaryAgreement {
    config: AgreementConfiguration,
    key: ProtocolKey,
    state: AgreementState,
    event_publisher: Option<Sender<Event>>,
}

impl BinaryAgreement {
    pub fn new(
        config: AgreementConfiguration,
        key: ProtocolKey,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            config,
            key,
            state: AgreementState::default(),
            event_publisher,
        }
    }

    pub fn key(&self) -> ProtocolKey {
        self.key
    }

    pub fn current_round(&self) -> Round {
        self.state.current_round
    }

    /// Get the instance's decision, if it has decided.
    pub fn decision(&self) -> Option<Decision> {
        self.state.decision
    }

    /// Get a read-only view of everything this instance knows.
    pub fn state(&self) -> &AgreementState {
        &self.state
    }

    /// Get the values that reached a weak quorum of BV votes in `round`.
    pub fn bin_values(&self, round: Round) -> BinValues {
        self.state
            .bin_values
            .get(&round)
            .copied()
            .unwrap_or_default()
    }

    pub fn bv_vote_count(&self, round: Round, value: bool) -> u64 {
        self.state
            .bv_votes
            .get(&round)
            .map_or(0, |votes| votes.count(value))
    }

    pub fn aux_vote_count(&self, round: Round, value: bool) -> u64 {
        self.state
            .aux_votes
            .get(&round)
            .map_or(0, |votes| votes.count(value))
    }

    /// Whether `message` carries a vote this instance has not counted yet.
    pub fn is_new_vote(&self, message: &AgreementMessage) -> bool {
        let (round, value, sender) = (message.round(), message.value(), message.sender());
        match message {
            AgreementMessage::BVBroadcast(_) => !self
                .state
                .bv_votes
                .get(&round)
                .map_or(false, |votes| votes.contains(value, sender)),
            AgreementMessage::AUXBroadcast(_) => !self
                .state
                .aux_votes
                .get(&round)
                .map_or(false, |votes| votes.contains(value, sender)),
        }
    }

    /// Set this replica's round 0 estimate to `value` and BV-broadcast it.
    ///
    /// # Errors
    ///
    /// [`AgreementError::AlreadyProposed`] if this instance already has a round 0 proposal, or has
    /// already left round 0. The state of the instance is left untouched.
    pub fn propose<C: CommonCoin>(
        &mut self,
        value: bool,
        coin: &C,
    ) -> Result<Vec<Effect>, AgreementError> {
        let round = Round::new(0);
        if self.state.proposals.contains_key(&round) || self.state.current_round > round {
            return Err(AgreementError::AlreadyProposed { key: self.key });
        }

        let mut effects = Vec::new();
        self.state.proposals.insert(round, value);
        self.bv_broadcast(round, value, coin, &mut effects);
        Ok(effects)
    }

    /// Fold a vote from another participant into the instance.
    ///
    /// Delivering the same message more than once has no effect after the first delivery.
    ///
    /// # Errors
    ///
    /// Returns an error, without changing any state, if the message was produced for another chain or
    /// instance, comes from outside the participant set, names a round beyond the configured maximum,
    /// or carries a common-coin share that does not verify.
    pub fn process_network_message<C: CommonCoin>(
        &mut self,
        message: AgreementMessage,
        coin: &C,
    ) -> Result<Vec<Effect>, AgreementError> {
        self.validate(&message, coin)?;

        let mut effects = Vec::new();
        match message {
            AgreementMessage::BVBroadcast(bv_broadcast) => {
                self.on_receive_bv_broadcast(bv_broadcast, coin, &mut effects)
            }
            AgreementMessage::AUXBroadcast(aux_broadcast) => {
                self.on_receive_aux_broadcast(aux_broadcast, coin, &mut effects)
            }
        }
        Ok(effects)
    }

    fn validate<C: CommonCoin>(
        &self,
        message: &AgreementMessage,
        coin: &C,
    ) -> Result<(), AgreementError> {
        if message.chain_id() != self.config.chain_id {
            return Err(AgreementError::WrongChain {
                expected: self.config.chain_id,
                found: message.chain_id(),
            });
        }

        if message.key() != self.key {
            return Err(AgreementError::WrongProtocolKey {
                expected: self.key,
                found: message.key(),
            });
        }

        if !message.sender().is_within(self.config.node_count) {
            return Err(AgreementError::UnknownSender {
                sender: message.sender(),
            });
        }

        if message.round() > self.config.max_round {
            return Err(AgreementError::RoundTooLarge {
                round: message.round(),
                max_round: self.config.max_round,
            });
        }

        if let AgreementMessage::AUXBroadcast(aux_broadcast) = message {
            let seed = coin_seed(self.config.chain_id, &self.key, aux_broadcast.round);
            if !coin.verify_share(&seed, aux_broadcast.sender, &aux_broadcast.signature_share) {
                return Err(AgreementError::InvalidSignatureShare {
                    sender: aux_broadcast.sender,
                    round: aux_broadcast.round,
                });
            }
        }

        Ok(())
    }

    fn on_receive_bv_broadcast<C: CommonCoin>(
        &mut self,
        bv_broadcast: BVBroadcast,
        coin: &C,
        effects: &mut Vec<Effect>,
    ) {
        let (round, value, sender) = (bv_broadcast.round, bv_broadcast.value, bv_broadcast.sender);

        Event::ReceiveBVBroadcast(ReceiveBVBroadcastEvent {
            timestamp: SystemTime::now(),
            bv_broadcast,
        })
        .publish(&self.event_publisher);

        if self.on_bv_vote(round, value, sender, coin, effects) {
            self.retransmit(round, sender, effects);
        }
    }

    fn on_receive_aux_broadcast<C: CommonCoin>(
        &mut self,
        aux_broadcast: AUXBroadcast,
        coin: &C,
        effects: &mut Vec<Effect>,
    ) {
        let (round, value, sender) = (aux_broadcast.round, aux_broadcast.value, aux_broadcast.sender);
        let share = aux_broadcast.signature_share.clone();

        Event::ReceiveAUXBroadcast(ReceiveAUXBroadcastEvent {
            timestamp: SystemTime::now(),
            aux_broadcast,
        })
        .publish(&self.event_publisher);

        let inserted = self
            .state
            .aux_votes
            .entry(round)
            .or_default()
            .insert(value, sender, share);
        if !inserted {
            return;
        }

        self.try_lottery(round, coin, effects);
        self.follow_if_decided(coin, effects);
    }

    /// Count a BV vote, including this replica's own.
    fn on_bv_vote<C: CommonCoin>(
        &mut self,
        round: Round,
        value: bool,
        sender: ParticipantIndex,
        coin: &C,
        effects: &mut Vec<Effect>,
    ) -> bool {
        let votes = self.state.bv_votes.entry(round).or_default();
        if !votes.insert(value, sender) {
            return false;
        }
        let reached_weak_quorum = is_weak_quorum(votes.count(value), self.config.node_count);

        // 1. At least one correct participant supports `value`: relay it. Rounds this replica has
        //    already left are counted but never trigger a broadcast.
        if reached_weak_quorum && round >= self.state.current_round {
            self.bv_broadcast(round, value, coin, effects);
        }

        // 2. Admit `value` into this round's bin values.
        if reached_weak_quorum {
            self.add_bin_value(round, value, coin, effects);
        }

        self.follow_if_decided(coin, effects);
        true
    }

    /// Once decided, answer a new BV vote from a participant that is still in `round` or an earlier
    /// round by sending it this replica's own votes for that round.
    fn retransmit(&self, round: Round, peer: ParticipantIndex, effects: &mut Vec<Effect>) {
        if self.state.decision.is_none() || peer == self.config.me || round > self.state.current_round {
            return;
        }
        let Some(guard) = self.state.broadcast_guard.get(&round) else {
            return;
        };

        for value in guard.bv.iter() {
            let bv_broadcast = BVBroadcast {
                chain_id: self.config.chain_id,
                key: self.key,
                round,
                value,
                sender: self.config.me,
            };
            effects.push(Effect::SendTo {
                peer,
                message: bv_broadcast.into(),
            });
        }

        let own_aux = guard.aux.and_then(|value| {
            self.state
                .aux_votes
                .get(&round)
                .and_then(|votes| votes.share(value, self.config.me))
                .map(|share| (value, share.clone()))
        });
        if let Some((value, signature_share)) = own_aux {
            let aux_broadcast = AUXBroadcast {
                chain_id: self.config.chain_id,
                key: self.key,
                round,
                value,
                sender: self.config.me,
                signature_share,
            };
            effects.push(Effect::SendTo {
                peer,
                message: aux_broadcast.into(),
            });
        }
    }

    fn add_bin_value<C: CommonCoin>(
        &mut self,
        round: Round,
        value: bool,
        coin: &C,
        effects: &mut Vec<Effect>,
    ) {
        if !self.state.bin_values.entry(round).or_default().insert(value) {
            return;
        }

        Event::AddBinValue(AddBinValueEvent {
            timestamp: SystemTime::now(),
            key: self.key,
            round,
            value,
        })
        .publish(&self.event_publisher);

        if round >= self.state.current_round {
            self.aux_broadcast(round, value, coin, effects);
        }
        self.try_lottery(round, coin, effects);
    }

    /// Flip the common coin for `round` and act on it, provided that `round` is the current round and a
    /// strong quorum of participants has AUX-voted for values in `round`'s bin values.
    ///
    /// With `S` the set of values in those AUX votes:
    /// - `S = {v}`, `v` is the only bin value, and the coin is `v`: decide `v`.
    /// - `S = {v}` otherwise: enter the next round with `v`.
    /// - `S = {true, false}`: enter the next round with the coin.
    fn try_lottery<C: CommonCoin>(&mut self, round: Round, coin: &C, effects: &mut Vec<Effect>) {
        if self.state.decision.is_some()
            || round != self.state.current_round
            || self.state.coins.contains_key(&round)
        {
            return;
        }

        let bin_values = self.bin_values(round);
        let Some(aux_votes) = self.state.aux_votes.get(&round) else {
            return;
        };
        let senders = aux_votes.senders_within(bin_values);
        if !is_strong_quorum(senders.len() as u64, self.config.node_count) {
            return;
        }
        let observed = aux_votes.values_within(bin_values);
        let shares = aux_votes.shares_within(bin_values);

        let seed = coin_seed(self.config.chain_id, &self.key, round);
        let coin_value = match coin.combine_shares(&seed, &shares) {
            Ok(signature) => coin.signature_to_bit(&signature),
            Err(err) => {
                log::warn!(
                    "Could not combine common coin shares for instance {} round {}: {:?}",
                    self.key,
                    round,
                    err
                );
                return;
            }
        };
        self.state.coins.insert(round, coin_value);

        Event::CommonCoin(CommonCoinEvent {
            timestamp: SystemTime::now(),
            key: self.key,
            round,
            coin: coin_value,
        })
        .publish(&self.event_publisher);

        match observed.single() {
            Some(value) if value == coin_value && bin_values.single() == Some(value) => {
                self.decide(value, coin, effects)
            }
            Some(value) => self.advance_round(value, coin, effects),
            None => self.advance_round(coin_value, coin, effects),
        }
    }

    /// # Panics
    ///
    /// If the instance has already decided a different value. Two different decisions can only come
    /// from a defect or from more Byzantine participants than the protocol tolerates.
    fn decide<C: CommonCoin>(&mut self, value: bool, coin: &C, effects: &mut Vec<Effect>) {
        if let Some(decision) = self.state.decision {
            if decision.value != value {
                panic!(
                    "Instance {} decided {} in round {} and then attempted to decide {}",
                    self.key, decision.value, decision.round, value
                )
            }
            return;
        }

        let decision = Decision {
            value,
            round: self.state.current_round,
        };
        self.state.decision = Some(decision);

        Event::Decide(DecideEvent {
            timestamp: SystemTime::now(),
            key: self.key,
            decision,
        })
        .publish(&self.event_publisher);

        effects.push(Effect::InstanceDecided {
            key: self.key,
            decision,
        });

        self.follow_if_decided(coin, effects);
    }

    /// Enter the round after the current one with `proposal` as this replica's estimate.
    fn advance_round<C: CommonCoin>(&mut self, proposal: bool, coin: &C, effects: &mut Vec<Effect>) {
        let round = self.state.current_round.next();
        if round > self.config.max_round {
            log::error!(
                "Instance {} cannot advance past round {}",
                self.key,
                self.config.max_round
            );
            return;
        }

        self.state.current_round = round;
        self.state.proposals.insert(round, proposal);

        Event::AdvanceRound(AdvanceRoundEvent {
            timestamp: SystemTime::now(),
            key: self.key,
            round,
            proposal,
        })
        .publish(&self.event_publisher);

        self.bv_broadcast(round, proposal, coin, effects);

        // Votes for this round may have arrived while this replica was behind.
        if let Some(value) = self.bin_values(round).any() {
            self.aux_broadcast(round, value, coin, effects);
        }
        self.try_lottery(round, coin, effects);
        self.follow_if_decided(coin, effects);
    }

    /// A decided instance keeps taking part in later rounds with its decided value, so that undecided
    /// participants still see a full quorum of correct votes. It moves on once the rest of the
    /// participants have started the next round and its current round has a strong quorum of AUX votes.
    fn follow_if_decided<C: CommonCoin>(&mut self, coin: &C, effects: &mut Vec<Effect>) {
        let Some(decision) = self.state.decision else {
            return;
        };

        let current_round = self.state.current_round;
        let next_round_started = self
            .state
            .bv_votes
            .get(&current_round.next())
            .map_or(false, |votes| !votes.is_empty());
        let aux_senders = self
            .state
            .aux_votes
            .get(&current_round)
            .map_or(0, |votes| votes.senders().len() as u64);

        if next_round_started && is_strong_quorum(aux_senders, self.config.node_count) {
            self.advance_round(decision.value, coin, effects);
        }
    }

    /// BV-broadcast `value` in `round` unless this replica already has, counting its own vote.
    fn bv_broadcast<C: CommonCoin>(
        &mut self,
        round: Round,
        value: bool,
        coin: &C,
        effects: &mut Vec<Effect>,
    ) {
        if !self
            .state
            .broadcast_guard
            .entry(round)
            .or_default()
            .bv
            .insert(value)
        {
            return;
        }

        let bv_broadcast = BVBroadcast {
            chain_id: self.config.chain_id,
            key: self.key,
            round,
            value,
            sender: self.config.me,
        };

        Event::BVBroadcast(BVBroadcastEvent {
            timestamp: SystemTime::now(),
            bv_broadcast: bv_broadcast.clone(),
        })
        .publish(&self.event_publisher);

        effects.push(Effect::Broadcast(bv_broadcast.into()));
        self.on_bv_vote(round, value, self.config.me, coin, effects);
    }

    /// AUX-broadcast `value` in `round` with this replica's coin share, at most once per round.
    fn aux_broadcast<C: CommonCoin>(
        &mut self,
        round: Round,
        value: bool,
        coin: &C,
        effects: &mut Vec<Effect>,
    ) {
        let guard = self.state.broadcast_guard.entry(round).or_default();
        if guard.aux.is_some() {
            return;
        }
        guard.aux = Some(value);

        let seed = coin_seed(self.config.chain_id, &self.key, round);
        let signature_share = coin.sign_share(&seed);
        self.state.aux_votes.entry(round).or_default().insert(
            value,
            self.config.me,
            signature_share.clone(),
        );

        let aux_broadcast = AUXBroadcast {
            chain_id: self.config.chain_id,
            key: self.key,
            round,
            value,
            sender: self.config.me,
            signature_share,
        };

        Event::AUXBroadcast(AUXBroadcastEvent {
            timestamp: SystemTime::now(),
            aux_broadcast: aux_broadcast.clone(),
        })
        .publish(&self.event_publisher);

        effects.push(Effect::Broadcast(aux_broadcast.into()));
    }
}
