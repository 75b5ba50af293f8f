//! In-process simulation of a participant set, with an adversarially shuffled message schedule.
//!
//! Every correct participant runs a [`BlockConsensusAgent`]. Messages are delivered one at a time, in
//! an order drawn from a seeded RNG, so runs are reproducible. Byzantine participants run no agent:
//! they send both values in every phase of the first few rounds of every instance.

use std::collections::BTreeMap;

use abba_rs::{
    binary_agreement::messages::AgreementMessage,
    block_consensus::{
        types::{AgentError, BlockDecision},
        BlockConsensusAgent,
    },
    common_coin::{coin_seed, CommonCoin, Ed25519Coin},
    effects::Effect,
    types::{
        data_types::{BlockHeight, NodeCount, ParticipantIndex, Round},
        protocol_key::ProtocolKey,
    },
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::coins::{agent_configuration, test_coins, CHAIN_ID};

/// Rounds in which Byzantine participants equivocate.
const BYZANTINE_ROUNDS: u64 = 4;

/// Upper bound on deliveries in a single [`Simulation::run`].
const MAX_DELIVERIES: usize = 5_000_000;

pub(crate) struct Simulation {
    node_count: NodeCount,
    agents: BTreeMap<ParticipantIndex, BlockConsensusAgent<Ed25519Coin>>,
    byzantine: BTreeMap<ParticipantIndex, Ed25519Coin>,
    in_flight: Vec<(ParticipantIndex, AgreementMessage)>,
    commits: BTreeMap<ParticipantIndex, Vec<(BlockHeight, BlockDecision)>>,
    rng: StdRng,
}

impl Simulation {
    /// Create a simulation of `node_count` participants, of which those in `byzantine` are faulty.
    pub(crate) fn new(node_count: u64, byzantine: &[u64], seed: u64) -> Simulation {
        let node_count = NodeCount::new(node_count);
        let mut agents = BTreeMap::new();
        let mut faulty = BTreeMap::new();

        for (participant, coin) in test_coins(node_count) {
            if byzantine.contains(&participant.int()) {
                faulty.insert(participant, coin);
            } else {
                let config = agent_configuration(participant, node_count);
                agents.insert(participant, BlockConsensusAgent::new(config, coin, None));
            }
        }

        Simulation {
            node_count,
            agents,
            byzantine: faulty,
            in_flight: Vec::new(),
            commits: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub(crate) fn correct_participants(&self) -> Vec<ParticipantIndex> {
        self.agents.keys().copied().collect()
    }

    /// Start `height` on every participant. Correct participant `p` proposes `proposals(p)`.
    pub(crate) fn start_height(
        &mut self,
        height: BlockHeight,
        proposals: impl Fn(ParticipantIndex) -> Vec<bool>,
    ) {
        for participant in self.correct_participants() {
            self.start_for(participant, height, proposals(participant))
                .unwrap();
        }
        self.equivocate(height);
    }

    /// Start `height` on the correct participant `participant` only.
    pub(crate) fn start_for(
        &mut self,
        participant: ParticipantIndex,
        height: BlockHeight,
        proposals: Vec<bool>,
    ) -> Result<(), AgentError> {
        let agent = self.agents.get_mut(&participant).unwrap();
        let effects = agent.start_consensus_for_height(height, proposals)?;
        self.dispatch(participant, effects);
        Ok(())
    }

    /// Deliver messages in random order until none is left.
    pub(crate) fn run(&mut self) {
        let mut deliveries = 0;
        while !self.in_flight.is_empty() {
            deliveries += 1;
            assert!(
                deliveries <= MAX_DELIVERIES,
                "Simulation did not quiesce after {} deliveries",
                MAX_DELIVERIES
            );

            let index = self.rng.gen_range(0, self.in_flight.len());
            let (recipient, message) = self.in_flight.swap_remove(index);
            let Some(agent) = self.agents.get_mut(&recipient) else {
                continue;
            };
            if let Ok(effects) = agent.route_message(message) {
                self.dispatch(recipient, effects);
            }
        }
    }

    pub(crate) fn agent(&self, participant: ParticipantIndex) -> &BlockConsensusAgent<Ed25519Coin> {
        &self.agents[&participant]
    }

    pub(crate) fn decision(&self, participant: ParticipantIndex, height: BlockHeight) -> Option<BlockDecision> {
        self.agent(participant).decision(height)
    }

    /// Every `CommitBlock` effect `participant` produced, in order.
    pub(crate) fn commits(&self, participant: ParticipantIndex) -> Vec<(BlockHeight, BlockDecision)> {
        self.commits.get(&participant).cloned().unwrap_or_default()
    }

    /// Assert that every correct participant decided every instance of `height`, identically.
    pub(crate) fn assert_agreement(&self, height: BlockHeight) -> BlockDecision {
        let participants = self.correct_participants();
        let first = self.decision(participants[0], height).unwrap_or_else(|| {
            panic!("Participant {} did not finalize height {}", participants[0], height)
        });

        for participant in &participants {
            assert_eq!(self.decision(*participant, height), Some(first));
            assert_eq!(
                self.agent(*participant).true_decisions(height),
                self.agent(participants[0]).true_decisions(height)
            );
        }
        first
    }

    fn dispatch(&mut self, from: ParticipantIndex, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Broadcast(message) => {
                    for recipient in self.agents.keys() {
                        if *recipient != from {
                            self.in_flight.push((*recipient, message.clone()));
                        }
                    }
                }
                Effect::SendTo { peer, message } => {
                    if self.agents.contains_key(&peer) {
                        self.in_flight.push((peer, message));
                    }
                }
                Effect::CommitBlock { height, decision } => {
                    self.commits.entry(from).or_default().push((height, decision))
                }
                _ => (),
            }
        }
    }

    fn equivocate(&mut self, height: BlockHeight) {
        for (sender, coin) in &self.byzantine {
            for proposer in self.node_count.participants() {
                let key = ProtocolKey::new(height, proposer);
                for round in (0..BYZANTINE_ROUNDS).map(Round::new) {
                    for value in [true, false] {
                        let share = coin.sign_share(&coin_seed(CHAIN_ID, &key, round));
                        let messages = [
                            AgreementMessage::bv_broadcast(CHAIN_ID, key, round, value, *sender),
                            AgreementMessage::aux_broadcast(CHAIN_ID, key, round, value, *sender, share),
                        ];
                        for message in messages {
                            for recipient in self.agents.keys() {
                                self.in_flight.push((*recipient, message.clone()));
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Feed `agent` the votes of `senders` for `value` in every round of the instance `key`, until it
/// decides. Returns every effect produced along the way.
pub(crate) fn drive_to_decision<C: CommonCoin>(
    agent: &mut BlockConsensusAgent<C>,
    coins: &BTreeMap<ParticipantIndex, Ed25519Coin>,
    senders: &[ParticipantIndex],
    key: ProtocolKey,
    value: bool,
) -> Vec<Effect> {
    let mut effects = Vec::new();
    for round in (0..50).map(Round::new) {
        for sender in senders {
            let bv = AgreementMessage::bv_broadcast(CHAIN_ID, key, round, value, *sender);
            effects.extend(agent.route_message(bv).unwrap());
        }
        for sender in senders {
            let share = coins[sender].sign_share(&coin_seed(CHAIN_ID, &key, round));
            let aux = AgreementMessage::aux_broadcast(CHAIN_ID, key, round, value, *sender, share);
            effects.extend(agent.route_message(aux).unwrap());
        }

        let decided = agent
            .instance(&key)
            .map_or(false, |instance| instance.decision().is_some());
        if decided {
            return effects;
        }
    }
    panic!("Instance {} did not decide within 50 rounds", key)
}
