/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The algorithm thread, which owns the [`BlockConsensusAgent`] and applies its effects.
//!
//! Every input to the agent goes through a single channel: network messages forwarded by the
//! [poller](crate::networking::receiving::start_polling) and requests to start consensus from the
//! [`Replica`](crate::replica::Replica) handle. Any number of threads may enqueue inputs, but only
//! this thread consumes them, so the agent and its instances are never touched concurrently and need
//! no locking.
//!
//! Before consuming its first input, the thread replays the recovery ledger through
//! [`BlockConsensusAgent::recover`].

use std::collections::BTreeMap;
use std::mem;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::binary_agreement::messages::AgreementMessage;
use crate::block_consensus::types::BlockDecision;
use crate::block_consensus::BlockConsensusAgent;
use crate::common_coin::CommonCoin;
use crate::effects::Effect;
use crate::networking::network::Network;
use crate::networking::sending::SenderHandle;
use crate::recovery::{append_entry, LedgerEntry, RecoveryLedger};
use crate::types::data_types::{BlockHeight, ParticipantIndex};

/// How long the algorithm thread waits for an input before checking for shutdown again.
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An input to the algorithm thread.
pub(crate) enum Input {
    StartConsensus {
        height: BlockHeight,
        proposals: Vec<bool>,
    },
    Message {
        origin: ParticipantIndex,
        message: AgreementMessage,
    },
}

/// Read-only view of the block decisions made by the algorithm thread.
#[derive(Clone)]
pub(crate) struct DecisionView(Arc<Mutex<BTreeMap<BlockHeight, BlockDecision>>>);

impl DecisionView {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(BTreeMap::new())))
    }

    pub(crate) fn get(&self, height: BlockHeight) -> Option<BlockDecision> {
        match self.0.lock() {
            Ok(decisions) => decisions.get(&height).copied(),
            Err(poisoned) => poisoned.into_inner().get(&height).copied(),
        }
    }

    fn insert(&self, height: BlockHeight, decision: BlockDecision) {
        match self.0.lock() {
            Ok(mut decisions) => decisions.insert(height, decision),
            Err(poisoned) => poisoned.into_inner().insert(height, decision),
        };
    }
}

pub(crate) struct Algorithm<N: Network, C: CommonCoin, L: RecoveryLedger> {
    agent: BlockConsensusAgent<C>,
    sender_handle: SenderHandle<N>,
    ledger: L,
    recovered_entries: Vec<LedgerEntry>,
    inputs: Receiver<Input>,
    decisions: DecisionView,
    shutdown_signal: Receiver<()>,
}

impl<N: Network + 'static, C: CommonCoin, L: RecoveryLedger> Algorithm<N, C, L> {
    pub(crate) fn new(
        agent: BlockConsensusAgent<C>,
        network: N,
        ledger: L,
        recovered_entries: Vec<LedgerEntry>,
        inputs: Receiver<Input>,
        decisions: DecisionView,
        shutdown_signal: Receiver<()>,
    ) -> Self {
        Self {
            agent,
            sender_handle: SenderHandle::new(network),
            ledger,
            recovered_entries,
            inputs,
            decisions,
            shutdown_signal,
        }
    }

    pub(crate) fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || self.execute())
    }

    fn execute(&mut self) {
        let recovered_entries = mem::take(&mut self.recovered_entries);
        let effects = self.agent.recover(recovered_entries);
        self.apply(effects);

        loop {
            match self.shutdown_signal.try_recv() {
                Ok(()) => return,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    panic!("Algorithm thread disconnected from main thread")
                }
            }

            match self.inputs.recv_timeout(INPUT_POLL_INTERVAL) {
                Ok(input) => self.on_input(input),
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn on_input(&mut self, input: Input) {
        match input {
            Input::StartConsensus { height, proposals } => {
                match self.agent.start_consensus_for_height(height, proposals) {
                    Ok(effects) => self.apply(effects),
                    Err(err) => log::warn!("Could not start consensus for height {}: {:?}", height, err),
                }
            }
            Input::Message { origin, message } => {
                if origin != message.sender() {
                    log::warn!(
                        "Dropping message from participant {} that claims to be from participant {}",
                        origin,
                        message.sender()
                    );
                    return;
                }
                // Rejections are logged by the agent.
                if let Ok(effects) = self.agent.route_message(message) {
                    self.apply(effects)
                }
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Broadcast(message) => self.sender_handle.broadcast(message),
                Effect::SendTo { peer, message } => self.sender_handle.send(peer, message),
                Effect::AppendToLedger(entry) => {
                    if let Err(err) = append_entry(&mut self.ledger, &entry) {
                        log::error!("Could not append to the recovery ledger: {:?}", err)
                    }
                }
                Effect::PruneLedger { below } => self.ledger.prune_below(below),
                Effect::CommitBlock { height, decision } => self.decisions.insert(height, decision),
                Effect::InstanceDecided { .. } => (),
            }
        }
    }
}
