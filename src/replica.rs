/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a replica.
//!
//! A replica is one participant of a chain's block consensus. It runs a
//! [`BlockConsensusAgent`](crate::block_consensus::BlockConsensusAgent) on a background thread, feeds it
//! messages polled from the user's [network](crate::networking), writes its inputs to the user's
//! [recovery ledger](crate::recovery) and publishes its block decisions.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the replica](ReplicaSpec),
//! - The function to [start](ReplicaSpec::start) a [Replica] given its specification,
//! - [The type](Replica) which keeps the replica alive and accepts inputs from the host.
//!
//! ## Starting a replica
//!
//! ```ignore
//! let replica =
//!     ReplicaSpec::builder()
//!     .network(network)
//!     .coin(coin)
//!     .ledger(ledger)
//!     .configuration(configuration)
//!     .on_commit_block(commit_handler)
//!     .build()
//!     .start()?;
//!
//! replica.start_consensus(BlockHeight::new(1), proposals);
//! ```
//!
//! ### Required setters
//!
//! - `.network(...)`
//! - `.coin(...)`
//! - `.ledger(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters register user-defined handlers for events from [crate::events]:
//! - `.on_start_consensus(...)`
//! - `.on_decide(...)`
//! - `.on_commit_block(...)`
//! - `.on_evict_instances(...)`
//! - `.on_recover(...)`
//! - `.on_bv_broadcast(...)`
//! - `.on_aux_broadcast(...)`
//! - `.on_receive_bv_broadcast(...)`
//! - `.on_receive_aux_broadcast(...)`
//! - `.on_reject_message(...)`
//! - `.on_add_bin_value(...)`
//! - `.on_common_coin(...)`
//! - `.on_advance_round(...)`
//!
//! The replica's [configuration](Configuration) is also built with the builder pattern:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .me(ParticipantIndex::new(1))
//!     .chain_id(ChainID::new(0))
//!     .node_count(NodeCount::new(4))
//!     .log_events(true)
//!     .build()
//! ```

use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use typed_builder::TypedBuilder;

use crate::algorithm::{Algorithm, DecisionView, Input};
use crate::block_consensus::types::{AgentConfiguration, BlockDecision};
use crate::block_consensus::BlockConsensusAgent;
use crate::common_coin::CommonCoin;
use crate::event_bus::*;
use crate::events::*;
use crate::networking::network::Network;
use crate::networking::receiving::start_polling;
use crate::recovery::{read_entries, LedgerError, RecoveryLedger};
use crate::types::data_types::{BlockHeight, ChainID, NodeCount, ParticipantIndex, Round};

/// Stores the user-defined parameters required to start the replica, that is:
/// 1. The replica's own [participant index](crate::types::data_types::ParticipantIndex).
/// 2. The [chain ID](crate::types::data_types::ChainID) of the target blockchain.
/// 3. The number of participants, `N`.
/// 4. The highest round an agreement instance may reach.
/// 5. How many finalized heights keep their agreement instances alive.
/// 6. The live-instance count above which the replica warns that heights are not being finalized.
/// 7. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Chain ID
///
/// Every agreement message and every coin seed includes the chain ID, so that messages and coin shares
/// for one chain are never mistaken for those of another.
///
/// ## Log Events
///
/// The replica logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(TypedBuilder)]
#[builder(builder_method(doc =
    "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.chain_id(...)`
    - `.node_count(...)`
    - `.log_events(...)`

    Optional:
    - `.max_round(...)`
    - `.instance_retention_heights(...)`
    - `.max_live_instances(...)`
"
))]
pub struct Configuration {
    #[builder(setter(doc = "Set the replica's own participant index, in `1..=N`. Required."))]
    pub me: ParticipantIndex,
    #[builder(setter(doc = "Set the chain ID of the blockchain. Required."))]
    pub chain_id: ChainID,
    #[builder(setter(doc = "Set the number of participants. Required."))]
    pub node_count: NodeCount,
    #[builder(default = Round::new(100), setter(doc = "Set the highest round an agreement instance may reach. Defaults to 100."))]
    pub max_round: Round,
    #[builder(default = 4, setter(doc = "Set how many finalized heights keep their agreement instances alive for slower peers. Defaults to 4."))]
    pub instance_retention_heights: u64,
    #[builder(default = 1024, setter(doc = "Set the live-instance count above which the replica warns that heights are not being finalized. Defaults to 1024."))]
    pub max_live_instances: usize,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

impl From<&Configuration> for AgentConfiguration {
    fn from(configuration: &Configuration) -> Self {
        AgentConfiguration {
            chain_id: configuration.chain_id,
            me: configuration.me,
            node_count: configuration.node_count,
            max_round: configuration.max_round,
            instance_retention_heights: configuration.instance_retention_heights,
            max_live_instances: configuration.max_live_instances,
        }
    }
}

/// Stores all necessary parameters and trait implementations required to run the [Replica].
#[derive(TypedBuilder)]
#[builder(builder_method(doc =
    "
    Create a builder for building a [ReplicaSpec]. On the builder call the following methods to construct a valid [ReplicaSpec].

    Required:
    - `.network(...)`
    - `.coin(...)`
    - `.ledger(...)`
    - `.configuration(...)`

    Optional:
    - `.on_start_consensus(...)`
    - `.on_decide(...)`
    - `.on_commit_block(...)`
    - `.on_evict_instances(...)`
    - `.on_recover(...)`
    - `.on_bv_broadcast(...)`
    - `.on_aux_broadcast(...)`
    - `.on_receive_bv_broadcast(...)`
    - `.on_receive_aux_broadcast(...)`
    - `.on_reject_message(...)`
    - `.on_add_bin_value(...)`
    - `.on_common_coin(...)`
    - `.on_advance_round(...)`
"
))]
pub struct ReplicaSpec<N: Network + 'static, C: CommonCoin, L: RecoveryLedger> {
    // Required parameters
    #[builder(setter(doc = "Set the implementation of peer-to-peer networking. The argument must implement the [Network](crate::networking::Network) trait. Required."))]
    network: N,
    #[builder(setter(doc = "Set the threshold common coin. The argument must implement the [CommonCoin](crate::common_coin::CommonCoin) trait. Required."))]
    coin: C,
    #[builder(setter(doc = "Set the replica's recovery ledger. The argument must implement the [RecoveryLedger](crate::recovery::RecoveryLedger) trait. Required."))]
    ledger: L,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a replica. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&StartConsensusEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartConsensusEvent>),
    doc = "Register a handler closure to be invoked after the replica starts consensus for a height. Optional."))]
    on_start_consensus: Option<HandlerPtr<StartConsensusEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DecideEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DecideEvent>),
    doc = "Register a handler closure to be invoked after an agreement instance decides. Optional."))]
    on_decide: Option<HandlerPtr<DecideEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CommitBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitBlockEvent>),
    doc = "Register a handler closure to be invoked after a height is finalized. Optional."))]
    on_commit_block: Option<HandlerPtr<CommitBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&EvictInstancesEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<EvictInstancesEvent>),
    doc = "Register a handler closure to be invoked after the instances of old heights are evicted. Optional."))]
    on_evict_instances: Option<HandlerPtr<EvictInstancesEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RecoverEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RecoverEvent>),
    doc = "Register a handler closure to be invoked after the replica replays its recovery ledger. Optional."))]
    on_recover: Option<HandlerPtr<RecoverEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&BVBroadcastEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<BVBroadcastEvent>),
    doc = "Register a handler closure to be invoked after the replica broadcasts a BV message. Optional."))]
    on_bv_broadcast: Option<HandlerPtr<BVBroadcastEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AUXBroadcastEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AUXBroadcastEvent>),
    doc = "Register a handler closure to be invoked after the replica broadcasts an AUX message. Optional."))]
    on_aux_broadcast: Option<HandlerPtr<AUXBroadcastEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveBVBroadcastEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveBVBroadcastEvent>),
    doc = "Register a handler closure to be invoked after the replica accepts a BV message. Optional."))]
    on_receive_bv_broadcast: Option<HandlerPtr<ReceiveBVBroadcastEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveAUXBroadcastEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveAUXBroadcastEvent>),
    doc = "Register a handler closure to be invoked after the replica accepts an AUX message. Optional."))]
    on_receive_aux_broadcast: Option<HandlerPtr<ReceiveAUXBroadcastEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectMessageEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectMessageEvent>),
    doc = "Register a handler closure to be invoked after the replica rejects a message. Optional."))]
    on_reject_message: Option<HandlerPtr<RejectMessageEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AddBinValueEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AddBinValueEvent>),
    doc = "Register a handler closure to be invoked after a value joins an instance's bin values. Optional."))]
    on_add_bin_value: Option<HandlerPtr<AddBinValueEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CommonCoinEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommonCoinEvent>),
    doc = "Register a handler closure to be invoked after an instance tosses its common coin. Optional."))]
    on_common_coin: Option<HandlerPtr<CommonCoinEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AdvanceRoundEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AdvanceRoundEvent>),
    doc = "Register a handler closure to be invoked after an instance moves to its next round. Optional."))]
    on_advance_round: Option<HandlerPtr<AdvanceRoundEvent>>,
}

impl<N: Network + 'static, C: CommonCoin, L: RecoveryLedger> ReplicaSpec<N, C, L> {
    /// Starts all threads and channels associated with running a replica, and returns the handles to
    /// them in a [Replica] struct.
    ///
    /// The recovery ledger is read before any thread starts; its entries are replayed by the algorithm
    /// thread before it handles any other input.
    ///
    /// # Errors
    ///
    /// Fails if an entry of the recovery ledger cannot be deserialized.
    pub fn start(self) -> Result<Replica, ReplicaError> {
        let recovered_entries = read_entries(&self.ledger)?;
        let agent_config = AgentConfiguration::from(&self.configuration);

        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_start_consensus,
            self.on_decide,
            self.on_commit_block,
            self.on_evict_instances,
            self.on_recover,
            self.on_bv_broadcast,
            self.on_aux_broadcast,
            self.on_receive_bv_broadcast,
            self.on_receive_aux_broadcast,
            self.on_reject_message,
            self.on_add_bin_value,
            self.on_common_coin,
            self.on_advance_round,
        );

        let (event_publisher, event_bus) = if !event_handlers.is_empty() {
            let (event_publisher, event_subscriber) = mpsc::channel();
            let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
            let event_bus = start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
            (Some(event_publisher), Some((event_bus, event_bus_shutdown)))
        } else {
            (None, None)
        };

        let (inputs, inputs_receiver) = mpsc::channel();

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let poller = start_polling(self.network.clone(), inputs.clone(), poller_shutdown_receiver);

        let decisions = DecisionView::new();
        let agent = BlockConsensusAgent::new(agent_config, self.coin, event_publisher);
        let (algorithm_shutdown, algorithm_shutdown_receiver) = mpsc::channel();
        let algorithm = Algorithm::new(
            agent,
            self.network,
            self.ledger,
            recovered_entries,
            inputs_receiver,
            decisions.clone(),
            algorithm_shutdown_receiver,
        )
        .start();

        Ok(Replica {
            inputs,
            decisions,
            poller: Some((poller, poller_shutdown)),
            algorithm: Some((algorithm, algorithm_shutdown)),
            event_bus,
        })
    }
}

/// A handle to the background threads of a replica. When this value is dropped, all background threads
/// are gracefully shut down.
pub struct Replica {
    inputs: Sender<Input>,
    decisions: DecisionView,
    poller: Option<(JoinHandle<()>, Sender<()>)>,
    algorithm: Option<(JoinHandle<()>, Sender<()>)>,
    event_bus: Option<(JoinHandle<()>, Sender<()>)>,
}

impl Replica {
    /// Ask the replica to start consensus for `height`, with one claim per proposer in `proposals`.
    ///
    /// The request is handled asynchronously by the algorithm thread. Requests it cannot honor, for
    /// example a second start for the same height, are logged and ignored.
    pub fn start_consensus(&self, height: BlockHeight, proposals: Vec<bool>) {
        if self.inputs.send(Input::StartConsensus { height, proposals }).is_err() {
            log::error!("Algorithm thread stopped; cannot start consensus for height {}", height)
        }
    }

    /// Get the final decision for `height`, if the replica has reached it.
    pub fn decision(&self, height: BlockHeight) -> Option<BlockDecision> {
        self.decisions.get(height)
    }
}

impl Drop for Replica {
    fn drop(&mut self) {
        // The algorithm thread receives inputs from the poller, and assumes that the poller lives longer
        // than it. The event bus is stopped first since it only consumes.
        for thread in [self.event_bus.take(), self.algorithm.take(), self.poller.take()]
            .into_iter()
            .flatten()
        {
            let (handle, shutdown) = thread;
            let _ = shutdown.send(());
            if handle.join().is_err() {
                log::error!("A replica thread panicked before shutdown")
            }
        }
    }
}

#[derive(Debug)]
pub enum ReplicaError {
    /// The recovery ledger could not be read.
    Ledger(LedgerError),
}

impl From<LedgerError> for ReplicaError {
    fn from(value: LedgerError) -> Self {
        ReplicaError::Ledger(value)
    }
}
