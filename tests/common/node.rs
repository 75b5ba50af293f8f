use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use abba_rs::{
    block_consensus::types::BlockDecision,
    common_coin::Ed25519Coin,
    events::{CommitBlockEvent, RecoverEvent},
    replica::{Configuration, Replica, ReplicaSpec},
    types::data_types::{BlockHeight, NodeCount, ParticipantIndex},
};

use crate::common::{coins::CHAIN_ID, mem_ledger::MemLedger, network::NetworkStub};

/// Things the Nodes will have in common:
/// - Participant set size.
/// - Configuration.
///
/// Things that they will differ in:
/// - Participant index.
/// - Network instance.
/// - Common coin keypair.
/// - Recovery ledger.
pub(crate) struct Node {
    me: ParticipantIndex,
    commits: Arc<Mutex<Vec<(BlockHeight, BlockDecision)>>>,
    recoveries: Arc<Mutex<Vec<usize>>>,
    replica: Replica,
}

impl Node {
    pub(crate) fn new(
        me: ParticipantIndex,
        node_count: NodeCount,
        coin: Ed25519Coin,
        network: NetworkStub,
        ledger: MemLedger,
    ) -> Node {
        let commits = Arc::new(Mutex::new(Vec::new()));
        let recoveries = Arc::new(Mutex::new(Vec::new()));

        let configuration = Configuration::builder()
            .me(me)
            .chain_id(CHAIN_ID)
            .node_count(node_count)
            .log_events(true)
            .build();

        let replica = ReplicaSpec::builder()
            .network(network)
            .coin(coin)
            .ledger(ledger)
            .configuration(configuration)
            .on_commit_block(commit_block_handler(commits.clone()))
            .on_recover(recover_handler(recoveries.clone()))
            .build()
            .start()
            .unwrap();

        Node {
            me,
            commits,
            recoveries,
            replica,
        }
    }

    pub(crate) fn me(&self) -> ParticipantIndex {
        self.me
    }

    pub(crate) fn start_consensus(&self, height: BlockHeight, proposals: Vec<bool>) {
        self.replica.start_consensus(height, proposals)
    }

    pub(crate) fn decision(&self, height: BlockHeight) -> Option<BlockDecision> {
        self.replica.decision(height)
    }

    /// Block until this node has finalized `height`, or panic after `timeout`.
    pub(crate) fn wait_for_decision(&self, height: BlockHeight, timeout: Duration) -> BlockDecision {
        let start = Instant::now();
        loop {
            if let Some(decision) = self.decision(height) {
                return decision;
            }
            if start.elapsed() > timeout {
                panic!("Node {} did not finalize height {} in time", self.me, height);
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Heights committed so far, as reported to the `on_commit_block` handler.
    pub(crate) fn committed(&self) -> Vec<(BlockHeight, BlockDecision)> {
        self.commits.lock().unwrap().clone()
    }

    /// Number of ledger entries replayed on each recovery so far.
    pub(crate) fn recoveries(&self) -> Vec<usize> {
        self.recoveries.lock().unwrap().clone()
    }
}

fn commit_block_handler(
    commits: Arc<Mutex<Vec<(BlockHeight, BlockDecision)>>>,
) -> impl Fn(&CommitBlockEvent) + Send + 'static {
    move |event: &CommitBlockEvent| commits.lock().unwrap().push((event.height, event.decision))
}

fn recover_handler(recoveries: Arc<Mutex<Vec<usize>>>) -> impl Fn(&RecoverEvent) + Send + 'static {
    move |event: &RecoverEvent| recoveries.lock().unwrap().push(event.entries)
}
