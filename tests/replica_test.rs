use std::{thread, time::Duration};

use abba_rs::{
    block_consensus::types::BlockDecision,
    types::data_types::{BlockHeight, NodeCount, ParticipantIndex},
};
use log::LevelFilter;

mod common;

use crate::common::{
    coins::test_coins, logging::setup_logger, mem_ledger::MemLedger, network::mock_network, node::Node,
};

const TIMEOUT: Duration = Duration::from_secs(60);

#[test]
fn replicas_commit_the_same_blocks_test() {
    setup_logger(LevelFilter::Debug);

    // 1. Start 4 replicas connected by a mock network.
    let node_count = NodeCount::new(4);
    let network_stubs = mock_network(node_count.participants());
    let nodes: Vec<Node> = test_coins(node_count)
        .into_iter()
        .zip(network_stubs)
        .map(|((me, coin), network)| Node::new(me, node_count, coin, network, MemLedger::new()))
        .collect();

    // 2. Run three heights. Replica 4 never received proposer 1's blocks.
    for height in (1..=3).map(BlockHeight::new) {
        for node in &nodes {
            let proposals = if node.me() == ParticipantIndex::new(4) {
                vec![false, true, true, true]
            } else {
                vec![true; 4]
            };
            node.start_consensus(height, proposals);
        }
    }

    // 3. Every replica finalizes every height identically.
    for height in (1..=3).map(BlockHeight::new) {
        let decisions: Vec<BlockDecision> = nodes
            .iter()
            .map(|node| node.wait_for_decision(height, TIMEOUT))
            .collect();
        assert!(decisions.iter().all(|decision| *decision == decisions[0]));
    }

    // 4. The commit handler saw one commit per height, on every replica.
    thread::sleep(Duration::from_millis(100));
    for node in &nodes {
        let mut heights: Vec<BlockHeight> = node.committed().into_iter().map(|(height, _)| height).collect();
        heights.sort();
        assert_eq!(heights, (1..=3).map(BlockHeight::new).collect::<Vec<_>>());
    }
}

#[test]
fn restarted_replica_recovers_its_decisions_test() {
    setup_logger(LevelFilter::Debug);

    let node_count = NodeCount::new(4);
    let network_stubs = mock_network(node_count.participants());
    let ledgers: Vec<MemLedger> = node_count.participants().map(|_| MemLedger::new()).collect();
    let coins = test_coins(node_count);

    // 1. Run one height on all replicas.
    let height = BlockHeight::new(1);
    let mut nodes: Vec<Node> = coins
        .into_iter()
        .zip(network_stubs.iter().cloned())
        .zip(ledgers.iter().cloned())
        .map(|(((me, coin), network), ledger)| Node::new(me, node_count, coin, network, ledger))
        .collect();
    for node in &nodes {
        node.start_consensus(height, vec![true; 4]);
    }
    let decision = nodes[0].wait_for_decision(height, TIMEOUT);
    assert_eq!(decision, BlockDecision::Proposer(ParticipantIndex::new(1)));
    assert!(ledgers[0].len() > 0);

    // 2. Crash replica 1 and restart it from its ledger.
    drop(nodes.remove(0));
    let me = ParticipantIndex::new(1);
    let coin = test_coins(node_count).remove(&me).unwrap();
    let restarted = Node::new(me, node_count, coin, network_stubs[0].clone(), ledgers[0].clone());

    // 3. The decision is rebuilt from the ledger alone.
    assert_eq!(restarted.wait_for_decision(height, TIMEOUT), decision);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(restarted.recoveries().len(), 1);
    assert!(restarted.recoveries()[0] > 0);
}
