use abba_rs::{
    binary_agreement::{messages::AgreementMessage, BinaryAgreement},
    effects::Effect,
    types::{
        data_types::{BlockHeight, NodeCount, ParticipantIndex, Round},
        protocol_key::ProtocolKey,
        quorum::{is_strong_quorum, is_weak_quorum, max_faulty, strong_quorum, weak_quorum},
    },
};

mod common;

use crate::common::coins::{agreement_configuration, test_coins, CHAIN_ID};

#[test]
fn quorum_thresholds_test() {
    // (N, f, weak, strong)
    let table = [
        (1, 0, 1, 1),
        (3, 0, 2, 2),
        (4, 1, 2, 3),
        (5, 1, 2, 4),
        (6, 1, 3, 4),
        (7, 2, 3, 5),
        (10, 3, 4, 7),
        (100, 33, 34, 67),
    ];

    for (n, f, weak, strong) in table {
        let node_count = NodeCount::new(n);
        assert_eq!(max_faulty(node_count), f, "max_faulty({})", n);
        assert_eq!(weak_quorum(node_count), weak, "weak_quorum({})", n);
        assert_eq!(strong_quorum(node_count), strong, "strong_quorum({})", n);

        // A weak quorum always contains a correct participant.
        assert!(weak > f);
        // Two strong quorums always share a correct participant.
        assert!(2 * strong >= n + f + 1);
        // A strong quorum is reachable with every faulty participant silent.
        assert!(strong <= n - f);
    }
}

#[test]
fn quorum_predicates_test() {
    let node_count = NodeCount::new(7);
    assert!(!is_weak_quorum(2, node_count));
    assert!(is_weak_quorum(3, node_count));
    assert!(!is_strong_quorum(4, node_count));
    assert!(is_strong_quorum(5, node_count));
    assert!(is_strong_quorum(7, node_count));
}

#[test]
fn bin_value_needs_weak_quorum_of_bv_votes_test() {
    let node_count = NodeCount::new(7);
    let coins = test_coins(node_count);
    let me = ParticipantIndex::new(1);
    let key = ProtocolKey::new(BlockHeight::new(1), ParticipantIndex::new(1));
    let mut instance = BinaryAgreement::new(agreement_configuration(me, node_count), key, None);
    let round = Round::new(0);

    for sender in [2, 3].map(ParticipantIndex::new) {
        let effects = instance
            .process_network_message(
                AgreementMessage::bv_broadcast(CHAIN_ID, key, round, true, sender),
                &coins[&me],
            )
            .unwrap();
        assert!(effects.is_empty());
    }
    assert_eq!(instance.bv_vote_count(round, true), 2);
    assert!(instance.bin_values(round).is_empty());

    let effects = instance
        .process_network_message(
            AgreementMessage::bv_broadcast(CHAIN_ID, key, round, true, ParticipantIndex::new(4)),
            &coins[&me],
        )
        .unwrap();
    assert!(instance.bin_values(round).contains(true));
    assert!(!instance.bin_values(round).contains(false));

    // The third vote makes this replica echo `true`, then AUX-vote for it.
    assert_eq!(effects.len(), 2);
    assert!(matches!(
        &effects[0],
        Effect::Broadcast(AgreementMessage::BVBroadcast(bv)) if bv.value && bv.sender == me && bv.round == round
    ));
    assert!(matches!(
        &effects[1],
        Effect::Broadcast(AgreementMessage::AUXBroadcast(aux)) if aux.value && aux.sender == me && aux.round == round
    ));
    assert_eq!(instance.bv_vote_count(round, true), 4);
}
