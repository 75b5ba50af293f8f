use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use abba_rs::{
    binary_agreement::messages::AgreementMessage, networking::Network,
    types::data_types::ParticipantIndex,
};

/// A mock network stub which passes messages from and to threads using channels.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    me: ParticipantIndex,
    all_peers: HashMap<ParticipantIndex, Sender<(ParticipantIndex, AgreementMessage)>>,
    inbox: Arc<Mutex<Receiver<(ParticipantIndex, AgreementMessage)>>>,
}

impl Network for NetworkStub {
    fn send(&mut self, peer: ParticipantIndex, message: AgreementMessage) {
        if let Some(peer) = self.all_peers.get(&peer) {
            let _ = peer.send((self.me, message));
        }
    }

    fn broadcast(&mut self, message: AgreementMessage) {
        for peer in self.all_peers.values() {
            let _ = peer.send((self.me, message.clone()));
        }
    }

    fn recv(&mut self) -> Option<(ParticipantIndex, AgreementMessage)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(o_m) => Some(o_m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }
}

pub(crate) fn mock_network(peers: impl Iterator<Item = ParticipantIndex>) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(ParticipantIndex, Receiver<(ParticipantIndex, AgreementMessage)>)> =
        peers
            .map(|peer| {
                let (sender, receiver) = mpsc::channel();
                all_peers.insert(peer, sender);

                (peer, receiver)
            })
            .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(me, inbox)| NetworkStub {
            me,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}
