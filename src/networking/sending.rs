//! Functions and types for sending messages to the P2P network.

use crate::binary_agreement::messages::AgreementMessage;
use crate::types::data_types::ParticipantIndex;

use super::network::Network;

/// Handle for sending messages to the [`Network`].
///
/// It can be used to send or broadcast instances of any type that implement the [`Into<AgreementMessage>`]
/// trait.
#[derive(Clone)]
pub(crate) struct SenderHandle<N: Network> {
    network: N,
}

impl<N: Network> SenderHandle<N> {
    pub(crate) fn new(network: N) -> Self {
        Self { network }
    }

    pub(crate) fn broadcast<S: Into<AgreementMessage>>(&mut self, msg: S) {
        self.network.broadcast(msg.into())
    }

    pub(crate) fn send<S: Into<AgreementMessage>>(&mut self, peer: ParticipantIndex, msg: S) {
        self.network.send(peer, msg.into())
    }
}
