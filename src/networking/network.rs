/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::binary_agreement::messages::AgreementMessage;
use crate::types::data_types::ParticipantIndex;

/// Pluggable peer-to-peer transport.
///
/// Implementations are expected to authenticate every message they return from [`recv`](Self::recv):
/// the returned origin must be the participant that actually sent it. Delivery may duplicate or delay
/// messages, but must not corrupt them.
pub trait Network: Clone + Send {
    /// Send a message to all participants without blocking.
    fn broadcast(&mut self, message: AgreementMessage);

    /// Send a message to the specified participant without blocking.
    fn send(&mut self, peer: ParticipantIndex, message: AgreementMessage);

    /// Receive a message from any participant. Returns immediately with a None if no message is
    /// available now.
    fn recv(&mut self) -> Option<(ParticipantIndex, AgreementMessage)>;
}
