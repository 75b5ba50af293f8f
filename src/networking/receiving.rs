//! Functions for receiving messages from the P2P network.

use std::{
    sync::mpsc::{Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
};

use crate::algorithm::Input;

use super::network::Network;

/// Spawn the poller thread, which polls the [`Network`] for messages and forwards them into the
/// algorithm thread's input channel.
///
/// The input channel is shared with other producers (for example,
/// [`Replica::start_consensus`](crate::replica::Replica::start_consensus)); the poller only ever
/// enqueues.
pub(crate) fn start_polling<N: Network + 'static>(
    mut network: N,
    inputs: Sender<Input>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Poller thread disconnected from main thread")
            }
        }

        if let Some((origin, message)) = network.recv() {
            let _ = inputs.send(Input::Message { origin, message });
        } else {
            thread::yield_now()
        }
    })
}
