//! The event bus thread, which runs user-registered and logging handlers for every published
//! [event](crate::events).

use crate::events::*;
use crate::logging::Logger;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::TryRecvError;
use std::thread;
use std::thread::JoinHandle;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

pub(crate) struct EventHandlers {
    pub(crate) start_consensus_handlers: Vec<HandlerPtr<StartConsensusEvent>>,
    pub(crate) decide_handlers: Vec<HandlerPtr<DecideEvent>>,
    pub(crate) commit_block_handlers: Vec<HandlerPtr<CommitBlockEvent>>,
    pub(crate) evict_instances_handlers: Vec<HandlerPtr<EvictInstancesEvent>>,
    pub(crate) recover_handlers: Vec<HandlerPtr<RecoverEvent>>,
    pub(crate) bv_broadcast_handlers: Vec<HandlerPtr<BVBroadcastEvent>>,
    pub(crate) aux_broadcast_handlers: Vec<HandlerPtr<AUXBroadcastEvent>>,
    pub(crate) receive_bv_broadcast_handlers: Vec<HandlerPtr<ReceiveBVBroadcastEvent>>,
    pub(crate) receive_aux_broadcast_handlers: Vec<HandlerPtr<ReceiveAUXBroadcastEvent>>,
    pub(crate) reject_message_handlers: Vec<HandlerPtr<RejectMessageEvent>>,
    pub(crate) add_bin_value_handlers: Vec<HandlerPtr<AddBinValueEvent>>,
    pub(crate) common_coin_handlers: Vec<HandlerPtr<CommonCoinEvent>>,
    pub(crate) advance_round_handlers: Vec<HandlerPtr<AdvanceRoundEvent>>,
}

/// Push the default logger of `T` into `handlers` if `log_events`, then the user's handler if any.
fn handlers_for<T: Logger>(log_events: bool, user_handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
    let mut handlers = Vec::new();
    if log_events {
        handlers.push(T::get_logger());
    }
    if let Some(handler) = user_handler {
        handlers.push(handler);
    }
    handlers
}

impl EventHandlers {
    pub(crate) fn new(
        log_events: bool,
        start_consensus_handler: Option<HandlerPtr<StartConsensusEvent>>,
        decide_handler: Option<HandlerPtr<DecideEvent>>,
        commit_block_handler: Option<HandlerPtr<CommitBlockEvent>>,
        evict_instances_handler: Option<HandlerPtr<EvictInstancesEvent>>,
        recover_handler: Option<HandlerPtr<RecoverEvent>>,
        bv_broadcast_handler: Option<HandlerPtr<BVBroadcastEvent>>,
        aux_broadcast_handler: Option<HandlerPtr<AUXBroadcastEvent>>,
        receive_bv_broadcast_handler: Option<HandlerPtr<ReceiveBVBroadcastEvent>>,
        receive_aux_broadcast_handler: Option<HandlerPtr<ReceiveAUXBroadcastEvent>>,
        reject_message_handler: Option<HandlerPtr<RejectMessageEvent>>,
        add_bin_value_handler: Option<HandlerPtr<AddBinValueEvent>>,
        common_coin_handler: Option<HandlerPtr<CommonCoinEvent>>,
        advance_round_handler: Option<HandlerPtr<AdvanceRoundEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            start_consensus_handlers: handlers_for(log_events, start_consensus_handler),
            decide_handlers: handlers_for(log_events, decide_handler),
            commit_block_handlers: handlers_for(log_events, commit_block_handler),
            evict_instances_handlers: handlers_for(log_events, evict_instances_handler),
            recover_handlers: handlers_for(log_events, recover_handler),
            bv_broadcast_handlers: handlers_for(log_events, bv_broadcast_handler),
            aux_broadcast_handlers: handlers_for(log_events, aux_broadcast_handler),
            receive_bv_broadcast_handlers: handlers_for(log_events, receive_bv_broadcast_handler),
            receive_aux_broadcast_handlers: handlers_for(log_events, receive_aux_broadcast_handler),
            reject_message_handlers: handlers_for(log_events, reject_message_handler),
            add_bin_value_handlers: handlers_for(log_events, add_bin_value_handler),
            common_coin_handlers: handlers_for(log_events, common_coin_handler),
            advance_round_handlers: handlers_for(log_events, advance_round_handler),
        }
    }

    /// Whether no handler at all is registered, in which case no event bus thread is needed.
    pub(crate) fn is_empty(&self) -> bool {
        self.start_consensus_handlers.is_empty()
            && self.decide_handlers.is_empty()
            && self.commit_block_handlers.is_empty()
            && self.evict_instances_handlers.is_empty()
            && self.recover_handlers.is_empty()
            && self.bv_broadcast_handlers.is_empty()
            && self.aux_broadcast_handlers.is_empty()
            && self.receive_bv_broadcast_handlers.is_empty()
            && self.receive_aux_broadcast_handlers.is_empty()
            && self.reject_message_handlers.is_empty()
            && self.add_bin_value_handlers.is_empty()
            && self.common_coin_handlers.is_empty()
            && self.advance_round_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::StartConsensus(start_consensus_event) =>
                self.start_consensus_handlers.iter().for_each(|handler| handler(&start_consensus_event)),

            Event::Decide(decide_event) =>
                self.decide_handlers.iter().for_each(|handler| handler(&decide_event)),

            Event::CommitBlock(commit_block_event) =>
                self.commit_block_handlers.iter().for_each(|handler| handler(&commit_block_event)),

            Event::EvictInstances(evict_instances_event) =>
                self.evict_instances_handlers.iter().for_each(|handler| handler(&evict_instances_event)),

            Event::Recover(recover_event) =>
                self.recover_handlers.iter().for_each(|handler| handler(&recover_event)),

            Event::BVBroadcast(bv_broadcast_event) =>
                self.bv_broadcast_handlers.iter().for_each(|handler| handler(&bv_broadcast_event)),

            Event::AUXBroadcast(aux_broadcast_event) =>
                self.aux_broadcast_handlers.iter().for_each(|handler| handler(&aux_broadcast_event)),

            Event::ReceiveBVBroadcast(receive_bv_broadcast_event) =>
                self.receive_bv_broadcast_handlers.iter().for_each(|handler| handler(&receive_bv_broadcast_event)),

            Event::ReceiveAUXBroadcast(receive_aux_broadcast_event) =>
                self.receive_aux_broadcast_handlers.iter().for_each(|handler| handler(&receive_aux_broadcast_event)),

            Event::RejectMessage(reject_message_event) =>
                self.reject_message_handlers.iter().for_each(|handler| handler(&reject_message_event)),

            Event::AddBinValue(add_bin_value_event) =>
                self.add_bin_value_handlers.iter().for_each(|handler| handler(&add_bin_value_event)),

            Event::CommonCoin(common_coin_event) =>
                self.common_coin_handlers.iter().for_each(|handler| handler(&common_coin_event)),

            Event::AdvanceRound(advance_round_event) =>
                self.advance_round_handlers.iter().for_each(|handler| handler(&advance_round_event)),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        match event_subscriber.try_recv() {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(TryRecvError::Empty) => thread::yield_now(),
            // The algorithm thread is the only publisher and has already stopped.
            Err(TryRecvError::Disconnected) => thread::yield_now(),
        }
    })
}
