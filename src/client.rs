//! `ChatClient` ties the store, controller, simulator and scheduler together
//! and is the single entry point for front ends and transports.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::time::Duration;

use crate::controller::{Layout, PaneState, ViewController};
use crate::error::{ChatError, ChatResult};
use crate::models::{Conversation, Message, User};
use crate::projector::sorted_conversations;
use crate::random::RandomSource;
use crate::scheduler::{offset, ManualScheduler, ScheduledEvent, Scheduler};
use crate::simulator::{DeliverySimulator, SimulatorConfig};
use crate::store::{ConversationStore, StoreSnapshot, SubscriptionId};

pub struct ChatClient<S: Scheduler, R: RandomSource> {
    store: ConversationStore,
    view: ViewController,
    simulator: DeliverySimulator<R>,
    scheduler: S,
}

impl<S: Scheduler, R: RandomSource> ChatClient<S, R> {
    pub fn new(scheduler: S, rng: R, config: SimulatorConfig, layout: Layout) -> ChatResult<Self> {
        Ok(ChatClient {
            store: ConversationStore::new(),
            view: ViewController::new(layout),
            simulator: DeliverySimulator::new(config, rng)?,
            scheduler,
        })
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn view(&self) -> &ViewController {
        &self.view
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.scheduler.now()
    }

    pub fn panes(&self) -> PaneState {
        self.view.panes()
    }

    pub fn pending_events(&self) -> usize {
        self.simulator.pending()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(StoreSnapshot<'_>) + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Replace all state. Outstanding simulator work is revoked first so it
    /// can never touch the new conversations.
    pub fn load(&mut self, conversations: Vec<Conversation>, current_user: User) -> ChatResult<()> {
        self.store.load(conversations, current_user)?;
        self.simulator.cancel_all(&mut self.scheduler);
        self.view.reset();
        Ok(())
    }

    pub fn select_conversation(&mut self, conversation_id: &str) -> ChatResult<&Conversation> {
        self.view.select_conversation(&mut self.store, conversation_id)
    }

    pub fn back(&mut self) {
        self.view.back();
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.view.set_layout(layout);
    }

    /// Send into the open conversation and hand the message to the simulator.
    pub fn send_message(&mut self, conversation_id: &str, content: &str) -> ChatResult<Message> {
        let now = self.scheduler.now();
        let message = self.store.send_message(conversation_id, content, now)?;
        let epoch = self.store.epoch();
        self.simulator
            .on_message_sent(&mut self.scheduler, conversation_id, &message.id, epoch);
        Ok(message)
    }

    /// Entry point for messages coming from a real transport.
    pub fn apply_incoming(&mut self, conversation_id: &str, message: Message) -> ChatResult<()> {
        self.store.apply_incoming(conversation_id, message)
    }

    pub fn set_typing(&mut self, conversation_id: &str, is_typing: bool) -> ChatResult<()> {
        self.store.set_typing(conversation_id, is_typing)
    }

    /// Apply a fired scheduler event. Stale events are dropped silently.
    pub fn handle_event(&mut self, scheduled: ScheduledEvent) -> ChatResult<()> {
        let ScheduledEvent { token, event } = scheduled;
        self.simulator.fired(token);
        self.scheduler.release(token);

        match self
            .simulator
            .apply(&mut self.store, &self.scheduler, event)
        {
            Err(ChatError::StaleScheduleError {
                conversation_id,
                epoch,
            }) => {
                debug!(
                    "Dropped stale event for {} (epoch {}, current {})",
                    conversation_id,
                    epoch,
                    self.store.epoch()
                );
                Ok(())
            }
            Err(e) => {
                warn!("Simulator event failed: {}", e);
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Conversation list as the front end should render it.
    pub fn visible_conversations(&self, filter_text: &str) -> Vec<&Conversation> {
        match self.store.current_user() {
            Some(user) => sorted_conversations(self.store.conversations(), &user.id, filter_text),
            None => Vec::new(),
        }
    }
}

impl<R: RandomSource> ChatClient<ManualScheduler, R> {
    /// Advance virtual time, firing every event that falls due in order.
    /// Events scheduled while advancing fire too if they are due in range.
    pub fn advance(&mut self, by: Duration) -> usize {
        let until = offset(self.scheduler.now(), by);
        let mut fired = 0;
        while let Some(event) = self.scheduler.pop_due(until) {
            fired += 1;
            if let Err(e) = self.handle_event(event) {
                info!("Event failed while advancing: {}", e);
            }
        }
        self.scheduler.set_now(until);
        fired
    }
}
