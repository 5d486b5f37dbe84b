//! Stand-in for a remote peer: delivery receipts, typing indicators and
//! canned replies, all scheduled through the `Scheduler` port.
//!
//! Randomness comes only from the injected `RandomSource`, and every event is
//! checked against the store epoch before it is applied, so a reload can
//! never be mutated by work scheduled against the previous state.

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::models::{DeliveryStatus, Message};
use crate::projector::other_participant;
use crate::random::RandomSource;
use crate::scheduler::{Scheduler, SimulatorEvent, TimerToken};
use crate::store::ConversationStore;

pub const DEFAULT_REPLIES: &[&str] = &[
    "Thanks for the update!",
    "Sounds good, I'll take a look.",
    "Can we discuss this tomorrow?",
    "Perfect, let's go with that.",
    "I'll get back to you shortly.",
    "Got it 👍",
];

/// Upper bound for every simulator delay (24 hours).
pub const MAX_DELAY_MS: u64 = 24 * 60 * 60 * 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatorConfig {
    pub reply_probability: f64,
    pub typing_delay_ms: u64,
    // Measured from the send, not from the typing event
    pub reply_delay_ms: u64,
    pub delivery_delay_ms: Option<u64>,
    pub replies: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            reply_probability: 0.5,
            typing_delay_ms: 1_000,
            reply_delay_ms: 3_000,
            delivery_delay_ms: Some(500),
            replies: DEFAULT_REPLIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SimulatorConfig {
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn delivery_delay(&self) -> Option<Duration> {
        self.delivery_delay_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> ChatResult<()> {
        if !(0.0..=1.0).contains(&self.reply_probability) {
            return Err(ChatError::InvalidConfigError(format!(
                "reply probability {} is outside [0, 1]",
                self.reply_probability
            )));
        }
        let delays = [
            ("typing delay", Some(self.typing_delay_ms)),
            ("reply delay", Some(self.reply_delay_ms)),
            ("delivery delay", self.delivery_delay_ms),
        ];
        for (name, delay) in delays {
            if let Some(ms) = delay.filter(|ms| *ms > MAX_DELAY_MS) {
                return Err(ChatError::InvalidConfigError(format!(
                    "{} ({}ms) exceeds the {}ms limit",
                    name, ms, MAX_DELAY_MS
                )));
            }
        }
        if self.reply_delay_ms <= self.typing_delay_ms {
            return Err(ChatError::InvalidConfigError(format!(
                "reply delay ({}ms) must be greater than typing delay ({}ms)",
                self.reply_delay_ms, self.typing_delay_ms
            )));
        }
        if self.replies.is_empty() {
            return Err(ChatError::InvalidConfigError(
                "at least one reply candidate is required".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct DeliverySimulator<R: RandomSource> {
    config: SimulatorConfig,
    rng: R,
    // Outstanding timers, so a reload can revoke them
    pending: HashMap<TimerToken, String>,
}

impl<R: RandomSource> DeliverySimulator<R> {
    pub fn new(config: SimulatorConfig, rng: R) -> ChatResult<Self> {
        config.validate()?;
        Ok(DeliverySimulator {
            config,
            rng,
            pending: HashMap::new(),
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Schedule the follow-up for a message the local user just sent.
    /// Returns whether a peer reply sequence was triggered.
    pub fn on_message_sent<S: Scheduler>(
        &mut self,
        scheduler: &mut S,
        conversation_id: &str,
        message_id: &str,
        epoch: u64,
    ) -> bool {
        if let Some(delay) = self.config.delivery_delay() {
            let token = scheduler.schedule(
                delay,
                SimulatorEvent::Delivered {
                    conversation_id: conversation_id.to_string(),
                    message_id: message_id.to_string(),
                    epoch,
                },
            );
            self.pending.insert(token, conversation_id.to_string());
        }

        let roll = self.rng.next_f64();
        if roll >= self.config.reply_probability {
            debug!("No simulated reply for {} (roll {:.3})", conversation_id, roll);
            return false;
        }

        let typing = scheduler.schedule(
            self.config.typing_delay(),
            SimulatorEvent::TypingStarted {
                conversation_id: conversation_id.to_string(),
                epoch,
            },
        );
        let reply = scheduler.schedule(
            self.config.reply_delay(),
            SimulatorEvent::ReplyDue {
                conversation_id: conversation_id.to_string(),
                epoch,
            },
        );
        self.pending.insert(typing, conversation_id.to_string());
        self.pending.insert(reply, conversation_id.to_string());
        debug!("Scheduled simulated reply for {} (roll {:.3})", conversation_id, roll);
        true
    }

    /// Forget a timer that has fired.
    pub fn fired(&mut self, token: TimerToken) {
        self.pending.remove(&token);
    }

    /// Revoke every outstanding timer. Used when the store is reloaded.
    pub fn cancel_all<S: Scheduler>(&mut self, scheduler: &mut S) -> usize {
        let cancelled = self
            .pending
            .drain()
            .filter(|(token, _)| scheduler.cancel(*token))
            .count();
        if cancelled > 0 {
            info!("Cancelled {} pending simulator events", cancelled);
        }
        cancelled
    }

    /// Revoke the timers of one conversation.
    pub fn cancel_conversation<S: Scheduler>(
        &mut self,
        scheduler: &mut S,
        conversation_id: &str,
    ) -> usize {
        let tokens: Vec<TimerToken> = self
            .pending
            .iter()
            .filter(|(_, id)| id.as_str() == conversation_id)
            .map(|(token, _)| *token)
            .collect();
        tokens
            .into_iter()
            .filter(|token| {
                self.pending.remove(token);
                scheduler.cancel(*token)
            })
            .count()
    }

    pub fn pick_reply(&mut self) -> String {
        let idx = self.rng.pick(self.config.replies.len());
        self.config.replies[idx].clone()
    }

    /// Apply a fired event to the store. Stale events fail with
    /// `StaleScheduleError` and leave the store alone.
    pub fn apply<S: Scheduler>(
        &mut self,
        store: &mut ConversationStore,
        scheduler: &S,
        event: SimulatorEvent,
    ) -> ChatResult<()> {
        let conversation_id = event.conversation_id().to_string();
        if event.epoch() != store.epoch() || store.conversation(&conversation_id).is_none() {
            return Err(ChatError::StaleScheduleError {
                conversation_id,
                epoch: event.epoch(),
            });
        }

        match event {
            SimulatorEvent::Delivered { message_id, .. } => {
                store.advance_status(&conversation_id, &message_id, DeliveryStatus::Delivered)?;
            }
            SimulatorEvent::TypingStarted { .. } => {
                store.set_typing(&conversation_id, true)?;
            }
            SimulatorEvent::ReplyDue { .. } => {
                let reply = self.build_reply(store, &conversation_id, scheduler)?;
                info!("Simulated reply {} arrived in {}", reply.id, conversation_id);
                store.deliver_reply(&conversation_id, reply)?;
            }
        }
        Ok(())
    }

    fn build_reply<S: Scheduler>(
        &mut self,
        store: &ConversationStore,
        conversation_id: &str,
        scheduler: &S,
    ) -> ChatResult<Message> {
        let user_id = store
            .current_user()
            .map(|u| u.id.clone())
            .ok_or_else(|| ChatError::InvalidStateError("store has not been loaded".to_string()))?;
        let convo = store
            .conversation(conversation_id)
            .ok_or_else(|| ChatError::UnknownConversationError(conversation_id.to_string()))?;
        let peer = match other_participant(convo, &user_id) {
            Ok(peer) => peer.id.clone(),
            Err(e) => {
                error!("Cannot simulate reply: {}", e);
                return Err(e);
            }
        };

        Ok(Message::new(
            Uuid::new_v4().to_string(),
            peer,
            self.pick_reply(),
            convo.ordered_timestamp(scheduler.now()),
            DeliveryStatus::Sent,
        ))
    }
}
