//! Timer port for delayed simulator work.
//!
//! Scheduled work is plain data (`SimulatorEvent`) rather than closures: the
//! scheduler hands due events back to the client, which applies them to the
//! store one at a time.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{ConversationId, MessageId};

/// Handle returned by `Scheduler::schedule`, used to revoke the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Deferred work produced by the delivery simulator. Every event carries the
/// store epoch it was scheduled against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatorEvent {
    Delivered {
        conversation_id: ConversationId,
        message_id: MessageId,
        epoch: u64,
    },
    TypingStarted {
        conversation_id: ConversationId,
        epoch: u64,
    },
    ReplyDue {
        conversation_id: ConversationId,
        epoch: u64,
    },
}

impl SimulatorEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            SimulatorEvent::Delivered { conversation_id, .. }
            | SimulatorEvent::TypingStarted { conversation_id, .. }
            | SimulatorEvent::ReplyDue { conversation_id, .. } => conversation_id,
        }
    }

    pub fn epoch(&self) -> u64 {
        match self {
            SimulatorEvent::Delivered { epoch, .. }
            | SimulatorEvent::TypingStarted { epoch, .. }
            | SimulatorEvent::ReplyDue { epoch, .. } => *epoch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub token: TimerToken,
    pub event: SimulatorEvent,
}

pub trait Scheduler {
    /// Current time as seen by the engine.
    fn now(&self) -> DateTime<Utc>;

    /// Queue `event` to fire after `delay`.
    fn schedule(&mut self, delay: Duration, event: SimulatorEvent) -> TimerToken;

    /// Revoke a pending event. Returns `false` if it already fired or is unknown.
    fn cancel(&mut self, token: TimerToken) -> bool;

    /// Called once a delivered event has been handled.
    fn release(&mut self, _token: TimerToken) {}
}

/// Virtual-time scheduler. Nothing fires until the owner advances the clock,
/// which makes every timing scenario reproducible.
pub struct ManualScheduler {
    now: DateTime<Utc>,
    // Keyed by (due time, token) so equal due times keep scheduling order
    queue: BTreeMap<(DateTime<Utc>, TimerToken), SimulatorEvent>,
    due_by_token: HashMap<TimerToken, DateTime<Utc>>,
    next_token: u64,
}

impl ManualScheduler {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualScheduler {
            now: start,
            queue: BTreeMap::new(),
            due_by_token: HashMap::new(),
            next_token: 0,
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Pop the earliest event due at or before `until`, moving the clock to
    /// its due time.
    pub fn pop_due(&mut self, until: DateTime<Utc>) -> Option<ScheduledEvent> {
        let (&(due, token), _) = self.queue.iter().next()?;
        if due > until {
            return None;
        }
        let event = self.queue.remove(&(due, token))?;
        self.due_by_token.remove(&token);
        if due > self.now {
            self.now = due;
        }
        Some(ScheduledEvent { token, event })
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&mut self, now: DateTime<Utc>) {
        if now > self.now {
            self.now = now;
        }
    }
}

// `start + delay`, saturating at the latest representable instant
pub(crate) fn offset(start: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| start.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn schedule(&mut self, delay: Duration, event: SimulatorEvent) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        let due = offset(self.now, delay);
        self.queue.insert((due, token), event);
        self.due_by_token.insert(token, due);
        token
    }

    fn cancel(&mut self, token: TimerToken) -> bool {
        match self.due_by_token.remove(&token) {
            Some(due) => self.queue.remove(&(due, token)).is_some(),
            None => false,
        }
    }
}

/// Real-time scheduler backed by tokio timers. Each event sleeps in its own
/// task and is then pushed onto the channel returned by `new`.
///
/// Must be used from within a tokio runtime.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<ScheduledEvent>,
    tasks: HashMap<TimerToken, JoinHandle<()>>,
    next_token: u64,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScheduledEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            TokioScheduler {
                tx,
                tasks: HashMap::new(),
                next_token: 0,
            },
            rx,
        )
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule(&mut self, delay: Duration, event: SimulatorEvent) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(ScheduledEvent { token, event }).is_err() {
                debug!("Scheduler receiver dropped before event {:?} fired", token);
            }
        });
        self.tasks.insert(token, handle);
        token
    }

    fn cancel(&mut self, token: TimerToken) -> bool {
        match self.tasks.remove(&token) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    fn release(&mut self, token: TimerToken) {
        self.tasks.remove(&token);
    }
}
