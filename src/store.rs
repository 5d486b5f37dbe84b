//! The authoritative set of conversations and the current selection.
//!
//! All mutations validate first and write second, so a returned error always
//! means nothing changed. Listeners are notified after every committed
//! mutation with the whole state, never with partial deltas.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::models::{Conversation, ConversationId, DeliveryStatus, Message, MessageId, User};

/// Read-only view handed to listeners.
#[derive(Debug, Clone, Copy)]
pub struct StoreSnapshot<'a> {
    pub conversations: &'a [Conversation],
    pub selected_id: Option<&'a str>,
    pub current_user: Option<&'a User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(StoreSnapshot<'_>)>;

pub struct ConversationStore {
    current_user: Option<User>,
    conversations: Vec<Conversation>,
    index: HashMap<ConversationId, usize>,
    selected: Option<ConversationId>,
    // Bumped on every load so scheduled work can detect it is stale
    epoch: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        ConversationStore {
            current_user: None,
            conversations: Vec::new(),
            index: HashMap::new(),
            selected: None,
            epoch: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.index
            .get(conversation_id)
            .map(|&idx| &self.conversations[idx])
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Conversation> {
        self.selected.as_deref().and_then(|id| self.conversation(id))
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn snapshot(&self) -> StoreSnapshot<'_> {
        StoreSnapshot {
            conversations: &self.conversations,
            selected_id: self.selected.as_deref(),
            current_user: self.current_user.as_ref(),
        }
    }

    /// Register a listener that runs after every committed mutation.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(StoreSnapshot<'_>) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        let snapshot = StoreSnapshot {
            conversations: &self.conversations,
            selected_id: self.selected.as_deref(),
            current_user: self.current_user.as_ref(),
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(snapshot);
        }
    }

    fn require_user(&self) -> ChatResult<&User> {
        self.current_user
            .as_ref()
            .ok_or_else(|| ChatError::InvalidStateError("store has not been loaded".to_string()))
    }

    fn position(&self, conversation_id: &str) -> ChatResult<usize> {
        self.index
            .get(conversation_id)
            .copied()
            .ok_or_else(|| ChatError::UnknownConversationError(conversation_id.to_string()))
    }

    /// Replace the whole state. Derived fields are recomputed from the
    /// message lists; the selection is cleared and the epoch bumped.
    pub fn load(&mut self, conversations: Vec<Conversation>, current_user: User) -> ChatResult<()> {
        validate_payload(&conversations, &current_user)?;

        let mut conversations = conversations;
        let mut index = HashMap::with_capacity(conversations.len());
        for (idx, convo) in conversations.iter_mut().enumerate() {
            convo.refresh_last_message();
            let unread = convo.count_unread(&current_user.id);
            if unread != convo.unread_count {
                warn!(
                    "Conversation {} declared {} unread but has {}; using computed value",
                    convo.id, convo.unread_count, unread
                );
                convo.unread_count = unread;
            }
            index.insert(convo.id.clone(), idx);
        }

        info!(
            "Loaded {} conversations for user {}",
            conversations.len(),
            current_user.id
        );
        self.conversations = conversations;
        self.index = index;
        self.current_user = Some(current_user);
        self.selected = None;
        self.epoch += 1;
        self.notify();
        Ok(())
    }

    /// Open a conversation and reconcile its read state.
    pub fn select(&mut self, conversation_id: &str) -> ChatResult<&Conversation> {
        let user_id = self.require_user()?.id.clone();
        let idx = self.position(conversation_id)?;

        let convo = &mut self.conversations[idx];
        let foreign: Vec<MessageId> = convo
            .messages
            .iter()
            .filter(|m| m.sender_id != user_id)
            .map(|m| m.id.clone())
            .collect();
        let mut reconciled = 0;
        for id in &foreign {
            if convo.advance_message(id, DeliveryStatus::Read) {
                reconciled += 1;
            }
        }
        convo.unread_count = 0;
        debug!(
            "Selected conversation {} ({} messages marked read)",
            conversation_id, reconciled
        );

        self.selected = Some(conversation_id.to_string());
        self.notify();
        Ok(&self.conversations[idx])
    }

    /// Append a message from the local user to the open conversation.
    pub fn send_message(
        &mut self,
        conversation_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> ChatResult<Message> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyContentError);
        }
        let user_id = self.require_user()?.id.clone();
        match self.selected.as_deref() {
            None => return Err(ChatError::NoActiveConversationError),
            Some(selected) if selected != conversation_id => {
                return Err(ChatError::NotSelectedError(conversation_id.to_string()))
            }
            Some(_) => {}
        }
        let idx = self.position(conversation_id)?;

        let message = Message::new(
            Uuid::new_v4().to_string(),
            user_id,
            content,
            self.conversations[idx].ordered_timestamp(now),
            DeliveryStatus::Sent,
        );
        self.conversations[idx].push_message(message.clone());
        info!("Sent message {} in conversation {}", message.id, conversation_id);

        self.notify();
        Ok(message)
    }

    /// Append a message that arrived from a transport or the simulator.
    ///
    /// A message whose id is already present is treated as a status update.
    /// A new message older than `last_message` is rejected.
    pub fn apply_incoming(&mut self, conversation_id: &str, message: Message) -> ChatResult<()> {
        let user_id = self.require_user()?.id.clone();
        let idx = self.position(conversation_id)?;
        let is_selected = self.selected.as_deref() == Some(conversation_id);
        check_sender(&self.conversations[idx], &message)?;

        if self.conversations[idx].message(&message.id).is_some() {
            let changed = self.conversations[idx].advance_message(&message.id, message.status());
            debug!(
                "Duplicate message {} in {} handled as status update (changed: {})",
                message.id, conversation_id, changed
            );
            if changed {
                self.refresh_unread(idx, &user_id, is_selected);
                self.notify();
            }
            return Ok(());
        }
        check_order(&self.conversations[idx], &message)?;

        self.append_incoming(idx, &user_id, is_selected, message);
        self.notify();
        Ok(())
    }

    /// A peer reply in one commit: typing stops, the peer has read what we
    /// sent, and the reply is appended. Returns how many outgoing messages
    /// became read. On error nothing changes.
    pub fn deliver_reply(&mut self, conversation_id: &str, reply: Message) -> ChatResult<usize> {
        let user_id = self.require_user()?.id.clone();
        let idx = self.position(conversation_id)?;
        let is_selected = self.selected.as_deref() == Some(conversation_id);

        let convo = &self.conversations[idx];
        check_sender(convo, &reply)?;
        if reply.sender_id == user_id {
            return Err(ChatError::InvalidStateError(format!(
                "reply {} in {} must come from a peer",
                reply.id, conversation_id
            )));
        }
        if convo.message(&reply.id).is_some() {
            return Err(ChatError::InvalidStateError(format!(
                "reply id {} already exists in {}",
                reply.id, conversation_id
            )));
        }
        check_order(convo, &reply)?;

        let convo = &mut self.conversations[idx];
        convo.is_typing = false;
        let acknowledged = mark_own_read(convo, &user_id);
        debug!("Peer read {} messages in {}", acknowledged, conversation_id);
        self.append_incoming(idx, &user_id, is_selected, reply);

        self.notify();
        Ok(acknowledged)
    }

    fn append_incoming(&mut self, idx: usize, user_id: &str, is_selected: bool, message: Message) {
        let mut message = message;
        let foreign = message.sender_id != user_id;
        if foreign && is_selected {
            // Open conversation acknowledges immediately
            message.advance_to(DeliveryStatus::Read);
        }
        let counts_unread = foreign && !is_selected && !message.is_read();

        let convo = &mut self.conversations[idx];
        debug!("Incoming message {} in conversation {}", message.id, convo.id);
        convo.push_message(message);
        if counts_unread {
            convo.unread_count += 1;
        }
    }

    pub fn set_typing(&mut self, conversation_id: &str, is_typing: bool) -> ChatResult<()> {
        let idx = self.position(conversation_id)?;
        let convo = &mut self.conversations[idx];
        if convo.is_typing == is_typing {
            return Ok(());
        }
        convo.is_typing = is_typing;
        debug!("Typing in {} set to {}", conversation_id, is_typing);
        self.notify();
        Ok(())
    }

    /// Monotonic status update for one message. Returns whether anything
    /// changed; a regression is ignored.
    pub fn advance_status(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        status: DeliveryStatus,
    ) -> ChatResult<bool> {
        let idx = self.position(conversation_id)?;
        if self.conversations[idx].message(message_id).is_none() {
            return Err(ChatError::UnknownMessageError {
                conversation_id: conversation_id.to_string(),
                message_id: message_id.to_string(),
            });
        }

        let changed = self.conversations[idx].advance_message(message_id, status);
        if changed {
            debug!("Message {} advanced to {:?}", message_id, status);
            if let Some(user_id) = self.current_user.as_ref().map(|u| u.id.clone()) {
                let is_selected = self.selected.as_deref() == Some(conversation_id);
                self.refresh_unread(idx, &user_id, is_selected);
            }
            self.notify();
        } else {
            debug!("Ignored status {:?} for message {}", status, message_id);
        }
        Ok(changed)
    }

    /// The peer has read everything we sent in this conversation.
    pub fn acknowledge_outgoing(&mut self, conversation_id: &str) -> ChatResult<usize> {
        let user_id = self.require_user()?.id.clone();
        let idx = self.position(conversation_id)?;

        let acknowledged = mark_own_read(&mut self.conversations[idx], &user_id);
        if acknowledged > 0 {
            debug!("Peer read {} messages in {}", acknowledged, conversation_id);
            self.notify();
        }
        Ok(acknowledged)
    }

    // A foreign message read through a receipt no longer counts as unread
    fn refresh_unread(&mut self, idx: usize, user_id: &str, is_selected: bool) {
        let convo = &mut self.conversations[idx];
        if is_selected {
            convo.unread_count = 0;
        } else {
            convo.unread_count = convo.unread_count.min(convo.count_unread(user_id));
        }
    }
}

fn check_sender(convo: &Conversation, message: &Message) -> ChatResult<()> {
    if convo.has_participant(&message.sender_id) {
        Ok(())
    } else {
        Err(ChatError::InvalidStateError(format!(
            "sender {} is not a participant of {}",
            message.sender_id, convo.id
        )))
    }
}

// Messages stay in timestamp order; equal timestamps keep arrival order
fn check_order(convo: &Conversation, message: &Message) -> ChatResult<()> {
    match convo.last_timestamp() {
        Some(last) if message.timestamp < last => Err(ChatError::InvalidStateError(format!(
            "message {} at {} is older than the newest message in {} ({})",
            message.id, message.timestamp, convo.id, last
        ))),
        _ => Ok(()),
    }
}

fn mark_own_read(convo: &mut Conversation, user_id: &str) -> usize {
    let own: Vec<MessageId> = convo
        .messages
        .iter()
        .filter(|m| m.sender_id == user_id && !m.is_read())
        .map(|m| m.id.clone())
        .collect();
    for id in &own {
        convo.advance_message(id, DeliveryStatus::Read);
    }
    own.len()
}

fn validate_payload(conversations: &[Conversation], current_user: &User) -> ChatResult<()> {
    let mut seen_conversations = HashSet::new();

    for convo in conversations {
        if !seen_conversations.insert(convo.id.as_str()) {
            return Err(ChatError::InvalidStateError(format!(
                "duplicate conversation id {}",
                convo.id
            )));
        }
        if convo.participants.len() < 2 {
            return Err(ChatError::InvalidStateError(format!(
                "conversation {} needs at least two participants, found {}",
                convo.id,
                convo.participants.len()
            )));
        }

        let mut seen_users = HashSet::new();
        for participant in &convo.participants {
            if !seen_users.insert(participant.id.as_str()) {
                return Err(ChatError::InvalidStateError(format!(
                    "conversation {} lists participant {} twice",
                    convo.id, participant.id
                )));
            }
        }
        if !seen_users.contains(current_user.id.as_str()) {
            return Err(ChatError::InvalidStateError(format!(
                "current user {} is not a participant of {}",
                current_user.id, convo.id
            )));
        }

        if let Some(stray) = convo
            .messages
            .iter()
            .find(|m| !seen_users.contains(m.sender_id.as_str()))
        {
            return Err(ChatError::InvalidStateError(format!(
                "message {} in {} has unknown sender {}",
                stray.id, convo.id, stray.sender_id
            )));
        }
        if let Some(pair) = convo
            .messages
            .windows(2)
            .find(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(ChatError::InvalidStateError(format!(
                "message {} in {} is older than the message before it",
                pair[1].id, convo.id
            )));
        }
    }

    Ok(())
}
