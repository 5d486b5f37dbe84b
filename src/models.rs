use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type ConversationId = String;
pub type MessageId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Offline,
    Away,
}

/// Per-message delivery lifecycle. Variants are declared in lifecycle order so
/// the derived `Ord` is the progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent = 0,      // Accepted locally, not yet acknowledged by the peer
    Delivered = 1, // Reached the recipient's device
    Read = 2,      // Seen by the recipient
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "sender")]
    pub sender_id: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(
        id: impl Into<MessageId>,
        sender_id: impl Into<UserId>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        status: DeliveryStatus,
    ) -> Self {
        Message {
            id: id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            timestamp,
            status,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    /// Move the message forward in its lifecycle. Returns `false` and leaves the
    /// status alone when `next` would be a regression or a repeat.
    pub fn advance_to(&mut self, next: DeliveryStatus) -> bool {
        if next > self.status {
            self.status = next;
            true
        } else {
            false
        }
    }

    pub fn is_read(&self) -> bool {
        self.status == DeliveryStatus::Read
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: Vec<User>,
    // Denormalized copy of the newest message, kept in step with `messages`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub is_typing: bool,
    #[serde(default)]
    pub is_group: bool,
}

impl Conversation {
    pub fn new(id: impl Into<ConversationId>, participants: Vec<User>) -> Self {
        let is_group = participants.len() > 2;
        Conversation {
            id: id.into(),
            participants,
            last_message: None,
            unread_count: 0,
            messages: Vec::new(),
            is_typing: false,
            is_group,
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }

    pub fn participant(&self, user_id: &str) -> Option<&User> {
        self.participants.iter().find(|p| p.id == user_id)
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_message.as_ref().map(|m| m.timestamp)
    }

    /// `now`, or the newest message's timestamp when the clock is behind it.
    pub fn ordered_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.last_timestamp().map_or(now, |last| last.max(now))
    }

    /// Foreign messages that have not been read yet.
    pub fn count_unread(&self, current_user_id: &str) -> u32 {
        self.messages
            .iter()
            .filter(|m| m.sender_id != current_user_id && !m.is_read())
            .count() as u32
    }

    /// Append a message and refresh `last_message` in one step. The newest
    /// timestamp wins; on a tie the later insertion wins.
    pub(crate) fn push_message(&mut self, message: Message) {
        let replaces_last = self
            .last_message
            .as_ref()
            .map_or(true, |last| message.timestamp >= last.timestamp);
        if replaces_last {
            self.last_message = Some(message.clone());
        }
        self.messages.push(message);
    }

    /// Rebuild `last_message` from the message list.
    pub(crate) fn refresh_last_message(&mut self) {
        self.last_message = self
            .messages
            .iter()
            .fold(None::<&Message>, |newest, m| match newest {
                Some(n) if n.timestamp > m.timestamp => Some(n),
                _ => Some(m),
            })
            .cloned();
    }

    /// Advance one message and keep the `last_message` copy consistent.
    pub(crate) fn advance_message(&mut self, message_id: &str, next: DeliveryStatus) -> bool {
        let changed = match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => message.advance_to(next),
            None => return false,
        };
        if changed {
            if let Some(last) = self.last_message.as_mut().filter(|l| l.id == message_id) {
                last.advance_to(next);
            }
        }
        changed
    }
}
