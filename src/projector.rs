//! Pure derivations over conversation state for rendering. Nothing in here
//! mutates the store.

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use log::error;
use std::fmt;

use crate::error::{ChatError, ChatResult};
use crate::models::{Conversation, Message, User};

/// First participant that is not the local user.
pub fn other_participant<'a>(
    conversation: &'a Conversation,
    current_user_id: &str,
) -> ChatResult<&'a User> {
    conversation
        .participants
        .iter()
        .find(|p| p.id != current_user_id)
        .ok_or_else(|| ChatError::NoOtherParticipantError(conversation.id.clone()))
}

/// Conversations whose peer name contains `filter_text` as given
/// (case-insensitive, not trimmed), newest activity first. Equal timestamps
/// keep their input order and conversations without messages go last.
pub fn sorted_conversations<'a>(
    conversations: &'a [Conversation],
    current_user_id: &str,
    filter_text: &str,
) -> Vec<&'a Conversation> {
    let needle = filter_text.to_lowercase();

    let mut visible: Vec<&Conversation> = conversations
        .iter()
        .filter(|convo| match other_participant(convo, current_user_id) {
            Ok(peer) => needle.is_empty() || peer.name.to_lowercase().contains(&needle),
            Err(e) => {
                error!("Excluding conversation from list: {}", e);
                false
            }
        })
        .collect();

    // sort_by is stable
    visible.sort_by(|a, b| b.last_timestamp().cmp(&a.last_timestamp()));
    visible
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLabel {
    Today,
    Yesterday,
    Date(NaiveDate),
}

impl DateLabel {
    pub fn for_date(date: NaiveDate, today: NaiveDate) -> Self {
        if date == today {
            DateLabel::Today
        } else if today.pred_opt() == Some(date) {
            DateLabel::Yesterday
        } else {
            DateLabel::Date(date)
        }
    }
}

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DateLabel::Today => write!(f, "Today"),
            DateLabel::Yesterday => write!(f, "Yesterday"),
            DateLabel::Date(date) => write!(f, "{}", date.format("%B %-d, %Y")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageGroup<'a> {
    pub label: DateLabel,
    pub messages: Vec<&'a Message>,
}

/// Split messages into runs sharing a calendar day, in stored order. A new
/// group starts exactly when the label changes from the previous message.
/// Days are computed in `now`'s time zone.
pub fn group_messages_by_date<'a, I, Tz>(messages: I, now: &DateTime<Tz>) -> Vec<MessageGroup<'a>>
where
    I: IntoIterator<Item = &'a Message>,
    Tz: TimeZone,
{
    let zone = now.timezone();
    let today = now.date_naive();
    let mut groups: Vec<MessageGroup<'a>> = Vec::new();

    for message in messages {
        let day = message.timestamp.with_timezone(&zone).date_naive();
        let label = DateLabel::for_date(day, today);
        match groups.last_mut() {
            Some(group) if group.label == label => group.messages.push(message),
            _ => groups.push(MessageGroup {
                label,
                messages: vec![message],
            }),
        }
    }

    groups
}

/// Inverse of `group_messages_by_date`.
pub fn flatten<'a>(groups: &[MessageGroup<'a>]) -> Vec<&'a Message> {
    groups
        .iter()
        .flat_map(|g| g.messages.iter().copied())
        .collect()
}

/// Short relative timestamp for list rows: time of day for today, otherwise
/// the weekday within a week, otherwise the date.
pub fn format_list_time<Tz>(timestamp: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let day = timestamp.date_naive();
    let today = now.date_naive();
    if day == today {
        timestamp.format("%H:%M").to_string()
    } else if today - day < Duration::days(7) && day < today {
        timestamp.format("%a").to_string()
    } else {
        timestamp.format("%d/%m/%Y").to_string()
    }
}
