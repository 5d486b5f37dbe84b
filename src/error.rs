//! Error type shared by the conversation engine.

use thiserror::Error;

use crate::models::{ConversationId, MessageId};

/// Errors raised by store mutations, the simulator and the projector.
///
/// Every failing store mutation leaves the previous state untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    /// The load payload (or an incoming message) breaks a data invariant
    #[error("Invalid state: {0}")]
    InvalidStateError(String),

    /// Blank message content
    #[error("Message content is empty")]
    EmptyContentError,

    /// A send was attempted while no conversation is open
    #[error("No conversation is selected")]
    NoActiveConversationError,

    /// A send targeted a conversation other than the open one
    #[error("Conversation {0} is not the selected conversation")]
    NotSelectedError(ConversationId),

    #[error("Unknown conversation: {0}")]
    UnknownConversationError(ConversationId),

    #[error("Unknown message {message_id} in conversation {conversation_id}")]
    UnknownMessageError {
        conversation_id: ConversationId,
        message_id: MessageId,
    },

    /// Conversation has nobody besides the local user
    #[error("Conversation {0} has no participant other than the current user")]
    NoOtherParticipantError(ConversationId),

    /// A scheduled callback outlived the state it was scheduled against
    #[error("Scheduled event for {conversation_id} is stale (epoch {epoch})")]
    StaleScheduleError {
        conversation_id: ConversationId,
        epoch: u64,
    },

    #[error("Invalid simulator configuration: {0}")]
    InvalidConfigError(String),
}

pub type ChatResult<T> = Result<T, ChatError>;
