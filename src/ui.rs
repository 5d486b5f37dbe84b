use chrono::{DateTime, Local};
use std::fmt::Write as _;
use textwrap::{wrap, Options};

use parley::controller::PaneState;
use parley::models::{AttachmentKind, Conversation, DeliveryStatus, Message, UserStatus};
use parley::projector::{format_list_time, group_messages_by_date, other_participant};
use parley::random::RandomSource;
use parley::scheduler::Scheduler;
use parley::ChatClient;

const WIDTH: usize = 72;

pub const HELP: &str = "\
Commands:
  /list [filter]   show conversations, optionally filtered by name
  /open <id|n>     open a conversation by id or list position
  /back            return to the list (narrow layout)
  /narrow, /wide   switch layout
  /help            show this help
  /quit            exit
Anything else is sent to the open conversation.";

fn status_mark(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Sent => "✓",
        DeliveryStatus::Delivered => "✓✓",
        DeliveryStatus::Read => "✓✓ read",
    }
}

fn presence_mark(status: UserStatus) -> &'static str {
    match status {
        UserStatus::Online => "●",
        UserStatus::Away => "◐",
        UserStatus::Offline => "○",
    }
}

fn conversation_title(convo: &Conversation, user_id: &str) -> String {
    if convo.is_group {
        let names: Vec<&str> = convo
            .participants
            .iter()
            .filter(|p| p.id != user_id)
            .map(|p| p.name.as_str())
            .collect();
        return names.join(", ");
    }
    match other_participant(convo, user_id) {
        Ok(peer) => format!("{} {}", presence_mark(peer.status), peer.name),
        Err(_) => convo.id.clone(),
    }
}

pub fn render_list<S: Scheduler, R: RandomSource>(client: &ChatClient<S, R>, filter: &str) -> String {
    let mut out = String::new();
    let Some(user) = client.store().current_user() else {
        return out;
    };
    let now: DateTime<Local> = client.now().with_timezone(&Local);

    let _ = writeln!(out, "── Conversations {}", "─".repeat(WIDTH.saturating_sub(17)));
    for (n, convo) in client.visible_conversations(filter).iter().enumerate() {
        let selected = if client.store().selected_id() == Some(convo.id.as_str()) { ">" } else { " " };
        let unread = if convo.unread_count > 0 {
            format!(" ({})", convo.unread_count)
        } else {
            String::new()
        };
        let when = convo
            .last_message
            .as_ref()
            .map(|m| format_list_time(&m.timestamp.with_timezone(&Local), &now))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{}{:>2}. {}{}  [{}] {}",
            selected,
            n + 1,
            conversation_title(convo, &user.id),
            unread,
            convo.id,
            when
        );

        let preview = if convo.is_typing {
            "typing…".to_string()
        } else {
            convo
                .last_message
                .as_ref()
                .map(|m| m.content.clone())
                .unwrap_or_default()
        };
        if let Some(line) = wrap(&preview, WIDTH - 6).first() {
            let _ = writeln!(out, "      {}", line);
        }
    }
    out
}

fn render_message(out: &mut String, message: &Message, convo: &Conversation, user_id: &str) {
    let own = message.sender_id == user_id;
    let author = if own {
        "You".to_string()
    } else {
        convo
            .participant(&message.sender_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| message.sender_id.clone())
    };
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    let status = if own { status_mark(message.status()) } else { "" };

    let _ = writeln!(out, "  {} · {} {}", author, time, status);
    let indent = if own { "      " } else { "    " };
    let options = Options::new(WIDTH).initial_indent(indent).subsequent_indent(indent);
    for line in wrap(&message.content, options) {
        let _ = writeln!(out, "{}", line);
    }
    for attachment in &message.attachments {
        let kind = match attachment.kind {
            AttachmentKind::Image => "image",
            AttachmentKind::File => "file",
        };
        let name = attachment.name.as_deref().unwrap_or(&attachment.url);
        let _ = writeln!(out, "{}[{}: {}]", indent, kind, name);
    }
}

pub fn render_detail<S: Scheduler, R: RandomSource>(client: &ChatClient<S, R>) -> String {
    let mut out = String::new();
    let (Some(user), Some(convo)) = (client.store().current_user(), client.store().selected()) else {
        let _ = writeln!(out, "No conversation open. Use /open <id>.");
        return out;
    };
    let now: DateTime<Local> = client.now().with_timezone(&Local);

    let title = conversation_title(convo, &user.id);
    let _ = writeln!(out, "── {} {}", title, "─".repeat(WIDTH.saturating_sub(title.chars().count() + 4)));
    for group in group_messages_by_date(&convo.messages, &now) {
        let _ = writeln!(out, "\n            ── {} ──", group.label);
        for message in group.messages {
            render_message(&mut out, message, convo, &user.id);
        }
    }
    if convo.is_typing {
        let _ = writeln!(out, "\n  {} is typing…", title);
    }
    out
}

/// Render whatever panes the controller says are visible.
pub fn render<S: Scheduler, R: RandomSource>(client: &ChatClient<S, R>, filter: &str) -> String {
    match client.panes() {
        PaneState::ListOnly => render_list(client, filter),
        PaneState::DetailOnly => render_detail(client),
        PaneState::ListAndDetail => {
            format!("{}\n{}", render_list(client, filter), render_detail(client))
        }
    }
}
