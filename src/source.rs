//! Boundary to whatever supplies the initial conversations.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::models::{Attachment, AttachmentKind, Conversation, DeliveryStatus, Message, User, UserStatus};

/// What a data source hands to `ChatClient::load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    pub current_user: User,
    pub conversations: Vec<Conversation>,
}

pub trait ConversationSource {
    fn fetch(&self) -> Result<SeedData>;
}

/// Reads `{"currentUser": ..., "conversations": [...]}` from a JSON file.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `seed` in the format `fetch` reads back.
    pub fn save(&self, seed: &SeedData) -> Result<()> {
        let mut file = File::create(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        serde_json::to_writer_pretty(&mut file, seed)?;
        file.write_all(b"\n")?;
        info!("Saved {} conversations to {}", seed.conversations.len(), self.path.display());
        Ok(())
    }
}

impl ConversationSource for JsonFileSource {
    fn fetch(&self) -> Result<SeedData> {
        if !self.path.exists() {
            return Err(anyhow!("Conversation file {} does not exist", self.path.display()));
        }
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let seed: SeedData = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        info!(
            "Loaded {} conversations for {} from {}",
            seed.conversations.len(),
            seed.current_user.name,
            self.path.display()
        );
        Ok(seed)
    }
}

/// Built-in sample team chat, with timestamps relative to `now`.
pub struct DemoSource {
    now: DateTime<Utc>,
}

impl DemoSource {
    pub fn new(now: DateTime<Utc>) -> Self {
        DemoSource { now }
    }
}

fn person(id: &str, name: &str, status: UserStatus) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        avatar: Some(format!("/avatars/{}.png", id)),
        status,
    }
}

impl ConversationSource for DemoSource {
    fn fetch(&self) -> Result<SeedData> {
        let ago = |minutes: i64| self.now - Duration::minutes(minutes);

        let me = person("current-user", "You", UserStatus::Online);
        let sarah = person("user-1", "Sarah Johnson", UserStatus::Online);
        let michael = person("user-2", "Michael Chen", UserStatus::Away);
        let emily = person("user-3", "Emily Davis", UserStatus::Offline);
        let david = person("user-4", "David Wilson", UserStatus::Online);

        let mut sarah_chat = Conversation::new("conv-1", vec![me.clone(), sarah.clone()]);
        sarah_chat.messages = vec![
            Message::new("msg-1", "user-1", "Hi! Did you get a chance to review the Q3 invoice batch?", ago(60 * 26), DeliveryStatus::Read),
            Message::new("msg-2", "current-user", "Yes, two of them still need approval.", ago(60 * 25), DeliveryStatus::Read),
            Message::new("msg-3", "user-1", "Great, can you send me the list?", ago(15), DeliveryStatus::Delivered),
            Message::new("msg-4", "user-1", "I need it before the finance meeting.", ago(12), DeliveryStatus::Delivered),
        ];

        let mut michael_chat = Conversation::new("conv-2", vec![me.clone(), michael]);
        michael_chat.messages = vec![
            Message::new("msg-5", "current-user", "The new product catalogue is live.", ago(60 * 3), DeliveryStatus::Read),
            Message::new("msg-6", "user-2", "Here's the updated pricing sheet.", ago(60 * 2), DeliveryStatus::Read)
                .with_attachment(Attachment {
                    kind: AttachmentKind::File,
                    url: "/files/pricing-2026.xlsx".to_string(),
                    name: Some("pricing-2026.xlsx".to_string()),
                    size: Some(48_213),
                }),
        ];

        let mut emily_chat = Conversation::new("conv-3", vec![me.clone(), emily]);
        emily_chat.messages = vec![
            Message::new("msg-7", "user-3", "Permissions for the new org members are set.", ago(60 * 24 * 3), DeliveryStatus::Delivered),
        ];

        let mut team_chat = Conversation::new("conv-4", vec![me.clone(), david, sarah]);
        team_chat.messages = vec![
            Message::new("msg-8", "user-4", "Monthly report draft attached.", ago(45), DeliveryStatus::Read)
                .with_attachment(Attachment {
                    kind: AttachmentKind::Image,
                    url: "/files/revenue-chart.png".to_string(),
                    name: None,
                    size: None,
                }),
            Message::new("msg-9", "user-1", "Looks good to me.", ago(40), DeliveryStatus::Read),
        ];

        Ok(SeedData {
            current_user: me,
            conversations: vec![sarah_chat, michael_chat, emily_chat, team_chat],
        })
    }
}
