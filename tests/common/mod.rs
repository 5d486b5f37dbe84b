// Common test utilities for integration tests
#![allow(dead_code)]

use std::sync::Once;

use chrono::{DateTime, TimeZone, Utc};
use log::LevelFilter;

use parley::controller::Layout;
use parley::models::{Conversation, DeliveryStatus, Message, User, UserStatus};
use parley::random::ScriptedRandom;
use parley::scheduler::ManualScheduler;
use parley::simulator::SimulatorConfig;
use parley::ChatClient;

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

pub type TestClient = ChatClient<ManualScheduler, ScriptedRandom>;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    start_time() - chrono::Duration::hours(1) + chrono::Duration::seconds(secs)
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        avatar: None,
        status: UserStatus::Online,
    }
}

pub fn me() -> User {
    user("me", "Me")
}

/// Two conversations: C1 with two unread messages from user-1, C2 empty.
pub fn fixture() -> Vec<Conversation> {
    let mut c1 = Conversation::new("C1", vec![me(), user("user-1", "Sarah Johnson")]);
    c1.messages = vec![
        Message::new("c1-m1", "me", "Morning!", at(0), DeliveryStatus::Read),
        Message::new("c1-m2", "user-1", "Did the invoices go out?", at(60), DeliveryStatus::Delivered),
        Message::new("c1-m3", "user-1", "Finance is asking.", at(90), DeliveryStatus::Sent),
    ];
    c1.unread_count = 2;

    let c2 = Conversation::new("C2", vec![me(), user("user-2", "Michael Chen")]);
    vec![c1, c2]
}

pub fn test_client(rng: ScriptedRandom) -> TestClient {
    test_client_with(rng, SimulatorConfig::default())
}

pub fn test_client_with(rng: ScriptedRandom, config: SimulatorConfig) -> TestClient {
    let mut client = ChatClient::new(ManualScheduler::new(start_time()), rng, config, Layout::Wide)
        .expect("valid simulator config");
    client.load(fixture(), me()).expect("fixture loads");
    client
}

/// Seconds as a std duration, for `advance`.
pub fn secs(n: u64) -> std::time::Duration {
    std::time::Duration::from_secs(n)
}

pub fn millis(n: u64) -> std::time::Duration {
    std::time::Duration::from_millis(n)
}
