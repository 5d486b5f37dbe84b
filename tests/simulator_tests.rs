// Simulated peer timing: typing before reply, delivery receipts, independence
// of concurrent sequences and cancellation on reload.

mod common;
use common::{fixture, me, millis, secs, setup_logging, start_time, test_client, test_client_with, user};

use std::cell::RefCell;
use std::rc::Rc;

use parley::controller::Layout;
use parley::models::{Conversation, DeliveryStatus};
use parley::random::ScriptedRandom;
use parley::scheduler::{ManualScheduler, Scheduler, SimulatorEvent};
use parley::simulator::{SimulatorConfig, DEFAULT_REPLIES, MAX_DELAY_MS};
use parley::{ChatClient, ChatError};

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Typing,
    Reply(String),
    TypingStopped,
}

#[test]
fn test_typing_observed_before_reply() {
    setup_logging();
    let mut client = test_client(ScriptedRandom::always().with_picks([1]));
    client.select_conversation("C1").unwrap();

    let seen: Rc<RefCell<Vec<Seen>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let mut last_len = 4;
    let mut was_typing = false;
    client.subscribe(move |snap| {
        let convo = snap.conversations.iter().find(|c| c.id == "C1").unwrap();
        if convo.is_typing && !was_typing {
            sink.borrow_mut().push(Seen::Typing);
        }
        if convo.messages.len() > last_len {
            let newest = convo.messages.last().unwrap();
            if newest.sender_id != "me" {
                sink.borrow_mut().push(Seen::Reply(newest.content.clone()));
            }
            last_len = convo.messages.len();
        }
        // Recorded after the reply check: a reply committed together with the
        // typing stop shows up as Reply then TypingStopped
        if was_typing && !convo.is_typing {
            sink.borrow_mut().push(Seen::TypingStopped);
        }
        was_typing = convo.is_typing;
    });

    let sent = client.send_message("C1", "hello").unwrap();
    assert!(seen.borrow().is_empty());

    client.advance(millis(999));
    assert!(seen.borrow().is_empty());
    assert_eq!(
        client.store().conversation("C1").unwrap().message(&sent.id).unwrap().status(),
        DeliveryStatus::Delivered
    );

    client.advance(millis(1));
    assert_eq!(*seen.borrow(), vec![Seen::Typing]);
    assert!(client.store().conversation("C1").unwrap().is_typing);

    client.advance(secs(2));
    assert_eq!(
        *seen.borrow(),
        vec![
            Seen::Typing,
            Seen::Reply(DEFAULT_REPLIES[1].to_string()),
            Seen::TypingStopped,
        ]
    );

    let convo = client.store().conversation("C1").unwrap();
    assert!(!convo.is_typing);
    assert_eq!(convo.messages.len(), 5);
    assert_eq!(convo.unread_count, 0);
    // Peer replied, so it has read what we sent
    assert!(convo.message(&sent.id).unwrap().is_read());
    assert_eq!(convo.last_message.as_ref().unwrap().sender_id, "user-1");
}

#[test]
fn test_oversized_delays_are_refused() {
    setup_logging();
    let mut config = SimulatorConfig::default();
    config.reply_delay_ms = u64::MAX;
    let err = ChatClient::new(ManualScheduler::new(start_time()), ScriptedRandom::always(), config, Layout::Wide)
        .err()
        .unwrap();
    assert!(matches!(err, ChatError::InvalidConfigError(_)));

    // Longest accepted delays still keep typing ahead of the reply
    let mut config = SimulatorConfig::default();
    config.typing_delay_ms = MAX_DELAY_MS - 1;
    config.reply_delay_ms = MAX_DELAY_MS;
    config.delivery_delay_ms = None;
    let mut client = test_client_with(ScriptedRandom::always(), config);
    client.select_conversation("C2").unwrap();
    client.send_message("C2", "see you tomorrow").unwrap();

    assert_eq!(client.advance(millis(1)), 0);
    assert_eq!(client.advance(millis(MAX_DELAY_MS - 2)), 1);
    assert!(client.store().conversation("C2").unwrap().is_typing);
    assert_eq!(client.advance(millis(1)), 1);
    let convo = client.store().conversation("C2").unwrap();
    assert!(!convo.is_typing);
    assert_eq!(convo.messages.len(), 2);
}

#[test]
fn test_no_trigger_means_only_delivery() {
    setup_logging();
    let mut client = test_client(ScriptedRandom::new().with_floats([0.5]));
    client.select_conversation("C1").unwrap();
    let sent = client.send_message("C1", "anyone?").unwrap();

    let fired = client.advance(secs(10));
    assert_eq!(fired, 1);

    let convo = client.store().conversation("C1").unwrap();
    assert_eq!(convo.messages.len(), 4);
    assert!(!convo.is_typing);
    assert_eq!(convo.message(&sent.id).unwrap().status(), DeliveryStatus::Delivered);
}

#[test]
fn test_reply_to_unselected_counts_unread() {
    setup_logging();
    let mut client = test_client(ScriptedRandom::always());
    client.select_conversation("C2").unwrap();
    client.send_message("C2", "ping").unwrap();

    // Move away before the reply lands
    client.select_conversation("C1").unwrap();
    client.advance(secs(3));

    let c2 = client.store().conversation("C2").unwrap();
    assert_eq!(c2.unread_count, 1);
    assert_eq!(c2.last_message.as_ref().unwrap().sender_id, "user-2");
    assert_eq!(c2.last_message.as_ref().unwrap().status(), DeliveryStatus::Sent);
}

#[test]
fn test_concurrent_sequences_are_independent() {
    setup_logging();
    let mut config = SimulatorConfig::default();
    config.delivery_delay_ms = None;
    let mut client = test_client_with(ScriptedRandom::always(), config);
    client.select_conversation("C1").unwrap();

    client.send_message("C1", "one").unwrap();
    client.advance(secs(1));
    client.send_message("C1", "two").unwrap();
    assert_eq!(client.pending_events(), 3);

    // First reply at t=3, second typing at t=2 and reply at t=4
    client.advance(secs(2));
    assert_eq!(client.store().conversation("C1").unwrap().messages.len(), 6);
    client.advance(secs(1));
    assert_eq!(client.store().conversation("C1").unwrap().messages.len(), 7);
    assert_eq!(client.pending_events(), 0);
}

#[test]
fn test_reload_cancels_pending_replies() {
    setup_logging();
    let mut client = test_client(ScriptedRandom::always());
    client.select_conversation("C1").unwrap();
    client.send_message("C1", "are you there?").unwrap();
    assert_eq!(client.scheduler().pending(), 3);

    // Same ids after reload: stale work must still not touch them
    client.load(fixture(), me()).unwrap();
    assert_eq!(client.scheduler().pending(), 0);
    assert_eq!(client.pending_events(), 0);

    assert_eq!(client.advance(secs(10)), 0);
    let convo = client.store().conversation("C1").unwrap();
    assert_eq!(convo.messages.len(), 3);
    assert!(!convo.is_typing);
}

#[test]
fn test_stale_event_is_dropped_silently() {
    setup_logging();
    let mut client = test_client(ScriptedRandom::always());
    let stale_epoch = client.store().epoch();

    // An event that was already in flight when the data was reloaded
    let mut sched = ManualScheduler::new(start_time());
    sched.schedule(
        secs(0),
        SimulatorEvent::TypingStarted {
            conversation_id: "C2".to_string(),
            epoch: stale_epoch,
        },
    );
    let in_flight = sched.pop_due(start_time()).unwrap();

    client.load(fixture(), me()).unwrap();
    assert_ne!(client.store().epoch(), stale_epoch);
    assert!(client.handle_event(in_flight).is_ok());
    assert!(!client.store().conversation("C2").unwrap().is_typing);

    // Same for a conversation that no longer exists
    let fresh = vec![Conversation::new("C9", vec![me(), user("user-9", "David Wilson")])];
    client.load(fresh, me()).unwrap();
    let mut sched = ManualScheduler::new(start_time());
    sched.schedule(
        secs(0),
        SimulatorEvent::ReplyDue {
            conversation_id: "C1".to_string(),
            epoch: client.store().epoch(),
        },
    );
    let orphan = sched.pop_due(start_time()).unwrap();
    assert!(client.handle_event(orphan).is_ok());
    assert_eq!(client.store().conversations().len(), 1);
}
