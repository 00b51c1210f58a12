// Turn lifecycle tests: deltas, full messages, terminal events and stream
// closure, driven through the interpreter and the reveal tick.

use chatbot_rust::api::ClientEvent;
use chatbot_rust::app::{AppStatus, DEFAULT_PAUSE_REASON, handle_client_event, new_conversation};
use chatbot_rust::error::AppError;
use pretty_assertions::assert_eq;

use crate::helpers::{Frames, begin_turn, delta, message, send, send_with_id, test_app};

#[test]
fn deltas_then_completion_reveal_full_text() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    assert_eq!(app.status, AppStatus::Streaming);

    delta(&mut app, turn, "Hi");
    delta(&mut app, turn, " there");
    send(&mut app, turn, "job.completed", "{}");
    assert!(!message(&app, &id).is_streaming);

    Frames::new().settle(&mut app, &id, 100);
    let m = message(&app, &id);
    assert_eq!(m.content, "Hi there");
    assert!(!m.is_streaming);
    assert!(m.animation_complete);
    assert!(!m.has_error);
    assert_eq!(app.status, AppStatus::Ready);
    assert!(app.turn.is_none());
}

#[test]
fn revealed_content_is_always_prefix_of_delivered_text() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    let mut frames = Frames::new();
    let mut delivered = String::new();
    let mut previous = String::new();

    for (i, chunk) in ["The ", "quick ", "brown ", "fox ", "jumps ", "über ", "日本"].iter().enumerate() {
        delta(&mut app, turn, chunk);
        delivered.push_str(chunk);
        for _ in 0..=i % 3 {
            frames.tick(&mut app);
            let content = message(&app, &id).content.clone();
            assert!(delivered.starts_with(&content), "{content:?} not a prefix of {delivered:?}");
            assert!(content.starts_with(&previous), "reveal went backwards");
            previous = content;
        }
    }
    send(&mut app, turn, "job.completed", "{}");
    for content in frames.settle(&mut app, &id, 200) {
        assert!(delivered.starts_with(&content));
    }
    assert_eq!(message(&app, &id).content, delivered);
}

#[test]
fn full_message_after_deltas_changes_nothing() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    delta(&mut app, turn, "Streamed");
    send(&mut app, turn, "agent.message", r#"{"role":"assistant","content":"Different text"}"#);
    assert_eq!(app.reveal.target(), "Streamed");

    send(&mut app, turn, "job.completed", "{}");
    Frames::new().settle(&mut app, &id, 100);
    assert_eq!(message(&app, &id).content, "Streamed");
}

#[test]
fn full_message_without_deltas_becomes_the_buffer() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    send(&mut app, turn, "agent.message", r#"{"role":"assistant","content":"Whole answer"}"#);
    send(&mut app, turn, "job.completed", "{}");
    Frames::new().settle(&mut app, &id, 100);
    assert_eq!(message(&app, &id).content, "Whole answer");
}

#[test]
fn caught_up_reveal_waits_for_terminal_event() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    let mut frames = Frames::new();
    delta(&mut app, turn, "Hi");
    for _ in 0..20 {
        frames.tick(&mut app);
    }
    let m = message(&app, &id);
    assert_eq!(m.content, "Hi");
    assert!(!m.animation_complete);
    assert!(app.reveal.is_active());

    send(&mut app, turn, "job.completed", "{}");
    assert!(!message(&app, &id).animation_complete);
    frames.tick(&mut app);
    assert!(message(&app, &id).animation_complete);
}

#[test]
fn terminal_event_before_catch_up_does_not_finalize_early() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    let mut frames = Frames::new();
    delta(&mut app, turn, "A longer answer that takes several frames");
    send(&mut app, turn, "job.completed", "{}");
    frames.tick(&mut app);
    frames.tick(&mut app);
    let m = message(&app, &id);
    assert!(!m.is_streaming);
    assert!(!m.animation_complete);
    assert_eq!(m.content, "A ");

    frames.settle(&mut app, &id, 100);
    assert!(message(&app, &id).animation_complete);
}

#[test]
fn job_failure_without_content_shows_error_message() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    send(&mut app, turn, "job.failed", r#"{"error":{"message":"boom"}}"#);
    let m = message(&app, &id);
    assert_eq!(m.content, "boom");
    assert!(!m.is_streaming);
    assert!(m.has_error);

    Frames::new().settle(&mut app, &id, 10);
    assert!(message(&app, &id).animation_complete);
    assert_eq!(app.status, AppStatus::Error);
    assert_eq!(app.exit_error, Some(AppError::JobFailed));
    assert!(app.resumable.is_none());
}

#[test]
fn job_failure_keeps_partial_content() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    delta(&mut app, turn, "Half an ans");
    send(&mut app, turn, "job.failed", "{}");
    assert_eq!(message(&app, &id).content, "Half an ans");
    assert!(message(&app, &id).has_error);
}

#[test]
fn stream_end_without_terminal_event_finishes_cleanly() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    delta(&mut app, turn, "Short");
    handle_client_event(&mut app, ClientEvent::StreamEnded { turn, last_event_id: Some(3) });
    Frames::new().settle(&mut app, &id, 100);
    let m = message(&app, &id);
    assert_eq!(m.content, "Short");
    assert!(m.animation_complete);
    assert!(!m.has_error);
    assert_eq!(app.status, AppStatus::Ready);
}

#[test]
fn stream_failure_marks_error_and_keeps_turn_resumable() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    send_with_id(&mut app, turn, Some(1), "agent.delta", r#"{"text":"Par"}"#);
    send_with_id(&mut app, turn, Some(2), "agent.delta", r#"{"text":"tial"}"#);
    handle_client_event(&mut app, ClientEvent::StreamFailed {
        turn,
        last_event_id: Some(2),
        message: "stream read: connection reset".to_owned(),
    });
    Frames::new().settle(&mut app, &id, 100);

    let m = message(&app, &id);
    assert_eq!(m.content, "Partial");
    assert!(m.has_error);
    assert!(m.animation_complete);
    assert_eq!(app.status, AppStatus::Error);
    assert_eq!(app.exit_error, Some(AppError::StreamFailed));
    let resumable = app.resumable.as_ref().unwrap();
    assert_eq!(resumable.last_event_id, Some(2));
    assert_eq!(resumable.delivered, "Partial");
}

#[test]
fn pause_and_resume_only_touch_status() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    delta(&mut app, turn, "Thinking");
    send(&mut app, turn, "job.paused", "{}");
    assert_eq!(message(&app, &id).status.as_deref(), Some(DEFAULT_PAUSE_REASON));
    send(&mut app, turn, "job.paused", r#"{"reason":"Waiting for approval"}"#);
    assert_eq!(message(&app, &id).status.as_deref(), Some("Waiting for approval"));
    send(&mut app, turn, "job.resumed", "{}");
    assert_eq!(message(&app, &id).status, None);
    assert_eq!(app.reveal.target(), "Thinking");
}

#[test]
fn started_and_unknown_events_are_harmless() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hello");
    send(&mut app, turn, "job.started", "{}");
    send(&mut app, turn, "agent.thinking", r#"{"step":1}"#);
    delta(&mut app, turn, "ok");
    assert_eq!(app.reveal.target(), "ok");
    assert!(message(&app, &id).is_streaming);
}

#[test]
fn events_of_abandoned_turn_are_dropped() {
    let mut app = test_app();
    let (turn, _) = begin_turn(&mut app, "Hello");
    new_conversation(&mut app);
    assert!(app.messages.is_empty());

    let (current, id) = begin_turn(&mut app, "Again");
    delta(&mut app, turn, "stale");
    send(&mut app, turn, "job.completed", "{}");
    delta(&mut app, current, "fresh");
    assert_eq!(app.reveal.target(), "fresh");
    assert!(message(&app, &id).is_streaming);
}
