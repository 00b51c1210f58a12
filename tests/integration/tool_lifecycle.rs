// Tool call lifecycle: requested -> completed, missed requests, status text
// and the pending/completed partition.

use chatbot_rust::app::{App, ToolCallInfo, ToolCallStatus};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeSet;

use crate::helpers::{Frames, begin_turn, message, send, test_app};

fn tools(calls: Option<&Vec<ToolCallInfo>>) -> Vec<&str> {
    calls.map(|c| c.iter().map(|t| t.tool.as_str()).collect()).unwrap_or_default()
}

#[test]
fn requested_then_completed_checklist() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Make a checklist");
    send(&mut app, turn, "tool.requested", r#"{"name":"generate_checklist","call_id":"c1"}"#);
    {
        let m = message(&app, &id);
        assert_eq!(m.status.as_deref(), Some("Using generate_checklist..."));
        assert_eq!(
            m.pending_tool_calls,
            Some(vec![ToolCallInfo {
                tool: "generate_checklist".to_owned(),
                status: ToolCallStatus::Executing,
                data: None,
            }])
        );
        assert_eq!(m.tool_calls, None);
    }

    send(&mut app, turn, "tool.completed", r#"{"call_id":"c1","result":{"items":[]}}"#);
    send(&mut app, turn, "job.completed", "{}");
    Frames::new().settle(&mut app, &id, 10);

    let m = message(&app, &id);
    assert_eq!(
        m.tool_calls,
        Some(vec![ToolCallInfo {
            tool: "generate_checklist".to_owned(),
            status: ToolCallStatus::Completed,
            data: Some(json!({"items": []})),
        }])
    );
    assert_eq!(m.pending_tool_calls, None);
    assert_eq!(m.status, None);
    assert!(m.animation_complete);
}

#[test]
fn completion_without_request_infers_translation() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Translate");
    send(&mut app, turn, "tool.completed", r#"{"call_id":"c9","result":{"translated_text":"hola"}}"#);
    let m = message(&app, &id);
    assert_eq!(tools(m.tool_calls.as_ref()), vec!["translate_text"]);
    assert_eq!(m.tool_calls.as_ref().map(|c| c[0].status), Some(ToolCallStatus::Completed));
    assert_eq!(m.pending_tool_calls, None);
}

#[test]
fn completion_tool_name_wins_over_inference() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hi");
    send(
        &mut app,
        turn,
        "tool.completed",
        r#"{"call_id":"c2","result":{"items":[1]},"tool_name":"custom_tool"}"#,
    );
    assert_eq!(tools(message(&app, &id).tool_calls.as_ref()), vec!["custom_tool"]);
}

#[test]
fn request_defaults_for_missing_fields() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hi");
    send(&mut app, turn, "tool.requested", "{}");
    send(&mut app, turn, "tool.requested", "{}");
    let m = message(&app, &id);
    // Each nameless request gets its own generated call id.
    assert_eq!(tools(m.pending_tool_calls.as_ref()), vec!["tool", "tool"]);
    assert_eq!(m.status.as_deref(), Some("Using tool..."));
}

#[test]
fn completion_without_call_id_is_ignored() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hi");
    send(&mut app, turn, "tool.completed", r#"{"result":{"items":[]}}"#);
    assert_eq!(message(&app, &id).tool_calls, None);
    assert_eq!(app.turn.as_ref().map(|t| t.tool_calls.is_empty()), Some(true));
}

#[test]
fn status_follows_first_remaining_pending_call() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hi");
    send(&mut app, turn, "tool.requested", r#"{"name":"generate_checklist","call_id":"a"}"#);
    send(&mut app, turn, "tool.requested", r#"{"name":"translate_text","call_id":"b"}"#);
    assert_eq!(message(&app, &id).status.as_deref(), Some("Using translate_text..."));

    send(&mut app, turn, "tool.completed", r#"{"call_id":"a","result":{"title":"List"}}"#);
    assert_eq!(message(&app, &id).status.as_deref(), Some("Using translate_text..."));
    send(&mut app, turn, "tool.completed", r#"{"call_id":"b","result":{"translated_text":"x"}}"#);
    assert_eq!(message(&app, &id).status, None);
    assert_eq!(
        tools(message(&app, &id).tool_calls.as_ref()),
        vec!["generate_checklist", "translate_text"]
    );
}

fn partition_ids(app: &App) -> (BTreeSet<String>, BTreeSet<String>) {
    let turn = app.turn.as_ref().unwrap();
    let pending = turn.tool_calls.pending_ids().into_iter().map(str::to_owned).collect();
    let completed = turn.tool_calls.completed_ids().into_iter().map(str::to_owned).collect();
    (pending, completed)
}

#[test]
fn call_ids_are_partitioned_at_every_step() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hi");
    let steps = [
        ("tool.requested", r#"{"name":"a","call_id":"1"}"#),
        ("tool.requested", r#"{"name":"b","call_id":"2"}"#),
        ("tool.completed", r#"{"call_id":"3","result":{}}"#),
        ("tool.completed", r#"{"call_id":"1","result":{"ok":true}}"#),
        ("tool.requested", r#"{"name":"a","call_id":"1"}"#),
        ("tool.completed", r#"{"call_id":"2","result":{}}"#),
    ];
    let mut seen = BTreeSet::new();
    for (name, data) in steps {
        send(&mut app, turn, name, data);
        let call_id = serde_json::from_str::<serde_json::Value>(data).unwrap()["call_id"]
            .as_str()
            .unwrap()
            .to_owned();
        seen.insert(call_id);

        let (pending, completed) = partition_ids(&app);
        assert!(pending.is_disjoint(&completed));
        assert_eq!(pending.union(&completed).cloned().collect::<BTreeSet<_>>(), seen);

        let m = message(&app, &id);
        assert!(m.pending_tool_calls.iter().flatten().all(|c| c.data.is_none()));
        assert!(m.tool_calls.iter().flatten().all(|c| c.data.is_some()));
    }
}

#[test]
fn unresolved_calls_stay_pending_after_completion() {
    let mut app = test_app();
    let (turn, id) = begin_turn(&mut app, "Hi");
    send(&mut app, turn, "tool.requested", r#"{"name":"generate_checklist","call_id":"c1"}"#);
    send(&mut app, turn, "tool.requested", r#"{"name":"translate_text","call_id":"c2"}"#);
    send(&mut app, turn, "tool.completed", r#"{"call_id":"c1","result":{"items":[]}}"#);
    send(&mut app, turn, "job.completed", "{}");
    Frames::new().settle(&mut app, &id, 10);

    let m = message(&app, &id);
    assert_eq!(tools(m.tool_calls.as_ref()), vec!["generate_checklist"]);
    assert_eq!(tools(m.pending_tool_calls.as_ref()), vec!["translate_text"]);
    assert_eq!(m.status, None);
}
