mod support;

use proptest::prelude::*;
use serde_json::{Value, json};

use session_router::{Connection, ConnectionEvent, Mode, Router};
use support::{EditorLog, RecordingEditor, RecordingTerminal, TerminalLog};

const TERMINAL_ACTIONS: &[&str] = &[
    "require_reconnect",
    "reconnect_successful",
    "del_tab",
    "load_content",
];
const NOTE_ACTIONS: &[&str] = &["del_tab", "insert", "delete", "format-change", "load_content"];

fn terminal_router(log: &TerminalLog) -> Router {
    let (conn, _peer) = Connection::pair();
    let mut router = Router::new(conn, Mode::terminal(RecordingTerminal::new(log)));
    router.activate().unwrap();
    router
}

fn note_router(log: &EditorLog) -> Router {
    let (conn, _peer) = Connection::pair();
    let mut router = Router::new(conn, Mode::note(RecordingEditor::new(log)));
    router.activate().unwrap();
    router
}

fn deliver(router: &mut Router, value: &Value) {
    router
        .handle_event(ConnectionEvent::Message(value.to_string()))
        .unwrap();
}

fn action(content: Value) -> Value {
    json!({"message": {"type": "action", "content": content}})
}

fn arb_unknown_action() -> impl Strategy<Value = String> {
    "[a-z_-]{1,16}".prop_filter("must not be a known action", |s| {
        !TERMINAL_ACTIONS.contains(&s.as_str()) && !NOTE_ACTIONS.contains(&s.as_str())
    })
}

// --- One-shot replay guard ---

proptest! {
    #[test]
    fn terminal_load_content_written_at_most_once(
        payloads in prop::collection::vec(".{0,32}", 1..8)
    ) {
        let log = TerminalLog::default();
        let mut router = terminal_router(&log);
        for data in &payloads {
            deliver(&mut router, &action(json!({"type": "load_content", "data": data})));
        }

        prop_assert_eq!(log.writes.borrow().clone(), vec![payloads[0].clone()]);
        prop_assert!(*log.loaded.borrow());
    }

    #[test]
    fn note_load_content_applied_per_message(
        texts in prop::collection::vec("[a-z ]{0,16}", 1..8)
    ) {
        let log = EditorLog::default();
        let mut router = note_router(&log);
        for text in &texts {
            deliver(&mut router, &action(json!({"type": "load_content", "delta": {"ops": [{"insert": text}]}})));
        }

        let loads = log.loads.borrow();
        prop_assert_eq!(loads.len(), texts.len());
        for (delta, text) in loads.iter().zip(&texts) {
            prop_assert_eq!(&delta["ops"][0]["insert"], &json!(text));
        }
    }
}

// --- Ignored input ---

proptest! {
    #[test]
    fn envelope_without_message_touches_nothing(
        key in "[a-z]{1,10}".prop_filter("not message", |k| k != "message"),
        text in ".{0,16}",
    ) {
        let envelope = json!({ key: {"type": "info", "content": text} });

        let tlog = TerminalLog::default();
        let mut router = terminal_router(&tlog);
        deliver(&mut router, &envelope);
        prop_assert!(tlog.writes.borrow().is_empty());

        let elog = EditorLog::default();
        let mut router = note_router(&elog);
        deliver(&mut router, &envelope);
        prop_assert!(elog.calls.borrow().is_empty());
        prop_assert!(elog.loads.borrow().is_empty());
    }

    #[test]
    fn unknown_action_touches_nothing(kind in arb_unknown_action()) {
        let content = json!({"type": kind, "session_id": "s1", "text": "x", "index": 0, "data": "x"});

        let tlog = TerminalLog::default();
        let mut router = terminal_router(&tlog);
        deliver(&mut router, &action(content.clone()));
        prop_assert!(tlog.writes.borrow().is_empty());
        prop_assert_eq!(*tlog.other_calls.borrow(), 0);

        let elog = EditorLog::default();
        let mut router = note_router(&elog);
        deliver(&mut router, &action(content));
        prop_assert!(elog.calls.borrow().is_empty());
        prop_assert!(elog.loads.borrow().is_empty());
    }

    #[test]
    fn note_only_actions_ignored_by_terminal(
        text in "[a-z]{0,8}",
        index in 0usize..64,
        length in 0usize..64,
    ) {
        let tlog = TerminalLog::default();
        let mut router = terminal_router(&tlog);
        deliver(&mut router, &action(json!({"type": "insert", "text": text, "index": index})));
        deliver(&mut router, &action(json!({"type": "delete", "length": length, "index": index})));
        deliver(&mut router, &action(json!({
            "type": "format-change", "format_type": "bold", "value": true, "index": index, "length": length
        })));

        prop_assert!(tlog.writes.borrow().is_empty());
        prop_assert_eq!(*tlog.other_calls.borrow(), 0);
    }
}
