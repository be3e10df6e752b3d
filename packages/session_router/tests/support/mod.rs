//! Recording collaborators shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use serde_json::Value;
use session_router::{NoteEditor, Outbound, TerminalView};

/// Writer whose bytes stay readable after it has been moved into a router.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct TerminalLog {
    pub writes: Rc<RefCell<Vec<String>>>,
    pub loaded: Rc<RefCell<bool>>,
    pub other_calls: Rc<RefCell<usize>>,
}

pub struct RecordingTerminal {
    log: TerminalLog,
}

impl RecordingTerminal {
    pub fn new(log: &TerminalLog) -> Self {
        Self { log: log.clone() }
    }
}

impl TerminalView for RecordingTerminal {
    fn write_message(&mut self, text: &str) {
        self.log.writes.borrow_mut().push(text.to_string());
    }

    fn set_connection(&mut self, _outbound: Outbound) {
        *self.log.other_calls.borrow_mut() += 1;
    }

    fn perform_resize(&mut self) {
        *self.log.other_calls.borrow_mut() += 1;
    }

    fn content_loaded_from_db(&self) -> bool {
        *self.log.loaded.borrow()
    }

    fn set_content_loaded_from_db(&mut self, loaded: bool) {
        *self.log.loaded.borrow_mut() = loaded;
    }
}

#[derive(Clone, Default)]
pub struct EditorLog {
    pub calls: Rc<RefCell<Vec<String>>>,
    pub loads: Rc<RefCell<Vec<Value>>>,
}

pub struct RecordingEditor {
    log: EditorLog,
}

impl RecordingEditor {
    pub fn new(log: &EditorLog) -> Self {
        Self { log: log.clone() }
    }
}

impl NoteEditor for RecordingEditor {
    fn set_connection(&mut self, _outbound: Outbound) {
        self.log.calls.borrow_mut().push("set_connection".to_string());
    }

    fn insert_text(&mut self, text: &str, index: usize) {
        self.log
            .calls
            .borrow_mut()
            .push(format!("insert {} {}", text, index));
    }

    fn delete_text(&mut self, length: usize, index: usize) {
        self.log
            .calls
            .borrow_mut()
            .push(format!("delete {} {}", length, index));
    }

    fn apply_format_changes(&mut self, format_type: &str, _value: Value, index: usize, length: usize) {
        self.log
            .calls
            .borrow_mut()
            .push(format!("format {} {} {}", format_type, index, length));
    }

    fn load_delta(&mut self, delta: Value) {
        self.log.loads.borrow_mut().push(delta);
    }
}
