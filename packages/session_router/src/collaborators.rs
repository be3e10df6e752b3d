//! Interfaces the router forwards classified events to.
//!
//! None of these are implemented by the router itself. The attach client
//! provides terminal-side implementations in [`crate::terminal`] and
//! [`crate::note`]; an embedding UI provides its own.

use serde_json::Value;

use crate::connection::Outbound;

/// A terminal display bound to one remote shell session.
pub trait TerminalView {
    /// Write raw output. Line breaks are the caller's business.
    fn write_message(&mut self, text: &str);

    /// Called once the socket opens; outbound keystrokes go through `outbound`.
    fn set_connection(&mut self, outbound: Outbound);

    /// Report the current size to the server. Runs right after
    /// [`set_connection`](Self::set_connection), so the outbound side is live.
    fn perform_resize(&mut self);

    /// Whether stored scrollback was already written to this terminal.
    fn content_loaded_from_db(&self) -> bool;

    fn set_content_loaded_from_db(&mut self, loaded: bool);
}

/// A collaborative text editor bound to one shared note.
pub trait NoteEditor {
    fn set_connection(&mut self, outbound: Outbound);

    /// Apply a remote insertion at a character index.
    fn insert_text(&mut self, text: &str, index: usize);

    /// Apply a remote deletion of `length` characters starting at `index`.
    fn delete_text(&mut self, length: usize, index: usize);

    fn apply_format_changes(&mut self, format_type: &str, value: Value, index: usize, length: usize);

    /// Replace the whole document with an editor delta.
    fn load_delta(&mut self, delta: Value);
}

/// The UI offering the user a way to re-open a dropped session.
pub trait ReconnectPrompt {
    /// `session_saved` tells whether the server still holds credentials;
    /// when it does not, the prompt has to collect them.
    fn show(&mut self, session_saved: bool, terminal: &mut dyn TerminalView);

    fn dismiss(&mut self);
}

/// Capability of the embedding context to drop UI for a deleted session.
pub trait SessionTeardown {
    fn remove_elements_for_session(&mut self, session_id: &str);
}

impl<F> SessionTeardown for F
where
    F: FnMut(&str),
{
    fn remove_elements_for_session(&mut self, session_id: &str) {
        self(session_id)
    }
}
