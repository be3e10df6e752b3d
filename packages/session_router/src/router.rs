//! Connection router.
//!
//! A [`Router`] owns one [`Connection`] and one surface, either a terminal or
//! a note editor, picked by [`Mode`] when it is built. Handlers are installed
//! as a separate step ([`Router::activate`] or the per-mode setup calls);
//! until then events are dropped. Once installed, every event is handled to
//! completion before the next one is looked at.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collaborators::{NoteEditor, ReconnectPrompt, SessionTeardown, TerminalView};
use crate::connection::{Connection, ConnectionEvent, Outbound};
use crate::error::RouterError;
use crate::protocol::{Envelope, Message, NoteAction, TerminalAction};

/// Written to the terminal when the socket reports an error.
pub const CONNECTION_ERROR_LINE: &str = "WebSocket connection error\n\r";

/// Terminal line ending appended to server `error` lines.
pub const LINE_BREAK: &str = "\n\r";

const LOAD_CONTENT: &str = "load_content";

/// Which surface a router drives. Fixed for the router's lifetime.
pub enum Mode {
    Terminal(Box<dyn TerminalView>),
    Note(Box<dyn NoteEditor>),
}

impl Mode {
    pub fn terminal(view: impl TerminalView + 'static) -> Self {
        Mode::Terminal(Box::new(view))
    }

    pub fn note(editor: impl NoteEditor + 'static) -> Self {
        Mode::Note(Box::new(editor))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Terminal(_) => HandlerSet::Terminal.name(),
            Mode::Note(_) => HandlerSet::Note.name(),
        }
    }
}

/// The handler set currently installed on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerSet {
    Terminal,
    Note,
}

impl HandlerSet {
    pub fn name(self) -> &'static str {
        match self {
            HandlerSet::Terminal => "terminal",
            HandlerSet::Note => "note",
        }
    }
}

pub struct Router {
    connection: Connection,
    mode: Mode,
    reconnect_prompt: Option<Box<dyn ReconnectPrompt>>,
    session_teardown: Option<Box<dyn SessionTeardown>>,
    handlers: Option<HandlerSet>,
}

impl Router {
    pub fn new(connection: Connection, mode: Mode) -> Self {
        Self {
            connection,
            mode,
            reconnect_prompt: None,
            session_teardown: None,
            handlers: None,
        }
    }

    /// Open a socket to `url` and build a router on it. Connecting happens in
    /// the background; the outcome arrives as the first event.
    pub fn open(url: impl Into<String>, mode: Mode) -> Self {
        Self::new(Connection::open(url), mode)
    }

    pub fn with_reconnect_prompt(mut self, prompt: impl ReconnectPrompt + 'static) -> Self {
        self.reconnect_prompt = Some(Box::new(prompt));
        self
    }

    /// Without a teardown capability, `del_tab` is a no-op.
    pub fn with_session_teardown(mut self, teardown: impl SessionTeardown + 'static) -> Self {
        self.session_teardown = Some(Box::new(teardown));
        self
    }

    /// Install whichever handler set matches the mode.
    pub fn activate(&mut self) -> Result<(), RouterError> {
        match self.mode {
            Mode::Terminal(_) => self.setup_terminal_logic(),
            Mode::Note(_) => self.setup_note_logic(),
        }
    }

    /// Install the error, open and message handlers for a terminal.
    pub fn setup_terminal_logic(&mut self) -> Result<(), RouterError> {
        self.install(HandlerSet::Terminal)
    }

    /// Install the open and message handlers for a note editor.
    pub fn setup_note_logic(&mut self) -> Result<(), RouterError> {
        self.install(HandlerSet::Note)
    }

    fn install(&mut self, requested: HandlerSet) -> Result<(), RouterError> {
        let matches = matches!(
            (&self.mode, requested),
            (Mode::Terminal(_), HandlerSet::Terminal) | (Mode::Note(_), HandlerSet::Note)
        );
        if !matches {
            return Err(RouterError::ModeMismatch {
                mode: self.mode.name(),
                requested: requested.name(),
            });
        }
        if let Some(installed) = self.handlers {
            return Err(RouterError::HandlersInstalled(installed.name()));
        }

        info!("Installed {} handlers", requested.name());
        self.handlers = Some(requested);
        Ok(())
    }

    pub fn installed_handlers(&self) -> Option<HandlerSet> {
        self.handlers
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn terminal(&self) -> Option<&dyn TerminalView> {
        match &self.mode {
            Mode::Terminal(view) => Some(&**view),
            Mode::Note(_) => None,
        }
    }

    pub fn editor(&self) -> Option<&dyn NoteEditor> {
        match &self.mode {
            Mode::Note(editor) => Some(&**editor),
            Mode::Terminal(_) => None,
        }
    }

    pub fn outbound(&self) -> &Outbound {
        self.connection.outbound()
    }

    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.connection.next_event().await
    }

    /// Handle events until the connection closes. A frame that fails to
    /// decode is logged and skipped.
    pub async fn run(&mut self) {
        self.run_with(|err| warn!("Dropping inbound frame: {}", err))
            .await
    }

    /// Like [`Router::run`], handing each per-frame failure to `on_error`
    /// instead of logging it. The session carries on either way.
    pub async fn run_with(&mut self, mut on_error: impl FnMut(RouterError)) {
        while let Some(event) = self.next_event().await {
            let closed = matches!(event, ConnectionEvent::Closed);
            if let Err(err) = self.handle_event(event) {
                on_error(err);
            }
            if closed {
                break;
            }
        }
    }

    /// Route one connection event through the installed handler set.
    ///
    /// Only a frame that is not JSON at all fails; shapes the router does not
    /// recognize are dropped.
    pub fn handle_event(&mut self, event: ConnectionEvent) -> Result<(), RouterError> {
        let Some(handlers) = self.handlers else {
            debug!("No handlers installed, dropping {:?}", event);
            return Ok(());
        };

        match (&mut self.mode, handlers) {
            (Mode::Terminal(terminal), HandlerSet::Terminal) => match event {
                ConnectionEvent::Errored(err) => {
                    warn!("Connection error: {}", err);
                    terminal.write_message(CONNECTION_ERROR_LINE);
                    Ok(())
                }
                ConnectionEvent::Opened => {
                    terminal.set_connection(self.connection.outbound().clone());
                    terminal.perform_resize();
                    Ok(())
                }
                ConnectionEvent::Message(text) => route_terminal_message(
                    &mut **terminal,
                    &mut self.reconnect_prompt,
                    &mut self.session_teardown,
                    &text,
                ),
                ConnectionEvent::Closed => {
                    debug!("Connection closed");
                    Ok(())
                }
            },
            (Mode::Note(editor), HandlerSet::Note) => match event {
                ConnectionEvent::Opened => {
                    editor.set_connection(self.connection.outbound().clone());
                    Ok(())
                }
                ConnectionEvent::Message(text) => {
                    route_note_message(&mut **editor, &mut self.session_teardown, &text)
                }
                ConnectionEvent::Errored(err) => {
                    debug!("Connection error with no note handler: {}", err);
                    Ok(())
                }
                ConnectionEvent::Closed => {
                    debug!("Connection closed");
                    Ok(())
                }
            },
            // install() only accepts the set matching the mode
            _ => Ok(()),
        }
    }
}

fn route_terminal_message(
    terminal: &mut dyn TerminalView,
    reconnect_prompt: &mut Option<Box<dyn ReconnectPrompt>>,
    session_teardown: &mut Option<Box<dyn SessionTeardown>>,
    text: &str,
) -> Result<(), RouterError> {
    let Some(message) = Envelope::decode(text)?.into_message() else {
        debug!("Envelope without a routable message, ignoring");
        return Ok(());
    };

    match message.kind.as_str() {
        Message::ERROR => match message.content.as_str() {
            Some(line) => terminal.write_message(&format!("{}{}", line, LINE_BREAK)),
            None => debug!("Non-text error content, dropping"),
        },
        Message::INFO => match message.content.as_str() {
            Some(chunk) => terminal.write_message(chunk),
            None => debug!("Non-text info content, dropping"),
        },
        Message::ACTION => {
            let Some(action_type) = message.action_type().map(str::to_owned) else {
                debug!("Action without a type, ignoring");
                return Ok(());
            };
            // One-shot: the server replays stored scrollback on every join,
            // but this terminal only takes it once. Repeats are not decoded.
            if action_type == LOAD_CONTENT && terminal.content_loaded_from_db() {
                debug!("Stored content already loaded, skipping replay");
                return Ok(());
            }
            let Some(action) = payload::<TerminalAction>(&action_type, message.content) else {
                return Ok(());
            };
            match action {
                TerminalAction::RequireReconnect { session_saved } => match reconnect_prompt {
                    Some(prompt) => prompt.show(session_saved, terminal),
                    None => warn!("Reconnect required but no reconnect prompt is attached"),
                },
                TerminalAction::ReconnectSuccessful => {
                    if let Some(prompt) = reconnect_prompt {
                        prompt.dismiss();
                    }
                }
                TerminalAction::DelTab { session_id } => {
                    remove_session(session_teardown, &session_id);
                }
                TerminalAction::LoadContent { data } => {
                    terminal.write_message(&data);
                    terminal.set_content_loaded_from_db(true);
                }
                TerminalAction::Unknown => {
                    debug!("Ignoring unknown terminal action {:?}", action_type);
                }
            }
        }
        other => debug!("Ignoring message type {:?}", other),
    }
    Ok(())
}

fn route_note_message(
    editor: &mut dyn NoteEditor,
    session_teardown: &mut Option<Box<dyn SessionTeardown>>,
    text: &str,
) -> Result<(), RouterError> {
    let Some(message) = Envelope::decode(text)?.into_message() else {
        debug!("Envelope without a routable message, ignoring");
        return Ok(());
    };

    if message.kind != Message::ACTION {
        debug!("Ignoring message type {:?} in note mode", message.kind);
        return Ok(());
    }
    let Some(action_type) = message.action_type().map(str::to_owned) else {
        debug!("Action without a type, ignoring");
        return Ok(());
    };

    let Some(action) = payload::<NoteAction>(&action_type, message.content) else {
        return Ok(());
    };
    match action {
        NoteAction::DelTab { session_id } => remove_session(session_teardown, &session_id),
        NoteAction::Insert { text, index } => editor.insert_text(&text, index),
        NoteAction::Delete { length, index } => editor.delete_text(length, index),
        NoteAction::FormatChange {
            format_type,
            value,
            index,
            length,
        } => editor.apply_format_changes(&format_type, value, index, length),
        // Unlike the terminal replay there is no one-shot guard here: every
        // load replaces the document. Kept as observed; not confirmed intent.
        NoteAction::LoadContent { delta } => editor.load_delta(delta),
        NoteAction::Unknown => debug!("Ignoring unknown note action {:?}", action_type),
    }
    Ok(())
}

fn remove_session(session_teardown: &mut Option<Box<dyn SessionTeardown>>, session_id: &str) {
    match session_teardown {
        Some(teardown) => {
            info!("Session {} deleted, tearing down its UI", session_id);
            teardown.remove_elements_for_session(session_id);
        }
        None => debug!("No session teardown available for {}", session_id),
    }
}

/// Decode an action's content. Missing or mistyped fields drop the action.
fn payload<T: DeserializeOwned>(kind: &str, content: Value) -> Option<T> {
    match serde_json::from_value(content) {
        Ok(action) => Some(action),
        Err(e) => {
            debug!("Dropping malformed `{}` action: {}", kind, e);
            None
        }
    }
}
