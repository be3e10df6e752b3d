//! Session Protocol Types
//!
//! Inbound envelopes pushed by the session server and the outbound commands a
//! bound terminal sends back over the same socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level unit received per inbound frame.
///
/// `message` is kept raw: only an object with a string `type` is routable,
/// anything else carries nothing to route.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub message: Option<Value>,
}

impl Envelope {
    /// Decode a text frame. Only malformed JSON is an error; a frame that is
    /// not an object has no `message`.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let message = match serde_json::from_str::<Value>(text)? {
            Value::Object(mut frame) => frame.remove("message"),
            _ => None,
        };
        Ok(Self { message })
    }

    pub fn into_message(self) -> Option<Message> {
        let Value::Object(mut message) = self.message? else {
            return None;
        };
        let Some(Value::String(kind)) = message.remove("type") else {
            return None;
        };
        let content = message.remove("content").unwrap_or_default();
        Some(Message { kind, content })
    }
}

/// A classified message: `type` selects the content shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: String,
    pub content: Value,
}

impl Message {
    pub const ERROR: &'static str = "error";
    pub const INFO: &'static str = "info";
    pub const ACTION: &'static str = "action";

    /// Sub-type of an `action` message, if the content carries one.
    ///
    /// Content that is not an object, or has no string `type`, yields `None`
    /// and is dropped by the router like any other unknown action.
    pub fn action_type(&self) -> Option<&str> {
        self.content.get("type").and_then(Value::as_str)
    }
}

/// Action sub-events understood in terminal mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalAction {
    /// The SSH session dropped; the user has to reconnect.
    RequireReconnect { session_saved: bool },
    ReconnectSuccessful,
    /// The session was deleted elsewhere; its tab should go away.
    DelTab { session_id: String },
    /// Scrollback replayed from the server's store.
    LoadContent { data: String },
    #[serde(other)]
    Unknown,
}

/// Action sub-events understood in note mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum NoteAction {
    #[serde(rename = "del_tab")]
    DelTab { session_id: String },
    #[serde(rename = "insert")]
    Insert { text: String, index: usize },
    #[serde(rename = "delete")]
    Delete { length: usize, index: usize },
    #[serde(rename = "format-change")]
    FormatChange {
        format_type: String,
        value: Value,
        index: usize,
        length: usize,
    },
    /// Full document as an opaque editor delta.
    #[serde(rename = "load_content")]
    LoadContent { delta: Value },
    #[serde(other)]
    Unknown,
}

/// Commands sent FROM the client TO the session server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientCommand {
    /// Keystrokes for the remote shell.
    #[serde(rename = "execute")]
    Execute { data: String },

    /// Ask the server to re-open the SSH session. `Form` carries fresh
    /// credentials when the server did not keep the old ones.
    #[serde(rename = "reconnect")]
    Reconnect {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<ReconnectKind>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Credentials>,
    },

    #[serde(rename = "resize")]
    Resize {
        #[serde(rename = "type")]
        kind: ResizeKind,
        data: TerminalSize,
    },
}

impl ClientCommand {
    pub fn resize(kind: ResizeKind, size: TerminalSize) -> Self {
        ClientCommand::Resize { kind, data: size }
    }

    pub fn reconnect(credentials: Option<Credentials>) -> Self {
        match credentials {
            Some(creds) => ClientCommand::Reconnect {
                kind: Some(ReconnectKind::Form),
                data: Some(creds),
            },
            None => ClientCommand::Reconnect {
                kind: None,
                data: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectKind {
    Form,
}

/// `new` registers this client's size, `del` withdraws it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeKind {
    New,
    Del,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub passphrase: Option<String>,
}
