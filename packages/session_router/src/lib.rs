//! Session Router - client side of a terminal / shared-note session socket
//!
//! A [`Router`] owns one WebSocket and forwards what the server pushes to a
//! single surface: a [`TerminalView`] or a [`NoteEditor`]. The surface is
//! chosen when the router is built and never changes.
//!
//! # Example
//!
//! ```no_run
//! use session_router::{Mode, Router, StdoutTerminal};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), session_router::RouterError> {
//!     let mut router = Router::open(
//!         "ws://127.0.0.1:8000/ws/session/42/",
//!         Mode::terminal(StdoutTerminal::stdout()),
//!     )
//!     .with_session_teardown(|session_id: &str| eprintln!("session {} deleted", session_id));
//!
//!     router.setup_terminal_logic()?;
//!     router.run().await;
//!     Ok(())
//! }
//! ```

pub mod collaborators;
pub mod config;
pub mod connection;
pub mod error;
pub mod note;
pub mod protocol;
pub mod router;
pub mod terminal;

pub use collaborators::{NoteEditor, ReconnectPrompt, SessionTeardown, TerminalView};
pub use connection::{Connection, ConnectionEvent, ConnectionPeer, Outbound};
pub use error::{ConnectionError, RouterError};
pub use note::NoteBuffer;
pub use protocol::{ClientCommand, Envelope};
pub use router::{HandlerSet, Mode, Router};
pub use terminal::{InlineReconnectPrompt, LocalTerminal, ReconnectState, StdoutTerminal};
