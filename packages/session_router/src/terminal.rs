//! Local terminal surface for the attach client.

use std::cell::Cell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::collaborators::{ReconnectPrompt, TerminalView};
use crate::connection::Outbound;
use crate::protocol::{ClientCommand, Credentials, ResizeKind, TerminalSize};
use tracing::warn;

/// Ctrl-]
pub const DETACH_BYTE: u8 = 0x1D;

/// Ctrl-R, only meaningful while a reconnect prompt is showing.
pub const RECONNECT_BYTE: u8 = 0x12;

const RECONNECT_BANNER: &str = "\r\n[session lost -- press Ctrl-R to reconnect, Ctrl-] to detach]\r\n";

/// Terminal view writing server output to a local stream.
pub struct LocalTerminal<W: Write> {
    out: W,
    outbound: Option<Outbound>,
    content_loaded_from_db: bool,
    fixed_size: Option<TerminalSize>,
}

pub type StdoutTerminal = LocalTerminal<io::Stdout>;

impl StdoutTerminal {
    pub fn stdout() -> Self {
        LocalTerminal::new(io::stdout())
    }
}

impl<W: Write> LocalTerminal<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            outbound: None,
            content_loaded_from_db: false,
            fixed_size: None,
        }
    }

    /// Report this size instead of querying the controlling terminal.
    pub fn with_size(mut self, size: TerminalSize) -> Self {
        self.fixed_size = Some(size);
        self
    }

    pub fn size(&self) -> TerminalSize {
        self.fixed_size.unwrap_or_else(terminal_size)
    }

    pub fn output(&self) -> &W {
        &self.out
    }
}

impl<W: Write> TerminalView for LocalTerminal<W> {
    fn write_message(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn set_connection(&mut self, outbound: Outbound) {
        self.outbound = Some(outbound);
    }

    fn perform_resize(&mut self) {
        let Some(outbound) = &self.outbound else {
            warn!("Resize requested before the connection was bound");
            return;
        };
        if let Err(e) = outbound.send(ClientCommand::resize(ResizeKind::New, self.size())) {
            warn!("Failed to send resize: {}", e);
        }
    }

    fn content_loaded_from_db(&self) -> bool {
        self.content_loaded_from_db
    }

    fn set_content_loaded_from_db(&mut self, loaded: bool) {
        self.content_loaded_from_db = loaded;
    }
}

/// Shared between the prompt (owned by the router) and the input loop.
/// Holds `Some(session_saved)` while a reconnect is being offered.
#[derive(Debug, Clone, Default)]
pub struct ReconnectState {
    pending: Rc<Cell<Option<bool>>>,
}

impl ReconnectState {
    pub fn is_armed(&self) -> bool {
        self.pending.get().is_some()
    }

    /// Disarm, returning whether the server kept the session's credentials.
    pub fn take(&self) -> Option<bool> {
        self.pending.take()
    }
}

/// Reconnect prompt drawn inline in the terminal.
pub struct InlineReconnectPrompt {
    state: ReconnectState,
}

impl InlineReconnectPrompt {
    pub fn new(state: ReconnectState) -> Self {
        Self { state }
    }
}

impl ReconnectPrompt for InlineReconnectPrompt {
    fn show(&mut self, session_saved: bool, terminal: &mut dyn TerminalView) {
        terminal.write_message(RECONNECT_BANNER);
        self.state.pending.set(Some(session_saved));
    }

    fn dismiss(&mut self) {
        self.state.pending.set(None);
    }
}

/// The reconnect request to send. A saved session reconnects as-is;
/// otherwise configured credentials are submitted as a form.
pub fn reconnect_command(session_saved: bool, credentials: Option<&Credentials>) -> ClientCommand {
    if session_saved {
        ClientCommand::reconnect(None)
    } else {
        ClientCommand::reconnect(credentials.cloned())
    }
}

/// What a chunk of local keyboard input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Send(String),
    Reconnect,
    Detach,
}

/// Split raw stdin bytes into keystrokes to forward and local commands.
/// Everything after a detach byte is discarded.
pub fn interpret_input(data: &[u8], reconnect_armed: bool) -> Vec<InputAction> {
    let mut actions = Vec::new();
    let mut start = 0;

    for (pos, &byte) in data.iter().enumerate() {
        let action = match byte {
            DETACH_BYTE => InputAction::Detach,
            RECONNECT_BYTE if reconnect_armed => InputAction::Reconnect,
            _ => continue,
        };
        if pos > start {
            actions.push(InputAction::Send(
                String::from_utf8_lossy(&data[start..pos]).into_owned(),
            ));
        }
        start = pos + 1;
        let detach = action == InputAction::Detach;
        actions.push(action);
        if detach {
            return actions;
        }
    }

    if start < data.len() {
        actions.push(InputAction::Send(
            String::from_utf8_lossy(&data[start..]).into_owned(),
        ));
    }
    actions
}

/// Stdin in raw mode for as long as this value lives; the previous line
/// discipline comes back when it drops.
#[cfg(unix)]
pub struct RawMode {
    saved: nix::sys::termios::Termios,
}

#[cfg(unix)]
impl RawMode {
    /// `None` when stdin is not a tty, or refuses raw mode.
    pub fn enable() -> Option<Self> {
        use nix::sys::termios::{self, SetArg};

        let saved = termios::tcgetattr(io::stdin()).ok()?;
        let mut raw = saved.clone();
        termios::cfmakeraw(&mut raw);
        if let Err(e) = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &raw) {
            warn!("Could not put stdin in raw mode: {}", e);
            return None;
        }
        Some(Self { saved })
    }
}

#[cfg(unix)]
impl Drop for RawMode {
    fn drop(&mut self) {
        use nix::sys::termios::{self, SetArg};

        // Let pending output drain before the attach client prints its
        // farewell line in cooked mode.
        if let Err(e) = termios::tcsetattr(io::stdin(), SetArg::TCSADRAIN, &self.saved) {
            warn!("Could not restore terminal settings: {}", e);
        }
    }
}

/// Size of the controlling terminal, or 80x24 when there is none.
#[cfg(unix)]
pub fn terminal_size() -> TerminalSize {
    use nix::libc;

    let mut ws = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let ret = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };
    if ret == -1 || ws.ws_col == 0 || ws.ws_row == 0 {
        return TerminalSize::default();
    }
    TerminalSize {
        cols: ws.ws_col,
        rows: ws.ws_row,
    }
}

#[cfg(not(unix))]
pub fn terminal_size() -> TerminalSize {
    TerminalSize::default()
}
