use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;

use session_router::config::{self, FileConfig};
use session_router::protocol::ResizeKind;
use session_router::terminal::{self, InputAction, RawMode};
use session_router::{
    ClientCommand, ConnectionEvent, InlineReconnectPrompt, Mode, NoteBuffer, ReconnectState,
    Router, StdoutTerminal,
};

#[derive(Parser)]
#[command(name = "session-attach")]
#[command(about = "Attach to a remote terminal or shared note session")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Directory holding config.toml (default: ~/.session-router)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Attach this terminal to a remote shell session
    Terminal {
        /// Session id, or a full ws:// / wss:// URL
        target: String,
    },
    /// Follow a shared note, mirroring its text to a file
    Note {
        /// Session id, or a full ws:// / wss:// URL
        target: String,

        /// File rewritten with the note's text after every change
        #[arg(short, long, default_value = "note.txt")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout belongs to the remote terminal.
    let default_directive = if args.debug {
        "session_router=debug,session_attach=debug"
    } else {
        "session_router=warn,session_attach=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let config_dir = config::config_dir(args.config_dir)?;
    let file_config: FileConfig = config::load_config(&config_dir)
        .extract()
        .context("Failed to load configuration")?;

    match args.command {
        Command::Terminal { target } => attach_terminal(&file_config, &target).await,
        Command::Note { target, output } => follow_note(&file_config, &target, output).await,
    }
}

/// Teardown hook for a single attached session: any `del_tab` on this socket
/// means our session is gone.
fn session_deleted(flag: Rc<Cell<bool>>) -> impl FnMut(&str) + 'static {
    move |session_id: &str| {
        eprintln!("\r\n[session {} was deleted]\r", session_id);
        flag.set(true);
    }
}

async fn attach_terminal(file_config: &FileConfig, target: &str) -> Result<()> {
    let url = file_config.server.session_url(target);
    let credentials = file_config.reconnect.credentials();
    info!("Attaching terminal to {}", url);

    let reconnect = ReconnectState::default();
    let deleted = Rc::new(Cell::new(false));
    let mut router = Router::open(url, Mode::terminal(StdoutTerminal::stdout()))
        .with_reconnect_prompt(InlineReconnectPrompt::new(reconnect.clone()))
        .with_session_teardown(session_deleted(deleted.clone()));
    router.setup_terminal_logic()?;
    let outbound = router.outbound().clone();

    let raw_mode = RawMode::enable();

    let mut sigwinch =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::window_change())?;

    let (keys_tx, mut keys_rx) = mpsc::channel::<Vec<u8>>(64);
    let stop_keys = Arc::new(AtomicBool::new(false));
    forward_stdin(keys_tx, stop_keys.clone());

    let mut detached = false;
    loop {
        tokio::select! {
            event = router.next_event() => {
                let Some(event) = event else {
                    break;
                };
                let closed = matches!(event, ConnectionEvent::Closed);
                if let Err(e) = router.handle_event(event) {
                    warn!("Dropping inbound frame: {}", e);
                }
                if closed || deleted.get() {
                    break;
                }
            }

            Some(data) = keys_rx.recv() => {
                let mut send_failed = false;
                for action in terminal::interpret_input(&data, reconnect.is_armed()) {
                    let command = match action {
                        InputAction::Send(data) => ClientCommand::Execute { data },
                        InputAction::Reconnect => match reconnect.take() {
                            Some(session_saved) => {
                                terminal::reconnect_command(session_saved, credentials.as_ref())
                            }
                            None => continue,
                        },
                        InputAction::Detach => {
                            detached = true;
                            break;
                        }
                    };
                    if outbound.send(command).is_err() {
                        send_failed = true;
                        break;
                    }
                }
                if detached || send_failed {
                    break;
                }
            }

            _ = sigwinch.recv() => {
                let size = terminal::terminal_size();
                debug!("Window resized to {}x{}", size.cols, size.rows);
                let _ = outbound.send(ClientCommand::resize(ResizeKind::New, size));
            }
        }
    }

    // Withdraw this client's size so the remote pty follows the others.
    let _ = outbound.send(ClientCommand::resize(
        ResizeKind::Del,
        terminal::terminal_size(),
    ));

    stop_keys.store(true, Ordering::Relaxed);
    drop(raw_mode);
    if detached {
        eprintln!("\r\n[session-attach: detached]");
    } else {
        eprintln!("\r\n[session-attach: disconnected]");
    }
    Ok(())
}

async fn follow_note(file_config: &FileConfig, target: &str, output: PathBuf) -> Result<()> {
    let url = file_config.server.session_url(target);
    info!("Following note {} into {}", url, output.display());

    let deleted = Rc::new(Cell::new(false));
    let mut router = Router::open(url, Mode::note(NoteBuffer::new().with_mirror(output)))
        .with_session_teardown(session_deleted(deleted.clone()));
    router.setup_note_logic()?;

    loop {
        tokio::select! {
            event = router.next_event() => {
                let Some(event) = event else {
                    break;
                };
                let closed = matches!(event, ConnectionEvent::Closed);
                if let Err(e) = router.handle_event(event) {
                    warn!("Dropping inbound frame: {}", e);
                }
                if closed || deleted.get() {
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}

/// Forward raw keystrokes to `keys` from a dedicated thread. The thread
/// polls so it can notice `stop` once the session is over.
fn forward_stdin(keys: mpsc::Sender<Vec<u8>>, stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        use nix::errno::Errno;
        use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
        use std::io::Read;
        use std::os::fd::AsFd;

        let stdin = std::io::stdin();
        // At least the capacity of stdin's own buffer, so reads bypass it and
        // poll() never misses bytes parked there.
        let mut chunk = vec![0u8; 8 * 1024];
        while !stop.load(Ordering::Relaxed) {
            let mut fds = [PollFd::new(stdin.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(100u16)) {
                Ok(0) | Err(Errno::EINTR) => continue,
                Ok(_) => {}
                Err(e) => {
                    debug!("stdin poll failed: {}", e);
                    break;
                }
            }
            let n = match stdin.lock().read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            if keys.blocking_send(chunk[..n].to_vec()).is_err() {
                break;
            }
        }
    });
}
