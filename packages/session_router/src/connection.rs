//! The single socket a router owns.
//!
//! [`Connection::open`] returns immediately and connects in a background task,
//! the way a browser socket does: success shows up as
//! [`ConnectionEvent::Opened`], failure as [`ConnectionEvent::Errored`].
//! Events are delivered in the order the transport produced them.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tracing::{debug, info, warn};

use crate::error::{ConnectionError, RouterError};
use crate::protocol::ClientCommand;

/// Something the connection observed.
#[derive(Debug)]
pub enum ConnectionEvent {
    Opened,
    Errored(ConnectionError),
    /// One inbound text frame, undecoded.
    Message(String),
    /// The socket is gone. Always the last event.
    Closed,
}

/// Sending half handed to the terminal or editor once the socket opens.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<ClientCommand>,
}

impl Outbound {
    pub fn send(&self, command: ClientCommand) -> Result<(), RouterError> {
        self.tx.send(command).map_err(|_| RouterError::Disconnected)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct Connection {
    outbound: Outbound,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    io_task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Start connecting to `url`. Must be called inside a tokio runtime.
    pub fn open(url: impl Into<String>) -> Self {
        let url = url.into();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let io_task = tokio::spawn(run_socket(url, out_rx, event_tx));

        Self {
            outbound: Outbound { tx: out_tx },
            events: event_rx,
            io_task: Some(io_task),
        }
    }

    /// An in-memory connection. The peer plays the server side: it pushes
    /// events in and reads the commands the client sent.
    pub fn pair() -> (Self, ConnectionPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let connection = Self {
            outbound: Outbound { tx: out_tx },
            events: event_rx,
            io_task: None,
        };
        let peer = ConnectionPeer {
            events: event_tx,
            commands: out_rx,
        };
        (connection, peer)
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Wait for the next event. `None` once the event source is gone.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
    }
}

/// Server side of [`Connection::pair`].
pub struct ConnectionPeer {
    events: mpsc::UnboundedSender<ConnectionEvent>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
}

impl ConnectionPeer {
    pub fn push(&self, event: ConnectionEvent) -> Result<(), RouterError> {
        self.events.send(event).map_err(|_| RouterError::Disconnected)
    }

    /// Push one inbound text frame.
    pub fn deliver(&self, text: impl Into<String>) -> Result<(), RouterError> {
        self.push(ConnectionEvent::Message(text.into()))
    }

    pub fn try_recv_command(&mut self) -> Option<ClientCommand> {
        self.commands.try_recv().ok()
    }

    pub async fn recv_command(&mut self) -> Option<ClientCommand> {
        self.commands.recv().await
    }
}

async fn run_socket(
    url: String,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            let err = ConnectionError::from_tungstenite(e);
            warn!("Failed to connect to {}: {}", url, err);
            let _ = events.send(ConnectionEvent::Errored(err));
            let _ = events.send(ConnectionEvent::Closed);
            return;
        }
    };

    info!("Connected to {}", url);
    if events.send(ConnectionEvent::Opened).is_err() {
        return;
    }

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    let _ = ws_write.send(tungstenite::Message::Close(None)).await;
                    break;
                };
                let json = match serde_json::to_string(&command) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode outbound command: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_write.send(tungstenite::Message::Text(json.into())).await {
                    let _ = events.send(ConnectionEvent::Errored(ConnectionError::from_tungstenite(e)));
                    break;
                }
            }

            frame = ws_read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if events.send(ConnectionEvent::Message(text.as_str().to_owned())).is_err() {
                            break;
                        }
                    }
                    Some(Ok(tungstenite::Message::Binary(_))) => {
                        debug!("Binary frames not supported, dropping");
                    }
                    Some(Ok(tungstenite::Message::Close(_))) | None => {
                        info!("Connection to {} closed", url);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = events.send(ConnectionEvent::Errored(ConnectionError::from_tungstenite(e)));
                        break;
                    }
                }
            }
        }
    }

    let _ = events.send(ConnectionEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ResizeKind, TerminalSize};

    #[tokio::test]
    async fn test_pair_delivers_events_in_order() {
        let (mut conn, peer) = Connection::pair();
        peer.push(ConnectionEvent::Opened).unwrap();
        peer.deliver("first").unwrap();
        peer.deliver("second").unwrap();

        assert!(matches!(conn.next_event().await, Some(ConnectionEvent::Opened)));
        match conn.next_event().await {
            Some(ConnectionEvent::Message(text)) => assert_eq!(text, "first"),
            other => panic!("Expected first message, got {:?}", other),
        }
        match conn.next_event().await {
            Some(ConnectionEvent::Message(text)) => assert_eq!(text, "second"),
            other => panic!("Expected second message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pair_outbound_reaches_peer() {
        let (conn, mut peer) = Connection::pair();
        let cmd = ClientCommand::resize(ResizeKind::Del, TerminalSize::default());
        tokio_test::assert_ok!(conn.outbound().send(cmd.clone()));
        assert_eq!(peer.recv_command().await, Some(cmd));
    }

    #[tokio::test]
    async fn test_outbound_fails_after_peer_dropped() {
        let (conn, peer) = Connection::pair();
        drop(peer);
        let err = tokio_test::assert_err!(conn.outbound().send(ClientCommand::Execute {
            data: "x".to_string(),
        }));
        assert!(matches!(err, RouterError::Disconnected));
        assert!(conn.outbound().is_closed());
    }

    #[tokio::test]
    async fn test_open_unreachable_reports_error_then_closed() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut conn = Connection::open(format!("ws://{}/ws", addr));
        assert!(matches!(
            conn.next_event().await,
            Some(ConnectionEvent::Errored(_))
        ));
        assert!(matches!(conn.next_event().await, Some(ConnectionEvent::Closed)));
    }
}
