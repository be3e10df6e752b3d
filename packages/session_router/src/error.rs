use std::io;

use tokio_tungstenite::tungstenite;

/// Errors surfaced by the router to whoever drives it.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The frame was not valid JSON. Fails that frame only.
    #[error("failed to decode inbound frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// Handlers for one mode were requested on a router built for the other.
    #[error("cannot install {requested} handlers on a {mode} router")]
    ModeMismatch {
        mode: &'static str,
        requested: &'static str,
    },

    #[error("{0} handlers are already installed")]
    HandlersInstalled(&'static str),

    /// The connection's I/O task is gone; outbound commands have nowhere to go.
    #[error("connection is closed")]
    Disconnected,
}

/// Why the transport failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("server is unavailable")]
    Unavailable(#[source] tungstenite::Error),

    #[error(transparent)]
    Transport(tungstenite::Error),
}

impl ConnectionError {
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        let is_connect = match &err {
            tungstenite::Error::Io(io_err) => matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        };
        if is_connect {
            Self::Unavailable(err)
        } else {
            Self::Transport(err)
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
