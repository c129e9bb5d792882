use std::time::Duration;

use thiserror::Error;

use crate::flags::CommandFlags;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the routing proxy and by the bundled client.
#[derive(Error, Debug)]
pub enum Error {
    /// A routing policy returned a replacement directive carrying non-routing flags.
    #[error(
        "invalid routing directive {directive}: replacement flags must not contain non-routing flags ({offending})"
    )]
    InvalidRoutingDirective {
        directive: CommandFlags,
        offending: CommandFlags,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with an error reply.
    #[error("server error: {0}")]
    Server(String),

    #[error("timed out after {after:?} waiting for {endpoint}")]
    Timeout { endpoint: String, after: Duration },

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("no connection available to serve {0}")]
    NoConnectionAvailable(String),

    #[error("command {0} cannot be issued to a replica")]
    ReplicaWriteRejected(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Failures of the connection itself, as opposed to errors the server reported.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Timeout { .. } | Error::ConnectionClosed(_)
        )
    }
}
