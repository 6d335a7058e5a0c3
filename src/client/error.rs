//! Client error types.

use std::io;
use thiserror::Error;

use crate::broker::BrokerError;
use crate::codec::CodecError;

/// Errors surfaced by client operations and the session engine.
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O failure on connect, read or write; fatal to the session.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A socket operation exceeded socket_timeout.
    #[error("timed out after {seconds:.2}s during {operation}")]
    Timeout {
        operation: &'static str,
        seconds: f64,
    },

    /// The stream could no longer be framed; fatal to the session.
    #[error("framing error: {0}")]
    Framing(#[from] CodecError),

    /// The SMSC refused our bind; not retried automatically.
    #[error("bind_transceiver rejected by SMSC with command_status {status:#010x}")]
    BindRejected { status: u32 },

    /// The SMSC answered the bind with something other than
    /// bind_transceiver_resp.
    #[error("unexpected PDU during {operation}: expected {expected}, got {actual}")]
    UnexpectedPdu {
        operation: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// The peer closed the connection cleanly.
    #[error("connection closed by SMSC")]
    ConnectionClosed,

    /// No enquire_link_resp within socket_timeout.
    #[error("link probe received no response within {seconds:.2}s")]
    LinkTimeout { seconds: f64 },

    /// The SMSC asked us to unbind.
    #[error("SMSC requested unbind")]
    PeerUnbind,

    /// A job asked the session to unbind.
    #[error("unbind requested by application")]
    UnbindRequested,

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// The caller handed over a job that fails protocol validation.
    #[error("invalid job: {0}")]
    Job(#[from] crate::protocol::JobError),

    /// The client was asked to stop.
    #[error("client shutdown requested")]
    Shutdown,
}

pub type ClientResult<T> = Result<T, ClientError>;
