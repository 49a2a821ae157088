//! Crate-wide error type.
//!
//! Four kinds of failure exist: contract violations (caller bugs such as
//! visibility or shape mismatches), transport failures, preprocessing
//! exhaustion and decode failures on received frames. Contract errors are
//! not recoverable; an aborted computation must restart from a fresh
//! context.

use std::time::Duration;

use thiserror::Error;

/// Error type shared by every module of this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller violated an API contract (visibility, shape, slice
    /// bounds, double-set of fracbits, missing config entry, ...).
    #[error("contract violation: {0}")]
    Contract(String),

    /// A network operation failed: connect, handshake mismatch, short
    /// read or write, TLS failure, or use after `stop()`.
    #[error("transport: {0}")]
    Transport(String),

    /// A received byte stream ended early or held malformed data.
    #[error("decode: {0}")]
    Decode(String),

    /// The preprocessing source ran out of correlated randomness.
    #[error("preprocessing exhausted: {0}")]
    Exhausted(String),

    /// Connection setup exceeded its externally imposed deadline.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// Filesystem errors outside the transport (config files, TLS keys).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

macro_rules! ensure_contract {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::error::Error::Contract(format!($($arg)*)));
        }
    };
}

pub(crate) use ensure_contract;
