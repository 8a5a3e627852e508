//! # Error Types
//!
//! Every fallible operation in the library reports through [`TideError`].
//! Model and window errors are fatal to the current operation; decode errors
//! are recovered inside [`crate::ics::decode`] and never reach the caller;
//! upstream errors are surfaced unchanged so the caller can log and abort.

use chrono::{DateTime, Utc};
use std::io;
use thiserror::Error;

/// Errors that can occur while modelling, fetching or persisting tide events.
#[derive(Error, Debug)]
pub enum TideError {
    /// Constituent table is empty or holds a non-positive amplitude or speed
    #[error("invalid harmonic model: {0}")]
    InvalidModel(String),

    /// Requested time range is empty or reversed
    #[error("invalid window: end {end} is not after start {start}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Sampling step for the extrema search must be positive
    #[error("invalid sample interval: {0} seconds")]
    InvalidSampleInterval(i64),

    /// Persisted calendar text could not be understood
    #[error("calendar decode failed: {0}")]
    Decode(String),

    /// External tide API answered with a non-success status
    #[error("upstream request failed: {status} {body}")]
    Upstream { status: u16, body: String },

    /// External tide API answered with a body we cannot read
    #[error("malformed tide records: {0}")]
    MalformedRecords(String),

    /// HTTP transport failed (network, TLS, timeout or JSON body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// External tide API needs a token and none was configured
    #[error("STORM_TOKEN env var or stormglass.token config required")]
    MissingToken,

    /// Calendar file could not be read or written
    #[error("calendar IO: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias used across the library.
pub type Result<T> = std::result::Result<T, TideError>;
