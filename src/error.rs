// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Error taxonomy shared by the filter, device and source layers

use std::time::Duration;
use thiserror::Error;

/// A raw alarm record could not be turned into a detected alarm.
///
/// These never leave the filter engine; the record is dropped and logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// A required field is absent or null
    #[error("record has no '{field}' field")]
    MissingField {
        /// Field name
        field: &'static str,
    },

    /// The id does not parse as an integer
    #[error("alarm id '{value}' is not an integer")]
    InvalidId {
        /// Raw id text
        value: String,
    },

    /// The origination time does not parse
    #[error("alarm {id}: timestamp '{value}' is not a valid date")]
    InvalidTimestamp {
        /// Alarm id
        id: i64,
        /// Raw timestamp text
        value: String,
    },
}

/// Failures of the device websocket link.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// Transport could not be established, dropped, or the link is not ready.
    #[error("connection error: {0}")]
    Connection(String),

    /// No response within the call bound
    #[error("request {id} ({method}) timed out after {after:?}")]
    Timeout {
        /// Request id
        id: String,
        /// Request method
        method: String,
        /// Bound that elapsed
        after: Duration,
    },

    /// The link went down while the request was pending
    #[error("request {id} ({method}) canceled by disconnect")]
    Canceled {
        /// Request id
        id: String,
        /// Request method
        method: String,
    },

    /// The device answered the request with an error message.
    #[error("{method} rejected by device: {reason}")]
    Rejected {
        /// Request method
        method: String,
        /// Error text from the device
        reason: String,
    },

    /// A frame could not be encoded or decoded
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Failures of a display controller operation.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Websocket link failure
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The control program failed
    #[error("command '{command}' failed: {reason}")]
    Command {
        /// Command line as run
        command: String,
        /// What went wrong
        reason: String,
    },

    /// Wake address is not six hex octets
    #[error("invalid hardware address '{0}'")]
    InvalidMac(String),

    /// Socket or process i/o
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures fetching raw records from the alarm source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport or client failure
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("alarm source answered with status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Body is not the expected JSON
    #[error("invalid response body: {0}")]
    Decode(String),

    /// Nothing at the results pointer
    #[error("no record array at '{0}'")]
    MissingResults(String),
}
