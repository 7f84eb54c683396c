// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the Savant energy library.
//!
//! Each concern has its own error enum: reaching the energy controller
//! ([`ConnectionError`]), decoding its snapshot ([`DecodeError`]), looking up
//! DMX addresses ([`ResolutionError`]), writing DMX frames ([`CommandError`]),
//! constructing validated values ([`ValueError`]) and loading configuration
//! ([`ConfigError`]). They all convert into the top-level [`Error`].
//!
//! A rate-limited toggle is not an error; see
//! [`ToggleOutcome::RateLimited`](crate::controller::ToggleOutcome::RateLimited).

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The energy controller could not be reached or read.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The snapshot payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The DMX address of a breaker could not be determined.
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Writing a DMX frame to the gateway failed.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// A value failed validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The configuration is invalid or could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// No breaker with this UID is known to the registry.
    #[error("unknown breaker: {0}")]
    UnknownBreaker(String),
}

/// Errors raised while talking to the energy controller socket.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The TCP connection could not be established.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// The `host:port` that was dialed.
        endpoint: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading from an established connection failed.
    #[error("failed to read from {endpoint} after {bytes} bytes: {source}")]
    Read {
        /// The `host:port` being read.
        endpoint: String,
        /// Bytes received before the failure.
        bytes: usize,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Connecting or reading took longer than the configured timeout.
    #[error("timed out after {timeout_ms} ms talking to {endpoint} ({bytes} bytes received)")]
    Timeout {
        /// The `host:port` being read.
        endpoint: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
        /// Bytes received before the timeout.
        bytes: usize,
    },
}

/// Errors raised while decoding a snapshot payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Nothing was left to decode once framing was stripped.
    #[error("empty snapshot payload")]
    EmptyPayload,

    /// The raw bytes were not valid UTF-8 text.
    #[error("snapshot is not valid UTF-8: {0}")]
    Text(#[from] std::str::Utf8Error),

    /// The payload was not valid base64.
    #[error("invalid base64 payload ({length} chars): {source}")]
    Base64 {
        /// Length of the payload that failed to decode.
        length: usize,
        /// The underlying decode error.
        #[source]
        source: base64::DecodeError,
    },

    /// The decoded bytes were not valid UTF-8.
    #[error("decoded payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The decoded text was not a valid telemetry document.
    #[error("invalid telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while resolving a DMX address through RDM discovery.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The HTTP request failed or timed out.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("gateway returned HTTP {0}")]
    Status(u16),

    /// The response did not carry an `address` field.
    #[error("no address in RDM response for {0}")]
    MissingAddress(String),

    /// The response body or the address in it could not be parsed.
    #[error("invalid RDM response: {0}")]
    InvalidResponse(String),

    /// The address is outside the DMX range.
    #[error("address out of range: {0}")]
    OutOfRange(#[from] ValueError),
}

/// Errors raised while reading or writing DMX values on the gateway.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The HTTP request failed or timed out.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("gateway returned HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, if any.
        body: String,
    },

    /// The response body could not be parsed.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    /// A frame with no addresses cannot be written.
    #[error("refusing to send an empty DMX frame")]
    EmptyFrame,
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u32,
    },
}

/// Errors related to loading and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field has an unusable value.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
