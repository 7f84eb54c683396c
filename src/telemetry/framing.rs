// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapshot framing: deciding when a read is complete and extracting the
//! base64 payload from it.
//!
//! Controller firmware versions disagree on how a snapshot ends. Some close
//! the socket, some send a trailing newline, some repeat the marker. The
//! [`Framing`] strategy picks the rule; extraction is shared by all of them.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use super::TelemetryDocument;
use crate::error::DecodeError;

/// Marker token that precedes the base64 payload.
pub const ENERGY_MARKER: &str = "SET_ENERGY=";

/// Standard alphabet, padding optional.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Rule deciding when a snapshot read has received a whole frame.
///
/// Every strategy also finishes when the peer closes the connection.
///
/// # Examples
///
/// ```
/// use savant_energy::telemetry::Framing;
///
/// let framing = Framing::default();
/// assert!(!framing.is_complete(b"\nSET_ENERGY=abc"));
/// assert!(framing.is_complete(b"\nSET_ENERGY=abc\n"));
///
/// assert!(!Framing::ConnectionClose.is_complete(b"\nSET_ENERGY=abc\n"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum Framing {
    /// Complete once this many newline delimiters have arrived. The header
    /// line and the payload line each end with one.
    NewlineCount(usize),
    /// Complete once the marker has been seen twice; the payload runs up to
    /// the second marker or the next newline, whichever comes first.
    SecondMarker,
    /// Complete only when the peer closes the connection.
    ConnectionClose,
}

impl Framing {
    /// Default number of newlines that terminate a frame.
    pub const DEFAULT_NEWLINES: usize = 2;

    /// Returns `true` if `buf` already holds a whole frame.
    #[must_use]
    pub fn is_complete(&self, buf: &[u8]) -> bool {
        match self {
            Self::NewlineCount(n) => buf.iter().filter(|&&b| b == b'\n').count() >= *n,
            Self::SecondMarker => count_marker(buf) >= 2,
            Self::ConnectionClose => false,
        }
    }

    /// Extracts the base64 payload from snapshot text.
    ///
    /// When the marker is present the payload is everything after its first
    /// occurrence up to the next newline (or next marker, for
    /// [`SecondMarker`](Self::SecondMarker)). Without a marker the last
    /// non-empty line is taken, since the header always comes first.
    #[must_use]
    pub fn extract_payload<'a>(&self, text: &'a str) -> &'a str {
        let payload = match text.split_once(ENERGY_MARKER) {
            Some((_, rest)) => {
                let rest = match self {
                    Self::SecondMarker => rest.split(ENERGY_MARKER).next().unwrap_or(rest),
                    _ => rest,
                };
                rest.split('\n').next().unwrap_or(rest)
            }
            None => text
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or_default(),
        };
        payload.trim()
    }
}

impl Default for Framing {
    fn default() -> Self {
        Self::NewlineCount(Self::DEFAULT_NEWLINES)
    }
}

fn count_marker(buf: &[u8]) -> usize {
    let marker = ENERGY_MARKER.as_bytes();
    buf.windows(marker.len()).filter(|w| *w == marker).count()
}

/// Decodes raw snapshot bytes into a telemetry document.
///
/// # Errors
///
/// Returns `DecodeError` if the bytes are not text, the payload is empty or
/// not base64, or the decoded JSON is not a telemetry document.
pub fn decode_snapshot(raw: &[u8], framing: &Framing) -> Result<TelemetryDocument, DecodeError> {
    let text = std::str::from_utf8(raw)?;
    let payload = framing.extract_payload(text);

    if payload.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    tracing::trace!(length = payload.len(), "Decoding snapshot payload");

    let bytes = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|source| DecodeError::Base64 {
            length: payload.len(),
            source,
        })?;
    let json = String::from_utf8(bytes)?;

    Ok(serde_json::from_str(&json)?)
}

/// Encodes a document the way the controller frames it on the wire.
///
/// # Errors
///
/// Returns `DecodeError::Json` if the document cannot be serialized.
pub fn encode_snapshot(document: &TelemetryDocument) -> Result<Vec<u8>, DecodeError> {
    let json = serde_json::to_string(document)?;
    let payload = base64::engine::general_purpose::STANDARD.encode(json);
    Ok(format!("\n{ENERGY_MARKER}{payload}\n").into_bytes())
}
