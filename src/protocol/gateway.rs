// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP client for the OLA lighting gateway.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::dmx::DmxFrame;
use crate::error::{CommandError, ResolutionError};
use crate::types::{DmxAddress, DmxUid};

/// Universe the relay bank listens on for `set_dmx` and `get_dmx`.
///
/// The configured universe only selects where RDM discovery looks.
pub const DMX_OUTPUT_UNIVERSE: u16 = 1;

// ============================================================================
// GatewayConfig
// ============================================================================

/// Configuration for the lighting gateway.
///
/// # Examples
///
/// ```
/// use savant_energy::protocol::GatewayConfig;
/// use std::time::Duration;
///
/// let config = GatewayConfig::new("192.168.1.108")
///     .with_port(9090)
///     .with_universe(1)
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.base_url(), "http://192.168.1.108:9090");
/// ```
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    host: String,
    port: u16,
    universe: u16,
    timeout: Duration,
}

impl GatewayConfig {
    /// Default OLA HTTP port.
    pub const DEFAULT_PORT: u16 = 9090;
    /// Default RDM discovery universe.
    pub const DEFAULT_UNIVERSE: u16 = 1;
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for the gateway at `host`.
    ///
    /// A `host` with an `http://` or `https://` scheme is used as the base
    /// URL verbatim and the port is ignored.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            universe: Self::DEFAULT_UNIVERSE,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the universe used for RDM address discovery.
    #[must_use]
    pub fn with_universe(mut self, universe: u16) -> Self {
        self.universe = universe;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the RDM discovery universe.
    #[must_use]
    pub fn universe(&self) -> u16 {
        self.universe
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the base URL from this configuration.
    #[must_use]
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            self.host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    /// Creates a `GatewayClient` from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(self) -> Result<GatewayClient, reqwest::Error> {
        let client = Client::builder().timeout(self.timeout).build()?;

        Ok(GatewayClient {
            base_url: self.base_url(),
            universe: self.universe,
            client,
        })
    }
}

// ============================================================================
// GatewayClient
// ============================================================================

/// HTTP client for the OLA endpoints used by the relay bank.
///
/// - `GET /json/rdm/uid_info?id=<universe>&uid=<dmx uid>` for address discovery
/// - `GET /get_dmx?u=1` for current channel levels
/// - `POST /set_dmx` with `u=1&d=<levels>` for frame writes
///
/// Reads and writes always target [`DMX_OUTPUT_UNIVERSE`].
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    universe: u16,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ChannelLevels {
    dmx: Vec<u8>,
}

impl GatewayClient {
    /// Returns the base URL of the gateway.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the universe used for RDM address discovery.
    #[must_use]
    pub fn universe(&self) -> u16 {
        self.universe
    }

    fn uid_info_url(&self, dmx_uid: &DmxUid) -> String {
        format!(
            "{}/json/rdm/uid_info?id={}&uid={}",
            self.base_url,
            self.universe,
            urlencoding::encode(dmx_uid.as_str())
        )
    }

    /// Looks up the DMX address bound to an RDM UID.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError` on transport failure, non-200 status, or a
    /// body without a usable `address` field.
    pub async fn uid_info(&self, dmx_uid: &DmxUid) -> Result<DmxAddress, ResolutionError> {
        let url = self.uid_info_url(dmx_uid);

        tracing::debug!(url = %url, "Fetching DMX address");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ResolutionError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        tracing::trace!(body = %body, "RDM response");

        parse_address(&body, dmx_uid)
    }

    /// Reads the current level of every channel in the universe.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` on transport failure, non-success status, or a
    /// body without a `dmx` array.
    pub async fn get_dmx(&self) -> Result<Vec<u8>, CommandError> {
        let url = format!("{}/get_dmx?u={DMX_OUTPUT_UNIVERSE}", self.base_url);

        tracing::debug!(url = %url, "Reading DMX levels");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CommandError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let levels: ChannelLevels = serde_json::from_str(&body)
            .map_err(|e| CommandError::InvalidResponse(format!("{e}: {body}")))?;
        Ok(levels.dmx)
    }

    /// Writes a full frame to the universe.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` if the frame is empty, the request fails, or
    /// the gateway answers with a non-success status.
    pub async fn set_dmx(&self, frame: &DmxFrame) -> Result<(), CommandError> {
        if frame.is_empty() {
            return Err(CommandError::EmptyFrame);
        }

        let url = format!("{}/set_dmx", self.base_url);
        let body = set_dmx_body(frame);

        tracing::debug!(url = %url, body = %body, "Writing DMX frame");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CommandError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        tracing::debug!(response = %text, "DMX frame accepted");
        Ok(())
    }

    /// Renders the `curl` invocation equivalent to [`set_dmx`](Self::set_dmx).
    #[must_use]
    pub fn describe_set_dmx(&self, frame: &DmxFrame) -> String {
        format!(
            "curl -X POST -d \"{}\" {}/set_dmx",
            set_dmx_body(frame),
            self.base_url
        )
    }
}

fn set_dmx_body(frame: &DmxFrame) -> String {
    format!("u={DMX_OUTPUT_UNIVERSE}&d={}", frame.to_data())
}

fn parse_address(body: &str, dmx_uid: &DmxUid) -> Result<DmxAddress, ResolutionError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ResolutionError::InvalidResponse(format!("{e}: {body}")))?;

    let raw = json
        .get("address")
        .ok_or_else(|| ResolutionError::MissingAddress(dmx_uid.to_string()))?;

    let value = match raw {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ResolutionError::InvalidResponse(format!("address is not an integer: {raw}")))?;

    Ok(DmxAddress::try_from(value)?)
}
