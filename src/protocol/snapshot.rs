// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw TCP client for the energy controller's snapshot socket.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};

use crate::error::{ConnectionError, Error};
use crate::telemetry::{Framing, TelemetryDocument, decode_snapshot};

/// Size of each socket read.
const READ_CHUNK: usize = 4096;

/// Configuration for the snapshot socket.
///
/// # Examples
///
/// ```
/// use savant_energy::protocol::SnapshotConfig;
/// use savant_energy::telemetry::Framing;
/// use std::time::Duration;
///
/// let config = SnapshotConfig::new("192.168.1.108")
///     .with_port(2000)
///     .with_timeout(Duration::from_secs(5))
///     .with_framing(Framing::ConnectionClose);
///
/// assert_eq!(config.endpoint(), "192.168.1.108:2000");
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    host: String,
    port: u16,
    timeout: Duration,
    max_bytes: usize,
    framing: Framing,
}

impl SnapshotConfig {
    /// Default controller port.
    pub const DEFAULT_PORT: u16 = 2000;
    /// Default bound on connecting plus reading one snapshot.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default cap on snapshot size.
    pub const DEFAULT_MAX_BYTES: usize = 100_000;

    /// Creates a configuration for the controller at `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            timeout: Self::DEFAULT_TIMEOUT,
            max_bytes: Self::DEFAULT_MAX_BYTES,
            framing: Framing::default(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the overall fetch timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum number of bytes read per snapshot.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Sets the framing strategy.
    #[must_use]
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
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

    /// Returns the fetch timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the framing strategy.
    #[must_use]
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Client that fetches one snapshot per TCP connection.
///
/// # Examples
///
/// ```no_run
/// use savant_energy::protocol::{SnapshotClient, SnapshotConfig};
///
/// # async fn example() -> savant_energy::Result<()> {
/// let client = SnapshotClient::new(SnapshotConfig::new("192.168.1.108"));
/// let document = client.fetch().await?;
/// for breaker in document.iter() {
///     println!("{}: {:?} kW", breaker.name, breaker.power_kw);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    config: SnapshotConfig,
}

impl SnapshotClient {
    /// Creates a client from its configuration.
    #[must_use]
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Connects, reads one frame and decodes it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the controller cannot be reached or
    /// nothing arrives before the timeout, and `Error::Decode` if the bytes
    /// received are not a valid snapshot.
    pub async fn fetch(&self) -> Result<TelemetryDocument, Error> {
        let raw = self.read_frame().await?;
        let document = decode_snapshot(&raw, &self.config.framing)?;

        tracing::debug!(
            endpoint = %self.config.endpoint(),
            bytes = raw.len(),
            breakers = document.len(),
            "Decoded snapshot"
        );

        Ok(document)
    }

    /// Connects and reads raw bytes until the framing rule is satisfied, the
    /// peer closes the connection, the size cap is hit or the timeout
    /// elapses.
    ///
    /// A timeout after some bytes have arrived ends the read normally; only
    /// a timeout with nothing received is an error.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if connecting or reading fails, or if the
    /// timeout elapses before any byte arrives.
    pub async fn read_frame(&self) -> Result<Vec<u8>, ConnectionError> {
        let endpoint = self.config.endpoint();
        let deadline = Instant::now() + self.config.timeout;
        let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);

        tracing::debug!(endpoint = %endpoint, "Connecting to energy controller");

        let mut stream = match timeout_at(deadline, TcpStream::connect(&endpoint)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ConnectionError::Connect { endpoint, source }),
            Err(_) => {
                return Err(ConnectionError::Timeout {
                    endpoint,
                    timeout_ms,
                    bytes: 0,
                });
            }
        };

        let mut buf = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let read = match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(Ok(read)) => read,
                Ok(Err(source)) => {
                    return Err(ConnectionError::Read {
                        endpoint,
                        bytes: buf.len(),
                        source,
                    });
                }
                Err(_) if buf.is_empty() => {
                    return Err(ConnectionError::Timeout {
                        endpoint,
                        timeout_ms,
                        bytes: 0,
                    });
                }
                Err(_) => {
                    tracing::debug!(
                        endpoint = %endpoint,
                        bytes = buf.len(),
                        "Read timed out with partial frame"
                    );
                    break;
                }
            };

            if read == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..read]);

            if buf.len() >= self.config.max_bytes {
                tracing::warn!(
                    endpoint = %endpoint,
                    bytes = buf.len(),
                    max_bytes = self.config.max_bytes,
                    "Snapshot exceeded size cap, truncating read"
                );
                break;
            }
            if self.config.framing.is_complete(&buf) {
                break;
            }
        }

        tracing::trace!(endpoint = %endpoint, bytes = buf.len(), "Snapshot read finished");
        Ok(buf)
    }
}
