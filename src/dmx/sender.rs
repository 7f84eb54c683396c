// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame writes with statistics and a dry-run mode.

use std::sync::Arc;
use std::time::Duration;

use super::frame::DmxFrame;
use super::stats::{ApiStatsSnapshot, DEFAULT_LIVENESS_WINDOW, DmxApiStats};
use crate::error::CommandError;
use crate::protocol::GatewayClient;

/// Writes DMX frames to the gateway and keeps call statistics.
///
/// In testing mode the command is logged and counted as a success without
/// any network I/O, so the relay bank is never touched.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use savant_energy::dmx::{DmxApiStats, DmxCommandSender, DmxFrame};
/// use savant_energy::protocol::GatewayConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = GatewayConfig::new("192.168.1.108").into_client()?;
/// let sender = DmxCommandSender::new(gateway, Arc::new(DmxApiStats::new()));
///
/// let ok = sender.send(&DmxFrame::from_levels(vec![255, 0])).await;
/// println!("sent: {ok}, stats: {:?}", sender.stats());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DmxCommandSender {
    gateway: GatewayClient,
    stats: Arc<DmxApiStats>,
    testing_mode: bool,
    liveness_window: Duration,
}

impl DmxCommandSender {
    /// Creates a sender that records into `stats`.
    #[must_use]
    pub fn new(gateway: GatewayClient, stats: Arc<DmxApiStats>) -> Self {
        Self {
            gateway,
            stats,
            testing_mode: false,
            liveness_window: DEFAULT_LIVENESS_WINDOW,
        }
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn with_testing_mode(mut self, testing_mode: bool) -> Self {
        self.testing_mode = testing_mode;
        self
    }

    /// Sets the window used by [`is_api_available`](Self::is_api_available).
    #[must_use]
    pub fn with_liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self
    }

    /// Returns `true` in dry-run mode.
    #[must_use]
    pub fn testing_mode(&self) -> bool {
        self.testing_mode
    }

    /// Returns the gateway client.
    #[must_use]
    pub fn gateway(&self) -> &GatewayClient {
        &self.gateway
    }

    /// Sends a frame, reporting only success or failure.
    ///
    /// Failures are logged and counted, never returned.
    pub async fn send(&self, frame: &DmxFrame) -> bool {
        self.try_send(frame).await.is_ok()
    }

    /// Sends a frame and returns the failure cause.
    ///
    /// The request counter is incremented before the attempt.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` if the write fails; the failure is already
    /// counted in the statistics.
    pub async fn try_send(&self, frame: &DmxFrame) -> Result<(), CommandError> {
        self.stats.record_request();

        if self.testing_mode {
            tracing::info!(
                command = %self.describe(frame),
                "DMX command (testing mode, not sent)"
            );
            self.stats.record_success();
            return Ok(());
        }

        tracing::debug!(command = %self.describe(frame), "DMX command (sending)");

        match self.gateway.set_dmx(frame).await {
            Ok(()) => {
                self.stats.record_success();
                tracing::info!(addresses = frame.len(), "DMX frame written");
                Ok(())
            }
            Err(err) => {
                self.stats.record_failure();
                tracing::error!(error = %err, addresses = frame.len(), "Failed to set DMX values");
                Err(err)
            }
        }
    }

    /// Renders the equivalent `curl` command for a frame.
    #[must_use]
    pub fn describe(&self, frame: &DmxFrame) -> String {
        self.gateway.describe_set_dmx(frame)
    }

    /// Returns a copy of the call statistics.
    #[must_use]
    pub fn stats(&self) -> ApiStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the shared statistics handle.
    #[must_use]
    pub fn shared_stats(&self) -> Arc<DmxApiStats> {
        Arc::clone(&self.stats)
    }

    /// Heuristic gateway liveness; see [`DmxApiStats::is_api_available`].
    #[must_use]
    pub fn is_api_available(&self) -> bool {
        self.stats.is_api_available(self.liveness_window)
    }
}
