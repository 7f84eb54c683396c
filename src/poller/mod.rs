// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic snapshot polling.
//!
//! [`SnapshotPoller`] fetches a snapshot on a fixed interval, stores it in the
//! [`DeviceRegistry`] and, when a controller is attached, reconciles believed
//! relay states and discovers DMX addresses. A failed poll is logged and the
//! registry keeps its last good document.
//!
//! Address discovery talks to the lighting gateway and runs in its own task,
//! so a slow or unreachable gateway never delays a poll.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SavantConfig;
use crate::controller::BreakerController;
use crate::error::Error;
use crate::protocol::SnapshotClient;
use crate::registry::DeviceRegistry;

/// Polls the energy controller and feeds the registry.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use savant_energy::config::SavantConfig;
/// use savant_energy::poller::SnapshotPoller;
/// use savant_energy::registry::DeviceRegistry;
/// use parking_lot::Mutex;
/// use tokio::sync::watch;
///
/// # async fn example() {
/// let config = SavantConfig::new("192.168.1.108");
/// let registry = Arc::new(DeviceRegistry::new());
/// let poller = SnapshotPoller::from_config(&config, Arc::clone(&registry));
///
/// let (stop, stopped) = watch::channel(false);
/// let handle = poller.spawn(stopped);
///
/// // ... later
/// let _ = stop.send(true);
/// let _ = handle.await;
/// # }
/// ```
#[derive(Debug)]
pub struct SnapshotPoller {
    client: SnapshotClient,
    registry: Arc<DeviceRegistry>,
    controller: Option<Arc<BreakerController>>,
    interval: Duration,
    discovery: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotPoller {
    /// Default time between polls.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);

    /// Creates a poller with the default interval.
    #[must_use]
    pub fn new(client: SnapshotClient, registry: Arc<DeviceRegistry>) -> Self {
        Self {
            client,
            registry,
            controller: None,
            interval: Self::DEFAULT_INTERVAL,
            discovery: Mutex::new(None),
        }
    }

    /// Creates a poller from a configuration.
    #[must_use]
    pub fn from_config(config: &SavantConfig, registry: Arc<DeviceRegistry>) -> Self {
        Self::new(SnapshotClient::new(config.snapshot_config()), registry)
            .with_interval(config.scan_interval())
    }

    /// Sets the time between polls.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Attaches a controller to reconcile after each successful poll.
    #[must_use]
    pub fn with_controller(mut self, controller: Arc<BreakerController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Returns the time between polls.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the registry this poller feeds.
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Runs one poll and returns the number of breakers in the snapshot.
    ///
    /// With a controller attached, address discovery is started in the
    /// background unless the previous run is still going. This call does not
    /// wait for it; see [`wait_for_discovery`](Self::wait_for_discovery).
    ///
    /// # Errors
    ///
    /// Returns the fetch error after logging it and marking the registry
    /// stale. The previous document is kept.
    pub async fn poll_once(&self) -> Result<usize, Error> {
        let document = match self.client.fetch().await {
            Ok(document) => document,
            Err(err) => {
                tracing::error!(
                    endpoint = %self.client.config().endpoint(),
                    error = %err,
                    "Snapshot poll failed, keeping last known readings"
                );
                self.registry.record_failure();
                return Err(err);
            }
        };

        let breakers = document.len();
        if let Some(controller) = &self.controller {
            controller.reconcile(&document);
        }
        self.registry.update(document);

        if let Some(controller) = &self.controller {
            self.start_discovery(controller, breakers);
        }

        Ok(breakers)
    }

    /// Returns `true` while a background address discovery is running.
    #[must_use]
    pub fn is_discovering(&self) -> bool {
        self.discovery
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Waits for the current background address discovery, if any.
    pub async fn wait_for_discovery(&self) {
        let handle = self.discovery.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn start_discovery(&self, controller: &Arc<BreakerController>, breakers: usize) {
        let mut discovery = self.discovery.lock();
        if discovery.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("DMX address discovery still running, not starting another");
            return;
        }

        let controller = Arc::clone(controller);
        *discovery = Some(tokio::spawn(async move {
            let known = controller.resolve_addresses().await;
            tracing::debug!(breakers, addressed = known, "DMX addresses refreshed");
        }));
    }

    /// Polls on the interval until `shutdown` turns `true` or its sender is
    /// dropped. The first poll runs immediately.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                endpoint = %self.client.config().endpoint(),
                interval_secs = self.interval.as_secs(),
                "Snapshot poller started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Failures are logged inside poll_once.
                        let _ = self.poll_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            if let Some(handle) = self.discovery.lock().take() {
                handle.abort();
            }
            tracing::info!("Snapshot poller stopped");
        })
    }
}
