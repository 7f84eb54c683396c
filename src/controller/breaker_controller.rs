// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Breaker command state machine.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, broadcast};

use super::settings::ControllerSettings;
use super::state::{BreakerControlState, BreakerPhase, BulkOutcome, ToggleOutcome};
use crate::config::SavantConfig;
use crate::dmx::{
    ApiStatsSnapshot, DmxAddressResolver, DmxApiStats, DmxCommandSender, DmxFrame,
    DmxStatusReader,
};
use crate::error::{CommandError, Error};
use crate::event::{ControllerEvent, EventBus};
use crate::registry::{BreakerEntry, DeviceRegistry};
use crate::telemetry::TelemetryDocument;
use crate::types::DmxAddress;

/// Channels switched on by [`BreakerController::all_loads_on`] when no
/// breaker address has been discovered yet.
pub const DEFAULT_ALL_LOADS_CHANNELS: u16 = 50;

/// Label used in events for commands that cover many breakers.
const BULK_UID: &str = "";

/// The single process-wide write gate.
#[derive(Debug, Default)]
struct CommandGate {
    last_write: Option<Instant>,
}

impl CommandGate {
    fn remaining(&self, cooldown: Duration) -> Option<Duration> {
        let elapsed = self.last_write?.elapsed();
        (elapsed < cooldown).then(|| cooldown.saturating_sub(elapsed))
    }

    fn stamp(&mut self) {
        self.last_write = Some(Instant::now());
    }
}

/// Drives breaker relays through full-frame DMX writes.
///
/// One controller exists per relay bank and is shared by every caller through
/// an `Arc`. All writes pass through one gate: a frame is never sent less
/// than the cooldown after the previous write, whichever breaker it was for.
/// Commands are serialized; the gate is held while the frame is built and
/// sent.
///
/// Every write describes every breaker with a known address. Breakers take
/// their believed state; breakers with no known state follow the
/// [`UnknownBreakerPolicy`](crate::dmx::UnknownBreakerPolicy).
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use savant_energy::config::SavantConfig;
/// use savant_energy::controller::{BreakerController, ToggleOutcome};
/// use savant_energy::registry::DeviceRegistry;
///
/// # async fn example() -> savant_energy::Result<()> {
/// let config = SavantConfig::new("192.168.1.108");
/// let registry = Arc::new(DeviceRegistry::new());
/// let controller = BreakerController::from_config(&config, Arc::clone(&registry))?;
///
/// match controller.turn_off("1234567890.1").await? {
///     ToggleOutcome::Switched { on } => println!("now {on}"),
///     ToggleOutcome::Unchanged => println!("already off"),
///     ToggleOutcome::RateLimited { retry_after } => println!("wait {retry_after:?}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BreakerController {
    registry: Arc<DeviceRegistry>,
    resolver: DmxAddressResolver,
    sender: DmxCommandSender,
    status: DmxStatusReader,
    settings: ControllerSettings,
    gate: AsyncMutex<CommandGate>,
    breakers: Mutex<HashMap<String, BreakerControlState>>,
    events: EventBus,
}

impl BreakerController {
    /// Creates a controller.
    ///
    /// The status reader shares the sender's gateway and statistics.
    #[must_use]
    pub fn new(
        registry: Arc<DeviceRegistry>,
        resolver: DmxAddressResolver,
        sender: DmxCommandSender,
        settings: ControllerSettings,
    ) -> Self {
        let status = DmxStatusReader::new(sender.gateway().clone(), sender.shared_stats());
        Self {
            registry,
            resolver,
            sender,
            status,
            settings,
            gate: AsyncMutex::new(CommandGate::default()),
            breakers: Mutex::new(HashMap::new()),
            events: EventBus::new(),
        }
    }

    /// Builds a controller and its gateway clients from a configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Command` if the HTTP client cannot be created.
    pub fn from_config(config: &SavantConfig, registry: Arc<DeviceRegistry>) -> Result<Self, Error> {
        let gateway = config
            .gateway_config()
            .into_client()
            .map_err(CommandError::from)?;

        let resolver = DmxAddressResolver::with_ttl(gateway.clone(), config.address_cache_ttl());
        let sender = DmxCommandSender::new(gateway, Arc::new(DmxApiStats::new()))
            .with_testing_mode(config.dmx_testing_mode)
            .with_liveness_window(config.api_liveness());

        Ok(Self::new(
            registry,
            resolver,
            sender,
            config.controller_settings(),
        ))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Returns the registry the controller reads breakers from.
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Returns the frame sender.
    #[must_use]
    pub fn sender(&self) -> &DmxCommandSender {
        &self.sender
    }

    /// Returns the address resolver.
    #[must_use]
    pub fn resolver(&self) -> &DmxAddressResolver {
        &self.resolver
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to controller events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Returns the gateway call statistics.
    #[must_use]
    pub fn api_stats(&self) -> ApiStatsSnapshot {
        self.sender.stats()
    }

    /// Heuristic gateway liveness for diagnostics.
    #[must_use]
    pub fn is_api_available(&self) -> bool {
        self.sender.is_api_available()
    }

    /// Returns the control state of a breaker, if one exists yet.
    #[must_use]
    pub fn control_state(&self, uid: &str) -> Option<BreakerControlState> {
        self.breakers.lock().get(uid).copied()
    }

    /// Returns the believed state of a breaker.
    ///
    /// The locally held state wins; otherwise the relay state confirmed by the
    /// latest snapshot is used.
    #[must_use]
    pub fn is_on(&self, uid: &str) -> Option<bool> {
        let local = self
            .breakers
            .lock()
            .get(uid)
            .and_then(|state| state.last_commanded_on);
        local.or_else(|| self.registry.relay_state(uid))
    }

    /// Returns how long until the gate accepts another write.
    pub async fn cooldown_remaining(&self) -> Option<Duration> {
        self.gate.lock().await.remaining(self.settings.cooldown())
    }

    // ========================================================================
    // Single-breaker commands
    // ========================================================================

    /// Closes the relay of a breaker.
    ///
    /// # Errors
    ///
    /// See [`set_state`](Self::set_state).
    pub async fn turn_on(&self, uid: &str) -> Result<ToggleOutcome, Error> {
        self.set_state(uid, true).await
    }

    /// Opens the relay of a breaker.
    ///
    /// # Errors
    ///
    /// See [`set_state`](Self::set_state).
    pub async fn turn_off(&self, uid: &str) -> Result<ToggleOutcome, Error> {
        self.set_state(uid, false).await
    }

    /// Flips a breaker.
    ///
    /// A breaker with no known state is assumed to be in the state given by
    /// the unknown-breaker policy.
    ///
    /// # Errors
    ///
    /// See [`set_state`](Self::set_state).
    pub async fn toggle(&self, uid: &str) -> Result<ToggleOutcome, Error> {
        let current = self
            .settings
            .unknown_breaker_policy()
            .resolve(self.is_on(uid));
        self.set_state(uid, !current).await
    }

    /// Drives a breaker to `on`.
    ///
    /// The cooldown is checked first: while it is active the call returns
    /// [`ToggleOutcome::RateLimited`] with no network I/O. A breaker already
    /// believed to be in the requested state yields
    /// [`ToggleOutcome::Unchanged`]. Otherwise the DMX address is resolved,
    /// a full frame is built and written, and on success the new state is
    /// adopted immediately.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownBreaker` if the registry does not list `uid`
    /// - `Error::Resolution` if no DMX address can be found; nothing is sent
    /// - `Error::Command` if the write fails; the believed state is unchanged
    pub async fn set_state(&self, uid: &str, on: bool) -> Result<ToggleOutcome, Error> {
        let entry = self
            .registry
            .get(uid)
            .ok_or_else(|| Error::UnknownBreaker(uid.to_string()))?;

        let mut gate = self.gate.lock().await;

        if let Some(wait) = gate.remaining(self.settings.cooldown()) {
            tracing::info!(
                uid,
                name = entry.name(),
                retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Switch command rate limited"
            );
            self.events
                .publish(ControllerEvent::rate_limited(uid, entry.name(), wait));
            return Ok(ToggleOutcome::RateLimited { retry_after: wait });
        }

        if self.is_on(uid) == Some(on) {
            tracing::debug!(uid, on, "Breaker already in requested state");
            return Ok(ToggleOutcome::Unchanged);
        }

        let address = self.address_for(&entry).await?;
        let frame = DmxFrame::build(&self.believed_levels(), Some((address, on)));

        tracing::info!(
            uid,
            name = entry.name(),
            address = %address,
            on,
            "Switching breaker"
        );

        gate.stamp();
        if let Err(err) = self.sender.try_send(&frame).await {
            self.events.publish(ControllerEvent::CommandFailed {
                uid: uid.to_string(),
                message: err.to_string(),
            });
            return Err(err.into());
        }

        self.record_command(uid, on, Some(address));
        Ok(ToggleOutcome::Switched { on })
    }

    // ========================================================================
    // Bulk commands
    // ========================================================================

    /// Applies a scene: listed breakers take their target, every other
    /// breaker with a known address follows the unknown-breaker policy.
    ///
    /// On success every listed breaker adopts its target.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownBreaker` if a listed UID is not in the registry
    /// - `Error::Resolution` if a listed breaker has no address; nothing is sent
    /// - `Error::Command` if the write fails
    pub async fn apply_scene(&self, targets: &HashMap<String, bool>) -> Result<BulkOutcome, Error> {
        let mut entries = Vec::with_capacity(targets.len());
        for (uid, on) in targets {
            let entry = self
                .registry
                .get(uid)
                .ok_or_else(|| Error::UnknownBreaker(uid.clone()))?;
            entries.push((entry, *on));
        }

        let mut gate = self.gate.lock().await;
        if let Some(wait) = self.check_bulk_cooldown(&gate, "scene") {
            return Ok(BulkOutcome::RateLimited { retry_after: wait });
        }

        let default_on = self.settings.unknown_breaker_policy().resolve(None);
        let mut levels: BTreeMap<DmxAddress, bool> = self
            .registry
            .addresses()
            .into_values()
            .map(|address| (address, default_on))
            .collect();

        let mut applied = Vec::with_capacity(entries.len());
        for (entry, on) in &entries {
            let address = self.address_for(entry).await?;
            levels.insert(address, *on);
            applied.push((entry.uid().to_string(), *on, address));
        }

        let frame = DmxFrame::build(&levels, None);
        tracing::info!(breakers = applied.len(), channels = frame.len(), "Applying scene");

        gate.stamp();
        self.send_bulk(&frame).await?;

        for (uid, on, address) in applied {
            self.record_command(&uid, on, Some(address));
        }
        Ok(BulkOutcome::Sent {
            channels: frame.len(),
        })
    }

    /// Switches every breaker on.
    ///
    /// Every discovered address is set ON. With no address discovered yet,
    /// addresses `1..=DEFAULT_ALL_LOADS_CHANNELS` are used.
    ///
    /// # Errors
    ///
    /// Returns `Error::Command` if the write fails.
    pub async fn all_loads_on(&self) -> Result<BulkOutcome, Error> {
        let mut gate = self.gate.lock().await;
        if let Some(wait) = self.check_bulk_cooldown(&gate, "all loads") {
            return Ok(BulkOutcome::RateLimited { retry_after: wait });
        }

        let addresses = self.registry.addresses();
        let last = match addresses.values().max() {
            Some(address) => *address,
            None => DmxAddress::new(DEFAULT_ALL_LOADS_CHANNELS)?,
        };
        let frame = DmxFrame::all_on(last);

        tracing::info!(channels = frame.len(), "Switching all loads on");

        gate.stamp();
        self.send_bulk(&frame).await?;

        for (uid, address) in addresses {
            self.record_command(&uid, true, Some(address));
        }
        Ok(BulkOutcome::Sent {
            channels: frame.len(),
        })
    }

    /// Renders the `curl` command for the frame describing the current
    /// believed states, or `None` when no address is known.
    #[must_use]
    pub fn command_preview(&self) -> Option<String> {
        let levels = self.believed_levels();
        if levels.is_empty() {
            return None;
        }
        Some(self.sender.describe(&DmxFrame::build(&levels, None)))
    }

    // ========================================================================
    // Telemetry integration
    // ========================================================================

    /// Reconciles believed states with a fresh snapshot.
    ///
    /// A breaker whose confirmed relay state differs from the believed one
    /// adopts the confirmed state, unless it was commanded less than the
    /// reconcile window ago. Breakers without a relay state are left alone.
    ///
    /// Control state is only updated for breakers that already have one.
    /// Other breakers take their state from the registry, so only a change
    /// against the registry's last reading is announced. Call this before
    /// [`DeviceRegistry::update`] with the same document.
    pub fn reconcile(&self, document: &TelemetryDocument) {
        let window = self.settings.reconcile_window();
        let previous: HashMap<&str, Option<bool>> = document
            .iter()
            .map(|demand| {
                let uid = demand.uid.as_str();
                (uid, self.registry.relay_state(uid))
            })
            .collect();
        let mut changed = Vec::new();

        {
            let mut breakers = self.breakers.lock();
            for demand in document.iter() {
                let Some(confirmed) = demand.relay_state() else {
                    continue;
                };
                let Some(state) = breakers.get_mut(&demand.uid) else {
                    if previous.get(demand.uid.as_str()).copied().flatten() != Some(confirmed) {
                        changed.push((demand.uid.clone(), confirmed));
                    }
                    continue;
                };
                if state.last_commanded_on == Some(confirmed) {
                    continue;
                }
                if state.commanded_within(window) {
                    tracing::debug!(
                        uid = %demand.uid,
                        confirmed,
                        "Keeping commanded state inside reconcile window"
                    );
                    continue;
                }
                state.last_commanded_on = Some(confirmed);
                changed.push((demand.uid.clone(), confirmed));
            }
        }

        for (uid, on) in changed {
            tracing::debug!(uid = %uid, on, "Adopted relay state from snapshot");
            self.events.publish(ControllerEvent::StateChanged { uid, on });
        }
    }

    /// Discovers the DMX address of every breaker in the registry.
    ///
    /// Cached addresses cost no I/O. Returns the number of breakers with a
    /// known address afterwards.
    pub async fn resolve_addresses(&self) -> usize {
        let mut known = 0;
        for entry in self.registry.breakers() {
            if let Some(address) = self.resolver.resolve(entry.dmx_uid()).await {
                self.store_address(entry.uid(), address);
                known += 1;
            } else if entry.dmx_address().is_some() {
                known += 1;
            }
        }
        known
    }

    /// Reads relay levels back from the gateway for every breaker with a
    /// known address. Breakers whose channel could not be read are omitted.
    pub async fn relay_levels(&self) -> HashMap<String, bool> {
        let addresses = self.registry.addresses();
        let wanted: Vec<DmxAddress> = addresses.values().copied().collect();
        let levels = self.status.channel_states(&wanted).await;

        addresses
            .into_iter()
            .filter_map(|(uid, address)| levels.get(&address).map(|on| (uid, *on)))
            .collect()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Address of every breaker with one, mapped to its believed state.
    fn believed_levels(&self) -> BTreeMap<DmxAddress, bool> {
        let policy = self.settings.unknown_breaker_policy();
        let breakers = self.registry.breakers();
        let local = self.breakers.lock();

        breakers
            .iter()
            .filter_map(|entry| {
                let address = entry.dmx_address()?;
                let believed = local
                    .get(entry.uid())
                    .and_then(|state| state.last_commanded_on)
                    .or_else(|| entry.relay_state());
                Some((address, policy.resolve(believed)))
            })
            .collect()
    }

    async fn address_for(&self, entry: &BreakerEntry) -> Result<DmxAddress, Error> {
        match self.resolver.try_resolve(entry.dmx_uid()).await {
            Ok(address) => {
                self.store_address(entry.uid(), address);
                Ok(address)
            }
            Err(err) => {
                if let Some(address) = entry.dmx_address() {
                    tracing::warn!(
                        uid = entry.uid(),
                        error = %err,
                        address = %address,
                        "Address lookup failed, using last known address"
                    );
                    return Ok(address);
                }
                tracing::warn!(
                    uid = entry.uid(),
                    dmx_uid = %entry.dmx_uid(),
                    error = %err,
                    "No DMX address for breaker"
                );
                self.events.publish(ControllerEvent::AddressUnresolved {
                    uid: entry.uid().to_string(),
                    dmx_uid: entry.dmx_uid().clone(),
                });
                Err(err.into())
            }
        }
    }

    fn store_address(&self, uid: &str, address: DmxAddress) {
        self.registry.set_address(uid, address);
        self.breakers
            .lock()
            .entry(uid.to_string())
            .or_default()
            .phase = BreakerPhase::Ready(address);
    }

    fn record_command(&self, uid: &str, on: bool, address: Option<DmxAddress>) {
        {
            let mut breakers = self.breakers.lock();
            let state = breakers.entry(uid.to_string()).or_default();
            state.last_commanded_on = Some(on);
            state.last_command_at = Some(Instant::now());
            if let Some(address) = address {
                state.phase = BreakerPhase::Ready(address);
            }
        }
        self.events.publish(ControllerEvent::StateChanged {
            uid: uid.to_string(),
            on,
        });
    }

    fn check_bulk_cooldown(&self, gate: &CommandGate, label: &str) -> Option<Duration> {
        let wait = gate.remaining(self.settings.cooldown())?;
        tracing::info!(
            command = label,
            retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            "Bulk command rate limited"
        );
        self.events
            .publish(ControllerEvent::rate_limited(BULK_UID, label, wait));
        Some(wait)
    }

    async fn send_bulk(&self, frame: &DmxFrame) -> Result<(), Error> {
        self.sender.try_send(frame).await.map_err(|err| {
            self.events.publish(ControllerEvent::CommandFailed {
                uid: BULK_UID.to_string(),
                message: err.to_string(),
            });
            Error::from(err)
        })
    }
}
