// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Breaker registry fed by the polling flow.
//!
//! The registry is keyed by the controller-assigned UID. It holds the latest
//! reading of every breaker, its derived DMX UID and, once discovered, its DMX
//! address. A failed poll never clears it: the last good document stays in
//! place and the registry is flagged stale instead.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::telemetry::{BreakerDemand, TelemetryDocument};
use crate::types::{DmxAddress, DmxUid};

/// Registry view of a single breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerEntry {
    demand: BreakerDemand,
    dmx_uid: DmxUid,
    dmx_address: Option<DmxAddress>,
}

impl BreakerEntry {
    fn new(demand: BreakerDemand) -> Self {
        let dmx_uid = demand.dmx_uid();
        Self {
            demand,
            dmx_uid,
            dmx_address: None,
        }
    }

    /// Returns the controller UID.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.demand.uid
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.demand.name
    }

    /// Returns the latest reading.
    #[must_use]
    pub fn demand(&self) -> &BreakerDemand {
        &self.demand
    }

    /// Returns the DMX UID used for address discovery.
    #[must_use]
    pub fn dmx_uid(&self) -> &DmxUid {
        &self.dmx_uid
    }

    /// Returns the DMX address, if discovered.
    #[must_use]
    pub fn dmx_address(&self) -> Option<DmxAddress> {
        self.dmx_address
    }

    /// Returns the relay state confirmed by telemetry.
    #[must_use]
    pub fn relay_state(&self) -> Option<bool> {
        self.demand.relay_state()
    }

    /// Returns `true` when the latest reading includes a relay state.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.demand.is_available()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    /// UIDs in controller order.
    order: Vec<String>,
    entries: HashMap<String, BreakerEntry>,
    document: Option<TelemetryDocument>,
    last_success: Option<(Instant, DateTime<Utc>)>,
    consecutive_failures: u32,
}

/// Shared, strongly-typed registry of breakers.
///
/// # Examples
///
/// ```
/// use savant_energy::registry::DeviceRegistry;
/// use savant_energy::telemetry::TelemetryDocument;
///
/// let registry = DeviceRegistry::new();
/// assert!(registry.is_stale());
///
/// let doc: TelemetryDocument = serde_json::from_str(
///     r#"{"presentDemands":[{"uid":"1234567890","name":"Pool","percentCommanded":0}]}"#,
/// ).unwrap();
/// registry.update(doc);
///
/// assert!(registry.has_data());
/// assert_eq!(registry.get("1234567890").unwrap().dmx_uid().as_str(), "1234:567890");
/// assert_eq!(registry.relay_state("1234567890"), Some(false));
/// ```
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    state: RwLock<RegistryState>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the breaker readings with a freshly decoded document.
    ///
    /// Discovered DMX addresses survive for breakers still present. Breakers
    /// absent from the document are dropped. When a UID appears twice only
    /// the first reading is kept.
    pub fn update(&self, document: TelemetryDocument) {
        let mut state = self.state.write();
        let mut previous = std::mem::take(&mut state.entries);
        let mut order = Vec::with_capacity(document.len());
        let mut entries = HashMap::with_capacity(document.len());

        for demand in document.iter() {
            if entries.contains_key(&demand.uid) {
                tracing::warn!(uid = %demand.uid, "Duplicate breaker UID in snapshot, keeping first");
                continue;
            }
            let mut entry = BreakerEntry::new(demand.clone());
            entry.dmx_address = previous.remove(&demand.uid).and_then(|e| e.dmx_address);
            order.push(demand.uid.clone());
            entries.insert(demand.uid.clone(), entry);
        }

        tracing::debug!(breakers = order.len(), "Registry updated");

        state.order = order;
        state.entries = entries;
        state.document = Some(document);
        state.last_success = Some((Instant::now(), Utc::now()));
        state.consecutive_failures = 0;
    }

    /// Records a failed poll. Existing readings are kept.
    pub fn record_failure(&self) {
        let mut state = self.state.write();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
    }

    /// Returns `true` once a document has been decoded.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.state.read().document.is_some()
    }

    /// Returns `true` if no document was ever decoded or the last poll failed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        let state = self.state.read();
        state.document.is_none() || state.consecutive_failures > 0
    }

    /// Returns the number of polls that failed since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.state.read().consecutive_failures
    }

    /// Returns the wall-clock time of the last successful poll.
    #[must_use]
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_success.map(|(_, at)| at)
    }

    /// Returns the monotonic time of the last successful poll.
    #[must_use]
    pub fn last_success_instant(&self) -> Option<Instant> {
        self.state.read().last_success.map(|(at, _)| at)
    }

    /// Returns a copy of the last good document.
    #[must_use]
    pub fn document(&self) -> Option<TelemetryDocument> {
        self.state.read().document.clone()
    }

    /// Returns the entry for a breaker.
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<BreakerEntry> {
        self.state.read().entries.get(uid).cloned()
    }

    /// Returns `true` if the breaker is in the registry.
    #[must_use]
    pub fn contains(&self, uid: &str) -> bool {
        self.state.read().entries.contains_key(uid)
    }

    /// Returns every breaker in controller order.
    #[must_use]
    pub fn breakers(&self) -> Vec<BreakerEntry> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|uid| state.entries.get(uid).cloned())
            .collect()
    }

    /// Returns every UID in controller order.
    #[must_use]
    pub fn uids(&self) -> Vec<String> {
        self.state.read().order.clone()
    }

    /// Returns the number of breakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().order.len()
    }

    /// Returns `true` if the registry holds no breaker.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().order.is_empty()
    }

    /// Returns the display name of a breaker.
    #[must_use]
    pub fn name(&self, uid: &str) -> Option<String> {
        self.state
            .read()
            .entries
            .get(uid)
            .map(|entry| entry.name().to_string())
    }

    /// Returns the confirmed relay state of a breaker.
    #[must_use]
    pub fn relay_state(&self, uid: &str) -> Option<bool> {
        self.state
            .read()
            .entries
            .get(uid)
            .and_then(BreakerEntry::relay_state)
    }

    /// Returns `true` if the breaker is listed with a relay state.
    #[must_use]
    pub fn is_available(&self, uid: &str) -> bool {
        self.state
            .read()
            .entries
            .get(uid)
            .is_some_and(BreakerEntry::is_available)
    }

    /// Returns the DMX address of a breaker, if discovered.
    #[must_use]
    pub fn address(&self, uid: &str) -> Option<DmxAddress> {
        self.state
            .read()
            .entries
            .get(uid)
            .and_then(BreakerEntry::dmx_address)
    }

    /// Stores a discovered DMX address. Returns `false` for an unknown UID.
    pub fn set_address(&self, uid: &str, address: DmxAddress) -> bool {
        match self.state.write().entries.get_mut(uid) {
            Some(entry) => {
                entry.dmx_address = Some(address);
                true
            }
            None => false,
        }
    }

    /// Returns the discovered address of every breaker that has one.
    #[must_use]
    pub fn addresses(&self) -> BTreeMap<String, DmxAddress> {
        self.state
            .read()
            .entries
            .iter()
            .filter_map(|(uid, entry)| entry.dmx_address.map(|a| (uid.clone(), a)))
            .collect()
    }
}
