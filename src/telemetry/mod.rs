// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Energy controller telemetry.
//!
//! The controller publishes a snapshot of every breaker it manages as a
//! base64-encoded JSON document behind a `SET_ENERGY=` marker on a raw TCP
//! socket. This module holds the decoded document types and the framing
//! logic that turns raw socket bytes into a [`TelemetryDocument`].
//!
//! # Examples
//!
//! ```
//! use savant_energy::telemetry::{decode_snapshot, Framing};
//!
//! // base64 of {"presentDemands":[]}
//! let raw = b"\nSET_ENERGY=eyJwcmVzZW50RGVtYW5kcyI6W119\n";
//! let doc = decode_snapshot(raw, &Framing::default()).unwrap();
//! assert!(doc.is_empty());
//! ```

mod framing;

pub use framing::{ENERGY_MARKER, Framing, decode_snapshot, encode_snapshot};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::{BreakerModel, DmxUid};

/// Value of `percentCommanded` that means the relay is closed.
pub const RELAY_ON_PERCENT: u8 = 100;

/// A decoded controller snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryDocument {
    /// Per-breaker readings in controller order.
    #[serde(rename = "presentDemands")]
    pub present_demands: Vec<BreakerDemand>,
}

impl TelemetryDocument {
    /// Creates a document from breaker readings.
    #[must_use]
    pub fn new(present_demands: Vec<BreakerDemand>) -> Self {
        Self { present_demands }
    }

    /// Returns the breaker with the given controller UID.
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<&BreakerDemand> {
        self.present_demands.iter().find(|d| d.uid == uid)
    }

    /// Iterates over all breakers in controller order.
    pub fn iter(&self) -> impl Iterator<Item = &BreakerDemand> {
        self.present_demands.iter()
    }

    /// Returns the number of breakers in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.present_demands.len()
    }

    /// Returns `true` if the snapshot lists no breakers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present_demands.is_empty()
    }
}

/// Reading for a single breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerDemand {
    /// Controller-assigned identifier; stable across renames.
    pub uid: String,

    /// User-editable display label.
    #[serde(default)]
    pub name: String,

    /// Rated capacity in kW.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,

    /// Present power draw in kW (signed).
    #[serde(rename = "power", default, skip_serializing_if = "Option::is_none")]
    pub power_kw: Option<f64>,

    /// Line voltage in volts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,

    /// Commanded relay position in percent. Absent means unknown.
    ///
    /// Whole-number floats are accepted; any other value is read as unknown
    /// so one bad record does not reject the whole snapshot.
    #[serde(
        default,
        deserialize_with = "deserialize_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub percent_commanded: Option<u8>,
}

fn deserialize_percent<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| {
        let percent = percent_from_value(&value);
        if percent.is_none() && !value.is_null() {
            tracing::warn!(value = %value, "Ignoring unusable percentCommanded");
        }
        percent
    }))
}

fn percent_from_value(value: &Value) -> Option<u8> {
    if let Some(whole) = value.as_u64() {
        return u8::try_from(whole).ok();
    }
    let float = value.as_f64()?;
    if float.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&float) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(float as u8)
}

impl BreakerDemand {
    /// Returns the confirmed relay state, or `None` when the controller did
    /// not report one.
    ///
    /// The relay is closed only when exactly 100% is commanded.
    #[must_use]
    pub fn relay_state(&self) -> Option<bool> {
        self.percent_commanded.map(|p| p == RELAY_ON_PERCENT)
    }

    /// Returns `true` when the relay state is known.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.percent_commanded.is_some()
    }

    /// Returns the power draw in whole watts.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn power_watts(&self) -> Option<i64> {
        self.power_kw.map(|kw| (kw * 1000.0).round() as i64)
    }

    /// Returns the relay hardware model inferred from the capacity.
    #[must_use]
    pub fn model(&self) -> BreakerModel {
        self.capacity
            .map_or(BreakerModel::Unknown, BreakerModel::from_capacity)
    }

    /// Derives the DMX UID used for RDM address discovery.
    #[must_use]
    pub fn dmx_uid(&self) -> DmxUid {
        DmxUid::from_device_uid(&self.uid)
    }
}
