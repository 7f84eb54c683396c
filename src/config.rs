// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration configuration.
//!
//! [`SavantConfig`] gathers every tunable of the integration in one
//! serde-deserializable struct. Only `address` is required; every other field
//! has a default. Per-component configurations are derived from it.
//!
//! # Examples
//!
//! ```
//! use savant_energy::config::SavantConfig;
//!
//! let config = SavantConfig::from_json_str(r#"{
//!     "address": "192.168.1.108",
//!     "switch_cooldown_secs": 10,
//!     "framing": { "kind": "second_marker" }
//! }"#).unwrap();
//!
//! assert_eq!(config.port, 2000);
//! assert_eq!(config.gateway_config().base_url(), "http://192.168.1.108:9090");
//! assert_eq!(config.controller_settings().reconcile_window().as_secs(), 10);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controller::ControllerSettings;
use crate::dmx::UnknownBreakerPolicy;
use crate::error::ConfigError;
use crate::protocol::{GatewayConfig, SnapshotConfig};
use crate::telemetry::Framing;

const fn default_port() -> u16 {
    SnapshotConfig::DEFAULT_PORT
}

const fn default_scan_interval() -> u64 {
    15
}

const fn default_read_timeout() -> u64 {
    10
}

const fn default_max_snapshot_bytes() -> usize {
    SnapshotConfig::DEFAULT_MAX_BYTES
}

const fn default_ola_port() -> u16 {
    GatewayConfig::DEFAULT_PORT
}

const fn default_universe() -> u16 {
    GatewayConfig::DEFAULT_UNIVERSE
}

const fn default_request_timeout() -> u64 {
    10
}

const fn default_cooldown() -> u64 {
    ControllerSettings::DEFAULT_COOLDOWN.as_secs()
}

const fn default_address_ttl() -> u64 {
    3600
}

const fn default_liveness() -> u64 {
    30
}

/// Settings for one energy controller and its relay bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavantConfig {
    /// Host of the energy controller.
    pub address: String,

    /// Telemetry socket port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between polls.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Seconds allowed for one snapshot read.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Upper bound on bytes read per snapshot.
    #[serde(default = "default_max_snapshot_bytes")]
    pub max_snapshot_bytes: usize,

    /// Snapshot framing rule.
    #[serde(default)]
    pub framing: Framing,

    /// Host of the OLA gateway. Defaults to `address`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_address: Option<String>,

    /// OLA HTTP port.
    #[serde(default = "default_ola_port")]
    pub ola_port: u16,

    /// Universe searched for RDM address discovery. Frames are always
    /// written to universe 1.
    #[serde(default = "default_universe")]
    pub universe: u16,

    /// Seconds allowed for one gateway request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Minimum seconds between two frame writes.
    #[serde(default = "default_cooldown")]
    pub switch_cooldown_secs: u64,

    /// Seconds after a command during which telemetry cannot override it.
    /// Defaults to the cooldown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconcile_window_secs: Option<u64>,

    /// Seconds a discovered DMX address is trusted.
    #[serde(default = "default_address_ttl")]
    pub address_cache_ttl_secs: u64,

    /// Seconds after a gateway success during which it counts as reachable.
    #[serde(default = "default_liveness")]
    pub api_liveness_secs: u64,

    /// Log frame writes instead of sending them.
    #[serde(default)]
    pub dmx_testing_mode: bool,

    /// State assumed for breakers without a known status.
    #[serde(default)]
    pub unknown_breaker_policy: UnknownBreakerPolicy,
}

impl SavantConfig {
    /// Creates a configuration with defaults for the controller at `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: default_port(),
            scan_interval_secs: default_scan_interval(),
            read_timeout_secs: default_read_timeout(),
            max_snapshot_bytes: default_max_snapshot_bytes(),
            framing: Framing::default(),
            gateway_address: None,
            ola_port: default_ola_port(),
            universe: default_universe(),
            request_timeout_secs: default_request_timeout(),
            switch_cooldown_secs: default_cooldown(),
            reconcile_window_secs: None,
            address_cache_ttl_secs: default_address_ttl(),
            api_liveness_secs: default_liveness(),
            dmx_testing_mode: false,
            unknown_breaker_policy: UnknownBreakerPolicy::default(),
        }
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON or a missing
    /// `address`, and `ConfigError::InvalidValue` if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Checks every field for a usable value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(invalid("address", "must not be empty"));
        }
        if self.port == 0 {
            return Err(invalid("port", "must not be 0"));
        }
        if self.ola_port == 0 {
            return Err(invalid("ola_port", "must not be 0"));
        }
        if self.universe == 0 {
            return Err(invalid("universe", "must be at least 1"));
        }
        if self.scan_interval_secs == 0 {
            return Err(invalid("scan_interval_secs", "must be at least 1"));
        }
        if self.read_timeout_secs == 0 {
            return Err(invalid("read_timeout_secs", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be at least 1"));
        }
        if self.max_snapshot_bytes == 0 {
            return Err(invalid("max_snapshot_bytes", "must be at least 1"));
        }
        if self.framing == Framing::NewlineCount(0) {
            return Err(invalid("framing", "newline count must be at least 1"));
        }
        if self
            .gateway_address
            .as_deref()
            .is_some_and(|host| host.trim().is_empty())
        {
            return Err(invalid("gateway_address", "must not be empty"));
        }
        Ok(())
    }

    // ========================================================================
    // Builders
    // ========================================================================

    /// Sets the telemetry port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the gateway host.
    #[must_use]
    pub fn with_gateway_address(mut self, host: impl Into<String>) -> Self {
        self.gateway_address = Some(host.into());
        self
    }

    /// Sets the OLA port.
    #[must_use]
    pub fn with_ola_port(mut self, port: u16) -> Self {
        self.ola_port = port;
        self
    }

    /// Sets the snapshot framing rule.
    #[must_use]
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Sets the global switch cooldown in seconds.
    #[must_use]
    pub fn with_switch_cooldown_secs(mut self, secs: u64) -> Self {
        self.switch_cooldown_secs = secs;
        self
    }

    /// Sets the reconcile window in seconds.
    #[must_use]
    pub fn with_reconcile_window_secs(mut self, secs: u64) -> Self {
        self.reconcile_window_secs = Some(secs);
        self
    }

    /// Enables or disables dry-run frame writes.
    #[must_use]
    pub fn with_dmx_testing_mode(mut self, enabled: bool) -> Self {
        self.dmx_testing_mode = enabled;
        self
    }

    /// Sets the unknown-breaker policy.
    #[must_use]
    pub fn with_unknown_breaker_policy(mut self, policy: UnknownBreakerPolicy) -> Self {
        self.unknown_breaker_policy = policy;
        self
    }

    // ========================================================================
    // Derived settings
    // ========================================================================

    /// Returns the gateway host.
    #[must_use]
    pub fn gateway_host(&self) -> &str {
        self.gateway_address.as_deref().unwrap_or(&self.address)
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Returns how long a discovered address is trusted.
    #[must_use]
    pub fn address_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.address_cache_ttl_secs)
    }

    /// Returns the gateway liveness window.
    #[must_use]
    pub fn api_liveness(&self) -> Duration {
        Duration::from_secs(self.api_liveness_secs)
    }

    /// Builds the telemetry socket configuration.
    #[must_use]
    pub fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig::new(self.address.clone())
            .with_port(self.port)
            .with_timeout(Duration::from_secs(self.read_timeout_secs))
            .with_max_bytes(self.max_snapshot_bytes)
            .with_framing(self.framing)
    }

    /// Builds the gateway configuration.
    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new(self.gateway_host())
            .with_port(self.ola_port)
            .with_universe(self.universe)
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    /// Builds the controller settings.
    #[must_use]
    pub fn controller_settings(&self) -> ControllerSettings {
        let settings = ControllerSettings::new()
            .with_cooldown(Duration::from_secs(self.switch_cooldown_secs))
            .with_unknown_breaker_policy(self.unknown_breaker_policy);
        match self.reconcile_window_secs {
            Some(secs) => settings.with_reconcile_window(Duration::from_secs(secs)),
            None => settings,
        }
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        message: message.to_string(),
    }
}
