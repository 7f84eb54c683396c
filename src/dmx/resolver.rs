// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DMX address discovery with a time-based cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::ResolutionError;
use crate::protocol::GatewayClient;
use crate::types::{DmxAddress, DmxUid};

/// How long a resolved address is trusted.
pub const DEFAULT_ADDRESS_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    address: DmxAddress,
    fetched_at: Instant,
}

/// Resolves RDM UIDs to DMX addresses through the gateway.
///
/// Successful lookups are cached for the TTL. Failures are never cached; the
/// next call asks the gateway again. A relay re-addressed on the lighting
/// network is only picked up once its entry expires.
#[derive(Debug)]
pub struct DmxAddressResolver {
    gateway: GatewayClient,
    ttl: Duration,
    cache: Mutex<HashMap<DmxUid, CacheEntry>>,
}

impl DmxAddressResolver {
    /// Creates a resolver with the default TTL.
    #[must_use]
    pub fn new(gateway: GatewayClient) -> Self {
        Self::with_ttl(gateway, DEFAULT_ADDRESS_TTL)
    }

    /// Creates a resolver with a custom TTL.
    #[must_use]
    pub fn with_ttl(gateway: GatewayClient, ttl: Duration) -> Self {
        Self {
            gateway,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached address if it has not expired.
    #[must_use]
    pub fn cached(&self, dmx_uid: &DmxUid) -> Option<DmxAddress> {
        self.cache
            .lock()
            .get(dmx_uid)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.address)
    }

    /// Resolves an address, returning `None` when it cannot be determined.
    ///
    /// Failures are logged at warn level and never propagated.
    pub async fn resolve(&self, dmx_uid: &DmxUid) -> Option<DmxAddress> {
        match self.try_resolve(dmx_uid).await {
            Ok(address) => Some(address),
            Err(err) => {
                tracing::warn!(dmx_uid = %dmx_uid, error = %err, "Failed to resolve DMX address");
                None
            }
        }
    }

    /// Resolves an address, returning the failure cause.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError` if the gateway lookup fails.
    pub async fn try_resolve(&self, dmx_uid: &DmxUid) -> Result<DmxAddress, ResolutionError> {
        if let Some(address) = self.cached(dmx_uid) {
            tracing::debug!(dmx_uid = %dmx_uid, address = %address, "Using cached DMX address");
            return Ok(address);
        }

        let address = self.gateway.uid_info(dmx_uid).await?;
        self.cache.lock().insert(
            dmx_uid.clone(),
            CacheEntry {
                address,
                fetched_at: Instant::now(),
            },
        );

        tracing::info!(dmx_uid = %dmx_uid, address = %address, "Resolved DMX address");
        Ok(address)
    }

    /// Returns the number of cache entries, expired ones included.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }
}
