// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gateway call statistics.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Window after a success during which the gateway counts as reachable.
pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(30);

/// Process-wide counters for gateway calls.
///
/// Counters only grow; they reset when the process restarts. One instance is
/// shared by every component that talks to the gateway.
#[derive(Debug, Default)]
pub struct DmxApiStats {
    inner: Mutex<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    request_count: u64,
    failure_count: u64,
    last_success: Option<(Instant, DateTime<Utc>)>,
}

/// Point-in-time copy of [`DmxApiStats`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiStatsSnapshot {
    /// Calls attempted.
    pub request_count: u64,
    /// Calls that failed.
    pub failure_count: u64,
    /// Wall-clock time of the most recent success.
    pub last_successful_call: Option<DateTime<Utc>>,
    /// `(requests - failures) / requests * 100`, or 100 before any request.
    pub success_rate: f64,
}

impl DmxApiStats {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a call about to be attempted.
    pub fn record_request(&self) {
        self.inner.lock().request_count += 1;
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        self.inner.lock().last_success = Some((Instant::now(), Utc::now()));
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        self.inner.lock().failure_count += 1;
    }

    /// Returns a copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> ApiStatsSnapshot {
        let inner = self.inner.lock();
        ApiStatsSnapshot {
            request_count: inner.request_count,
            failure_count: inner.failure_count,
            last_successful_call: inner.last_success.map(|(_, at)| at),
            success_rate: success_rate(inner.request_count, inner.failure_count),
        }
    }

    /// Heuristic liveness signal for diagnostics.
    ///
    /// `true` if no call has succeeded yet, or the last success is younger
    /// than `window`. This never blocks further attempts.
    #[must_use]
    pub fn is_api_available(&self, window: Duration) -> bool {
        match self.inner.lock().last_success {
            None => true,
            Some((at, _)) => at.elapsed() < window,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn success_rate(requests: u64, failures: u64) -> f64 {
    if requests == 0 {
        return 100.0;
    }
    (requests.saturating_sub(failures)) as f64 / requests as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stats_are_optimistic() {
        let stats = DmxApiStats::new();
        let snap = stats.snapshot();
        assert_eq!(snap.request_count, 0);
        assert_eq!(snap.failure_count, 0);
        assert!(snap.last_successful_call.is_none());
        assert!((snap.success_rate - 100.0).abs() < f64::EPSILON);
        assert!(stats.is_api_available(Duration::from_secs(30)));
    }

    #[test]
    fn success_rate_tracks_failures() {
        let stats = DmxApiStats::new();
        for _ in 0..4 {
            stats.record_request();
        }
        stats.record_failure();
        stats.record_success();

        let snap = stats.snapshot();
        assert_eq!(snap.request_count, 4);
        assert_eq!(snap.failure_count, 1);
        assert!((snap.success_rate - 75.0).abs() < f64::EPSILON);
        assert!(snap.last_successful_call.is_some());
    }

    #[test]
    fn liveness_expires_after_window() {
        let stats = DmxApiStats::new();
        stats.record_request();
        stats.record_success();
        assert!(stats.is_api_available(Duration::from_secs(30)));
        assert!(!stats.is_api_available(Duration::ZERO));
    }
}
