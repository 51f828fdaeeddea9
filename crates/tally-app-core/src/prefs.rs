// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved preferences for the leaderboard board (endpoint, cadence, rollback policy).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Config key under which [`BoardPrefs`] are stored.
pub const BOARD_PREFS_KEY: &str = "board";

/// Floor for the poll interval; smaller stored values are raised to it.
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;

/// Floor for retry delays after a failed fetch.
pub const MIN_RETRY_MS: u64 = 100;

/// How a failed mutation's rollback interacts with a poll that landed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Rollbacks always apply; the last callback to run wins.
    #[default]
    LastWriterWins,
    /// Rollbacks are skipped when an authoritative refresh landed after the optimistic apply.
    VersionGuarded,
}

/// Board preferences persisted through the config service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardPrefs {
    /// Base URL of the leaderboard service.
    pub endpoint: String,
    /// Admin bearer token for mutating calls.
    pub admin_token: Option<String>,
    /// Regular poll interval (milliseconds).
    pub poll_interval_ms: u64,
    /// How long change descriptors stay visible after a refresh (milliseconds).
    pub highlight_window_ms: u64,
    /// First retry delay after a failed fetch (milliseconds).
    pub retry_initial_ms: u64,
    /// Upper bound for the retry delay (milliseconds).
    pub retry_max_ms: u64,
    /// Rollback policy for failed mutations.
    pub rollback_policy: RollbackPolicy,
}

impl Default for BoardPrefs {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000".into(),
            admin_token: None,
            poll_interval_ms: 30_000,
            highlight_window_ms: 2_000,
            retry_initial_ms: 1_000,
            retry_max_ms: 30_000,
            rollback_policy: RollbackPolicy::LastWriterWins,
        }
    }
}

impl BoardPrefs {
    /// Poll interval as a `Duration`, never below [`MIN_POLL_INTERVAL_MS`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    /// Highlight window as a `Duration`.
    pub fn highlight_window(&self) -> Duration {
        Duration::from_millis(self.highlight_window_ms)
    }

    /// Retry bounds `(initial, max)`; `max` never exceeds the poll interval
    /// and neither drops below [`MIN_RETRY_MS`].
    pub fn retry_bounds(&self) -> (Duration, Duration) {
        let interval = self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS);
        let max = self.retry_max_ms.min(interval).max(MIN_RETRY_MS);
        let initial = self.retry_initial_ms.clamp(MIN_RETRY_MS, max);
        (Duration::from_millis(initial), Duration::from_millis(max))
    }
}
