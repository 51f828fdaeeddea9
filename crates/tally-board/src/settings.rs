// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Preference loading: stored values, first-run defaults, per-invocation overrides.

use tally_app_core::config::{ConfigError, ConfigService, ConfigStore};
use tally_app_core::prefs::{BoardPrefs, RollbackPolicy, BOARD_PREFS_KEY};
use tracing::{info, warn};

/// Values given on the command line; `None` keeps the stored preference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub rollback_policy: Option<RollbackPolicy>,
}

impl Overrides {
    pub fn apply(&self, mut prefs: BoardPrefs) -> BoardPrefs {
        if let Some(endpoint) = &self.endpoint {
            prefs.endpoint.clone_from(endpoint);
        }
        if let Some(token) = &self.token {
            prefs.admin_token = Some(token.clone());
        }
        if let Some(ms) = self.poll_interval_ms {
            prefs.poll_interval_ms = ms;
        }
        if let Some(policy) = self.rollback_policy {
            prefs.rollback_policy = policy;
        }
        prefs
    }
}

/// Stored prefs (defaults persisted on first run), or defaults when config is unavailable.
pub fn load<S: ConfigStore>(config: Option<&ConfigService<S>>) -> BoardPrefs {
    let Some(config) = config else {
        return BoardPrefs::default();
    };
    match config.load_or_init::<BoardPrefs>(BOARD_PREFS_KEY) {
        Ok((prefs, created)) => {
            if created {
                info!("wrote default board preferences");
            }
            prefs
        }
        Err(err) => {
            warn!(%err, "could not load board preferences; using defaults");
            BoardPrefs::default()
        }
    }
}

/// Persist a new admin token on top of whatever is stored.
pub fn store_token<S: ConfigStore>(config: &ConfigService<S>, token: &str) -> Result<(), ConfigError> {
    let mut prefs = config.load::<BoardPrefs>(BOARD_PREFS_KEY)?.unwrap_or_default();
    prefs.admin_token = Some(token.to_string());
    config.save(BOARD_PREFS_KEY, &prefs)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use tally_dry_tests::InMemoryConfigStore;

    #[test]
    fn first_run_persists_defaults() {
        let store = InMemoryConfigStore::new();
        let config = ConfigService::new(store.clone());
        assert_eq!(load(Some(&config)), BoardPrefs::default());
        assert!(store.contains_key(BOARD_PREFS_KEY));
    }

    #[test]
    fn unreadable_config_falls_back_to_defaults() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_load(true);
        let config = ConfigService::new(store);
        assert_eq!(load(Some(&config)), BoardPrefs::default());
        assert_eq!(load::<InMemoryConfigStore>(None), BoardPrefs::default());
    }

    #[test]
    fn overrides_win_over_stored_values() {
        let overrides = Overrides {
            endpoint: Some("http://board.test".into()),
            poll_interval_ms: Some(5_000),
            rollback_policy: Some(RollbackPolicy::VersionGuarded),
            ..Overrides::default()
        };
        let prefs = overrides.apply(BoardPrefs::default());
        assert_eq!(prefs.endpoint, "http://board.test");
        assert_eq!(prefs.poll_interval_ms, 5_000);
        assert_eq!(prefs.rollback_policy, RollbackPolicy::VersionGuarded);
        assert_eq!(prefs.admin_token, None);
    }

    #[test]
    fn login_keeps_other_preferences() {
        let store = InMemoryConfigStore::new();
        let config = ConfigService::new(store);
        let custom = BoardPrefs {
            poll_interval_ms: 1_234,
            ..BoardPrefs::default()
        };
        config.save(BOARD_PREFS_KEY, &custom).unwrap();

        store_token(&config, "hunter2").unwrap();

        let saved: BoardPrefs = config.load(BOARD_PREFS_KEY).unwrap().unwrap();
        assert_eq!(saved.poll_interval_ms, 1_234);
        assert_eq!(saved.admin_token.as_deref(), Some("hunter2"));
    }
}
