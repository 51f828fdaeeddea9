// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The single owner of "what the board currently shows".
//!
//! Poll results, optimistic applies, rollbacks and reconciliations all write
//! through this store. Nothing else keeps a private copy of the list.

use crate::diff::{diff, ChangeDescriptor, ChangeSet};
use crate::model::{Player, PlayerId};
use crate::snapshot::Snapshot;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

/// Default time change descriptors stay visible after a refresh.
pub const DEFAULT_HIGHLIGHT_WINDOW: Duration = Duration::from_secs(2);

/// Store handle shared between the poller and the mutation manager.
pub type SharedStore = Arc<Mutex<SnapshotStore>>;

/// Wrap a store for sharing.
pub fn shared(store: SnapshotStore) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Lock a shared store, recovering from poisoning.
///
/// Callers must drop the guard before awaiting.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, SnapshotStore> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}

/// Current and previous snapshot plus the last change set.
#[derive(Debug)]
pub struct SnapshotStore {
    current: Snapshot,
    previous: Snapshot,
    changes: ChangeSet,
    changed_at: Option<Instant>,
    highlight_window: Duration,
    version: u64,
    refresh_epoch: u64,
    last_refreshed: Option<SystemTime>,
    closed: bool,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_WINDOW)
    }
}

impl SnapshotStore {
    /// Empty store with the given highlight window.
    pub fn new(highlight_window: Duration) -> Self {
        Self {
            current: Snapshot::default(),
            previous: Snapshot::default(),
            changes: ChangeSet::new(),
            changed_at: None,
            highlight_window,
            version: 0,
            refresh_epoch: 0,
            last_refreshed: None,
            closed: false,
        }
    }

    /// What the board renders right now.
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// The snapshot `current` replaced on the last refresh.
    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    /// Bumped by every accepted write.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Bumped only by [`replace`](Self::replace).
    pub fn refresh_epoch(&self) -> u64 {
        self.refresh_epoch
    }

    /// Wall-clock time of the last authoritative refresh.
    pub fn last_refreshed(&self) -> Option<SystemTime> {
        self.last_refreshed
    }

    /// Install an authoritative snapshot, returning the change set against the old one.
    pub fn replace(&mut self, next: Snapshot) -> ChangeSet {
        if self.closed {
            debug!("store closed; dropping refreshed snapshot");
            return ChangeSet::new();
        }
        let changes = diff(&self.current, &next);
        self.previous = std::mem::replace(&mut self.current, next);
        self.changes = changes.clone();
        self.changed_at = Some(Instant::now());
        self.version += 1;
        self.refresh_epoch += 1;
        self.last_refreshed = Some(SystemTime::now());
        info!(
            players = self.current.len(),
            changed = changes.values().filter(|d| d.any()).count(),
            version = self.version,
            "snapshot replaced"
        );
        changes
    }

    /// The last change set while `now` is inside the highlight window.
    pub fn visible_changes(&self, now: Instant) -> Option<&ChangeSet> {
        let at = self.changed_at?;
        (now.saturating_duration_since(at) < self.highlight_window).then_some(&self.changes)
    }

    /// Descriptor for one player at `now`; all-false outside the highlight window.
    pub fn change_for(&self, id: &PlayerId, now: Instant) -> ChangeDescriptor {
        self.visible_changes(now)
            .and_then(|c| c.get(id).copied())
            .unwrap_or_default()
    }

    /// Detach the store. Later writes are ignored.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// True once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Edit one player in place.
    pub fn edit<R>(&mut self, id: &PlayerId, f: impl FnOnce(&mut Player) -> R) -> Option<R> {
        if self.closed {
            debug!(%id, "store closed; ignoring edit");
            return None;
        }
        let out = self.current.get_mut(id).map(f)?;
        self.version += 1;
        Some(out)
    }

    /// Append a player unless its id is already present.
    pub fn insert(&mut self, player: Player) -> bool {
        self.bump_if(|snap| snap.push(player))
    }

    /// Insert a player at `index` (clamped) unless its id is already present.
    pub fn insert_at(&mut self, index: usize, player: Player) -> bool {
        self.bump_if(|snap| snap.insert_at(index, player))
    }

    /// Remove a player, returning its former position and record.
    pub fn remove(&mut self, id: &PlayerId) -> Option<(usize, Player)> {
        if self.closed {
            debug!(%id, "store closed; ignoring remove");
            return None;
        }
        let out = self.current.remove(id)?;
        self.version += 1;
        Some(out)
    }

    /// Replace the record keyed by `id` with `next`, keeping its position.
    pub fn swap(&mut self, id: &PlayerId, next: Player) -> bool {
        self.bump_if(|snap| snap.replace_at(id, next))
    }

    fn bump_if(&mut self, f: impl FnOnce(&mut Snapshot) -> bool) -> bool {
        if self.closed {
            debug!("store closed; ignoring write");
            return false;
        }
        let applied = f(&mut self.current);
        if applied {
            self.version += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn player(id: &str, balance: f64) -> Player {
        Player {
            id: PlayerId::server(id).unwrap(),
            name: id.into(),
            balance,
            wins: 0,
            losses: 0,
        }
    }

    #[test]
    fn replace_rotates_current_into_previous() {
        let mut store = SnapshotStore::default();
        let first = Snapshot::ranked(vec![player("a", 1.0)]).unwrap();
        let second = Snapshot::ranked(vec![player("a", 2.0)]).unwrap();
        store.replace(first.clone());
        let changes = store.replace(second.clone());
        assert_eq!(store.previous(), &first);
        assert_eq!(store.current(), &second);
        assert!(changes[&PlayerId::server("a").unwrap()].balance_changed);
        assert_eq!(store.refresh_epoch(), 2);
        assert!(store.last_refreshed().is_some());
    }

    #[test]
    fn changes_expire_after_highlight_window() {
        let mut store = SnapshotStore::new(Duration::from_secs(2));
        store.replace(Snapshot::ranked(vec![player("a", 1.0)]).unwrap());
        let id = PlayerId::server("a").unwrap();
        let now = Instant::now();
        assert!(store.change_for(&id, now).appeared);
        let later = now + Duration::from_secs(3);
        assert!(store.visible_changes(later).is_none());
        assert_eq!(store.change_for(&id, later), ChangeDescriptor::default());
    }

    #[test]
    fn writes_bump_version_but_not_refresh_epoch() {
        let mut store = SnapshotStore::default();
        store.replace(Snapshot::ranked(vec![player("a", 1.0)]).unwrap());
        let id = PlayerId::server("a").unwrap();
        let v = store.version();
        store.edit(&id, |p| p.balance = 4.0).unwrap();
        assert_eq!(store.version(), v + 1);
        assert_eq!(store.refresh_epoch(), 1);
        assert!(store.edit(&PlayerId::server("nobody").unwrap(), |_| ()).is_none());
        assert_eq!(store.version(), v + 1);
    }

    #[test]
    fn closed_store_ignores_every_write() {
        let mut store = SnapshotStore::default();
        store.replace(Snapshot::ranked(vec![player("a", 1.0)]).unwrap());
        store.close();
        let before = store.current().clone();
        assert!(store.replace(Snapshot::default()).is_empty());
        assert!(!store.insert(player("b", 0.0)));
        assert!(store.remove(&PlayerId::server("a").unwrap()).is_none());
        assert_eq!(store.current(), &before);
    }
}
