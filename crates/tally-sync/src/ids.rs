// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Temp id allocation and reconciliation of provisional players with their
//! server-confirmed records.

use crate::model::{Player, PlayerId, TempId};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Session-scoped temp id counter.
///
/// Create one per client session and inject it; clones share the counter.
/// Ids are never reused, even after the provisional entry they named is gone.
#[derive(Debug, Clone, Default)]
pub struct TempIdAllocator {
    next: Arc<AtomicU64>,
}

impl TempIdAllocator {
    /// Fresh counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next temp id.
    pub fn allocate(&self) -> TempId {
        TempId::from_counter(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// The provisional entry now carries the server record at the same position.
    Replaced {
        /// Confirmed id.
        id: PlayerId,
        /// Position the entry kept.
        position: usize,
    },
    /// A refresh already delivered the server record; the provisional duplicate was dropped.
    Merged {
        /// Confirmed id.
        id: PlayerId,
    },
    /// No provisional entry was left to reconcile (deleted or refreshed away).
    Missing,
    /// The server record was unusable as a confirmation.
    Rejected,
}

/// Swap the provisional entry keyed by `temp` for `confirmed`, keeping its position.
pub fn reconcile(store: &mut SnapshotStore, temp: TempId, confirmed: Player) -> Reconciled {
    let temp_id = PlayerId::Temp(temp);
    if confirmed.id.is_temp() {
        warn!(%temp_id, returned = %confirmed.id, "server confirmed a create with a temp id");
        return Reconciled::Rejected;
    }
    let Some(position) = store.current().position(&temp_id) else {
        debug!(%temp_id, "provisional player gone before confirmation");
        return Reconciled::Missing;
    };
    let id = confirmed.id.clone();
    if store.current().contains(&id) {
        store.remove(&temp_id);
        info!(%temp_id, %id, "confirmed player already present; dropped provisional entry");
        return Reconciled::Merged { id };
    }
    if store.swap(&temp_id, confirmed) {
        info!(%temp_id, %id, position, "provisional player reconciled");
        Reconciled::Replaced { id, position }
    } else {
        Reconciled::Missing
    }
}

/// Find the record a create produced inside a full roster response, by name.
///
/// Only records not already visible under a server id are candidates. When
/// several match (two creates with the same name in flight) the first is
/// returned and the ambiguity is logged; it may be the other create's record.
pub fn locate_created<'a>(roster: &'a [Player], name: &str, live: &Snapshot) -> Option<&'a Player> {
    let mut candidates = roster
        .iter()
        .filter(|p| p.name == name && !p.id.is_temp() && !live.contains(&p.id));
    let first = candidates.next()?;
    let others = candidates.count();
    if others > 0 {
        warn!(player = name, matches = others + 1, "ambiguous create confirmation; picking first match");
    }
    Some(first)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn server(id: &str, name: &str, balance: f64) -> Player {
        Player {
            id: PlayerId::server(id).unwrap(),
            name: name.into(),
            balance,
            wins: 0,
            losses: 0,
        }
    }

    #[test]
    fn allocator_is_monotonic_and_shared_across_clones() {
        let ids = TempIdAllocator::new();
        let clone = ids.clone();
        assert_eq!(ids.allocate().counter(), 0);
        assert_eq!(clone.allocate().counter(), 1);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn separate_sessions_do_not_share_counters() {
        let a = TempIdAllocator::new();
        let b = TempIdAllocator::new();
        a.allocate();
        assert_eq!(b.allocate().counter(), 0);
    }

    #[test]
    fn reconcile_keeps_position() {
        let ids = TempIdAllocator::new();
        let temp = ids.allocate();
        let mut store = SnapshotStore::default();
        store.insert(server("a", "A", 5.0));
        store.insert(Player::provisional(temp, "Alice"));
        store.insert(server("b", "B", 1.0));

        let out = reconcile(&mut store, temp, server("srv-9", "Alice", 10.0));
        assert_eq!(
            out,
            Reconciled::Replaced {
                id: PlayerId::server("srv-9").unwrap(),
                position: 1
            }
        );
        assert!(!store.current().contains(&PlayerId::Temp(temp)));
        assert_eq!(store.current().players()[1].balance, 10.0);
    }

    #[test]
    fn reconcile_without_target_is_a_no_op() {
        let mut store = SnapshotStore::default();
        store.insert(server("a", "A", 5.0));
        let before = store.current().clone();
        let temp = TempIdAllocator::new().allocate();
        assert_eq!(reconcile(&mut store, temp, server("srv-1", "X", 0.0)), Reconciled::Missing);
        assert_eq!(store.current(), &before);
    }

    #[test]
    fn reconcile_drops_provisional_when_refresh_won() {
        let temp = TempIdAllocator::new().allocate();
        let mut store = SnapshotStore::default();
        store.insert(Player::provisional(temp, "Alice"));
        store.insert(server("srv-9", "Alice", 10.0));
        let out = reconcile(&mut store, temp, server("srv-9", "Alice", 10.0));
        assert!(matches!(out, Reconciled::Merged { .. }));
        assert_eq!(store.current().len(), 1);
    }

    #[test]
    fn roster_lookup_skips_players_already_visible() {
        let mut live = SnapshotStore::default();
        live.insert(server("old", "Alice", 3.0));
        let roster = vec![server("old", "Alice", 3.0), server("new", "Alice", 10.0), server("x", "Bob", 1.0)];
        let found = locate_created(&roster, "Alice", live.current()).unwrap();
        assert_eq!(found.id, PlayerId::server("new").unwrap());
        assert!(locate_created(&roster, "Carol", live.current()).is_none());
    }
}
