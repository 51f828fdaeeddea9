// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Snapshot diffing: per-player field changes and rank movement.

use crate::model::PlayerId;
use crate::snapshot::Snapshot;
use std::collections::{BTreeMap, HashMap};

/// What changed for one player between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeDescriptor {
    /// `balance` differs from the previous snapshot.
    pub balance_changed: bool,
    /// `wins` differs from the previous snapshot.
    pub wins_changed: bool,
    /// `losses` differs from the previous snapshot.
    pub losses_changed: bool,
    /// `old_index - new_index`; positive means the player moved up.
    pub rank_delta: i64,
    /// The player was absent from the previous snapshot.
    pub appeared: bool,
}

impl ChangeDescriptor {
    /// Descriptor for a player that was not in the previous snapshot.
    pub const fn appeared() -> Self {
        Self {
            balance_changed: true,
            wins_changed: true,
            losses_changed: true,
            rank_delta: 0,
            appeared: true,
        }
    }

    /// True when any field flag is set or the rank moved.
    pub const fn any(&self) -> bool {
        self.balance_changed || self.wins_changed || self.losses_changed || self.rank_delta != 0
    }

    /// Moved towards the top.
    pub const fn moved_up(&self) -> bool {
        self.rank_delta > 0
    }

    /// Moved towards the bottom.
    pub const fn moved_down(&self) -> bool {
        self.rank_delta < 0
    }
}

/// Change descriptors keyed by player id. Players that disappeared have no entry.
pub type ChangeSet = BTreeMap<PlayerId, ChangeDescriptor>;

/// Compare `old` against `new`.
///
/// Every player in `new` gets a descriptor; players only in `old` get none.
/// Field comparison is by value, so rewriting the same balance is not a change.
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangeSet {
    let old_index: HashMap<&PlayerId, usize> =
        old.iter().enumerate().map(|(i, p)| (&p.id, i)).collect();

    new.iter()
        .enumerate()
        .map(|(new_pos, player)| {
            let descriptor = match old_index.get(&player.id) {
                None => ChangeDescriptor::appeared(),
                Some(&old_pos) => {
                    let before = &old.players()[old_pos];
                    ChangeDescriptor {
                        balance_changed: before.balance != player.balance,
                        wins_changed: before.wins != player.wins,
                        losses_changed: before.losses != player.losses,
                        rank_delta: signed(old_pos) - signed(new_pos),
                        appeared: false,
                    }
                }
            };
            (player.id.clone(), descriptor)
        })
        .collect()
}

fn signed(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
