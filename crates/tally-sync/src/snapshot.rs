// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordered player lists.
//!
//! A fetched snapshot is ranked by descending balance with a stable sort, so
//! ties keep the order the server returned them in. Optimistic edits mutate
//! the live snapshot in place and do not re-rank; the next refresh does.

use crate::model::{Player, PlayerId};
use std::collections::HashSet;
use thiserror::Error;

/// Validation failures for an incoming player list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Two records shared an identifier.
    #[error("duplicate player id `{0}` in snapshot")]
    DuplicateId(PlayerId),
}

/// The full ordered player list at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    players: Vec<Player>,
}

impl Snapshot {
    /// Rank `players` by descending balance and validate id uniqueness.
    pub fn ranked(mut players: Vec<Player>) -> Result<Self, SnapshotError> {
        ensure_unique(&players)?;
        players.sort_by(|a, b| b.balance.total_cmp(&a.balance));
        Ok(Self { players })
    }

    /// Keep `players` in the given order, validating id uniqueness only.
    pub fn ordered(players: Vec<Player>) -> Result<Self, SnapshotError> {
        ensure_unique(&players)?;
        Ok(Self { players })
    }

    /// Players in display order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Iterate players in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, Player> {
        self.players.iter()
    }

    /// Number of players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// True when no players are present.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Display position of `id`.
    pub fn position(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    /// Look up a player by id.
    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// True when `id` is present.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.position(id).is_some()
    }

    pub(crate) fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    /// Appends unless the id is already present. Returns whether it was inserted.
    pub(crate) fn push(&mut self, player: Player) -> bool {
        if self.contains(&player.id) {
            return false;
        }
        self.players.push(player);
        true
    }

    /// Inserts at `index` (clamped to the end) unless the id is already present.
    pub(crate) fn insert_at(&mut self, index: usize, player: Player) -> bool {
        if self.contains(&player.id) {
            return false;
        }
        let index = index.min(self.players.len());
        self.players.insert(index, player);
        true
    }

    pub(crate) fn remove(&mut self, id: &PlayerId) -> Option<(usize, Player)> {
        let index = self.position(id)?;
        Some((index, self.players.remove(index)))
    }

    /// Replaces the record at `id`'s position with `next` (which may carry a new id).
    /// Refuses when `next.id` already names a different entry.
    pub(crate) fn replace_at(&mut self, id: &PlayerId, next: Player) -> bool {
        if &next.id != id && self.contains(&next.id) {
            return false;
        }
        match self.position(id) {
            Some(index) => {
                self.players[index] = next;
                true
            }
            None => false,
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Player;
    type IntoIter = std::slice::Iter<'a, Player>;

    fn into_iter(self) -> Self::IntoIter {
        self.players.iter()
    }
}

fn ensure_unique(players: &[Player]) -> Result<(), SnapshotError> {
    let mut seen = HashSet::with_capacity(players.len());
    for p in players {
        if !seen.insert(&p.id) {
            return Err(SnapshotError::DuplicateId(p.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn player(id: &str, balance: f64) -> Player {
        Player {
            id: PlayerId::server(id).unwrap(),
            name: id.to_uppercase(),
            balance,
            wins: 0,
            losses: 0,
        }
    }

    #[test]
    fn ranking_is_descending_and_stable_on_ties() {
        let snap = Snapshot::ranked(vec![
            player("a", 5.0),
            player("b", 20.0),
            player("c", 5.0),
            player("d", 7.5),
        ])
        .unwrap();
        let order: Vec<_> = snap.iter().map(|p| p.id.to_string()).collect();
        assert_eq!(order, ["b", "d", "a", "c"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = Snapshot::ranked(vec![player("a", 1.0), player("a", 2.0)]).unwrap_err();
        assert_eq!(err, SnapshotError::DuplicateId(PlayerId::server("a").unwrap()));
    }

    #[test]
    fn replace_at_keeps_position_and_refuses_collisions() {
        let mut snap = Snapshot::ordered(vec![player("a", 1.0), player("b", 2.0), player("c", 3.0)]).unwrap();
        assert!(snap.replace_at(&PlayerId::server("b").unwrap(), player("z", 9.0)));
        assert_eq!(snap.position(&PlayerId::server("z").unwrap()), Some(1));
        assert!(!snap.replace_at(&PlayerId::server("a").unwrap(), player("c", 0.0)));
    }

    #[test]
    fn insert_at_clamps_to_end() {
        let mut snap = Snapshot::ordered(vec![player("a", 1.0)]).unwrap();
        assert!(snap.insert_at(10, player("b", 0.0)));
        assert_eq!(snap.position(&PlayerId::server("b").unwrap()), Some(1));
        assert!(!snap.push(player("a", 4.0)));
    }
}
