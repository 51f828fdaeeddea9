// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Player and roster builders.

use tally_sync::{Player, PlayerId, Snapshot, SnapshotStore};

/// Server id from a literal. Panics on reserved or empty ids.
#[allow(clippy::expect_used)]
pub fn sid(raw: &str) -> PlayerId {
    PlayerId::server(raw).expect("fixture ids are valid server ids")
}

/// Confirmed player with zero counters.
pub fn player(id: &str, name: &str, balance: f64) -> Player {
    Player {
        id: sid(id),
        name: name.to_string(),
        balance,
        wins: 0,
        losses: 0,
    }
}

/// Confirmed player with counters.
pub fn player_with_stats(id: &str, name: &str, balance: f64, wins: u32, losses: u32) -> Player {
    Player {
        wins,
        losses,
        ..player(id, name, balance)
    }
}

/// Three players already in rank order: `a` (30), `b` (20), `c` (10).
pub fn sample_roster() -> Vec<Player> {
    vec![
        player_with_stats("a", "Ada", 30.0, 3, 1),
        player_with_stats("b", "Bo", 20.0, 2, 2),
        player_with_stats("c", "Cy", 10.0, 0, 4),
    ]
}

/// Store whose current snapshot is the ranked `players`.
#[allow(clippy::expect_used)]
pub fn store_with(players: Vec<Player>) -> SnapshotStore {
    let mut store = SnapshotStore::default();
    store.replace(Snapshot::ranked(players).expect("fixture rosters have unique ids"));
    store
}
