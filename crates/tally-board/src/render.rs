// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Plain-text rendering of the board and of queued toasts.

use std::io::{self, Write};
use std::time::Instant;
use tally_app_core::toast::{ToastKind, ToastService};
use tally_sync::{ChangeDescriptor, SnapshotStore};

fn marker(change: ChangeDescriptor) -> String {
    if change.appeared {
        return "new".into();
    }
    let mut out = String::new();
    if change.moved_up() {
        out.push_str(&format!("▲{}", change.rank_delta));
    } else if change.moved_down() {
        out.push_str(&format!("▼{}", -change.rank_delta));
    }
    if change.balance_changed || change.wins_changed || change.losses_changed {
        out.push('*');
    }
    out
}

/// Write the current snapshot with change markers that are still inside the highlight window.
pub fn board(out: &mut impl Write, store: &SnapshotStore, now: Instant) -> io::Result<()> {
    let snapshot = store.current();
    writeln!(out, "Leaderboard (v{}, {} players)", store.version(), snapshot.len())?;
    for (rank, player) in snapshot.iter().enumerate() {
        let change = store.change_for(&player.id, now);
        writeln!(
            out,
            "{:>3}. {:<20} {:>12.2} USDT  W{:<3} L{:<3} {:<24} {}",
            rank + 1,
            player.name,
            player.balance,
            player.wins,
            player.losses,
            player.id,
            marker(change),
        )?;
    }
    Ok(())
}

/// Write every toast still visible at `now`.
pub fn toasts(out: &mut impl Write, toasts: &ToastService, now: Instant) -> io::Result<()> {
    for toast in toasts.visible(now) {
        let tag = match toast.kind {
            ToastKind::Success => "ok",
            ToastKind::Failure => "error",
        };
        match toast.body {
            Some(body) => writeln!(out, "[{tag}] {}: {body}", toast.title)?,
            None => writeln!(out, "[{tag}] {}", toast.title)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use std::time::Duration;
    use tally_dry_tests::{sample_roster, store_with};
    use tally_sync::Snapshot;

    #[test]
    fn markers_follow_the_change_set() {
        let mut store = store_with(sample_roster());
        let mut next = sample_roster();
        next[2].balance = 40.0;
        store.replace(Snapshot::ranked(next).unwrap());

        let mut buf = Vec::new();
        board(&mut buf, &store, Instant::now()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("Cy") && lines[1].ends_with("▲2*"));
        assert!(lines[2].contains("Ada") && lines[2].ends_with("▼1"));
    }

    #[test]
    fn markers_disappear_after_the_window() {
        let mut store = store_with(sample_roster());
        let mut next = sample_roster();
        next[2].balance = 40.0;
        store.replace(Snapshot::ranked(next).unwrap());
        let later = Instant::now() + Duration::from_secs(5);

        let mut buf = Vec::new();
        board(&mut buf, &store, later).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.lines().skip(1).all(|l| l.ends_with(' ')));
    }

    #[test]
    fn toasts_render_title_and_body() {
        let mut service = ToastService::new(4);
        let now = Instant::now();
        service.push(ToastKind::Failure, "Error", Some("Failed to delete player".to_string()), Duration::from_secs(4), now);

        let mut buf = Vec::new();
        toasts(&mut buf, &service, now).unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "[error] Error: Failed to delete player\n");
    }
}
