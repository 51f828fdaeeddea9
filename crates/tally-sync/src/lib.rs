// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client-side state engine for the Tally leaderboard.
//!
//! The engine keeps the last two ranked snapshots of the player roster, diffs
//! them for transient highlights, applies admin mutations optimistically with
//! rollback, reconciles provisional players with their server records, and
//! polls the remote service on a fixed cadence.
//!
//! All state lives in a [`SharedStore`]; the [`MutationManager`] and the
//! [`PollScheduler`] write through it and never hold its lock across an await.
//! Transports implement [`RemotePlayerService`] in other crates.

pub mod diff;
pub mod ids;
pub mod model;
pub mod mutation;
pub mod notify;
pub mod poll;
pub mod remote;
pub mod snapshot;
pub mod store;

pub use diff::{diff, ChangeDescriptor, ChangeSet};
pub use ids::{locate_created, reconcile, Reconciled, TempIdAllocator};
pub use model::{Field, IdError, Player, PlayerId, ServerId, StatField, TempId, TEMP_ID_PREFIX};
pub use mutation::{
    MutationId, MutationKind, MutationManager, MutationOutcome, PendingMutation, Prior, ValidationError,
};
pub use notify::{Notice, NoticeKind, NotificationSink, TracingSink, NOTICE_TTL};
pub use poll::{refresh_once, Backoff, BoardUpdate, FetchError, PollConfig, PollHandle, PollScheduler, RefreshRequest};
pub use remote::{CreateAck, RemoteError, RemotePlayerService};
pub use snapshot::{Snapshot, SnapshotError};
pub use store::{lock, shared, SharedStore, SnapshotStore, DEFAULT_HIGHLIGHT_WINDOW};
pub use tally_app_core::prefs::RollbackPolicy;
