// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Optimistic mutations: apply locally, call the remote, then keep or roll back.
//!
//! Each call moves through `Applied -> Confirmed | RolledBack` exactly once and
//! emits exactly one notice. The manager never times out a remote call; if
//! it never resolves, the optimistic value stands until a refresh overwrites it.
//!
//! Mutations on the same `(player, field)` form a chain. A new mutation
//! captures the visible value, which may itself be optimistic. When a balance
//! write fails after a later write was applied, the visible value is left
//! alone and the failed write's prior becomes the next pending write's
//! rollback point, so a late failure can never resurrect a stale value.
//! Stat adjustments are deltas on the server, so a failed adjustment that is
//! not the latest subtracts its own delta from the visible counter and from
//! every later pending rollback point.

use crate::ids::{locate_created, reconcile, Reconciled, TempIdAllocator};
use crate::model::{Field, Player, PlayerId, StatField, TempId};
use crate::notify::{Notice, NotificationSink};
use crate::remote::{CreateAck, RemoteError, RemotePlayerService};
use crate::store::{lock, SharedStore, SnapshotStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tally_app_core::prefs::RollbackPolicy;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Identifier of one pending mutation (unique per manager).
pub type MutationId = u64;

/// What a pending mutation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Provisional insert awaiting a server id.
    Create,
    /// Balance overwrite.
    UpdateBalance,
    /// Win/loss counter adjustment.
    AdjustStat(StatField),
    /// Removal.
    Delete,
}

impl MutationKind {
    const fn field(self) -> Field {
        match self {
            Self::Create | Self::Delete => Field::Entity,
            Self::UpdateBalance => Field::Balance,
            Self::AdjustStat(f) => Field::Stat(f),
        }
    }
}

/// State captured at apply time, restored on rollback.
#[derive(Debug, Clone, PartialEq)]
pub enum Prior {
    /// The entity did not exist (create).
    Absent,
    /// Previous visible balance.
    Balance(f64),
    /// Previous visible counter value and the delta applied on top of it.
    Stat {
        /// Counter before the adjustment.
        value: u32,
        /// Signed change sent to the server.
        delta: i64,
    },
    /// The removed record and where it sat.
    Entity {
        /// Removed record.
        player: Player,
        /// Former display position.
        position: usize,
    },
}

/// A locally applied mutation whose remote call has not resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    /// Manager-unique id.
    pub id: MutationId,
    /// Target player.
    pub target: PlayerId,
    /// Mutation kind.
    pub kind: MutationKind,
    /// Rollback point.
    pub prior: Prior,
    /// When the optimistic change was applied.
    pub applied_at: Instant,
    refresh_epoch: u64,
}

/// Requests refused before any state change or remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Blank player name.
    #[error("player name is empty")]
    EmptyName,
    /// Target not visible.
    #[error("player `{0}` not found")]
    UnknownPlayer(PlayerId),
    /// Target only exists locally; the server cannot address it yet.
    #[error("player `{0}` is still being created")]
    NotPersisted(PlayerId),
    /// Balance was NaN or infinite.
    #[error("balance must be a finite number")]
    NonFiniteBalance,
    /// Stat delta of zero.
    #[error("delta must be non-zero")]
    ZeroDelta,
    /// Counter would go negative.
    #[error("{} cannot go below zero", .0.label())]
    BelowZero(StatField),
}

/// Terminal result of one mutation call.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Remote accepted; the optimistic state stands. `id` is the final identity.
    Confirmed {
        /// Identity after the call (the server id for a reconciled create).
        id: PlayerId,
    },
    /// Remote failed; the prior state was restored (subject to chain and policy rules).
    RolledBack {
        /// Remote failure.
        reason: RemoteError,
    },
    /// Refused locally.
    Rejected(ValidationError),
}

impl MutationOutcome {
    /// True for [`MutationOutcome::Confirmed`].
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// Applied members of one `(player, field)` chain in apply order. Confirmed
/// members stay until the whole chain settles; failed members are erased.
#[derive(Debug, Default)]
struct Chain {
    members: Vec<(MutationId, bool)>,
}

#[derive(Debug, Default)]
struct PendingBook {
    next_id: MutationId,
    live: HashMap<MutationId, PendingMutation>,
    chains: HashMap<(PlayerId, Field), Chain>,
}

enum Settle {
    Restore(PendingMutation),
    Superseded(PendingMutation),
    UndoDelta(PendingMutation),
}

fn shift(value: u32, delta: i64) -> u32 {
    u32::try_from(i64::from(value).saturating_add(delta).max(0)).unwrap_or(u32::MAX)
}

impl PendingBook {
    fn register(&mut self, target: PlayerId, kind: MutationKind, prior: Prior, refresh_epoch: u64) -> MutationId {
        self.next_id += 1;
        let id = self.next_id;
        self.chains
            .entry((target.clone(), kind.field()))
            .or_default()
            .members
            .push((id, false));
        self.live.insert(
            id,
            PendingMutation {
                id,
                target,
                kind,
                prior,
                applied_at: Instant::now(),
                refresh_epoch,
            },
        );
        id
    }

    fn confirm(&mut self, id: MutationId) -> Option<PendingMutation> {
        let pm = self.live.remove(&id)?;
        let key = (pm.target.clone(), pm.kind.field());
        if let Some(chain) = self.chains.get_mut(&key) {
            if let Some(member) = chain.members.iter_mut().find(|(m, _)| *m == id) {
                member.1 = true;
            }
            if chain.members.iter().all(|(_, settled)| *settled) {
                self.chains.remove(&key);
            }
        }
        Some(pm)
    }

    fn fail(&mut self, id: MutationId) -> Option<Settle> {
        let pm = self.live.remove(&id)?;
        let key = (pm.target.clone(), pm.kind.field());
        let Some(chain) = self.chains.get_mut(&key) else {
            return Some(Settle::Restore(pm));
        };
        let Some(idx) = chain.members.iter().position(|(m, _)| *m == id) else {
            return Some(Settle::Restore(pm));
        };
        chain.members.remove(idx);
        let latest = idx == chain.members.len();
        let successor = chain.members.get(idx).copied();
        let later_pending: Vec<MutationId> =
            chain.members[idx..].iter().filter(|(_, settled)| !*settled).map(|(m, _)| *m).collect();
        if chain.members.iter().all(|(_, settled)| *settled) {
            self.chains.remove(&key);
        }
        if latest {
            return Some(Settle::Restore(pm));
        }
        if let Prior::Stat { delta, .. } = pm.prior {
            for later in later_pending {
                if let Some(Prior::Stat { value, .. }) = self.live.get_mut(&later).map(|next| &mut next.prior) {
                    *value = shift(*value, -delta);
                }
            }
            return Some(Settle::UndoDelta(pm));
        }
        if let Some((next_id, false)) = successor {
            if let Some(next) = self.live.get_mut(&next_id) {
                debug!(failed = pm.id, successor = next.id, "handing rollback point to successor");
                next.prior = pm.prior.clone();
            }
        }
        Some(Settle::Superseded(pm))
    }
}

/// Applies optimistic mutations to the shared store and settles them against the remote.
pub struct MutationManager {
    store: SharedStore,
    remote: Arc<dyn RemotePlayerService>,
    sink: Arc<dyn NotificationSink>,
    ids: TempIdAllocator,
    policy: RollbackPolicy,
    book: Mutex<PendingBook>,
}

impl MutationManager {
    /// Build a manager over `store` using the session's temp id allocator.
    pub fn new(
        store: SharedStore,
        remote: Arc<dyn RemotePlayerService>,
        sink: Arc<dyn NotificationSink>,
        ids: TempIdAllocator,
    ) -> Self {
        Self {
            store,
            remote,
            sink,
            ids,
            policy: RollbackPolicy::default(),
            book: Mutex::new(PendingBook::default()),
        }
    }

    /// Choose how rollbacks interact with refreshes that landed in between.
    pub fn with_policy(mut self, policy: RollbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The shared store this manager writes through.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Copies of all mutations still awaiting their remote call.
    pub fn pending(&self) -> Vec<PendingMutation> {
        let mut out: Vec<_> = self.book().live.values().cloned().collect();
        out.sort_by_key(|pm| pm.id);
        out
    }

    /// True when any mutation on `id` is still pending.
    pub fn is_pending(&self, id: &PlayerId) -> bool {
        self.book().live.values().any(|pm| &pm.target == id)
    }

    /// Insert a provisional player and create it remotely.
    pub async fn create_optimistic(&self, draft_name: &str) -> MutationOutcome {
        let name = draft_name.trim().to_string();
        if name.is_empty() {
            return self.reject(ValidationError::EmptyName);
        }
        let temp = self.ids.allocate();
        let mid = {
            let mut store = lock(&self.store);
            store.insert(Player::provisional(temp, name.clone()));
            let epoch = store.refresh_epoch();
            self.book().register(PlayerId::Temp(temp), MutationKind::Create, Prior::Absent, epoch)
        };
        info!(%temp, player = %name, "optimistic create applied");

        match self.remote.create(&name, temp).await {
            Ok(ack) => {
                let id = self.settle_create(mid, &name, temp, ack);
                self.confirmed(id, format!("Player \"{name}\" created successfully"))
            }
            Err(reason) => {
                self.rollback(mid);
                self.rolled_back(reason, "Failed to create player")
            }
        }
    }

    /// Overwrite a balance immediately, then confirm remotely.
    pub async fn update_balance_optimistic(&self, id: &PlayerId, new_balance: f64) -> MutationOutcome {
        if !new_balance.is_finite() {
            return self.reject(ValidationError::NonFiniteBalance);
        }
        let applied = self.apply_local(id, MutationKind::UpdateBalance, |p| {
            let prior = p.balance;
            p.balance = new_balance;
            Ok(Prior::Balance(prior))
        });
        let (mid, name) = match applied {
            Ok(v) => v,
            Err(err) => return self.reject(err),
        };

        match self.remote.update_balance(id, new_balance).await {
            Ok(()) => {
                self.confirm(mid);
                self.confirmed(id.clone(), format!("{name}'s balance updated to ${new_balance} USDT"))
            }
            Err(reason) => {
                self.rollback(mid);
                self.rolled_back(reason, "Failed to update balance")
            }
        }
    }

    /// Add `delta` to the visible balance and funnel into [`update_balance_optimistic`](Self::update_balance_optimistic).
    pub async fn adjust_balance(&self, id: &PlayerId, delta: f64) -> MutationOutcome {
        if !delta.is_finite() {
            return self.reject(ValidationError::NonFiniteBalance);
        }
        let current = lock(&self.store).current().get(id).map(|p| p.balance);
        match current {
            Some(balance) => self.update_balance_optimistic(id, balance + delta).await,
            None => self.reject(ValidationError::UnknownPlayer(id.clone())),
        }
    }

    /// Adjust a win/loss counter; refuses locally if it would go negative.
    pub async fn adjust_stat_optimistic(&self, id: &PlayerId, field: StatField, delta: i64) -> MutationOutcome {
        if delta == 0 {
            return self.reject(ValidationError::ZeroDelta);
        }
        let applied = self.apply_local(id, MutationKind::AdjustStat(field), |p| {
            let current = p.stat(field);
            let next = i64::from(current).saturating_add(delta);
            if next < 0 {
                return Err(ValidationError::BelowZero(field));
            }
            p.set_stat(field, u32::try_from(next.max(0)).unwrap_or(u32::MAX));
            Ok(Prior::Stat { value: current, delta })
        });
        let (mid, _name) = match applied {
            Ok(v) => v,
            Err(err) => return self.reject(err),
        };

        match self.remote.adjust_stat(id, field, delta).await {
            Ok(()) => {
                self.confirm(mid);
                let direction = if delta > 0 { "increased" } else { "decreased" };
                let noun = match field {
                    StatField::Wins => "win",
                    StatField::Losses => "loss",
                };
                self.confirmed(id.clone(), format!("Player {noun} {direction}"))
            }
            Err(reason) => {
                self.rollback(mid);
                self.rolled_back(reason, &format!("Failed to update {}", field.label()))
            }
        }
    }

    /// Remove a player immediately, then delete remotely; re-insert on failure.
    ///
    /// A provisional player is discarded locally without a remote call.
    pub async fn delete_optimistic(&self, id: &PlayerId) -> MutationOutcome {
        if id.is_temp() {
            let removed = lock(&self.store).remove(id);
            return match removed {
                Some(_) => {
                    info!(%id, "provisional player discarded before confirmation");
                    self.confirmed(id.clone(), "Pending player discarded".to_string())
                }
                None => self.reject(ValidationError::UnknownPlayer(id.clone())),
            };
        }
        let mid = {
            let mut store = lock(&self.store);
            let Some((position, player)) = store.remove(id) else {
                drop(store);
                return self.reject(ValidationError::UnknownPlayer(id.clone()));
            };
            let epoch = store.refresh_epoch();
            self.book()
                .register(id.clone(), MutationKind::Delete, Prior::Entity { player, position }, epoch)
        };

        match self.remote.delete(id).await {
            Ok(()) => {
                self.confirm(mid);
                self.confirmed(id.clone(), "Player deleted successfully".to_string())
            }
            Err(reason) => {
                self.rollback(mid);
                self.rolled_back(reason, "Failed to delete player")
            }
        }
    }

    fn book(&self) -> MutexGuard<'_, PendingBook> {
        self.book.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn apply_local(
        &self,
        id: &PlayerId,
        kind: MutationKind,
        edit: impl FnOnce(&mut Player) -> Result<Prior, ValidationError>,
    ) -> Result<(MutationId, String), ValidationError> {
        if id.is_temp() {
            return Err(ValidationError::NotPersisted(id.clone()));
        }
        let mut store = lock(&self.store);
        let mut scratch = store
            .current()
            .get(id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownPlayer(id.clone()))?;
        let prior = edit(&mut scratch)?;
        store.edit(id, |p| *p = scratch.clone());
        let epoch = store.refresh_epoch();
        let mid = self.book().register(id.clone(), kind, prior, epoch);
        debug!(%id, ?kind, mutation = mid, "optimistic change applied");
        Ok((mid, scratch.name))
    }

    fn settle_create(&self, mid: MutationId, name: &str, temp: TempId, ack: CreateAck) -> PlayerId {
        let mut store = lock(&self.store);
        self.book().confirm(mid);
        let confirmed = match ack {
            CreateAck::Echoed(player) => Some(player),
            CreateAck::Roster(roster) => locate_created(&roster, name, store.current()).cloned(),
        };
        let Some(player) = confirmed else {
            debug!(%temp, player = name, "create confirmed without a locatable record; waiting for refresh");
            return PlayerId::Temp(temp);
        };
        let fallback = player.id.clone();
        match reconcile(&mut store, temp, player) {
            Reconciled::Replaced { id, .. } | Reconciled::Merged { id } => id,
            Reconciled::Missing => fallback,
            Reconciled::Rejected => PlayerId::Temp(temp),
        }
    }

    fn confirm(&self, mid: MutationId) {
        if let Some(pm) = self.book().confirm(mid) {
            debug!(mutation = mid, target = %pm.target, "mutation confirmed");
        }
    }

    fn rollback(&self, mid: MutationId) {
        let mut store = lock(&self.store);
        let Some(settle) = self.book().fail(mid) else {
            return;
        };
        let pm = match settle {
            Settle::Restore(pm) => pm,
            Settle::Superseded(pm) => {
                debug!(mutation = mid, target = %pm.target, "failed mutation superseded; visible value kept");
                return;
            }
            Settle::UndoDelta(pm) => {
                if !self.rollback_allowed(&store, &pm) {
                    info!(mutation = mid, target = %pm.target, "refresh landed after apply; keeping authoritative state");
                    return;
                }
                warn!(mutation = mid, target = %pm.target, kind = ?pm.kind, "undoing failed adjustment under later ones");
                undo_delta(&mut store, &pm);
                return;
            }
        };
        if !self.rollback_allowed(&store, &pm) {
            info!(mutation = mid, target = %pm.target, "refresh landed after apply; keeping authoritative state");
            return;
        }
        warn!(mutation = mid, target = %pm.target, kind = ?pm.kind, "rolling back optimistic change");
        restore(&mut store, pm);
    }

    fn rollback_allowed(&self, store: &SnapshotStore, pm: &PendingMutation) -> bool {
        match self.policy {
            RollbackPolicy::LastWriterWins => true,
            RollbackPolicy::VersionGuarded => store.refresh_epoch() == pm.refresh_epoch,
        }
    }

    fn reject(&self, err: ValidationError) -> MutationOutcome {
        debug!(%err, "mutation rejected");
        self.sink
            .notify(Notice::failure(err.to_string()).titled("Invalid request"));
        MutationOutcome::Rejected(err)
    }

    fn confirmed(&self, id: PlayerId, message: String) -> MutationOutcome {
        self.sink.notify(Notice::success(message));
        MutationOutcome::Confirmed { id }
    }

    fn rolled_back(&self, reason: RemoteError, message: &str) -> MutationOutcome {
        let notice = match reason {
            RemoteError::Transport(_) => Notice::failure("An unexpected error occurred"),
            RemoteError::Unauthorized => Notice::failure(format!("{message}: not authorized")),
            _ => Notice::failure(message),
        };
        self.sink.notify(notice);
        MutationOutcome::RolledBack { reason }
    }
}

fn restore(store: &mut SnapshotStore, pm: PendingMutation) {
    let target = pm.target;
    let applied = match pm.prior {
        Prior::Absent => store.remove(&target).is_some(),
        Prior::Balance(b) => store.edit(&target, |p| p.balance = b).is_some(),
        Prior::Stat { value: v, .. } => match pm.kind {
            MutationKind::AdjustStat(field) => store.edit(&target, |p| p.set_stat(field, v)).is_some(),
            _ => false,
        },
        Prior::Entity { player, position } => store.insert_at(position, player),
    };
    if !applied {
        debug!(%target, "rollback target no longer present; nothing restored");
    }
}

fn undo_delta(store: &mut SnapshotStore, pm: &PendingMutation) {
    let (MutationKind::AdjustStat(field), Prior::Stat { delta, .. }) = (pm.kind, &pm.prior) else {
        return;
    };
    if store
        .edit(&pm.target, |p| p.set_stat(field, shift(p.stat(field), -*delta)))
        .is_none()
    {
        debug!(target = %pm.target, "rollback target no longer present; nothing restored");
    }
}
