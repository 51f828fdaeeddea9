// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted remote player service and a recording notification sink.
//!
//! Calls consume scripted steps in arrival order. A step is either an
//! immediate [`Reply`] or a held one that blocks the caller until the test
//! releases its [`Gate`]. With no step queued the fake behaves like a small
//! in-memory server: creates echo a `srv-N` record with a balance of 10 and
//! every successful call updates its roster.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tally_sync::{
    CreateAck, Notice, NotificationSink, Player, PlayerId, RemoteError, RemotePlayerService, StatField, TempId,
};
use tokio::sync::{oneshot, Notify};

/// A call the fake received.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// `list()`
    List,
    /// `create(name, correlation)`
    Create {
        /// Requested name.
        name: String,
        /// Provisional id sent along.
        correlation: TempId,
    },
    /// `update_balance(id, balance)`
    UpdateBalance {
        /// Target.
        id: PlayerId,
        /// New balance.
        balance: f64,
    },
    /// `adjust_stat(id, field, delta)`
    AdjustStat {
        /// Target.
        id: PlayerId,
        /// Counter.
        field: StatField,
        /// Signed change.
        delta: i64,
    },
    /// `delete(id)`
    Delete {
        /// Target.
        id: PlayerId,
    },
}

impl RemoteCall {
    /// True for every call except `list`.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::List)
    }
}

/// Scripted answer for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Succeed with the default server behaviour.
    Ok,
    /// Fail with the given error.
    Fail(RemoteError),
    /// Answer a create with this acknowledgement.
    Created(CreateAck),
    /// Answer a list with these players.
    Listed(Vec<Player>),
}

enum Step {
    Now(Reply),
    Held(oneshot::Receiver<Reply>),
}

/// Releases one held call.
#[derive(Debug)]
pub struct Gate(oneshot::Sender<Reply>);

impl Gate {
    /// Let the held call complete with `reply`.
    pub fn release(self, reply: Reply) {
        let _ = self.0.send(reply);
    }

    /// Let the held call succeed.
    pub fn succeed(self) {
        self.release(Reply::Ok);
    }

    /// Let the held call fail.
    pub fn fail(self, err: RemoteError) {
        self.release(Reply::Fail(err));
    }
}

#[derive(Default)]
struct Inner {
    roster: Vec<Player>,
    calls: Vec<RemoteCall>,
    script: VecDeque<Step>,
    created: u64,
}

/// In-memory [`RemotePlayerService`] whose replies can be scripted and held.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedPlayerService {
    inner: Arc<Mutex<Inner>>,
    called: Arc<Notify>,
}

impl ScriptedPlayerService {
    /// Fake server with an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake server holding `roster`.
    pub fn with_roster(roster: Vec<Player>) -> Self {
        let fake = Self::new();
        fake.set_roster(roster);
        fake
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the server-side roster.
    pub fn set_roster(&self, roster: Vec<Player>) {
        self.inner().roster = roster;
    }

    /// Current server-side roster.
    pub fn roster(&self) -> Vec<Player> {
        self.inner().roster.clone()
    }

    /// Queue an immediate reply for the next unscripted call.
    pub fn push_reply(&self, reply: Reply) {
        self.inner().script.push_back(Step::Now(reply));
    }

    /// Queue a failure for the next unscripted call.
    pub fn push_failure(&self, err: RemoteError) {
        self.push_reply(Reply::Fail(err));
    }

    /// Hold the next unscripted call until the returned gate is released.
    pub fn hold_next(&self) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.inner().script.push_back(Step::Held(rx));
        Gate(tx)
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.inner().calls.clone()
    }

    /// Number of calls that were not `list`.
    pub fn mutation_calls(&self) -> usize {
        self.inner().calls.iter().filter(|c| c.is_mutation()).count()
    }

    /// Number of `list` calls.
    pub fn list_calls(&self) -> usize {
        self.inner().calls.iter().filter(|c| !c.is_mutation()).count()
    }

    /// Wait until at least `n` calls have arrived.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.called.notified();
            if self.inner().calls.len() >= n {
                return;
            }
            notified.await;
        }
    }

    async fn answer(&self, call: RemoteCall) -> Reply {
        let step = {
            let mut inner = self.inner();
            inner.calls.push(call);
            inner.script.pop_front()
        };
        self.called.notify_waiters();
        match step {
            None | Some(Step::Now(Reply::Ok)) => Reply::Ok,
            Some(Step::Now(reply)) => reply,
            Some(Step::Held(rx)) => rx
                .await
                .unwrap_or_else(|_| Reply::Fail(RemoteError::Transport("gate dropped".into()))),
        }
    }

    fn unit(reply: Reply, effect: impl FnOnce(&mut Vec<Player>), inner: &Mutex<Inner>) -> Result<(), RemoteError> {
        match reply {
            Reply::Fail(err) => Err(err),
            Reply::Ok => {
                let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
                effect(&mut guard.roster);
                Ok(())
            }
            Reply::Created(_) | Reply::Listed(_) => Ok(()),
        }
    }
}

#[async_trait]
impl RemotePlayerService for ScriptedPlayerService {
    async fn list(&self) -> Result<Vec<Player>, RemoteError> {
        match self.answer(RemoteCall::List).await {
            Reply::Fail(err) => Err(err),
            Reply::Listed(players) => Ok(players),
            Reply::Ok | Reply::Created(_) => Ok(self.roster()),
        }
    }

    async fn create(&self, name: &str, correlation: TempId) -> Result<CreateAck, RemoteError> {
        let call = RemoteCall::Create {
            name: name.to_string(),
            correlation,
        };
        match self.answer(call).await {
            Reply::Fail(err) => Err(err),
            Reply::Created(ack) => Ok(ack),
            Reply::Ok | Reply::Listed(_) => {
                let mut inner = self.inner();
                inner.created += 1;
                let id = PlayerId::server(format!("srv-{}", inner.created))
                    .map_err(|e| RemoteError::Decode(e.to_string()))?;
                let record = Player {
                    id,
                    name: name.to_string(),
                    balance: 10.0,
                    wins: 0,
                    losses: 0,
                };
                inner.roster.push(record.clone());
                Ok(CreateAck::Echoed(record))
            }
        }
    }

    async fn update_balance(&self, id: &PlayerId, balance: f64) -> Result<(), RemoteError> {
        let reply = self.answer(RemoteCall::UpdateBalance { id: id.clone(), balance }).await;
        Self::unit(
            reply,
            |roster| {
                if let Some(p) = roster.iter_mut().find(|p| &p.id == id) {
                    p.balance = balance;
                }
            },
            &self.inner,
        )
    }

    async fn adjust_stat(&self, id: &PlayerId, field: StatField, delta: i64) -> Result<(), RemoteError> {
        let reply = self
            .answer(RemoteCall::AdjustStat {
                id: id.clone(),
                field,
                delta,
            })
            .await;
        Self::unit(
            reply,
            |roster| {
                if let Some(p) = roster.iter_mut().find(|p| &p.id == id) {
                    let next = i64::from(p.stat(field)).saturating_add(delta).max(0);
                    p.set_stat(field, u32::try_from(next).unwrap_or(u32::MAX));
                }
            },
            &self.inner,
        )
    }

    async fn delete(&self, id: &PlayerId) -> Result<(), RemoteError> {
        let reply = self.answer(RemoteCall::Delete { id: id.clone() }).await;
        Self::unit(reply, |roster| roster.retain(|p| &p.id != id), &self.inner)
    }
}

/// Sink that keeps every notice it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    /// Empty sink, ready to share.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Notices received so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of notices received.
    pub fn len(&self) -> usize {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when nothing was received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Message of the most recent notice.
    pub fn last_message(&self) -> Option<String> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .map(|n| n.message.clone())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).push(notice);
    }
}
