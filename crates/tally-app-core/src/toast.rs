// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Toast queue with TTL + dedupe for user-visible mutation feedback.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    /// The action went through.
    Success,
    /// The action failed or was rejected.
    Failure,
}

/// Identifier for a toast entry.
pub type ToastId = u64;

#[derive(Debug, Clone)]
struct Toast {
    id: ToastId,
    kind: ToastKind,
    title: String,
    body: Option<String>,
    ttl: Duration,
    created: Instant,
}

/// Rendering-friendly view of a toast.
#[derive(Debug, Clone, PartialEq)]
pub struct ToastRender {
    /// Stable identifier.
    pub id: ToastId,
    /// Severity.
    pub kind: ToastKind,
    /// Short title line.
    pub title: String,
    /// Optional description.
    pub body: Option<String>,
    /// 1.0 -> just created, 0.0 -> expired.
    pub progress: f32,
}

/// In-memory toast queue with TTL and dedupe window.
pub struct ToastService {
    queue: VecDeque<Toast>,
    max: usize,
    dedupe_window: Duration,
    next_id: ToastId,
}

impl ToastService {
    /// Create a new queue holding at most `max` toasts.
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Push a toast, deduping identical recent entries (same kind/title/body within the dedupe window).
    pub fn push<S, B>(&mut self, kind: ToastKind, title: S, body: B, ttl: Duration, now: Instant) -> ToastId
    where
        S: Into<String>,
        B: Into<Option<String>>,
    {
        let title = title.into();
        let body = body.into();

        if let Some(existing) = self.queue.iter_mut().find(|t| {
            t.kind == kind
                && t.title == title
                && t.body == body
                && now.duration_since(t.created) <= self.dedupe_window
        }) {
            existing.created = now;
            existing.ttl = ttl;
            return existing.id;
        }

        self.enqueue(kind, title, body, ttl, now)
    }

    /// Push a toast without deduping; every call gets its own entry.
    pub fn push_distinct<S, B>(&mut self, kind: ToastKind, title: S, body: B, ttl: Duration, now: Instant) -> ToastId
    where
        S: Into<String>,
        B: Into<Option<String>>,
    {
        self.enqueue(kind, title.into(), body.into(), ttl, now)
    }

    fn enqueue(&mut self, kind: ToastKind, title: String, body: Option<String>, ttl: Duration, now: Instant) -> ToastId {
        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Toast {
            id,
            kind,
            title,
            body,
            ttl,
            created: now,
        });
        id
    }

    /// Drop expired toasts (call once per tick).
    pub fn retain_visible(&mut self, now: Instant) {
        self.queue.retain(|t| now.duration_since(t.created) < t.ttl);
    }

    /// Return render-ready toasts with progress ratios.
    pub fn visible(&self, now: Instant) -> Vec<ToastRender> {
        self.queue
            .iter()
            .filter(|t| now.duration_since(t.created) < t.ttl)
            .map(|t| ToastRender {
                id: t.id,
                kind: t.kind,
                title: t.title.clone(),
                body: t.body.clone(),
                progress: 1.0 - (now.duration_since(t.created).as_secs_f32() / t.ttl.as_secs_f32()),
            })
            .collect()
    }

    /// Number of queued toasts, expired ones included until `retain_visible` runs.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_toasts_within_window_collapse() {
        let mut svc = ToastService::new(4);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(3);
        let a = svc.push(ToastKind::Failure, "Error", Some("Failed to delete player".to_string()), ttl, t0);
        let b = svc.push(
            ToastKind::Failure,
            "Error",
            Some("Failed to delete player".to_string()),
            ttl,
            t0 + Duration::from_millis(100),
        );
        assert_eq!(a, b);
        assert_eq!(svc.len(), 1);
    }

    #[test]
    fn distinct_pushes_never_collapse() {
        let mut svc = ToastService::new(4);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(3);
        let a = svc.push_distinct(ToastKind::Failure, "Error", Some("Failed to update balance".to_string()), ttl, t0);
        let b = svc.push_distinct(ToastKind::Failure, "Error", Some("Failed to update balance".to_string()), ttl, t0);
        assert_ne!(a, b);
        assert_eq!(svc.visible(t0).len(), 2);
    }

    #[test]
    fn queue_evicts_oldest_when_full() {
        let mut svc = ToastService::new(2);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(3);
        svc.push(ToastKind::Success, "one", None::<String>, ttl, t0);
        svc.push(ToastKind::Success, "two", None::<String>, ttl, t0);
        svc.push(ToastKind::Success, "three", None::<String>, ttl, t0);
        let titles: Vec<_> = svc.visible(t0).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["two".to_string(), "three".to_string()]);
    }

    #[test]
    fn expired_toasts_are_hidden_then_dropped() {
        let mut svc = ToastService::new(4);
        let t0 = Instant::now();
        svc.push(ToastKind::Success, "done", None::<String>, Duration::from_secs(1), t0);
        let later = t0 + Duration::from_secs(2);
        assert!(svc.visible(later).is_empty());
        assert_eq!(svc.len(), 1);
        svc.retain_visible(later);
        assert!(svc.is_empty());
    }
}
