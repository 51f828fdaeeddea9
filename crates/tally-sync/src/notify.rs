// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Notification sink port plus the toast and tracing adapters.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tally_app_core::toast::{ToastKind, ToastService};
use tracing::{info, warn};

/// How long mutation toasts stay on screen.
pub const NOTICE_TTL: Duration = Duration::from_secs(4);

/// Terminal outcome class of a user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The action was confirmed.
    Success,
    /// The action was rejected or rolled back.
    Failure,
}

/// User-visible feedback for one mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Outcome class.
    pub kind: NoticeKind,
    /// Short title ("Success", "Error", ...).
    pub title: String,
    /// Detail line.
    pub message: String,
}

impl Notice {
    /// A success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: "Success".into(),
            message: message.into(),
        }
    }

    /// A failure notice.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Failure,
            title: "Error".into(),
            message: message.into(),
        }
    }

    /// Override the title.
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Receives one notice per mutation attempt.
pub trait NotificationSink: Send + Sync {
    /// Deliver a notice. Must not block.
    fn notify(&self, notice: Notice);
}

/// Each notice becomes its own toast; the queue's dedupe window is bypassed so
/// two attempts that fail the same way still show two toasts.
impl NotificationSink for Mutex<ToastService> {
    fn notify(&self, notice: Notice) {
        let kind = match notice.kind {
            NoticeKind::Success => ToastKind::Success,
            NoticeKind::Failure => ToastKind::Failure,
        };
        let mut toasts = self.lock().unwrap_or_else(|e| e.into_inner());
        toasts.push_distinct(kind, notice.title, Some(notice.message), NOTICE_TTL, Instant::now());
    }
}

/// Sink that only logs; used by headless tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success => info!(title = %notice.title, "{}", notice.message),
            NoticeKind::Failure => warn!(title = %notice.title, "{}", notice.message),
        }
    }
}
