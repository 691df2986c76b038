//! Transient status-bar notifications.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct Toasts {
    queue: VecDeque<Toast>,
    duration: Duration,
}

const MAX_TOASTS: usize = 4;

impl Toasts {
    pub fn new(duration: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            duration,
        }
    }

    pub fn push(&mut self, level: ToastLevel, message: impl Into<String>, now: Instant) {
        if self.queue.len() == MAX_TOASTS {
            self.queue.pop_front();
        }
        self.queue.push_back(Toast {
            level,
            message: message.into(),
            expires_at: now + self.duration,
        });
    }

    /// Drops expired toasts; returns true when any were removed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.queue.len();
        self.queue.retain(|t| t.expires_at > now);
        self.queue.len() != before
    }

    /// Dismisses the toast on screen, uncovering the one queued before it.
    pub fn dismiss(&mut self) {
        self.queue.pop_back();
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.queue.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.queue.iter()
    }
}
