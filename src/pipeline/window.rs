//! Approval window
//!
//! A pending transfer may be approved for a fixed time after it was
//! prepared. The boundary itself is still inside the window.

use chrono::{DateTime, Duration, Utc};

/// Default approval window
pub const DEFAULT_APPROVAL_WINDOW_SECS: u64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct ApprovalWindow {
    duration: Duration,
}

impl ApprovalWindow {
    pub fn new(seconds: u64) -> Self {
        Self {
            duration: Duration::seconds(seconds as i64),
        }
    }

    pub fn seconds(&self) -> u64 {
        self.duration.num_seconds().max(0) as u64
    }

    /// Expired iff strictly more than the window has elapsed.
    pub fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - created_at > self.duration
    }

    /// Whole seconds left before expiry, clamped at zero.
    pub fn remaining_seconds(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        let remaining = self.duration - (now - created_at);
        remaining.num_seconds().max(0) as u64
    }
}

impl Default for ApprovalWindow {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVAL_WINDOW_SECS)
    }
}
