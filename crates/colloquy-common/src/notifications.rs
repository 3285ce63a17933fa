use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-facing notice surfaced by the session core.
///
/// Only two kinds of failure are meant to reach the user this way:
/// backend-reported errors and reconnect exhaustion. Informational
/// notices (e.g. the advertised tool list) share the same shape.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl Notice {
    /// Creates an info notice with a 10-second TTL.
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            body: body.into(),
            created_at: Instant::now(),
            ttl: Duration::from_secs(10),
        }
    }

    /// Creates an error notice with a 5-second TTL.
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            body: body.into(),
            created_at: Instant::now(),
            ttl: Duration::from_secs(5),
        }
    }

    /// Returns `true` if this notice has exceeded its TTL.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// A bounded queue of notices that auto-evicts expired entries.
#[derive(Debug)]
pub struct NoticeQueue {
    items: VecDeque<Notice>,
    capacity: usize,
}

impl NoticeQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a notice, evicting expired entries first.
    /// If still at capacity after eviction, the oldest entry is removed.
    pub fn push(&mut self, notice: Notice) {
        self.evict_expired();
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(notice);
    }

    /// Returns all currently visible (non-expired) notices.
    pub fn visible(&mut self) -> Vec<&Notice> {
        self.evict_expired();
        self.items.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn evict_expired(&mut self) {
        self.items.retain(|n| !n.is_expired());
    }
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_levels_and_ttls() {
        let info = Notice::info("Available Tools", "github.createIssue");
        assert_eq!(info.level, NoticeLevel::Info);
        assert_eq!(info.ttl, Duration::from_secs(10));
        assert!(!info.is_expired());

        let err = Notice::error("Server error", "provider unavailable");
        assert_eq!(err.level, NoticeLevel::Error);
        assert_eq!(err.ttl, Duration::from_secs(5));
    }

    #[test]
    fn queue_caps_at_capacity() {
        let mut queue = NoticeQueue::new(2);
        queue.push(Notice::info("a", ""));
        queue.push(Notice::info("b", ""));
        queue.push(Notice::info("c", ""));

        assert_eq!(queue.len(), 2);
        let titles: Vec<_> = queue.visible().iter().map(|n| n.title.clone()).collect();
        assert_eq!(titles, vec!["b", "c"]);
    }

    #[test]
    fn expired_notices_are_evicted() {
        let mut queue = NoticeQueue::new(4);
        let mut stale = Notice::error("old", "gone");
        stale.created_at = Instant::now() - Duration::from_secs(60);
        queue.push(stale);
        queue.push(Notice::info("fresh", "still here"));

        let titles: Vec<_> = queue.visible().iter().map(|n| n.title.clone()).collect();
        assert_eq!(titles, vec!["fresh"]);
    }
}
