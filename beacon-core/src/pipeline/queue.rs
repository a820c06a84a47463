//! Pending-record queue owned by the dispatcher.

use tokio::time::Instant;

use crate::types::{Category, Record};

/// A record waiting to be dispatched
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub category: Category,
    pub record: Record,
    pub enqueued_at: Instant,
    pub retry_count: u32,
    /// Already passed through the `before_send` hook
    pub(crate) screened: bool,
}

impl QueueEntry {
    pub fn new(category: Category, record: Record) -> Self {
        Self {
            category,
            record,
            enqueued_at: Instant::now(),
            retry_count: 0,
            screened: false,
        }
    }

    /// An entry whose record has already been screened (e.g. a failed
    /// immediate send falling back into the queue)
    pub(crate) fn screened(category: Category, record: Record) -> Self {
        Self {
            screened: true,
            ..Self::new(category, record)
        }
    }

    /// The entry for its next attempt, or None once `max_retries` is used up
    pub fn into_retry(self, max_retries: u32) -> Option<Self> {
        if self.retry_count >= max_retries {
            return None;
        }
        Some(Self {
            retry_count: self.retry_count + 1,
            ..self
        })
    }
}

/// Insertion-ordered queue of pending entries
///
/// Bounded by the flush watermark rather than a hard capacity.
#[derive(Debug, Default)]
pub struct Queue {
    entries: Vec<QueueEntry>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn retry_counts(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.retry_count).collect()
    }

    /// Take every pending entry, leaving the queue empty
    pub fn drain(&mut self) -> Vec<QueueEntry> {
        std::mem::take(&mut self.entries)
    }
}

/// Split entries into per-category groups
///
/// Groups appear in order of each category's first entry; entries keep
/// their relative order inside a group.
pub fn group_by_category(entries: Vec<QueueEntry>) -> Vec<(Category, Vec<QueueEntry>)> {
    let mut groups: Vec<(Category, Vec<QueueEntry>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(c, _)| *c == entry.category) {
            Some((_, group)) => group.push(entry),
            None => groups.push((entry.category, vec![entry])),
        }
    }
    groups
}
