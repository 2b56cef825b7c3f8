//! # Recent Event Index
//!
//! Rolling two-generation set of recently seen event ids. Gossip delivers
//! the same event along many paths; everything after the first copy is
//! dropped here before any peer budget is charged.
//!
//! Ids are stored as salted digests with a fresh salt per generation, so a
//! peer cannot probe the index with precomputed ids. Rolling replaces the
//! older generation wholesale, which caps memory without per-entry clocks.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use shared_crypto::salted_digest;
use shared_types::{EventId, Hash};

/// Default generation lifetime.
pub const DEFAULT_ROLL_INTERVAL: Duration = Duration::from_secs(300);

/// Default maximum entries per generation.
pub const DEFAULT_MAX_ENTRIES: usize = 262_144;

/// Rolling duplicate-suppression index.
#[derive(Debug)]
pub struct RecentEventIndex {
    current: HashSet<Hash>,
    previous: HashSet<Hash>,
    salt_current: u64,
    salt_previous: u64,
    last_roll: Instant,
    roll_interval: Duration,
    max_entries: usize,
}

impl RecentEventIndex {
    /// Creates an index with default window and capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_params(DEFAULT_ROLL_INTERVAL, DEFAULT_MAX_ENTRIES)
    }

    /// Creates an index with a custom window and per-generation capacity.
    #[must_use]
    pub fn with_params(roll_interval: Duration, max_entries: usize) -> Self {
        Self {
            current: HashSet::with_capacity(max_entries / 2),
            previous: HashSet::new(),
            salt_current: rand::random(),
            salt_previous: rand::random(),
            last_roll: Instant::now(),
            roll_interval,
            max_entries,
        }
    }

    /// Records `id` and reports whether it was new.
    ///
    /// Returns false for an id seen within the last two generations.
    pub fn observe(&mut self, id: &EventId) -> bool {
        if self.last_roll.elapsed() >= self.roll_interval || self.current.len() >= self.max_entries
        {
            self.roll();
        }

        if self.current.contains(&salted_digest(self.salt_current, id))
            || self.previous.contains(&salted_digest(self.salt_previous, id))
        {
            return false;
        }
        self.current.insert(salted_digest(self.salt_current, id));
        true
    }

    /// Removes `id` from both generations.
    ///
    /// An event bounced by a full stage queue was never admitted; forgetting
    /// it keeps the retry path open.
    pub fn forget(&mut self, id: &EventId) {
        self.current.remove(&salted_digest(self.salt_current, id));
        self.previous.remove(&salted_digest(self.salt_previous, id));
    }

    /// Retires the older generation and starts a fresh one.
    pub fn roll(&mut self) {
        self.previous = std::mem::take(&mut self.current);
        self.current = HashSet::with_capacity(self.max_entries / 2);
        self.salt_previous = self.salt_current;
        self.salt_current = rand::random();
        self.last_roll = Instant::now();
    }

    /// Entries across both generations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len() + self.previous.len()
    }

    /// Whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.previous.is_empty()
    }
}

impl Default for RecentEventIndex {
    fn default() -> Self {
        Self::new()
    }
}
