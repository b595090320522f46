use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use uuid::Uuid;

use patentflow_core::OptimizationType;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// One accepted optimization result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub original: String,
    pub optimized: String,
    pub optimization_type: OptimizationType,
    /// Content block the result was applied to, if any.
    #[serde(default)]
    pub block: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        original: impl Into<String>,
        optimized: impl Into<String>,
        optimization_type: OptimizationType,
    ) -> Self {
        Self {
            original: original.into(),
            optimized: optimized.into(),
            optimization_type,
            block: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_block(mut self, id: Uuid) -> Self {
        self.block = Some(id);
        self
    }
}

/// Bounded newest-first list; the oldest entry is evicted when full.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: T) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Entry at `index`, counting from the newest.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new()
    }
}
