//! Rollback of recent inserts.
//!
//! These operate on the decoded in-memory list between one read and the
//! following write-back, so a rollback of many items costs a single write.

use chrono::{DateTime, Utc};

use super::{CollectionItem, StoreError, StoreResult};

/// Inclusive timestamp range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Self> {
        if start > end {
            return Err(StoreError::validation(format!(
                "range start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Items without a timestamp are never in range
    pub fn contains(&self, at: Option<DateTime<Utc>>) -> bool {
        at.is_some_and(|at| at >= self.start && at <= self.end)
    }
}

/// Remove the most recently inserted item
pub fn rollback_last<T>(items: &mut Vec<T>) -> Option<T> {
    items.pop()
}

/// Remove the most recently inserted item matching `predicate`
pub fn rollback_last_matching<T, P>(items: &mut Vec<T>, predicate: P) -> Option<T>
where
    P: Fn(&T) -> bool,
{
    let idx = items.iter().rposition(predicate)?;
    Some(items.remove(idx))
}

/// Remove every item whose timestamp falls in `range`, keeping the order of the rest
pub fn rollback_range<T: CollectionItem>(items: &mut Vec<T>, range: &TimeRange) -> Vec<T> {
    let (removed, kept): (Vec<T>, Vec<T>) = std::mem::take(items)
        .into_iter()
        .partition(|item| range.contains(item.created_at()));
    *items = kept;
    removed
}
