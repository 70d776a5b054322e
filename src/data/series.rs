//! Bounded time series for charting.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::Serialize;

/// Default number of points kept per series.
pub const DEFAULT_CAPACITY: usize = 20;

/// Unit suffix for index-derived time labels.
const FALLBACK_UNIT: &str = "s";

/// A single charted value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub time_label: String,
    pub value: f64,
}

/// Immutable view of a series at one moment.
///
/// Every mutation of the series produces a new snapshot; previously handed
/// out snapshots never change.
#[derive(Debug, Clone)]
pub struct SeriesSnapshot {
    pub label: &'static str,
    pub version: u64,
    pub points: Arc<[Point]>,
}

impl SeriesSnapshot {
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    pub fn latest(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Whether two snapshots share the same underlying points.
    pub fn same_as(&self, other: &SeriesSnapshot) -> bool {
        Arc::ptr_eq(&self.points, &other.points)
    }
}

/// FIFO of at most `capacity` points.
#[derive(Debug, Clone)]
pub struct MetricSeries {
    label: &'static str,
    capacity: NonZeroUsize,
    points: VecDeque<Point>,
    snapshot: SeriesSnapshot,
}

impl MetricSeries {
    pub fn new(label: &'static str, capacity: NonZeroUsize) -> Self {
        Self {
            label,
            capacity,
            points: VecDeque::with_capacity(capacity.get()),
            snapshot: SeriesSnapshot {
                label,
                version: 0,
                points: Arc::from(Vec::new()),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Evict the oldest point if the series is full.
    ///
    /// Returns the evicted point. Callers that need a label for the next
    /// point must evict first so the fallback label reflects the new length.
    pub fn make_room(&mut self) -> Option<Point> {
        if self.points.len() >= self.capacity.get() {
            self.points.pop_front()
        } else {
            None
        }
    }

    /// Label for a point appended now: the explicit one if given, otherwise
    /// the current length plus a unit suffix.
    pub fn next_label(&self, explicit: Option<&str>) -> String {
        match explicit {
            Some(label) => label.to_string(),
            None => format!("{}{}", self.points.len(), FALLBACK_UNIT),
        }
    }

    /// Append a value, evicting the oldest point when full.
    pub fn push(&mut self, value: f64, time_label: Option<&str>) -> Option<Point> {
        let evicted = self.make_room();
        let time_label = self.next_label(time_label);
        self.push_labeled(value, time_label);
        evicted
    }

    /// Append with a precomputed label. The caller has already made room.
    pub(crate) fn push_labeled(&mut self, value: f64, time_label: String) {
        debug_assert!(self.points.len() < self.capacity.get());
        self.points.push_back(Point { time_label, value });
        self.publish();
    }

    pub fn clear(&mut self) {
        if self.points.is_empty() {
            return;
        }
        self.points.clear();
        self.publish();
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        self.snapshot.clone()
    }

    fn publish(&mut self) {
        self.snapshot = SeriesSnapshot {
            label: self.label,
            version: self.snapshot.version + 1,
            points: self.points.iter().cloned().collect(),
        };
    }
}
