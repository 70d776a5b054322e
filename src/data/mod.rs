//! Vital-sign data held for display.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing of configured durations and countdown formatting
//! - [`series`]: Bounded FIFO series with immutable snapshots
//! - [`aggregator`]: One series per vital sign, with blood pressure fanned out
//!
//! ## Data Flow
//!
//! ```text
//! SensorSample (decoded frame)
//!        │
//!        ▼
//! Aggregator::apply()
//!        │
//!        ├──▶ scalar metric  ──▶ MetricSeries::push()
//!        ├──▶ blood pressure ──▶ systolic + diastolic (shared label)
//!        └──▶ ECG burst      ──▶ one push per value
//!                                      │
//!                                      ▼
//!                               SeriesSnapshot (Arc<[Point]>)
//! ```

pub mod aggregator;
pub mod duration;
pub mod series;

pub use aggregator::{Aggregator, SeriesKey};
pub use series::{MetricSeries, Point, SeriesSnapshot, DEFAULT_CAPACITY};
