//! Per-metric series for the monitored subject.

use std::num::NonZeroUsize;

use chrono::{Local, TimeZone};
use tracing::debug;

use super::series::{MetricSeries, SeriesSnapshot};
use crate::gateway::message::{Metric, Reading, SensorSample};

/// One charted series. Blood pressure fans out into two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesKey {
    HeartRate,
    OxygenSaturation,
    Temperature,
    Systolic,
    Diastolic,
    Ecg,
}

impl SeriesKey {
    pub const ALL: [SeriesKey; 6] = [
        SeriesKey::HeartRate,
        SeriesKey::OxygenSaturation,
        SeriesKey::Temperature,
        SeriesKey::Systolic,
        SeriesKey::Diastolic,
        SeriesKey::Ecg,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SeriesKey::HeartRate => "Heart rate",
            SeriesKey::OxygenSaturation => "SpO2",
            SeriesKey::Temperature => "Temperature",
            SeriesKey::Systolic => "Systolic",
            SeriesKey::Diastolic => "Diastolic",
            SeriesKey::Ecg => "ECG",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            SeriesKey::HeartRate => "bpm",
            SeriesKey::OxygenSaturation => "%",
            SeriesKey::Temperature => "°C",
            SeriesKey::Systolic | SeriesKey::Diastolic => "mmHg",
            SeriesKey::Ecg => "mV",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    /// The series a scalar metric lands in. Blood pressure has none.
    fn for_scalar(metric: Metric) -> Option<SeriesKey> {
        match metric {
            Metric::HeartRate => Some(SeriesKey::HeartRate),
            Metric::OxygenSaturation => Some(SeriesKey::OxygenSaturation),
            Metric::Temperature => Some(SeriesKey::Temperature),
            Metric::Ecg => Some(SeriesKey::Ecg),
            Metric::BloodPressure => None,
        }
    }
}

/// Wall-clock label for a gateway timestamp (unix seconds).
pub fn time_label(timestamp: f64) -> Option<String> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor() as i64;
    let nanos = ((timestamp - timestamp.floor()) * 1e9) as u32;
    Local
        .timestamp_opt(secs, nanos)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
}

/// Bounded series for every vital sign of one subject.
#[derive(Debug, Clone)]
pub struct Aggregator {
    capacity: NonZeroUsize,
    series: [MetricSeries; 6],
}

impl Aggregator {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            series: SeriesKey::ALL.map(|key| MetricSeries::new(key.label(), capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Append a scalar value. Returns `false` when the metric is not scalar.
    pub fn append(&mut self, metric: Metric, value: f64, time_label: Option<&str>) -> bool {
        let Some(key) = SeriesKey::for_scalar(metric) else {
            debug!(?metric, "ignoring scalar reading for compound metric");
            return false;
        };
        self.series[key.index()].push(value, time_label);
        true
    }

    /// Append one blood pressure reading to both pressure series.
    ///
    /// Systolic and diastolic always hold the same number of points with the
    /// same labels at each index.
    pub fn append_pressure(&mut self, systolic: f64, diastolic: f64, time_label: Option<&str>) {
        let [sys, dia] = self.pressure_mut();
        sys.make_room();
        dia.make_room();
        let label = sys.next_label(time_label);
        sys.push_labeled(systolic, label.clone());
        dia.push_labeled(diastolic, label);
    }

    /// Route a decoded sample into the right series.
    ///
    /// Returns `false` for readings that do not fit the metric.
    pub fn apply(&mut self, sample: &SensorSample) -> bool {
        let label = sample.timestamp.and_then(time_label);
        let label = label.as_deref();
        match (&sample.reading, sample.metric) {
            (Reading::Pressure { systolic, diastolic }, Metric::BloodPressure) => {
                self.append_pressure(*systolic, *diastolic, label);
                true
            }
            (Reading::Waveform(values), Metric::Ecg) => {
                for value in values {
                    self.append(Metric::Ecg, *value, label);
                }
                true
            }
            (Reading::Scalar(value), metric) => self.append(metric, *value, label),
            (reading, metric) => {
                debug!(?metric, ?reading, "ignoring reading that does not match its metric");
                false
            }
        }
    }

    pub fn series(&self, key: SeriesKey) -> &MetricSeries {
        &self.series[key.index()]
    }

    pub fn snapshot(&self, key: SeriesKey) -> SeriesSnapshot {
        self.series[key.index()].snapshot()
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(MetricSeries::is_empty)
    }

    /// Drop every point, e.g. when the monitored subject changes.
    pub fn reset(&mut self) {
        for series in &mut self.series {
            series.clear();
        }
    }

    fn pressure_mut(&mut self) -> [&mut MetricSeries; 2] {
        let [_, _, _, sys, dia, _] = &mut self.series;
        [sys, dia]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::message::Addressing;

    fn aggregator() -> Aggregator {
        Aggregator::new(NonZeroUsize::new(20).unwrap())
    }

    fn sample(metric: Metric, reading: Reading) -> SensorSample {
        SensorSample {
            metric,
            reading,
            addressing: Addressing::default(),
            timestamp: None,
        }
    }

    #[test]
    fn scalar_metrics_land_in_their_series() {
        let mut agg = aggregator();
        assert!(agg.apply(&sample(Metric::HeartRate, Reading::Scalar(72.0))));
        assert!(agg.apply(&sample(Metric::Temperature, Reading::Scalar(36.7))));

        assert_eq!(agg.series(SeriesKey::HeartRate).len(), 1);
        assert_eq!(agg.series(SeriesKey::Temperature).len(), 1);
        assert!(agg.series(SeriesKey::OxygenSaturation).is_empty());
    }

    #[test]
    fn each_series_is_capped() {
        let mut agg = aggregator();
        for i in 0..30 {
            agg.append(Metric::OxygenSaturation, 90.0 + i as f64 * 0.1, None);
        }
        let snapshot = agg.snapshot(SeriesKey::OxygenSaturation);
        assert_eq!(snapshot.points.len(), 20);
        assert!((snapshot.points[0].value - 91.0).abs() < 1e-9);
    }

    #[test]
    fn pressure_series_stay_co_indexed() {
        let mut agg = aggregator();
        for i in 0..25 {
            let reading = Reading::Pressure {
                systolic: 110.0 + i as f64,
                diastolic: 70.0 + i as f64,
            };
            agg.apply(&sample(Metric::BloodPressure, reading));
        }

        let sys = agg.snapshot(SeriesKey::Systolic);
        let dia = agg.snapshot(SeriesKey::Diastolic);
        assert_eq!(sys.points.len(), 20);
        assert_eq!(dia.points.len(), 20);
        for (s, d) in sys.points.iter().zip(dia.points.iter()) {
            assert_eq!(s.time_label, d.time_label);
            assert!((s.value - d.value - 40.0).abs() < 1e-9);
        }
    }

    #[test]
    fn scalar_pressure_is_ignored() {
        let mut agg = aggregator();
        assert!(!agg.apply(&sample(Metric::BloodPressure, Reading::Scalar(120.0))));
        assert!(!agg.append(Metric::BloodPressure, 120.0, None));
        assert!(agg.is_empty());
    }

    #[test]
    fn ecg_burst_appends_every_value() {
        let mut agg = aggregator();
        agg.apply(&sample(Metric::Ecg, Reading::Waveform(vec![0.1, 0.2, 0.3])));
        let values: Vec<f64> = agg.snapshot(SeriesKey::Ecg).values().collect();
        assert_eq!(values, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn timestamps_become_clock_labels() {
        let mut agg = aggregator();
        let mut s = sample(Metric::HeartRate, Reading::Scalar(70.0));
        s.timestamp = Some(1_718_000_000.0);
        agg.apply(&s);
        let label = agg.snapshot(SeriesKey::HeartRate).points[0].time_label.clone();
        assert_eq!(label.len(), 8);
        assert_eq!(label.matches(':').count(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut agg = aggregator();
        agg.append(Metric::HeartRate, 70.0, None);
        agg.append_pressure(120.0, 80.0, None);
        agg.reset();
        assert!(agg.is_empty());
    }
}
