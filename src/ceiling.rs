//! Device power ceiling.
//!
//! The inverter array cannot produce more than its rated output, so a higher
//! `currently` is a reporting glitch and is clamped. A jump in `today` whose
//! implied average power exceeds the ceiling is the signature of sub-devices
//! that stopped reporting and later delivered their backlog at once; such
//! intervals are counted but left untouched.

use serde::Serialize;
use tracing::debug;

use crate::model::DataPoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceLimits {
    pub ceiling_kw: f64,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self { ceiling_kw: 4.1 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CeilingStats {
    pub clamped: u64,
    pub catch_up_intervals: u64,
}

#[derive(Debug)]
pub struct PowerCeiling<I> {
    inner: I,
    limits: DeviceLimits,
    prev: Option<DataPoint>,
    stats: CeilingStats,
}

impl<I> PowerCeiling<I> {
    pub fn new(inner: I, limits: DeviceLimits) -> Self {
        Self {
            inner,
            limits,
            prev: None,
            stats: CeilingStats::default(),
        }
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }

    pub fn stats(&self) -> CeilingStats {
        self.stats
    }
}

/// Average power implied by the growth of `today` between two points of the
/// same day.
pub fn implied_average_kw(prev: &DataPoint, point: &DataPoint) -> Option<f64> {
    let delta = point.today? - prev.today?;
    let seconds = point.time - prev.time;
    if delta <= 0.0 || seconds <= 0 {
        return None;
    }
    Some(delta * 3_600.0 / seconds as f64)
}

impl<I: Iterator<Item = DataPoint>> Iterator for PowerCeiling<I> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        let mut point = self.inner.next()?;
        let ceiling = self.limits.ceiling_kw;

        if let Some(implied) = self
            .prev
            .as_ref()
            .and_then(|prev| implied_average_kw(prev, &point))
        {
            if implied > ceiling {
                self.stats.catch_up_intervals += 1;
                debug!(
                    component = "ceiling",
                    event = "ceiling.catch_up",
                    time = point.time,
                    implied_kw = implied,
                    ceiling_kw = ceiling
                );
            }
        }
        self.prev = Some(point.clone());

        if let Some(currently) = point.currently.filter(|kw| *kw > ceiling) {
            self.stats.clamped += 1;
            debug!(
                component = "ceiling",
                event = "ceiling.clamped",
                time = point.time,
                reported_kw = currently,
                ceiling_kw = ceiling
            );
            point.currently = Some(ceiling);
        }

        Some(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_power_above_ceiling() {
        let points = vec![
            DataPoint::known(0, 3.9, 1.0, 10.0, 100.0),
            DataPoint::known(60, 5.2, 1.05, 10.0, 100.05),
        ];

        let mut stage = PowerCeiling::new(points.into_iter(), DeviceLimits::default());
        let out: Vec<DataPoint> = stage.by_ref().collect();
        assert_eq!(out[0].currently, Some(3.9));
        assert_eq!(out[1].currently, Some(4.1));
        assert_eq!(stage.stats().clamped, 1);
        assert_eq!(stage.stats().catch_up_intervals, 0);
    }

    #[test]
    fn counts_backlog_delivered_faster_than_the_array_can_produce() {
        let points = vec![
            DataPoint::known(0, 2.0, 1.0, 10.0, 100.0),
            // 1.5 kWh in 10 minutes is 9 kW on average.
            DataPoint::known(600, 2.0, 2.5, 11.5, 101.5),
            DataPoint::known(660, 0.0, 0.0, 11.5, 101.5),
        ];

        let mut stage = PowerCeiling::new(points.into_iter(), DeviceLimits::default());
        assert_eq!(stage.by_ref().count(), 3);
        assert_eq!(stage.stats().catch_up_intervals, 1);
    }
}
