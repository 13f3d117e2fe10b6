//! Energy-so-far-today from trapezoidal integration of instantaneous power.

use serde::Serialize;

use crate::model::DataPoint;

const SECONDS_PER_HOUR: f64 = 3_600.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntegrateStats {
    pub points: u64,
    pub resets: u64,
    /// Intervals skipped because an endpoint had unknown power.
    pub unknown_intervals: u64,
}

/// Fills `integrated_day` on every point.
///
/// The first point is seeded with the device's own `today`. A point whose
/// `today` reads zero resets the integral; otherwise the trapezoid between the
/// previous and the current point is added.
#[derive(Debug)]
pub struct Integrate<I> {
    inner: I,
    prev: Option<DataPoint>,
    energy: Option<f64>,
    stats: IntegrateStats,
}

impl<I> Integrate<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            prev: None,
            energy: None,
            stats: IntegrateStats::default(),
        }
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }

    pub fn stats(&self) -> IntegrateStats {
        self.stats
    }
}

fn trapezoid(prev: &DataPoint, point: &DataPoint) -> Option<f64> {
    let hours = (point.time - prev.time) as f64 / SECONDS_PER_HOUR;
    Some(0.5 * (prev.currently? + point.currently?) * hours)
}

impl<I: Iterator<Item = DataPoint>> Iterator for Integrate<I> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        let mut point = self.inner.next()?;

        self.energy = match self.prev.as_ref() {
            None => point.today,
            Some(_) if point.today == Some(0.0) => {
                self.stats.resets += 1;
                Some(0.0)
            }
            Some(prev) => match trapezoid(prev, &point) {
                Some(step) => self.energy.map(|energy| energy + step),
                None => {
                    self.stats.unknown_intervals += 1;
                    self.energy
                }
            },
        };

        point.integrated_day = self.energy;
        self.stats.points += 1;
        self.prev = Some(point.clone());
        Some(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("integrated value should be known");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn integrates_between_consecutive_points() {
        let points = vec![
            DataPoint::known(0, 1.0, 2.0, 10.0, 100.0),
            DataPoint::known(3_600, 3.0, 4.1, 12.0, 102.0),
            DataPoint::known(5_400, 1.0, 5.0, 13.0, 103.0),
        ];

        let out: Vec<DataPoint> = Integrate::new(points.into_iter()).collect();
        assert_close(out[0].integrated_day, 2.0);
        assert_close(out[1].integrated_day, 4.0);
        assert_close(out[2].integrated_day, 5.0);
    }

    #[test]
    fn zero_today_resets_the_integral() {
        let points = vec![
            DataPoint::known(0, 2.0, 30.0, 10.0, 100.0),
            DataPoint::known(1_800, 0.0, 0.0, 10.0, 100.0),
            DataPoint::known(5_400, 2.0, 1.0, 11.0, 101.0),
        ];

        let mut stage = Integrate::new(points.into_iter());
        let out: Vec<DataPoint> = stage.by_ref().collect();
        assert_close(out[1].integrated_day, 0.0);
        assert_close(out[2].integrated_day, 1.0);
        assert_eq!(stage.stats().resets, 1);
    }

    #[test]
    fn unknown_power_holds_the_integral() {
        let mut unknown = DataPoint::known(1_800, 0.0, 3.0, 10.0, 100.0);
        unknown.currently = None;
        let points = vec![DataPoint::known(0, 2.0, 2.0, 10.0, 100.0), unknown];

        let mut stage = Integrate::new(points.into_iter());
        let out: Vec<DataPoint> = stage.by_ref().collect();
        assert_close(out[1].integrated_day, 2.0);
        assert_eq!(stage.stats().unknown_intervals, 1);
    }
}
