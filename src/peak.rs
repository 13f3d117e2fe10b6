//! Running daily peak of instantaneous power.

use crate::model::{max_known, DataPoint};

/// Fills `day_max` with the highest known `currently` since the last point
/// whose `today` reads zero.
#[derive(Debug)]
pub struct DayPeak<I> {
    inner: I,
    peak: Option<f64>,
}

impl<I> DayPeak<I> {
    pub fn new(inner: I) -> Self {
        Self { inner, peak: None }
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I: Iterator<Item = DataPoint>> Iterator for DayPeak<I> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        let mut point = self.inner.next()?;
        if point.today == Some(0.0) {
            self.peak = None;
        }
        self.peak = max_known(self.peak, point.currently);
        point.day_max = self.peak;
        Some(point)
    }
}
