//! Single-predecessor sanity filter.

use serde::Serialize;
use tracing::debug;

use crate::model::{known_lt, DataPoint};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrubStats {
    pub accepted: u64,
    pub dropped_read_error: u64,
    pub dropped_time: u64,
    pub dropped_lifetime: u64,
}

impl ScrubStats {
    pub fn dropped(&self) -> u64 {
        self.dropped_read_error + self.dropped_time + self.dropped_lifetime
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    ReadError,
    TimeNotIncreasing,
    LifetimeRegressed,
}

/// Drops points flagged as read errors, points whose time does not advance
/// past the last accepted point, and points whose lifetime counter falls
/// below it. Accepted points pass through unchanged.
#[derive(Debug)]
pub struct Scrub<I> {
    inner: I,
    last: Option<DataPoint>,
    stats: ScrubStats,
}

impl<I> Scrub<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            last: None,
            stats: ScrubStats::default(),
        }
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }

    pub fn stats(&self) -> ScrubStats {
        self.stats
    }
}

/// Reason `point` must be dropped given the last accepted point, if any.
fn drop_reason(last: Option<&DataPoint>, point: &DataPoint) -> Option<DropReason> {
    if point.read_error {
        return Some(DropReason::ReadError);
    }
    let last = last?;
    if point.time <= last.time {
        return Some(DropReason::TimeNotIncreasing);
    }
    if known_lt(point.since_installation, last.since_installation) == Some(true) {
        return Some(DropReason::LifetimeRegressed);
    }
    None
}

impl<I: Iterator<Item = DataPoint>> Iterator for Scrub<I> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        loop {
            let point = self.inner.next()?;
            match drop_reason(self.last.as_ref(), &point) {
                None => {
                    self.stats.accepted += 1;
                    self.last = Some(point.clone());
                    return Some(point);
                }
                Some(reason) => {
                    match reason {
                        DropReason::ReadError => self.stats.dropped_read_error += 1,
                        DropReason::TimeNotIncreasing => self.stats.dropped_time += 1,
                        DropReason::LifetimeRegressed => self.stats.dropped_lifetime += 1,
                    }
                    debug!(
                        component = "scrub",
                        event = "scrub.dropped",
                        time = point.time,
                        reason = ?reason
                    );
                }
            }
        }
    }
}
