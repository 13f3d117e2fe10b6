//! Lookahead correction of outages and sub-resolution noise.
//!
//! Points are held in arrival order until they carry enough change over the
//! last emitted point to count as new information. While they wait, a later
//! weekly counter can prove that production was recorded during a stretch the
//! raw log has no samples for; those samples are synthesized and emitted ahead
//! of the buffered points.

use std::collections::VecDeque;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use crate::calendar::{local_time, WEEK_SECONDS};
use crate::model::{known_sub, max_known, DataPoint};

/// 2015-01-01T00:00:00-05:00, start of the recorded history.
pub const DEFAULT_EPOCH_START: i64 = 1_420_088_400;

/// Changes smaller than these are treated as sensor resolution noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseThresholds {
    pub today: f64,
    pub past_week: f64,
    pub since_installation: f64,
}

impl Default for NoiseThresholds {
    fn default() -> Self {
        Self {
            today: 0.3,
            past_week: 2.0,
            since_installation: 20.0,
        }
    }
}

/// What a synthesized sample reports for `currently` and `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightPolicy {
    /// Zero before the given local time, unknown afterwards.
    ZeroBefore(NaiveTime),
    /// Always unknown.
    Unknown,
}

impl Default for NightPolicy {
    fn default() -> Self {
        Self::ZeroBefore(NaiveTime::from_hms_opt(4, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackfillConfig {
    /// Time of the sentinel that precedes the first emitted point.
    pub epoch_start: i64,
    /// Span covered by the device's trailing weekly counter.
    pub week_seconds: i64,
    pub thresholds: NoiseThresholds,
    pub night_policy: NightPolicy,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            epoch_start: DEFAULT_EPOCH_START,
            week_seconds: WEEK_SECONDS,
            thresholds: NoiseThresholds::default(),
            night_policy: NightPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillStats {
    pub emitted: u64,
    pub synthesized: u64,
    pub discarded_read_error: u64,
    pub clamped_time: u64,
    pub forced: u64,
    pub max_buffered: usize,
}

#[derive(Debug)]
pub struct Backfill<I> {
    inner: I,
    cfg: BackfillConfig,
    tz: Tz,
    buf: VecDeque<DataPoint>,
    ready: VecDeque<DataPoint>,
    popped: DataPoint,
    exhausted: bool,
    stats: BackfillStats,
}

impl<I> Backfill<I> {
    pub fn new(inner: I, cfg: BackfillConfig, tz: Tz) -> Self {
        let sentinel = DataPoint {
            time: cfg.epoch_start,
            currently: None,
            today: Some(0.0),
            past_week: Some(0.0),
            since_installation: Some(0.0),
            read_error: false,
            integrated_day: None,
            day_max: None,
        };
        Self {
            inner,
            cfg,
            tz,
            buf: VecDeque::new(),
            ready: VecDeque::new(),
            popped: sentinel,
            exhausted: false,
            stats: BackfillStats::default(),
        }
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }

    pub fn stats(&self) -> BackfillStats {
        self.stats
    }

    fn push(&mut self, point: DataPoint) {
        self.buf.push_back(point);
        self.stats.max_buffered = self.stats.max_buffered.max(self.buf.len());
        self.drain_settled();
        self.fill_week_gap();
    }

    /// Releases front points that need no correction and cannot contribute one.
    fn drain_settled(&mut self) {
        while let Some(front) = self.buf.front() {
            if !self.is_settled(front) {
                break;
            }
            if let Some(front) = self.buf.pop_front() {
                self.release(front);
            }
        }
    }

    fn is_settled(&self, front: &DataPoint) -> bool {
        front.has_absent() || self.popped.has_absent() || self.is_uninformative(front)
    }

    fn is_uninformative(&self, front: &DataPoint) -> bool {
        let t = &self.cfg.thresholds;
        let popped = &self.popped;
        match (
            known_sub(front.today, popped.today),
            known_sub(front.past_week, popped.past_week),
            known_sub(front.since_installation, popped.since_installation),
        ) {
            (Some(today), Some(week), Some(lifetime)) => {
                today < t.today && week.abs() < t.past_week && lifetime < t.since_installation
            }
            _ => true,
        }
    }

    /// Once the buffer spans more than a week, synthesizes the samples its
    /// weekly counters vouch for and forces out the front point.
    fn fill_week_gap(&mut self) {
        let (Some(front), Some(back)) = (self.buf.front(), self.buf.back()) else {
            return;
        };
        let week = self.cfg.week_seconds;
        if back.time - week <= front.time {
            return;
        }

        let front_time = front.time;
        let popped_time = self.popped.time;
        let mut synthesized: Vec<DataPoint> = self
            .buf
            .iter()
            .filter(|b| !b.read_error && b.past_week.is_some_and(|w| w != 0.0))
            .filter(|b| {
                let at = b.time - week;
                popped_time < at && at < front_time
            })
            .map(|b| self.synthesize(b))
            .collect();
        synthesized.sort_by_key(|p| p.time);

        if let (Some(first), Some(last)) = (synthesized.first(), synthesized.last()) {
            info!(
                component = "backfill",
                event = "backfill.synthesized",
                count = synthesized.len(),
                first_time = first.time,
                last_time = last.time,
                after_time = popped_time,
                before_time = front_time
            );
        }
        self.stats.synthesized += synthesized.len() as u64;
        for point in synthesized.into_iter().rev() {
            self.buf.push_front(point);
        }

        if let Some(front) = self.buf.pop_front() {
            self.stats.forced += 1;
            self.release(front);
        }
    }

    /// Sample one week before `witness`, bounded below by the last emission.
    fn synthesize(&self, witness: &DataPoint) -> DataPoint {
        let time = witness.time - self.cfg.week_seconds;
        let night = match self.cfg.night_policy {
            NightPolicy::ZeroBefore(cutoff) => {
                local_time(self.tz, time).is_some_and(|local| local < cutoff)
            }
            NightPolicy::Unknown => false,
        };
        let idle = night.then_some(0.0);

        DataPoint {
            time,
            currently: idle,
            today: idle,
            past_week: None,
            since_installation: max_known(
                known_sub(witness.since_installation, witness.past_week),
                self.popped.since_installation,
            ),
            read_error: false,
            integrated_day: None,
            day_max: None,
        }
    }

    fn release(&mut self, mut point: DataPoint) {
        if point.read_error {
            self.stats.discarded_read_error += 1;
            debug!(
                component = "backfill",
                event = "backfill.read_error.discarded",
                time = point.time
            );
            return;
        }
        if point.time < self.popped.time {
            debug!(
                component = "backfill",
                event = "backfill.time.clamped",
                time = point.time,
                clamped_to = self.popped.time
            );
            point.time = self.popped.time;
            self.stats.clamped_time += 1;
        }
        self.stats.emitted += 1;
        self.popped = point.clone();
        self.ready.push_back(point);
    }

    fn flush(&mut self) {
        while let Some(point) = self.buf.pop_front() {
            self.release(point);
        }
    }
}

impl<I: Iterator<Item = DataPoint>> Iterator for Backfill<I> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        loop {
            if let Some(point) = self.ready.pop_front() {
                return Some(point);
            }
            if self.exhausted {
                return None;
            }
            match self.inner.next() {
                Some(point) => self.push(point),
                None => {
                    self.exhausted = true;
                    self.flush();
                }
            }
        }
    }
}
