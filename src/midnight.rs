//! Synthetic boundary points around each local day rollover.

use std::collections::VecDeque;

use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::calendar::{day_end, day_start, local_date};
use crate::model::{known_lt, known_sub, max_known, DataPoint};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MidnightStats {
    pub rollovers: u64,
    pub inserted: u64,
    pub reconciled: u64,
}

/// Brackets every change of local date between consecutive points with an
/// end-of-day copy of the earlier point and start-of-day points whose daily
/// counter is zero.
#[derive(Debug)]
pub struct Midnights<I> {
    inner: I,
    tz: Tz,
    last: Option<DataPoint>,
    ready: VecDeque<DataPoint>,
    stats: MidnightStats,
}

impl<I> Midnights<I> {
    pub fn new(inner: I, tz: Tz) -> Self {
        Self {
            inner,
            tz,
            last: None,
            ready: VecDeque::new(),
            stats: MidnightStats::default(),
        }
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }

    pub fn stats(&self) -> MidnightStats {
        self.stats
    }

    fn is_day_start_marker(&self, point: &DataPoint) -> bool {
        point.today == Some(0.0)
            && point.currently == Some(0.0)
            && local_date(self.tz, point.time).and_then(|date| day_start(self.tz, date))
                == Some(point.time)
    }

    fn bracket(&mut self, prev: &DataPoint, next: &DataPoint) {
        let tz = self.tz;
        let (Some(prev_date), Some(next_date)) =
            (local_date(tz, prev.time), local_date(tz, next.time))
        else {
            return;
        };
        if prev_date == next_date {
            return;
        }
        // Consecutive start-of-day markers already bracket the empty days
        // between them.
        if self.is_day_start_marker(prev) && self.is_day_start_marker(next) {
            return;
        }
        let Some(following) = prev_date.succ_opt() else {
            return;
        };
        let (Some(pm_time), Some(am_time), Some(am2_time)) = (
            day_end(tz, prev_date),
            day_start(tz, following),
            day_start(tz, next_date),
        ) else {
            return;
        };

        let mut pm = prev.clone();
        pm.time = pm_time;
        pm.currently = Some(0.0);

        let mut am = prev.clone();
        am.time = am_time;
        am.today = Some(0.0);
        am.currently = Some(0.0);

        let mut am2 = next.clone();
        am2.time = am2_time;
        am2.today = Some(0.0);
        am2.currently = Some(0.0);
        am2.since_installation = known_sub(next.since_installation, next.today);

        let within_next = known_lt(next.since_installation, am2.since_installation) == Some(false);
        if following == next_date
            && known_lt(pm.since_installation, am2.since_installation) == Some(true)
            && within_next
        {
            pm.since_installation = am2.since_installation;
            am.since_installation = am2.since_installation;
            self.stats.reconciled += 1;
        }
        // Lifetime minus today can undershoot a coarse lifetime counter.
        am2.since_installation = max_known(am2.since_installation, pm.since_installation);

        self.stats.rollovers += 1;
        let mut boundary = vec![pm, am];
        if am2_time != am_time {
            boundary.push(am2);
        }
        for point in boundary {
            // A sample sitting exactly on a boundary already marks it.
            if prev.time < point.time && point.time < next.time {
                self.stats.inserted += 1;
                self.ready.push_back(point);
            }
        }

        debug!(
            component = "midnight",
            event = "midnight.bracketed",
            prev_time = prev.time,
            next_time = next.time,
            days_crossed = (next_date - prev_date).num_days()
        );
    }
}

impl<I: Iterator<Item = DataPoint>> Iterator for Midnights<I> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        if let Some(point) = self.ready.pop_front() {
            return Some(point);
        }

        let point = self.inner.next()?;
        if let Some(prev) = self.last.take() {
            self.bracket(&prev, &point);
        }
        self.last = Some(point.clone());
        self.ready.push_back(point);
        self.ready.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::audit_series;
    use crate::ceiling::DeviceLimits;
    use chrono_tz::America::New_York;

    // 2024-01-15T00:00:00-05:00
    const JAN_15: i64 = 1_705_294_800;
    const DAY: i64 = 86_400;

    fn bracketed(points: Vec<DataPoint>) -> Vec<DataPoint> {
        let out: Vec<DataPoint> = Midnights::new(points.into_iter(), New_York).collect();
        let audit = audit_series(&out, New_York, DeviceLimits::default());
        assert!(audit.is_clean(), "{audit:?}");
        out
    }

    #[test]
    fn single_rollover_inserts_pm_and_am() {
        let evening = DataPoint::known(JAN_15 + DAY - 120, 0.0, 58.2, 300.0, 1_000.0);
        let morning = DataPoint::known(JAN_15 + DAY + 300, 0.2, 0.1, 301.0, 1_000.2);

        let out = bracketed(vec![evening.clone(), morning.clone()]);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], evening);
        assert_eq!(out[3], morning);

        let pm = &out[1];
        assert_eq!(pm.time, JAN_15 + DAY - 1);
        assert_eq!(pm.currently, Some(0.0));
        assert_eq!(pm.today, Some(58.2));

        let am = &out[2];
        assert_eq!(am.time, JAN_15 + DAY);
        assert_eq!(am.currently, Some(0.0));
        assert_eq!(am.today, Some(0.0));

        // Lifetime at midnight is back-calculated from the morning sample.
        let expected = 1_000.2 - 0.1;
        assert!((pm.since_installation.unwrap() - expected).abs() < 1e-9);
        assert!((am.since_installation.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn multi_day_gap_adds_start_of_next_sample_day() {
        let evening = DataPoint::known(JAN_15 + 22 * 3_600, 0.0, 20.0, 300.0, 1_000.0);
        let later = DataPoint::known(JAN_15 + 3 * DAY + 10 * 3_600, 1.5, 3.0, 280.0, 1_050.0);

        let out = bracketed(vec![evening, later]);
        let times: Vec<i64> = out.iter().map(|p| p.time).collect();
        assert_eq!(
            times,
            vec![
                JAN_15 + 22 * 3_600,
                JAN_15 + DAY - 1,
                JAN_15 + DAY,
                JAN_15 + 3 * DAY,
                JAN_15 + 3 * DAY + 10 * 3_600,
            ]
        );
        assert_eq!(out[1].since_installation, Some(1_000.0));
        assert_eq!(out[3].since_installation, Some(1_047.0));
        assert_eq!(out[3].today, Some(0.0));
    }

    #[test]
    fn inconsistent_back_calculation_is_not_reconciled() {
        let evening = DataPoint::known(JAN_15 + DAY - 120, 0.0, 58.2, 300.0, 1_000.0);
        // Lifetime minus today lands below the evening value.
        let morning = DataPoint::known(JAN_15 + DAY + 300, 0.2, 0.5, 301.0, 1_000.2);

        let out = bracketed(vec![evening, morning]);
        assert_eq!(out[1].since_installation, Some(1_000.0));
        assert_eq!(out[2].since_installation, Some(1_000.0));
    }

    #[test]
    fn bracketing_its_own_output_is_a_no_op() {
        let points = vec![
            DataPoint::known(JAN_15 + DAY - 120, 0.0, 58.2, 300.0, 1_000.0),
            DataPoint::known(JAN_15 + DAY + 300, 0.2, 0.1, 301.0, 1_000.2),
            DataPoint::known(JAN_15 + 3 * DAY + 600, 0.3, 0.4, 290.0, 1_030.0),
        ];

        let once = bracketed(points);
        let twice = bracketed(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn coarse_lifetime_never_steps_back_across_a_long_gap() {
        // Today grew by 3 while the rounded lifetime counter moved by 0.5.
        let evening = DataPoint::known(JAN_15 + 22 * 3_600, 0.0, 20.0, 300.0, 1_000.0);
        let later = DataPoint::known(JAN_15 + 3 * DAY + 10 * 3_600, 1.0, 3.0, 280.0, 1_000.5);

        let once = bracketed(vec![evening, later]);
        let lifetimes: Vec<Option<f64>> = once.iter().map(|p| p.since_installation).collect();
        assert_eq!(
            lifetimes,
            vec![
                Some(1_000.0),
                Some(1_000.0),
                Some(1_000.0),
                Some(1_000.0),
                Some(1_000.5)
            ]
        );

        let twice = bracketed(once.clone());
        assert_eq!(twice, once);
    }
}
