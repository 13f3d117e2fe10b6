//! Invariant audit over a corrected series.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::local_date;
use crate::ceiling::DeviceLimits;
use crate::model::{known_lt, DataPoint};

/// Violation counts over a corrected series.
///
/// The lifetime counter is required never to decrease. The stricter rule that
/// it must grow whenever `today` grows is relaxed to the informational
/// `lifetime_stalls` count, since the device rounds the lifetime counter far
/// more coarsely than the daily one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesAudit {
    pub points: u64,
    pub time_regressions: u64,
    pub lifetime_regressions: u64,
    pub daily_regressions: u64,
    pub unreset_day_starts: u64,
    pub ceiling_breaches: u64,
    pub read_errors: u64,
    /// `today` grew while the lifetime counter stood still. Coarse lifetime
    /// rounding makes this common in raw data, so it does not fail the audit.
    pub lifetime_stalls: u64,
    /// Points whose weekly counter is unknown, i.e. synthesized from a later
    /// weekly reading.
    pub synthetic: u64,
    pub first_violation: Option<String>,
}

impl SeriesAudit {
    pub fn is_clean(&self) -> bool {
        self.time_regressions == 0
            && self.lifetime_regressions == 0
            && self.daily_regressions == 0
            && self.unreset_day_starts == 0
            && self.ceiling_breaches == 0
            && self.read_errors == 0
    }
}

fn note(first_violation: &mut Option<String>, detail: impl FnOnce() -> String) {
    if first_violation.is_none() {
        *first_violation = Some(detail());
    }
}

pub fn audit_series(points: &[DataPoint], tz: Tz, limits: DeviceLimits) -> SeriesAudit {
    let mut audit = SeriesAudit {
        points: points.len() as u64,
        ..SeriesAudit::default()
    };

    for point in points {
        if point.is_synthetic() {
            audit.synthetic += 1;
        }
        if point.read_error {
            audit.read_errors += 1;
            note(&mut audit.first_violation, || {
                format!("read error flagged at {}", point.time)
            });
        }
        if point.currently.is_some_and(|kw| kw > limits.ceiling_kw) {
            audit.ceiling_breaches += 1;
            note(&mut audit.first_violation, || {
                format!("power above ceiling at {}", point.time)
            });
        }
    }

    for pair in points.windows(2) {
        let (prev, point) = (&pair[0], &pair[1]);

        if point.time <= prev.time {
            audit.time_regressions += 1;
            note(&mut audit.first_violation, || {
                format!("time {} does not follow {}", point.time, prev.time)
            });
        }
        if known_lt(point.since_installation, prev.since_installation) == Some(true) {
            audit.lifetime_regressions += 1;
            note(&mut audit.first_violation, || {
                format!("lifetime counter regressed at {}", point.time)
            });
        }

        if local_date(tz, point.time) == local_date(tz, prev.time) {
            if known_lt(point.today, prev.today) == Some(true) {
                audit.daily_regressions += 1;
                note(&mut audit.first_violation, || {
                    format!("daily counter regressed at {}", point.time)
                });
            }
            if known_lt(prev.today, point.today) == Some(true)
                && known_lt(prev.since_installation, point.since_installation) == Some(false)
            {
                audit.lifetime_stalls += 1;
            }
        } else if point.today != Some(0.0) {
            audit.unreset_day_starts += 1;
            note(&mut audit.first_violation, || {
                format!("first point of the day at {} has non-zero today", point.time)
            });
        }
    }

    audit
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    // 2024-01-15T00:00:00-05:00
    const JAN_15: i64 = 1_705_294_800;

    #[test]
    fn clean_series_passes() {
        let points = vec![
            DataPoint::known(JAN_15 + 3_600, 0.0, 0.0, 10.0, 100.0),
            DataPoint::known(JAN_15 + 7_200, 1.0, 0.5, 10.5, 100.5),
            DataPoint::known(JAN_15 + 10_800, 1.0, 1.5, 11.5, 101.5),
        ];

        let audit = audit_series(&points, New_York, DeviceLimits::default());
        assert!(audit.is_clean(), "{audit:?}");
        assert_eq!(audit.points, 3);
        assert_eq!(audit.synthetic, 0);
    }

    #[test]
    fn stalls_and_synthetic_points_do_not_fail_the_audit() {
        let mut synthetic = DataPoint::known(JAN_15 + 3_600, 0.0, 0.0, 0.0, 100.0);
        synthetic.past_week = None;
        let points = vec![
            synthetic,
            DataPoint::known(JAN_15 + 7_200, 1.0, 0.5, 10.5, 100.0),
        ];

        let audit = audit_series(&points, New_York, DeviceLimits::default());
        assert!(audit.is_clean(), "{audit:?}");
        assert_eq!(audit.synthetic, 1);
        assert_eq!(audit.lifetime_stalls, 1);
    }

    #[test]
    fn reports_each_violation_kind() {
        let mut glitch = DataPoint::known(JAN_15 + 7_200, 5.0, 0.4, 10.5, 99.0);
        glitch.read_error = true;
        let points = vec![
            DataPoint::known(JAN_15 + 7_200, 1.0, 0.5, 10.5, 100.5),
            glitch,
            DataPoint::known(JAN_15 + 86_400 + 600, 0.2, 0.3, 10.5, 100.8),
        ];

        let audit = audit_series(&points, New_York, DeviceLimits::default());
        assert!(!audit.is_clean());
        assert_eq!(audit.read_errors, 1);
        assert_eq!(audit.ceiling_breaches, 1);
        assert_eq!(audit.time_regressions, 1);
        assert_eq!(audit.lifetime_regressions, 1);
        assert_eq!(audit.daily_regressions, 1);
        assert_eq!(audit.unreset_day_starts, 1);
        assert_eq!(
            audit.first_violation.as_deref(),
            Some("read error flagged at 1705302000")
        );
    }
}
