//! Rebuilds full snapshots from a stream of raw diffs.

use thiserror::Error;
use tracing::warn;

use crate::model::{DataPoint, RawDiff};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UndiffError {
    #[error("first raw record at {time} does not seed fields: {missing:?}")]
    IncompleteSeed {
        time: i64,
        missing: Vec<&'static str>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UndiffStats {
    pub records: u64,
}

/// Overlays each diff onto the running snapshot and yields a copy.
#[derive(Debug)]
pub struct Undiff<I> {
    inner: I,
    current: Option<DataPoint>,
    seed_pending: bool,
    stats: UndiffStats,
}

/// Un-differences `diffs`, failing fast when the first record cannot seed a
/// full snapshot. An empty input yields an empty stream.
pub fn undiff<T>(diffs: T) -> Result<Undiff<T::IntoIter>, UndiffError>
where
    T: IntoIterator<Item = RawDiff>,
{
    let mut inner = diffs.into_iter();
    let current = inner.next().map(seed).transpose()?;
    Ok(Undiff {
        inner,
        current,
        seed_pending: true,
        stats: UndiffStats::default(),
    })
}

fn seed(diff: RawDiff) -> Result<DataPoint, UndiffError> {
    let point = DataPoint {
        time: diff.time,
        currently: diff.currently,
        today: diff.today,
        past_week: diff.past_week,
        since_installation: diff.since_installation,
        read_error: diff.read_error.unwrap_or_default(),
        integrated_day: None,
        day_max: None,
    };

    let mut missing = point.absent_fields();
    if diff.read_error.is_none() {
        missing.push("read_error");
    }
    if !missing.is_empty() {
        warn!(
            component = "undiff",
            event = "undiff.seed.incomplete",
            time = diff.time,
            missing = ?missing
        );
        return Err(UndiffError::IncompleteSeed {
            time: diff.time,
            missing,
        });
    }

    Ok(point)
}

impl<I> Undiff<I> {
    pub fn stats(&self) -> UndiffStats {
        self.stats
    }
}

impl<I: Iterator<Item = RawDiff>> Iterator for Undiff<I> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        if self.seed_pending {
            self.seed_pending = false;
            self.current.as_ref()?;
        } else {
            let diff = self.inner.next()?;
            let current = self.current.as_mut()?;
            current.time = diff.time;
            current.currently = diff.currently.or(current.currently);
            current.today = diff.today.or(current.today);
            current.past_week = diff.past_week.or(current.past_week);
            current.since_installation = diff.since_installation.or(current.since_installation);
            current.read_error = diff.read_error.unwrap_or(current.read_error);
        }
        self.stats.records += 1;
        self.current.clone()
    }
}
