//! Data points flowing through the correction stages and the raw diffs they
//! are rebuilt from.
//!
//! Every tracked counter is an `Option<f64>`: `None` means "unknown", which is
//! distinct from a reading of zero. Comparisons between points go through the
//! helpers here so that an unknown value never compares as a concrete one.

use serde::{Deserialize, Deserializer, Serialize};

/// One sample of the solar production series.
///
/// Energies are in kWh, power in kW, `time` in seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub time: i64,
    pub currently: Option<f64>,
    pub today: Option<f64>,
    pub past_week: Option<f64>,
    pub since_installation: Option<f64>,
    pub read_error: bool,
    /// Trapezoidal integral of `currently` since the last daily reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrated_day: Option<f64>,
    /// Running maximum of `currently` since the last daily reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_max: Option<f64>,
}

impl DataPoint {
    /// A point with every counter known.
    pub fn known(
        time: i64,
        currently: f64,
        today: f64,
        past_week: f64,
        since_installation: f64,
    ) -> Self {
        Self {
            time,
            currently: Some(currently),
            today: Some(today),
            past_week: Some(past_week),
            since_installation: Some(since_installation),
            read_error: false,
            integrated_day: None,
            day_max: None,
        }
    }

    /// True when any of the four device counters is unknown.
    ///
    /// Stage-derived fields (`integrated_day`, `day_max`) are not counted.
    pub fn has_absent(&self) -> bool {
        self.currently.is_none()
            || self.today.is_none()
            || self.past_week.is_none()
            || self.since_installation.is_none()
    }

    /// Names of the device counters that are unknown on this point.
    pub fn absent_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.currently.is_none() {
            missing.push("currently");
        }
        if self.today.is_none() {
            missing.push("today");
        }
        if self.past_week.is_none() {
            missing.push("past_week");
        }
        if self.since_installation.is_none() {
            missing.push("since_installation");
        }
        missing
    }

    /// Synthetic points produced by gap synthesis carry an unknown weekly counter.
    pub fn is_synthetic(&self) -> bool {
        self.past_week.is_none()
    }
}

/// `a < b` when both sides are known; unknown otherwise.
pub fn known_lt(a: Option<f64>, b: Option<f64>) -> Option<bool> {
    Some(a? < b?)
}

/// `a - b` when both sides are known.
pub fn known_sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

/// The larger of the known values, or `None` when neither is known.
pub fn max_known(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// One raw poll result: only the fields that changed since the previous poll.
///
/// `time` is always present. A missing `read_error` carries the previous flag
/// forward, same as every other field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDiff {
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currently: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past_week: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_installation: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub read_error: Option<bool>,
}

impl From<&DataPoint> for RawDiff {
    fn from(point: &DataPoint) -> Self {
        Self {
            time: point.time,
            currently: point.currently,
            today: point.today,
            past_week: point.past_week,
            since_installation: point.since_installation,
            read_error: Some(point.read_error),
        }
    }
}

// The acquisition log writes the flag as 0/1.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => None,
        Some(Flag::Bool(value)) => Some(value),
        Some(Flag::Int(value)) => Some(value != 0),
    })
}
