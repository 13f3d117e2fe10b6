//! Composition of the correction stages.
//!
//! Reference chain: undiff -> scrub -> [backfill] -> midnights -> ceiling ->
//! day peak -> integrate. Every stage is a lazy iterator adapter; nothing is
//! pulled from the raw source until the consumer asks for output.

use std::env;

use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::backfill::{Backfill, BackfillConfig, BackfillStats};
use crate::ceiling::{CeilingStats, DeviceLimits, PowerCeiling};
use crate::integrate::{Integrate, IntegrateStats};
use crate::midnight::{MidnightStats, Midnights};
use crate::model::{DataPoint, RawDiff};
use crate::observability::parse_bool;
use crate::peak::DayPeak;
use crate::scrub::{Scrub, ScrubStats};
use crate::undiff::{undiff, UndiffError};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Zone whose local midnight resets the daily counter.
    pub timezone: Tz,
    /// Lookahead correction runs only when configured.
    pub backfill: Option<BackfillConfig>,
    pub device: DeviceLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            backfill: None,
            device: DeviceLimits::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Undiff(#[from] UndiffError),
    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrectionReport {
    pub raw_records: u64,
    pub output_points: u64,
    pub scrub: ScrubStats,
    pub backfill: Option<BackfillStats>,
    pub midnight: MidnightStats,
    pub ceiling: CeilingStats,
    pub integrate: IntegrateStats,
}

/// Stage constructors on any series of data points.
pub trait SeriesExt: Iterator<Item = DataPoint> + Sized {
    fn scrub(self) -> Scrub<Self> {
        Scrub::new(self)
    }

    fn backfill(self, cfg: BackfillConfig, tz: Tz) -> Backfill<Self> {
        Backfill::new(self, cfg, tz)
    }

    fn bracket_midnights(self, tz: Tz) -> Midnights<Self> {
        Midnights::new(self, tz)
    }

    fn cap_power(self, limits: DeviceLimits) -> PowerCeiling<Self> {
        PowerCeiling::new(self, limits)
    }

    fn day_peak(self) -> DayPeak<Self> {
        DayPeak::new(self)
    }

    fn integrate(self) -> Integrate<Self> {
        Integrate::new(self)
    }
}

impl<I: Iterator<Item = DataPoint>> SeriesExt for I {}

/// Reads `ENVOY_TZ`, `ENVOY_BACKFILL`, `ENVOY_EPOCH_START` and
/// `ENVOY_CEILING_KW`. Unparseable values keep the default.
pub fn pipeline_config_from_env() -> PipelineConfig {
    let mut config = PipelineConfig::default();

    if let Ok(raw) = env::var("ENVOY_TZ") {
        if let Ok(tz) = raw.trim().parse::<Tz>() {
            config.timezone = tz;
        }
    }

    if let Ok(raw) = env::var("ENVOY_BACKFILL") {
        if let Some(enabled) = parse_bool(&raw) {
            config.backfill = enabled.then(BackfillConfig::default);
        }
    }

    if let (Some(backfill), Ok(raw)) = (config.backfill.as_mut(), env::var("ENVOY_EPOCH_START")) {
        if let Ok(epoch_start) = raw.trim().parse::<i64>() {
            backfill.epoch_start = epoch_start;
        }
    }

    if let Ok(raw) = env::var("ENVOY_CEILING_KW") {
        if let Ok(ceiling_kw) = raw.trim().parse::<f64>() {
            config.device.ceiling_kw = ceiling_kw;
        }
    }

    config
}

pub fn validate_config(cfg: &PipelineConfig) -> Result<(), PipelineError> {
    if !(cfg.device.ceiling_kw.is_finite() && cfg.device.ceiling_kw > 0.0) {
        return Err(PipelineError::InvalidConfig(
            "ceiling_kw must be a positive number".to_string(),
        ));
    }

    if let Some(backfill) = &cfg.backfill {
        if backfill.week_seconds <= 0 {
            return Err(PipelineError::InvalidConfig(
                "week_seconds must be > 0".to_string(),
            ));
        }
        let t = &backfill.thresholds;
        for (name, value) in [
            ("today", t.today),
            ("past_week", t.past_week),
            ("since_installation", t.since_installation),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PipelineError::InvalidConfig(format!(
                    "noise threshold {name} must be a non-negative number"
                )));
            }
        }
    }

    Ok(())
}

/// Lazily corrected series. Fails only when the first raw record cannot seed
/// a snapshot.
pub fn corrected_stream<T>(
    diffs: T,
    cfg: &PipelineConfig,
) -> Result<Box<dyn Iterator<Item = DataPoint>>, PipelineError>
where
    T: IntoIterator<Item = RawDiff>,
    T::IntoIter: 'static,
{
    validate_config(cfg)?;
    let tz = cfg.timezone;
    let head = undiff(diffs)?.scrub();

    Ok(match cfg.backfill {
        Some(backfill) => Box::new(tail(head.backfill(backfill, tz), cfg)),
        None => Box::new(tail(head, cfg)),
    })
}

type Tail<I> = Integrate<DayPeak<PowerCeiling<Midnights<I>>>>;

fn tail<I: Iterator<Item = DataPoint>>(head: I, cfg: &PipelineConfig) -> Tail<I> {
    head.bracket_midnights(cfg.timezone)
        .cap_power(cfg.device)
        .day_peak()
        .integrate()
}

/// Runs the whole pipeline to completion and reports what every stage did.
pub fn correct_series<T>(
    diffs: T,
    cfg: &PipelineConfig,
) -> Result<(Vec<DataPoint>, CorrectionReport), PipelineError>
where
    T: IntoIterator<Item = RawDiff>,
{
    validate_config(cfg)?;
    info!(
        component = "pipeline",
        event = "pipeline.run.start",
        timezone = %cfg.timezone,
        backfill = cfg.backfill.is_some(),
        ceiling_kw = cfg.device.ceiling_kw
    );

    let head = undiff(diffs)?.scrub();
    let (points, report) = match cfg.backfill {
        Some(backfill) => {
            let mut stages = tail(head.backfill(backfill, cfg.timezone), cfg);
            let points: Vec<DataPoint> = stages.by_ref().collect();
            let (mut report, backfill) = tail_report(&stages);
            let scrub = backfill.get_ref();
            report.backfill = Some(backfill.stats());
            report.scrub = scrub.stats();
            report.raw_records = scrub.get_ref().stats().records;
            (points, report)
        }
        None => {
            let mut stages = tail(head, cfg);
            let points: Vec<DataPoint> = stages.by_ref().collect();
            let (mut report, scrub) = tail_report(&stages);
            report.scrub = scrub.stats();
            report.raw_records = scrub.get_ref().stats().records;
            (points, report)
        }
    };

    info!(
        component = "pipeline",
        event = "pipeline.run.finish",
        raw_records = report.raw_records,
        output_points = report.output_points,
        scrubbed = report.scrub.dropped(),
        synthesized = report.backfill.map(|b| b.synthesized).unwrap_or(0),
        midnight_points = report.midnight.inserted,
        clamped = report.ceiling.clamped,
        catch_up_intervals = report.ceiling.catch_up_intervals
    );

    Ok((points, report))
}

fn tail_report<I>(stages: &Tail<I>) -> (CorrectionReport, &I) {
    let peak = stages.get_ref();
    let ceiling = peak.get_ref();
    let midnights = ceiling.get_ref();
    let integrate = stages.stats();

    let report = CorrectionReport {
        output_points: integrate.points,
        midnight: midnights.stats(),
        ceiling: ceiling.stats(),
        integrate,
        ..CorrectionReport::default()
    };
    (report, midnights.get_ref())
}
