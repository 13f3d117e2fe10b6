//! Correction pipeline for a solar production log.
//!
//! A raw log of differential device snapshots is rebuilt into absolute data
//! points and passed through lazy iterator stages that drop glitches, infer
//! missing samples from later ones, bracket local midnights, cap impossible
//! power, track the daily peak, and integrate power into energy.

mod audit;
mod backfill;
mod calendar;
mod ceiling;
mod integrate;
mod midnight;
mod model;
mod observability;
mod peak;
mod pipeline;
mod raw_log;
mod scrub;
#[cfg(test)]
mod test_support;
mod undiff;

pub use audit::{audit_series, SeriesAudit};
pub use backfill::{
    Backfill, BackfillConfig, BackfillStats, NightPolicy, NoiseThresholds, DEFAULT_EPOCH_START,
};
pub use calendar::{day_end, day_start, local_date, local_time, DAY_SECONDS, WEEK_SECONDS};
pub use ceiling::{implied_average_kw, CeilingStats, DeviceLimits, PowerCeiling};
pub use integrate::{Integrate, IntegrateStats};
pub use midnight::{MidnightStats, Midnights};
pub use model::{known_lt, known_sub, max_known, DataPoint, RawDiff};
pub use observability::{
    init_logging, log_app_start, log_audit, log_input_selected, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use peak::DayPeak;
pub use pipeline::{
    correct_series, corrected_stream, pipeline_config_from_env, validate_config,
    CorrectionReport, PipelineConfig, PipelineError, SeriesExt,
};
pub use raw_log::{
    day_offset, read_raw_log, read_raw_log_file, write_table, RawLogError, TABLE_HEADERS,
};
pub use scrub::{Scrub, ScrubStats};
pub use undiff::{undiff, Undiff, UndiffError, UndiffStats};
