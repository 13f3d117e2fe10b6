//! Logging setup for the binaries.
//!
//! Events always go to stderr so that stdout stays free for the corrected
//! table.

use std::env;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::audit::SeriesAudit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Ok(level) = env::var("ENVOY_LOG_LEVEL") {
        let trimmed = level.trim();
        if !trimmed.is_empty() {
            config.level = trimmed.to_string();
        }
    }

    if let Ok(format) = env::var("ENVOY_LOG_FORMAT") {
        if let Some(parsed) = parse_log_format(&format) {
            config.format = parsed;
        }
    }

    if let Ok(include_target) = env::var("ENVOY_LOG_TARGET") {
        if let Some(parsed) = parse_bool(&include_target) {
            config.include_target = parsed;
        }
    }

    config
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_writer(std::io::stderr)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(config: &LoggingConfig) {
    info!(
        component = "expand_log",
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

pub fn log_input_selected(path: &Path, records: usize) {
    info!(
        component = "expand_log",
        event = "input.selected",
        path = %path.display(),
        records
    );
}

pub fn log_audit(audit: &SeriesAudit) {
    if audit.is_clean() {
        info!(
            component = "expand_log",
            event = "audit.clean",
            points = audit.points,
            synthetic = audit.synthetic,
            lifetime_stalls = audit.lifetime_stalls
        );
    } else {
        warn!(
            component = "expand_log",
            event = "audit.violations",
            points = audit.points,
            time_regressions = audit.time_regressions,
            lifetime_regressions = audit.lifetime_regressions,
            daily_regressions = audit.daily_regressions,
            unreset_day_starts = audit.unreset_day_starts,
            ceiling_breaches = audit.ceiling_breaches,
            read_errors = audit.read_errors,
            first_violation = audit.first_violation.as_deref().unwrap_or_default()
        );
    }
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::with_env_vars;

    #[test]
    fn defaults_when_env_missing() {
        let cfg = with_env_vars(
            &[
                ("ENVOY_LOG_LEVEL", None),
                ("ENVOY_LOG_FORMAT", None),
                ("ENVOY_LOG_TARGET", None),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn reads_level_format_and_target() {
        let cfg = with_env_vars(
            &[
                ("ENVOY_LOG_LEVEL", Some("envoy_expand=debug")),
                ("ENVOY_LOG_FORMAT", Some(" JSON ")),
                ("ENVOY_LOG_TARGET", Some("off")),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg.level, "envoy_expand=debug");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);
    }

    #[test]
    fn blank_level_and_unknown_values_keep_defaults() {
        let cfg = with_env_vars(
            &[
                ("ENVOY_LOG_LEVEL", Some("   ")),
                ("ENVOY_LOG_FORMAT", Some("yaml")),
                ("ENVOY_LOG_TARGET", Some("sometimes")),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        for raw in ["1", "true", "YES", " on "] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "False", "no", "off"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("2"), None);
    }
}
