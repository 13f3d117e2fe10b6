use std::io::{self, BufWriter};
use std::path::PathBuf;

use envoy_expand::{
    audit_series, correct_series, init_logging, log_app_start, log_audit, log_input_selected,
    logging_config_from_env, pipeline_config_from_env, read_raw_log_file, write_table,
    DEFAULT_EPOCH_START,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("ENVOY_LOG_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("logenvoy.log"));

    let diffs = read_raw_log_file(&path)?;
    log_input_selected(&path, diffs.len());

    let cfg = pipeline_config_from_env();
    let (points, _report) = correct_series(diffs, &cfg)?;
    log_audit(&audit_series(&points, cfg.timezone, cfg.device));

    let epoch_start = cfg
        .backfill
        .map(|backfill| backfill.epoch_start)
        .unwrap_or(DEFAULT_EPOCH_START);
    let stdout = io::stdout();
    write_table(&points, epoch_start, BufWriter::new(stdout.lock()))?;

    Ok(())
}
