//! log4rs setup for applications embedding the query builder.

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::errors::QueryError;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// error|warn|info|debug|trace, anything else is Info.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Builds a rolling-file config writing `{dir}/sequeldoc.log`.
///
/// With `trace_pipelines`, assembled pipelines (target `sequeldoc::pipeline`)
/// go to their own `pipeline.log`.
///
/// # Errors
/// Returns an error if the directory or appenders cannot be created.
pub fn file_config(
    dir: &Path,
    level: LevelFilter,
    retention: u32,
    trace_pipelines: bool,
) -> Result<Config, QueryError> {
    std::fs::create_dir_all(dir)?;
    let app = rolling_appender(dir, "sequeldoc", retention)?;
    let mut builder =
        Config::builder().appender(Appender::builder().build("app", Box::new(app)));
    if trace_pipelines {
        let pipeline = rolling_appender(dir, "pipeline", retention)?;
        builder = builder
            .appender(Appender::builder().build("pipeline", Box::new(pipeline)))
            .logger(
                Logger::builder()
                    .appender("pipeline")
                    .additive(false)
                    .build(super::trace::TARGET, LevelFilter::Trace),
            );
    }
    builder
        .build(Root::builder().appender("app").build(level))
        .map_err(|e| QueryError::Config(e.to_string()))
}

fn rolling_appender(dir: &Path, name: &str, retention: u32) -> Result<RollingFileAppender, QueryError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{name}.{{}}.log")).display()), retention)
        .map_err(|e| QueryError::Config(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{name}.log")), Box::new(policy))?)
}

/// Installs file logging globally.
///
/// # Errors
/// Returns an error if the config cannot be built or a logger is already installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    trace_pipelines: bool,
) -> Result<(), QueryError> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let config = file_config(&base, parse_level(level), retention.unwrap_or(7), trace_pipelines)?;
    log4rs::init_config(config).map_err(|e| QueryError::Config(e.to_string()))?;
    Ok(())
}

/// Installs stderr logging globally.
///
/// # Errors
/// Returns an error if a logger is already installed.
pub fn init_console(level: Option<&str>) -> Result<(), QueryError> {
    let stderr = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(parse_level(level)))
        .map_err(|e| QueryError::Config(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| QueryError::Config(e.to_string()))?;
    Ok(())
}

/// File logging when `settings.log_dir` is set, console logging otherwise.
///
/// # Errors
/// See [`configure_logging`] and [`init_console`].
pub fn configure_from_settings(settings: &Settings) -> Result<(), QueryError> {
    match &settings.log_dir {
        Some(dir) => configure_logging(
            Some(dir.as_path()),
            settings.log_level.as_deref(),
            None,
            settings.trace_pipelines,
        ),
        None => init_console(settings.log_level.as_deref()),
    }
}
