//! Stage-aware stderr logger.
//!
//! Records are tagged with the pipeline stage that emitted them (`core`,
//! `detect`, `pose`, `calib`), and each stage can be given its own level so a
//! calibration run can be traced without flooding the output with per-frame
//! detection chatter. Lines look like `   12.345ms DEBUG calib  | message`.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Pipeline stage a log record belongs to, derived from its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogStage {
    Core,
    Detect,
    Pose,
    Calib,
    /// Anything outside the arucalib crates.
    External,
}

impl LogStage {
    pub fn of_target(target: &str) -> Self {
        let krate = target.split("::").next().unwrap_or(target);
        match krate {
            "arucalib_core" => LogStage::Core,
            "arucalib_aruco" | "arucalib" => LogStage::Detect,
            "arucalib_pose" => LogStage::Pose,
            "arucalib_calib" => LogStage::Calib,
            _ => LogStage::External,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            LogStage::Core => "core",
            LogStage::Detect => "detect",
            LogStage::Pose => "pose",
            LogStage::Calib => "calib",
            LogStage::External => "ext",
        }
    }
}

struct StageLogger {
    default: LevelFilter,
    overrides: Vec<(LogStage, LevelFilter)>,
    started: Instant,
}

impl StageLogger {
    fn new(default: LevelFilter, overrides: &[(LogStage, LevelFilter)]) -> Self {
        Self {
            default,
            overrides: overrides.to_vec(),
            started: Instant::now(),
        }
    }

    fn level_for(&self, stage: LogStage) -> LevelFilter {
        self.overrides
            .iter()
            .rev()
            .find(|(s, _)| *s == stage)
            .map_or(self.default, |&(_, level)| level)
    }

    /// Most verbose level any stage accepts.
    fn max_level(&self) -> LevelFilter {
        self.overrides
            .iter()
            .map(|&(_, level)| level)
            .fold(self.default, Ord::max)
    }

    fn format(&self, record: &Record) -> String {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1e3;
        format!(
            "{:>11.3}ms {:<5} {:<6} | {}",
            elapsed_ms,
            record.level(),
            LogStage::of_target(record.target()).tag(),
            record.args()
        )
    }
}

impl Log for StageLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level_for(LogStage::of_target(metadata.target()))
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(std::io::stderr().lock(), "{}", self.format(record));
        }
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StageLogger> = OnceLock::new();

/// Install the stderr logger with one level for every stage.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    init_with_stage_levels(level, &[])
}

/// Install the stderr logger with per-stage overrides of `default`.
///
/// Only the first successful call installs a logger; later calls are no-ops.
pub fn init_with_stage_levels(
    default: LevelFilter,
    overrides: &[(LogStage, LevelFilter)],
) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StageLogger::new(default, overrides));
        log::set_logger(logger)?;
        log::set_max_level(logger.max_level());
    }
    Ok(())
}

/// Install a global `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// `log` records emitted by the pipeline crates are bridged into the
/// subscriber. Span close events carry per-stage timings.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = if json {
        let subscriber = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let subscriber = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    };
    if installed {
        let _ = tracing_log::LogTracer::init();
    }
}
