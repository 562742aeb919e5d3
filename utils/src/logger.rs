use slog::o;
use slog::Drain;
use slog::Level;
use slog::LevelFilter;
use slog::{OwnedKVList, Record, KV};

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use super::error::{Error, Result};
use crate::app_config::{AppConfig, LogConfig};

/// 异步通道容量，避免高峰期丢失日志
const CHANNEL_SIZE: usize = 1024;

/// Install the global slog logger and bridge the `log` facade into it.
///
/// Every record goes to stdout and is appended to `log_file`. Keep the
/// returned guard alive for as long as logging is needed.
pub fn setup_logging(log_file: &Path, level: Option<&str>) -> Result<slog_scope::GlobalLoggerGuard> {
    let guard = slog_scope::set_global_logger(default_root_logger(log_file, level)?);
    // 过滤交给 slog 的 LevelFilter，log 门面全部放行
    slog_stdlog::init_with_level(log::Level::Trace)?;

    Ok(guard)
}

pub fn default_root_logger(log_file: &Path, level: Option<&str>) -> Result<slog::Logger> {
    let log_level = match level {
        Some(name) => parse_level(name)?,
        None => get_log_level_from_config(),
    };

    // Create terminal drain for stdout output
    let term_drain = match default_term_drain() {
        Ok(drain) => drain,
        Err(_) => default_discard()?,
    };

    // 日志文件是审计记录，打不开就直接报错
    let file_drain = default_file_drain(log_file)?;

    let drain = slog::Duplicate(term_drain, file_drain).fuse();
    let drain = LevelFilter::new(drain, log_level).fuse();

    let logger = slog::Logger::root(drain, o!());

    Ok(logger)
}

/// 解析日志级别名称
pub fn parse_level(name: &str) -> Result<Level> {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::Trace),
        "debug" => Ok(Level::Debug),
        "info" => Ok(Level::Info),
        "warn" | "warning" => Ok(Level::Warning),
        "error" => Ok(Level::Error),
        "critical" => Ok(Level::Critical),
        other => Err(Error::new(format!("Unknown log level '{}'", other))),
    }
}

/// 从配置中获取日志级别，默认记录所有 DEBUG 及以上的日志
fn get_log_level_from_config() -> Level {
    AppConfig::get::<LogConfig>("log")
        .ok()
        .and_then(|config| parse_level(&config.level).ok())
        .unwrap_or(Level::Debug)
}

/// `HH:MM:SS,mmm`
fn timestamp_with_millis(io: &mut dyn io::Write) -> io::Result<()> {
    write!(io, "{}", chrono::Local::now().format("%H:%M:%S,%3f"))
}

fn default_discard() -> Result<slog_async::Async> {
    let drain = slog_async::Async::new(slog::Discard)
        .chan_size(CHANNEL_SIZE)
        .build();

    Ok(drain)
}

// term drain: Log to Terminal
#[cfg(not(feature = "termlog"))]
fn default_term_drain() -> Result<slog_async::Async> {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    let term = slog_term::FullFormat::new(plain).use_custom_timestamp(timestamp_with_millis);

    let drain = slog_async::Async::new(term.build().fuse())
        .chan_size(CHANNEL_SIZE)
        .build();

    Ok(drain)
}

// term drain: Log to Terminal (colored)
#[cfg(feature = "termlog")]
fn default_term_drain() -> Result<slog_async::Async> {
    let decorator = slog_term::TermDecorator::new().stdout().build();
    let term = slog_term::FullFormat::new(decorator).use_custom_timestamp(timestamp_with_millis);

    let drain = slog_async::Async::new(term.build().fuse())
        .chan_size(CHANNEL_SIZE)
        .build();

    Ok(drain)
}

// file drain: append to the given log file
fn default_file_drain(log_file: &Path) -> Result<slog_async::Async> {
    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    // 审计日志不能丢记录，通道满了就阻塞
    let drain = slog_async::Async::new(AuditLineFormat::new(file).fuse())
        .chan_size(CHANNEL_SIZE)
        .overflow_strategy(slog_async::OverflowStrategy::Block)
        .build();

    Ok(drain)
}

/// One line per record: `HH:MM:SS,mmm <pid> <LEVEL> <message>[, key: value]*`
struct AuditLineFormat<W: Write> {
    out: Mutex<W>,
    pid: u32,
}

impl<W: Write> AuditLineFormat<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            pid: std::process::id(),
        }
    }
}

impl<W: Write> Drain for AuditLineFormat<W> {
    type Ok = ();
    type Err = io::Error;

    fn log(&self, record: &Record, values: &OwnedKVList) -> io::Result<()> {
        let mut line = Vec::new();
        timestamp_with_millis(&mut line)?;
        write!(line, " {} {} {}", self.pid, record.level().as_str(), record.msg())?;

        let mut kv = KvSuffix(&mut line);
        record
            .kv()
            .serialize(record, &mut kv)
            .and_then(|_| values.serialize(record, &mut kv))
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "failed to format log record"))?;
        line.push(b'\n');

        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file writer poisoned"))?;
        out.write_all(&line)?;
        out.flush()
    }
}

struct KvSuffix<'a>(&'a mut Vec<u8>);

impl slog::Serializer for KvSuffix<'_> {
    fn emit_arguments(&mut self, key: slog::Key, val: &fmt::Arguments) -> slog::Result {
        write!(self.0, ", {}: {}", key, val)?;
        Ok(())
    }
}
