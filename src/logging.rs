// src/logging.rs
//! Debug log file.
//!
//! Terminal output is plain `println!`; everything worth keeping for later
//! goes through `tracing` and ends up in a single append-only file that can
//! be switched on and off at runtime.

use anyhow::{Context, Result};
use chrono::Local;
use std::fmt::{self, Write as _};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "musichandler.log";
const TIMESTAMP_FORMAT: &str = "%d/%m/%y - %H:%M:%S";

/// Handle to the debug log file. Clones share the enabled flag.
#[derive(Debug, Clone)]
pub struct DebugLog {
    dir: PathBuf,
    file_name: String,
    timestamp: bool,
    enabled: Arc<AtomicBool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogInfo {
    pub filename: String,
    pub filepath: PathBuf,
    pub timestamp: bool,
    pub enabled: bool,
}

impl LogInfo {
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("filename", self.filename.clone()),
            ("filepath", self.filepath.display().to_string()),
            ("timestamp", self.timestamp.to_string()),
            ("enabled", self.enabled.to_string()),
        ]
    }
}

impl DebugLog {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
            timestamp: true,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn default_location() -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("musichandler")
            .join("logs");
        Self::new(dir, LOG_FILE_NAME)
    }

    pub fn without_timestamp(mut self) -> Self {
        self.timestamp = false;
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn has_timestamp(&self) -> bool {
        self.timestamp
    }

    /// Delete the log file. A file that was never written is fine.
    pub fn clear(&self) -> Result<()> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    pub fn info(&self) -> LogInfo {
        LogInfo {
            filename: self.file_name.clone(),
            filepath: self.dir.clone(),
            timestamp: self.timestamp,
            enabled: self.is_enabled(),
        }
    }

    fn open(&self) -> io::Result<File> {
        fs::create_dir_all(&self.dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path())
    }
}

/// Writer handed out per event: the log file, or nothing when disabled.
pub enum LogWriter {
    File(File),
    Sink(io::Sink),
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriter::File(file) => file.write(buf),
            LogWriter::Sink(sink) => sink.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::File(file) => file.flush(),
            LogWriter::Sink(sink) => sink.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for DebugLog {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        if !self.is_enabled() {
            return LogWriter::Sink(io::sink());
        }
        match self.open() {
            Ok(file) => LogWriter::File(file),
            // Logging must never take a command down with it
            Err(_) => LogWriter::Sink(io::sink()),
        }
    }
}

/// `[+] [dd/mm/yy - HH:MM:SS] message`, `[-]` for warnings and errors.
pub struct LogLineFormat {
    timestamp: bool,
}

impl LogLineFormat {
    pub fn new(timestamp: bool) -> Self {
        Self { timestamp }
    }
}

impl<S, N> FormatEvent<S, N> for LogLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let prefix = match *event.metadata().level() {
            Level::ERROR | Level::WARN => "[-]",
            _ => "[+]",
        };
        write!(writer, "{} ", prefix)?;

        if self.timestamp {
            write!(writer, "[{}] ", Local::now().format(TIMESTAMP_FORMAT))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Subscriber that writes to `log`; usable with `tracing::subscriber::with_default`.
pub fn subscriber(log: &DebugLog, verbose: bool) -> impl Subscriber + Send + Sync {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("musichandler_rs={}", default_level)));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(LogLineFormat::new(log.has_timestamp()))
        .with_writer(log.clone());

    tracing_subscriber::registry().with(filter).with(file_layer)
}

/// Install the global subscriber and mark the start of a run.
pub fn init_tracing(log: &DebugLog, verbose: bool) -> Result<()> {
    subscriber(log, verbose)
        .try_init()
        .context("Failed to initialize logging")?;

    if log.is_enabled() {
        // Separator line, written raw so it is easy to spot between runs
        if let Ok(mut file) = log.open() {
            let _ = writeln!(file, "----------");
        }
    }

    Ok(())
}
