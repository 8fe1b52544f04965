//! Structured logging for the traffic engine
//!
//! This module provides:
//! - Structured logging with levels, fields and a per-run session ID
//! - Console and JSON output formats on stderr, so stdout stays free for reports
//! - An optional append-mode log file shared by every logger of a run
//! - An engine logger with typed events for workers, the monitor and the runner

use crate::error::{AppError, ErrorContext, Result};
use crate::models::{ResourceSample, RunReport, TestConfig};
use crate::types::{FailureKind, RunState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - detailed information for debugging
    Debug = 1,
    /// Info level - general application information
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - error events but application can continue
    Error = 4,
    /// Fatal level - severe error events that cause application termination
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",    // White
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[32m",     // Green
            LogLevel::Warn => "\x1b[33m",     // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
            LogLevel::Fatal => "\x1b[35m",    // Magenta
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp when log entry was created
    pub timestamp: DateTime<Utc>,
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Additional structured fields
    pub fields: HashMap<String, serde_json::Value>,
    /// Thread name if available
    pub thread_id: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
}

/// Append-mode log file; clones share the handle
#[derive(Clone)]
pub struct LogFile {
    path: PathBuf,
    min_level: LogLevel,
    file: Arc<Mutex<File>>,
}

impl LogFile {
    /// Open (or create) `path` for appending
    pub fn open(path: &Path, min_level: LogLevel) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            min_level,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn accepts(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

/// Shared logging context for session tracking
#[derive(Debug, Default)]
struct LogContext {
    /// Correlation ID for the whole run
    session_id: Option<String>,
    /// Additional context fields
    context_fields: HashMap<String, serde_json::Value>,
}

/// Logger implementation with multiple output formats
///
/// Cloning is cheap; clones share session context.
#[derive(Clone)]
pub struct Logger {
    /// Minimum log level to output
    min_level: LogLevel,
    /// Whether to use colored output
    use_color: bool,
    /// Output format
    format: LogFormat,
    /// Logger name
    name: String,
    /// Shared context storage
    context: Arc<RwLock<LogContext>>,
    /// Optional file sink, written without color
    file: Option<LogFile>,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
            file: None,
        }
    }

    /// Create a logger with specific configuration
    pub fn with_config(name: String, config: &TestConfig) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
            file: None,
        }
    }

    /// Also write entries to `file`
    pub fn with_file(mut self, file: LogFile) -> Self {
        self.file = Some(file);
        self
    }

    /// A logger that drops everything below `Fatal`, for tests and library use
    pub fn quiet(name: &str) -> Self {
        let mut logger = Self::new(name.to_string());
        logger.set_level(LogLevel::Fatal);
        logger
    }

    /// Set minimum log level
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Enable or disable colored output
    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key, json_value);
        }
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    /// Convenience methods for different log levels
    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output to the console or the file
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level || self.file.as_ref().is_some_and(|f| f.accepts(level))
    }

    /// Write log entry to stderr and the file sink
    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }

        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        if entry.level >= self.min_level {
            let _ = writeln!(io::stderr(), "{}", self.render(&entry));
        }

        if let Some(file) = self.file.as_ref().filter(|f| f.accepts(entry.level)) {
            file.write_line(&Self::format_console(&entry, false));
        }
    }

    /// Render an entry in the configured console format
    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => Self::format_console(entry, self.use_color),
            LogFormat::Json => self.format_json(entry),
        }
    }

    /// Format log entry as one human-readable line
    fn format_console(entry: &LogEntry, use_color: bool) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}",
            timestamp,
            formatted_level,
            entry.logger,
            entry.message
        );

        if !entry.fields.is_empty() {
            let mut fields_str: Vec<String> = entry.fields.iter()
                .filter(|(k, _)| k.as_str() != "session_id")
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields_str.sort();
            if !fields_str.is_empty() {
                output.push_str(&format!(" {{{}}}", fields_str.join(", ")));
            }
        }

        output
    }

    /// Format log entry as JSON
    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!("{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}", entry.message),
        }
    }

}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                fields: HashMap::new(),
                thread_id: std::thread::current().name().map(String::from),
            },
        }
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Typed events emitted by the runner, workers and monitor
#[derive(Clone)]
pub struct EngineLogger {
    logger: Logger,
}

impl EngineLogger {
    /// Wrap an existing logger
    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    /// Engine logger that only emits fatal events
    pub fn quiet() -> Self {
        Self { logger: Logger::quiet("ENGINE") }
    }

    pub async fn log_state_transition(&self, from: RunState, to: RunState) {
        self.logger.info(&format!("Runner state {} -> {}", from, to))
            .field("from", from.as_str())
            .field("to", to.as_str())
            .log()
            .await;
    }

    pub async fn log_run_started(&self, config: &TestConfig, resolved: &std::net::SocketAddr) {
        self.logger.info(&format!("Sending to {} ({})", config.target_label(), resolved))
            .field("threads", config.thread_count)
            .field("packet_size", config.packet_size)
            .field("duration_secs", config.duration().as_secs())
            .log()
            .await;
    }

    pub async fn log_worker_started(&self, worker_id: usize, local_addr: Option<std::net::SocketAddr>) {
        if !self.logger.would_log(LogLevel::Debug) {
            return;
        }
        self.logger.debug(&format!("Worker {} ready", worker_id))
            .field("worker_id", worker_id)
            .field("local_addr", local_addr.map(|a| a.to_string()))
            .log()
            .await;
    }

    /// Socket creation failed; the worker exits and the run continues
    pub async fn log_socket_failure(&self, worker_id: usize, error: &AppError) {
        self.logger.error(&format!("Worker {} could not open a socket: {}", worker_id, error))
            .field("worker_id", worker_id)
            .error_info(error)
            .log()
            .await;
    }

    /// A single send failed; only emitted at debug level
    pub async fn log_send_failure(&self, worker_id: usize, kind: FailureKind, detail: &str) {
        if !self.logger.would_log(LogLevel::Debug) {
            return;
        }
        self.logger.debug(&format!("Worker {} send failed: {}", worker_id, detail))
            .field("worker_id", worker_id)
            .field("failure_kind", kind.as_str())
            .log()
            .await;
    }

    pub async fn log_worker_exit(&self, worker_id: usize, sent: u64) {
        if !self.logger.would_log(LogLevel::Debug) {
            return;
        }
        self.logger.debug(&format!("Worker {} stopped", worker_id))
            .field("worker_id", worker_id)
            .field("attempts", sent)
            .log()
            .await;
    }

    /// Sampling failed; the previous sample is kept
    pub async fn log_sampling_failure(&self, error: &AppError, consecutive: u64) {
        self.logger.warn(&format!("Resource sampling failed, keeping last sample: {}", error))
            .field("consecutive_failures", consecutive)
            .error_info(error)
            .log()
            .await;
    }

    pub async fn log_rate_change(&self, sample: &ResourceSample, previous: u64, current: u64) {
        if previous == current {
            return;
        }
        self.logger.info(&format!("Per-worker rate ceiling {} -> {} pps", previous, current))
            .field("cpu_percent", sample.cpu_percent)
            .field("memory_percent", sample.memory_percent)
            .log()
            .await;
    }

    pub async fn log_shutdown_timeout(&self, abandoned: usize) {
        self.logger.warn(&format!("{} worker(s) did not stop in time and were aborted", abandoned))
            .field("abandoned_workers", abandoned)
            .log()
            .await;
    }

    pub async fn log_run_summary(&self, report: &RunReport) {
        self.logger.info("Run completed")
            .field("packets_sent", report.packets_sent)
            .field("bytes_sent", report.bytes_sent)
            .field("failures", report.failures)
            .field("elapsed_ms", report.elapsed.as_millis() as u64)
            .field("force_stopped", report.force_stopped)
            .log()
            .await;
    }
}

/// Creates loggers that share one session ID and log file
pub struct LoggerFactory {
    config: TestConfig,
    session_id: String,
    file: Option<LogFile>,
}

impl LoggerFactory {
    /// Create a new logger factory, opening the configured log file
    pub fn new(config: TestConfig) -> Result<Self> {
        let file = match config.log_file {
            Some(ref path) => {
                let level = if config.debug { LogLevel::Debug } else { LogLevel::Info };
                Some(LogFile::open(path, level)?)
            }
            None => None,
        };

        Ok(Self {
            config,
            session_id: Uuid::new_v4().to_string(),
            file,
        })
    }

    /// Create a logger with a specific name
    pub async fn create_logger(&self, name: &str) -> Logger {
        let mut logger = Logger::with_config(name.to_string(), &self.config);
        if let Some(file) = &self.file {
            logger = logger.with_file(file.clone());
        }
        logger.set_session_id(self.session_id.clone()).await;
        logger.add_context_field("target".to_string(), self.config.target_label()).await;
        logger
    }

    /// Create the engine logger
    pub async fn create_engine_logger(&self) -> EngineLogger {
        EngineLogger::from_logger(self.create_logger("ENGINE").await)
    }

    /// Get session ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Path of the log file, when one is configured
    pub fn log_file(&self) -> Option<&Path> {
        self.file.as_ref().map(LogFile::path)
    }
}
