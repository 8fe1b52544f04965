//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities,
//! plus a JSON implementation for scripts.

use super::LiveStatus;
use crate::{
    error::{AppError, Result},
    models::RunReport,
};
use std::fmt::Write as _;
use std::time::Duration;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the final report of a run
    fn format_report(&self, report: &RunReport) -> Result<String>;

    /// Format a one-line live status update
    fn format_status(&self, status: &LiveStatus) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show the failure breakdown and timing details
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Maximum output width
    pub max_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_width: 120,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Show borders around table
    pub show_borders: bool,
    /// Show header row
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    /// Column header
    pub header: String,
    /// Column alignment
    pub alignment: Alignment,
    /// Minimum width
    pub min_width: usize,
    /// Maximum width
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, min_width: usize, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

fn fmt_err(what: &str, e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format {}: {}", what, e))
}

/// Format duration in human-readable format
pub(crate) fn format_duration(duration: Duration) -> String {
    let duration_ms = duration.as_secs_f64() * 1000.0;
    if duration_ms < 1.0 {
        format!("{:.2}μs", duration_ms * 1000.0)
    } else if duration_ms < 1000.0 {
        format!("{:.1}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.2}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0) as u32;
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

/// Format percentage with appropriate precision
pub(crate) fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

/// Integer with thousands separators
pub(crate) fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn format_optional_percent(value: Option<f32>) -> String {
    value
        .map(|v| format!("{:.1}%", v))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Metric/value rows shared by the plain and colored report tables
pub(crate) fn report_rows(report: &RunReport) -> Vec<RowData> {
    vec![
        vec!["Target".into(), format!("{} ({})", report.target, report.resolved_target)],
        vec!["Elapsed".into(), format_duration(report.elapsed)],
        vec!["Packets sent".into(), format_count(report.packets_sent)],
        vec!["Successful".into(), format_count(report.successes)],
        vec!["Failed".into(), format_count(report.failures)],
        vec!["Success rate".into(), format_percentage(report.success_rate)],
        vec!["Data sent".into(), format!("{:.2} MB", report.megabytes_sent())],
        vec!["Packets/sec".into(), format!("{:.1}", report.packets_per_second)],
        vec!["Throughput".into(), format!("{:.2} Mbit/s", report.megabits_per_second())],
        vec!["Avg send latency".into(), format_duration(report.avg_latency)],
        vec!["Max send latency".into(), format_duration(report.max_latency)],
        vec![
            "Workers".into(),
            format!(
                "{} configured, {} active at end, {} failed",
                report.configured_workers, report.active_workers_at_end, report.failed_workers
            ),
        ],
        vec!["Rate ceiling".into(), format!("{} pps/worker", format_count(report.final_rate_ceiling))],
        vec!["Peak CPU".into(), format_optional_percent(report.peak_cpu_percent)],
        vec!["Peak memory".into(), format_optional_percent(report.peak_memory_percent)],
    ]
}

/// Notes about how the run ended; empty for a clean run
pub(crate) fn report_notes(report: &RunReport) -> Vec<String> {
    let mut notes = Vec::new();
    if report.cancelled {
        notes.push("Run was interrupted before its duration elapsed".to_string());
    }
    if report.force_stopped {
        notes.push(format!(
            "Shutdown timed out; {} worker(s) were forcefully stopped",
            report.abandoned_workers
        ));
    }
    if report.failed_workers > 0 {
        notes.push(format!("{} worker(s) could not open a socket", report.failed_workers));
    }
    if report.sampling_failures > 0 {
        notes.push(format!("{} resource sample(s) failed", report.sampling_failures));
    }
    notes
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub(crate) fn metric_table(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("Metric", Alignment::Left, 10, 24),
                Column::new("Value", Alignment::Right, 10, self.options.max_width.saturating_sub(30).max(20)),
            ],
            show_borders: self.options.table_borders,
            show_header: true,
        }
    }

    pub(crate) fn breakdown_table(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("Failure", Alignment::Left, 10, 20),
                Column::new("Count", Alignment::Right, 8, 20),
            ],
            show_borders: self.options.table_borders,
            show_header: true,
        }
    }

    /// Create a table with the given format and data
    pub(crate) fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let column_widths = self.calculate_column_widths(format, rows);

        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }

            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &column_widths, format));
            output.push('\n');

            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }
        }

        for row in rows {
            output.push_str(&self.create_row(row, &column_widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&column_widths));
        }

        output
    }

    /// Calculate optimal column widths
    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        let num_columns = format.columns.len().max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

        (0..num_columns)
            .map(|col_idx| {
                let column = format.columns.get(col_idx);
                let mut width = column.map(|c| c.min_width.max(c.header.chars().count())).unwrap_or(0);

                for row in rows {
                    if let Some(cell) = row.get(col_idx) {
                        width = width.max(cell.chars().count());
                    }
                }

                match column {
                    Some(c) => width.min(c.max_width),
                    None => width,
                }
            })
            .collect()
    }

    /// Create a table row
    fn create_row(&self, data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();

        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format.columns.get(idx).map(|c| &c.alignment).unwrap_or(&Alignment::Left);

            if format.show_borders {
                row.push(' ');
            }
            row.push_str(&self.align_text(cell, width, alignment));
            if format.show_borders {
                row.push_str(" |");
            } else {
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    /// Create horizontal border for table
    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::new();

        if !widths.is_empty() {
            border.push('+');
            for &width in widths {
                border.push_str(&"-".repeat(width + 2));
                border.push('+');
            }
        }

        border
    }

    /// Align text within specified width
    fn align_text(&self, text: &str, width: usize, alignment: &Alignment) -> String {
        let len = text.chars().count();
        if len >= width {
            return text.chars().take(width).collect();
        }

        let padding = width - len;
        match alignment {
            Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
            Alignment::Right => format!("{}{}", " ".repeat(padding), text),
            Alignment::Center => {
                let left_pad = padding / 2;
                let right_pad = padding - left_pad;
                format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
            }
        }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.chars().count() + 4);

        writeln!(output, "{}", border).map_err(|e| fmt_err("header", e))?;
        writeln!(output, "  {}  ", title).map_err(|e| fmt_err("header", e))?;
        write!(output, "{}", border).map_err(|e| fmt_err("header", e))?;

        Ok(output)
    }

    fn format_report(&self, report: &RunReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.format_header("UDP Traffic Test Results")?).map_err(|e| fmt_err("report", e))?;
        writeln!(output).map_err(|e| fmt_err("report", e))?;
        writeln!(output, "{}", self.create_table(&self.metric_table(), &report_rows(report)))
            .map_err(|e| fmt_err("report", e))?;

        if self.options.verbose_mode && !report.failure_breakdown.is_empty() {
            let rows: Vec<RowData> = report
                .failure_breakdown
                .iter()
                .map(|(kind, count)| vec![kind.clone(), format_count(*count)])
                .collect();
            writeln!(output).map_err(|e| fmt_err("report", e))?;
            writeln!(output, "{}", self.create_table(&self.breakdown_table(), &rows)).map_err(|e| fmt_err("report", e))?;
        }

        if self.options.verbose_mode {
            writeln!(
                output,
                "Started {}  Completed {}",
                report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
            )
            .map_err(|e| fmt_err("report", e))?;
        }

        for note in report_notes(report) {
            writeln!(output, "{}", self.format_warning(&note)?).map_err(|e| fmt_err("report", e))?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_status(&self, status: &LiveStatus) -> Result<String> {
        Ok(status.describe())
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("OK: {}", message))
    }
}

/// JSON formatter; the report is emitted as a single document
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_json<T: serde::Serialize>(&self, value: &T) -> Result<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(text)
    }

    fn message(&self, level: &str, text: &str) -> Result<String> {
        self.to_json(&serde_json::json!({ "level": level, "message": text }))
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_header(&self, _title: &str) -> Result<String> {
        Ok(String::new())
    }

    fn format_report(&self, report: &RunReport) -> Result<String> {
        self.to_json(report)
    }

    fn format_status(&self, status: &LiveStatus) -> Result<String> {
        self.to_json(status)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        self.message("error", error)
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        self.message("warning", warning)
    }

    fn format_success(&self, message: &str) -> Result<String> {
        self.message("success", message)
    }
}
