//! Colored formatter implementation with terminal color support
//!
//! Tables are laid out by the plain formatter first so ANSI codes never
//! disturb column widths; color is applied to whole lines and to the
//! summary rows around the table.

use super::formatter::{
    format_count, format_duration, format_percentage, report_notes, report_rows, FormattingOptions,
    OutputFormatter, PlainFormatter, RowData,
};
use super::LiveStatus;
use crate::{
    error::Result,
    executor::RatePolicy,
    models::RunReport,
    types::LoadLevel,
};
use colored::*;
use std::time::Duration;

/// Send latency classification for color coding
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceLevel {
    Excellent, // < 100us
    Good,      // 100us-1ms
    Fair,      // 1-10ms
    Poor,      // 10-100ms
    VeryPoor,  // > 100ms
}

impl PerformanceLevel {
    /// Classify a send latency
    pub fn from_latency(latency: Duration) -> Self {
        let micros = latency.as_micros();
        if micros < 100 {
            Self::Excellent
        } else if micros < 1_000 {
            Self::Good
        } else if micros < 10_000 {
            Self::Fair
        } else if micros < 100_000 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    /// Get color for this performance level
    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub highlight: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            highlight: Color::Magenta,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
    policy: RatePolicy,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        let plain_formatter = PlainFormatter::new(options.clone());
        Self {
            plain_formatter,
            options,
            color_scheme,
            policy: RatePolicy::default(),
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Apply bold formatting if colors are enabled
    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    /// Format latency with color coding
    fn format_latency_colored(&self, latency: Duration) -> ColoredString {
        let level = PerformanceLevel::from_latency(latency);
        self.colorize(&format_duration(latency), level.color())
    }

    /// Format percentage with color coding based on value
    fn format_percentage_colored(&self, percentage: f64) -> ColoredString {
        let color = if percentage >= 95.0 {
            self.color_scheme.success
        } else if percentage >= 80.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        };
        self.colorize(&format_percentage(percentage), color)
    }

    fn load_color(&self, level: LoadLevel) -> Color {
        match level {
            LoadLevel::Low => self.color_scheme.success,
            LoadLevel::Moderate => self.color_scheme.warning,
            LoadLevel::High => self.color_scheme.error,
        }
    }

    /// Create a success-rate bar
    fn create_rate_bar(&self, percentage: f64, width: usize) -> String {
        let filled = ((percentage.clamp(0.0, 100.0) * width as f64 / 100.0) as usize).min(width);
        let empty = width - filled;

        if !self.options.enable_color {
            return format!("[{}{}]", "=".repeat(filled), " ".repeat(empty));
        }

        let bar_color = if percentage >= 95.0 {
            Color::Green
        } else if percentage >= 80.0 {
            Color::Yellow
        } else {
            Color::Red
        };

        format!(
            "[{}{}]",
            "█".repeat(filled).color(bar_color),
            "░".repeat(empty).color(self.color_scheme.muted)
        )
    }

    /// Create a colored section header
    fn create_section_header(&self, title: &str) -> String {
        if self.options.enable_color {
            format!("▶ {}", title.bold().color(self.color_scheme.header))
        } else {
            format!("▶ {}", title)
        }
    }

    /// Color table borders, leaving cell text alone
    fn color_table(&self, table: &str) -> String {
        table
            .lines()
            .map(|line| {
                if line.starts_with('+') {
                    self.colorize(line, self.color_scheme.border).to_string()
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let border = "═".repeat(title.chars().count() + 4);
        Ok(format!(
            "{}\n  {}  \n{}",
            self.colorize(&border, self.color_scheme.header),
            self.bold(title),
            self.colorize(&border, self.color_scheme.header)
        ))
    }

    fn format_report(&self, report: &RunReport) -> Result<String> {
        let mut lines = vec![self.format_header("UDP Traffic Test Results")?, String::new()];

        let table = self
            .plain_formatter
            .create_table(&self.plain_formatter.metric_table(), &report_rows(report));
        lines.push(self.color_table(&table));
        lines.push(String::new());

        lines.push(format!(
            "Success {} {}  Avg latency {} ({})",
            self.create_rate_bar(report.success_rate, 20),
            self.format_percentage_colored(report.success_rate),
            self.format_latency_colored(report.avg_latency),
            PerformanceLevel::from_latency(report.avg_latency).description()
        ));

        if self.options.verbose_mode && !report.failure_breakdown.is_empty() {
            lines.push(String::new());
            lines.push(self.create_section_header("Failures"));
            let rows: Vec<RowData> = report
                .failure_breakdown
                .iter()
                .map(|(kind, count)| vec![kind.clone(), format_count(*count)])
                .collect();
            let breakdown = self
                .plain_formatter
                .create_table(&self.plain_formatter.breakdown_table(), &rows);
            lines.push(self.color_table(&breakdown));
        }

        let notes = report_notes(report);
        if !notes.is_empty() {
            lines.push(String::new());
            for note in notes {
                lines.push(self.format_warning(&note)?);
            }
        }

        Ok(lines.join("\n"))
    }

    fn format_status(&self, status: &LiveStatus) -> Result<String> {
        let load = status.sample.map(|sample| {
            let level = self.policy.load_level(&sample);
            self.colorize(
                &format!("cpu {:.0}% mem {:.0}%", sample.cpu_percent, sample.memory_percent),
                self.load_color(level),
            )
            .to_string()
        });

        Ok(format!(
            "[{:>5.1}s] {} sent  {} pps  {}  {}  ceiling {}  workers {}/{}",
            status.elapsed.as_secs_f64(),
            self.bold(&format_count(status.snapshot.packets_sent)),
            self.colorize(&format!("{:.0}", status.packets_per_second()), self.color_scheme.info),
            self.format_percentage_colored(status.snapshot.success_rate()),
            load.unwrap_or_else(|| self.colorize("cpu -- mem --", self.color_scheme.muted).to_string()),
            self.colorize(&format_count(status.rate_ceiling), self.color_scheme.highlight),
            status.active_workers,
            status.configured_workers
        ))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("✗ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("! {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✓ {}", self.colorize(message, self.color_scheme.success)))
    }
}

/// Helper functions for color management
impl ColoredFormatter {
    /// Check if terminal supports colors
    pub fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err() && std::env::var("TERM").map(|term| term != "dumb").unwrap_or(true)
    }

    /// Enable or disable colors at runtime
    pub fn set_colors_enabled(&mut self, enabled: bool) {
        self.options.enable_color = enabled && Self::supports_color();
    }
}
