//! CLI Output Formatting.
//!
//! Text output is colored with `console`; JSON output is one document per call.

use console::style;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::config::MonitorConfig;
use crate::monitoring::{HealthSnapshot, HealthState, SystemSnapshot, Verdict};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Compact JSON
    Json,
    /// Pretty JSON
    JsonPretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Output formatter for CLI
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create new formatter
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Get format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json | OutputFormat::JsonPretty)
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.is_json() {
            self.print_json(&serde_json::json!({ "status": "success", "message": message }));
        } else {
            println!("{} {}", style("✓").green(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.is_json() {
            self.print_json(&serde_json::json!({ "status": "warning", "message": message }));
        } else {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    /// Print a system snapshot as a verdict line plus a service table
    pub fn snapshot(&self, snapshot: &SystemSnapshot) {
        if self.is_json() {
            self.print_json(snapshot);
            return;
        }

        println!(
            "{} {}  ({}/{} services healthy, generation {})",
            style("System:").bold(),
            styled_verdict(snapshot.verdict),
            snapshot.healthy_count(),
            snapshot.services.len(),
            snapshot.generation
        );
        println!();

        let rows: Vec<Vec<String>> = snapshot.services.values().map(service_row).collect();
        self.print_table_text(
            &["SERVICE", "TIER", "STATE", "FAILS", "P95 MS", "LAST PROBE"],
            &rows,
            |column, cell| match column {
                2 => styled_state(cell),
                _ => cell.to_string(),
            },
        );

        for failure in &snapshot.delivery_failures {
            println!();
            self.warning(&format!(
                "{} delivery failed for {} after {} attempt(s): {}",
                failure.channel, failure.service, failure.attempts, failure.reason
            ));
        }
    }

    /// Print the configured services
    pub fn services(&self, config: &MonitorConfig) {
        if self.is_json() {
            let services: Vec<BTreeMap<&str, serde_json::Value>> = config
                .services
                .iter()
                .map(|s| {
                    BTreeMap::from([
                        ("name", serde_json::json!(s.name())),
                        ("url", serde_json::json!(s.url().as_str())),
                        ("criticality", serde_json::json!(s.criticality())),
                        ("interval_secs", serde_json::json!(s.interval().as_secs())),
                        ("timeout_secs", serde_json::json!(s.timeout().as_secs())),
                        ("unhealthy_threshold", serde_json::json!(s.unhealthy_threshold())),
                        ("recovery_threshold", serde_json::json!(s.recovery_threshold())),
                    ])
                })
                .collect();
            self.print_json(&services);
            return;
        }

        let rows: Vec<Vec<String>> = config
            .services
            .iter()
            .map(|s| {
                vec![
                    s.name().to_string(),
                    s.criticality().to_string(),
                    format!("{}s", s.interval().as_secs()),
                    format!("{}s", s.timeout().as_secs()),
                    format!("{}/{}", s.unhealthy_threshold(), s.recovery_threshold()),
                    s.url().to_string(),
                ]
            })
            .collect();
        self.print_table_text(
            &["SERVICE", "TIER", "EVERY", "TIMEOUT", "FAIL/OK", "URL"],
            &rows,
            |_, cell| cell.to_string(),
        );
    }

    fn print_json<T: Serialize + ?Sized>(&self, data: &T) {
        let output = if matches!(self.format, OutputFormat::JsonPretty) {
            serde_json::to_string_pretty(data)
        } else {
            serde_json::to_string(data)
        };

        if let Ok(json) = output {
            println!("{}", json);
        }
    }

    /// Pads on the raw cell text, then styles, so ANSI codes never skew widths
    fn print_table_text<F>(&self, headers: &[&str], rows: &[Vec<String>], paint: F)
    where
        F: Fn(usize, &str) -> String,
    {
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
        }

        let header_line: Vec<String> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
            .collect();
        println!("{}", style(header_line.join("  ")).bold());

        for row in rows {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let width = widths.get(i).copied().unwrap_or(0);
                    let pad = width.saturating_sub(cell.chars().count());
                    format!("{}{}", paint(i, cell), " ".repeat(pad))
                })
                .collect();
            println!("{}", cells.join("  ").trim_end());
        }
    }
}

fn service_row(service: &HealthSnapshot) -> Vec<String> {
    let last_probe = match &service.last_probe {
        Some(probe) => match (&probe.error, probe.latency_ms) {
            (Some(error), _) => error.to_string(),
            (None, Some(ms)) if probe.slow => format!("ok {}ms (slow)", ms),
            (None, Some(ms)) => format!("ok {}ms", ms),
            (None, None) => "ok".to_string(),
        },
        None => "-".to_string(),
    };
    let p95 = service
        .latency
        .p95_ms
        .map_or_else(|| "-".to_string(), |ms| ms.to_string());

    vec![
        service.name.clone(),
        service.criticality.to_string(),
        service.state.to_string(),
        service.consecutive_failures.to_string(),
        p95,
        last_probe,
    ]
}

fn styled_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::Healthy => style(verdict).green().bold().to_string(),
        Verdict::Degraded => style(verdict).yellow().bold().to_string(),
        Verdict::Critical => style(verdict).red().bold().to_string(),
    }
}

fn styled_state(cell: &str) -> String {
    if cell == HealthState::Healthy.to_string() {
        style(cell).green().to_string()
    } else if cell == HealthState::Degraded.to_string() {
        style(cell).yellow().to_string()
    } else if cell == HealthState::Unhealthy.to_string() {
        style(cell).red().to_string()
    } else {
        style(cell).dim().to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
