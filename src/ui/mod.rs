//! Terminal output: status lines, the fetch progress bar and the journal
//! summary table.

use std::io::IsTerminal;
use std::time::Duration;

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, Table};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::config::AppInfo;
use crate::models::QuerySpec;
use crate::pipeline::{ProgressSink, RunStats};

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Search,
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Search => "🔍",
    }
}

/// A colored status line
pub fn status_line(status: Status, msg: &str) -> String {
    let icon = status_icon(status);
    match status {
        Status::Success => format!("{} {}", icon.green().bold(), msg),
        Status::Error => format!("{} {}", icon.red().bold(), msg),
        Status::Warning => format!("{} {}", icon.yellow().bold(), msg),
        Status::Info => format!("{} {}", icon.cyan().bold(), msg),
        Status::Search => format!("{} {}", icon.yellow(), msg),
    }
}

/// Print a styled status message.
#[macro_export]
macro_rules! print_status {
    ($status:expr, $($arg:tt)*) => {
        println!("{}", $crate::ui::status_line($status, &format!($($arg)*)))
    };
}

/// Opening banner.
pub fn print_banner(info: &AppInfo) {
    println!();
    println!(
        "{}",
        format!("━━━ {} v{} ━━━", info.name, info.version).bold().cyan()
    );
    println!("{}", format!("updated {}", info.updated).dimmed());
    println!();
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "─".repeat(60).dimmed());
}

/// Format a number with commas.
pub fn format_number(n: usize) -> String {
    n.to_string()
        .chars()
        .rev()
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .rev()
        .collect()
}

/// Journal name and article count table
pub fn journal_table(journal_counts: &[(String, usize)]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Journal").add_attribute(Attribute::Bold),
        Cell::new("Number of Articles").add_attribute(Attribute::Bold),
    ]);

    for (journal, count) in journal_counts {
        table.add_row(vec![
            Cell::new(journal),
            Cell::new(format_number(*count)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// One-line summary of a run's counters
pub fn stats_line(stats: &RunStats) -> String {
    let mut line = format!(
        "{} queries, {} identifiers, {} publications ({} after removing duplicates)",
        stats.queries,
        format_number(stats.identifiers),
        format_number(stats.extracted),
        format_number(stats.retained)
    );
    if stats.failed_queries > 0 || stats.failed_fetches > 0 {
        line.push_str(&format!(
            "; skipped {} queries and {} identifiers",
            stats.failed_queries, stats.failed_fetches
        ));
    }
    line
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Progress bar over identifiers being fetched
///
/// The length grows as each search reports its identifiers.
pub struct FetchProgress {
    pb: ProgressBar,
}

impl FetchProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        pb.set_style(
            style("{spinner:.cyan} {msg}\n{wide_bar:.cyan/blue} {pos}/{len} fetched")
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                .progress_chars("█▓▒░ "),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// A bar that never draws, for non-interactive output
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    /// Drawn on a terminal, hidden otherwise
    pub fn for_stdout() -> Self {
        if is_terminal() {
            Self::new()
        } else {
            Self::hidden()
        }
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.pb.length()
    }
}

impl Default for FetchProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for FetchProgress {
    fn query_started(&self, index: usize, total: usize, query: &QuerySpec) {
        self.pb.set_message(format!(
            "({}/{}) {} in {}",
            index + 1,
            total,
            query.keyword,
            query.journal
        ));
    }

    fn identifiers_found(&self, count: usize) {
        self.pb.inc_length(count as u64);
    }

    fn fetch_finished(&self, _id: &str, _ok: bool) {
        self.pb.inc(1);
    }

    fn finished(&self) {
        self.pb.finish_and_clear();
    }
}
