//! Report model and assembly.
//!
//! A [`Report`] is an ordered list of [`Page`]s, each an ordered list of
//! [`ContentBlock`]s. [`ReportAssembler`] builds it from the lookup inputs and
//! the retained publications; a [`DocumentRenderer`] writes it to disk.

pub mod layout;
mod render;

pub use layout::{strip_markup, wrap, wrap_text, LayoutBudgets};
pub use render::{
    ensure_writable, renderer_for, DocumentRenderer, HtmlRenderer, JsonRenderer, ReportError,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{AppInfo, LookupConfig};
use crate::models::{
    format_date, DateWindow, Extracted, PubDate, PublicationRecord, PublicationSet,
};

/// Point sizes used by the report
pub mod size {
    pub const HEADING: u8 = 16;
    pub const ABSTRACT: u8 = 14;
    pub const BODY: u8 = 12;
    pub const DETAIL: u8 = 10;
}

/// Text used wherever a value is missing
pub const NOT_AVAILABLE: &str = "Not available";

/// Output container for the rendered report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Html,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Background of a table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowShade {
    Header,
    Light,
    Dark,
}

impl RowShade {
    /// Shade for the data row at `index`, counting from zero
    pub fn for_row(index: usize) -> Self {
        if index % 2 == 0 {
            RowShade::Light
        } else {
            RowShade::Dark
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<String>,
    pub shade: RowShade,
}

/// One renderable unit of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    Title { text: String },
    ParagraphRun { text: String, size_hint: u8 },
    Table { rows: Vec<TableRow> },
}

impl ContentBlock {
    pub fn title(text: impl Into<String>) -> Self {
        ContentBlock::Title { text: text.into() }
    }

    pub fn run(text: impl Into<String>, size_hint: u8) -> Self {
        ContentBlock::ParagraphRun {
            text: text.into(),
            size_hint,
        }
    }

    /// Empty separator line
    pub fn blank() -> Self {
        Self::run("", size::BODY)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, ContentBlock::ParagraphRun { text, .. } if text.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub blocks: Vec<ContentBlock>,
}

impl Page {
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self { blocks }
    }
}

/// The assembled report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub pages: Vec<Page>,
    /// Journal name and publication count, first-encountered order
    pub journal_summary: Vec<(String, usize)>,
}

/// Turns lookup inputs and publications into a [`Report`]
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    info: AppInfo,
    budgets: LayoutBudgets,
    today: NaiveDate,
}

impl ReportAssembler {
    pub fn new(info: AppInfo, budgets: LayoutBudgets, today: NaiveDate) -> Self {
        Self {
            info,
            budgets,
            today,
        }
    }

    pub fn assemble(
        &self,
        lookup: &LookupConfig,
        window: &DateWindow,
        publications: &PublicationSet,
    ) -> Report {
        let journal_summary = publications.journal_counts();

        let mut pages = vec![
            self.intro_page(),
            self.query_page(lookup, window),
            self.keyword_page(lookup),
            summary_page(&journal_summary),
        ];
        pages.extend(publications.iter().map(|record| self.publication_page(record)));

        tracing::debug!(
            "Assembled {} pages for {} publications",
            pages.len(),
            publications.len()
        );

        Report {
            pages,
            journal_summary,
        }
    }

    fn intro_page(&self) -> Page {
        Page::new(vec![
            ContentBlock::title(format!("{} v{}", self.info.name, self.info.version)),
            ContentBlock::run(format!("Updated {}", self.info.updated), size::ABSTRACT),
        ])
    }

    fn query_page(&self, lookup: &LookupConfig, window: &DateWindow) -> Page {
        let mut blocks = vec![
            ContentBlock::title("Query Information (1):"),
            ContentBlock::run(format!("Username: {}", lookup.contact), size::HEADING),
            ContentBlock::blank(),
            ContentBlock::run(
                format!(
                    "Query start date: {}\nQuery end date: {}",
                    format_date(window.start),
                    format_date(window.display_end(self.today))
                ),
                size::BODY,
            ),
            ContentBlock::blank(),
            ContentBlock::run("Query journals:", size::HEADING),
        ];
        blocks.extend(
            lookup
                .journals
                .iter()
                .map(|journal| ContentBlock::run(journal.as_str(), size::BODY)),
        );
        Page::new(blocks)
    }

    fn keyword_page(&self, lookup: &LookupConfig) -> Page {
        let keywords = lookup.topics.join(", ");
        Page::new(vec![
            ContentBlock::title("Query Information (2):"),
            ContentBlock::run("Query keywords:", size::HEADING),
            ContentBlock::run(wrap_text(&keywords, self.budgets.keywords), size::BODY),
        ])
    }

    fn publication_page(&self, record: &PublicationRecord) -> Page {
        let budgets = &self.budgets;

        let abstract_text = match &record.r#abstract {
            Some(text) => wrap_text(text, budgets.abstract_text),
            None => format!("Abstract: {}", NOT_AVAILABLE),
        };

        let mut source = match &record.journal {
            Some(journal) => format!("Published in: {}", journal),
            None => format!("Journal: {}", NOT_AVAILABLE),
        };
        // A missing or partial date is left out
        if let Some(date) = record.date.as_present().and_then(PubDate::formatted) {
            source.push_str(&format!("\nPublication Date: {}", date));
        }

        let link = match &record.link {
            Extracted::Present(link) => format!("DOI: {}", link),
            Extracted::NotAvailable => format!("DOI: {}", NOT_AVAILABLE),
        };

        let authors = match &record.authors {
            Extracted::Present(names) => {
                wrap_text(&format!("Authors: {}", names.join(", ")), budgets.authors)
            }
            Extracted::NotAvailable => format!("Authors: {}", NOT_AVAILABLE),
        };

        let institutions = match &record.affiliations {
            Some(affiliations) => wrap_text(
                &format!("Institutions: {}", institution_summary(affiliations)),
                budgets.affiliations,
            ),
            None => format!("Institutions: {}", NOT_AVAILABLE),
        };

        Page::new(vec![
            ContentBlock::title(wrap_text(&record.title, budgets.title)),
            ContentBlock::blank(),
            ContentBlock::run(abstract_text, size::ABSTRACT),
            ContentBlock::blank(),
            ContentBlock::run(source, size::BODY),
            ContentBlock::run(link, size::DETAIL),
            ContentBlock::run(authors, size::DETAIL),
            ContentBlock::blank(),
            ContentBlock::run(institutions, size::DETAIL),
        ])
    }
}

fn summary_page(journal_summary: &[(String, usize)]) -> Page {
    let mut rows = vec![TableRow {
        cells: vec!["Journal".to_string(), "Number of Articles".to_string()],
        shade: RowShade::Header,
    }];
    rows.extend(
        journal_summary
            .iter()
            .enumerate()
            .map(|(i, (journal, count))| TableRow {
                cells: vec![journal.clone(), count.to_string()],
                shade: RowShade::for_row(i),
            }),
    );

    Page::new(vec![
        ContentBlock::title("Journals Found:"),
        ContentBlock::Table { rows },
    ])
}

/// The two most frequent affiliations as `"<name> <count>"` joined by `"; "`
///
/// Ties keep first-encountered order.
pub fn institution_summary(affiliations: &[String]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for affiliation in affiliations {
        match counts.iter_mut().find(|(name, _)| *name == affiliation.as_str()) {
            Some((_, count)) => *count += 1,
            None => counts.push((affiliation.as_str(), 1)),
        }
    }

    // sort_by is stable
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .iter()
        .take(2)
        .map(|(name, count)| format!("{} {}", name, count))
        .collect::<Vec<_>>()
        .join("; ")
}
