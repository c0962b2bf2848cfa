//! Query model: the date window and one PubMed search per (journal, topic) pair.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format accepted from users and sent to PubMed.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Year used as the "open-ended" end date.
pub const OPEN_ENDED_YEAR: i32 = 3000;

/// A date string did not match `YYYY/MM/DD`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Incorrect date format '{input}', should be YYYY/MM/DD")]
pub struct DateFormatError {
    pub input: String,
}

/// Parse a user-supplied `YYYY/MM/DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate, DateFormatError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| DateFormatError {
        input: input.to_string(),
    })
}

/// Format a date as `YYYY/MM/DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// The sentinel end date meaning "up to today".
pub fn open_ended() -> NaiveDate {
    NaiveDate::from_ymd_opt(OPEN_ENDED_YEAR, 1, 1).unwrap_or(NaiveDate::MAX)
}

/// Inclusive entry-date window for a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// One week before `today` up to the open-ended sentinel.
    pub fn last_week(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::weeks(1),
            end: open_ended(),
        }
    }

    /// Build a window from optional CLI strings.
    ///
    /// No start means the default last-week window; no end means open-ended.
    pub fn from_args(
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, DateFormatError> {
        let Some(start) = start else {
            return Ok(Self::last_week(today));
        };
        let start = parse_date(start)?;
        let end = match end {
            Some(end) if !end.trim().is_empty() => parse_date(end)?,
            _ => open_ended(),
        };
        Ok(Self { start, end })
    }

    pub fn is_open_ended(&self) -> bool {
        self.end.year() >= OPEN_ENDED_YEAR
    }

    /// End date as shown in the report: the sentinel becomes `today`.
    ///
    /// The query string keeps the sentinel; only rendering substitutes it.
    pub fn display_end(&self, today: NaiveDate) -> NaiveDate {
        if self.is_open_ended() {
            today
        } else {
            self.end
        }
    }
}

/// One search request for a single (journal, topic) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub keyword: String,
    pub journal: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl QuerySpec {
    pub fn new(keyword: impl Into<String>, journal: impl Into<String>, window: DateWindow) -> Self {
        Self {
            keyword: keyword.into(),
            journal: journal.into(),
            start_date: window.start,
            end_date: window.end,
        }
    }

    /// The PubMed search term for this pair.
    pub fn term(&self) -> String {
        format!(
            "{} AND (\"{}\"[Date - Entry] : \"{}\"[Date - Entry]) AND \"{}\"[Journal]",
            self.keyword,
            format_date(self.start_date),
            format_date(self.end_date),
            self.journal
        )
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.term())
    }
}

/// Plan every (journal, topic) search, journals outermost.
///
/// Identical topics are not collapsed; each pair becomes its own request.
pub fn plan<J, T>(journals: &[J], topics: &[T], window: DateWindow) -> Vec<QuerySpec>
where
    J: AsRef<str>,
    T: AsRef<str>,
{
    journals
        .iter()
        .flat_map(|journal| {
            topics
                .iter()
                .map(move |topic| QuerySpec::new(topic.as_ref(), journal.as_ref(), window))
        })
        .collect()
}
