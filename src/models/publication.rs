//! Normalized publication record and the title-unique publication set.

use serde::{Deserialize, Serialize};

use crate::utils::deduplicate_by_title;

/// A field that was looked up on the article and either found or explicitly
/// marked as not available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Extracted<T> {
    Present(T),
    NotAvailable,
}

impl<T> Extracted<T> {
    pub fn as_present(&self) -> Option<&T> {
        match self {
            Extracted::Present(value) => Some(value),
            Extracted::NotAvailable => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Extracted::Present(_))
    }
}

impl<T> From<Option<T>> for Extracted<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Extracted::NotAvailable, Extracted::Present)
    }
}

/// The first electronic article date, with each component as reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubDate {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
}

impl PubDate {
    /// `YYYY/MM/DD`, only when all three parts are known.
    pub fn formatted(&self) -> Option<String> {
        match (&self.year, &self.month, &self.day) {
            (Some(y), Some(m), Some(d)) => Some(format!("{}/{}/{}", y, m, d)),
            _ => None,
        }
    }
}

/// A publication as it appears in the report.
///
/// Date, link and authors are `Extracted` so a missing value is explicit;
/// journal and affiliations are plain options and may simply be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub title: String,
    pub r#abstract: Option<String>,
    pub journal: Option<String>,
    pub date: Extracted<PubDate>,
    pub link: Extracted<String>,
    pub authors: Extracted<Vec<String>>,
    /// One entry per author affiliation, duplicates kept.
    pub affiliations: Option<Vec<String>>,
}

impl PublicationRecord {
    /// A record with only a title; everything else not available.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            r#abstract: None,
            journal: None,
            date: Extracted::NotAvailable,
            link: Extracted::NotAvailable,
            authors: Extracted::NotAvailable,
            affiliations: None,
        }
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.r#abstract = Some(text.into());
        self
    }

    pub fn with_journal(mut self, journal: impl Into<String>) -> Self {
        self.journal = Some(journal.into());
        self
    }

    pub fn with_date(mut self, date: PubDate) -> Self {
        self.date = Extracted::Present(date);
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Extracted::Present(link.into());
        self
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = Extracted::Present(authors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_affiliations<I, S>(mut self, affiliations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affiliations = Some(affiliations.into_iter().map(Into::into).collect());
        self
    }
}

/// Publications with unique titles, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationSet {
    records: Vec<PublicationRecord>,
}

impl PublicationSet {
    /// Build a set, dropping every record whose exact title was already seen.
    pub fn from_records(records: Vec<PublicationRecord>) -> Self {
        Self {
            records: deduplicate_by_title(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PublicationRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[PublicationRecord] {
        &self.records
    }

    /// Publication count per journal, in first-encountered order.
    ///
    /// Records without a journal are not counted.
    pub fn journal_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for journal in self.records.iter().filter_map(|r| r.journal.as_deref()) {
            match counts.iter_mut().find(|(name, _)| name == journal) {
                Some((_, count)) => *count += 1,
                None => counts.push((journal.to_string(), 1)),
            }
        }
        counts
    }
}

impl<'a> IntoIterator for &'a PublicationSet {
    type Item = &'a PublicationRecord;
    type IntoIter = std::slice::Iter<'a, PublicationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
