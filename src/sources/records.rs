//! E-utilities response schemas and metadata extraction.
//!
//! `efetch` payloads are deserialized into [`RawRecord`], a typed view of the
//! `PubmedArticleSet` document in which every field the report needs is an
//! `Option` or a defaulted `Vec`. Extraction then maps each article onto a
//! [`PublicationRecord`] without any unchecked lookups.

use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::models::{Extracted, PubDate, PublicationRecord};
use crate::sources::SourceError;

/// Parsed body of one `efetch` call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "PubmedArticle", default)]
    pub articles: Vec<RawArticle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArticle {
    #[serde(rename = "MedlineCitation")]
    pub medline_citation: Option<MedlineCitation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedlineCitation {
    #[serde(rename = "Article")]
    pub article: Option<Article>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(non_snake_case)]
pub struct Article {
    pub Journal: Option<Journal>,
    pub ArticleTitle: Option<TextNode>,
    pub Abstract: Option<Abstract>,
    #[serde(default)]
    pub ELocationID: Vec<TextNode>,
    pub AuthorList: Option<AuthorList>,
    #[serde(default)]
    pub ArticleDate: Vec<ArticleDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(non_snake_case)]
pub struct Journal {
    pub Title: Option<TextNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Abstract {
    #[serde(rename = "AbstractText", default)]
    pub sections: Vec<TextNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorList {
    #[serde(rename = "Author", default)]
    pub authors: Vec<Author>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(non_snake_case)]
pub struct Author {
    pub LastName: Option<TextNode>,
    #[serde(default)]
    pub AffiliationInfo: Vec<AffiliationInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(non_snake_case)]
pub struct AffiliationInfo {
    pub Affiliation: Option<TextNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(non_snake_case)]
pub struct ArticleDate {
    pub Year: Option<String>,
    pub Month: Option<String>,
    pub Day: Option<String>,
}

/// Element whose only interesting content is its text
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextNode {
    #[serde(rename = "$text", default)]
    pub text: String,
}

/// Name of the first element in an XML document
fn root_element(xml: &str) -> Result<String, SourceError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned())
            }
            Ok(Event::Eof) => return Err(SourceError::Parse("empty response body".to_string())),
            Ok(_) => continue,
            Err(e) => return Err(SourceError::Parse(format!("malformed XML: {}", e))),
        }
    }
}

fn expect_root(xml: &str, expected: &str) -> Result<(), SourceError> {
    let root = root_element(xml)?;
    if root == expected {
        Ok(())
    } else {
        Err(SourceError::Parse(format!(
            "expected <{}> document, got <{}>",
            expected, root
        )))
    }
}

/// Elements whose whole content is read as text
const TEXT_ELEMENTS: [&[u8]; 3] = [b"ArticleTitle", b"AbstractText", b"Affiliation"];

/// Turn child elements of title, abstract and affiliation text into literal
/// markup
///
/// PubMed embeds italics, sub/superscripts, bold and MathML inside these
/// elements. Escaping every child tag keeps the text in one piece with the
/// tags written out; the layout engine strips the ones it recognises.
fn flatten_inline_markup(xml: &str) -> Result<String, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut flat = String::with_capacity(xml.len());
    let mut copied = 0;
    // Child element depth while inside a text element
    let mut depth: Option<usize> = None;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| SourceError::Parse(format!("malformed XML: {}", e)))?;
        let end = reader.buffer_position() as usize;

        let literal = match (&event, depth) {
            (Event::Eof, _) => break,
            (Event::Start(e), None) => {
                if TEXT_ELEMENTS.contains(&e.name().as_ref()) {
                    depth = Some(0);
                }
                false
            }
            (Event::Start(_), Some(d)) => {
                depth = Some(d + 1);
                true
            }
            (Event::Empty(_), Some(_)) => true,
            (Event::End(_), Some(0)) => {
                depth = None;
                false
            }
            (Event::End(_), Some(d)) => {
                depth = Some(d - 1);
                true
            }
            _ => false,
        };

        if literal {
            flat.push_str(&xml[copied..start]);
            flat.push_str(&xml[start..end].replace('<', "&lt;").replace('>', "&gt;"));
            copied = end;
        }
    }

    flat.push_str(&xml[copied..]);
    Ok(flat)
}

/// Parse an `esearch` response body into PubMed identifiers
pub fn parse_search_response(xml: &str) -> Result<Vec<String>, SourceError> {
    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct ESearchResult {
        IdList: Option<IdList>,
        ERROR: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct IdList {
        #[serde(rename = "Id", default)]
        ids: Vec<String>,
    }

    expect_root(xml, "eSearchResult")?;

    let result: ESearchResult = from_str(xml)
        .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed search XML: {}", e)))?;

    match (result.IdList, result.ERROR) {
        (Some(list), _) => Ok(list.ids),
        (None, Some(error)) => Err(SourceError::Parse(format!("PubMed search error: {}", error))),
        (None, None) => Err(SourceError::Parse(
            "PubMed search response has no IdList".to_string(),
        )),
    }
}

/// Parse an `efetch` response body
pub fn parse_fetch_response(xml: &str) -> Result<RawRecord, SourceError> {
    expect_root(xml, "PubmedArticleSet")?;

    let xml = flatten_inline_markup(xml)?;
    from_str(&xml)
        .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed fetch XML: {}", e)))
}

/// Extract report records from every article of every fetched record
pub fn extract(records: &[RawRecord]) -> Vec<PublicationRecord> {
    let articles = records.iter().flat_map(|record| record.articles.iter());
    let mut publications = Vec::new();
    let mut skipped = 0usize;

    for article in articles {
        match extract_article(article) {
            Some(publication) => publications.push(publication),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::info!("Skipped {} articles without a title or abstract", skipped);
    }

    publications
}

/// Map one article onto a publication record
///
/// Returns `None` when the article has no title or no abstract. Every other
/// missing field falls back independently: journal and affiliations are left
/// out, date, link and authors become `NotAvailable`.
pub fn extract_article(article: &RawArticle) -> Option<PublicationRecord> {
    let body = article.medline_citation.as_ref()?.article.as_ref()?;

    let title = body.ArticleTitle.as_ref()?.text.clone();

    // TODO: articles without an abstract are dropped; confirm with users
    // whether they should be kept and shown as "Abstract: Not available".
    let abstract_text = body.Abstract.as_ref()?.sections.first()?.text.clone();

    let journal = body
        .Journal
        .as_ref()
        .and_then(|j| j.Title.as_ref())
        .map(|t| t.text.clone());

    let date = body
        .ArticleDate
        .first()
        .map(|d| PubDate {
            year: d.Year.clone(),
            month: d.Month.clone(),
            day: d.Day.clone(),
        })
        .into();

    let link = body.ELocationID.first().map(|l| l.text.clone()).into();

    // One author without a surname (e.g. a collective) voids the whole list
    let authors: Extracted<Vec<String>> = body
        .AuthorList
        .as_ref()
        .and_then(|list| {
            list.authors
                .iter()
                .map(|a| a.LastName.as_ref().map(|n| n.text.clone()))
                .collect::<Option<Vec<_>>>()
        })
        .into();

    let affiliations = body.AuthorList.as_ref().map(|list| {
        list.authors
            .iter()
            .flat_map(|a| a.AffiliationInfo.iter())
            .filter_map(|info| info.Affiliation.as_ref())
            .map(|a| a.text.clone())
            .collect::<Vec<_>>()
    });

    Some(PublicationRecord {
        title,
        r#abstract: Some(abstract_text),
        journal,
        date,
        link,
        authors,
        affiliations,
    })
}
