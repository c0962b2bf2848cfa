//! Greedy word wrapping for report text.

use serde::{Deserialize, Serialize};

/// Inline tags removed before wrapping; nothing else is normalized
pub const MARKUP_TAGS: [&str; 6] = ["<sub>", "</sub>", "<i>", "</i>", "<sup>", "</sup>"];

/// Maximum characters per line for each kind of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutBudgets {
    #[serde(default = "default_title")]
    pub title: usize,

    #[serde(default = "default_abstract")]
    pub abstract_text: usize,

    #[serde(default = "default_authors")]
    pub authors: usize,

    #[serde(default = "default_affiliations")]
    pub affiliations: usize,

    #[serde(default = "default_keywords")]
    pub keywords: usize,
}

impl Default for LayoutBudgets {
    fn default() -> Self {
        Self {
            title: default_title(),
            abstract_text: default_abstract(),
            authors: default_authors(),
            affiliations: default_affiliations(),
            keywords: default_keywords(),
        }
    }
}

fn default_title() -> usize {
    75
}

fn default_abstract() -> usize {
    115
}

fn default_authors() -> usize {
    170
}

fn default_affiliations() -> usize {
    170
}

fn default_keywords() -> usize {
    100
}

/// Remove the recognised inline tags
pub fn strip_markup(text: &str) -> String {
    MARKUP_TAGS
        .iter()
        .fold(text.to_string(), |acc, tag| acc.replace(tag, ""))
}

/// Split `text` into lines of at most `max_line_chars` characters
///
/// Breaks at the last space within the budget; a word longer than the budget
/// is cut exactly at the budget. Whitespace at the start of each continuation
/// is dropped. The last line may be empty. Lengths count `char`s, and a
/// budget of zero is treated as one.
pub fn wrap(text: &str, max_line_chars: usize) -> Vec<String> {
    let budget = max_line_chars.max(1);
    let mut rest = strip_markup(text);
    let mut lines = Vec::new();

    while rest.chars().count() > budget {
        let window_end = rest
            .char_indices()
            .nth(budget)
            .map_or(rest.len(), |(i, _)| i);
        let split = rest[..window_end].rfind(' ').unwrap_or(window_end);

        lines.push(rest[..split].to_string());
        rest = rest[split..].trim_start().to_string();
    }

    lines.push(rest);
    lines
}

/// [`wrap`] and join the lines with newlines
pub fn wrap_text(text: &str, max_line_chars: usize) -> String {
    wrap(text, max_line_chars).join("\n")
}
