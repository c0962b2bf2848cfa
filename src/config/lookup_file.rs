//! The lookup file: who is asking, which journals, which topics.
//!
//! # Format
//!
//! Three paragraphs separated by one blank line:
//!
//! ```text
//! reader@example.org
//!
//! Nature
//! Cell
//!
//! CRISPR
//! single-cell RNA sequencing
//! ```
//!
//! The first paragraph is the contact e-mail (exactly one `@`), the second
//! lists journals one per line, the third lists topics one per line.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ConfigError;

/// Default lookup file name in the working directory
pub const DEFAULT_LOOKUP_FILE: &str = "config.txt";

/// Contact, journals and topics for one lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    pub contact: String,
    pub journals: Vec<String>,
    pub topics: Vec<String>,
}

impl LookupConfig {
    /// Read and validate a lookup file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::parse(&content)?;

        tracing::info!(
            "Loaded {} ({} journals, {} topics)",
            path.display(),
            config.journals.len(),
            config.topics.len()
        );
        Ok(config)
    }

    /// Parse the contents of a lookup file
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let content = content.replace("\r\n", "\n");
        let content = content.trim_end_matches('\n');
        if content.trim().is_empty() {
            return Err(ConfigError::Empty);
        }

        let sections: Vec<&str> = content.split("\n\n").collect();
        let [contact, journals, topics] = sections[..] else {
            return Err(ConfigError::Sections(sections.len()));
        };

        let at_signs = contact.matches('@').count();
        if at_signs != 1 {
            return Err(ConfigError::Contact(at_signs));
        }

        let lines = |section: &str| -> Vec<String> {
            section
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        };

        let config = Self {
            contact: contact.trim().to_string(),
            journals: lines(journals),
            topics: lines(topics),
        };

        if config.journals.is_empty() {
            return Err(ConfigError::MissingSection("journals"));
        }
        if config.topics.is_empty() {
            return Err(ConfigError::MissingSection("topics"));
        }

        Ok(config)
    }
}
