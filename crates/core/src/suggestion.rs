//! Parsing of delimited review suggestions
//!
//! The analysis model answers with blocks separated by `---ANNOTATION---`,
//! each holding `KEY: value` lines:
//!
//! ```text
//! ---ANNOTATION---
//! TYPE: structure
//! SEVERITY: medium
//! PAGE: 1
//! TITLE: Introduction needs context
//! DESCRIPTION: The motivation jumps straight to the method.
//! SUGGESTION: Add a paragraph on prior work first.
//! SELECTED: In this paper we
//! ---ANNOTATION---
//! ```

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisError;

pub const ANNOTATION_DELIMITER: &str = "---ANNOTATION---";

pub const DEFAULT_CATEGORY: &str = "content";
pub const DEFAULT_SEVERITY: &str = "medium";
pub const DEFAULT_SUGGESTION: &str = "Please revise according to the relevant guidelines.";

/// A parsed review suggestion, before it is placed on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRecord {
    #[serde(rename = "type")]
    pub category: String,
    pub severity: String,
    pub page: u32,
    pub title: String,
    pub description: String,
    pub suggestion: String,
    /// Snippet used to anchor the annotation; may be empty
    #[serde(default)]
    pub selected_text: String,
}

impl SuggestionRecord {
    /// Text the placement engine searches for first
    pub fn anchor_text(&self) -> &str {
        if self.selected_text.trim().is_empty() {
            &self.title
        } else {
            &self.selected_text
        }
    }
}

/// Accumulates the fields of one segment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionBuilder {
    category: Option<String>,
    severity: Option<String>,
    page: Option<u32>,
    title: Option<String>,
    description: Option<String>,
    suggestion: Option<String>,
    selected_text: Option<String>,
}

impl SuggestionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, value: impl Into<String>) -> Self {
        self.category = non_empty(value.into());
        self
    }

    pub fn severity(mut self, value: impl Into<String>) -> Self {
        self.severity = non_empty(value.into());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page).filter(|p| *p > 0);
        self
    }

    pub fn title(mut self, value: impl Into<String>) -> Self {
        self.title = non_empty(value.into());
        self
    }

    pub fn description(mut self, value: impl Into<String>) -> Self {
        self.description = non_empty(value.into());
        self
    }

    pub fn suggestion(mut self, value: impl Into<String>) -> Self {
        self.suggestion = non_empty(value.into());
        self
    }

    pub fn selected_text(mut self, value: impl Into<String>) -> Self {
        self.selected_text = non_empty(value.into());
        self
    }

    /// Apply one `KEY: value` line; unknown keys are ignored
    pub fn apply_line(self, line: &str) -> Self {
        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else {
            return self;
        };
        let value = value.trim();

        match key {
            "TYPE" => self.category(value),
            "SEVERITY" => self.severity(value),
            "PAGE" => self.page(parse_page(value)),
            "TITLE" => self.title(value),
            "DESCRIPTION" => self.description(value),
            "SUGGESTION" => self.suggestion(value),
            "SELECTED" => self.selected_text(value),
            _ => self,
        }
    }

    /// Finish the record; `None` when title or description is missing
    pub fn build(self) -> Option<SuggestionRecord> {
        Some(SuggestionRecord {
            title: self.title?,
            description: self.description?,
            category: self.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_owned()),
            severity: self.severity.unwrap_or_else(|| DEFAULT_SEVERITY.to_owned()),
            page: self.page.unwrap_or(1),
            suggestion: self.suggestion.unwrap_or_else(|| DEFAULT_SUGGESTION.to_owned()),
            selected_text: self.selected_text.unwrap_or_default(),
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Leading decimal digits of `value`; anything else reads as page 1
fn parse_page(value: &str) -> u32 {
    let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
    digits.parse::<u32>().ok().filter(|page| *page > 0).unwrap_or(1)
}

/// Parse every valid segment of a delimited block, in order
///
/// Segments without a title or description are dropped.
pub fn parse_suggestions(block: &str) -> Vec<SuggestionRecord> {
    let mut records = Vec::new();

    for (index, segment) in block.split(ANNOTATION_DELIMITER).enumerate() {
        if segment.trim().is_empty() {
            continue;
        }

        let builder = segment.lines().fold(SuggestionBuilder::new(), SuggestionBuilder::apply_line);
        match builder.build() {
            Some(record) => records.push(record),
            None => tracing::warn!(segment = index, "suggestion segment lacks TITLE or DESCRIPTION; skipped"),
        }
    }

    tracing::debug!(count = records.len(), "parsed suggestions");
    records
}

/// Like [`parse_suggestions`], but an empty answer is an error
pub fn parse_response(block: &str) -> Result<Vec<SuggestionRecord>, AnalysisError> {
    if block.trim().is_empty() {
        return Err(AnalysisError::Parse("analysis response was empty".to_owned()));
    }

    let records = parse_suggestions(block);
    if records.is_empty() {
        return Err(AnalysisError::Parse(
            "analysis response contained no complete suggestions".to_owned(),
        ));
    }

    Ok(records)
}
