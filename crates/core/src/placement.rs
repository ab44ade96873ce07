//! Turning parsed suggestions into positioned review comments

use chrono::{DateTime, Utc};
use doc_model::Rect;
use serde::Serialize;

use crate::annotation::{Annotation, AnnotationKind, AnnotationStore};
use crate::locator::{locate, LocateStrategy};
use crate::suggestion::SuggestionRecord;
use crate::text_layer::{PageTextRuns, PageTextSource, TextRunIndex};

/// Author recorded on placed suggestions
pub const REVIEWER_AUTHOR: &str = "Reviewer";

const FALLBACK_EXTENT_WIDTH: f32 = 600.0;
const FALLBACK_EXTENT_HEIGHT: f32 = 800.0;

/// How a placed annotation got its geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementSource {
    /// Located through the anchor text
    Anchor(LocateStrategy),
    /// Located through the title after the anchor missed
    Title(LocateStrategy),
    /// Spread across the page's text quadrants
    Quadrant,
    /// Page has no text; laid out on a fixed grid
    Grid,
}

#[derive(Debug, Clone, Default)]
pub struct AutoPlacer {
    author: Option<String>,
    page_count: Option<u32>,
    timestamp: Option<DateTime<Utc>>,
}

impl AutoPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamp record pages into `[1, page_count]`
    pub fn with_page_count(mut self, page_count: u32) -> Self {
        self.page_count = Some(page_count.max(1));
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Fix the timestamp stamped on every annotation of a batch
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    fn target_page(&self, page: u32) -> u32 {
        match self.page_count {
            Some(count) => page.clamp(1, count),
            None => page.max(1),
        }
    }

    /// Place every record, in input order
    pub fn place<S: PageTextSource>(
        &self,
        index: &TextRunIndex<S>,
        records: &[SuggestionRecord],
    ) -> Vec<Annotation> {
        self.place_with_sources(index, records).into_iter().map(|(annotation, _)| annotation).collect()
    }

    /// Place every record and report how each one was positioned
    pub fn place_with_sources<S: PageTextSource>(
        &self,
        index: &TextRunIndex<S>,
        records: &[SuggestionRecord],
    ) -> Vec<(Annotation, PlacementSource)> {
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        let author = self.author.as_deref().unwrap_or(REVIEWER_AUTHOR);

        records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let page = self.target_page(record.page);
                let runs = index.page(page);
                let (rect, source) = place_record(&runs, record, i);

                tracing::debug!(
                    index = i,
                    page,
                    source = ?source,
                    title = %record.title,
                    "placed suggestion"
                );

                let annotation = Annotation::new(page, AnnotationKind::Comment, rect)
                    .with_author(author)
                    .with_content(comment_body(record))
                    .with_selected_text(selected_text(record))
                    .with_timestamp(timestamp);
                (annotation, source)
            })
            .collect()
    }

    /// Place every record and append the results to `store`
    pub fn place_into<S: PageTextSource>(
        &self,
        index: &TextRunIndex<S>,
        records: &[SuggestionRecord],
        store: &mut AnnotationStore,
    ) -> usize {
        let placed = self.place(index, records);
        let count = placed.len();
        store.extend(placed);
        count
    }
}

fn place_record(runs: &PageTextRuns, record: &SuggestionRecord, i: usize) -> (Rect, PlacementSource) {
    let anchor = locate(runs.runs(), record.anchor_text());
    if anchor.is_found() {
        return (anchor.rect, PlacementSource::Anchor(anchor.strategy));
    }

    let by_title = locate(runs.runs(), &record.title);
    if by_title.is_found() {
        return (by_title.rect, PlacementSource::Title(by_title.strategy));
    }

    if runs.is_empty() {
        (grid_rect(i), PlacementSource::Grid)
    } else {
        (quadrant_rect(runs, i), PlacementSource::Quadrant)
    }
}

/// One of four page sections, chosen by record index
fn quadrant_rect(runs: &PageTextRuns, i: usize) -> Rect {
    let (extent_w, extent_h) = runs.extent();
    let extent_w = if extent_w > 0.0 { extent_w } else { FALLBACK_EXTENT_WIDTH };
    let extent_h = if extent_h > 0.0 { extent_h } else { FALLBACK_EXTENT_HEIGHT };

    let section = i % 4;
    let section_h = extent_h / 4.0;
    let column = (section % 2) as f32;
    let row = (section / 2) as f32;

    Rect::new(
        50.0 + column * 0.4 * extent_w,
        100.0 + row * section_h,
        (0.3 * extent_w).min(250.0),
        (0.6 * section_h).min(80.0),
    )
}

/// Three-column grid for pages without text
fn grid_rect(i: usize) -> Rect {
    let column = (i % 3) as f32;
    let row = (i / 3) as f32;
    Rect::new(50.0 + column * 150.0, 100.0 + row * 100.0, 220.0, 80.0)
}

fn comment_body(record: &SuggestionRecord) -> String {
    format!("{}\n\n{}\n\nSuggestion: {}", record.title, record.description, record.suggestion)
}

fn selected_text(record: &SuggestionRecord) -> String {
    let anchor = record.anchor_text().trim();
    if anchor.is_empty() {
        format!("{} related content", record.category)
    } else {
        anchor.to_owned()
    }
}
