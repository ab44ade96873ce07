//! Locating a text snippet on a page
//!
//! The search escalates through progressively looser strategies and always
//! yields a rectangle in unscaled document space. The strategy tells the
//! caller whether the text was actually found.

use doc_model::Rect;
use serde::Serialize;

use crate::text_layer::{PageTextSource, TextRun, TextRunIndex};

/// Margin added around matched runs
pub const MATCH_PADDING: f32 = 10.0;
pub const MIN_MATCH_WIDTH: f32 = 120.0;
pub const MIN_MATCH_HEIGHT: f32 = 30.0;

/// Rectangle reported when nothing on the page matches
pub const DEFAULT_RECT: Rect = Rect::new(50.0, 100.0, 200.0, 60.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateStrategy {
    /// Every run containing the whole query
    Substring,
    /// First run containing one of the query's longer words
    Keyword,
    /// First run containing any query word of two or more characters
    SimilarToken,
    /// Nothing matched
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Located {
    pub rect: Rect,
    pub strategy: LocateStrategy,
}

impl Located {
    fn not_found() -> Self {
        Self { rect: DEFAULT_RECT, strategy: LocateStrategy::Default }
    }

    pub fn is_found(&self) -> bool {
        self.strategy != LocateStrategy::Default
    }
}

/// Find `query` among a page's runs
pub fn locate(runs: &[TextRun], query: &str) -> Located {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || runs.is_empty() {
        return Located::not_found();
    }

    let lowered: Vec<String> = runs.iter().map(|run| run.text.to_lowercase()).collect();

    let matches: Vec<&TextRun> = runs
        .iter()
        .zip(&lowered)
        .filter(|(_, text)| text.contains(&needle))
        .map(|(run, _)| run)
        .collect();
    if let Some(rect) = padded_bounds(&matches) {
        return Located { rect, strategy: LocateStrategy::Substring };
    }

    let first_containing = |word: &str| {
        runs.iter().zip(&lowered).find(|(_, text)| text.contains(word)).map(|(run, _)| run)
    };

    let keyword_hit =
        needle.split_whitespace().filter(|w| w.chars().count() > 2).find_map(first_containing);
    if let Some(rect) = keyword_hit.and_then(|run| padded_bounds(&[run])) {
        return Located { rect, strategy: LocateStrategy::Keyword };
    }

    let similar_hit =
        needle.split_whitespace().filter(|w| w.chars().count() > 1).find_map(first_containing);
    if let Some(run) = similar_hit {
        let rect =
            Rect::new(run.x, run.y, (run.width * 3.0).max(150.0), (run.height * 2.0).max(40.0));
        return Located { rect, strategy: LocateStrategy::SimilarToken };
    }

    Located::not_found()
}

/// Locate `query` on a 1-based page of an index
pub fn locate_on_page<S: PageTextSource>(
    index: &TextRunIndex<S>,
    page: u32,
    query: &str,
) -> Located {
    locate(index.page(page).runs(), query)
}

/// Union of the runs' boxes, padded and clamped to the minimum match size
fn padded_bounds(runs: &[&TextRun]) -> Option<Rect> {
    let union = runs.iter().map(|run| run.rect()).reduce(|acc, rect| acc.union(&rect))?;

    Some(Rect::new(
        (union.x - MATCH_PADDING).max(0.0),
        (union.y - MATCH_PADDING).max(0.0),
        (union.width + MATCH_PADDING * 2.0).max(MIN_MATCH_WIDTH),
        (union.height + MATCH_PADDING * 2.0).max(MIN_MATCH_HEIGHT),
    ))
}
