//! Per-page text-run index
//!
//! Positioned text is extracted lazily, one page at a time, converted to
//! top-left document space and cached for the lifetime of the loaded
//! document. Locating annotation anchors and reading drag selections both
//! work against these runs.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use doc_model::Rect;
use pdf_engine::{LoadedDocument, PdfEngineError, TextItem};
use serde::Serialize;

/// Font size and height used when extraction reports a zero scale
const FALLBACK_FONT_SIZE: f32 = 12.0;

/// A positioned text fragment in unscaled document space
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub text: String,
    /// Left edge
    pub x: f32,
    /// Top edge, measured down from the top of the page
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_name: String,
    pub font_size: f32,
}

impl TextRun {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
            font_name: String::new(),
            font_size: height,
        }
    }

    /// Convert an extracted item, flipping its baseline into top-left space
    ///
    /// `y = page_height - baseline - |d|`, so the run's top edge sits one
    /// font height above the baseline.
    pub fn from_item(item: &TextItem, page_height: f32) -> Self {
        let [a, _, _, d, e, f] = item.transform;
        let height = non_zero_or(d.abs(), FALLBACK_FONT_SIZE);
        Self {
            text: item.text.clone(),
            x: e,
            y: page_height - f - d.abs(),
            width: item.width.max(0.0),
            height,
            font_name: item.font_name.clone(),
            font_size: non_zero_or(a.abs(), FALLBACK_FONT_SIZE),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

fn non_zero_or(value: f32, fallback: f32) -> f32 {
    if value == 0.0 || !value.is_finite() {
        fallback
    } else {
        value
    }
}

/// All runs of one page, in extraction order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTextRuns {
    page: u32,
    runs: Vec<TextRun>,
}

impl PageTextRuns {
    pub fn new(page: u32, runs: Vec<TextRun>) -> Self {
        Self { page, runs }
    }

    pub fn empty(page: u32) -> Self {
        Self { page, runs: Vec::new() }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Run strings joined by single spaces
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect::<Vec<_>>().join(" ")
    }

    /// Right-most and bottom-most extent covered by any run
    pub fn extent(&self) -> (f32, f32) {
        self.runs.iter().fold((0.0f32, 0.0f32), |(w, h), run| {
            (w.max(run.x + run.width), h.max(run.y + run.height))
        })
    }

    /// Runs lying entirely inside `region`
    pub fn runs_in(&self, region: &Rect) -> impl Iterator<Item = &TextRun> + '_ {
        let region = *region;
        self.runs.iter().filter(move |run| region.contains_rect(&run.rect()))
    }
}

/// Page text extraction capability
///
/// Pages are 1-based.
pub trait PageTextSource {
    fn page_count(&self) -> u32;

    fn extract_runs(&self, page: u32) -> Result<Vec<TextRun>, PdfEngineError>;
}

impl PageTextSource for LoadedDocument {
    fn page_count(&self) -> u32 {
        LoadedDocument::page_count(self)
    }

    fn extract_runs(&self, page: u32) -> Result<Vec<TextRun>, PdfEngineError> {
        let index = page
            .checked_sub(1)
            .ok_or(PdfEngineError::PageOutOfRange { page, page_count: self.page_count() })?;
        let height = self.page_size(index)?.height_pt;
        let items = self.extract_text(index)?;
        Ok(items.iter().map(|item| TextRun::from_item(item, height)).collect())
    }
}

impl<T: PageTextSource + ?Sized> PageTextSource for Arc<T> {
    fn page_count(&self) -> u32 {
        (**self).page_count()
    }

    fn extract_runs(&self, page: u32) -> Result<Vec<TextRun>, PdfEngineError> {
        (**self).extract_runs(page)
    }
}

/// Lazily built, per-page cache of text runs
///
/// Each page is extracted at most once. A page whose extraction fails is
/// cached as empty, so every lookup on it falls through to default
/// placement.
#[derive(Debug)]
pub struct TextRunIndex<S> {
    source: S,
    pages: RwLock<HashMap<u32, Arc<PageTextRuns>>>,
}

impl<S: PageTextSource> TextRunIndex<S> {
    pub fn new(source: S) -> Self {
        Self { source, pages: RwLock::new(HashMap::new()) }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn page_count(&self) -> u32 {
        self.source.page_count()
    }

    /// Runs for a page, extracting them on first use
    pub fn page(&self, page: u32) -> Arc<PageTextRuns> {
        if let Some(runs) = self.pages.read().unwrap_or_else(PoisonError::into_inner).get(&page) {
            return Arc::clone(runs);
        }

        let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have built it while we waited for the lock.
        if let Some(runs) = pages.get(&page) {
            return Arc::clone(runs);
        }

        let runs = match self.source.extract_runs(page) {
            Ok(runs) => {
                tracing::debug!(page, runs = runs.len(), "indexed page text");
                PageTextRuns::new(page, runs)
            }
            Err(err) => {
                tracing::warn!(page, error = %err, "text extraction failed; page treated as empty");
                PageTextRuns::empty(page)
            }
        };

        let runs = Arc::new(runs);
        pages.insert(page, Arc::clone(&runs));
        runs
    }

    pub fn is_cached(&self, page: u32) -> bool {
        self.pages.read().unwrap_or_else(PoisonError::into_inner).contains_key(&page)
    }

    /// Number of pages extracted so far
    pub fn cached_pages(&self) -> usize {
        self.pages.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Switch to a different document, dropping every cached page
    pub fn reset(&mut self, source: S) {
        self.source = source;
        self.pages.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Whole-document text in the form sent for analysis
    ///
    /// Every page contributes a `=== Page N ===` header followed by its run
    /// strings joined by spaces.
    pub fn document_text(&self) -> String {
        let mut text = String::new();
        for page in 1..=self.page_count() {
            text.push_str(&format!("\n\n=== Page {page} ===\n"));
            text.push_str(&self.page(page).text());
        }
        text
    }

    /// Text of the runs fully inside a document-space region
    pub fn text_in_region(&self, page: u32, region: &Rect) -> String {
        let runs = self.page(page);
        let text =
            runs.runs_in(region).map(|run| run.text.as_str()).collect::<Vec<_>>().join(" ");
        let text = text.trim();

        if text.is_empty() {
            format!("Selected content on page {page}")
        } else {
            text.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_pdf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        pages: Vec<Option<Vec<TextRun>>>,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn new(pages: Vec<Option<Vec<TextRun>>>) -> Self {
            Self { pages, calls: AtomicUsize::new(0) }
        }
    }

    impl PageTextSource for CountingSource {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn extract_runs(&self, page: u32) -> Result<Vec<TextRun>, PdfEngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(page as usize - 1)
                .cloned()
                .flatten()
                .ok_or(PdfEngineError::PageOutOfRange { page, page_count: self.page_count() })
        }
    }

    #[test]
    fn test_item_is_flipped_into_top_left_space() {
        let item = TextItem {
            text: "Revenue".to_owned(),
            transform: [10.0, 0.0, 0.0, 14.0, 72.0, 700.0],
            width: 40.0,
            height: 14.0,
            font_name: "Helvetica".to_owned(),
        };
        let run = TextRun::from_item(&item, 792.0);
        assert_eq!(run.x, 72.0);
        assert_eq!(run.y, 78.0);
        assert_eq!(run.height, 14.0);
        assert_eq!(run.font_size, 10.0);

        let flat = TextItem { transform: [0.0, 0.0, 0.0, 0.0, 5.0, 5.0], ..item };
        let run = TextRun::from_item(&flat, 100.0);
        assert_eq!(run.height, 12.0);
        assert_eq!(run.font_size, 12.0);
    }

    #[test]
    fn test_page_is_extracted_once() {
        let index = TextRunIndex::new(CountingSource::new(vec![Some(vec![TextRun::new(
            "hello", 1.0, 2.0, 3.0, 4.0,
        )])]));

        let first = index.page(1);
        let second = index.page(1);
        assert_eq!(first.runs().len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(index.source().calls.load(Ordering::SeqCst), 1);
        assert!(index.is_cached(1));
    }

    #[test]
    fn test_failed_extraction_caches_empty_page() {
        let index = TextRunIndex::new(CountingSource::new(vec![None]));
        assert!(index.page(1).is_empty());
        assert!(index.page(1).is_empty());
        assert_eq!(index.source().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_drops_cache() {
        let mut index = TextRunIndex::new(CountingSource::new(vec![Some(Vec::new())]));
        index.page(1);
        assert_eq!(index.cached_pages(), 1);

        index.reset(CountingSource::new(vec![Some(Vec::new()), Some(Vec::new())]));
        assert_eq!(index.cached_pages(), 0);
        assert_eq!(index.page_count(), 2);
    }

    #[test]
    fn test_document_text_has_page_headers() {
        let index = TextRunIndex::new(CountingSource::new(vec![
            Some(vec![TextRun::new("A", 0.0, 0.0, 1.0, 1.0), TextRun::new("B", 2.0, 0.0, 1.0, 1.0)]),
            Some(vec![TextRun::new("C", 0.0, 0.0, 1.0, 1.0)]),
        ]));
        assert_eq!(index.document_text(), "\n\n=== Page 1 ===\nA B\n\n=== Page 2 ===\nC");
    }

    #[test]
    fn test_region_text_keeps_runs_fully_inside() {
        let index = TextRunIndex::new(CountingSource::new(vec![Some(vec![
            TextRun::new("inside", 10.0, 10.0, 30.0, 10.0),
            TextRun::new("also", 45.0, 10.0, 20.0, 10.0),
            TextRun::new("straddles", 90.0, 10.0, 30.0, 10.0),
        ])]));

        let region = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(index.text_in_region(1, &region), "inside also");

        let empty = Rect::new(300.0, 300.0, 20.0, 20.0);
        assert_eq!(index.text_in_region(1, &empty), "Selected content on page 1");
    }

    #[test]
    fn test_loaded_document_source() {
        let bytes = sample_pdf(&["BT /F1 12 Tf 72 700 Td (Net income) Tj ET"]);
        let document = LoadedDocument::from_bytes(&bytes).expect("load");
        let index = TextRunIndex::new(document);

        let page = index.page(1);
        assert_eq!(page.runs().len(), 1);
        let run = &page.runs()[0];
        assert_eq!(run.text, "Net income");
        assert_eq!(run.x, 72.0);
        assert_eq!(run.y, 80.0);
        assert!(index.page(2).is_empty());
    }
}
