//! Annotation data model
//!
//! Annotations carry their geometry in unscaled document space (zoom 1.0,
//! origin top-left). Viewport positions are derived at render time and the
//! stored geometry is never rescaled.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use doc_model::{Rect, Zoom, DEFAULT_AUTHOR, MIN_SELECTION_PX};
use serde::{Deserialize, Serialize};

/// Unique identifier for an annotation
///
/// Generated using UUID v4; stable for the lifetime of the session and
/// carried through the JSON wire format.
pub type AnnotationId = uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnnotationError {
    #[error("{0} annotations need non-empty content")]
    EmptyContent(AnnotationKind),
    #[error("annotation {0} not found")]
    NotFound(AnnotationId),
    #[error("page numbers start at 1 (got {0})")]
    InvalidPage(u32),
    #[error("annotation {0} has non-finite or negative geometry")]
    InvalidGeometry(AnnotationId),
    #[error("selection of {width}x{height}px is too small; drag more than {min}px on both axes")]
    SelectionTooSmall { width: f32, height: f32, min: f32 },
    #[error("unknown annotation type '{0}' (expected highlight, comment, note or strikeout)")]
    UnknownKind(String),
}

/// Annotation variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Comment,
    Note,
    Strikeout,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 4] = [
        AnnotationKind::Highlight,
        AnnotationKind::Comment,
        AnnotationKind::Note,
        AnnotationKind::Strikeout,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::Comment => "comment",
            AnnotationKind::Note => "note",
            AnnotationKind::Strikeout => "strikeout",
        }
    }

    /// Markup tools create the annotation as soon as the drag ends; comment
    /// and note tools wait for typed content.
    pub fn creates_immediately(self) -> bool {
        matches!(self, AnnotationKind::Highlight | AnnotationKind::Strikeout)
    }

    /// Content used when an immediate tool is applied without text
    pub fn default_content(self) -> Option<&'static str> {
        match self {
            AnnotationKind::Highlight => Some("Highlight"),
            AnnotationKind::Strikeout => Some("Strikeout"),
            AnnotationKind::Comment | AnnotationKind::Note => None,
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnotationKind {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        AnnotationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| AnnotationError::UnknownKind(s.to_owned()))
    }
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_owned()
}

/// A single annotation
///
/// Wire format (camelCase JSON):
/// `{id, page, author, content, timestamp, x, y, width, height, type, selectedText}`.
/// A missing `id` is assigned on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(default = "uuid::Uuid::new_v4")]
    id: AnnotationId,

    /// 1-based page number
    page: u32,

    #[serde(default = "default_author")]
    author: String,

    #[serde(default)]
    content: String,

    #[serde(default = "chrono::Utc::now")]
    timestamp: DateTime<Utc>,

    /// Unscaled document-space geometry
    #[serde(flatten)]
    rect: Rect,

    #[serde(rename = "type")]
    kind: AnnotationKind,

    #[serde(default)]
    selected_text: String,
}

impl Annotation {
    /// Create a new annotation with a generated ID and the current time
    pub fn new(page: u32, kind: AnnotationKind, rect: Rect) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            page,
            author: default_author(),
            content: String::new(),
            timestamp: Utc::now(),
            rect,
            kind,
            selected_text: String::new(),
        }
    }

    pub fn with_id(mut self, id: AnnotationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_selected_text(mut self, selected_text: impl Into<String>) -> Self {
        self.selected_text = selected_text.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Stored geometry in unscaled document space
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn kind(&self) -> AnnotationKind {
        self.kind
    }

    pub fn selected_text(&self) -> &str {
        &self.selected_text
    }

    /// On-screen rectangle at the given zoom
    pub fn viewport_rect(&self, zoom: Zoom) -> Rect {
        self.rect.to_viewport(zoom)
    }

    /// Check that the annotation can be written to a document
    pub fn validate(&self) -> Result<(), AnnotationError> {
        if self.page == 0 {
            return Err(AnnotationError::InvalidPage(self.page));
        }
        let r = &self.rect;
        if !r.is_finite() || r.x < 0.0 || r.y < 0.0 || r.width < 0.0 || r.height < 0.0 {
            return Err(AnnotationError::InvalidGeometry(self.id));
        }
        Ok(())
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
        self.timestamp = Utc::now();
    }
}

/// A finished drag gesture plus the tool that was active
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    pub page: u32,
    /// Normalized drag rectangle in viewport pixels
    pub viewport_rect: Rect,
    pub zoom: Zoom,
    pub kind: AnnotationKind,
    pub selected_text: String,
    pub content: Option<String>,
    pub author: String,
}

/// All annotations of one document session
///
/// Keeps insertion order, which is also the export order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
}

impl AnnotationStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotation, returning its ID
    pub fn add(&mut self, annotation: Annotation) -> AnnotationId {
        let id = annotation.id();
        self.annotations.push(annotation);
        id
    }

    /// Turn a drag gesture into an annotation
    ///
    /// The viewport rectangle is divided by the zoom factor before storing.
    pub fn create_from_selection(
        &mut self,
        request: SelectionRequest,
    ) -> Result<AnnotationId, AnnotationError> {
        let SelectionRequest { page, viewport_rect, zoom, kind, selected_text, content, author } =
            request;

        if page == 0 {
            return Err(AnnotationError::InvalidPage(page));
        }
        if viewport_rect.width <= MIN_SELECTION_PX || viewport_rect.height <= MIN_SELECTION_PX {
            return Err(AnnotationError::SelectionTooSmall {
                width: viewport_rect.width,
                height: viewport_rect.height,
                min: MIN_SELECTION_PX,
            });
        }

        let typed = content.map(|c| c.trim().to_owned()).filter(|c| !c.is_empty());
        let content = match (typed, kind.default_content()) {
            (Some(text), _) => text,
            (None, Some(default)) => default.to_owned(),
            (None, None) => return Err(AnnotationError::EmptyContent(kind)),
        };

        let annotation = Annotation::new(page, kind, viewport_rect.to_unscaled(zoom))
            .with_author(author)
            .with_content(content)
            .with_selected_text(selected_text);
        tracing::debug!(id = %annotation.id(), page, %kind, "created annotation from selection");

        Ok(self.add(annotation))
    }

    /// Replace the content of an annotation, refreshing its timestamp
    pub fn update_content(
        &mut self,
        id: AnnotationId,
        content: impl Into<String>,
    ) -> Result<(), AnnotationError> {
        let annotation = self
            .annotations
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or(AnnotationError::NotFound(id))?;
        annotation.set_content(content.into());
        Ok(())
    }

    /// Remove an annotation by ID
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let index = self.annotations.iter().position(|a| a.id() == id)?;
        Some(self.annotations.remove(index))
    }

    /// Get an annotation by ID
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    /// Annotations grouped by page number, recomputed on every call
    pub fn by_page(&self) -> BTreeMap<u32, Vec<&Annotation>> {
        let mut pages: BTreeMap<u32, Vec<&Annotation>> = BTreeMap::new();
        for annotation in &self.annotations {
            pages.entry(annotation.page()).or_default().push(annotation);
        }
        pages
    }

    /// Annotations on one page, in insertion order
    pub fn page(&self, page: u32) -> Vec<&Annotation> {
        self.annotations.iter().filter(|a| a.page() == page).collect()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn into_vec(self) -> Vec<Annotation> {
        self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }
}

impl From<Vec<Annotation>> for AnnotationStore {
    fn from(annotations: Vec<Annotation>) -> Self {
        Self { annotations }
    }
}

impl Extend<Annotation> for AnnotationStore {
    fn extend<T: IntoIterator<Item = Annotation>>(&mut self, iter: T) {
        self.annotations.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn zoom(f: f32) -> Zoom {
        Zoom::new(f).expect("valid zoom")
    }

    fn selection(kind: AnnotationKind, content: Option<&str>) -> SelectionRequest {
        SelectionRequest {
            page: 2,
            viewport_rect: Rect::new(100.0, 200.0, 150.0, 40.0),
            zoom: zoom(2.0),
            kind,
            selected_text: "net income".to_owned(),
            content: content.map(str::to_owned),
            author: "User".to_owned(),
        }
    }

    #[test]
    fn test_selection_is_stored_unscaled() {
        let mut store = AnnotationStore::new();
        let id = store
            .create_from_selection(selection(AnnotationKind::Highlight, None))
            .expect("highlight is created immediately");

        let annotation = store.get(id).expect("stored");
        assert_eq!(annotation.rect(), Rect::new(50.0, 100.0, 75.0, 20.0));
        assert_eq!(annotation.content(), "Highlight");
        assert_eq!(annotation.viewport_rect(zoom(2.0)), Rect::new(100.0, 200.0, 150.0, 40.0));
    }

    #[test]
    fn test_comment_requires_content() {
        let mut store = AnnotationStore::new();
        let err = store
            .create_from_selection(selection(AnnotationKind::Comment, Some("   ")))
            .expect_err("blank comment");
        assert_eq!(err, AnnotationError::EmptyContent(AnnotationKind::Comment));
        assert!(store.is_empty());

        store
            .create_from_selection(selection(AnnotationKind::Note, Some("check this")))
            .expect("note with content");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_small_selection_is_rejected() {
        let mut request = selection(AnnotationKind::Strikeout, None);
        request.viewport_rect = Rect::new(0.0, 0.0, 10.0, 50.0);
        let err = AnnotationStore::new().create_from_selection(request).expect_err("too small");
        assert!(matches!(err, AnnotationError::SelectionTooSmall { .. }));
    }

    #[test]
    fn test_update_content_refreshes_timestamp() {
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().expect("valid date");
        let annotation = Annotation::new(1, AnnotationKind::Comment, Rect::new(1.0, 2.0, 3.0, 4.0))
            .with_content("first")
            .with_timestamp(old);
        let mut store = AnnotationStore::new();
        let id = store.add(annotation);

        store.update_content(id, "second").expect("update");
        let updated = store.get(id).expect("stored");
        assert_eq!(updated.content(), "second");
        assert!(updated.timestamp() > old);

        let missing = AnnotationId::new_v4();
        assert_eq!(store.update_content(missing, "x"), Err(AnnotationError::NotFound(missing)));
    }

    #[test]
    fn test_by_page_groups_in_insertion_order() {
        let mut store = AnnotationStore::new();
        let a = store.add(Annotation::new(2, AnnotationKind::Note, Rect::default()));
        let b = store.add(Annotation::new(1, AnnotationKind::Note, Rect::default()));
        let c = store.add(Annotation::new(2, AnnotationKind::Note, Rect::default()));

        let pages = store.by_page();
        assert_eq!(pages.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        let page_two: Vec<_> = pages[&2].iter().map(|a| a.id()).collect();
        assert_eq!(page_two, vec![a, c]);
        assert_eq!(store.page(1)[0].id(), b);

        assert!(store.remove(a).is_some());
        assert!(store.remove(a).is_none());
        assert_eq!(store.page(2).len(), 1);
    }

    #[test]
    fn test_wire_format_round_trip() {
        let json = r#"{
            "page": 3,
            "author": "AI Assistant",
            "content": "Check totals",
            "timestamp": "2024-05-01T10:20:30Z",
            "x": 50.0, "y": 100.0, "width": 200.0, "height": 60.0,
            "type": "comment",
            "selectedText": "Total"
        }"#;
        let annotation: Annotation = serde_json::from_str(json).expect("valid annotation");
        assert_eq!(annotation.page(), 3);
        assert_eq!(annotation.kind(), AnnotationKind::Comment);
        assert_eq!(annotation.rect(), Rect::new(50.0, 100.0, 200.0, 60.0));
        assert_eq!(annotation.selected_text(), "Total");

        let value = serde_json::to_value(&annotation).expect("serialize");
        assert_eq!(value["type"], "comment");
        assert_eq!(value["selectedText"], "Total");
        assert_eq!(value["width"], 200.0);
        assert_eq!(value["id"], annotation.id().to_string());
    }

    #[test]
    fn test_validate_rejects_bad_geometry() {
        let ok = Annotation::new(1, AnnotationKind::Highlight, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(ok.validate().is_ok());

        let page_zero = Annotation::new(0, AnnotationKind::Highlight, Rect::default());
        assert_eq!(page_zero.validate(), Err(AnnotationError::InvalidPage(0)));

        let negative = Annotation::new(1, AnnotationKind::Note, Rect::new(-1.0, 0.0, 5.0, 5.0));
        assert_eq!(negative.validate(), Err(AnnotationError::InvalidGeometry(negative.id())));

        let nan = Annotation::new(1, AnnotationKind::Note, Rect::new(0.0, f32::NAN, 5.0, 5.0));
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("StrikeOut".parse::<AnnotationKind>(), Ok(AnnotationKind::Strikeout));
        assert!("circle".parse::<AnnotationKind>().is_err());
        assert!(AnnotationKind::Highlight.creates_immediately());
        assert!(!AnnotationKind::Note.creates_immediately());
    }
}
