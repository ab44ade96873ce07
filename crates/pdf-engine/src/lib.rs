mod cmap;
mod text;

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Letter size, used when a page declares no usable MediaBox
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

/// One show-text operation as painted on the page
///
/// `transform` is the text rendering matrix `[a, b, c, d, e, f]` with the
/// translation relative to the lower-left corner of the page's MediaBox.
/// `a` and `d` therefore carry the effective font size.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub transform: [f32; 6],
    pub width: f32,
    pub height: f32,
    pub font_name: String,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn extract_text(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextItem>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MediaBox {
    llx: f32,
    lly: f32,
    urx: f32,
    ury: f32,
}

impl MediaBox {
    fn size(&self) -> PageSize {
        PageSize { width_pt: (self.urx - self.llx).abs(), height_pt: (self.ury - self.lly).abs() }
    }
}

#[derive(Debug, Clone)]
struct PageRecord {
    id: ObjectId,
    media_box: MediaBox,
}

/// A parsed document plus its page table
///
/// Pages are addressed by zero-based index.
#[derive(Debug)]
pub struct LoadedDocument {
    document: Document,
    pages: Vec<PageRecord>,
}

impl LoadedDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        Self::from_document(Document::load_mem(bytes)?)
    }

    pub fn from_document(document: Document) -> Result<Self, PdfEngineError> {
        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let pages: Vec<PageRecord> = document
            .get_pages()
            .into_values()
            .map(|id| PageRecord { id, media_box: media_box(&document, id) })
            .collect();

        if pages.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(Self { document, pages })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError> {
        Ok(self.page(page_index)?.media_box.size())
    }

    /// Lower-left corner of the page's MediaBox
    pub fn page_origin(&self, page_index: u32) -> Result<(f32, f32), PdfEngineError> {
        let media_box = &self.page(page_index)?.media_box;
        Ok((media_box.llx, media_box.lly))
    }

    pub fn page_id(&self, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        Ok(self.page(page_index)?.id)
    }

    /// Positioned text for one page, in content-stream order
    pub fn extract_text(&self, page_index: u32) -> Result<Vec<TextItem>, PdfEngineError> {
        let page = self.page(page_index)?;
        let resources = page_resources(&self.document, page.id);
        let mut items = text::extract_page_items(&self.document, page.id, resources)?;

        for item in &mut items {
            item.transform[4] -= page.media_box.llx;
            item.transform[5] -= page.media_box.lly;
        }

        Ok(items)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    fn page(&self, page_index: u32) -> Result<&PageRecord, PdfEngineError> {
        self.pages.get(page_index as usize).ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_count(),
        })
    }
}

/// Looks a key up on the page, walking `/Parent` links for inherited attributes
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page_id;
    // Bounded walk; malformed trees can loop.
    for _ in 0..32 {
        let dict = doc.get_object(current).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> MediaBox {
    let numbers: Option<Vec<f32>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .map(|array| {
            array
                .iter()
                .filter_map(|value| match value {
                    Object::Integer(i) => Some(*i as f32),
                    Object::Real(r) => Some(*r),
                    _ => None,
                })
                .collect()
        });

    match numbers.as_deref() {
        Some([x0, y0, x1, y1]) => MediaBox {
            llx: x0.min(*x1),
            lly: y0.min(*y1),
            urx: x0.max(*x1),
            ury: y0.max(*y1),
        },
        _ => {
            tracing::debug!(?page_id, "missing or malformed MediaBox; assuming letter size");
            MediaBox {
                llx: 0.0,
                lly: 0.0,
                urx: DEFAULT_PAGE_SIZE.width_pt,
                ury: DEFAULT_PAGE_SIZE.height_pt,
            }
        }
    }
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    inherited(doc, page_id, b"Resources").and_then(|obj| obj.as_dict().ok())
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, Arc<LoadedDocument>>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access to an open document, e.g. for building a text index.
    pub fn document(&self, handle: DocumentHandle) -> Result<Arc<LoadedDocument>, PdfEngineError> {
        self.docs.get(&handle).cloned().ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn record(&self, handle: DocumentHandle) -> Result<&LoadedDocument, PdfEngineError> {
        self.docs
            .get(&handle)
            .map(Arc::as_ref)
            .ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let document = LoadedDocument::from_bytes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = document.page_count(), "opened document");
        self.docs.insert(handle, Arc::new(document));

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_count())
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        self.record(handle)?.page_size(page_index)
    }

    fn extract_text(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextItem>, PdfEngineError> {
        self.record(handle)?.extract_text(page_index)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn sample_pdf_bytes(media_box_on_parent: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = b"BT /F1 12 Tf 72 700 Td (Quarterly revenue grew) Tj ET";
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
        let media_box: Vec<Object> = vec![0.into(), 0.into(), 612.into(), 792.into()];

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Count" => 1i64,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        };
        if media_box_on_parent {
            pages.set("MediaBox", media_box);
        } else {
            page.set("MediaBox", media_box);
        }

        let page_id = doc.add_object(page);
        pages.set("Kids", vec![Object::from(page_id)]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("save test pdf");
        buf
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(sample_pdf_bytes(false)))
            .expect("open should succeed");

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 1);
        assert_eq!(
            engine.page_size(handle, 0).expect("size"),
            PageSize { width_pt: 612.0, height_pt: 792.0 }
        );
    }

    #[test]
    fn media_box_and_resources_are_inherited() {
        let document = LoadedDocument::from_bytes(&sample_pdf_bytes(true)).expect("load");
        assert_eq!(document.page_size(0).expect("size").height_pt, 792.0);

        let items = document.extract_text(0).expect("text");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Quarterly revenue grew");
        assert_eq!(items[0].transform[4], 72.0);
        assert_eq!(items[0].transform[5], 700.0);
    }

    #[test]
    fn page_out_of_range_is_reported() {
        let document = LoadedDocument::from_bytes(&sample_pdf_bytes(false)).expect("load");
        let err = document.extract_text(3).expect_err("page 3 does not exist");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 3, page_count: 1 }));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let err = LoadedDocument::from_bytes(b"definitely not a pdf").expect_err("should fail");
        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn close_releases_the_handle() {
        let mut engine = default_engine();
        let handle = engine.open(OpenSource::Bytes(sample_pdf_bytes(false))).expect("open");
        engine.close(handle).expect("close");
        assert!(engine.document(handle).is_err());
    }
}
