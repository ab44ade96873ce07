//! Annotation core for redpen
//!
//! Annotation model and store, per-page text runs, text location, review
//! suggestion parsing and placement, and serialization of annotations into
//! PDF documents.

pub mod analysis;
pub mod annotation;
pub mod export;
pub mod locator;
pub mod pdf_export;
pub mod placement;
pub mod suggestion;
pub mod text_layer;

pub use analysis::{
    analyze_document, AnalysisConfig, AnalysisError, AnalysisOutcome, ChatCompletionsClient,
    CompletionClient, TokenUsage,
};
pub use annotation::{
    Annotation, AnnotationError, AnnotationId, AnnotationKind, AnnotationStore, SelectionRequest,
};
pub use export::{export_document, ExportError, ExportOutcome, ExportRequest};
pub use locator::{locate, locate_on_page, LocateStrategy, Located};
pub use pdf_export::{write_annotations, ExportOptions, PdfWriteError, WriteOutcome};
pub use placement::{AutoPlacer, PlacementSource, REVIEWER_AUTHOR};
pub use suggestion::{parse_response, parse_suggestions, SuggestionBuilder, SuggestionRecord};
pub use text_layer::{PageTextRuns, PageTextSource, TextRun, TextRunIndex};

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    /// Letter-sized PDF with one page per content stream and Helvetica as `/F1`
    pub fn sample_pdf(page_contents: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let kids: Vec<Object> = page_contents
            .iter()
            .map(|content| {
                let content_id =
                    doc.add_object(Stream::new(Dictionary::new(), content.as_bytes().to_vec()));
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                });
                Object::from(page_id)
            })
            .collect();

        let media_box: Vec<Object> = vec![0.into(), 0.into(), 612.into(), 792.into()];
        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "MediaBox" => media_box,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        };
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
}
