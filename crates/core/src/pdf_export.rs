//! PDF export with annotations and appearance streams
//!
//! Writes stored annotations into a copy of the source document as standard
//! annotation dictionaries appended to each page's `/Annots` array. Existing
//! annotations are preserved, and the same input always produces the same
//! bytes.

use std::fmt::Write as FmtWrite;

use doc_model::PdfRect;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdf_engine::{LoadedDocument, PdfEngineError};
use thiserror::Error;

use crate::annotation::{Annotation, AnnotationKind};

/// Producer recorded in the document info dictionary
pub const PRODUCER: &str = "redpen";

/// Side length of a note icon, in points
pub const NOTE_ICON_SIZE: f32 = 24.0;

/// Error types for PDF export operations
#[derive(Debug, Error)]
pub enum PdfWriteError {
    #[error("failed to open source PDF: {0}")]
    Load(#[from] PdfEngineError),

    #[error("failed to update PDF objects: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("failed to write PDF: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build appearance stream")]
    Appearance(#[from] std::fmt::Error),
}

/// Result type for PDF export operations
pub type PdfWriteResult<T> = Result<T, PdfWriteError>;

/// Export options for PDF save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Generate `/AP` appearance streams for markup annotations
    pub appearance_streams: bool,

    /// Add an `/RC` rich-text body alongside `/Contents`
    pub rich_text: bool,

    /// Record the producer (and title, when given) in the info dictionary
    pub stamp_info: bool,

    /// Document title written to the info dictionary
    pub title: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { appearance_streams: true, rich_text: true, stamp_info: true, title: None }
    }
}

/// Result of writing annotations into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub bytes: Vec<u8>,
    pub written: usize,
    pub skipped: usize,
}

/// Annotation dictionary entries for one stored annotation, before they are
/// bound to a page
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDictionary {
    pub subtype: &'static str,
    pub rect: PdfRect,
    pub color: [f32; 3],
    pub opacity: Option<f32>,
    pub quad_points: Option<[f32; 8]>,
    pub subject: Option<&'static str>,
    pub icon: Option<&'static str>,
    pub contents: String,
    pub author: String,
    pub modified: String,
    pub name: String,
}

impl AnnotationDictionary {
    /// Map an annotation onto its PDF representation
    ///
    /// `area` is the annotation's region in PDF space.
    pub fn for_annotation(annotation: &Annotation, area: PdfRect) -> Self {
        let base = Self {
            subtype: "Highlight",
            rect: area,
            color: [1.0, 1.0, 0.0],
            opacity: None,
            quad_points: Some(area.quad_points()),
            subject: None,
            icon: None,
            contents: annotation.content().to_owned(),
            author: annotation.author().to_owned(),
            modified: pdf_date(annotation),
            name: annotation.id().to_string(),
        };

        match annotation.kind() {
            AnnotationKind::Highlight => Self { opacity: Some(0.5), ..base },
            AnnotationKind::Comment => Self {
                color: [0.8, 0.9, 1.0],
                opacity: Some(0.3),
                subject: Some("Comment"),
                ..base
            },
            AnnotationKind::Note => Self {
                subtype: "Text",
                rect: PdfRect {
                    llx: area.llx,
                    lly: area.lly,
                    urx: area.llx + NOTE_ICON_SIZE,
                    ury: area.lly + NOTE_ICON_SIZE,
                },
                color: [1.0, 0.8, 0.0],
                quad_points: None,
                subject: Some("Note"),
                icon: Some("Note"),
                ..base
            },
            AnnotationKind::Strikeout => Self {
                subtype: "StrikeOut",
                color: [1.0, 0.0, 0.0],
                subject: Some("StrikeOut"),
                ..base
            },
        }
    }

    fn supports_rich_text(&self) -> bool {
        self.subtype != "StrikeOut"
    }

    /// Build the dictionary for `page_id`
    pub fn to_dictionary(
        &self,
        page_id: ObjectId,
        rich_text: bool,
        appearance: Option<ObjectId>,
    ) -> Dictionary {
        let mut dict = dictionary! {
            "Type" => "Annot",
            "Subtype" => Object::Name(self.subtype.as_bytes().to_vec()),
            "Rect" => reals(&self.rect.to_array()),
            "Contents" => text_string(&self.contents),
            "T" => text_string(&self.author),
            "M" => Object::string_literal(self.modified.as_str()),
            "NM" => Object::string_literal(self.name.as_str()),
            "F" => 4,
            "P" => page_id,
            "C" => reals(&self.color),
        };

        if let Some(opacity) = self.opacity {
            dict.set("CA", Object::Real(opacity));
        }
        if let Some(quad_points) = &self.quad_points {
            dict.set("QuadPoints", reals(quad_points));
        }
        if let Some(subject) = self.subject {
            dict.set("Subj", text_string(subject));
        }
        if let Some(icon) = self.icon {
            dict.set("Name", Object::Name(icon.as_bytes().to_vec()));
            dict.set("Open", false);
        }
        if rich_text && self.supports_rich_text() {
            dict.set("RC", text_string(&rich_text_body(&self.contents)));
        }
        if let Some(stream_id) = appearance {
            dict.set("AP", dictionary! { "N" => stream_id });
        }

        dict
    }
}

/// `D:YYYYMMDDHHmmssZ` in UTC
fn pdf_date(annotation: &Annotation) -> String {
    annotation.timestamp().format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Hex string holding UTF-16BE with a byte order mark
fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn reals(values: &[f32]) -> Object {
    Object::Array(values.iter().map(|value| Object::Real(*value)).collect())
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// XHTML rich-text body, one paragraph per line
fn rich_text_body(contents: &str) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\"?><body xmlns=\"http://www.w3.org/1999/xhtml\" \
         xmlns:xfa=\"http://www.xfa.org/schema/xfa-data/1.0/\" \
         xfa:APIVersion=\"Acrobat:7.0.0\" xfa:spec=\"2.0.2\">",
    );
    for line in contents.lines() {
        body.push_str("<p>");
        body.push_str(&xml_escape(line));
        body.push_str("</p>");
    }
    body.push_str("</body>");
    body
}

/// Fixed-precision number for content streams
fn num(value: f32) -> String {
    let formatted = format!("{value:.3}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Generate appearance stream content for an annotation
///
/// Content is expressed in the form's own space, `[0 0 width height]`.
/// Notes have no stream; viewers draw their icon.
pub fn generate_appearance_stream(
    annotation: &AnnotationDictionary,
) -> PdfWriteResult<Option<String>> {
    let width = annotation.rect.width();
    let height = annotation.rect.height();
    let [r, g, b] = annotation.color;
    let mut stream = String::new();

    match annotation.subtype {
        "Highlight" => {
            if annotation.opacity.is_some() {
                writeln!(&mut stream, "/GS0 gs")?;
            }
            writeln!(&mut stream, "{} {} {} rg", num(r), num(g), num(b))?;
            writeln!(&mut stream, "0 0 {} {} re", num(width), num(height))?;
            writeln!(&mut stream, "f")?;
        }
        "StrikeOut" => {
            let mid = height / 2.0;
            writeln!(&mut stream, "{} {} {} RG", num(r), num(g), num(b))?;
            writeln!(&mut stream, "1 w")?;
            writeln!(&mut stream, "0 {} m", num(mid))?;
            writeln!(&mut stream, "{} {} l", num(width), num(mid))?;
            writeln!(&mut stream, "S")?;
        }
        _ => return Ok(None),
    }

    Ok(Some(stream))
}

fn appearance_xobject(annotation: &AnnotationDictionary, content: String) -> Stream {
    let mut resources = Dictionary::new();
    if let Some(opacity) = annotation.opacity {
        resources.set(
            "ExtGState",
            dictionary! {
                "GS0" => dictionary! {
                    "Type" => "ExtGState",
                    "CA" => Object::Real(opacity),
                    "ca" => Object::Real(opacity),
                },
            },
        );
    }

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => reals(&[0.0, 0.0, annotation.rect.width(), annotation.rect.height()]),
        "Resources" => resources,
    };
    Stream::new(dict, content.into_bytes())
}

/// Where a page keeps its annotation array
enum AnnotsSlot {
    Direct,
    Indirect(ObjectId),
    Missing,
}

fn annots_slot(doc: &Document, page_id: ObjectId) -> PdfWriteResult<AnnotsSlot> {
    let page = doc.get_object(page_id)?.as_dict()?;
    let slot = match page.get(b"Annots") {
        Ok(Object::Array(_)) => AnnotsSlot::Direct,
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(_)) => AnnotsSlot::Indirect(*id),
            _ => AnnotsSlot::Missing,
        },
        _ => AnnotsSlot::Missing,
    };
    Ok(slot)
}

/// Append annotation references to a page, keeping existing entries
fn append_annots(doc: &mut Document, page_id: ObjectId, refs: Vec<Object>) -> PdfWriteResult<()> {
    match annots_slot(doc, page_id)? {
        AnnotsSlot::Direct => {
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            page.get_mut(b"Annots")?.as_array_mut()?.extend(refs);
        }
        AnnotsSlot::Indirect(id) => {
            doc.get_object_mut(id)?.as_array_mut()?.extend(refs);
        }
        AnnotsSlot::Missing => {
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Annots", Object::Array(refs));
        }
    }
    Ok(())
}

enum InfoSlot {
    Direct,
    Indirect(ObjectId),
    Missing,
}

fn info_slot(doc: &Document) -> InfoSlot {
    match doc.trailer.get(b"Info") {
        Ok(Object::Dictionary(_)) => InfoSlot::Direct,
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Dictionary(_)) => InfoSlot::Indirect(*id),
            _ => InfoSlot::Missing,
        },
        _ => InfoSlot::Missing,
    }
}

/// Set `Producer` and `Title`, keeping the other document info entries
fn stamp_info(doc: &mut Document, title: Option<&str>) -> PdfWriteResult<()> {
    let info = match info_slot(doc) {
        InfoSlot::Direct => doc.trailer.get_mut(b"Info")?.as_dict_mut()?,
        InfoSlot::Indirect(id) => doc.get_object_mut(id)?.as_dict_mut()?,
        InfoSlot::Missing => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", id);
            doc.get_object_mut(id)?.as_dict_mut()?
        }
    };

    info.set("Producer", text_string(PRODUCER));
    if let Some(title) = title {
        info.set("Title", text_string(title));
    }
    Ok(())
}

/// Write `annotations` into a copy of the PDF in `source`
///
/// Annotations addressing a page outside the document, or carrying invalid
/// geometry, are skipped and counted.
pub fn write_annotations(
    source: &[u8],
    annotations: &[Annotation],
    options: &ExportOptions,
) -> PdfWriteResult<WriteOutcome> {
    let loaded = LoadedDocument::from_bytes(source)?;
    let page_count = loaded.page_count();

    let mut placements = Vec::with_capacity(annotations.len());
    let mut skipped = 0;
    for annotation in annotations {
        let page = annotation.page();
        if page == 0 || page > page_count {
            tracing::warn!(id = %annotation.id(), page, page_count, "annotation page out of range; skipped");
            skipped += 1;
            continue;
        }
        if let Err(err) = annotation.validate() {
            tracing::warn!(id = %annotation.id(), %err, "invalid annotation; skipped");
            skipped += 1;
            continue;
        }

        let index = page - 1;
        let size = loaded.page_size(index)?;
        let (origin_x, origin_y) = loaded.page_origin(index)?;
        let local = annotation.rect().to_pdf_rect(size.height_pt);
        let area = PdfRect {
            llx: local.llx + origin_x,
            lly: local.lly + origin_y,
            urx: local.urx + origin_x,
            ury: local.ury + origin_y,
        };
        placements.push((loaded.page_id(index)?, AnnotationDictionary::for_annotation(annotation, area)));
    }

    let mut doc = loaded.into_document();
    let mut written = 0;
    for (page_id, entry) in placements {
        let appearance = if options.appearance_streams {
            generate_appearance_stream(&entry)?
                .map(|content| doc.add_object(appearance_xobject(&entry, content)))
        } else {
            None
        };

        let dict = entry.to_dictionary(page_id, options.rich_text, appearance);
        let annot_id = doc.add_object(dict);
        append_annots(&mut doc, page_id, vec![Object::Reference(annot_id)])?;
        written += 1;
    }

    if options.stamp_info {
        stamp_info(&mut doc, options.title.as_deref())?;
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    tracing::debug!(written, skipped, size = bytes.len(), "annotations written");
    Ok(WriteOutcome { bytes, written, skipped })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use doc_model::Rect;

    use super::*;
    use crate::test_support::sample_pdf;

    fn fixed(kind: AnnotationKind, page: u32, rect: Rect) -> Annotation {
        Annotation::new(page, kind, rect)
            .with_id(uuid::Uuid::from_u128(0x1234 + page as u128))
            .with_author("Ana")
            .with_content("Check this")
            .with_timestamp(Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap())
    }

    fn annots_of(bytes: &[u8], page: u32) -> Vec<Dictionary> {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page];
        let page_dict = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let annots = match page_dict.get(b"Annots") {
            Ok(Object::Reference(id)) => doc.get_object(*id).unwrap().as_array().unwrap().clone(),
            Ok(other) => other.as_array().unwrap().clone(),
            Err(_) => Vec::new(),
        };
        annots
            .iter()
            .map(|obj| {
                let id = obj.as_reference().unwrap();
                doc.get_object(id).unwrap().as_dict().unwrap().clone()
            })
            .collect()
    }

    fn name(dict: &Dictionary, key: &[u8]) -> Vec<u8> {
        dict.get(key).unwrap().as_name().unwrap().to_vec()
    }

    #[test]
    fn test_comment_and_highlight_dictionaries() {
        let source = sample_pdf(&["BT /F1 12 Tf 72 700 Td (Hello) Tj ET"]);
        let annotations = vec![
            fixed(AnnotationKind::Highlight, 1, Rect::new(72.0, 80.0, 100.0, 20.0)),
            fixed(AnnotationKind::Comment, 1, Rect::new(72.0, 120.0, 100.0, 20.0)),
        ];
        let outcome = write_annotations(&source, &annotations, &ExportOptions::default()).unwrap();
        assert_eq!((outcome.written, outcome.skipped), (2, 0));

        let annots = annots_of(&outcome.bytes, 1);
        assert_eq!(annots.len(), 2);

        let highlight = &annots[0];
        assert_eq!(name(highlight, b"Subtype"), b"Highlight");
        assert!(highlight.get(b"Subj").is_err());
        assert_eq!(highlight.get(b"F").unwrap().as_i64().unwrap(), 4);
        let rect: Vec<f32> = highlight
            .get(b"Rect")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_float().unwrap())
            .collect();
        assert_eq!(rect, vec![72.0, 692.0, 172.0, 712.0]);
        assert_eq!(highlight.get(b"QuadPoints").unwrap().as_array().unwrap().len(), 8);
        assert!(highlight.get(b"AP").is_ok());

        let comment = &annots[1];
        assert_eq!(name(comment, b"Subtype"), b"Highlight");
        assert!(comment.get(b"Subj").is_ok());
        assert_eq!(
            comment.get(b"M").unwrap().as_str().unwrap(),
            b"D:20240506070809Z"
        );
    }

    #[test]
    fn test_note_icon_is_anchored_at_lower_left() {
        let source = sample_pdf(&[""]);
        let note = fixed(AnnotationKind::Note, 1, Rect::new(100.0, 100.0, 200.0, 50.0));
        let outcome = write_annotations(&source, &[note], &ExportOptions::default()).unwrap();

        let annots = annots_of(&outcome.bytes, 1);
        let dict = &annots[0];
        assert_eq!(name(dict, b"Subtype"), b"Text");
        assert_eq!(name(dict, b"Name"), b"Note");
        assert!(dict.get(b"AP").is_err());
        let rect: Vec<f32> =
            dict.get(b"Rect").unwrap().as_array().unwrap().iter().map(|v| v.as_float().unwrap()).collect();
        assert_eq!(rect, vec![100.0, 642.0, 124.0, 666.0]);
    }

    #[test]
    fn test_text_strings_are_utf16_hex() {
        match text_string("Zoë") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, b'Z', 0x00, b'o', 0x00, 0xEB]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_pages_are_skipped() {
        let source = sample_pdf(&[""]);
        let annotations = vec![
            fixed(AnnotationKind::Strikeout, 1, Rect::new(10.0, 10.0, 50.0, 10.0)),
            fixed(AnnotationKind::Strikeout, 4, Rect::new(10.0, 10.0, 50.0, 10.0)),
        ];
        let outcome = write_annotations(&source, &annotations, &ExportOptions::default()).unwrap();
        assert_eq!((outcome.written, outcome.skipped), (1, 1));
        assert_eq!(name(&annots_of(&outcome.bytes, 1)[0], b"Subtype"), b"StrikeOut");
    }

    #[test]
    fn test_existing_annots_are_preserved() {
        let first = write_annotations(
            &sample_pdf(&["", ""]),
            &[fixed(AnnotationKind::Highlight, 2, Rect::new(0.0, 0.0, 40.0, 40.0))],
            &ExportOptions::default(),
        )
        .unwrap();

        let second = write_annotations(
            &first.bytes,
            &[fixed(AnnotationKind::Comment, 2, Rect::new(0.0, 50.0, 40.0, 40.0))],
            &ExportOptions::default(),
        )
        .unwrap();
        assert_eq!(annots_of(&second.bytes, 2).len(), 2);

        let untouched = write_annotations(&second.bytes, &[], &ExportOptions::default()).unwrap();
        assert_eq!(untouched.written, 0);
        assert_eq!(annots_of(&untouched.bytes, 2).len(), 2);
    }

    #[test]
    fn test_indirect_annots_array_is_extended() {
        let mut doc = Document::load_mem(&sample_pdf(&[""])).unwrap();
        let page_id = doc.get_pages()[&1];
        let existing = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => reals(&[0.0, 0.0, 10.0, 10.0]),
        });
        let array_id = doc.add_object(Object::Array(vec![Object::Reference(existing)]));
        doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap().set("Annots", array_id);
        let mut source = Vec::new();
        doc.save_to(&mut source).unwrap();

        let outcome = write_annotations(
            &source,
            &[fixed(AnnotationKind::Highlight, 1, Rect::new(5.0, 5.0, 20.0, 20.0))],
            &ExportOptions::default(),
        )
        .unwrap();

        let out = Document::load_mem(&outcome.bytes).unwrap();
        let page = out.get_object(out.get_pages()[&1]).unwrap().as_dict().unwrap();
        let array_ref = page.get(b"Annots").unwrap().as_reference().unwrap();
        assert_eq!(out.get_object(array_ref).unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_direct_info_dictionary_is_merged() {
        let mut doc = Document::load_mem(&sample_pdf(&[""])).unwrap();
        doc.trailer.set(
            "Info",
            dictionary! {
                "Author" => Object::string_literal("Jo"),
                "Title" => Object::string_literal("Draft"),
            },
        );
        let mut source = Vec::new();
        doc.save_to(&mut source).unwrap();

        let options = ExportOptions { title: Some("Report".to_owned()), ..ExportOptions::default() };
        let outcome = write_annotations(
            &source,
            &[fixed(AnnotationKind::Highlight, 1, Rect::new(5.0, 5.0, 20.0, 20.0))],
            &options,
        )
        .unwrap();

        let out = Document::load_mem(&outcome.bytes).unwrap();
        let info = match out.trailer.get(b"Info").unwrap() {
            Object::Reference(id) => out.get_object(*id).unwrap().as_dict().unwrap().clone(),
            other => other.as_dict().unwrap().clone(),
        };
        let expected_title = match text_string("Report") {
            Object::String(bytes, _) => bytes,
            other => panic!("unexpected title object {other:?}"),
        };
        assert_eq!(info.get(b"Author").unwrap().as_str().unwrap(), b"Jo");
        assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), expected_title.as_slice());
        assert!(info.get(b"Producer").is_ok());
    }

    #[test]
    fn test_export_is_deterministic() {
        let source = sample_pdf(&["BT /F1 12 Tf 72 700 Td (Repeat) Tj ET"]);
        let annotations = vec![fixed(AnnotationKind::Comment, 1, Rect::new(60.0, 80.0, 120.0, 30.0))];
        let options = ExportOptions { title: Some("Report".to_owned()), ..ExportOptions::default() };

        let a = write_annotations(&source, &annotations, &options).unwrap();
        let b = write_annotations(&source, &annotations, &options).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn test_appearance_streams() {
        let highlight = AnnotationDictionary::for_annotation(
            &fixed(AnnotationKind::Highlight, 1, Rect::new(0.0, 0.0, 10.0, 10.0)),
            PdfRect { llx: 0.0, lly: 0.0, urx: 40.0, ury: 12.0 },
        );
        let stream = generate_appearance_stream(&highlight).unwrap().unwrap();
        assert!(stream.contains("/GS0 gs"));
        assert!(stream.contains("0 0 40 12 re"));

        let strike = AnnotationDictionary::for_annotation(
            &fixed(AnnotationKind::Strikeout, 1, Rect::new(0.0, 0.0, 10.0, 10.0)),
            PdfRect { llx: 0.0, lly: 0.0, urx: 40.0, ury: 12.0 },
        );
        let stream = generate_appearance_stream(&strike).unwrap().unwrap();
        assert!(stream.contains("0 6 m"));
        assert!(stream.contains("40 6 l"));
    }

    #[test]
    fn test_rich_text_is_escaped() {
        let body = rich_text_body("a < b & c\nsecond");
        assert!(body.contains("<p>a &lt; b &amp; c</p><p>second</p>"));
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(0.0), "0");
        assert_eq!(num(12.3456), "12.346");
    }
}
