//! Positioned text extraction
//!
//! A small content-stream interpreter that tracks the graphics and text
//! state closely enough to report, for every show-text operation, the string
//! it paints, its text rendering matrix and its advance width. Glyph outlines
//! and colors are ignored.

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::cmap::ToUnicodeMap;
use crate::{PdfEngineError, TextItem};

/// Nested form XObjects deeper than this are not entered
const MAX_FORM_DEPTH: usize = 8;
/// Glyph width (1/1000 em) used when a font carries no width table
const FALLBACK_GLYPH_WIDTH: f32 = 500.0;
/// A `TJ` adjustment pushing glyphs apart by more than this (1/1000 em) reads as a space
const TJ_SPACE_THRESHOLD: f32 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let mut values = [0.0; 6];
        for (slot, operand) in values.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Matrix(values))
    }

    /// Composition applying `self` first, then `other`
    fn then(self, other: Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn horizontal_scale(&self) -> f32 {
        self.0[0].hypot(self.0[1])
    }

    fn vertical_scale(&self) -> f32 {
        self.0[2].hypot(self.0[3])
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn operand(operands: &[Object], index: usize) -> f32 {
    operands.get(index).and_then(number).unwrap_or(0.0)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

fn stream_bytes(stream: &lopdf::Stream) -> Result<Vec<u8>, PdfEngineError> {
    if stream.dict.get(b"Filter").is_ok() {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

#[derive(Debug)]
struct FontInfo {
    name: String,
    two_byte: bool,
    to_unicode: Option<ToUnicodeMap>,
    first_char: u32,
    widths: Vec<f32>,
    missing_width: f32,
    cid_widths: Vec<(u32, u32, f32)>,
    default_cid_width: f32,
}

impl FontInfo {
    fn fallback(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            two_byte: false,
            to_unicode: None,
            first_char: 0,
            widths: Vec::new(),
            missing_width: FALLBACK_GLYPH_WIDTH,
            cid_widths: Vec::new(),
            default_cid_width: 1000.0,
        }
    }

    fn from_dict(doc: &Document, resource_name: &[u8], dict: &Dictionary) -> Self {
        let mut font = Self::fallback(resource_name);

        if let Some(base) = dict_entry(doc, dict, b"BaseFont").and_then(|o| o.as_name().ok()) {
            font.name = String::from_utf8_lossy(base).into_owned();
        }
        let subtype = dict_entry(doc, dict, b"Subtype").and_then(|o| o.as_name().ok());
        font.two_byte = subtype == Some(b"Type0".as_slice());

        font.to_unicode = dict_entry(doc, dict, b"ToUnicode")
            .and_then(|o| o.as_stream().ok())
            .and_then(|stream| stream_bytes(stream).ok())
            .map(|bytes| ToUnicodeMap::parse(&bytes))
            .filter(|map| !map.is_empty());

        if font.two_byte {
            let descendant = dict_entry(doc, dict, b"DescendantFonts")
                .and_then(|o| o.as_array().ok())
                .and_then(|fonts| fonts.first())
                .and_then(|o| resolve(doc, o).as_dict().ok());
            if let Some(descendant) = descendant {
                if let Some(dw) = dict_entry(doc, descendant, b"DW").and_then(number) {
                    font.default_cid_width = dw;
                }
                if let Some(w) = dict_entry(doc, descendant, b"W").and_then(|o| o.as_array().ok()) {
                    font.cid_widths = parse_cid_widths(doc, w);
                }
            }
        } else {
            font.first_char = dict_entry(doc, dict, b"FirstChar")
                .and_then(|o| o.as_i64().ok())
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0);
            font.widths = dict_entry(doc, dict, b"Widths")
                .and_then(|o| o.as_array().ok())
                .map(|items| {
                    items.iter().map(|w| number(resolve(doc, w)).unwrap_or(0.0)).collect()
                })
                .unwrap_or_default();
            if !font.widths.is_empty() {
                font.missing_width = dict_entry(doc, dict, b"FontDescriptor")
                    .and_then(|o| o.as_dict().ok())
                    .and_then(|descriptor| dict_entry(doc, descriptor, b"MissingWidth"))
                    .and_then(number)
                    .unwrap_or(0.0);
            }
        }

        font
    }

    /// Glyph width in 1/1000 em
    fn glyph_width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .iter()
                .find(|(first, last, _)| (*first..=*last).contains(&code))
                .map_or(self.default_cid_width, |(_, _, width)| *width);
        }

        code.checked_sub(self.first_char)
            .and_then(|index| self.widths.get(index as usize))
            .copied()
            .unwrap_or(self.missing_width)
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| pair.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    fn unicode(&self, code: u32, out: &mut String) {
        if let Some(text) = self.to_unicode.as_ref().and_then(|map| map.get(code)) {
            out.push_str(text);
            return;
        }
        if code < 0x20 {
            return;
        }
        if let Some(ch) = char::from_u32(code) {
            out.push(ch);
        }
    }
}

fn parse_cid_widths(doc: &Document, items: &[Object]) -> Vec<(u32, u32, f32)> {
    let mut ranges = Vec::new();
    let mut iter = items.iter().map(|o| resolve(doc, o));

    while let Some(first) = iter.next() {
        let Some(first) = number(first).map(|v| v as u32) else {
            continue;
        };
        match iter.next() {
            Some(Object::Array(widths)) => {
                for (offset, width) in widths.iter().enumerate() {
                    let cid = u32::try_from(offset).ok().and_then(|offset| first.checked_add(offset));
                    if let (Some(cid), Some(width)) = (cid, number(resolve(doc, width))) {
                        ranges.push((cid, cid, width));
                    }
                }
            }
            Some(last) => {
                let last = number(last).map(|v| v as u32).unwrap_or(first);
                if let Some(width) = iter.next().and_then(number) {
                    ranges.push((first, last, width));
                }
            }
            None => break,
        }
    }

    ranges
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Arc<FontInfo>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scaling: f32,
    leading: f32,
    rise: f32,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            font: None,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextCursor {
    tm: Matrix,
    tlm: Matrix,
}

impl TextCursor {
    fn reset(&mut self) {
        self.tm = Matrix::IDENTITY;
        self.tlm = Matrix::IDENTITY;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(self.tlm);
        self.tm = self.tlm;
    }

    fn set(&mut self, matrix: Matrix) {
        self.tm = matrix;
        self.tlm = matrix;
    }

    fn advance(&mut self, tx: f32) {
        self.tm = Matrix::translate(tx, 0.0).then(self.tm);
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    items: Vec<TextItem>,
    depth: usize,
}

/// Extracts positioned text from one page, in content-stream order
///
/// Coordinates are in default user space; callers normalize against the
/// page's MediaBox.
pub(crate) fn extract_page_items(
    doc: &Document,
    page_id: ObjectId,
    resources: Option<&Dictionary>,
) -> Result<Vec<TextItem>, PdfEngineError> {
    let content = doc.get_page_content(page_id)?;
    let mut interpreter = Interpreter { doc, items: Vec::new(), depth: 0 };
    interpreter.run(&content, resources, Matrix::IDENTITY)?;
    Ok(interpreter.items)
}

impl<'a> Interpreter<'a> {
    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
    ) -> Result<(), PdfEngineError> {
        let content = Content::decode(content)?;
        let mut fonts: HashMap<Vec<u8>, Arc<FontInfo>> = HashMap::new();
        let mut state = GraphicsState::new(ctm);
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut cursor = TextCursor { tm: Matrix::IDENTITY, tlm: Matrix::IDENTITY };

        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.then(state.ctm);
                    }
                }
                "BT" => cursor.reset(),
                "ET" => {}
                "Tf" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        let font = fonts
                            .entry(name.to_vec())
                            .or_insert_with(|| Arc::new(self.load_font(resources, name)))
                            .clone();
                        state.font = Some(font);
                    }
                    state.font_size = operand(operands, 1);
                }
                "Tc" => state.char_spacing = operand(operands, 0),
                "Tw" => state.word_spacing = operand(operands, 0),
                "Tz" => state.horizontal_scaling = operand(operands, 0) / 100.0,
                "TL" => state.leading = operand(operands, 0),
                "Ts" => state.rise = operand(operands, 0),
                "Td" => cursor.move_line(operand(operands, 0), operand(operands, 1)),
                "TD" => {
                    let ty = operand(operands, 1);
                    state.leading = -ty;
                    cursor.move_line(operand(operands, 0), ty);
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        cursor.set(m);
                    }
                }
                "T*" => cursor.move_line(0.0, -state.leading),
                "Tj" => self.show(&state, &mut cursor, operands),
                "TJ" => {
                    if let Some(parts) = operands.first().and_then(|o| o.as_array().ok()) {
                        self.show(&state, &mut cursor, parts);
                    }
                }
                "'" => {
                    cursor.move_line(0.0, -state.leading);
                    self.show(&state, &mut cursor, operands);
                }
                "\"" => {
                    state.word_spacing = operand(operands, 0);
                    state.char_spacing = operand(operands, 1);
                    cursor.move_line(0.0, -state.leading);
                    self.show(&state, &mut cursor, operands.get(2..).unwrap_or_default());
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.run_form(resources, name, state.ctm)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn load_font(&self, resources: Option<&Dictionary>, name: &[u8]) -> FontInfo {
        resources
            .and_then(|res| dict_entry(self.doc, res, b"Font"))
            .and_then(|fonts| fonts.as_dict().ok())
            .and_then(|fonts| dict_entry(self.doc, fonts, name))
            .and_then(|font| font.as_dict().ok())
            .map(|dict| FontInfo::from_dict(self.doc, name, dict))
            .unwrap_or_else(|| {
                tracing::debug!(font = %String::from_utf8_lossy(name), "font resource not found");
                FontInfo::fallback(name)
            })
    }

    fn run_form(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        ctm: Matrix,
    ) -> Result<(), PdfEngineError> {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|res| dict_entry(doc, res, b"XObject"))
            .and_then(|xobjects| xobjects.as_dict().ok())
            .and_then(|xobjects| dict_entry(doc, xobjects, name))
            .and_then(|xobject| xobject.as_stream().ok())
        else {
            return Ok(());
        };

        let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok();
        if subtype != Some(b"Form".as_slice()) {
            return Ok(());
        }
        if self.depth >= MAX_FORM_DEPTH {
            tracing::warn!(depth = self.depth, "form XObject nesting too deep; skipping");
            return Ok(());
        }

        let matrix = dict_entry(doc, &stream.dict, b"Matrix")
            .and_then(|o| o.as_array().ok())
            .and_then(|values| Matrix::from_operands(values))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources =
            dict_entry(doc, &stream.dict, b"Resources").and_then(|o| o.as_dict().ok()).or(resources);
        let content = stream_bytes(stream)?;

        self.depth += 1;
        let result = self.run(&content, form_resources, matrix.then(ctm));
        self.depth -= 1;
        result
    }

    fn show(&mut self, state: &GraphicsState, cursor: &mut TextCursor, parts: &[Object]) {
        let Some(font) = state.font.clone() else {
            return;
        };
        let font_size = state.font_size;
        let scaling = state.horizontal_scaling;
        let start = cursor.tm;

        let mut text = String::new();
        let mut advance = 0.0f32;

        for part in parts {
            match part {
                Object::String(bytes, _) => {
                    for code in font.codes(bytes) {
                        font.unicode(code, &mut text);
                        let spacing = if !font.two_byte && code == 32 { state.word_spacing } else { 0.0 };
                        let tx = (font.glyph_width(code) / 1000.0 * font_size
                            + state.char_spacing
                            + spacing)
                            * scaling;
                        cursor.advance(tx);
                        advance += tx;
                    }
                }
                other => {
                    let Some(adjust) = number(other) else {
                        continue;
                    };
                    let tx = -adjust / 1000.0 * font_size * scaling;
                    cursor.advance(tx);
                    advance += tx;
                    if -adjust > TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }

        if text.trim().is_empty() {
            return;
        }

        let user = start.then(state.ctm);
        let rendering = Matrix([font_size * scaling, 0.0, 0.0, font_size, 0.0, state.rise]).then(user);

        self.items.push(TextItem {
            text,
            transform: rendering.0,
            width: advance * user.horizontal_scale(),
            height: rendering.vertical_scale(),
            font_name: font.name.clone(),
        });
    }
}
