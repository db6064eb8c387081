use lopdf::{content::Content, Document, Object, ObjectId};
use log::warn;

/// Bounding box in top-down page coordinates: `y0` is the top edge, `y1`
/// the bottom edge, with y = 0 at the top of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One styled run of text on one page, with layout context filled in.
#[derive(Debug, Clone)]
pub struct TextElement {
    pub text: String,
    pub page: usize,
    pub font_size: f64,
    pub font_name: String,
    pub is_bold: bool,
    pub is_italic: bool,
    pub bbox: BBox,
    pub page_width: f64,
    pub page_height: f64,
    /// Vertical gap to the nearest element above (page top for the first).
    pub spacing_before: f64,
    /// Vertical gap to the nearest element below (page bottom for the last).
    pub spacing_after: f64,
    pub left_margin: f64,
    pub right_margin: f64,
}

impl TextElement {
    pub fn height(&self) -> f64 {
        self.bbox.height()
    }

    pub fn center_x(&self) -> f64 {
        self.bbox.x0 + self.bbox.width() / 2.0
    }
}

/// A positioned span straight out of the content stream, before block
/// grouping and table filtering. Coordinates are PDF user space (y grows
/// upward), `y` is the text baseline.
#[derive(Debug, Clone)]
pub(crate) struct RawSpan {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub font_size: f64,
    pub font_name: String,
    pub is_bold: bool,
    pub is_italic: bool,
}

// Estimated advance per character as a fraction of font size, used when no
// glyph metrics are available.
const APPROX_CHAR_WIDTH_RATIO: f64 = 0.5;

// Spans whose baselines differ by less than this are on the same line.
const LINE_Y_TOLERANCE: f64 = 2.0;

// A vertical gap larger than this multiple of the font size starts a new
// block when grouping lines.
const BLOCK_GAP_FACTOR: f64 = 1.8;

const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

/// Extract layout-annotated [`TextElement`]s for the whole document, in page
/// order, with detected table blocks removed and spacing/margins computed.
/// A page that fails to decode contributes nothing.
pub fn extract_elements(doc: &Document) -> Vec<TextElement> {
    let mut elements = Vec::new();

    for (page_idx, (_page_no, &page_id)) in doc.get_pages().iter().enumerate() {
        let page = page_idx + 1;
        let (page_width, page_height) =
            page_dimensions(doc, page_id).unwrap_or(DEFAULT_PAGE_SIZE);

        let spans = match page_spans(doc, page_id) {
            Ok(spans) => spans,
            Err(e) => {
                warn!("page {}: could not decode content stream: {}", page, e);
                continue;
            }
        };

        let mut page_elements = spans_to_elements(spans, page, page_width, page_height);
        page_elements.sort_by(|a, b| a.bbox.y0.partial_cmp(&b.bbox.y0).unwrap_or(std::cmp::Ordering::Equal));
        compute_spacing(&mut page_elements, page_height);
        elements.extend(page_elements);
    }

    elements
}

/// Group a page's raw spans into lines and blocks, drop table blocks, and
/// convert the survivors into [`TextElement`]s (spacing left at zero, filled
/// in by [`compute_spacing`]).
fn spans_to_elements(
    spans: Vec<RawSpan>,
    page: usize,
    page_width: f64,
    page_height: f64,
) -> Vec<TextElement> {
    let blocks = group_blocks(spans);

    let mut elements = Vec::new();
    for block in blocks {
        if is_table_block(&block) {
            continue;
        }
        for line in block {
            for span in line {
                let text = span.text.trim();
                if text.is_empty() {
                    continue;
                }
                // Ascent approximated by the font size; convert the baseline
                // into a top-down box.
                let top = (page_height - span.y - span.font_size).max(0.0);
                let bottom = page_height - span.y;
                let bbox = BBox {
                    x0: span.x,
                    y0: top,
                    x1: span.x + span.width,
                    y1: bottom,
                };
                elements.push(TextElement {
                    text: text.to_string(),
                    page,
                    font_size: span.font_size,
                    font_name: span.font_name.clone(),
                    is_bold: span.is_bold,
                    is_italic: span.is_italic,
                    left_margin: bbox.x0,
                    right_margin: page_width - bbox.x1,
                    bbox,
                    page_width,
                    page_height,
                    spacing_before: 0.0,
                    spacing_after: 0.0,
                });
            }
        }
    }
    elements
}

/// Group spans into baseline-aligned lines, then lines into vertically
/// contiguous blocks. Input order does not matter; output blocks run top to
/// bottom, lines within a block likewise.
fn group_blocks(mut spans: Vec<RawSpan>) -> Vec<Vec<Vec<RawSpan>>> {
    if spans.is_empty() {
        return Vec::new();
    }

    // Descending y = top of page first in PDF user space.
    spans.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines: Vec<Vec<RawSpan>> = Vec::new();
    for span in spans {
        match lines.last_mut() {
            Some(line) if (line[0].y - span.y).abs() < LINE_Y_TOLERANCE => line.push(span),
            _ => lines.push(vec![span]),
        }
    }
    for line in &mut lines {
        line.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }

    let mut blocks: Vec<Vec<Vec<RawSpan>>> = Vec::new();
    for line in lines {
        let start_new = match blocks.last().and_then(|b| b.last()) {
            Some(prev) => {
                let gap = prev[0].y - line[0].y;
                let ref_size = line[0].font_size.max(1.0);
                gap > ref_size * BLOCK_GAP_FACTOR
            }
            None => true,
        };
        if start_new {
            blocks.push(vec![line]);
        } else {
            blocks.last_mut().unwrap().push(line);
        }
    }
    blocks
}

/// Tabular-block test: at least two lines, more than four non-empty spans,
/// over 70% of them shorter than 15 characters, and x-origins spread across
/// at least three 10pt-wide buckets (a multi-column alignment signal).
fn is_table_block(block: &[Vec<RawSpan>]) -> bool {
    if block.len() < 2 {
        return false;
    }

    let mut short_spans = 0usize;
    let mut total_spans = 0usize;
    let mut x_buckets = std::collections::BTreeSet::new();

    for line in block {
        for span in line {
            let text = span.text.trim();
            if text.is_empty() {
                continue;
            }
            total_spans += 1;
            if text.chars().count() < 15 {
                short_spans += 1;
            }
            x_buckets.insert(((span.x / 10.0).round() as i64) * 10);
        }
    }

    total_spans > 4
        && (short_spans as f64) / (total_spans as f64) > 0.7
        && x_buckets.len() >= 3
}

/// Fill in spacing-before/after for a page's elements, which must already be
/// sorted by top edge. Negative gaps (overlapping boxes) clamp to zero.
fn compute_spacing(elements: &mut [TextElement], page_height: f64) {
    let n = elements.len();
    for i in 0..n {
        let before = if i > 0 {
            elements[i].bbox.y0 - elements[i - 1].bbox.y1
        } else {
            elements[i].bbox.y0
        };
        let after = if i + 1 < n {
            elements[i + 1].bbox.y0 - elements[i].bbox.y1
        } else {
            page_height - elements[i].bbox.y1
        };
        elements[i].spacing_before = before.max(0.0);
        elements[i].spacing_after = after.max(0.0);
    }
}

// ---------------------------------------------------------------------------
// Content-stream walk
// ---------------------------------------------------------------------------

/// Text state tracked while walking a page's content stream. Only the
/// operators that affect text position, font and spacing are interpreted.
struct TextState {
    font_name: String,
    font_size: f64,
    is_bold: bool,
    is_italic: bool,
    text_matrix: [f64; 6],
    line_matrix: [f64; 6],
    leading: f64,
    char_spacing: f64,
    word_spacing: f64,
    horiz_scale: f64,
}

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

impl Default for TextState {
    fn default() -> Self {
        TextState {
            font_name: String::new(),
            font_size: 12.0,
            is_bold: false,
            is_italic: false,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scale: 1.0,
        }
    }
}

impl TextState {
    fn x(&self) -> f64 {
        self.text_matrix[4]
    }

    fn y(&self) -> f64 {
        self.text_matrix[5]
    }

    /// Rendered size accounting for the text matrix vertical scale.
    fn effective_font_size(&self) -> f64 {
        let scale = (self.text_matrix[1].powi(2) + self.text_matrix[3].powi(2)).sqrt();
        (self.font_size * scale).abs().max(1.0)
    }

    fn translate_line(&mut self, tx: f64, ty: f64) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    fn advance_x(&mut self, dx: f64) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Horizontal displacement of `text`, advancing the text matrix.
    fn show_advance(&mut self, text: &str) -> f64 {
        let mut dx = 0.0;
        for ch in text.chars() {
            dx += self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale + self.char_spacing;
            if ch == ' ' {
                dx += self.word_spacing;
            }
        }
        self.advance_x(dx);
        dx
    }

    fn set_font(&mut self, base_font: &str, size: f64) {
        self.font_name = base_font.to_string();
        self.font_size = size;
        let lower = base_font.to_lowercase();
        self.is_bold = ["bold", "black", "heavy", "semibold"]
            .iter()
            .any(|m| lower.contains(m));
        self.is_italic = lower.contains("italic") || lower.contains("oblique");
    }
}

fn operand_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn decode_string_object(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).to_string()),
        _ => None,
    }
}

/// Resolve the `/F1`-style resource key set by `Tf` to the font's BaseFont
/// name, falling back to the key itself.
fn resolve_base_font(doc: &Document, page_id: ObjectId, key: &[u8]) -> String {
    let fonts = doc.get_page_fonts(page_id);
    if let Some(dict) = fonts.get(key) {
        if let Ok(base) = dict.get(b"BaseFont").and_then(Object::as_name) {
            return String::from_utf8_lossy(base).to_string();
        }
    }
    String::from_utf8_lossy(key).to_string()
}

fn push_span(state: &TextState, text: String, x: f64, y: f64, spans: &mut Vec<RawSpan>) {
    if text.trim().is_empty() {
        return;
    }
    let width = text.chars().count() as f64
        * state.font_size
        * APPROX_CHAR_WIDTH_RATIO
        * state.horiz_scale;
    spans.push(RawSpan {
        text,
        x,
        y,
        width,
        font_size: state.effective_font_size(),
        font_name: state.font_name.clone(),
        is_bold: state.is_bold,
        is_italic: state.is_italic,
    });
}

/// Walk one page's content stream and emit positioned spans. Handles the
/// text-positioning and text-showing operator subset (BT/ET, Tf, Tm, Td, TD,
/// T*, TL, Tc, Tw, Tz, Tj, TJ, ', ").
fn page_spans(doc: &Document, page_id: ObjectId) -> anyhow::Result<Vec<RawSpan>> {
    let content_data = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_data)?;

    let mut state = TextState::default();
    let mut spans = Vec::new();

    for op in &content.operations {
        match op.operator.as_ref() {
            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if op.operands.len() == 2 {
                    if let (Object::Name(key), Some(size)) =
                        (&op.operands[0], operand_number(&op.operands[1]))
                    {
                        let base = resolve_base_font(doc, page_id, key);
                        state.set_font(&base, size);
                    }
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    let mut m = [0.0f64; 6];
                    for (i, slot) in m.iter_mut().enumerate() {
                        *slot = operand_number(&op.operands[i]).unwrap_or(0.0);
                    }
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" => {
                if op.operands.len() >= 2 {
                    let tx = operand_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = operand_number(&op.operands[1]).unwrap_or(0.0);
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if op.operands.len() >= 2 {
                    let tx = operand_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = operand_number(&op.operands[1]).unwrap_or(0.0);
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "T*" => {
                state.translate_line(0.0, -state.leading);
            }
            "TL" => {
                if let Some(v) = op.operands.first().and_then(operand_number) {
                    state.leading = v;
                }
            }
            "Tc" => {
                if let Some(v) = op.operands.first().and_then(operand_number) {
                    state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = op.operands.first().and_then(operand_number) {
                    state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = op.operands.first().and_then(operand_number) {
                    state.horiz_scale = v / 100.0;
                }
            }
            "Tj" => {
                if let Some(text) = op.operands.first().and_then(decode_string_object) {
                    let (x, y) = (state.x(), state.y());
                    state.show_advance(&text);
                    push_span(&state, text, x, y, &mut spans);
                }
            }
            "'" => {
                state.translate_line(0.0, -state.leading);
                if let Some(text) = op.operands.first().and_then(decode_string_object) {
                    let (x, y) = (state.x(), state.y());
                    state.show_advance(&text);
                    push_span(&state, text, x, y, &mut spans);
                }
            }
            "\"" => {
                if op.operands.len() >= 3 {
                    if let Some(v) = operand_number(&op.operands[0]) {
                        state.word_spacing = v;
                    }
                    if let Some(v) = operand_number(&op.operands[1]) {
                        state.char_spacing = v;
                    }
                    state.translate_line(0.0, -state.leading);
                    if let Some(text) = decode_string_object(&op.operands[2]) {
                        let (x, y) = (state.x(), state.y());
                        state.show_advance(&text);
                        push_span(&state, text, x, y, &mut spans);
                    }
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let mut buf = String::new();
                    let mut span_x = state.x();
                    let span_y = state.y();
                    for item in items {
                        if let Some(fragment) = decode_string_object(item) {
                            if buf.is_empty() {
                                span_x = state.x();
                            }
                            state.show_advance(&fragment);
                            buf.push_str(&fragment);
                        } else if let Some(adj) = operand_number(item) {
                            // Kerning adjustment in thousandths of a text-space
                            // unit; a large rightward move is a word gap.
                            let dx = -adj / 1000.0 * state.font_size * state.horiz_scale;
                            let gap = state.font_size * APPROX_CHAR_WIDTH_RATIO * 0.3;
                            if dx > gap && !buf.is_empty() && !buf.ends_with(' ') {
                                buf.push(' ');
                            }
                            state.advance_x(dx);
                        }
                    }
                    push_span(&state, buf, span_x, span_y, &mut spans);
                }
            }
            _ => {}
        }
    }

    Ok(spans)
}

/// Page dimensions from the MediaBox, walking up the page tree when the
/// entry is inherited.
fn page_dimensions(doc: &Document, page_id: ObjectId) -> Option<(f64, f64)> {
    let dict = doc.get_object(page_id).ok()?.as_dict().ok()?;
    let media_box = find_media_box(doc, dict)?;
    if media_box.len() < 4 {
        return None;
    }
    let nums: Vec<f64> = media_box
        .iter()
        .filter_map(|obj| match obj {
            Object::Reference(id) => doc.get_object(*id).ok().and_then(operand_number),
            other => operand_number(other),
        })
        .collect();
    if nums.len() < 4 {
        return None;
    }
    Some((nums[2] - nums[0], nums[3] - nums[1]))
}

fn find_media_box(doc: &Document, dict: &lopdf::Dictionary) -> Option<Vec<Object>> {
    if let Ok(obj) = dict.get(b"MediaBox") {
        match obj {
            Object::Array(arr) => return Some(arr.clone()),
            Object::Reference(id) => {
                if let Ok(arr) = doc.get_object(*id).and_then(Object::as_array) {
                    return Some(arr.clone());
                }
            }
            _ => {}
        }
    }
    let parent_id = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    let parent = doc.get_object(parent_id).ok()?.as_dict().ok()?;
    find_media_box(doc, parent)
}
