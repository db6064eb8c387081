use crate::numbering;
use crate::spans::TextElement;

/// Glue detached numbering prefixes onto the span that follows them.
///
/// PDFs frequently render "2." and "Background" as separate spans on the
/// same line. When an element is a bare numbering token and the next element
/// sits on the same page within twice the token's height, the two merge into
/// a single element (space-joined text, unioned bbox, max font size, OR'd
/// bold flag) and both sources are consumed.
pub fn combine_numbered_headings(elements: Vec<TextElement>) -> Vec<TextElement> {
    let mut combined = Vec::with_capacity(elements.len());
    let mut i = 0;

    while i < elements.len() {
        let current = &elements[i];
        let text = current.text.trim();

        if numbering::is_numbering_token(text) {
            if let Some(next) = elements.get(i + 1) {
                let close_enough = next.page == current.page
                    && (next.bbox.y0 - current.bbox.y0).abs() < current.height() * 2.0;
                if close_enough {
                    let mut merged = current.clone();
                    merged.text = format!("{} {}", text, next.text.trim());
                    merged.font_size = current.font_size.max(next.font_size);
                    merged.is_bold = current.is_bold || next.is_bold;
                    merged.bbox = current.bbox.union(&next.bbox);
                    merged.left_margin = merged.bbox.x0;
                    merged.right_margin = merged.page_width - merged.bbox.x1;
                    combined.push(merged);
                    i += 2;
                    continue;
                }
            }
        }

        combined.push(current.clone());
        i += 1;
    }

    combined
}
