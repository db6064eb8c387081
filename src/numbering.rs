use once_cell::sync::Lazy;
use regex::Regex;

// Numbering patterns, checked in priority order. The first two together
// cover decimal schemes with and without a trailing dot ("1. Foo",
// "2.1.3 Foo"); the rest cover parenthesised, lettered and roman forms.
static DOTTED_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.\s+").unwrap());
static PLAIN_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)+)\s+").unwrap());
static PAREN_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\((\d+(?:\.\d+)*)\)\s+").unwrap());
static LETTER_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]\.\s+").unwrap());
static ROMAN_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[IVX]+\.\s+").unwrap());
static LOWER_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]\)\s+").unwrap());
static BARE_INT_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s+[A-Za-z]").unwrap());

// A numbering glyph rendered as its own span, e.g. "2.", "(3)" or "iv",
// with the heading text in the following span.
static NUMBERING_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+\.?|\d+\.\d+\.?|\d+\.\d+\.\d+\.?|[A-Z]\.|\(\d+\)|[ivx]+\.?)$").unwrap()
});

static ALL_DIGITS_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9.]+$").unwrap());
static BARE_ROMAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ivx]+$").unwrap());

/// Nesting depth (1..=3) implied by a hierarchical numbering prefix, or
/// `None` when the text carries no recognised numbering scheme.
pub fn numbering_depth(text: &str) -> Option<u8> {
    let text = text.trim();

    if let Some(caps) = DOTTED_DECIMAL
        .captures(text)
        .or_else(|| PLAIN_DECIMAL.captures(text))
    {
        let dots = caps[1].matches('.').count() as u8;
        return Some((dots + 1).min(3));
    }

    if let Some(caps) = PAREN_DECIMAL.captures(text) {
        // Parenthesised lists sit one level below the matching decimal scheme.
        let dots = caps[1].matches('.').count() as u8;
        return Some((dots + 2).min(3));
    }

    if LETTER_DOT.is_match(text) || ROMAN_DOT.is_match(text) {
        return Some(1);
    }

    if LOWER_PAREN.is_match(text) {
        return Some(3);
    }

    if BARE_INT_WORD.is_match(text) {
        return Some(1);
    }

    None
}

/// True when the text is a numbering token with no content of its own
/// ("3.", "(2)", "IV"). Such tokens are noise, never standalone headings.
pub fn is_bare_numbering(text: &str) -> bool {
    let clean: String = text
        .chars()
        .filter(|c| !matches!(c, '.' | '(' | ')' | '-') && !c.is_whitespace())
        .collect();

    if clean.chars().count() <= 2 {
        return true;
    }
    if clean.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if ALL_DIGITS_DOTS.is_match(&clean) {
        return true;
    }
    if clean.len() == 1 && clean.chars().all(|c| c.is_ascii_uppercase()) {
        return true;
    }
    BARE_ROMAN.is_match(&clean.to_lowercase())
}

/// True when the trimmed text looks like a detached numbering prefix that
/// the combiner should glue onto the following span.
pub fn is_numbering_token(text: &str) -> bool {
    NUMBERING_TOKEN.is_match(text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_depth_counts_dots() {
        assert_eq!(numbering_depth("1. Introduction"), Some(1));
        assert_eq!(numbering_depth("2.1 Scope"), Some(2));
        assert_eq!(numbering_depth("1.2.3 Results"), Some(3));
        assert_eq!(numbering_depth("2.1.3. Foo"), Some(3));
    }

    #[test]
    fn decimal_depth_caps_at_three() {
        assert_eq!(numbering_depth("1.2.3.4 Foo"), Some(3));
        assert_eq!(numbering_depth("1.2.3.4.5. Bar"), Some(3));
    }

    #[test]
    fn parenthetical_offsets_one_level() {
        assert_eq!(numbering_depth("(1) First"), Some(2));
        assert_eq!(numbering_depth("(1.1) Nested"), Some(3));
        assert_eq!(numbering_depth("(1.1.1) Deep"), Some(3));
    }

    #[test]
    fn letters_and_romans_are_top_level() {
        assert_eq!(numbering_depth("A. Background"), Some(1));
        assert_eq!(numbering_depth("IV. Scope"), Some(1));
    }

    #[test]
    fn lowercase_paren_is_third_level() {
        assert_eq!(numbering_depth("a) Goals"), Some(3));
    }

    #[test]
    fn bare_integer_with_word_is_top_level() {
        assert_eq!(numbering_depth("1 Introduction"), Some(1));
    }

    #[test]
    fn prose_has_no_depth() {
        assert_eq!(numbering_depth("Introduction"), None);
        assert_eq!(numbering_depth("The 3 pillars"), None);
        assert_eq!(numbering_depth("iv) odd"), None);
    }

    #[test]
    fn bare_numbering_is_noise() {
        assert!(is_bare_numbering("3."));
        assert!(is_bare_numbering("IV"));
        assert!(is_bare_numbering("(2)"));
        assert!(is_bare_numbering("1.2.3"));
        assert!(is_bare_numbering("A."));
        assert!(is_bare_numbering("- 4 -"));
    }

    #[test]
    fn real_headings_are_not_noise() {
        assert!(!is_bare_numbering("1. Introduction"));
        assert!(!is_bare_numbering("Overview"));
    }

    #[test]
    fn combiner_token_shapes() {
        assert!(is_numbering_token("2."));
        assert!(is_numbering_token("2.1"));
        assert!(is_numbering_token("2.1.3."));
        assert!(is_numbering_token("B."));
        assert!(is_numbering_token("(12)"));
        assert!(is_numbering_token("iv"));
        assert!(!is_numbering_token("2. Background"));
        assert!(!is_numbering_token("Chapter"));
    }
}
