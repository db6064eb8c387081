use crate::numbering;
use crate::spans::TextElement;

/// Per-document spacing thresholds: median and 80th-percentile of all
/// positive gaps, before and after. With no spacing variation everything
/// degrades to zero and the spacing signals stop firing.
#[derive(Debug, Clone, Default)]
pub struct SpacingProfile {
    pub normal_before: f64,
    pub large_before: f64,
    pub normal_after: f64,
    pub large_after: f64,
}

impl SpacingProfile {
    pub fn from_elements(elements: &[TextElement]) -> Self {
        let mut before: Vec<f64> = elements
            .iter()
            .map(|e| e.spacing_before)
            .filter(|&s| s > 0.0)
            .collect();
        let mut after: Vec<f64> = elements
            .iter()
            .map(|e| e.spacing_after)
            .filter(|&s| s > 0.0)
            .collect();
        before.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        after.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        SpacingProfile {
            normal_before: percentile(&before, 50),
            large_before: percentile(&before, 80),
            normal_after: percentile(&after, 50),
            large_after: percentile(&after, 80),
        }
    }
}

/// Nearest-rank percentile on an ascending-sorted slice: index floor(n·p/100)
/// clamped to the last element. Empty input yields 0.
fn percentile(sorted: &[f64], p: usize) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (sorted.len() * p / 100).min(sorted.len() - 1);
    sorted[idx]
}

/// Document-wide font statistics: the six largest distinct sizes ranked
/// 1..=6, and the modal size used as the body-text baseline.
#[derive(Debug, Clone)]
pub struct FontStats {
    levels: Vec<(u64, u8)>,
    pub body_size: f64,
}

impl FontStats {
    pub fn from_elements(elements: &[TextElement]) -> Self {
        // Exact f64 keys, as the same values flow from extraction to lookup.
        let mut counts: Vec<(u64, usize)> = Vec::new();
        for e in elements {
            let bits = e.font_size.to_bits();
            match counts.iter_mut().find(|(b, _)| *b == bits) {
                Some((_, n)) => *n += 1,
                None => counts.push((bits, 1)),
            }
        }

        let mut sizes: Vec<f64> = counts.iter().map(|&(b, _)| f64::from_bits(b)).collect();
        sizes.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let levels = sizes
            .iter()
            .take(6)
            .enumerate()
            .map(|(i, s)| (s.to_bits(), (i + 1) as u8))
            .collect();

        // Mode; ties resolve to the first size encountered in reading order.
        let mut body_size = 12.0;
        let mut best = 0usize;
        for &(bits, n) in &counts {
            if n > best {
                best = n;
                body_size = f64::from_bits(bits);
            }
        }

        FontStats { levels, body_size }
    }

    /// Rank of an exact font size, 1 (largest) through 6. Sizes outside the
    /// six largest default to 6.
    pub fn level_for(&self, size: f64) -> u8 {
        let bits = size.to_bits();
        self.levels
            .iter()
            .find(|&&(b, _)| b == bits)
            .map(|&(_, lvl)| lvl)
            .unwrap_or(6)
    }
}

/// One scoring signal that fired for an element. Structured so tests can
/// assert on signals without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Numbering,
    FontRatio,
    Bold,
    SpacingBefore,
    SpacingAfter,
    Centered,
    LeftAligned,
    AllCaps,
    TitleCase,
    GoodLength,
    TooLong,
    Keyword,
    Question,
    BoldFontName,
    TopOfPage,
}

#[derive(Debug, Clone, Copy)]
pub struct SignalHit {
    pub signal: Signal,
    pub weight: i32,
}

/// Read-only heuristic configuration shared by every document. Tier tables
/// are ordered highest threshold first; the first tier at or below the
/// observed value wins.
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    pub font_ratio_tiers: &'static [(f64, i32)],
    pub keywords: &'static [&'static str],
    pub bold_font_markers: &'static [&'static str],
}

const FONT_RATIO_TIERS: &[(f64, i32)] = &[(2.0, 4), (1.5, 3), (1.3, 2), (1.1, 1)];

const HEADING_KEYWORDS: &[&str] = &[
    "introduction",
    "conclusion",
    "summary",
    "overview",
    "background",
    "methodology",
    "results",
    "discussion",
    "chapter",
    "section",
    "appendix",
    "references",
    "bibliography",
    "index",
    "glossary",
    "pathway",
    "options",
    "programs",
    "courses",
    "requirements",
    "objectives",
    "goals",
    "scope",
    "purpose",
    "abstract",
];

const BOLD_FONT_MARKERS: &[&str] = &["bold", "black", "heavy", "semibold"];

impl Default for ScoreConfig {
    fn default() -> Self {
        ScoreConfig {
            font_ratio_tiers: FONT_RATIO_TIERS,
            keywords: HEADING_KEYWORDS,
            bold_font_markers: BOLD_FONT_MARKERS,
        }
    }
}

/// Result of scoring one element: cumulative score, fired signals, and the
/// level forced by hierarchical numbering, if any.
#[derive(Debug, Clone)]
pub struct Scored {
    pub score: i32,
    pub hits: Vec<SignalHit>,
    pub forced_level: Option<u8>,
}

/// A heading candidate that cleared its acceptance threshold.
#[derive(Debug, Clone)]
pub struct HeadingCandidate {
    pub level: u8,
    pub text: String,
    pub page: usize,
    pub score: i32,
    pub hits: Vec<SignalHit>,
    /// Level came from numbering rather than font/score inference.
    pub hierarchical: bool,
}

/// Multi-signal heading score for a single element.
pub fn score_element(
    elem: &TextElement,
    profile: &SpacingProfile,
    stats: &FontStats,
    cfg: &ScoreConfig,
) -> Scored {
    let mut score = 0;
    let mut hits = Vec::new();
    let mut hit = |signal, weight: i32, score: &mut i32| {
        *score += weight;
        hits.push(SignalHit { signal, weight });
    };

    let text = elem.text.trim();
    let len = text.chars().count();
    let words = text.split_whitespace().count();
    let lower = text.to_lowercase();

    // Hierarchical numbering dominates: it scores and fixes the level.
    let forced_level = numbering::numbering_depth(text);
    if forced_level.is_some() {
        hit(Signal::Numbering, 6, &mut score);
    }

    let ratio = elem.font_size / stats.body_size;
    if let Some(&(_, weight)) = cfg.font_ratio_tiers.iter().find(|&&(t, _)| ratio >= t) {
        hit(Signal::FontRatio, weight, &mut score);
    }

    if elem.is_bold {
        hit(Signal::Bold, 3, &mut score);
    }

    if elem.spacing_before > profile.large_before {
        hit(Signal::SpacingBefore, 2, &mut score);
    } else if elem.spacing_before > profile.normal_before * 1.5 {
        hit(Signal::SpacingBefore, 1, &mut score);
    }
    if elem.spacing_after > profile.large_after {
        hit(Signal::SpacingAfter, 1, &mut score);
    }

    let page_center = elem.page_width / 2.0;
    if (elem.center_x() - page_center).abs() < elem.page_width * 0.1 {
        hit(Signal::Centered, 1, &mut score);
    }
    if elem.left_margin < elem.page_width * 0.2 {
        hit(Signal::LeftAligned, 1, &mut score);
    }

    if is_all_caps(text) && len > 5 && len < 50 {
        hit(Signal::AllCaps, 2, &mut score);
    } else if is_title_case(text) && words <= 8 {
        hit(Signal::TitleCase, 1, &mut score);
    }

    if (5..=100).contains(&len) {
        hit(Signal::GoodLength, 1, &mut score);
    } else if len > 200 {
        hit(Signal::TooLong, -2, &mut score);
    }

    if cfg.keywords.iter().any(|k| lower.contains(k)) {
        hit(Signal::Keyword, 2, &mut score);
    }

    if text.ends_with('?') && words <= 10 {
        hit(Signal::Question, 1, &mut score);
    }

    let font_lower = elem.font_name.to_lowercase();
    if cfg.bold_font_markers.iter().any(|m| font_lower.contains(m)) {
        hit(Signal::BoldFontName, 1, &mut score);
    }

    if elem.page > 1 && elem.bbox.y0 < elem.page_height * 0.2 {
        hit(Signal::TopOfPage, 1, &mut score);
    }

    Scored {
        score,
        hits,
        forced_level,
    }
}

/// Score an element and resolve it into an accepted candidate, or `None`
/// when it fails the basic filters, its variable threshold, or the H1-H3
/// cut-off.
pub fn classify(
    elem: &TextElement,
    profile: &SpacingProfile,
    stats: &FontStats,
    cfg: &ScoreConfig,
) -> Option<HeadingCandidate> {
    let text = elem.text.trim();
    let len = text.chars().count();
    if !(3..=300).contains(&len) {
        return None;
    }
    if numbering::is_bare_numbering(text) {
        return None;
    }

    let scored = score_element(elem, profile, stats, cfg);

    let threshold = if scored.forced_level.is_some() {
        3
    } else if elem.is_bold && elem.font_size > stats.body_size * 1.2 {
        4
    } else if elem.font_size > stats.body_size * 1.5 {
        3
    } else {
        4
    };
    if scored.score < threshold {
        return None;
    }

    let level = match scored.forced_level {
        Some(level) => level,
        None => {
            let mut level = stats.level_for(elem.font_size);
            if scored.score >= 10 && level > 1 {
                level -= 1;
            } else if scored.score >= 8 && level > 2 {
                level -= 1;
            }
            level
        }
    };
    if level > 3 {
        return None;
    }

    Some(HeadingCandidate {
        level,
        text: text.to_string(),
        page: elem.page,
        score: scored.score,
        hits: scored.hits,
        hierarchical: scored.forced_level.is_some(),
    })
}

/// At least one cased character, none of them lowercase.
fn is_all_caps(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

/// Every word's leading letter uppercase and the rest lowercase.
fn is_title_case(text: &str) -> bool {
    let mut has_word = false;
    for word in text.split_whitespace() {
        let mut letters = word.chars().filter(|c| c.is_alphabetic());
        match letters.next() {
            Some(first) => {
                if !first.is_uppercase() {
                    return false;
                }
                if letters.any(|c| c.is_uppercase()) {
                    return false;
                }
                has_word = true;
            }
            None => continue,
        }
    }
    has_word
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spans::BBox;

    fn element(text: &str, font_size: f64) -> TextElement {
        TextElement {
            text: text.to_string(),
            page: 1,
            font_size,
            font_name: "TestFont".to_string(),
            is_bold: false,
            is_italic: false,
            bbox: BBox {
                x0: 72.0,
                y0: 300.0,
                x1: 200.0,
                y1: 300.0 + font_size,
            },
            page_width: 612.0,
            page_height: 792.0,
            spacing_before: 0.0,
            spacing_after: 0.0,
            left_margin: 72.0,
            right_margin: 412.0,
        }
    }

    fn body_stats() -> FontStats {
        // Body at 10pt, one larger size so ratios are meaningful.
        let elems: Vec<TextElement> = (0..10)
            .map(|_| element("body", 10.0))
            .chain(std::iter::once(element("big", 16.0)))
            .collect();
        FontStats::from_elements(&elems)
    }

    fn fired(scored: &Scored, signal: Signal) -> Option<i32> {
        scored
            .hits
            .iter()
            .find(|h| h.signal == signal)
            .map(|h| h.weight)
    }

    #[test]
    fn percentile_is_nearest_rank() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 50), 3.0);
        assert_eq!(percentile(&data, 80), 5.0);
        assert_eq!(percentile(&[], 50), 0.0);
        assert_eq!(percentile(&[7.0], 80), 7.0);
    }

    #[test]
    fn font_levels_rank_six_largest_sizes() {
        let elems: Vec<TextElement> = [24.0, 20.0, 16.0, 14.0, 12.0, 11.0, 10.0]
            .iter()
            .map(|&s| element("x", s))
            .collect();
        let stats = FontStats::from_elements(&elems);
        assert_eq!(stats.level_for(24.0), 1);
        assert_eq!(stats.level_for(14.0), 4);
        assert_eq!(stats.level_for(11.0), 6);
        // Outside the top six.
        assert_eq!(stats.level_for(10.0), 6);
        assert_eq!(stats.level_for(9.0), 6);
    }

    #[test]
    fn body_size_is_the_mode() {
        let elems: Vec<TextElement> = [10.0, 10.0, 10.0, 16.0, 16.0, 24.0]
            .iter()
            .map(|&s| element("x", s))
            .collect();
        let stats = FontStats::from_elements(&elems);
        assert_eq!(stats.body_size, 10.0);
    }

    #[test]
    fn numbering_forces_level_and_scores_six() {
        let stats = body_stats();
        let scored = score_element(
            &element("2.1 Scope", 10.0),
            &SpacingProfile::default(),
            &stats,
            &ScoreConfig::default(),
        );
        assert_eq!(scored.forced_level, Some(2));
        assert_eq!(fired(&scored, Signal::Numbering), Some(6));
    }

    #[test]
    fn font_ratio_tiers_are_exclusive() {
        let stats = body_stats();
        let cfg = ScoreConfig::default();
        let profile = SpacingProfile::default();

        let scored = score_element(&element("plain text here", 10.0), &profile, &stats, &cfg);
        assert_eq!(fired(&scored, Signal::FontRatio), None);

        let scored = score_element(&element("plain text here", 11.5), &profile, &stats, &cfg);
        assert_eq!(fired(&scored, Signal::FontRatio), Some(1));

        let scored = score_element(&element("plain text here", 16.0), &profile, &stats, &cfg);
        assert_eq!(fired(&scored, Signal::FontRatio), Some(3));

        let scored = score_element(&element("plain text here", 21.0), &profile, &stats, &cfg);
        assert_eq!(fired(&scored, Signal::FontRatio), Some(4));
    }

    #[test]
    fn score_is_monotonic_in_font_ratio() {
        let stats = body_stats();
        let cfg = ScoreConfig::default();
        let profile = SpacingProfile::default();

        let mut last = i32::MIN;
        for ratio in [1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.8, 2.0, 2.5] {
            let scored = score_element(
                &element("Steady Text Here", 10.0 * ratio),
                &profile,
                &stats,
                &cfg,
            );
            assert!(
                scored.score >= last,
                "score dropped at ratio {}: {} < {}",
                ratio,
                scored.score,
                last
            );
            last = scored.score;
        }
    }

    #[test]
    fn case_and_keyword_signals() {
        let stats = body_stats();
        let cfg = ScoreConfig::default();
        let profile = SpacingProfile::default();

        let scored = score_element(&element("TABLE OF FIGURES", 10.0), &profile, &stats, &cfg);
        assert_eq!(fired(&scored, Signal::AllCaps), Some(2));
        assert_eq!(fired(&scored, Signal::TitleCase), None);

        let scored = score_element(&element("Future Work Planned", 10.0), &profile, &stats, &cfg);
        assert_eq!(fired(&scored, Signal::TitleCase), Some(1));

        let scored = score_element(&element("Methodology notes", 10.0), &profile, &stats, &cfg);
        assert_eq!(fired(&scored, Signal::Keyword), Some(2));

        let scored = score_element(
            &element("What is covered here?", 10.0),
            &profile,
            &stats,
            &cfg,
        );
        assert_eq!(fired(&scored, Signal::Question), Some(1));
    }

    #[test]
    fn spacing_signals_use_document_thresholds() {
        let stats = body_stats();
        let cfg = ScoreConfig::default();
        let profile = SpacingProfile {
            normal_before: 4.0,
            large_before: 12.0,
            normal_after: 4.0,
            large_after: 12.0,
        };

        let mut e = element("some text here", 10.0);
        e.spacing_before = 20.0;
        e.spacing_after = 15.0;
        let scored = score_element(&e, &profile, &stats, &cfg);
        assert_eq!(fired(&scored, Signal::SpacingBefore), Some(2));
        assert_eq!(fired(&scored, Signal::SpacingAfter), Some(1));

        e.spacing_before = 8.0;
        e.spacing_after = 2.0;
        let scored = score_element(&e, &profile, &stats, &cfg);
        assert_eq!(fired(&scored, Signal::SpacingBefore), Some(1));
        assert_eq!(fired(&scored, Signal::SpacingAfter), None);
    }

    #[test]
    fn long_text_is_penalised() {
        let stats = body_stats();
        let long = "word ".repeat(50);
        let scored = score_element(
            &element(long.trim(), 10.0),
            &SpacingProfile::default(),
            &stats,
            &ScoreConfig::default(),
        );
        assert_eq!(fired(&scored, Signal::TooLong), Some(-2));
        assert_eq!(fired(&scored, Signal::GoodLength), None);
    }

    #[test]
    fn bare_numbering_never_becomes_a_candidate() {
        let stats = body_stats();
        let cfg = ScoreConfig::default();
        let profile = SpacingProfile::default();
        for text in ["3.", "IV", "(2)"] {
            let mut e = element(text, 24.0);
            e.is_bold = true;
            assert!(classify(&e, &profile, &stats, &cfg).is_none(), "{}", text);
        }
    }

    #[test]
    fn weak_body_text_is_rejected() {
        let stats = body_stats();
        // Left-aligned short body text: LeftAligned(1) + GoodLength(1) = 2 < 4.
        let candidate = classify(
            &element("ordinary sentence text", 10.0),
            &SpacingProfile::default(),
            &stats,
            &ScoreConfig::default(),
        );
        assert!(candidate.is_none());
    }

    #[test]
    fn forced_level_overrides_font_level() {
        let stats = body_stats();
        // 10pt is not among the document's large sizes, but the numbering
        // still pins this to H1.
        let candidate = classify(
            &element("1. Introduction", 10.0),
            &SpacingProfile::default(),
            &stats,
            &ScoreConfig::default(),
        )
        .expect("numbered heading accepted");
        assert_eq!(candidate.level, 1);
        assert!(candidate.hierarchical);
    }

    #[test]
    fn high_score_promotes_font_level() {
        let elems: Vec<TextElement> = (0..10)
            .map(|_| element("body", 10.0))
            .chain([element("a", 30.0), element("b", 24.0), element("c", 20.0)])
            .collect();
        let stats = FontStats::from_elements(&elems);
        let cfg = ScoreConfig::default();
        let profile = SpacingProfile {
            normal_before: 2.0,
            large_before: 6.0,
            normal_after: 2.0,
            large_after: 6.0,
        };

        // Font rank 3, but a strong signal pile-up (ratio 2.0, bold, caps,
        // spacing) promotes it to 2.
        let mut e = element("PROGRAM OVERVIEW", 20.0);
        e.is_bold = true;
        e.spacing_before = 10.0;
        e.spacing_after = 10.0;
        let candidate = classify(&e, &profile, &stats, &cfg).expect("accepted");
        assert!(candidate.score >= 10);
        assert_eq!(candidate.level, 2);
        assert!(!candidate.hierarchical);
        assert!(candidate.hits.iter().any(|h| h.signal == Signal::Bold));
    }

    #[test]
    fn levels_beyond_h3_are_discarded() {
        let elems: Vec<TextElement> = (0..10)
            .map(|_| element("body", 8.0))
            .chain([
                element("a", 30.0),
                element("b", 28.0),
                element("c", 26.0),
                element("d", 24.0),
                element("e", 22.0),
                element("f", 20.0),
            ])
            .collect();
        let stats = FontStats::from_elements(&elems);
        // Rank 5 font, modest score: passes the threshold via ratio alone
        // but resolves deeper than H3.
        let candidate = classify(
            &element("Objectives And Goals", 22.0),
            &SpacingProfile::default(),
            &stats,
            &ScoreConfig::default(),
        );
        assert!(candidate.is_none());
    }
}
