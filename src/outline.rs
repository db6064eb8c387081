use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::scoring::HeadingCandidate;

pub const UNTITLED: &str = "Untitled Document";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: String,
    pub text: String,
    pub page: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outline {
    pub title: String,
    pub outline: Vec<Heading>,
}

/// Order, deduplicate and title-split accepted candidates into the final
/// outline.
///
/// Candidates sort by page, hierarchical (numbering-derived) ones ahead of
/// score-based ones, then score descending. A (lowercased text, page) pair
/// survives only once. The title is the first page-1 H1, else the first
/// page-1 heading, else the first H1 anywhere, else a placeholder; headings
/// whose trimmed text equals the title exactly (case-sensitive) stay out of
/// the outline.
pub fn assemble(mut candidates: Vec<HeadingCandidate>) -> Outline {
    candidates.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(b.hierarchical.cmp(&a.hierarchical))
            .then(b.score.cmp(&a.score))
    });

    let mut seen: HashSet<(String, usize)> = HashSet::new();
    let mut headings: Vec<Heading> = Vec::new();
    for candidate in candidates {
        let key = (candidate.text.trim().to_lowercase(), candidate.page);
        if seen.insert(key) {
            headings.push(Heading {
                level: format!("H{}", candidate.level),
                text: candidate.text,
                page: candidate.page,
            });
        }
    }

    let title = select_title(&headings);
    let outline = headings
        .into_iter()
        .filter(|h| h.text.trim() != title.trim())
        .collect();

    Outline { title, outline }
}

/// Title preference chain: first H1 on page 1, first heading of any level
/// on page 1, first H1 on any page, placeholder.
fn select_title(headings: &[Heading]) -> String {
    let page_one: Vec<&Heading> = headings.iter().filter(|h| h.page == 1).collect();

    if let Some(h1) = page_one.iter().find(|h| h.level == "H1") {
        return h1.text.clone();
    }
    if let Some(first) = page_one.first() {
        return first.text.clone();
    }
    if let Some(h1) = headings.iter().find(|h| h.level == "H1") {
        return h1.text.clone();
    }
    UNTITLED.to_string()
}
