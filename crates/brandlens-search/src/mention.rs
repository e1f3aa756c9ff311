//! Mention inference over free-text search answers.
//!
//! Negation is detected over the whole answer, not near the brand: a single
//! negation phrase anywhere suppresses an otherwise valid match. Long answers
//! that negate something unrelated are therefore classified as "not mentioned".

use std::sync::LazyLock;

use regex::Regex;

/// Evidence stored when no line of the answer names the brand.
pub const NO_MENTION_EVIDENCE: &str = "No mention found";

const NEGATION_PHRASES: &[&str] = &[
    "does not mention",
    "not mentioned",
    "no mention",
    "doesn't appear",
    "doesn't mention",
    "not present",
    "absent",
];

static NEGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = NEGATION_PHRASES
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternatives}")).expect("valid regex")
});

static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(\d{1,3})[.)]|[-*•])\s+(.+)$").expect("valid regex")
});

fn brand_regex(brand: &str) -> Option<Regex> {
    let brand = brand.trim();
    if brand.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(brand))).ok()
}

/// Decides whether `text` mentions `brand` affirmatively.
///
/// Requires a case-insensitive whole-word match of the brand; any negation
/// phrase anywhere in `text` then overrides the match to `false`.
#[must_use]
pub fn infer_mention(text: &str, brand: &str) -> bool {
    let Some(re) = brand_regex(brand) else {
        return false;
    };
    if !re.is_match(text) {
        return false;
    }
    !NEGATION_RE.is_match(text)
}

/// Returns the first trimmed line containing `brand` (case-insensitive), or
/// [`NO_MENTION_EVIDENCE`].
#[must_use]
pub fn extract_evidence(text: &str, brand: &str) -> String {
    let needle = brand.trim().to_lowercase();
    if needle.is_empty() {
        return NO_MENTION_EVIDENCE.to_string();
    }
    text.lines()
        .find(|line| line.to_lowercase().contains(&needle))
        .map_or_else(|| NO_MENTION_EVIDENCE.to_string(), |line| line.trim().to_string())
}

/// Returns the 1-based rank of the first list item naming `brand` as a whole word.
///
/// Numbered items (`3.` / `3)`) report their printed number; bullet items
/// (`-`, `*`, `•`) report their ordinal among bullets. `None` when the brand
/// is not inside any list item.
#[must_use]
pub fn mention_position(text: &str, brand: &str) -> Option<i32> {
    let re = brand_regex(brand)?;
    let mut bullets = 0i32;

    for line in text.lines() {
        let Some(caps) = LIST_ITEM_RE.captures(line) else {
            continue;
        };
        let rank = match caps.get(1) {
            Some(number) => number.as_str().parse::<i32>().ok()?,
            None => {
                bullets += 1;
                bullets
            }
        };
        if caps.get(2).is_some_and(|body| re.is_match(body.as_str())) {
            return Some(rank);
        }
    }
    None
}
