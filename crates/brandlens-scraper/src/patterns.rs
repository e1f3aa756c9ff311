//! Email, phone and social-profile patterns plus their validation rules.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::html::{decode_entities, visible_text};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}\b").expect("valid regex")
});
static MAILTO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)mailto:([^"'?\s<>&]+)"#).expect("valid regex"));
static EMAIL_SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}$").expect("valid regex")
});

static PHONE_INTL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+\d{1,3}[\s.-]?\(?\d{1,4}\)?(?:[\s.-]?\d{2,4}){2,4}").expect("valid regex")
});
static PHONE_NA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]\d{4}\b").expect("valid regex")
});
static PHONE_TEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)tel:([+\d][\d\s().%-]{5,})"#).expect("valid regex"));

static LINKEDIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://(?:[a-z]{2,3}\.)?linkedin\.com/(?:in|company)/[a-z0-9_%-]+/?")
        .expect("valid regex")
});
static TWITTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://(?:www\.|mobile\.)?(?:twitter|x)\.com/([a-z0-9_]{1,15})\b/?")
        .expect("valid regex")
});
static FACEBOOK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://(?:www\.|m\.)?facebook\.com/([a-z0-9.-]+)/?").expect("valid regex")
});
static INSTAGRAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://(?:www\.)?instagram\.com/([a-z0-9_.]+)/?").expect("valid regex")
});

const REJECTED_LOCAL_PARTS: &[&str] = &[
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "support",
    "info",
    "admin",
    "webmaster",
    "postmaster",
    "test",
];

const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "test.com",
    "domain.com",
    "email.com",
    "sentry.io",
];

const FILE_SUFFIXES: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".avif", ".css", ".js",
];

const TWITTER_RESERVED: &[&str] = &["share", "intent", "home", "search", "hashtag", "i", "login"];
const FACEBOOK_RESERVED: &[&str] = &["sharer", "sharer.php", "share.php", "dialog", "plugins", "tr"];
const INSTAGRAM_RESERVED: &[&str] = &["p", "explore", "reel", "reels", "stories", "accounts"];

/// Accepts a plausible personal or business address.
///
/// Rejects malformed addresses, automated or generic role inboxes
/// (`noreply@`, `support@`, `info@`, ...), placeholder domains such as
/// `example.com`, and asset names that look like addresses (`logo@2x.png`).
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim().to_lowercase();
    if !EMAIL_SHAPE_RE.is_match(&email) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if REJECTED_LOCAL_PARTS.contains(&local) {
        return false;
    }
    if PLACEHOLDER_DOMAINS
        .iter()
        .any(|d| domain == *d || domain.ends_with(&format!(".{d}")))
    {
        return false;
    }
    !FILE_SUFFIXES.iter().any(|suffix| domain.ends_with(suffix))
}

/// Accepts 7 to 15 digits once spaces, dashes, dots, slashes, parentheses
/// and a single leading `+` are removed.
#[must_use]
pub fn is_valid_phone(phone: &str) -> bool {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let stripped: String = body
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')' | '/' | '\t'))
        .collect();
    stripped.chars().all(|c| c.is_ascii_digit()) && (7..=15).contains(&stripped.len())
}

fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Validated emails from bare text and `mailto:` links, lowercased, first-seen order.
pub(crate) fn extract_emails(html: &str) -> Vec<String> {
    let decoded = decode_entities(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    let bare = EMAIL_RE.find_iter(&decoded).map(|m| m.as_str().to_string());
    let mailto = MAILTO_RE
        .captures_iter(&decoded)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().replace("%40", "@")));

    for candidate in bare.chain(mailto) {
        let email = candidate.trim().to_lowercase();
        if is_valid_email(&email) && seen.insert(email.clone()) {
            out.push(email);
        }
    }
    out
}

/// Validated phone numbers, first-seen order.
///
/// The three passes overlap (an international number also matches the
/// national pattern), so a number whose digits are a suffix of one already
/// collected is treated as the same number.
pub(crate) fn extract_phones(html: &str) -> Vec<String> {
    let text = visible_text(html);
    let mut out: Vec<String> = Vec::new();
    let mut keys: Vec<String> = Vec::new();

    let intl = PHONE_INTL_RE.find_iter(&text).map(|m| m.as_str().to_string());
    let national = PHONE_NA_RE.find_iter(&text).map(|m| m.as_str().to_string());
    let tel = PHONE_TEL_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().replace("%20", " ")));

    for candidate in intl.chain(national).chain(tel) {
        let phone = candidate.trim().to_string();
        if !is_valid_phone(&phone) {
            continue;
        }
        let key = phone_digits(&phone);
        if keys
            .iter()
            .any(|existing| existing.ends_with(&key) || key.ends_with(existing.as_str()))
        {
            continue;
        }
        keys.push(key);
        out.push(phone);
    }
    out
}

/// First profile link found for each network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialLinks {
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
}

impl SocialLinks {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.linkedin_url.is_none()
            && self.twitter_url.is_none()
            && self.facebook_url.is_none()
            && self.instagram_url.is_none()
    }
}

fn first_profile(re: &Regex, html: &str, reserved: &[&str]) -> Option<String> {
    re.captures_iter(html).find_map(|cap| {
        let handle = cap.get(1)?.as_str().to_lowercase();
        if reserved.contains(&handle.as_str()) {
            return None;
        }
        cap.get(0).map(|m| m.as_str().to_string())
    })
}

pub(crate) fn extract_socials(html: &str) -> SocialLinks {
    SocialLinks {
        linkedin_url: LINKEDIN_RE.find(html).map(|m| m.as_str().to_string()),
        twitter_url: first_profile(&TWITTER_RE, html, TWITTER_RESERVED),
        facebook_url: first_profile(&FACEBOOK_RE, html, FACEBOOK_RESERVED),
        instagram_url: first_profile(&INSTAGRAM_RE, html, INSTAGRAM_RESERVED),
    }
}

#[cfg(test)]
#[path = "patterns_test.rs"]
mod tests;
