//! Regex-based HTML helpers: text cleanup, attribute lookup, meta tags,
//! JSON-LD blocks and anchors.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use serde_json::Value;

static TAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<[^>]+>").expect("valid regex"));
static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)>")
        .expect("valid regex")
});
static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid regex"));
static JSON_LD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").expect("valid regex"));
static ITEMPROP_AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<[a-z0-9]+\b[^>]*\bitemprop\s*=\s*["']author["'][^>]*>(.*?)</"#)
        .expect("valid regex")
});

/// Strips tags, decodes the handful of entities that matter for names and
/// collapses whitespace.
pub(crate) fn clean_text(input: &str) -> String {
    let no_tags = TAGS_RE.replace_all(input, " ");
    decode_entities(&no_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&#64;", "@")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Visible page text: scripts and styles removed, tags stripped.
pub(crate) fn visible_text(html: &str) -> String {
    clean_text(&SCRIPT_STYLE_RE.replace_all(html, " "))
}

pub(crate) fn extract_attr(tag: &str, attr: &str) -> Option<String> {
    let pattern = format!(r#"(?is)\b{}\s*=\s*["']([^"']+)["']"#, regex::escape(attr));
    let re = Regex::new(&pattern).ok()?;
    re.captures(tag)
        .and_then(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
}

/// Content of the first `<meta {key_attr}="{key_value}" content="...">`.
pub(crate) fn find_meta_content(html: &str, key_attr: &str, key_value: &str) -> Option<String> {
    META_TAG_RE.find_iter(html).find_map(|m| {
        let tag = m.as_str();
        let key = extract_attr(tag, key_attr)?;
        if key.eq_ignore_ascii_case(key_value) {
            extract_attr(tag, "content")
                .map(|c| clean_text(&c))
                .filter(|c| !c.is_empty())
        } else {
            None
        }
    })
}

/// Parsed JSON-LD blocks; unparseable blocks are skipped.
pub(crate) fn json_ld_blocks(html: &str) -> Vec<Value> {
    JSON_LD_RE
        .captures_iter(html)
        .filter_map(|cap| {
            let raw = cap.get(1).map_or("", |m| m.as_str()).trim();
            if raw.is_empty() {
                return None;
            }
            serde_json::from_str::<Value>(raw).ok()
        })
        .collect()
}

/// Text of the first element carrying `itemprop="author"`.
pub(crate) fn itemprop_author(html: &str) -> Option<String> {
    ITEMPROP_AUTHOR_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| clean_text(m.as_str())))
        .find(|text| !text.is_empty())
}

/// An anchor's raw `href` and visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Anchor {
    pub href: String,
    pub text: String,
}

pub(crate) fn anchors(html: &str) -> Vec<Anchor> {
    ANCHOR_RE
        .captures_iter(html)
        .filter_map(|cap| {
            let attrs = cap.get(1)?.as_str();
            let href = extract_attr(attrs, "href")?;
            let text = cap.get(2).map(|m| clean_text(m.as_str())).unwrap_or_default();
            Some(Anchor {
                href: decode_entities(&href),
                text,
            })
        })
        .collect()
}

/// Resolves `href` against `base` and drops the fragment. Only `http(s)` results survive.
pub(crate) fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Host without a leading `www.`, lowercased.
pub(crate) fn registrable_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}
