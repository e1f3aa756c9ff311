//! Answer text and citation extraction from a Responses API envelope.
//!
//! The envelope carries an `output` array of typed items. The answer lives in
//! the `message` item; sources come from its `url_citation` annotations and
//! from `web_search_call` actions.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static BARE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>()\[\]{}]+"#).expect("valid regex"));

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Insertion-ordered set of URLs.
#[derive(Default)]
struct UrlSet {
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl UrlSet {
    fn push(&mut self, raw: &str) {
        let url = raw.trim();
        if url.is_empty() {
            return;
        }
        if self.seen.insert(url.to_string()) {
            self.urls.push(url.to_string());
        }
    }

    fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

fn output_items(envelope: &Value) -> &[Value] {
    envelope
        .get("output")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

fn message_item(envelope: &Value) -> Option<&Value> {
    output_items(envelope)
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("message"))
}

fn first_content_block(item: &Value) -> Option<&Value> {
    item.get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first())
}

/// Returns the answer text of a Responses API envelope.
///
/// Reads the first content block of the `message` item. When that is missing,
/// falls back to the second `output` element (its first content block, or its
/// own `text` field), which covers shapes where the message item is untagged.
/// Returns an empty string when neither yields text.
#[must_use]
pub fn extract_answer_text(envelope: &Value) -> String {
    let primary = message_item(envelope)
        .and_then(first_content_block)
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str);

    if let Some(text) = primary {
        return text.to_string();
    }

    let fallback = output_items(envelope).get(1).and_then(|item| {
        first_content_block(item)
            .and_then(|block| block.get("text"))
            .or_else(|| item.get("text"))
            .and_then(Value::as_str)
    });

    fallback.unwrap_or_default().to_string()
}

/// Returns the de-duplicated source URLs of an envelope in first-seen order.
///
/// Sources, in priority order:
/// 1. `url_citation` annotations on the message's first content block;
/// 2. `action.sources[].url` of every `web_search_call` item;
/// 3. only when the first two found nothing, bare `http(s)` URLs in the answer text.
#[must_use]
pub fn extract_citations(envelope: &Value) -> Vec<String> {
    let mut set = UrlSet::default();

    let annotations = message_item(envelope)
        .and_then(first_content_block)
        .and_then(|block| block.get("annotations"))
        .and_then(Value::as_array);
    for annotation in annotations.into_iter().flatten() {
        if annotation.get("type").and_then(Value::as_str) != Some("url_citation") {
            continue;
        }
        if let Some(url) = annotation.get("url").and_then(Value::as_str) {
            set.push(url);
        }
    }

    for item in output_items(envelope) {
        if item.get("type").and_then(Value::as_str) != Some("web_search_call") {
            continue;
        }
        let sources = item
            .get("action")
            .and_then(|action| action.get("sources"))
            .and_then(Value::as_array);
        for source in sources.into_iter().flatten() {
            if let Some(url) = source.get("url").and_then(Value::as_str) {
                set.push(url);
            }
        }
    }

    if set.is_empty() {
        let text = extract_answer_text(envelope);
        for m in BARE_URL_RE.find_iter(&text) {
            set.push(m.as_str().trim_end_matches(TRAILING_PUNCTUATION));
        }
    }

    set.urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope() -> Value {
        json!({
            "id": "resp_1",
            "output": [
                {
                    "type": "web_search_call",
                    "action": {
                        "type": "search",
                        "sources": [
                            {"url": "https://b.example.net/review"},
                            {"url": " https://a.example.net/list "},
                            {"title": "no url"}
                        ]
                    }
                },
                {
                    "type": "message",
                    "content": [{
                        "type": "output_text",
                        "text": "1. Acme (https://a.example.net/list)",
                        "annotations": [
                            {"type": "url_citation", "url": "https://a.example.net/list"},
                            {"type": "file_citation", "url": "https://ignored.example.net"},
                            {"type": "url_citation", "url": ""}
                        ]
                    }]
                }
            ]
        })
    }

    #[test]
    fn answer_text_comes_from_message_item() {
        assert_eq!(
            extract_answer_text(&envelope()),
            "1. Acme (https://a.example.net/list)"
        );
    }

    #[test]
    fn answer_text_falls_back_to_second_element() {
        let untagged = json!({
            "output": [
                {"type": "web_search_call"},
                {"content": [{"text": "fallback answer"}]}
            ]
        });
        assert_eq!(extract_answer_text(&untagged), "fallback answer");

        let text_field = json!({"output": [{}, {"text": "bare text"}]});
        assert_eq!(extract_answer_text(&text_field), "bare text");
    }

    #[test]
    fn answer_text_is_empty_for_unexpected_shapes() {
        assert_eq!(extract_answer_text(&json!({"error": "boom"})), "");
        assert_eq!(extract_answer_text(&json!({"output": [{}]})), "");
    }

    #[test]
    fn citations_are_unique_and_ordered_annotations_first() {
        assert_eq!(
            extract_citations(&envelope()),
            vec![
                "https://a.example.net/list".to_string(),
                "https://b.example.net/review".to_string(),
            ]
        );
    }

    #[test]
    fn regex_fallback_only_when_structured_sources_are_empty() {
        let plain = json!({
            "output": [{
                "type": "message",
                "content": [{
                    "text": "See https://x.example.net/a, and \"https://y.example.net/b\". Also https://x.example.net/a!"
                }]
            }]
        });
        assert_eq!(
            extract_citations(&plain),
            vec![
                "https://x.example.net/a".to_string(),
                "https://y.example.net/b".to_string(),
            ]
        );
    }

    #[test]
    fn no_text_and_no_sources_yields_nothing() {
        assert!(extract_citations(&json!({"output": []})).is_empty());
    }
}
