//! Fetches pages and turns them into contact records.

use std::sync::LazyLock;
use std::time::Duration;

use brandlens_core::ExtractionMethod;
use regex::Regex;
use reqwest::{Client, Url};

use crate::contact::{build_contacts, dedupe_contacts, ExtractedContact, PageSignals};
use crate::error::ScraperError;
use crate::html::{anchors, registrable_host, resolve_url};

/// User agent sent with every page fetch unless configured otherwise.
pub const DEFAULT_CONTACT_USER_AGENT: &str = "BrandLens-ContactBot/1.0 (+https://brandlens.app/bot)";

static CONTACT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(contact|about)").expect("valid regex"));
static AUTHOR_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(author|writer)").expect("valid regex"));

/// Page fetcher and contact extractor.
///
/// Extraction never fails: unreachable pages, non-2xx responses and invalid
/// URLs all yield an empty list.
#[derive(Clone)]
pub struct ContactExtractor {
    client: Client,
}

impl ContactExtractor {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &Url) -> Result<String, ScraperError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    /// Extracts contacts from `url` plus at most one contact/about page and
    /// one author page linked from it on the same host.
    ///
    /// Records from linked pages keep `url` as their `source_url`.
    pub async fn extract_contacts(&self, url: &str) -> Vec<ExtractedContact> {
        let page_url = match parse_page_url(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(url, error = %e, "skipping contact extraction");
                return Vec::new();
            }
        };
        let Some(domain) = registrable_host(&page_url) else {
            return Vec::new();
        };

        let html = match self.fetch(&page_url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url, error = %e, "contact page fetch failed");
                return Vec::new();
            }
        };

        let signals = PageSignals::from_html(&html);
        let mut contacts = build_contacts(&signals, url, &domain, ExtractionMethod::Direct);

        for (link, method) in secondary_links(&page_url, &html) {
            match self.fetch(&link).await {
                Ok(linked_html) => {
                    let linked = PageSignals::from_html(&linked_html);
                    contacts.extend(build_contacts(&linked, url, &domain, method));
                }
                Err(e) => {
                    tracing::debug!(url = %link, error = %e, "secondary page fetch failed");
                }
            }
        }

        let contacts = dedupe_contacts(contacts);
        tracing::info!(url, count = contacts.len(), "contacts extracted");
        contacts
    }

    /// Runs [`Self::extract_contacts`] over `urls` one at a time, sleeping
    /// `delay` between pages.
    pub async fn extract_batch(&self, urls: &[String], delay: Duration) -> Vec<ExtractedContact> {
        let mut all = Vec::new();
        for (i, url) in urls.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            all.extend(self.extract_contacts(url).await);
        }
        all
    }
}

fn parse_page_url(url: &str) -> Result<Url, ScraperError> {
    let parsed = Url::parse(url.trim()).map_err(|e| ScraperError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScraperError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }
    Ok(parsed)
}

/// First same-host contact/about link and first same-host author/writer link.
fn secondary_links(page_url: &Url, html: &str) -> Vec<(Url, ExtractionMethod)> {
    let host = page_url.host_str().map(str::to_lowercase);
    let mut contact_link: Option<Url> = None;
    let mut author_link: Option<Url> = None;

    for anchor in anchors(html) {
        if contact_link.is_some() && author_link.is_some() {
            break;
        }
        let Some(resolved) = resolve_url(page_url, &anchor.href) else {
            continue;
        };
        if resolved.host_str().map(str::to_lowercase) != host || resolved == *page_url {
            continue;
        }
        let haystack = format!("{} {}", anchor.text, anchor.href);
        // "About the author" matches both patterns; it is an author page.
        if AUTHOR_LINK_RE.is_match(&haystack) {
            if author_link.is_none() {
                author_link = Some(resolved);
            }
        } else if contact_link.is_none() && CONTACT_LINK_RE.is_match(&haystack) {
            contact_link = Some(resolved);
        }
    }

    let mut links = Vec::new();
    if let Some(link) = contact_link {
        links.push((link, ExtractionMethod::ContactPage));
    }
    if let Some(link) = author_link {
        if !links.iter().any(|(existing, _)| *existing == link) {
            links.push((link, ExtractionMethod::AuthorPage));
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_links_pick_first_of_each_kind_on_same_host() {
        let page = Url::parse("https://smallbiz.io/blog/post").unwrap();
        let html = r#"
            <a href="https://other.com/contact">Contact them</a>
            <a href="/contact-us">Get in touch</a>
            <a href="/about">About</a>
            <a href="/team/jane" rel="author">Jane Doe</a>
            <a href="/authors/jane">More by the author</a>
        "#;
        let links = secondary_links(&page, html);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].0.as_str(), "https://smallbiz.io/contact-us");
        assert_eq!(links[0].1, ExtractionMethod::ContactPage);
        assert_eq!(links[1].0.as_str(), "https://smallbiz.io/authors/jane");
        assert_eq!(links[1].1, ExtractionMethod::AuthorPage);
    }

    #[test]
    fn about_the_author_is_an_author_page() {
        let page = Url::parse("https://smallbiz.io/blog/post").unwrap();
        let html = r#"
            <a href="/people/jane">About the author</a>
            <a href="/contact">Contact</a>
        "#;
        let links = secondary_links(&page, html);
        assert_eq!(
            links,
            vec![
                (
                    Url::parse("https://smallbiz.io/contact").unwrap(),
                    ExtractionMethod::ContactPage
                ),
                (
                    Url::parse("https://smallbiz.io/people/jane").unwrap(),
                    ExtractionMethod::AuthorPage
                ),
            ]
        );
    }

    #[test]
    fn self_links_are_not_followed() {
        let page = Url::parse("https://smallbiz.io/about").unwrap();
        let links = secondary_links(&page, r##"<a href="/about#team">About us</a>"##);
        assert!(links.is_empty());
    }

    #[test]
    fn page_url_must_be_http() {
        assert!(parse_page_url("ftp://smallbiz.io/x").is_err());
        assert!(parse_page_url("not a url").is_err());
        assert!(parse_page_url(" https://smallbiz.io/x ").is_ok());
    }
}
