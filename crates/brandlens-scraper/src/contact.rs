//! Contact records: building them from page signals, scoring and merging.

use std::collections::HashMap;

use brandlens_core::ExtractionMethod;
use serde::Serialize;

use crate::html::{find_meta_content, itemprop_author, json_ld_blocks};
use crate::jsonld;
use crate::patterns::{extract_emails, extract_phones, extract_socials, SocialLinks};

const ROLE_PATTERNS: &[&str] = &[
    "contact",
    "hello",
    "sales",
    "press",
    "media",
    "marketing",
    "team",
    "office",
    "enquiries",
    "inquiries",
    "partners",
    "billing",
    "careers",
    "jobs",
    "hr",
];

const FREE_PROVIDERS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "icloud.com",
    "me.com",
];

const PHONE_ONLY_CONFIDENCE: u8 = 40;
const IDENTITY_ONLY_CONFIDENCE: u8 = 30;

/// One contact harvested from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedContact {
    pub source_url: String,
    pub domain: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub author_name: Option<String>,
    pub company_name: Option<String>,
    pub extraction_method: ExtractionMethod,
    pub confidence: u8,
}

/// Everything pattern extraction found on one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSignals {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub socials: SocialLinks,
    pub author_name: Option<String>,
    pub company_name: Option<String>,
}

impl PageSignals {
    /// Runs every extraction pass over `html`.
    #[must_use]
    pub fn from_html(html: &str) -> Self {
        let blocks = json_ld_blocks(html);

        let author_name = blocks
            .iter()
            .find_map(jsonld::author_name)
            .or_else(|| find_meta_content(html, "name", "author"))
            .or_else(|| {
                find_meta_content(html, "property", "article:author")
                    .filter(|v| !v.starts_with("http"))
            })
            .or_else(|| itemprop_author(html));

        let company_name = blocks
            .iter()
            .find_map(jsonld::company_name)
            .or_else(|| find_meta_content(html, "property", "og:site_name"));

        Self {
            emails: extract_emails(html),
            phones: extract_phones(html),
            socials: extract_socials(html),
            author_name,
            company_name,
        }
    }
}

fn is_role_address(email: &str) -> bool {
    let local = email.split('@').next().unwrap_or_default();
    ROLE_PATTERNS
        .iter()
        .any(|role| local == *role || local.starts_with(&format!("{role}.")))
}

fn is_free_provider(email: &str) -> bool {
    email
        .rsplit_once('@')
        .is_some_and(|(_, domain)| FREE_PROVIDERS.contains(&domain))
}

/// Confidence for an email record.
///
/// Base 50; +20 with an author name; +10 with a company name; -20 for a
/// shared role inbox, otherwise +15; -5 for a free mail provider. Clamped to 0..=100.
#[must_use]
pub fn score_email(email: &str, has_author: bool, has_company: bool) -> u8 {
    let mut score: i32 = 50;
    if has_author {
        score += 20;
    }
    if has_company {
        score += 10;
    }
    score += if is_role_address(email) { -20 } else { 15 };
    if is_free_provider(email) {
        score -= 5;
    }
    u8::try_from(score.clamp(0, 100)).unwrap_or(0)
}

/// Turns one page's signals into contact records.
///
/// One record per email; without emails, one phone record; without either,
/// one identity record if an author or a social profile was found.
#[must_use]
pub fn build_contacts(
    signals: &PageSignals,
    source_url: &str,
    domain: &str,
    method: ExtractionMethod,
) -> Vec<ExtractedContact> {
    let template = ExtractedContact {
        source_url: source_url.to_string(),
        domain: domain.to_string(),
        email: None,
        phone: signals.phones.first().cloned(),
        linkedin_url: signals.socials.linkedin_url.clone(),
        twitter_url: signals.socials.twitter_url.clone(),
        facebook_url: signals.socials.facebook_url.clone(),
        instagram_url: signals.socials.instagram_url.clone(),
        author_name: signals.author_name.clone(),
        company_name: signals.company_name.clone(),
        extraction_method: method,
        confidence: 0,
    };

    if !signals.emails.is_empty() {
        return signals
            .emails
            .iter()
            .map(|email| ExtractedContact {
                email: Some(email.clone()),
                confidence: score_email(
                    email,
                    signals.author_name.is_some(),
                    signals.company_name.is_some(),
                ),
                ..template.clone()
            })
            .collect();
    }

    if template.phone.is_some() {
        return vec![ExtractedContact {
            confidence: PHONE_ONLY_CONFIDENCE,
            ..template
        }];
    }

    if signals.author_name.is_some() || !signals.socials.is_empty() {
        return vec![ExtractedContact {
            confidence: IDENTITY_ONLY_CONFIDENCE,
            ..template
        }];
    }

    Vec::new()
}

fn identity_key(contact: &ExtractedContact) -> Option<String> {
    fn non_empty(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|s| !s.is_empty())
    }

    if let Some(email) = non_empty(contact.email.as_deref()) {
        return Some(format!("email:{}", email.to_lowercase()));
    }
    if let Some(phone) = non_empty(contact.phone.as_deref()) {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        return Some(format!("phone:{digits}"));
    }
    if let Some(linkedin) = non_empty(contact.linkedin_url.as_deref()) {
        return Some(format!(
            "linkedin:{}",
            linkedin.trim_end_matches('/').to_lowercase()
        ));
    }
    non_empty(contact.author_name.as_deref()).map(|name| format!("author:{}", name.to_lowercase()))
}

fn merge_field(target: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming.as_deref().filter(|v| !v.trim().is_empty()) {
        *target = Some(value.to_string());
    }
}

/// Merges records that share an identity key (email, then phone, then
/// `LinkedIn` URL, then author name; case-insensitive).
///
/// Later non-empty fields override earlier ones, confidence keeps the maximum,
/// and the first record's position and extraction method are kept. Records
/// with no key pass through unchanged.
#[must_use]
pub fn dedupe_contacts(contacts: Vec<ExtractedContact>) -> Vec<ExtractedContact> {
    let mut merged: Vec<ExtractedContact> = Vec::with_capacity(contacts.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for contact in contacts {
        let Some(key) = identity_key(&contact) else {
            merged.push(contact);
            continue;
        };
        if let Some(&pos) = index.get(&key) {
            let existing = &mut merged[pos];
            merge_field(&mut existing.email, &contact.email);
            merge_field(&mut existing.phone, &contact.phone);
            merge_field(&mut existing.linkedin_url, &contact.linkedin_url);
            merge_field(&mut existing.twitter_url, &contact.twitter_url);
            merge_field(&mut existing.facebook_url, &contact.facebook_url);
            merge_field(&mut existing.instagram_url, &contact.instagram_url);
            merge_field(&mut existing.author_name, &contact.author_name);
            merge_field(&mut existing.company_name, &contact.company_name);
            existing.confidence = existing.confidence.max(contact.confidence);
        } else {
            index.insert(key, merged.len());
            merged.push(contact);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(email: Option<&str>, confidence: u8) -> ExtractedContact {
        ExtractedContact {
            source_url: "https://smallbiz.io/post".to_string(),
            domain: "smallbiz.io".to_string(),
            email: email.map(str::to_string),
            phone: None,
            linkedin_url: None,
            twitter_url: None,
            facebook_url: None,
            instagram_url: None,
            author_name: None,
            company_name: None,
            extraction_method: ExtractionMethod::Direct,
            confidence,
        }
    }

    #[test]
    fn scoring_follows_weights() {
        assert_eq!(score_email("jane.doe@smallbiz.io", true, true), 95);
        assert_eq!(score_email("jane.doe@smallbiz.io", false, false), 65);
        assert_eq!(score_email("press@smallbiz.io", false, false), 30);
        assert_eq!(score_email("jane.doe@gmail.com", false, false), 60);
        assert_eq!(score_email("hello@gmail.com", false, false), 25);
    }

    #[test]
    fn one_record_per_email_sharing_page_fields() {
        let signals = PageSignals {
            emails: vec!["jane@smallbiz.io".to_string(), "press@smallbiz.io".to_string()],
            phones: vec!["(415) 555-2671".to_string()],
            author_name: Some("Jane Doe".to_string()),
            ..PageSignals::default()
        };
        let records = build_contacts(&signals, "https://smallbiz.io/p", "smallbiz.io", ExtractionMethod::Direct);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.phone.as_deref() == Some("(415) 555-2671")));
        assert_eq!(records[0].confidence, 85);
        assert_eq!(records[1].confidence, 50);
    }

    #[test]
    fn phone_only_and_identity_only_records() {
        let phone_only = PageSignals {
            phones: vec!["+1 415 555 2671".to_string()],
            ..PageSignals::default()
        };
        let records = build_contacts(&phone_only, "u", "d", ExtractionMethod::ContactPage);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].confidence, 40);
        assert_eq!(records[0].extraction_method, ExtractionMethod::ContactPage);

        let identity = PageSignals {
            socials: SocialLinks {
                twitter_url: Some("https://x.com/janedoe".to_string()),
                ..SocialLinks::default()
            },
            ..PageSignals::default()
        };
        assert_eq!(build_contacts(&identity, "u", "d", ExtractionMethod::Direct)[0].confidence, 30);

        assert!(build_contacts(&PageSignals::default(), "u", "d", ExtractionMethod::Direct).is_empty());
    }

    #[test]
    fn dedupe_merges_same_email_keeping_max_confidence() {
        let mut first = contact(Some("Jane@SmallBiz.io"), 65);
        first.twitter_url = Some("https://x.com/old".to_string());
        let mut second = contact(Some("jane@smallbiz.io"), 95);
        second.author_name = Some("Jane Doe".to_string());
        second.twitter_url = Some("https://x.com/janedoe".to_string());
        second.extraction_method = ExtractionMethod::AuthorPage;

        let merged = dedupe_contacts(vec![first, second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence, 95);
        assert_eq!(merged[0].author_name.as_deref(), Some("Jane Doe"));
        assert_eq!(merged[0].twitter_url.as_deref(), Some("https://x.com/janedoe"));
        assert_eq!(merged[0].extraction_method, ExtractionMethod::Direct);
    }

    #[test]
    fn dedupe_falls_back_through_identity_keys() {
        let mut a = contact(None, 30);
        a.author_name = Some("Jane Doe".to_string());
        let mut b = contact(None, 30);
        b.author_name = Some("jane doe".to_string());
        b.company_name = Some("SmallBiz".to_string());
        let keyless = contact(None, 10);

        let merged = dedupe_contacts(vec![a, b, keyless.clone(), keyless]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].company_name.as_deref(), Some("SmallBiz"));
    }

    #[test]
    fn identity_key_skips_blank_fields() {
        let mut blank_email = contact(Some("   "), 40);
        blank_email.phone = Some("+1 (415) 555-2671".to_string());
        assert_eq!(identity_key(&blank_email).as_deref(), Some("phone:14155552671"));

        let mut linkedin = contact(None, 30);
        linkedin.linkedin_url = Some("https://LinkedIn.com/in/JaneDoe/".to_string());
        linkedin.author_name = Some("Jane Doe".to_string());
        assert_eq!(
            identity_key(&linkedin).as_deref(),
            Some("linkedin:https://linkedin.com/in/janedoe")
        );

        assert_eq!(identity_key(&contact(Some(""), 10)), None);
    }

    #[test]
    fn page_signals_prefer_json_ld_over_meta() {
        let html = r#"
            <head>
              <meta name="author" content="Meta Author">
              <meta property="og:site_name" content="SmallBiz Blog">
              <script type="application/ld+json">
                {"@type": "Article", "author": {"name": "Jane Doe"}}
              </script>
            </head>
            <body><p>Reach me at jane.doe@smallbiz.io</p></body>
        "#;
        let signals = PageSignals::from_html(html);
        assert_eq!(signals.author_name.as_deref(), Some("Jane Doe"));
        assert_eq!(signals.company_name.as_deref(), Some("SmallBiz Blog"));
        assert_eq!(signals.emails, vec!["jane.doe@smallbiz.io".to_string()]);
    }

    #[test]
    fn page_signals_fall_back_through_author_sources() {
        let meta = r#"<meta property="article:author" content="https://facebook.com/jane"><span itemprop="author">Jane Doe</span>"#;
        assert_eq!(PageSignals::from_html(meta).author_name.as_deref(), Some("Jane Doe"));
    }
}
