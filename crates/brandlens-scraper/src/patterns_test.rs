use super::*;

#[test]
fn email_validation_rejects_roles_and_placeholders() {
    assert!(!is_valid_email("support@example.com"));
    assert!(!is_valid_email("test@test.com"));
    assert!(!is_valid_email("noreply@smallbiz.io"));
    assert!(!is_valid_email("hello@mail.example.org"));
    assert!(!is_valid_email("12ab@o123.ingest.sentry.io"));
}

#[test]
fn email_validation_accepts_real_addresses() {
    assert!(is_valid_email("jane.doe@smallbiz.io"));
    assert!(is_valid_email("  Jane.Doe@SmallBiz.io "));
    assert!(is_valid_email("press@acme.co.uk"));
}

#[test]
fn email_validation_rejects_malformed_and_asset_names() {
    assert!(!is_valid_email("jane.doe@"));
    assert!(!is_valid_email("jane doe@smallbiz.io"));
    assert!(!is_valid_email("logo@2x.png"));
    assert!(!is_valid_email("hero@3x.webp"));
}

#[test]
fn phone_validation_counts_digits() {
    assert!(!is_valid_phone("12345"));
    assert!(is_valid_phone("+1 (415) 555-2671"));
    assert!(is_valid_phone("415.555.2671"));
    assert!(!is_valid_phone("+1 415 555 2671 ext 9"));
    assert!(!is_valid_phone("1234567890123456"));
}

#[test]
fn emails_from_text_and_mailto_are_deduplicated() {
    let html = r#"
        <p>Write to Jane.Doe@SmallBiz.io or <a href="mailto:jane.doe@smallbiz.io?subject=hi">email</a>.</p>
        <a href="mailto:sales&#64;smallbiz.io">Sales</a>
        <img src="/img/logo@2x.png">
        <footer>support@smallbiz.io</footer>
    "#;
    assert_eq!(
        extract_emails(html),
        vec!["jane.doe@smallbiz.io".to_string(), "sales@smallbiz.io".to_string()]
    );
}

#[test]
fn overlapping_phone_patterns_yield_one_number() {
    let html = r#"<p>Call +1 (415) 555-2671 today.</p><a href="tel:+14155552671">Call</a>"#;
    assert_eq!(extract_phones(html), vec!["+1 (415) 555-2671".to_string()]);
}

#[test]
fn national_format_phone_is_found() {
    let html = "<p>Office: (212) 555-0199</p>";
    assert_eq!(extract_phones(html), vec!["(212) 555-0199".to_string()]);
}

#[test]
fn socials_skip_share_links() {
    let html = r#"
        <a href="https://twitter.com/intent/tweet?url=x">Share</a>
        <a href="https://x.com/janedoe">X</a>
        <a href="https://www.facebook.com/sharer.php?u=x">Share</a>
        <a href="https://www.facebook.com/smallbiz">FB</a>
        <a href="https://www.instagram.com/p/abc123">Post</a>
        <a href="https://www.instagram.com/smallbiz/">IG</a>
        <a href="https://www.linkedin.com/in/jane-doe-42/">LinkedIn</a>
        <a href="https://www.linkedin.com/company/smallbiz">Company</a>
    "#;
    let socials = extract_socials(html);
    assert_eq!(socials.twitter_url.as_deref(), Some("https://x.com/janedoe"));
    assert_eq!(socials.facebook_url.as_deref(), Some("https://www.facebook.com/smallbiz"));
    assert_eq!(socials.instagram_url.as_deref(), Some("https://www.instagram.com/smallbiz/"));
    assert_eq!(
        socials.linkedin_url.as_deref(),
        Some("https://www.linkedin.com/in/jane-doe-42/")
    );
}

#[test]
fn no_socials_is_empty() {
    assert!(extract_socials("<p>nothing here</p>").is_empty());
}
