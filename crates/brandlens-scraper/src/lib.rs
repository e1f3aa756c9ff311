//! Contact extraction from the web pages cited in search answers.
//!
//! [`ContactExtractor`] fetches a page, pattern-matches emails, phones,
//! social profiles and author/company names, follows one "contact" and one
//! "author" link on the same host, and returns scored, de-duplicated records.

pub mod contact;
pub mod error;
pub mod extractor;
pub(crate) mod html;
pub mod jsonld;
pub mod patterns;

pub use contact::{build_contacts, dedupe_contacts, score_email, ExtractedContact, PageSignals};
pub use error::ScraperError;
pub use extractor::{ContactExtractor, DEFAULT_CONTACT_USER_AGENT};
pub use patterns::{is_valid_email, is_valid_phone};
