//! LLM web-search client and the text heuristics layered on top of it:
//! mention inference, citation extraction and onboarding query suggestions.

pub mod citations;
pub mod client;
pub mod error;
pub mod mention;
pub mod prompts;
pub(crate) mod retry;

pub use citations::{extract_answer_text, extract_citations};
pub use client::{MentionOutcome, SearchClient, SEARCH_FAILED_EVIDENCE};
pub use error::SearchError;
pub use mention::{extract_evidence, infer_mention, mention_position, NO_MENTION_EVIDENCE};
pub use prompts::{fallback_queries, parse_query_lines};
