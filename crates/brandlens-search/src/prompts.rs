//! Onboarding query suggestions: the model prompt, response parsing and the
//! deterministic templates used when the model is unavailable.

use std::collections::HashSet;

const FALLBACK_TEMPLATES: &[&str] = &[
    "best {industry} brands",
    "{brand} alternatives",
    "top {industry} tools in {year}",
    "{brand} vs competitors",
    "is {brand} worth it",
    "most recommended {industry} companies",
    "{brand} reviews",
    "affordable {industry} options",
    "which {industry} brand should I choose",
    "{industry} buying guide {year}",
];

/// Builds the instruction sent to the model for query suggestions.
#[must_use]
pub fn onboarding_prompt(brand: &str, industry: &str, count: usize) -> String {
    format!(
        "You help a company measure how visible its brand is in AI search answers.\n\
         Brand: {brand}\n\
         Industry: {industry}\n\
         Write {count} distinct search queries a potential buyer in this industry might \
         type into an AI assistant, where a good answer could recommend {brand} or its \
         competitors. Do not include the brand name in more than a third of them.\n\
         Return one query per line with no numbering, quotes or commentary."
    )
}

/// Parses one query per line, stripping list markers and wrapping quotes.
///
/// Blank lines and case-insensitive duplicates are dropped; order is kept.
#[must_use]
pub fn parse_query_lines(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_lowercase()))
        .collect()
}

fn clean_line(line: &str) -> String {
    let mut rest = line.trim();

    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let after = &rest[digits..];
        if let Some(stripped) = after.strip_prefix('.').or_else(|| after.strip_prefix(')')) {
            rest = stripped;
        }
    } else if let Some(stripped) = rest
        .strip_prefix('-')
        .or_else(|| rest.strip_prefix('*'))
        .or_else(|| rest.strip_prefix('•'))
    {
        rest = stripped;
    }

    rest.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '`'))
        .trim()
        .to_string()
}

/// Deterministic suggestions built from templates, used when the model call fails.
#[must_use]
pub fn fallback_queries(brand: &str, industry: &str, count: usize, year: i32) -> Vec<String> {
    let industry = if industry.trim().is_empty() {
        "software"
    } else {
        industry.trim()
    };
    FALLBACK_TEMPLATES
        .iter()
        .take(count)
        .map(|template| {
            template
                .replace("{brand}", brand.trim())
                .replace("{industry}", industry)
                .replace("{year}", &year.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_bulleted_and_quoted_lines() {
        let text = "1. best CRM for startups\n2) \"cheap CRM\"\n- CRM with email sync\n\n* Best CRM for startups\n";
        assert_eq!(
            parse_query_lines(text),
            vec![
                "best CRM for startups".to_string(),
                "cheap CRM".to_string(),
                "CRM with email sync".to_string(),
            ]
        );
    }

    #[test]
    fn leading_numbers_that_are_part_of_the_query_survive() {
        assert_eq!(parse_query_lines("3D printers for schools"), vec!["3D printers for schools"]);
    }

    #[test]
    fn fallback_fills_templates_and_respects_count() {
        let queries = fallback_queries("Acme", "anvil", 3, 2026);
        assert_eq!(
            queries,
            vec![
                "best anvil brands".to_string(),
                "Acme alternatives".to_string(),
                "top anvil tools in 2026".to_string(),
            ]
        );
    }

    #[test]
    fn fallback_defaults_blank_industry() {
        assert_eq!(fallback_queries("Acme", " ", 1, 2026), vec!["best software brands"]);
    }

    #[test]
    fn prompt_names_brand_and_count() {
        let prompt = onboarding_prompt("Acme", "anvils", 5);
        assert!(prompt.contains("Brand: Acme"));
        assert!(prompt.contains("Write 5 distinct"));
    }
}
