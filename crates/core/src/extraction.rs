//! CRM reference extraction from captured automation output.
//!
//! Matchers are tried in priority order. Within one matcher every hit is
//! considered in text order, and the first candidate that passes the
//! structural check wins. A later matcher is only consulted when no candidate
//! of an earlier one is valid, so priority beats position in the text.
//!
//! Every hit is checked, not only the first, so a malformed early hit such as
//! a lowercase `gtbcrm111111` does not hide a well-formed reference later in
//! the same output.

use std::sync::OnceLock;

use regex::Regex;

pub const DEBUG_EXCERPT_CHARS: usize = 500;
pub const PREVIEW_CHARS: usize = 300;
const MIN_REFERENCE_LEN: usize = 8;

#[derive(Debug)]
pub struct ReferenceMatcher {
    pub name: &'static str,
    pattern: Regex,
    capture_group: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceMatch {
    pub token: String,
    pub matcher: &'static str,
}

impl ReferenceMatcher {
    fn new(name: &'static str, pattern: &str, capture_group: usize) -> Self {
        let pattern = Regex::new(&format!("(?i){pattern}"))
            .unwrap_or_else(|error| panic!("reference pattern `{name}` is invalid: {error}"));
        Self { name, pattern, capture_group }
    }

    fn candidates<'t>(&'t self, text: &'t str) -> impl Iterator<Item = &'t str> + 't {
        self.pattern
            .captures_iter(text)
            .filter_map(move |captures| captures.get(self.capture_group))
            .map(|hit| hit.as_str().trim())
    }
}

/// Matchers in priority order.
pub fn reference_matchers() -> &'static [ReferenceMatcher] {
    static MATCHERS: OnceLock<Vec<ReferenceMatcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        vec![
            ReferenceMatcher::new("gtb_crm", r"GTBCRM[0-9]{6,}", 0),
            ReferenceMatcher::new("bank_crm", r"[A-Z]{3,}CRM[0-9]{6,}", 0),
            ReferenceMatcher::new("quoted", r#"["']([A-Z0-9]{8,})["']"#, 1),
        ]
    })
}

pub fn is_structurally_valid(candidate: &str) -> bool {
    candidate.len() >= MIN_REFERENCE_LEN
        && candidate.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
}

pub fn extract_reference(text: &str) -> Option<ReferenceMatch> {
    reference_matchers().iter().find_map(|matcher| {
        matcher.candidates(text).find(|candidate| is_structurally_valid(candidate)).map(
            |token| ReferenceMatch { token: token.to_string(), matcher: matcher.name },
        )
    })
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

pub fn debug_excerpt(text: &str) -> String {
    truncate_chars(text, DEBUG_EXCERPT_CHARS).to_string()
}

pub fn preview(text: &str) -> String {
    truncate_chars(text, PREVIEW_CHARS).to_string()
}

#[cfg(test)]
mod tests {
    use super::{debug_excerpt, extract_reference, is_structurally_valid, truncate_chars};

    #[test]
    fn finds_gtb_reference_in_sentence() {
        let found = extract_reference(
            "The CRM Ref for the customer with ID '1' is 'GTBCRM123456'. Done.",
        )
        .expect("reference");

        assert_eq!(found.token, "GTBCRM123456");
        assert_eq!(found.matcher, "gtb_crm");
    }

    #[test]
    fn pattern_priority_beats_position_in_text() {
        let found = extract_reference("quoted 'ABCD1234EF' appears before ACMECRM7654321")
            .expect("reference");

        assert_eq!(found.token, "ACMECRM7654321");
        assert_eq!(found.matcher, "bank_crm");
    }

    #[test]
    fn lowercase_hits_are_skipped_in_favour_of_later_valid_ones() {
        let found = extract_reference("gtbcrm111111 then GTBCRM222222").expect("reference");
        assert_eq!(found.token, "GTBCRM222222");
    }

    #[test]
    fn falls_back_to_quoted_token() {
        let found = extract_reference(r#"result: "REF98765432""#).expect("reference");
        assert_eq!(found.token, "REF98765432");
        assert_eq!(found.matcher, "quoted");
    }

    #[test]
    fn lowercase_or_short_tokens_are_rejected() {
        assert_eq!(extract_reference("ref is 'gtbcrm123456' or 'ABC123' or gtbcrm999999"), None);
        assert_eq!(extract_reference("GTBCRM12345 has too few digits"), None);
        assert_eq!(extract_reference(""), None);
    }

    #[test]
    fn structural_check_requires_uppercase_alphanumerics() {
        assert!(is_structurally_valid("GTBCRM230115001"));
        assert!(!is_structurally_valid("GTB-CRM12"));
        assert!(!is_structurally_valid("Gtbcrm230115001"));
        assert!(!is_structurally_valid("ABC1234"));
    }

    #[test]
    fn debug_excerpt_is_capped_on_char_boundary() {
        let text = "é".repeat(700);
        let excerpt = debug_excerpt(&text);

        assert_eq!(excerpt.chars().count(), 500);
        assert_eq!(truncate_chars("short", 500), "short");
    }
}
