use std::cmp::Ordering;

use crate::models::CaseSummary;

// Default text caps per call site.
pub const SNIPPET_CAP: usize = 500;
pub const FULL_TEXT_CAP: usize = 5_000;

const TRUNCATION_PREFIX: &str = "[truncated:";

// Keyword-hit relevance: number of supplied keywords found case-insensitively
// anywhere in the case name or snippet.
pub fn relevance_score(keywords: &[String], case_name: &str, snippet: &str) -> u32 {
    let haystack = format!("{} {}", case_name, snippet).to_lowercase();
    keywords
        .iter()
        .filter(|kw| {
            let needle = kw.to_lowercase();
            !needle.is_empty() && haystack.contains(&needle)
        })
        .count() as u32
}

fn compare_cases(a: &CaseSummary, b: &CaseSummary) -> Ordering {
    b.relevance_score
        .cmp(&a.relevance_score)
        .then(b.citation_count.cmp(&a.citation_count))
}

// Stable composite ordering: relevance desc, then citation count desc.
// Ties beyond that keep upstream order so results are reproducible.
pub fn rank_cases(cases: &mut Vec<CaseSummary>, limit: usize) {
    cases.sort_by(compare_cases);
    cases.truncate(limit);
}

// Cut `text` at `cap` characters and append a machine-readable marker naming
// how to retrieve the untruncated content. A truncated field always carries
// the marker; a naturally short field never does.
pub fn truncate_with_hint(text: &str, cap: usize, retrieval_hint: &str) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    let head: String = text.chars().take(cap).collect();
    format!("{head} {TRUNCATION_PREFIX} {retrieval_hint}]")
}

pub fn is_truncated(text: &str) -> bool {
    text.rfind(TRUNCATION_PREFIX)
        .map(|pos| text[pos..].ends_with(']'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrecedentialValue;

    fn summary(name: &str, score: u32, citations: u64) -> CaseSummary {
        CaseSummary {
            case_id: name.to_string(),
            case_name: name.to_string(),
            court: "ny-civ-ct".to_string(),
            date_filed: None,
            citation_count: citations,
            snippet: String::new(),
            relevance_score: score,
            precedential_value: PrecedentialValue::from_citation_count(citations),
        }
    }

    #[test]
    fn relevance_counts_case_insensitive_hits() {
        let keywords = vec!["Warranty".to_string(), "defective product".to_string()];
        let score = relevance_score(
            &keywords,
            "Smith v. Acme Corp",
            "claim for breach of warranty over a defective product",
        );
        assert_eq!(score, 2);
    }

    #[test]
    fn ranking_orders_by_score_then_citations() {
        let mut cases = vec![
            summary("a", 1, 50),
            summary("b", 3, 0),
            summary("c", 3, 12),
            summary("d", 2, 1),
        ];
        rank_cases(&mut cases, 3);
        let ids: Vec<&str> = cases.iter().map(|c| c.case_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "d"]);
    }

    #[test]
    fn ranking_is_stable_on_full_ties() {
        let mut cases = vec![summary("first", 2, 5), summary("second", 2, 5)];
        rank_cases(&mut cases, 10);
        assert_eq!(cases[0].case_id, "first");
        assert_eq!(cases[1].case_id, "second");
    }

    #[test]
    fn truncation_marks_long_fields_only() {
        let long = "x".repeat(600);
        let cut = truncate_with_hint(&long, SNIPPET_CAP, "get_case_details includeFullText=true");
        assert!(is_truncated(&cut));
        assert!(cut.starts_with(&"x".repeat(SNIPPET_CAP)));

        let short = truncate_with_hint("short text", SNIPPET_CAP, "irrelevant");
        assert_eq!(short, "short text");
        assert!(!is_truncated(&short));
    }
}
