use std::collections::BTreeMap;

use chrono::{Months, NaiveDate};
use serde_json::json;

use crate::courts::CourtScope;
use crate::models::ToolError;
use crate::reference::case_type_boosters;

pub const MAX_QUERY_KEYWORDS: usize = 5;
pub const MAX_KEYWORD_CHARS: usize = 100;

const CONSUMER_CONTEXT_CLAUSE: &str = "(consumer OR \"consumer protection\")";

// Minimal projections per search pass; full opinion text is never requested
// during a search.
pub const OPINION_SEARCH_FIELDS: &[&str] = &[
    "id",
    "caseName",
    "court",
    "court_id",
    "dateFiled",
    "citeCount",
    "snippet",
    "cluster_id",
];

pub const DOCKET_SEARCH_FIELDS: &[&str] = &[
    "id",
    "caseName",
    "court",
    "court_id",
    "dateFiled",
    "dateTerminated",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Opinion,
    Docket,
}

impl ResultType {
    fn discriminator(&self) -> &'static str {
        match self {
            Self::Opinion => "o",
            Self::Docket => "r",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    RecentTwoYears,
    EstablishedPrecedent,
    AllTime,
}

impl DateRange {
    // Unrecognized values deliberately fall through to no filter; a bad
    // date-range string must not fail the request.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "recent-2years" | "recent" | "last-2years" => Self::RecentTwoYears,
            "established-precedent" | "established" => Self::EstablishedPrecedent,
            _ => Self::AllTime,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecentTwoYears => "recent-2years",
            Self::EstablishedPrecedent => "established-precedent",
            Self::AllTime => "all-time",
        }
    }

    // The established window excludes both very recent and very old filings.
    pub fn bounds(&self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self {
            Self::RecentTwoYears => (today.checked_sub_months(Months::new(24)), None),
            Self::EstablishedPrecedent => (
                today.checked_sub_months(Months::new(120)),
                today.checked_sub_months(Months::new(60)),
            ),
            Self::AllTime => (None, None),
        }
    }
}

// Trend periods are simple look-back windows, distinct from the search
// date-range policy.
pub fn period_filed_after(period: &str, today: NaiveDate) -> Option<NaiveDate> {
    let months = match period {
        "last-6months" => 6,
        "last-year" => 12,
        "last-2years" => 24,
        _ => return None,
    };
    today.checked_sub_months(Months::new(months))
}

// Trimmed, non-empty, bounded-length keywords. Fails before any network call
// when nothing survives.
pub fn validate_keywords(raw: &[String]) -> Result<Vec<String>, ToolError> {
    let valid: Vec<String> = raw
        .iter()
        .map(|kw| kw.trim().to_string())
        .filter(|kw| !kw.is_empty() && kw.chars().count() <= MAX_KEYWORD_CHARS)
        .collect();

    if valid.is_empty() {
        return Err(ToolError::invalid_input(
            "No usable keywords: each keyword must be non-empty and at most 100 characters",
        )
        .with_suggestion("Supply 1-10 short legal phrases, e.g. \"breach of warranty\"")
        .with_context(json!({ "suppliedKeywords": raw })));
    }
    Ok(valid)
}

fn quoted(term: &str) -> String {
    format!("\"{}\"", term)
}

// Plain quoted OR-union of up to five terms, no contextual boost.
pub fn build_union_query(terms: &[String]) -> String {
    let union = terms
        .iter()
        .take(MAX_QUERY_KEYWORDS)
        .map(|t| quoted(t))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({union})")
}

// Keyword union strategy: up to five quoted phrases OR-joined, case-type
// boosters folded in after the supplied terms, and the consumer-context
// clause conjoined unless a supplied keyword already signals it. The clause
// is a recall heuristic, not a correctness guarantee.
pub fn build_problem_query(keywords: &[String], case_type: Option<&str>) -> String {
    let mut terms: Vec<String> = Vec::new();
    for kw in keywords {
        if !terms.iter().any(|t| t.eq_ignore_ascii_case(kw)) {
            terms.push(kw.clone());
        }
    }
    if let Some(case_type) = case_type {
        for booster in case_type_boosters(case_type) {
            if !terms.iter().any(|t| t.eq_ignore_ascii_case(booster)) {
                terms.push((*booster).to_string());
            }
        }
    }
    terms.truncate(MAX_QUERY_KEYWORDS);

    let union = build_union_query(&terms);

    let has_consumer_signal = keywords
        .iter()
        .any(|kw| kw.to_lowercase().contains("consumer"));

    if has_consumer_signal {
        union
    } else {
        format!("{union} AND {CONSUMER_CONTEXT_CLAUSE}")
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub result_type: ResultType,
    pub filters: BTreeMap<&'static str, String>,
    pub fields: &'static [&'static str],
    pub page_size: usize,
}

impl SearchQuery {
    pub fn opinions(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            result_type: ResultType::Opinion,
            filters: BTreeMap::new(),
            fields: OPINION_SEARCH_FIELDS,
            page_size: 20,
        }
    }

    pub fn dockets(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            result_type: ResultType::Docket,
            filters: BTreeMap::new(),
            fields: DOCKET_SEARCH_FIELDS,
            page_size: 20,
        }
    }

    pub fn court_scope(mut self, scope: CourtScope) -> Self {
        self.filters.insert("court", scope.filter_value());
        self
    }

    pub fn cited_gt(mut self, floor: u64) -> Self {
        self.filters.insert("cited_gt", floor.to_string());
        self
    }

    pub fn court(mut self, court_id: &str) -> Self {
        self.filters.insert("court", court_id.to_string());
        self
    }

    pub fn judge(mut self, name: &str) -> Self {
        self.filters.insert("judge", name.to_string());
        self
    }

    pub fn date_range(mut self, range: DateRange, today: NaiveDate) -> Self {
        let (after, before) = range.bounds(today);
        if let Some(after) = after {
            self.filters
                .insert("filed_after", after.format("%Y-%m-%d").to_string());
        }
        if let Some(before) = before {
            self.filters
                .insert("filed_before", before.format("%Y-%m-%d").to_string());
        }
        self
    }

    pub fn filed_after(mut self, date: NaiveDate) -> Self {
        self.filters
            .insert("filed_after", date.format("%Y-%m-%d").to_string());
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.clamp(1, 40);
        self
    }

    // Deterministic parameter list for the upstream search call; BTreeMap
    // filters keep ordering reproducible across runs.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", self.query.clone()),
            ("type", self.result_type.discriminator().to_string()),
            ("order_by", "score desc".to_string()),
            ("page_size", self.page_size.to_string()),
            ("fields", self.fields.join(",")),
        ];
        for (key, value) in &self.filters {
            params.push((key, value.clone()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_keyword_lists_with_no_usable_entry() {
        let raw = vec!["   ".to_string(), "x".repeat(101)];
        let err = validate_keywords(&raw).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn keeps_trimmed_valid_keywords() {
        let raw = vec!["  breach of warranty  ".to_string(), "".to_string()];
        let valid = validate_keywords(&raw).unwrap();
        assert_eq!(valid, vec!["breach of warranty".to_string()]);
    }

    #[test]
    fn warranty_scenario_query_shape() {
        let keywords = vec![
            "breach of warranty".to_string(),
            "defective product".to_string(),
        ];
        let query = build_problem_query(&keywords, Some("warranty"));
        assert!(query.contains("\"breach of warranty\" OR \"defective product\""));
        assert!(query.ends_with("AND (consumer OR \"consumer protection\")"));
    }

    #[test]
    fn consumer_signal_skips_context_clause() {
        let keywords = vec!["consumer fraud".to_string()];
        let query = build_problem_query(&keywords, None);
        assert_eq!(query, "(\"consumer fraud\")");
    }

    #[test]
    fn query_terms_cap_at_five() {
        let keywords: Vec<String> = (0..8).map(|i| format!("term{i}")).collect();
        let query = build_problem_query(&keywords, None);
        assert_eq!(query.matches(" OR ").count(), MAX_QUERY_KEYWORDS - 1);
        assert!(!query.contains("term5"));
    }

    #[test]
    fn recent_range_is_exactly_two_years_back() {
        let (after, before) = DateRange::RecentTwoYears.bounds(date(2026, 8, 7));
        assert_eq!(after, Some(date(2024, 8, 7)));
        assert_eq!(before, None);
    }

    #[test]
    fn established_range_excludes_old_and_recent() {
        let (after, before) = DateRange::EstablishedPrecedent.bounds(date(2026, 8, 7));
        assert_eq!(after, Some(date(2016, 8, 7)));
        assert_eq!(before, Some(date(2021, 8, 7)));
    }

    #[test]
    fn unrecognized_range_means_no_filter() {
        assert_eq!(DateRange::parse("whenever"), DateRange::AllTime);
        assert_eq!(DateRange::AllTime.bounds(date(2026, 1, 1)), (None, None));
    }

    #[test]
    fn params_include_projection_and_filters() {
        let query = SearchQuery::opinions("(\"lemon law\")")
            .court_scope(crate::courts::CourtScope::Primary)
            .cited_gt(0)
            .page_size(16);
        let params = query.to_params();
        assert!(params.contains(&("type", "o".to_string())));
        assert!(params.contains(&("cited_gt", "0".to_string())));
        assert!(params
            .iter()
            .any(|(k, v)| *k == "fields" && v.contains("citeCount")));
        assert!(params.contains(&("page_size", "16".to_string())));
    }

    #[test]
    fn trend_periods_map_to_lookback_windows() {
        let today = date(2026, 8, 7);
        assert_eq!(
            period_filed_after("last-year", today),
            Some(date(2025, 8, 7))
        );
        assert_eq!(period_filed_after("since-forever", today), None);
    }
}
