use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::courtlistener::{
    trailing_id, ApiError, Cluster, CourtListener, Docket, Person, SearchHit,
};
use crate::courts::CourtScope;
use crate::models::{
    CaseSummary, CitationResult, CitationStatus, PrecedentialValue, ToolError,
};
use crate::query::{
    build_problem_query, build_union_query, period_filed_after, validate_keywords, DateRange,
    SearchQuery,
};
use crate::ranking::{
    rank_cases, relevance_score, truncate_with_hint, FULL_TEXT_CAP, SNIPPET_CAP,
};
use crate::reference::{case_type_boosters, jurisdiction_for, legal_area_keywords};

pub const CASE_TYPES: &[&str] = &[
    "consumer",
    "warranty",
    "small_claims",
    "landlord_tenant",
    "contract",
    "debt_collection",
];

const MAX_KEYWORDS: usize = 10;
const MAX_LIMIT: usize = 20;
const MAX_OPINIONS_PER_CLUSTER: usize = 3;
const MAX_CITATIONS_PER_CALL: usize = 10;
const MAX_PROCEDURAL_SNIPPETS: usize = 5;
const OUTLIER_MAX_DURATION_DAYS: i64 = 3650;
const ANALYSIS_SAMPLE_SIZE: usize = 40;

pub const FULL_TEXT_HINT: &str = "get_case_details includeFullText=true";
const FULL_TEXT_CAP_HINT: &str = "opinion text capped at 5000 chars";

#[derive(Debug)]
pub struct ToolOutput {
    pub value: Value,
    pub partial: bool,
}

impl ToolOutput {
    pub fn ok(value: Value) -> Self {
        Self {
            value,
            partial: false,
        }
    }

    pub fn partial(value: Value) -> Self {
        Self {
            value,
            partial: true,
        }
    }
}

fn upstream_to_tool(err: ApiError) -> ToolError {
    match err {
        ApiError::NotFound(what) => {
            ToolError::not_found(format!("Upstream resource not found: {what}"))
                .with_suggestion("Verify the identifier; the search tools return valid case ids")
        }
        ApiError::RateLimited => ToolError::upstream("Case-law API rate limit exceeded")
            .with_suggestion(
                "Wait before retrying; set COURTLISTENER_API_TOKEN for a higher rate ceiling",
            ),
        ApiError::Status { status } => {
            ToolError::upstream(format!("Case-law API returned status {status}"))
        }
        ApiError::Network(err) => ToolError::upstream(format!("Case-law API request failed: {err}")),
    }
}

fn parse_numeric_id(raw: &str, field: &str) -> Result<i64, ToolError> {
    raw.trim().parse::<i64>().map_err(|_| {
        ToolError::invalid_input(format!("{field} must be a numeric identifier"))
            .with_suggestion("Pass the numeric id returned by the search tools")
            .with_context(json!({ "field": field, "value": raw }))
    })
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<(), ToolError> {
    if value < min || value > max {
        return Err(
            ToolError::invalid_input(format!("{name} must be between {min} and {max}"))
                .with_context(json!({ "field": name, "value": value })),
        );
    }
    Ok(())
}

fn check_case_type(case_type: &str) -> Result<(), ToolError> {
    if !CASE_TYPES.contains(&case_type) {
        return Err(
            ToolError::invalid_input(format!("Unknown caseType: {case_type}"))
                .with_suggestion(format!("Valid case types: {}", CASE_TYPES.join(", ")))
                .with_context(json!({ "field": "caseType", "value": case_type })),
        );
    }
    Ok(())
}

// Dates arrive as ISO-8601, sometimes with a time component; only the date
// part matters here.
fn parse_iso_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?;
    let date_part = raw.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn month_key(raw: Option<&str>) -> Option<String> {
    parse_iso_date(raw).map(|d| d.format("%Y-%m").to_string())
}

fn hit_court(hit: &SearchHit) -> String {
    hit.court_id
        .clone()
        .or_else(|| hit.court.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

fn case_summary_from_hit(hit: &SearchHit, keywords: &[String]) -> CaseSummary {
    let case_name = hit
        .case_name
        .clone()
        .unwrap_or_else(|| "Unknown case".to_string());
    let snippet_raw = hit.snippet.clone().unwrap_or_default();
    let citation_count = hit.cite_count.unwrap_or(0);
    CaseSummary {
        case_id: hit
            .cluster_id
            .or(hit.id)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        case_name: case_name.clone(),
        court: hit
            .court
            .clone()
            .or_else(|| hit.court_id.clone())
            .unwrap_or_default(),
        date_filed: hit.date_filed.clone(),
        citation_count,
        relevance_score: relevance_score(keywords, &case_name, &snippet_raw),
        snippet: truncate_with_hint(&snippet_raw, SNIPPET_CAP, FULL_TEXT_HINT),
        precedential_value: PrecedentialValue::from_citation_count(citation_count),
    }
}

fn split_judges(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split([',', ';'])
            .map(|j| j.trim().to_string())
            .filter(|j| !j.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// search_cases_by_problem

fn default_search_limit() -> usize {
    10
}

fn default_search_date_range() -> String {
    "recent-2years".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCasesParams {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub case_type: Option<String>,
    #[serde(default = "default_search_date_range")]
    pub date_range: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

impl SearchCasesParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_range("keywords", self.keywords.len(), 1, MAX_KEYWORDS)?;
        check_range("limit", self.limit, 1, MAX_LIMIT)?;
        if let Some(case_type) = &self.case_type {
            check_case_type(case_type)?;
        }
        Ok(())
    }
}

pub async fn search_cases_by_problem(
    client: &CourtListener,
    params: SearchCasesParams,
) -> Result<ToolOutput, ToolError> {
    let keywords = validate_keywords(&params.keywords)?;
    let range = DateRange::parse(&params.date_range);
    let query_string = build_problem_query(&keywords, params.case_type.as_deref());

    let query = SearchQuery::opinions(query_string.clone())
        .court_scope(CourtScope::Primary)
        .cited_gt(0)
        .date_range(range, Utc::now().date_naive())
        .page_size((params.limit * 2).min(ANALYSIS_SAMPLE_SIZE));

    let page = client.search(&query).await.map_err(|err| {
        upstream_to_tool(err).with_context(json!({
            "keywords": params.keywords,
            "dateRange": range.as_str(),
        }))
    })?;

    let mut cases: Vec<CaseSummary> = page
        .results
        .iter()
        .map(|hit| case_summary_from_hit(hit, &keywords))
        .collect();
    rank_cases(&mut cases, params.limit);

    Ok(ToolOutput::ok(json!({
        "query": query_string,
        "dateRange": range.as_str(),
        "caseType": params.case_type,
        "problemSummary": params.summary,
        "totalFound": page.count,
        "returned": cases.len(),
        "cases": cases,
    })))
}

// ---------------------------------------------------------------------------
// get_case_details

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDetailsParams {
    pub case_id: String,
    #[serde(default)]
    pub include_full_text: bool,
}

impl CaseDetailsParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.case_id.trim().is_empty() {
            return Err(ToolError::invalid_input("caseId must not be empty"));
        }
        Ok(())
    }
}

pub async fn get_case_details(
    client: &CourtListener,
    params: CaseDetailsParams,
) -> Result<ToolOutput, ToolError> {
    let id = parse_numeric_id(&params.case_id, "caseId")?;

    match client.cluster(id).await {
        Ok(cluster) => cluster_details(client, cluster, params.include_full_text).await,
        Err(ApiError::NotFound(_)) => {
            docket_fallback(client, id, params.include_full_text).await
        }
        Err(err) => Err(upstream_to_tool(err).with_context(json!({ "caseId": params.case_id }))),
    }
}

async fn cluster_details(
    client: &CourtListener,
    cluster: Cluster,
    include_full_text: bool,
) -> Result<ToolOutput, ToolError> {
    let (cap, hint) = if include_full_text {
        (FULL_TEXT_CAP, FULL_TEXT_CAP_HINT)
    } else {
        (SNIPPET_CAP, FULL_TEXT_HINT)
    };

    let mut opinions = Vec::new();
    let mut fetch_failures = 0usize;
    for url in cluster.sub_opinions.iter().take(MAX_OPINIONS_PER_CLUSTER) {
        let Some(opinion_id) = trailing_id(url) else {
            continue;
        };
        match client.opinion(opinion_id).await {
            Ok(opinion) => {
                let text = opinion.plain_text.unwrap_or_default();
                opinions.push(json!({
                    "opinionId": opinion.id,
                    "type": opinion.opinion_type,
                    "author": opinion.author_str,
                    "content": truncate_with_hint(&text, cap, hint),
                }));
            }
            Err(err) => {
                warn!(opinion_id, "opinion fetch failed: {err}");
                fetch_failures += 1;
            }
        }
    }

    let citation_count = cluster.citation_count.unwrap_or(0);
    let value = json!({
        "caseId": cluster.id.to_string(),
        "caseName": cluster.case_name,
        "court": cluster.court_id,
        "dateFiled": cluster.date_filed,
        "precedentialStatus": cluster.precedential_status,
        "judges": split_judges(cluster.judges.as_deref()),
        "citationCount": citation_count,
        "legalSignificance": PrecedentialValue::from_citation_count(citation_count),
        "opinions": opinions,
        "opinionFetchFailures": fetch_failures,
    });

    if fetch_failures > 0 {
        Ok(ToolOutput::partial(value))
    } else {
        Ok(ToolOutput::ok(value))
    }
}

fn docket_only_payload(docket: &Docket, note: &str) -> Value {
    json!({
        "caseId": docket.id.to_string(),
        "docketInfo": {
            "docketNumber": docket.docket_number,
            "caseName": docket.case_name,
            "court": docket.court_id,
            "dateFiled": docket.date_filed,
            "dateTerminated": docket.date_terminated,
        },
        "opinionsFound": false,
        "note": note,
    })
}

async fn docket_fallback(
    client: &CourtListener,
    id: i64,
    include_full_text: bool,
) -> Result<ToolOutput, ToolError> {
    match client.docket(id).await {
        Ok(docket) => {
            let Some(cluster_id) = docket.clusters.first().and_then(|url| trailing_id(url))
            else {
                return Ok(ToolOutput::partial(docket_only_payload(
                    &docket,
                    "No opinions found for this docket",
                )));
            };

            match client.cluster(cluster_id).await {
                Ok(cluster) => cluster_details(client, cluster, include_full_text).await,
                Err(err) => {
                    warn!(cluster_id, "linked cluster fetch failed: {err}");
                    Ok(ToolOutput::partial(docket_only_payload(
                        &docket,
                        "Linked opinion cluster could not be fetched",
                    )))
                }
            }
        }
        Err(ApiError::NotFound(_)) => Err(ToolError::not_found(format!(
            "No opinion cluster or docket matches id {id}"
        ))
        .with_suggestion("Use search_cases_by_problem to locate a valid case id")
        .with_context(json!({ "caseId": id.to_string() }))),
        Err(err) => Err(upstream_to_tool(err).with_context(json!({ "caseId": id.to_string() }))),
    }
}

// ---------------------------------------------------------------------------
// find_similar_precedents

fn default_similar_limit() -> usize {
    8
}

fn default_citation_threshold() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarPrecedentsParams {
    pub reference_case_id: String,
    #[serde(default)]
    pub legal_concepts: Vec<String>,
    #[serde(default = "default_citation_threshold")]
    pub citation_threshold: u64,
    #[serde(default = "default_similar_limit")]
    pub limit: usize,
}

impl SimilarPrecedentsParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_range("limit", self.limit, 1, MAX_LIMIT)?;
        check_range("legalConcepts", self.legal_concepts.len(), 0, MAX_KEYWORDS)?;
        if self.citation_threshold < 1 {
            return Err(ToolError::invalid_input("citationThreshold must be at least 1"));
        }
        Ok(())
    }
}

const CASE_NAME_STOPWORDS: &[&str] = &[
    "matter", "people", "state", "city", "county", "corp", "inc", "llc", "ltd", "company",
    "united", "states", "america", "board", "department",
];

// A few distinctive tokens from the case caption, party names mostly.
fn extract_case_name_terms(case_name: &str) -> Vec<String> {
    case_name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 3)
        .filter(|token| !CASE_NAME_STOPWORDS.contains(&token.to_lowercase().as_str()))
        .take(3)
        .map(|token| token.to_string())
        .collect()
}

pub async fn find_similar_precedents(
    client: &CourtListener,
    params: SimilarPrecedentsParams,
) -> Result<ToolOutput, ToolError> {
    let id = parse_numeric_id(&params.reference_case_id, "referenceCaseId")?;

    let cluster = client.cluster(id).await.map_err(|err| match err {
        ApiError::NotFound(_) => ToolError::not_found(format!("Reference case {id} not found"))
            .with_suggestion("Use search_cases_by_problem to locate a valid reference case")
            .with_context(json!({ "referenceCaseId": params.reference_case_id })),
        other => {
            upstream_to_tool(other).with_context(json!({
                "referenceCaseId": params.reference_case_id
            }))
        }
    })?;

    let case_name = cluster.case_name.clone().unwrap_or_default();
    let mut terms: Vec<String> = Vec::new();
    for concept in &params.legal_concepts {
        let trimmed = concept.trim();
        if !trimmed.is_empty()
            && trimmed.chars().count() <= 100
            && !terms.iter().any(|t| t.eq_ignore_ascii_case(trimmed))
        {
            terms.push(trimmed.to_string());
        }
    }
    for token in extract_case_name_terms(&case_name) {
        if !terms.iter().any(|t| t.eq_ignore_ascii_case(&token)) {
            terms.push(token);
        }
    }
    if terms.is_empty() && !case_name.is_empty() {
        terms.push(case_name.clone());
    }
    if terms.is_empty() {
        return Err(ToolError::invalid_input(
            "No search terms available: supply legalConcepts for an unnamed reference case",
        )
        .with_context(json!({ "referenceCaseId": params.reference_case_id })));
    }

    let query = SearchQuery::opinions(build_union_query(&terms))
        .court_scope(CourtScope::All)
        .cited_gt(params.citation_threshold - 1)
        .page_size((params.limit * 2).min(ANALYSIS_SAMPLE_SIZE));

    let page = client.search(&query).await.map_err(|err| {
        upstream_to_tool(err).with_context(json!({
            "referenceCaseId": params.reference_case_id,
            "searchTerms": terms,
        }))
    })?;

    let mut cases: Vec<CaseSummary> = page
        .results
        .iter()
        .filter(|hit| hit.cluster_id != Some(id) && hit.id != Some(id))
        .map(|hit| case_summary_from_hit(hit, &terms))
        .collect();
    rank_cases(&mut cases, params.limit);

    Ok(ToolOutput::ok(json!({
        "referenceCaseId": params.reference_case_id,
        "referenceCaseName": case_name,
        "searchTerms": terms,
        "citationThreshold": params.citation_threshold,
        "totalFound": page.count,
        "returned": cases.len(),
        "cases": cases,
    })))
}

// ---------------------------------------------------------------------------
// analyze_case_outcomes

fn default_court_level() -> String {
    "all".to_string()
}

fn default_outcomes_date_range() -> String {
    "last-2years".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOutcomesParams {
    pub case_type: String,
    #[serde(default = "default_court_level")]
    pub court_level: String,
    #[serde(default = "default_outcomes_date_range")]
    pub date_range: String,
}

impl AnalyzeOutcomesParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_case_type(&self.case_type)?;
        if !matches!(self.court_level.as_str(), "trial" | "appellate" | "all") {
            return Err(
                ToolError::invalid_input(format!("Unknown courtLevel: {}", self.court_level))
                    .with_suggestion("Valid court levels: trial, appellate, all"),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct OutcomeStats {
    pub terminated: usize,
    pub ongoing: usize,
    pub by_court: BTreeMap<String, usize>,
    pub average_duration_days: Option<i64>,
}

impl OutcomeStats {
    pub fn closure_rate_percent(&self) -> f64 {
        let total = self.terminated + self.ongoing;
        if total == 0 {
            return 0.0;
        }
        let rate = self.terminated as f64 * 100.0 / total as f64;
        (rate * 10.0).round() / 10.0
    }
}

// Durations outside (0, 3650] days are treated as data errors and excluded
// from the average.
pub(crate) fn outcome_stats(hits: &[SearchHit]) -> OutcomeStats {
    let mut stats = OutcomeStats::default();
    let mut durations: Vec<i64> = Vec::new();

    for hit in hits {
        *stats.by_court.entry(hit_court(hit)).or_default() += 1;
        if hit.date_terminated.is_some() {
            stats.terminated += 1;
        } else {
            stats.ongoing += 1;
        }

        if let (Some(filed), Some(terminated)) = (
            parse_iso_date(hit.date_filed.as_deref()),
            parse_iso_date(hit.date_terminated.as_deref()),
        ) {
            let days = (terminated - filed).num_days();
            if days > 0 && days <= OUTLIER_MAX_DURATION_DAYS {
                durations.push(days);
            }
        }
    }

    if !durations.is_empty() {
        stats.average_duration_days =
            Some(durations.iter().sum::<i64>() / durations.len() as i64);
    }
    stats
}

pub async fn analyze_case_outcomes(
    client: &CourtListener,
    params: AnalyzeOutcomesParams,
) -> Result<ToolOutput, ToolError> {
    let scope = CourtScope::from_level(&params.court_level);
    let range = DateRange::parse(&params.date_range);

    let boosters = case_type_boosters(&params.case_type);
    let terms: Vec<String> = if boosters.is_empty() {
        vec![params.case_type.replace('_', " ")]
    } else {
        boosters.iter().map(|t| (*t).to_string()).collect()
    };

    let query = SearchQuery::dockets(build_union_query(&terms))
        .court_scope(scope)
        .date_range(range, Utc::now().date_naive())
        .page_size(ANALYSIS_SAMPLE_SIZE);

    let page = client.search(&query).await.map_err(|err| {
        upstream_to_tool(err).with_context(json!({
            "caseType": params.case_type,
            "courtLevel": params.court_level,
        }))
    })?;

    let stats = outcome_stats(&page.results);

    Ok(ToolOutput::ok(json!({
        "caseType": params.case_type,
        "courtLevel": params.court_level,
        "dateRange": range.as_str(),
        "totalFound": page.count,
        "sampled": page.results.len(),
        "terminatedCases": stats.terminated,
        "ongoingCases": stats.ongoing,
        "closureRatePercent": stats.closure_rate_percent(),
        "averageDurationDays": stats.average_duration_days,
        "byCourt": stats.by_court,
    })))
}

// ---------------------------------------------------------------------------
// get_judge_analysis

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeAnalysisParams {
    pub judge_name: String,
    pub case_type: String,
    #[serde(default)]
    pub court: Option<String>,
}

impl JudgeAnalysisParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        let trimmed = self.judge_name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > 100 {
            return Err(ToolError::invalid_input(
                "judgeName must be a non-empty string of at most 100 characters",
            ));
        }
        check_case_type(&self.case_type)
    }
}

const HONORIFICS: &[&str] = &["hon", "hon.", "honorable", "judge", "justice"];

fn normalize_judge_query(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .filter(|token| !HONORIFICS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

// First substring match wins; ambiguous names are not disambiguated.
pub(crate) fn resolve_judge<'a>(candidates: &'a [Person], query: &str) -> Option<&'a Person> {
    candidates.iter().find(|person| {
        let full = person.full_name().to_lowercase();
        let last = person
            .name_last
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        full.contains(query) || (!last.is_empty() && query.contains(&last))
    })
}

pub(crate) fn judge_opinion_stats(
    hits: &[SearchHit],
) -> (BTreeMap<String, usize>, BTreeMap<String, usize>) {
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_court: BTreeMap<String, usize> = BTreeMap::new();
    for hit in hits {
        let opinion_type = hit
            .opinion_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        *by_type.entry(opinion_type).or_default() += 1;
        *by_court.entry(hit_court(hit)).or_default() += 1;
    }
    (by_type, by_court)
}

pub async fn get_judge_analysis(
    client: &CourtListener,
    params: JudgeAnalysisParams,
) -> Result<ToolOutput, ToolError> {
    let needle = normalize_judge_query(&params.judge_name);
    if needle.is_empty() {
        return Err(ToolError::invalid_input(
            "judgeName contains no searchable name after removing honorifics",
        ));
    }

    let last_token = needle
        .rsplit(' ')
        .next()
        .unwrap_or(needle.as_str())
        .to_string();

    let people = client.people_by_last_name(&last_token).await.map_err(|err| {
        upstream_to_tool(err).with_context(json!({ "judgeName": params.judge_name }))
    })?;

    let Some(judge) = resolve_judge(&people.results, &needle) else {
        return Err(
            ToolError::not_found(format!("No judge matching \"{}\"", params.judge_name))
                .with_suggestion("Provide the judge's surname as it appears in published opinions")
                .with_context(json!({
                    "judgeName": params.judge_name,
                    "candidatesConsidered": people.results.len(),
                })),
        );
    };

    let boosters = case_type_boosters(&params.case_type);
    let terms: Vec<String> = if boosters.is_empty() {
        vec![params.case_type.replace('_', " ")]
    } else {
        boosters.iter().map(|t| (*t).to_string()).collect()
    };

    let mut query = SearchQuery::opinions(build_union_query(&terms))
        .judge(&judge.full_name())
        .page_size(ANALYSIS_SAMPLE_SIZE);
    if let Some(court) = &params.court {
        query = query.court(court);
    }

    let page = client.search(&query).await.map_err(|err| {
        upstream_to_tool(err).with_context(json!({
            "judgeName": params.judge_name,
            "caseType": params.case_type,
        }))
    })?;

    let (by_type, by_court) = judge_opinion_stats(&page.results);

    Ok(ToolOutput::ok(json!({
        "judgeName": params.judge_name,
        "matchedJudge": {
            "id": judge.id,
            "name": judge.full_name(),
        },
        "candidatesConsidered": people.results.len(),
        "caseType": params.case_type,
        "court": params.court,
        "totalOpinions": page.count,
        "sampled": page.results.len(),
        "byOpinionType": by_type,
        "byCourt": by_court,
    })))
}

// ---------------------------------------------------------------------------
// validate_citations

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCitationsParams {
    pub citations: Vec<String>,
    #[serde(default)]
    pub context_text: Option<String>,
}

impl ValidateCitationsParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.citations.is_empty() {
            return Err(ToolError::invalid_input("citations must not be empty")
                .with_suggestion("Pass one or more citation strings, e.g. \"34 N.Y.3d 482\""));
        }
        if let Some(context) = &self.context_text {
            if context.chars().count() > 5_000 {
                return Err(ToolError::invalid_input(
                    "contextText must be at most 5000 characters",
                ));
            }
        }
        Ok(())
    }
}

// At most the first ten citations are processed; the rest are counted, not
// silently dropped.
pub(crate) fn citation_batch(citations: &[String]) -> (Vec<String>, usize) {
    let processed: Vec<String> = citations
        .iter()
        .take(MAX_CITATIONS_PER_CALL)
        .cloned()
        .collect();
    let skipped = citations.len().saturating_sub(MAX_CITATIONS_PER_CALL);
    (processed, skipped)
}

fn citation_case_ref(hit: &SearchHit) -> Value {
    json!({
        "caseId": hit.cluster_id.or(hit.id).map(|v| v.to_string()),
        "caseName": hit.case_name,
    })
}

pub async fn validate_citations(
    client: &CourtListener,
    params: ValidateCitationsParams,
) -> Result<ToolOutput, ToolError> {
    let (batch, skipped) = citation_batch(&params.citations);
    let mut results: Vec<CitationResult> = Vec::with_capacity(batch.len());
    let mut had_errors = false;

    for citation in &batch {
        let trimmed = citation.trim();
        if trimmed.is_empty() {
            results.push(CitationResult {
                input_citation: citation.clone(),
                status: CitationStatus::Error,
                matched_case: None,
                related_cases: Vec::new(),
                detail: Some("Empty citation string".to_string()),
            });
            had_errors = true;
            continue;
        }

        let query = SearchQuery::opinions(format!("\"{trimmed}\"")).page_size(3);
        match client.search(&query).await {
            Ok(page) if page.results.is_empty() => results.push(CitationResult {
                input_citation: citation.clone(),
                status: CitationStatus::NotFound,
                matched_case: None,
                related_cases: Vec::new(),
                detail: None,
            }),
            Ok(page) => {
                let matched = &page.results[0];
                let related: Vec<Value> = page
                    .results
                    .iter()
                    .skip(1)
                    .take(2)
                    .map(citation_case_ref)
                    .collect();
                results.push(CitationResult {
                    input_citation: citation.clone(),
                    status: CitationStatus::Valid,
                    matched_case: Some(json!({
                        "caseId": matched.cluster_id.or(matched.id).map(|v| v.to_string()),
                        "caseName": matched.case_name,
                        "court": matched.court,
                        "dateFiled": matched.date_filed,
                        "citationCount": matched.cite_count.unwrap_or(0),
                    })),
                    related_cases: related,
                    detail: None,
                });
            }
            // One failing citation must not abort the rest of the batch.
            Err(err) => {
                warn!(citation = trimmed, "citation lookup failed: {err}");
                results.push(CitationResult {
                    input_citation: citation.clone(),
                    status: CitationStatus::Error,
                    matched_case: None,
                    related_cases: Vec::new(),
                    detail: Some(err.to_string()),
                });
                had_errors = true;
            }
        }
    }

    let note = (skipped > 0).then(|| {
        format!("{skipped} citations beyond the first {MAX_CITATIONS_PER_CALL} were not processed")
    });

    let value = json!({
        "results": results,
        "processed": batch.len(),
        "skipped": skipped,
        "note": note,
    });

    if had_errors {
        Ok(ToolOutput::partial(value))
    } else {
        Ok(ToolOutput::ok(value))
    }
}

// ---------------------------------------------------------------------------
// get_procedural_requirements

fn default_procedural_court() -> String {
    "ny-civ-ct".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProceduralRequirementsParams {
    pub case_type: String,
    #[serde(default = "default_procedural_court")]
    pub court: String,
    #[serde(default)]
    pub claim_amount: Option<f64>,
}

impl ProceduralRequirementsParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        check_case_type(&self.case_type)?;
        if let Some(amount) = self.claim_amount {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(ToolError::invalid_input(
                    "claimAmount must be a positive number",
                ));
            }
        }
        Ok(())
    }
}

pub async fn get_procedural_requirements(
    client: &CourtListener,
    params: ProceduralRequirementsParams,
) -> Result<ToolOutput, ToolError> {
    let entry = jurisdiction_for(&params.court);
    let within_jurisdiction = params
        .claim_amount
        .map(|amount| amount <= entry.monetary_ceiling as f64);

    let mut terms: Vec<String> = case_type_boosters(&params.case_type)
        .iter()
        .map(|t| (*t).to_string())
        .collect();
    if terms.is_empty() {
        terms.push(params.case_type.replace('_', " "));
    }
    terms.push("filing procedure".to_string());

    let query = SearchQuery::opinions(build_union_query(&terms))
        .court_scope(CourtScope::Primary)
        .page_size(MAX_PROCEDURAL_SNIPPETS);

    let jurisdiction = json!({
        "courtId": entry.court_id,
        "courtName": entry.court_name,
        "monetaryCeiling": entry.monetary_ceiling,
        "filingFeeEstimate": entry.filing_fee,
    });

    // The static jurisdiction data is always worth returning; a search
    // failure degrades the answer instead of failing it.
    match client.search(&query).await {
        Ok(page) => {
            let snippets: Vec<Value> = page
                .results
                .iter()
                .take(MAX_PROCEDURAL_SNIPPETS)
                .map(|hit| {
                    json!({
                        "caseName": hit.case_name,
                        "dateFiled": hit.date_filed,
                        "snippet": truncate_with_hint(
                            hit.snippet.as_deref().unwrap_or_default(),
                            SNIPPET_CAP,
                            FULL_TEXT_HINT,
                        ),
                    })
                })
                .collect();

            Ok(ToolOutput::ok(json!({
                "caseType": params.case_type,
                "jurisdiction": jurisdiction,
                "claimAmount": params.claim_amount,
                "withinJurisdiction": within_jurisdiction,
                "proceduralCases": snippets,
            })))
        }
        Err(err) => {
            warn!("procedural case lookup failed: {err}");
            Ok(ToolOutput::partial(json!({
                "caseType": params.case_type,
                "jurisdiction": jurisdiction,
                "claimAmount": params.claim_amount,
                "withinJurisdiction": within_jurisdiction,
                "proceduralCases": [],
                "note": "Case-law lookup unavailable; returning static jurisdiction data only",
            })))
        }
    }
}

// ---------------------------------------------------------------------------
// track_legal_trends

fn default_time_period() -> String {
    "last-year".to_string()
}

fn default_trend_type() -> String {
    "outcomes".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackTrendsParams {
    pub legal_area: String,
    #[serde(default = "default_time_period")]
    pub time_period: String,
    #[serde(default = "default_trend_type")]
    pub trend_type: String,
}

impl TrackTrendsParams {
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.legal_area.trim().is_empty() {
            return Err(ToolError::invalid_input("legalArea must not be empty"));
        }
        if !matches!(self.trend_type.as_str(), "outcomes" | "new-precedents") {
            return Err(
                ToolError::invalid_input(format!("Unknown trendType: {}", self.trend_type))
                    .with_suggestion("Valid trend types: outcomes, new-precedents"),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct TrendStats {
    pub total: usize,
    pub terminated: usize,
    pub by_court: BTreeMap<String, usize>,
    pub by_court_terminated: BTreeMap<String, usize>,
    pub by_month: BTreeMap<String, usize>,
}

pub(crate) fn trend_stats(hits: &[SearchHit]) -> TrendStats {
    let mut stats = TrendStats::default();
    for hit in hits {
        stats.total += 1;
        let court = hit_court(hit);
        *stats.by_court.entry(court.clone()).or_default() += 1;
        if hit.date_terminated.is_some() {
            stats.terminated += 1;
            *stats.by_court_terminated.entry(court).or_default() += 1;
        }
        if let Some(month) = month_key(hit.date_filed.as_deref()) {
            *stats.by_month.entry(month).or_default() += 1;
        }
    }
    stats
}

// Templated summaries over the computed aggregates; nothing here is
// free-form generation.
pub(crate) fn trend_observations(stats: &TrendStats, trend_type: &str) -> Vec<String> {
    let mut observations = Vec::new();

    if let Some((court, count)) = stats.by_court.iter().max_by_key(|(_, count)| **count) {
        observations.push(format!(
            "Most activity in {court} ({count} of {} sampled matters)",
            stats.total
        ));
    }

    if let Some((month, count)) = stats.by_month.iter().max_by_key(|(_, count)| **count) {
        observations.push(format!("Filing volume peaked in {month} with {count} filings"));
    }

    if trend_type == "outcomes" && stats.total > 0 {
        let rate = (stats.terminated as f64 * 1000.0 / stats.total as f64).round() / 10.0;
        observations.push(format!(
            "{rate}% of sampled matters reached a recorded termination"
        ));

        let rates: Vec<(&String, f64)> = stats
            .by_court
            .iter()
            .filter(|(_, total)| **total >= 3)
            .map(|(court, total)| {
                let terminated = stats.by_court_terminated.get(court).copied().unwrap_or(0);
                (court, terminated as f64 / *total as f64)
            })
            .collect();
        if rates.len() >= 2 {
            let mut sorted = rates.clone();
            sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            if let (Some((slowest, low)), Some((fastest, high))) =
                (sorted.first(), sorted.last())
            {
                observations.push(format!(
                    "Resolution rates range from {:.0}% ({slowest}) to {:.0}% ({fastest})",
                    low * 100.0,
                    high * 100.0
                ));
            }
        }
    } else if trend_type == "new-precedents" {
        observations.push(format!(
            "{} recently filed opinions matched the area keywords",
            stats.total
        ));
    }

    observations
}

pub async fn track_legal_trends(
    client: &CourtListener,
    params: TrackTrendsParams,
) -> Result<ToolOutput, ToolError> {
    let expansions = legal_area_keywords(&params.legal_area);
    let terms: Vec<String> = if expansions.is_empty() {
        vec![params.legal_area.replace('_', " ")]
    } else {
        expansions.iter().map(|t| (*t).to_string()).collect()
    };

    let query_string = build_union_query(&terms);
    let base = if params.trend_type == "new-precedents" {
        SearchQuery::opinions(query_string)
    } else {
        SearchQuery::dockets(query_string)
    };
    let mut query = base
        .court_scope(CourtScope::All)
        .page_size(ANALYSIS_SAMPLE_SIZE);

    if let Some(after) = period_filed_after(&params.time_period, Utc::now().date_naive()) {
        query = query.filed_after(after);
    }

    let page = client.search(&query).await.map_err(|err| {
        upstream_to_tool(err).with_context(json!({
            "legalArea": params.legal_area,
            "timePeriod": params.time_period,
            "trendType": params.trend_type,
        }))
    })?;

    let stats = trend_stats(&page.results);
    let observations = trend_observations(&stats, &params.trend_type);

    Ok(ToolOutput::ok(json!({
        "legalArea": params.legal_area,
        "timePeriod": params.time_period,
        "trendType": params.trend_type,
        "keywordsUsed": terms,
        "totalFound": page.count,
        "sampled": stats.total,
        "byCourt": stats.by_court,
        "byMonth": stats.by_month,
        "observations": observations,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docket_hit(
        court: &str,
        filed: Option<&str>,
        terminated: Option<&str>,
    ) -> SearchHit {
        SearchHit {
            court_id: Some(court.to_string()),
            date_filed: filed.map(str::to_string),
            date_terminated: terminated.map(str::to_string),
            ..SearchHit::default()
        }
    }

    #[test]
    fn outcome_stats_matches_termination_scenario() {
        // Five dockets, three terminated: 3 closed / 2 ongoing, 60% rate.
        let hits = vec![
            docket_hit("ny-civ-ct", Some("2024-01-10"), Some("2024-06-10")),
            docket_hit("ny-civ-ct", Some("2024-02-01"), Some("2024-03-01")),
            docket_hit("ny-dist-ct-nassau", Some("2024-02-15"), Some("2024-08-15")),
            docket_hit("ny-civ-ct", Some("2024-05-05"), None),
            docket_hit("ny-dist-ct-nassau", Some("2024-07-20"), None),
        ];
        let stats = outcome_stats(&hits);
        assert_eq!(stats.terminated, 3);
        assert_eq!(stats.ongoing, 2);
        assert_eq!(stats.closure_rate_percent(), 60.0);
        assert_eq!(stats.by_court.get("ny-civ-ct"), Some(&3));
    }

    #[test]
    fn outcome_durations_exclude_outliers() {
        let hits = vec![
            // 100 days, kept.
            docket_hit("ny-civ-ct", Some("2024-01-01"), Some("2024-04-10")),
            // Negative duration, dropped.
            docket_hit("ny-civ-ct", Some("2024-06-01"), Some("2024-01-01")),
            // Over ten years, dropped.
            docket_hit("ny-civ-ct", Some("2010-01-01"), Some("2024-01-01")),
        ];
        let stats = outcome_stats(&hits);
        assert_eq!(stats.average_duration_days, Some(100));
    }

    #[test]
    fn citation_batch_caps_at_ten() {
        let citations: Vec<String> = (0..12).map(|i| format!("{i} N.Y.3d 100")).collect();
        let (processed, skipped) = citation_batch(&citations);
        assert_eq!(processed.len(), 10);
        assert_eq!(skipped, 2);
        assert_eq!(processed[0], "0 N.Y.3d 100");
        assert_eq!(processed[9], "9 N.Y.3d 100");
    }

    #[test]
    fn case_name_terms_skip_short_and_stopword_tokens() {
        let terms = extract_case_name_terms("Smith v. Acme Industries Inc.");
        assert_eq!(terms, vec!["Smith", "Acme", "Industries"]);
    }

    #[test]
    fn judge_resolution_is_first_substring_match() {
        let candidates = vec![
            Person {
                id: 1,
                name_first: Some("Aaron".into()),
                name_last: Some("Smithfield".into()),
            },
            Person {
                id: 2,
                name_first: Some("Jane".into()),
                name_last: Some("Smith".into()),
            },
        ];
        // "smith" is a substring of "Aaron Smithfield": first match wins,
        // the known single-match limitation.
        let matched = resolve_judge(&candidates, "smith").expect("match");
        assert_eq!(matched.id, 1);

        assert!(resolve_judge(&candidates, "jones").is_none());
    }

    #[test]
    fn judge_query_strips_honorifics() {
        assert_eq!(normalize_judge_query("Hon. Jane Smith"), "jane smith");
        assert_eq!(normalize_judge_query("JUSTICE Smith"), "smith");
    }

    #[test]
    fn trend_observations_are_templated_over_aggregates() {
        let hits = vec![
            docket_hit("ny-civ-ct", Some("2026-01-05"), Some("2026-03-01")),
            docket_hit("ny-civ-ct", Some("2026-01-20"), Some("2026-04-01")),
            docket_hit("ny-civ-ct", Some("2026-02-11"), Some("2026-05-01")),
            docket_hit("ny-civ-ct", Some("2026-02-20"), Some("2026-05-12")),
            docket_hit("ny-dist-ct-nassau", Some("2026-01-02"), None),
            docket_hit("ny-dist-ct-nassau", Some("2026-03-09"), None),
            docket_hit("ny-dist-ct-nassau", Some("2026-03-15"), Some("2026-06-20")),
        ];
        let stats = trend_stats(&hits);
        assert_eq!(stats.by_month.get("2026-01"), Some(&3));

        let observations = trend_observations(&stats, "outcomes");
        assert!(observations
            .iter()
            .any(|o| o.contains("Most activity in ny-civ-ct")));
        assert!(observations
            .iter()
            .any(|o| o.contains("peaked in 2026-01 with 3 filings")));
        assert!(observations
            .iter()
            .any(|o| o.contains("Resolution rates range from 33% (ny-dist-ct-nassau) to 100% (ny-civ-ct)")));
    }

    #[test]
    fn docket_without_clusters_yields_explicit_no_opinions_payload() {
        let docket = Docket {
            id: 4242,
            case_name: Some("Roe v. Example Motors".to_string()),
            court_id: Some("ny-civ-ct".to_string()),
            date_filed: Some("2025-02-03".to_string()),
            date_terminated: None,
            docket_number: Some("CV-004242-25".to_string()),
            clusters: Vec::new(),
        };
        let payload = docket_only_payload(&docket, "No opinions found for this docket");
        assert_eq!(payload["opinionsFound"], false);
        assert_eq!(payload["docketInfo"]["docketNumber"], "CV-004242-25");
        assert_eq!(payload["note"], "No opinions found for this docket");
    }

    #[test]
    fn summaries_score_against_raw_snippet_before_truncation() {
        let keyword = "habitability".to_string();
        let long_snippet = format!("{} {}", "x".repeat(SNIPPET_CAP), keyword);
        let hit = SearchHit {
            id: Some(77),
            case_name: Some("Doe v. Landlord LLC".to_string()),
            snippet: Some(long_snippet),
            cite_count: Some(12),
            ..SearchHit::default()
        };
        let summary = case_summary_from_hit(&hit, &[keyword]);
        assert_eq!(summary.relevance_score, 1);
        assert_eq!(summary.precedential_value, PrecedentialValue::Strong);
        assert!(crate::ranking::is_truncated(&summary.snippet));
    }
}
