use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::courtlistener::CourtListener;
use crate::models::ToolError;
use crate::rate_limit::RateLimitHeaders;
use crate::tools::{self, ToolOutput, CASE_TYPES};
use crate::AppState;

pub const MCP_SCHEMA_VERSION: &str = "caselaw.mcp.schema.v1";
const SERVER_NAME: &str = "caselaw-research-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const TOOL_NAMES: &[&str] = &[
    "search_cases_by_problem",
    "get_case_details",
    "find_similar_precedents",
    "analyze_case_outcomes",
    "get_judge_analysis",
    "validate_citations",
    "get_procedural_requirements",
    "track_legal_trends",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonRpcRequest {
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRpcSuccess {
    jsonrpc: &'static str,
    id: Value,
    result: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRpcFailure {
    jsonrpc: &'static str,
    id: Value,
    error: JsonRpcError,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRpcError {
    code: i64,
    message: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

// Closed dispatch: every tool is a typed variant, so an invocation is either
// deserialized into exactly one parameter shape or rejected up front.
#[derive(Debug, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    SearchCasesByProblem(tools::SearchCasesParams),
    GetCaseDetails(tools::CaseDetailsParams),
    FindSimilarPrecedents(tools::SimilarPrecedentsParams),
    AnalyzeCaseOutcomes(tools::AnalyzeOutcomesParams),
    GetJudgeAnalysis(tools::JudgeAnalysisParams),
    ValidateCitations(tools::ValidateCitationsParams),
    GetProceduralRequirements(tools::ProceduralRequirementsParams),
    TrackLegalTrends(tools::TrackTrendsParams),
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchCasesByProblem(_) => "search_cases_by_problem",
            Self::GetCaseDetails(_) => "get_case_details",
            Self::FindSimilarPrecedents(_) => "find_similar_precedents",
            Self::AnalyzeCaseOutcomes(_) => "analyze_case_outcomes",
            Self::GetJudgeAnalysis(_) => "get_judge_analysis",
            Self::ValidateCitations(_) => "validate_citations",
            Self::GetProceduralRequirements(_) => "get_procedural_requirements",
            Self::TrackLegalTrends(_) => "track_legal_trends",
        }
    }

    pub fn validate(&self) -> Result<(), ToolError> {
        match self {
            Self::SearchCasesByProblem(p) => p.validate(),
            Self::GetCaseDetails(p) => p.validate(),
            Self::FindSimilarPrecedents(p) => p.validate(),
            Self::AnalyzeCaseOutcomes(p) => p.validate(),
            Self::GetJudgeAnalysis(p) => p.validate(),
            Self::ValidateCitations(p) => p.validate(),
            Self::GetProceduralRequirements(p) => p.validate(),
            Self::TrackLegalTrends(p) => p.validate(),
        }
    }

    pub async fn dispatch(self, client: &CourtListener) -> Result<ToolOutput, ToolError> {
        match self {
            Self::SearchCasesByProblem(p) => tools::search_cases_by_problem(client, p).await,
            Self::GetCaseDetails(p) => tools::get_case_details(client, p).await,
            Self::FindSimilarPrecedents(p) => tools::find_similar_precedents(client, p).await,
            Self::AnalyzeCaseOutcomes(p) => tools::analyze_case_outcomes(client, p).await,
            Self::GetJudgeAnalysis(p) => tools::get_judge_analysis(client, p).await,
            Self::ValidateCitations(p) => tools::validate_citations(client, p).await,
            Self::GetProceduralRequirements(p) => {
                tools::get_procedural_requirements(client, p).await
            }
            Self::TrackLegalTrends(p) => tools::track_legal_trends(client, p).await,
        }
    }
}

pub async fn mcp(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let request_id = request.id.clone().unwrap_or(Value::Null);

    if request.jsonrpc != "2.0" {
        return jsonrpc_error(
            request_id,
            -32600,
            "jsonrpc must be 2.0",
            json!({"code": "INVALID_REQUEST"}),
            StatusCode::BAD_REQUEST,
            None,
        );
    }

    let rate = state.rate_limiter.check().await;
    if !rate.allowed {
        return jsonrpc_error(
            request_id,
            -32029,
            "Rate limit exceeded",
            json!({"code": "RATE_LIMITED", "retryAfterSeconds": rate.headers.reset_seconds}),
            StatusCode::TOO_MANY_REQUESTS,
            Some(rate.headers),
        );
    }

    match request.method.as_str() {
        "ping" => jsonrpc_ok(
            request_id,
            json!({"schemaVersion": MCP_SCHEMA_VERSION, "ok": true}),
            Some(rate.headers),
        ),
        "initialize" => jsonrpc_ok(
            request_id,
            json!({
                "schemaVersion": MCP_SCHEMA_VERSION,
                "server": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION,
                },
                "capabilities": {
                    "tools": true,
                    "streaming": false,
                },
            }),
            Some(rate.headers),
        ),
        "tools/list" => jsonrpc_ok(
            request_id,
            json!({
                "schemaVersion": MCP_SCHEMA_VERSION,
                "tools": tool_definitions(),
            }),
            Some(rate.headers),
        ),
        "tools/call" => {
            let params = match request
                .params
                .as_ref()
                .and_then(|value| serde_json::from_value::<ToolCallParams>(value.clone()).ok())
            {
                Some(params) => params,
                None => {
                    return jsonrpc_error(
                        request_id,
                        -32602,
                        "Invalid tool call parameters",
                        json!({"code": "INVALID_ARGUMENT"}),
                        StatusCode::BAD_REQUEST,
                        Some(rate.headers),
                    )
                }
            };

            let envelope = run_tool(&state, params).await;

            let bytes = serde_json::to_vec(&envelope).map(|v| v.len()).unwrap_or(0);
            if bytes > state.config.mcp_response_budget_bytes {
                let message = format!(
                    "Response size {} bytes exceeds budget {} bytes. Reduce limit or disable full text.",
                    bytes, state.config.mcp_response_budget_bytes
                );
                warn!(response_bytes = bytes, "tool response over budget");
                return jsonrpc_error(
                    request_id,
                    -32010,
                    message,
                    json!({"code": "RESULT_TRUNCATED", "responseBytes": bytes}),
                    StatusCode::OK,
                    Some(rate.headers),
                );
            }

            jsonrpc_ok(request_id, envelope, Some(rate.headers))
        }
        _ => jsonrpc_error(
            request_id,
            -32601,
            "Method not found",
            json!({"code": "METHOD_NOT_FOUND"}),
            StatusCode::NOT_FOUND,
            Some(rate.headers),
        ),
    }
}

// Every path out of here is a well-formed envelope; tool failures are data,
// not faults.
async fn run_tool(state: &AppState, params: ToolCallParams) -> Value {
    let trace_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    let tool_name = params.name.clone();

    if !TOOL_NAMES.contains(&tool_name.as_str()) {
        let err = ToolError::invalid_input(format!("Unsupported tool: {tool_name}"))
            .with_suggestion("Call tools/list for the supported tool registry");
        return error_envelope(&trace_id, &tool_name, &err, started);
    }

    let arguments = if params.arguments.is_null() {
        json!({})
    } else {
        params.arguments
    };

    let call = match serde_json::from_value::<ToolCall>(json!({
        "name": tool_name,
        "arguments": arguments,
    })) {
        Ok(call) => call,
        Err(err) => {
            let err = ToolError::invalid_input(format!("Invalid arguments: {err}"))
                .with_suggestion("Check the tool's input schema via tools/list");
            return error_envelope(&trace_id, &tool_name, &err, started);
        }
    };

    if let Err(err) = call.validate() {
        return error_envelope(&trace_id, call.name(), &err, started);
    }

    let name = call.name();
    match call.dispatch(&state.client).await {
        Ok(output) => {
            let status = if output.partial { "partial" } else { "ok" };
            if output.partial {
                warn!(tool = name, trace_id = %trace_id, "tool returned a degraded result");
            }
            let elapsed = started.elapsed().as_millis() as u64;
            debug!(tool = name, trace_id = %trace_id, elapsed_ms = elapsed, "tool call finished");
            if state.config.mcp_dev_log_payloads {
                debug!(tool = name, trace_id = %trace_id, "tool payload: {}", output.value);
            }
            json!({
                "schemaVersion": MCP_SCHEMA_VERSION,
                "traceId": trace_id,
                "tool": name,
                "status": status,
                "result": output.value,
                "timingMs": elapsed,
            })
        }
        Err(err) => {
            warn!(tool = name, trace_id = %trace_id, "tool call failed: {}", err.message);
            error_envelope(&trace_id, name, &err, started)
        }
    }
}

fn error_envelope(trace_id: &str, tool_name: &str, err: &ToolError, started: Instant) -> Value {
    json!({
        "schemaVersion": MCP_SCHEMA_VERSION,
        "traceId": trace_id,
        "tool": tool_name,
        "status": "error",
        "error": err.to_payload(tool_name),
        "timingMs": started.elapsed().as_millis() as u64,
    })
}

fn tool_definitions() -> Vec<Value> {
    vec![
        tool_def(
            "search_cases_by_problem",
            "Search ranked case law for a client problem described by extracted legal keywords",
            json!({"type":"object","required":["keywords"],"properties":{
                "keywords":{"type":"array","items":{"type":"string","minLength":1,"maxLength":100},"minItems":1,"maxItems":10},
                "summary":{"type":"string"},
                "caseType":{"type":"string","enum":CASE_TYPES},
                "dateRange":{"type":"string","enum":["recent-2years","established-precedent","all-time"],"default":"recent-2years"},
                "limit":{"type":"integer","minimum":1,"maximum":20,"default":10}}}),
        ),
        tool_def(
            "get_case_details",
            "Fetch full case detail (judges, opinions, significance) for a cluster or docket id",
            json!({"type":"object","required":["caseId"],"properties":{
                "caseId":{"type":"string"},
                "includeFullText":{"type":"boolean","default":false}}}),
        ),
        tool_def(
            "find_similar_precedents",
            "Find precedents similar to a reference case, filtered by citation authority",
            json!({"type":"object","required":["referenceCaseId"],"properties":{
                "referenceCaseId":{"type":"string"},
                "legalConcepts":{"type":"array","items":{"type":"string","maxLength":100},"maxItems":10},
                "citationThreshold":{"type":"integer","minimum":1,"default":1},
                "limit":{"type":"integer","minimum":1,"maximum":20,"default":8}}}),
        ),
        tool_def(
            "analyze_case_outcomes",
            "Aggregate docket outcomes (closure rate, duration, per-court counts) for a case type",
            json!({"type":"object","required":["caseType"],"properties":{
                "caseType":{"type":"string","enum":CASE_TYPES},
                "courtLevel":{"type":"string","enum":["trial","appellate","all"],"default":"all"},
                "dateRange":{"type":"string","default":"last-2years"}}}),
        ),
        tool_def(
            "get_judge_analysis",
            "Resolve a judge by name and aggregate their authored opinions by type and court",
            json!({"type":"object","required":["judgeName","caseType"],"properties":{
                "judgeName":{"type":"string","minLength":1,"maxLength":100},
                "caseType":{"type":"string","enum":CASE_TYPES},
                "court":{"type":"string"}}}),
        ),
        tool_def(
            "validate_citations",
            "Validate citation strings against published case law (first 10 processed)",
            json!({"type":"object","required":["citations"],"properties":{
                "citations":{"type":"array","items":{"type":"string"},"minItems":1},
                "contextText":{"type":"string","maxLength":5000}}}),
        ),
        tool_def(
            "get_procedural_requirements",
            "Static filing requirements for a court plus supporting procedural case snippets",
            json!({"type":"object","required":["caseType"],"properties":{
                "caseType":{"type":"string","enum":CASE_TYPES},
                "court":{"type":"string","default":"ny-civ-ct"},
                "claimAmount":{"type":"number","exclusiveMinimum":0}}}),
        ),
        tool_def(
            "track_legal_trends",
            "Aggregate per-court and per-month filing activity for a legal area",
            json!({"type":"object","required":["legalArea"],"properties":{
                "legalArea":{"type":"string","minLength":1},
                "timePeriod":{"type":"string","enum":["last-6months","last-year","last-2years"],"default":"last-year"},
                "trendType":{"type":"string","enum":["outcomes","new-precedents"],"default":"outcomes"}}}),
        ),
    ]
}

fn tool_def(name: &str, description: &str, input_schema: Value) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": input_schema,
    })
}

fn jsonrpc_ok(id: Value, result: Value, rate: Option<RateLimitHeaders>) -> Response<Body> {
    let payload = JsonRpcSuccess {
        jsonrpc: "2.0",
        id,
        result,
    };

    let body = serde_json::to_vec(&payload).unwrap_or_else(|_| b"{}".to_vec());
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json");

    if let Some(rate) = rate {
        builder = attach_rate_headers(builder, rate);
    }

    builder.body(Body::from(body)).unwrap_or_else(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error":{"code":"RESPONSE_BUILD_FAILED","message":"Failed building MCP response"}})),
        )
            .into_response()
    })
}

fn jsonrpc_error(
    id: Value,
    code: i64,
    message: impl Into<String>,
    data: Value,
    status: StatusCode,
    rate: Option<RateLimitHeaders>,
) -> Response<Body> {
    let payload = JsonRpcFailure {
        jsonrpc: "2.0",
        id,
        error: JsonRpcError {
            code,
            message: message.into(),
            data,
        },
    };

    let body = serde_json::to_vec(&payload).unwrap_or_else(|_| b"{}".to_vec());
    let mut builder = Response::builder()
        .status(status)
        .header("content-type", "application/json");

    if let Some(rate) = rate {
        builder = attach_rate_headers(builder, rate);
    }

    builder.body(Body::from(body)).unwrap_or_else(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error":{"code":"RESPONSE_BUILD_FAILED","message":"Failed building MCP response"}})),
        )
            .into_response()
    })
}

fn attach_rate_headers(
    mut builder: axum::http::response::Builder,
    headers: RateLimitHeaders,
) -> axum::http::response::Builder {
    builder = builder.header(
        "X-RateLimit-Limit",
        HeaderValue::from_str(&headers.limit.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    builder = builder.header(
        "X-RateLimit-Remaining",
        HeaderValue::from_str(&headers.remaining.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    builder.header(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&headers.reset_seconds.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorKind;

    fn parse_call(name: &str, arguments: Value) -> Result<ToolCall, serde_json::Error> {
        serde_json::from_value(json!({"name": name, "arguments": arguments}))
    }

    #[test]
    fn tool_registry_covers_every_variant() {
        let definitions = tool_definitions();
        assert_eq!(definitions.len(), TOOL_NAMES.len());
        for definition in &definitions {
            let name = definition["name"].as_str().unwrap();
            assert!(TOOL_NAMES.contains(&name));
        }
    }

    #[test]
    fn search_call_deserializes_with_defaults() {
        let call = parse_call(
            "search_cases_by_problem",
            json!({"keywords": ["breach of warranty"]}),
        )
        .expect("valid call");
        assert_eq!(call.name(), "search_cases_by_problem");
        assert!(call.validate().is_ok());
    }

    #[test]
    fn unknown_tool_is_rejected_at_deserialization() {
        assert!(parse_call("summon_lawyer", json!({})).is_err());
    }

    #[test]
    fn out_of_range_limit_fails_validation_before_dispatch() {
        let call = parse_call(
            "search_cases_by_problem",
            json!({"keywords": ["warranty"], "limit": 50}),
        )
        .expect("deserializes");
        let err = call.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn missing_required_field_is_a_deserialization_error() {
        assert!(parse_call("get_case_details", json!({})).is_err());
        assert!(parse_call("get_case_details", json!({"caseId": "123"})).is_ok());
    }

    #[test]
    fn error_envelope_shape() {
        let err = ToolError::invalid_input("bad arguments");
        let envelope = error_envelope("trace-1", "validate_citations", &err, Instant::now());
        assert_eq!(envelope["status"], "error");
        assert_eq!(envelope["tool"], "validate_citations");
        assert_eq!(envelope["error"]["toolName"], "validate_citations");
        assert_eq!(envelope["error"]["kind"], "invalid_input");
    }
}
