use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// Citation-count thresholds for precedential bucketing. Fixed contract:
// callers rely on these exact cutoffs.
pub const STRONG_CITATION_FLOOR: u64 = 10;
pub const MODERATE_CITATION_FLOOR: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecedentialValue {
    Strong,
    Moderate,
    Limited,
}

impl PrecedentialValue {
    pub fn from_citation_count(count: u64) -> Self {
        if count > STRONG_CITATION_FLOOR {
            Self::Strong
        } else if count > MODERATE_CITATION_FLOOR {
            Self::Moderate
        } else {
            Self::Limited
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub case_id: String,
    pub case_name: String,
    pub court: String,
    pub date_filed: Option<String>,
    pub citation_count: u64,
    pub snippet: String,
    pub relevance_score: u32,
    pub precedential_value: PrecedentialValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStatus {
    Valid,
    NotFound,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationResult {
    pub input_citation: String,
    pub status: CitationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_case: Option<Value>,
    pub related_cases: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    UpstreamFailure,
}

// Uniform tool-level failure. Always delivered inside a successful envelope;
// never allowed to escape the dispatcher as a fault.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub suggestion: Option<String>,
    pub context: Value,
}

impl ToolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            message: message.into(),
            suggestion: None,
            context: json!({}),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            message: message.into(),
            suggestion: None,
            context: json!({}),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UpstreamFailure,
            message: message.into(),
            suggestion: None,
            context: json!({}),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn to_payload(&self, tool_name: &str) -> Value {
        json!({
            "toolName": tool_name,
            "kind": self.kind,
            "message": self.message,
            "suggestion": self.suggestion,
            "context": self.context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedential_buckets_are_exhaustive_and_disjoint() {
        assert_eq!(
            PrecedentialValue::from_citation_count(0),
            PrecedentialValue::Limited
        );
        assert_eq!(
            PrecedentialValue::from_citation_count(2),
            PrecedentialValue::Limited
        );
        assert_eq!(
            PrecedentialValue::from_citation_count(3),
            PrecedentialValue::Moderate
        );
        assert_eq!(
            PrecedentialValue::from_citation_count(10),
            PrecedentialValue::Moderate
        );
        assert_eq!(
            PrecedentialValue::from_citation_count(11),
            PrecedentialValue::Strong
        );
    }

    #[test]
    fn error_payload_carries_tool_name_and_suggestion() {
        let err = ToolError::not_found("cluster 42 not found")
            .with_suggestion("Verify the case id via search_cases_by_problem")
            .with_context(json!({"caseId": "42"}));
        let payload = err.to_payload("get_case_details");
        assert_eq!(payload["toolName"], "get_case_details");
        assert_eq!(payload["kind"], "not_found");
        assert_eq!(payload["context"]["caseId"], "42");
    }
}
