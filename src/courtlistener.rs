use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::query::SearchQuery;

pub const DEFAULT_BASE_URL: &str = "https://www.courtlistener.com/api/rest/v4";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream rate limit exceeded (429)")]
    RateLimited,
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    fn retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchHit {
    pub id: Option<i64>,
    #[serde(alias = "caseName")]
    pub case_name: Option<String>,
    pub court: Option<String>,
    pub court_id: Option<String>,
    #[serde(alias = "dateFiled")]
    pub date_filed: Option<String>,
    #[serde(alias = "dateTerminated")]
    pub date_terminated: Option<String>,
    #[serde(alias = "citeCount", alias = "citation_count")]
    pub cite_count: Option<u64>,
    pub snippet: Option<String>,
    pub cluster_id: Option<i64>,
    #[serde(rename = "type")]
    pub opinion_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchPage {
    pub count: u64,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Cluster {
    pub id: i64,
    #[serde(alias = "caseName")]
    pub case_name: Option<String>,
    pub date_filed: Option<String>,
    // Upstream stores panel judges as one delimited string.
    pub judges: Option<String>,
    pub precedential_status: Option<String>,
    pub citation_count: Option<u64>,
    pub court_id: Option<String>,
    pub sub_opinions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Docket {
    pub id: i64,
    pub case_name: Option<String>,
    pub court_id: Option<String>,
    pub date_filed: Option<String>,
    pub date_terminated: Option<String>,
    pub docket_number: Option<String>,
    pub clusters: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Opinion {
    pub id: i64,
    #[serde(rename = "type")]
    pub opinion_type: Option<String>,
    pub author_str: Option<String>,
    pub plain_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Person {
    pub id: i64,
    pub name_first: Option<String>,
    pub name_last: Option<String>,
}

impl Person {
    pub fn full_name(&self) -> String {
        match (&self.name_first, &self.name_last) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (None, Some(last)) => last.clone(),
            (Some(first), None) => first.clone(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PeoplePage {
    pub results: Vec<Person>,
}

// Relational sub-resources arrive as URLs; the numeric id is the last path
// segment.
pub fn trailing_id(url: &str) -> Option<i64> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<i64>().ok())
}

#[derive(Debug, Clone)]
pub struct CourtListener {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
    max_attempts: u32,
}

impl CourtListener {
    pub fn new(
        base_url: String,
        token: Option<String>,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed building upstream HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http,
            max_attempts: max_attempts.max(1),
        })
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage, ApiError> {
        self.get_json("/search/", &query.to_params()).await
    }

    pub async fn cluster(&self, id: i64) -> Result<Cluster, ApiError> {
        self.get_json(&format!("/clusters/{id}/"), &[]).await
    }

    pub async fn docket(&self, id: i64) -> Result<Docket, ApiError> {
        self.get_json(&format!("/dockets/{id}/"), &[]).await
    }

    pub async fn opinion(&self, id: i64) -> Result<Opinion, ApiError> {
        self.get_json(&format!("/opinions/{id}/"), &[]).await
    }

    pub async fn people_by_last_name(&self, last_name: &str) -> Result<PeoplePage, ApiError> {
        let params = [("name_last__icontains", last_name.to_string())];
        self.get_json("/people/", &params).await
    }

    // Single GET with the configured attempt budget. 429 and 4xx are never
    // retried; the retry hook only covers transient network/5xx failures.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            match self.execute(&url, params).await {
                Ok(value) => return Ok(value),
                Err(err) if err.retryable() && attempt < self.max_attempts => {
                    warn!(url = %url, attempt, "retrying upstream request: {err}");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or(ApiError::Status { status: 0 }))
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut request = self.http.get(url).query(params);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Token {token}"));
        }

        let response = request.send().await?;
        match response.status().as_u16() {
            404 => Err(ApiError::NotFound(url.to_string())),
            429 => Err(ApiError::RateLimited),
            status if status >= 400 => Err(ApiError::Status { status }),
            _ => Ok(response.json::<T>().await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_id_parses_resource_urls() {
        assert_eq!(
            trailing_id("https://www.courtlistener.com/api/rest/v4/opinions/12345/"),
            Some(12345)
        );
        assert_eq!(trailing_id("/api/rest/v4/clusters/7"), Some(7));
        assert_eq!(trailing_id("/api/rest/v4/clusters/abc/"), None);
    }

    #[test]
    fn retryable_covers_transient_failures_only() {
        assert!(ApiError::Status { status: 503 }.retryable());
        assert!(!ApiError::Status { status: 400 }.retryable());
        assert!(!ApiError::RateLimited.retryable());
        assert!(!ApiError::NotFound("x".into()).retryable());
    }

    #[test]
    fn person_full_name_handles_missing_parts() {
        let person = Person {
            id: 1,
            name_first: Some("Ruth".into()),
            name_last: Some("Abrams".into()),
        };
        assert_eq!(person.full_name(), "Ruth Abrams");

        let last_only = Person {
            id: 2,
            name_first: None,
            name_last: Some("Abrams".into()),
        };
        assert_eq!(last_only.full_name(), "Abrams");
    }
}
