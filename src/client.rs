use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::fetcher::PageSource;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status}: {reason}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("Connection error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Response body of a non-2xx reply, if the server sent one.
    pub fn body(&self) -> Option<&str> {
        match self {
            FetchError::Status { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

/// One page of `/studies` results.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub studies: Vec<Value>,
    pub total_count: Option<u64>,
    pub next_page_token: Option<String>,
}

/// Blocking client for the ClinicalTrials.gov v2 API.
pub struct RegistryClient {
    http: Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ctgov/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(RegistryClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch a single study by canonical NCT identifier.
    pub fn fetch_study(&self, nct_id: &str) -> Result<Value, FetchError> {
        let params = [("format".to_string(), "json".to_string())];
        self.get_json(&format!("/studies/{}", nct_id), &params)
    }

    fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, params = params.len(), "GET");
        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()?;

        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl PageSource for RegistryClient {
    fn fetch_page(&mut self, params: &[(String, String)]) -> Result<SearchPage, FetchError> {
        self.get_json("/studies", params)
    }
}
