//! HTTP client for the ticketing API.

use crate::config::TicketsConfig;
use crate::models::Ticket;
use crate::retry::{is_transient_status, is_transient_transport, RetryPolicy};
use crate::tickets::normalize::normalize_records;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Failure to obtain tickets from the upstream API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Cannot reach ticketing API at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Ticketing API at {url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Ticketing API at {url} returned an unreadable body: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Unreachable { source, .. } => is_transient_transport(source),
            FetchError::Status { status, .. } => is_transient_status(*status),
            FetchError::Decode { .. } => false,
        }
    }
}

/// Source of open tickets.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Fetch open tickets, optionally restricted to one data center.
    async fn fetch_open(&self, dc_id: Option<&str>) -> Result<Vec<Ticket>, FetchError>;
}

/// Ticketing API client with a request timeout and bounded retry.
pub struct TicketClient {
    http: reqwest::Client,
    url: String,
    status: String,
    retry: RetryPolicy,
}

impl TicketClient {
    pub fn new(config: &TicketsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client for the ticketing API")?;

        Ok(Self {
            http,
            url: format!("{}/api/tickets", config.base_url.trim_end_matches('/')),
            status: config.status.clone(),
            retry: RetryPolicy::with_retries(config.retries),
        })
    }

    /// Override the retry policy (tests use short intervals).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get_once(&self, dc_id: Option<&str>) -> Result<Vec<Value>, FetchError> {
        let mut request = self.http.get(&self.url);
        if !self.status.is_empty() {
            request = request.query(&[("status", self.status.as_str())]);
        }
        if let Some(dc) = dc_id {
            request = request.query(&[("dc", dc)]);
        }

        let response = request.send().await.map_err(|source| FetchError::Unreachable {
            url: self.url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
                body,
            });
        }

        response.json().await.map_err(|source| FetchError::Decode {
            url: self.url.clone(),
            source,
        })
    }
}

#[async_trait]
impl TicketSource for TicketClient {
    async fn fetch_open(&self, dc_id: Option<&str>) -> Result<Vec<Ticket>, FetchError> {
        debug!("Fetching tickets from {} (dc: {:?})", self.url, dc_id);

        let raw = self
            .retry
            .run("Ticket fetch", FetchError::is_transient, || self.get_once(dc_id))
            .await?;

        let tickets = normalize_records(&raw);
        info!("Fetched {} tickets ({} records)", tickets.len(), raw.len());
        Ok(tickets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TicketClient {
        let config = TicketsConfig {
            base_url: server.uri(),
            ..TicketsConfig::default()
        };
        TicketClient::new(&config).unwrap().with_retry(RetryPolicy {
            max_retries: 2,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
        })
    }

    #[tokio::test]
    async fn test_fetch_normalizes_both_casings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tickets"))
            .and(query_param("status", "Open"))
            .and(query_param("dc", "DC1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"ticketId": "T1", "dcId": "DC1", "docCategory": "HVAC", "daysToDue": 2},
                {"TicketId": "T2", "DcId": "DC1", "DocCategory": "Power", "Priority": "High"}
            ])))
            .mount(&server)
            .await;

        let tickets = client_for(&server).fetch_open(Some("DC1")).await.unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].days_to_due, Some(2));
        assert_eq!(tickets[1].ticket_id, "T2");
        assert_eq!(tickets[1].doc_category, "Power");
    }

    #[tokio::test]
    async fn test_transient_status_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tickets"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tickets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"ticketId": "T1", "dcId": "DC1"}
            ])))
            .mount(&server)
            .await;

        let tickets = client_for(&server).fetch_open(None).await.unwrap();
        assert_eq!(tickets.len(), 1);
    }

    #[tokio::test]
    async fn test_non_transient_status_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tickets"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db locked"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_open(None).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR));
        assert!(err.to_string().contains("/api/tickets"));
    }

    #[tokio::test]
    async fn test_unreachable_names_url() {
        let config = TicketsConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            retries: 0,
            timeout_seconds: 2,
            ..TicketsConfig::default()
        };
        let err = TicketClient::new(&config).unwrap().fetch_open(None).await.unwrap_err();
        assert!(matches!(err, FetchError::Unreachable { .. }));
        assert!(err.to_string().contains("http://127.0.0.1:9/api/tickets"));
    }
}
