use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::DEFAULT_REQUEST_TIMEOUT_SECONDS;
use crate::error::QueryError;

/// Default per-request timeout for REST calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS);

/// Status code and JSON body of a successful GET.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub data: Value,
}

/// HTTP transport used by chain queries. Only GET is ever issued.
#[async_trait]
pub trait RestTransport {
    async fn get_json(&self, base_url: &str, path: &str) -> Result<RawResponse, QueryError>;
}

/// Join a REST base URL and a request path without doubling or dropping `/`.
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[derive(Clone)]
pub struct RestClient {
    http: Client,
}

impl RestClient {
    pub fn new(timeout: Duration) -> Result<Self, QueryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| QueryError::config(format!("Failed to build HTTP client: {}", err)))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl RestTransport for RestClient {
    async fn get_json(&self, base_url: &str, path: &str) -> Result<RawResponse, QueryError> {
        let url = join_url(base_url, path);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| QueryError::network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::network(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let data = response
            .json::<Value>()
            .await
            .map_err(|err| QueryError::decode(err.to_string()))?;

        Ok(RawResponse {
            status: status.as_u16(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://lcd.example/", "/a/b"), "https://lcd.example/a/b");
        assert_eq!(join_url("https://lcd.example", "a/b"), "https://lcd.example/a/b");
        assert_eq!(join_url("https://lcd.example", ""), "https://lcd.example");
    }

    #[tokio::test]
    async fn get_json_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cosmos/bank/v1beta1/supply"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "supply": [] })))
            .mount(&server)
            .await;

        let client = RestClient::new(DEFAULT_TIMEOUT).unwrap();
        let response = client
            .get_json(&server.uri(), "/cosmos/bank/v1beta1/supply")
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.data, json!({ "supply": [] }));
    }

    #[tokio::test]
    async fn get_json_maps_http_failure_to_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = RestClient::new(DEFAULT_TIMEOUT).unwrap();
        let err = client.get_json(&server.uri(), "/missing").await.unwrap_err();

        assert!(matches!(err, QueryError::Network { .. }));
    }

    #[tokio::test]
    async fn get_json_maps_non_json_body_to_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = RestClient::new(DEFAULT_TIMEOUT).unwrap();
        let err = client.get_json(&server.uri(), "/text").await.unwrap_err();

        assert!(matches!(err, QueryError::Decode { .. }));
    }
}
