//! HTTP client for the clang-format web service
//!
//! `GET /doc` publishes the option schema; `POST /format` formats code with a
//! form-encoded request and answers with the formatted text as a JSON string.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Settings;
use crate::constants::service::{DOC_PATH, FORMAT_PATH};
use crate::error::{SchemaError, TransformRequestError};
use crate::orchestrator::FormatRequest;
use crate::schema::OptionSchema;

#[derive(Debug, Clone)]
pub struct FormatClient {
    client: Client,
    base_url: String,
}

impl FormatClient {
    /// Client for the endpoint and timeout configured in `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client, settings.endpoint()))
    }

    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and parse the option schema
    pub async fn fetch_schema(&self) -> Result<OptionSchema, SchemaError> {
        let url = format!("{}{}", self.base_url, DOC_PATH);
        debug!(url = %url, "Fetching option schema");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SchemaError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SchemaError::Fetch(format!("{url}: HTTP {}", status.as_u16())));
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|e| SchemaError::Fetch(format!("{url}: malformed body: {e}")))?;

        let schema = OptionSchema::from_json(&doc)?;
        info!(versions = schema.versions().len(), "Loaded option schema");
        Ok(schema)
    }

    /// Run one format round trip
    pub async fn format(&self, request: &FormatRequest) -> Result<String, TransformRequestError> {
        let url = format!("{}{}", self.base_url, FORMAT_PATH);
        debug!(
            url = %url,
            version = %request.version,
            bytes = request.code.len(),
            range = ?request.range,
            "Sending format request"
        );

        let response = self
            .client
            .post(&url)
            .form(&request.form_fields())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransformRequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        decode_format_response(&body)
    }
}

fn decode_format_response(body: &str) -> Result<String, TransformRequestError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TransformRequestError::Decode(format!("body is not JSON: {e}")))?;

    match value {
        Value::String(text) => Ok(text),
        Value::Object(obj) => {
            let message = ["error", "message"]
                .iter()
                .find_map(|key| obj.get(*key))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            match message {
                Some(message) => Err(TransformRequestError::Service(message)),
                None => Err(TransformRequestError::Decode(Value::Object(obj).to_string())),
            }
        }
        other => Err(TransformRequestError::Decode(format!(
            "expected a JSON string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Selection;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request(selection: Option<Selection>) -> FormatRequest {
        FormatRequest {
            config: r#"{"ColumnLimit":"100"}"#.to_string(),
            version: "v1".to_string(),
            code: "int  x;".to_string(),
            range: selection.filter(Selection::spans_text).map(|s| s.line_range()),
        }
    }

    #[tokio::test]
    async fn test_fetch_schema_parses_doc() {
        let mock_server = MockServer::start().await;

        let doc = r#"{
            "versions": ["3.9"],
            "3.9": {"ColumnLimit": {"type": "unsigned", "doc": "Limit"}}
        }"#;

        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(doc))
            .mount(&mock_server)
            .await;

        let client = FormatClient::new(Client::new(), mock_server.uri());
        let schema = client.fetch_schema().await.unwrap();

        assert_eq!(schema.versions(), &["3.9".to_string()]);
        assert!(schema.spec("3.9", "ColumnLimit").is_some());
    }

    #[tokio::test]
    async fn test_fetch_schema_non_success_is_fetch_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = FormatClient::new(Client::new(), mock_server.uri());
        assert!(matches!(client.fetch_schema().await, Err(SchemaError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_fetch_schema_malformed_body_is_fetch_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let client = FormatClient::new(Client::new(), mock_server.uri());
        assert!(matches!(client.fetch_schema().await, Err(SchemaError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_fetch_schema_empty_versions_is_format_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"versions": []}"#))
            .mount(&mock_server)
            .await;

        let client = FormatClient::new(Client::new(), mock_server.uri());
        assert!(matches!(client.fetch_schema().await, Err(SchemaError::Format(_))));
    }

    #[tokio::test]
    async fn test_format_sends_form_and_returns_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/format"))
            .and(body_string_contains("version=v1"))
            .and(body_string_contains("range=1%3A3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#""int x;\n""#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = FormatClient::new(Client::new(), format!("{}/", mock_server.uri()));
        let text = client
            .format(&sample_request(Some(Selection::new(1, 0, 3, 2))))
            .await
            .unwrap();

        assert_eq!(text, "int x;\n");
    }

    #[tokio::test]
    async fn test_format_omits_range_for_collapsed_selection() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/format"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#""ok""#))
            .mount(&mock_server)
            .await;

        let client = FormatClient::new(Client::new(), mock_server.uri());
        client
            .format(&sample_request(Some(Selection::cursor(2, 2))))
            .await
            .unwrap();

        let received = mock_server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&received[0].body).to_string();
        assert!(!body.contains("range="));
        assert!(body.contains("code=int"));
    }

    #[tokio::test]
    async fn test_format_http_error_is_status_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/format"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad config"))
            .mount(&mock_server)
            .await;

        let client = FormatClient::new(Client::new(), mock_server.uri());
        let err = client.format(&sample_request(None)).await.unwrap_err();
        assert!(matches!(err, TransformRequestError::Status { status: 400, ref body } if body == "bad config"));
    }

    #[test]
    fn test_decode_error_object() {
        let err = decode_format_response(r#"{"error": "unknown key"}"#).unwrap_err();
        assert!(matches!(err, TransformRequestError::Service(ref m) if m == "unknown key"));

        let err = decode_format_response("[1]").unwrap_err();
        assert!(matches!(err, TransformRequestError::Decode(_)));

        let err = decode_format_response("plain text").unwrap_err();
        assert!(matches!(err, TransformRequestError::Decode(_)));
    }
}
