use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::GiphyConfig;

/// Ways a single Giphy lookup can fail.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("request to Giphy failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Giphy returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Giphy reported status {status}: {msg}")]
    Api { status: i64, msg: String },
    #[error("failed to parse Giphy response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Giphy response has no `{0}` field")]
    MissingField(&'static str),
}

/// One GIF picked by Giphy for a tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResult {
    /// Empty when nothing matched the tag.
    pub embed_url: String,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.embed_url.is_empty()
    }
}

/// Resolves a free-text tag to a single GIF.
#[async_trait]
pub trait GifSearch: Send + Sync {
    async fn random(&self, tag: &str) -> Result<SearchResult, SearchError>;
}

// Only `data` and `meta` are read; the dozens of image renditions Giphy
// returns alongside `embed_url` are left as untyped JSON.
#[derive(Debug, Deserialize)]
struct RandomResponse {
    data: Option<Value>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    status: Option<i64>,
    #[serde(default)]
    msg: String,
}

pub struct GiphyClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GiphyClient {
    pub fn new(config: &GiphyConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build Giphy HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl GifSearch for GiphyClient {
    async fn random(&self, tag: &str) -> Result<SearchResult, SearchError> {
        let url = format!("{}/gifs/random", self.base_url);

        debug!(tag, "Requesting random GIF from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("tag", tag)])
            .send()
            .await
            .map_err(SearchError::Network)?;

        let status = response.status();
        let body = response.text().await.map_err(SearchError::Network)?;

        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        parse_random_response(&body)
    }
}

/// Longest error body kept in a `SearchError::Http`.
const MAX_ERROR_BODY: usize = 512;

fn truncate_body(mut body: String) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body.push_str("...");
    body
}

fn parse_random_response(body: &str) -> Result<SearchResult, SearchError> {
    let response: RandomResponse = serde_json::from_str(body)?;

    if let Some(Meta {
        status: Some(status),
        msg,
    }) = response.meta
    {
        if !(200..300).contains(&status) {
            return Err(SearchError::Api { status, msg });
        }
    }

    let embed_url = match response.data {
        // Giphy answers an unmatched tag with `"data": []`.
        Some(Value::Array(items)) => match items.into_iter().next() {
            Some(item) => embed_url_of(item)?,
            None => String::new(),
        },
        Some(item @ Value::Object(_)) => embed_url_of(item)?,
        _ => return Err(SearchError::MissingField("data")),
    };

    Ok(SearchResult { embed_url })
}

fn embed_url_of(item: Value) -> Result<String, SearchError> {
    let Value::Object(mut fields) = item else {
        return Err(SearchError::MissingField("data.embed_url"));
    };
    if fields.is_empty() {
        return Ok(String::new());
    }
    match fields.remove("embed_url") {
        Some(Value::String(url)) => Ok(url),
        _ => Err(SearchError::MissingField("data.embed_url")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn config_for(server: &MockServer) -> GiphyConfig {
        GiphyConfig {
            base_url: server.uri(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let body = r#"{
            "data": {
                "type": "gif",
                "id": "abc",
                "embed_url": "https://giphy.com/embed/abc",
                "images": { "original": { "url": "https://media.giphy.com/abc.gif", "frames": "12" } }
            },
            "meta": { "status": 200, "msg": "OK", "response_id": "r1" }
        }"#;
        let result = parse_random_response(body).unwrap();
        assert_eq!(result.embed_url, "https://giphy.com/embed/abc");
    }

    #[test]
    fn test_parse_without_meta() {
        let result =
            parse_random_response(r#"{"data":{"embed_url":"https://example.com/a.gif"}}"#)
                .unwrap();
        assert_eq!(result.embed_url, "https://example.com/a.gif");
    }

    #[test]
    fn test_parse_no_match_is_empty_result() {
        let result =
            parse_random_response(r#"{"data":[],"meta":{"status":200,"msg":"OK"}}"#).unwrap();
        assert!(result.is_empty());

        let result = parse_random_response(r#"{"data":{},"meta":{"status":200}}"#).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_parse_empty_embed_url_is_empty_result() {
        let result = parse_random_response(r#"{"data":{"embed_url":""}}"#).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = parse_random_response("<html>oops</html>").unwrap_err();
        assert!(matches!(err, SearchError::Malformed(_)));
    }

    #[test]
    fn test_parse_missing_fields() {
        let err = parse_random_response(r#"{"meta":{"status":200}}"#).unwrap_err();
        assert!(matches!(err, SearchError::MissingField("data")));

        let err = parse_random_response(r#"{"data":{"id":"abc"}}"#).unwrap_err();
        assert!(matches!(err, SearchError::MissingField("data.embed_url")));
    }

    #[test]
    fn test_parse_meta_error_status() {
        let err = parse_random_response(
            r#"{"data":{"embed_url":"https://example.com/a.gif"},"meta":{"status":403,"msg":"Forbidden"}}"#,
        )
        .unwrap_err();
        match err {
            SearchError::Api { status, msg } => {
                assert_eq!(status, 403);
                assert_eq!(msg, "Forbidden");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_random_sends_key_and_tag() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gifs/random"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("tag", "funny cat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "embed_url": "https://giphy.com/embed/xyz" },
                "meta": { "status": 200, "msg": "OK" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GiphyClient::new(&config_for(&server), "test-key").unwrap();
        let result = client.random("funny cat").await.unwrap();
        assert_eq!(result.embed_url, "https://giphy.com/embed/xyz");
    }

    #[tokio::test]
    async fn test_random_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gifs/random"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = GiphyClient::new(&config_for(&server), "bad-key").unwrap();
        match client.random("cat").await.unwrap_err() {
            SearchError::Http { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        assert_eq!(truncate_body("short".to_string()), "short");

        let body = "é".repeat(400);
        let truncated = truncate_body(body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.len(), MAX_ERROR_BODY + 3);
    }

    #[tokio::test]
    async fn test_random_http_error_body_truncated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gifs/random"))
            .respond_with(ResponseTemplate::new(502).set_body_string("x".repeat(10_000)))
            .mount(&server)
            .await;

        let client = GiphyClient::new(&config_for(&server), "test-key").unwrap();
        match client.random("cat").await.unwrap_err() {
            SearchError::Http { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), MAX_ERROR_BODY + 3);
                assert!(body.starts_with("xxx"));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_random_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gifs/random"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\": "))
            .mount(&server)
            .await;

        let client = GiphyClient::new(&config_for(&server), "test-key").unwrap();
        let err = client.random("cat").await.unwrap_err();
        assert!(matches!(err, SearchError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_random_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gifs/random"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": { "embed_url": "late" } }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = GiphyClient::new(&config_for(&server), "test-key").unwrap();
        let err = client.random("cat").await.unwrap_err();
        match err {
            SearchError::Network(e) => assert!(e.is_timeout()),
            other => panic!("expected Network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_random_connection_refused() {
        let config = GiphyConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
        };
        let client = GiphyClient::new(&config, "test-key").unwrap();
        let err = client.random("cat").await.unwrap_err();
        assert!(matches!(err, SearchError::Network(_)));
    }
}
