//! HTTP transport — the only blocking step of a delivery.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::payload::OutboundRequest;

/// A provider response with headers flattened to lower-cased names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, Vec<String>>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Sends one POST to a device channel.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, uri: &str, request: &OutboundRequest)
    -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport. One instance keeps one keep-alive pool,
/// so each app worker owns its own.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(
        &self,
        uri: &str,
        request: &OutboundRequest,
    ) -> Result<HttpResponse, TransportError> {
        let url = reqwest::Url::parse(uri)
            .map_err(|e| TransportError::InvalidUri(format!("{uri}: {e}")))?;

        let mut builder = self.client.post(url).body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(header_text(name.as_str(), value));
        }

        let body = response.bytes().await?.to_vec();

        tracing::debug!(uri, status, body_len = body.len(), "Provider responded");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Header value as text. Non-UTF-8 bytes are replaced rather than dropped,
/// so a garbled provider status still reaches the classifier and the logs.
fn header_text(name: &str, value: &reqwest::header::HeaderValue) -> String {
    match value.to_str() {
        Ok(text) => text.to_string(),
        Err(_) => {
            let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
            tracing::debug!(header = name, value = %text, "Header value is not valid UTF-8");
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_response_builder_lowercases_header_names() {
        let resp = HttpResponse::new(200)
            .with_header("X-NotificationStatus", "Received")
            .with_body(r#"{"failure": 0}"#);
        assert_eq!(
            resp.headers.get("x-notificationstatus"),
            Some(&vec!["Received".to_string()])
        );
        assert_eq!(resp.body, br#"{"failure": 0}"#.to_vec());
    }

    #[tokio::test]
    async fn test_invalid_uri_is_transport_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(1)).unwrap();
        let req = OutboundRequest {
            headers: vec![],
            body: String::new(),
        };
        let err = transport.post("not a uri", &req).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUri(_)));
    }

    #[test]
    fn test_non_utf8_header_value_is_kept_lossily() {
        let value = HeaderValue::from_bytes(b"Queue\xffFull").unwrap();
        assert_eq!(
            header_text("x-notificationstatus", &value),
            "Queue\u{FFFD}Full"
        );

        let plain = HeaderValue::from_static("Received");
        assert_eq!(header_text("x-notificationstatus", &plain), "Received");
    }
}
