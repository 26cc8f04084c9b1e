//! Signed HTTP transport shared by the S3 and Bedrock clients.
//!
//! [`Signer`] owns the `reqwest` client, credentials, region and signing
//! service name; [`Endpoint`] is a parsed base URL, either the regional AWS
//! default or an override (LocalStack, MinIO, VPC endpoints). Every failure is
//! mapped to a [`ServiceError`] naming the API operation.

use chrono::Utc;
use kb_ingest_core::error::ServiceError;
use reqwest::{Method, Url};

use crate::sigv4::{sign, AwsCredentials, SigningInput};

/// A service base URL such as `https://bedrock-agent.us-west-2.amazonaws.com`.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self, ServiceError> {
        let base = Url::parse(url).map_err(|e| ServiceError::Transport {
            operation: "ResolveEndpoint",
            message: format!("invalid endpoint URL {url:?}: {e}"),
        })?;
        if base.host_str().is_none() {
            return Err(ServiceError::Transport {
                operation: "ResolveEndpoint",
                message: format!("endpoint URL {url:?} has no host"),
            });
        }
        Ok(Self { base })
    }

    /// `host[:port]` as it appears in the `Host` header.
    pub fn host(&self) -> String {
        let host = self.base.host_str().unwrap_or_default();
        match self.base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Base path of the endpoint without a trailing slash (usually empty).
    fn base_path(&self) -> &str {
        self.base.path().trim_end_matches('/')
    }

    /// Full URL and the path to sign for an already-encoded `path`.
    fn resolve(&self, path: &str) -> (String, String) {
        let full_path = format!("{}{}", self.base_path(), path);
        let url = format!(
            "{}://{}{}",
            self.base.scheme(),
            self.host(),
            full_path
        );
        (url, full_path)
    }
}

/// Signs and sends requests for one AWS service.
pub struct Signer {
    http: reqwest::Client,
    creds: AwsCredentials,
    region: String,
    service: &'static str,
}

impl Signer {
    pub fn new(
        http: reqwest::Client,
        creds: AwsCredentials,
        region: &str,
        service: &'static str,
    ) -> Self {
        Self {
            http,
            creds,
            region: region.to_string(),
            service,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Sends a signed request and returns the response body of a 2xx answer.
    ///
    /// `path` must already be URI-encoded.
    pub async fn send(
        &self,
        operation: &'static str,
        method: Method,
        endpoint: &Endpoint,
        path: &str,
        body: Vec<u8>,
        content_type: Option<&'static str>,
    ) -> Result<Vec<u8>, ServiceError> {
        let (url, signed_path) = endpoint.resolve(path);
        let host = endpoint.host();
        let signed = sign(
            &self.creds,
            &SigningInput {
                method: method.as_str(),
                host: &host,
                path: &signed_path,
                query: &[],
                payload: &body,
                region: &self.region,
                service: self.service,
            },
            Utc::now(),
        );

        tracing::debug!(operation, %method, %url, bytes = body.len(), "Sending signed request");
        let mut builder = signed.apply(self.http.request(method, &url));
        if let Some(content_type) = content_type {
            builder = builder.header("Content-Type", content_type);
        }

        let resp = builder
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(operation, error = ?e, %url, "Request failed to send");
                ServiceError::Transport {
                    operation,
                    message: e.to_string(),
                }
            })?;

        let status = resp.status();
        let error_type = resp
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(':').next())
            .map(str::to_string);
        let bytes = resp.bytes().await.map_err(|e| ServiceError::Transport {
            operation,
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            let mut message = error_message(&bytes);
            if let Some(kind) = error_type {
                message = format!("{kind}: {message}");
            }
            tracing::error!(
                operation,
                status = status.as_u16(),
                error = %message,
                "Service returned an error"
            );
            return Err(ServiceError::Api {
                operation,
                status: status.as_u16(),
                message,
            });
        }

        Ok(bytes.to_vec())
    }
}

/// Decodes a JSON response body for `operation`.
pub fn decode<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    body: &[u8],
) -> Result<T, ServiceError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::error!(operation, error = ?e, "Failed to decode response");
        ServiceError::Decode {
            operation,
            message: e.to_string(),
        }
    })
}

/// Best human-readable message from an AWS error body: JSON `message`, XML
/// `<Message>`, or the first 500 characters of the raw body.
fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(message) = value
            .get("message")
            .or_else(|| value.get("Message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
    }
    let text = String::from_utf8_lossy(body);
    if let Some(message) = extract_xml_value(&text, "Message") {
        return message;
    }
    let trimmed: String = text.trim().chars().take(500).collect();
    if trimmed.is_empty() {
        "(empty response body)".to_string()
    } else {
        trimmed
    }
}

/// Text content of the first `<tag>` element (simple, non-nested).
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)?;
    Some(xml[start..start + end].to_string())
}
