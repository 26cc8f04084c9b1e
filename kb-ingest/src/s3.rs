//! Amazon S3 object upload.
//!
//! Implements [`ObjectStore`] with a single signed `PutObject`. Requests go to
//! the virtual-hosted `<bucket>.s3.<region>.amazonaws.com` endpoint, or
//! path-style `<endpoint>/<bucket>/<key>` when an endpoint override is
//! configured.

use async_trait::async_trait;
use kb_ingest_core::contract::ObjectStore;
use kb_ingest_core::error::ServiceError;
use reqwest::Method;

use crate::aws::{Endpoint, Signer};
use crate::sigv4::{encode_path, uri_encode};

pub struct S3Client {
    signer: Signer,
    endpoint_override: Option<Endpoint>,
}

impl S3Client {
    pub fn new(signer: Signer, endpoint_override: Option<Endpoint>) -> Self {
        Self {
            signer,
            endpoint_override,
        }
    }

    /// Endpoint and encoded path for `bucket`/`key`.
    fn locate(&self, bucket: &str, key: &str) -> Result<(Endpoint, String), ServiceError> {
        let key = encode_path(key.trim_start_matches('/'));
        match &self.endpoint_override {
            Some(endpoint) => Ok((endpoint.clone(), format!("/{}/{}", uri_encode(bucket), key))),
            None => {
                let endpoint = Endpoint::parse(&format!(
                    "https://{}.s3.{}.amazonaws.com",
                    bucket,
                    self.signer.region()
                ))?;
                Ok((endpoint, format!("/{}", key)))
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), ServiceError> {
        let (endpoint, path) = self.locate(bucket, key)?;
        tracing::info!(bucket, key, bytes = body.len(), "Uploading object to S3");
        self.signer
            .send(
                "PutObject",
                Method::PUT,
                &endpoint,
                &path,
                body,
                Some(content_type(key)),
            )
            .await?;
        tracing::info!(bucket, key, "Successfully uploaded object");
        Ok(())
    }
}

/// MIME type from the key's extension.
fn content_type(key: &str) -> &'static str {
    match key.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()).as_deref() {
        Some("pdf") => "application/pdf",
        Some("md") => "text/markdown",
        Some("txt") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
