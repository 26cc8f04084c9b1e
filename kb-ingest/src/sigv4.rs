//! AWS Signature Version 4 request signing.
//!
//! Pure-Rust HMAC-SHA256 signing (`hmac` + `sha2`) shared by the S3 and
//! Bedrock clients. Only `host`, `x-amz-content-sha256`, `x-amz-date` and,
//! with temporary credentials, `x-amz-security-token` are signed.
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID` (required)
//! - `AWS_SECRET_ACCESS_KEY` (required)
//! - `AWS_SESSION_TOKEN` (optional)

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use kb_ingest_core::error::ServiceError;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// AWS credentials loaded from environment variables.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("session_token", &self.session_token.is_some())
            .finish_non_exhaustive()
    }
}

impl AwsCredentials {
    pub fn from_env() -> Result<Self, ServiceError> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").map_err(|e| {
            tracing::error!(error = ?e, "AWS_ACCESS_KEY_ID missing in environment");
            ServiceError::Credentials("AWS_ACCESS_KEY_ID environment variable not set".into())
        })?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|e| {
            tracing::error!(error = ?e, "AWS_SECRET_ACCESS_KEY missing in environment");
            ServiceError::Credentials("AWS_SECRET_ACCESS_KEY environment variable not set".into())
        })?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
        tracing::debug!(
            temporary = session_token.is_some(),
            "Loaded AWS credentials from environment"
        );
        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// The parts of a request that go into its signature.
#[derive(Debug)]
pub struct SigningInput<'a> {
    pub method: &'a str,
    /// `host[:port]` exactly as sent.
    pub host: &'a str,
    /// Already URI-encoded path, starting with `/`.
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub payload: &'a [u8],
    pub region: &'a str,
    pub service: &'a str,
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub payload_hash: String,
    pub security_token: Option<String>,
}

impl SignedHeaders {
    pub fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder
            .header("Authorization", &self.authorization)
            .header("x-amz-content-sha256", &self.payload_hash)
            .header("x-amz-date", &self.amz_date);
        match &self.security_token {
            Some(token) => builder.header("x-amz-security-token", token),
            None => builder,
        }
    }
}

/// Signs `input` with `creds` at time `now`.
pub fn sign(creds: &AwsCredentials, input: &SigningInput<'_>, now: DateTime<Utc>) -> SignedHeaders {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let payload_hash = hex_sha256(input.payload);

    let mut headers = vec![
        ("host".to_string(), input.host.to_string()),
        ("x-amz-content-sha256".to_string(), payload_hash.clone()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        input.method,
        canonical_uri(input.service, input.path),
        canonical_query(input.query),
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, input.region, input.service
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(
        &creds.secret_access_key,
        &date_stamp,
        input.region,
        input.service,
    );
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_headers, signature
        ),
        amz_date,
        payload_hash,
        security_token: creds.session_token.clone(),
    }
}

/// S3 signs the path as sent; every other service encodes it once more.
fn canonical_uri(service: &str, path: &str) -> String {
    if service == "s3" {
        path.to_string()
    } else {
        path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
    }
}

fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// URI-encode a path, keeping the `/` separators.
pub fn encode_path(path: &str) -> String {
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// URI-encode a string per RFC 3986, leaving only `A-Z a-z 0-9 - _ . ~`.
pub fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

pub fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn creds(session_token: Option<&str>) -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: session_token.map(str::to_string),
        }
    }

    #[test]
    fn derives_documented_signing_key() {
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn hashes_empty_payload() {
        assert_eq!(
            hex_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(uri_encode("a b/c~d"), "a%20b%2Fc~d");
        assert_eq!(encode_path("/documents/my file.pdf"), "/documents/my%20file.pdf");
    }

    #[test]
    fn authorization_names_scope_and_signed_headers() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let input = SigningInput {
            method: "POST",
            host: "bedrock-agent.us-west-2.amazonaws.com",
            path: "/knowledgebases/",
            query: &[],
            payload: br#"{"maxResults":100}"#,
            region: "us-west-2",
            service: "bedrock",
        };

        let signed = sign(&creds(None), &input, now);

        assert_eq!(signed.amz_date, "20240501T120000Z");
        assert!(signed.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/us-west-2/bedrock/aws4_request, \
             SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature="
        ));
        assert_eq!(signed.payload_hash, hex_sha256(br#"{"maxResults":100}"#));
        assert!(signed.security_token.is_none());
    }

    #[test]
    fn session_token_is_signed() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let input = SigningInput {
            method: "PUT",
            host: "kb-bench-us-west-2.s3.us-west-2.amazonaws.com",
            path: "/documents/document.pdf",
            query: &[],
            payload: b"%PDF",
            region: "us-west-2",
            service: "s3",
        };

        let signed = sign(&creds(Some("session")), &input, now);

        assert!(signed
            .authorization
            .contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token"));
        assert_eq!(signed.security_token.as_deref(), Some("session"));
    }

    #[test]
    fn signature_depends_on_payload() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mk = |payload: &'static [u8]| SigningInput {
            method: "PUT",
            host: "example.com",
            path: "/",
            query: &[],
            payload,
            region: "us-west-2",
            service: "s3",
        };
        let a = sign(&creds(None), &mk(&b"one"[..]), now);
        let b = sign(&creds(None), &mk(&b"two"[..]), now);
        assert_ne!(a.authorization, b.authorization);
    }
}
