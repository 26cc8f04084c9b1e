//! Idempotency tokens for ingestion job submission.

use chrono::Utc;
use uuid::Uuid;

/// Shortest client token the knowledge-base service accepts.
pub const MIN_CLIENT_TOKEN_LEN: usize = 33;

/// Generates `"<unix-seconds>-<uuid-v4>"`.
///
/// Always at least 38 characters, alphanumerics and `-` only, starting with a
/// digit. Two calls only collide if their random UUIDs do.
pub fn generate_client_token() -> String {
    let timestamp = Utc::now().timestamp().max(0);
    format!("{}-{}", timestamp, Uuid::new_v4())
}
