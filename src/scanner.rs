//! Message scanning: candidate listing plus header and body extraction

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::client::GmailClient;
use crate::error::Result;
use crate::models::EmailMessage;

/// Placeholder used when a message carries no Subject header.
const NO_SUBJECT: &str = "(no subject)";
/// Placeholder used when a message carries no From or To header.
const UNKNOWN: &str = "(unknown)";
/// Placeholder used when a message carries no Cc header.
const NO_CC: &str = "(none)";

/// Retrieves candidate messages and turns raw API messages into
/// [`EmailMessage`] snapshots.
pub struct MessageScanner {
    client: Arc<dyn GmailClient>,
}

impl MessageScanner {
    pub fn new(client: Arc<dyn GmailClient>) -> Self {
        Self { client }
    }

    /// List one page of candidate message ids, in the provider's
    /// most-recent-first order. No deeper pagination happens per cycle.
    pub async fn list_candidate_ids(&self, max_results: u32) -> Result<Vec<String>> {
        self.client.list_message_ids(max_results).await
    }

    /// Fetch a message in full format and extract the fields the
    /// classifier consumes.
    pub async fn fetch_full(&self, message_id: &str) -> Result<EmailMessage> {
        let msg = self.client.get_message_full(message_id).await?;

        let id = msg.id.clone().unwrap_or_else(|| message_id.to_string());
        let label_ids = msg.label_ids.clone().unwrap_or_default();

        // Normalize the payload back to its wire JSON shape so header and
        // part scanning are uniform regardless of how the generated API
        // types model individual fields.
        let payload = serde_json::to_value(&msg.payload)?;

        let subject = header_value(&payload, "Subject").unwrap_or_else(|| NO_SUBJECT.to_string());
        let from = header_value(&payload, "From").unwrap_or_else(|| UNKNOWN.to_string());
        let to = header_value(&payload, "To").unwrap_or_else(|| UNKNOWN.to_string());
        let cc = header_value(&payload, "Cc").unwrap_or_else(|| NO_CC.to_string());
        let body = extract_body(&payload);

        debug!(
            message_id = %id,
            body_len = body.len(),
            "Fetched message: {}", subject
        );

        Ok(EmailMessage {
            id,
            subject,
            from,
            to,
            cc,
            body,
            label_ids,
        })
    }
}

/// Look up a header value by case-insensitive name in a wire-shaped payload.
fn header_value(payload: &Value, name: &str) -> Option<String> {
    payload
        .get("headers")?
        .as_array()?
        .iter()
        .find_map(|header| {
            let header_name = header.get("name")?.as_str()?;
            if header_name.eq_ignore_ascii_case(name) {
                header.get("value")?.as_str().map(str::to_string)
            } else {
                None
            }
        })
}

/// Extract the plain-text body from a wire-shaped payload.
///
/// Policy: prefer a direct body payload; otherwise search the parts for a
/// `text/plain` part, falling back to the first part. A message with no
/// decodable body yields an empty string.
pub(crate) fn extract_body(payload: &Value) -> String {
    if let Some(text) = payload
        .get("body")
        .and_then(|body| body.get("data"))
        .and_then(Value::as_str)
        .and_then(decode_base64url)
    {
        return text;
    }

    if let Some(parts) = payload.get("parts").and_then(Value::as_array) {
        let part = parts
            .iter()
            .find(|part| part.get("mimeType").and_then(Value::as_str) == Some("text/plain"))
            .or_else(|| parts.first());

        if let Some(text) = part
            .and_then(|part| part.get("body"))
            .and_then(|body| body.get("data"))
            .and_then(Value::as_str)
            .and_then(decode_base64url)
        {
            return text;
        }
    }

    String::new()
}

/// Decode Gmail's URL-safe base64 variant (`-` and `_` in place of `+` and
/// `/`), tolerating both padded and unpadded input. Returns `None` when the
/// input is not valid base64url or not valid UTF-8.
pub(crate) fn decode_base64url(encoded: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()
}
