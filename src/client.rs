//! Gmail API client used by the scanner and label manager

use async_trait::async_trait;
use google_gmail1::api::{Label, Message, ModifyMessageRequest};
use tracing::debug;

use crate::auth::GmailHub;
use crate::error::{GmailError, Result};

/// Label info returned from the Gmail API
#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// Trait defining the Gmail operations the loop consumes.
///
/// The production implementation talks to the real API; tests mock this
/// boundary instead of the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List one page of message IDs, most recent first.
    async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>>;

    /// Get the label ids applied to a message via a metadata-only read
    /// (no body content is fetched).
    async fn get_message_label_ids(&self, message_id: &str) -> Result<Vec<String>>;

    /// Get a message in full format, including headers and body payload.
    async fn get_message_full(&self, message_id: &str) -> Result<Message>;

    /// List all labels in the account.
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a new label, returning its id.
    async fn create_label(&self, name: &str) -> Result<String>;

    /// Add a label to a message. Re-applying a present label is a no-op
    /// on the provider side.
    async fn apply_label(&self, message_id: &str, label_id: &str) -> Result<()>;

    /// The email address of the authenticated account.
    async fn profile_email_address(&self) -> Result<String>;
}

/// Production Gmail client backed by an authenticated hub.
///
/// All calls are sequential and unretried; failures surface to the caller
/// as [`GmailError`] values.
pub struct ProductionGmailClient {
    hub: GmailHub,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>> {
        let (_, response) = self
            .hub
            .users()
            .messages_list("me")
            .max_results(max_results)
            .add_scope("https://www.googleapis.com/auth/gmail.modify")
            .doit()
            .await?;

        let ids: Vec<String> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect();

        debug!("Listed {} candidate messages", ids.len());
        Ok(ids)
    }

    async fn get_message_label_ids(&self, message_id: &str) -> Result<Vec<String>> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", message_id)
            .format("metadata")
            .add_scope("https://www.googleapis.com/auth/gmail.modify")
            .doit()
            .await?;

        Ok(msg.label_ids.unwrap_or_default())
    }

    async fn get_message_full(&self, message_id: &str) -> Result<Message> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", message_id)
            .format("full")
            .add_scope("https://www.googleapis.com/auth/gmail.modify")
            .doit()
            .await?;

        Ok(msg)
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        let (_, response) = self
            .hub
            .users()
            .labels_list("me")
            .add_scope("https://www.googleapis.com/auth/gmail.labels")
            .doit()
            .await?;

        let labels: Vec<LabelInfo> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| match (label.id, label.name) {
                (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                _ => None,
            })
            .collect();

        debug!("Listed {} labels", labels.len());
        Ok(labels)
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        // Visible in both the label list and the message list, matching
        // what a manually created label looks like.
        let label = Label {
            name: Some(name.to_string()),
            message_list_visibility: Some("show".to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            ..Default::default()
        };

        let (_, created) = self
            .hub
            .users()
            .labels_create(label, "me")
            .add_scope("https://www.googleapis.com/auth/gmail.labels")
            .doit()
            .await?;

        created
            .id
            .ok_or_else(|| GmailError::LabelError("Created label has no ID".to_string()))
    }

    async fn apply_label(&self, message_id: &str, label_id: &str) -> Result<()> {
        let modify_request = ModifyMessageRequest {
            add_label_ids: Some(vec![label_id.to_string()]),
            remove_label_ids: None,
        };

        self.hub
            .users()
            .messages_modify(modify_request, "me", message_id)
            .add_scope("https://www.googleapis.com/auth/gmail.modify")
            .doit()
            .await?;

        Ok(())
    }

    async fn profile_email_address(&self) -> Result<String> {
        let (_, profile) = self
            .hub
            .users()
            .get_profile("me")
            .add_scope("https://www.googleapis.com/auth/gmail.modify")
            .doit()
            .await?;

        profile
            .email_address
            .ok_or_else(|| GmailError::ApiError("Profile has no email address".to_string()))
    }
}
