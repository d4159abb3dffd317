//! Label resolution and application against the Gmail label store

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::GmailClient;
use crate::error::Result;
use crate::models::{Classification, LabelMap};

/// Resolves the tracked label names to stable ids and applies them.
///
/// Label names are case-insensitively unique on the provider side; when the
/// account somehow holds near-duplicate names, the first case-insensitive
/// match in list order is treated as canonical.
pub struct LabelManager {
    client: Arc<dyn GmailClient>,
}

impl LabelManager {
    pub fn new(client: Arc<dyn GmailClient>) -> Self {
        Self { client }
    }

    /// Resolve every tracked classification to a label id, creating labels
    /// that do not exist yet.
    ///
    /// Ids carried over from `prior` are kept while they are still present
    /// in the provider's label list, so repeated calls with stable names
    /// never create duplicates. Called once at startup and again only when
    /// an id goes stale.
    pub async fn ensure_labels(&self, prior: &LabelMap) -> Result<LabelMap> {
        let labels = self.client.list_labels().await?;

        let live_ids: HashSet<&str> = labels.iter().map(|label| label.id.as_str()).collect();

        // First case-insensitive occurrence wins
        let mut by_name: HashMap<String, &str> = HashMap::new();
        for label in &labels {
            by_name
                .entry(label.name.to_lowercase())
                .or_insert(label.id.as_str());
        }

        let mut map = LabelMap::new();
        for classification in Classification::ALL {
            let name = classification.label_name();

            if let Some(id) = prior.id_for(classification) {
                if live_ids.contains(id) {
                    map.insert(classification, id.to_string());
                    continue;
                }
                debug!("Label id for '{}' is stale, re-resolving", name);
            }

            if let Some(id) = by_name.get(&name.to_lowercase()) {
                debug!("Label '{}' already exists with id {}", name, id);
                map.insert(classification, (*id).to_string());
                continue;
            }

            let id = self.client.create_label(name).await?;
            info!("Created label: {} (ID: {})", name, id);
            map.insert(classification, id);
        }

        Ok(map)
    }

    /// The label ids currently attached to a message, via a metadata-only
    /// read (no body fetch).
    pub async fn applied_label_ids(&self, message_id: &str) -> Result<Vec<String>> {
        self.client.get_message_label_ids(message_id).await
    }

    /// Attach a label to a message. Idempotent on the provider side; no
    /// internal retries.
    pub async fn apply_label(&self, message_id: &str, label_id: &str) -> Result<()> {
        self.client.apply_label(message_id, label_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LabelInfo, MockGmailClient};

    fn label(id: &str, name: &str) -> LabelInfo {
        LabelInfo {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_ensure_labels_creates_missing() {
        let mut client = MockGmailClient::new();
        client
            .expect_list_labels()
            .returning(|| Ok(vec![label("Label_9", "Urgent")]));
        client
            .expect_create_label()
            .times(4)
            .returning(|name| Ok(format!("Label_{}", name)));

        let manager = LabelManager::new(Arc::new(client));
        let map = manager.ensure_labels(&LabelMap::new()).await.unwrap();

        assert_eq!(map.len(), 5);
        assert_eq!(map.id_for(Classification::Urgent), Some("Label_9"));
        assert_eq!(
            map.id_for(Classification::ReplyMust),
            Some("Label_Reply_Must")
        );
    }

    #[tokio::test]
    async fn test_ensure_labels_idempotent() {
        // Second run sees the labels the first run created and returns the
        // same ids without creating anything
        let mut client = MockGmailClient::new();
        client.expect_list_labels().times(1).returning(|| Ok(vec![]));
        client
            .expect_create_label()
            .times(5)
            .returning(|name| Ok(format!("Label_{}", name)));

        let manager = LabelManager::new(Arc::new(client));
        let first = manager.ensure_labels(&LabelMap::new()).await.unwrap();

        let mut client = MockGmailClient::new();
        client.expect_list_labels().times(1).returning(|| {
            Ok(Classification::ALL
                .iter()
                .map(|c| label(&format!("Label_{}", c.label_name()), c.label_name()))
                .collect())
        });
        // No create_label expectation: creating anything here is a failure

        let manager = LabelManager::new(Arc::new(client));
        let second = manager.ensure_labels(&first).await.unwrap();

        for classification in Classification::ALL {
            assert_eq!(
                first.id_for(classification),
                second.id_for(classification),
                "id changed for {}",
                classification
            );
        }
    }

    #[tokio::test]
    async fn test_ensure_labels_matches_case_insensitively() {
        let mut client = MockGmailClient::new();
        client
            .expect_list_labels()
            .returning(|| Ok(vec![label("Label_1", "URGENT"), label("Label_2", "spam_new")]));
        client
            .expect_create_label()
            .times(3)
            .returning(|name| Ok(format!("Label_{}", name)));

        let manager = LabelManager::new(Arc::new(client));
        let map = manager.ensure_labels(&LabelMap::new()).await.unwrap();

        assert_eq!(map.id_for(Classification::Urgent), Some("Label_1"));
        assert_eq!(map.id_for(Classification::SpamNew), Some("Label_2"));
    }

    #[tokio::test]
    async fn test_ensure_labels_first_duplicate_wins() {
        let mut client = MockGmailClient::new();
        client.expect_list_labels().returning(|| {
            Ok(vec![
                label("Label_1", "Urgent"),
                label("Label_2", "URGENT"),
                label("Label_3", "urgent"),
            ])
        });
        client
            .expect_create_label()
            .times(4)
            .returning(|name| Ok(format!("Label_{}", name)));

        let manager = LabelManager::new(Arc::new(client));
        let map = manager.ensure_labels(&LabelMap::new()).await.unwrap();

        assert_eq!(map.id_for(Classification::Urgent), Some("Label_1"));
    }

    #[tokio::test]
    async fn test_ensure_labels_re_resolves_stale_id() {
        let mut client = MockGmailClient::new();
        client
            .expect_list_labels()
            .returning(|| Ok(vec![label("Label_new", "Urgent")]));
        client
            .expect_create_label()
            .times(4)
            .returning(|name| Ok(format!("Label_{}", name)));

        let prior: LabelMap = [(Classification::Urgent, "Label_gone".to_string())]
            .into_iter()
            .collect();

        let manager = LabelManager::new(Arc::new(client));
        let map = manager.ensure_labels(&prior).await.unwrap();

        assert_eq!(map.id_for(Classification::Urgent), Some("Label_new"));
    }
}
