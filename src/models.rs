use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The closed set of priority verdicts the remote model may return.
///
/// The serialized names double as the Gmail label names, so a verdict maps
/// to a label by name equality and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Reply_Must")]
    ReplyMust,
    #[serde(rename = "Urgent")]
    Urgent,
    #[serde(rename = "Information")]
    Information,
    #[serde(rename = "Low_Priority")]
    LowPriority,
    #[serde(rename = "Spam_New")]
    SpamNew,
}

impl Classification {
    /// All tracked classifications, in rubric order.
    pub const ALL: [Classification; 5] = [
        Classification::ReplyMust,
        Classification::Urgent,
        Classification::Information,
        Classification::LowPriority,
        Classification::SpamNew,
    ];

    /// The Gmail label name for this classification.
    pub fn label_name(&self) -> &'static str {
        match self {
            Classification::ReplyMust => "Reply_Must",
            Classification::Urgent => "Urgent",
            Classification::Information => "Information",
            Classification::LowPriority => "Low_Priority",
            Classification::SpamNew => "Spam_New",
        }
    }

    /// Parse a model verdict. The input must exactly equal one of the five
    /// label names; anything else is no classification at all.
    pub fn parse(s: &str) -> Option<Self> {
        Classification::ALL
            .iter()
            .find(|c| c.label_name() == s)
            .copied()
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_name())
    }
}

/// Read-only snapshot of one candidate message, fetched per poll cycle.
///
/// Header fields carry placeholder values when the message omits them; the
/// body is already decoded to plain text (empty when nothing decodable was
/// found). Mutation happens only through the label store, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub body: String,
    pub label_ids: Vec<String>,
}

/// Mapping from classification to the provider-assigned label id.
///
/// Built once at startup by the label manager and threaded explicitly
/// through the poll loop; refreshed in place only when an id goes stale.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    ids: HashMap<Classification, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The label id for a classification, if resolved.
    pub fn id_for(&self, classification: Classification) -> Option<&str> {
        self.ids.get(&classification).map(String::as_str)
    }

    /// Whether any tracked label id appears in the given applied set.
    pub fn contains_any(&self, applied: &[String]) -> bool {
        applied.iter().any(|id| self.is_tracked(id))
    }

    /// Whether the id belongs to one of the tracked labels.
    pub fn is_tracked(&self, label_id: &str) -> bool {
        self.ids.values().any(|id| id == label_id)
    }

    pub fn insert(&mut self, classification: Classification, id: String) {
        self.ids.insert(classification, id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate over (classification, id) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Classification, &str)> {
        self.ids.iter().map(|(c, id)| (*c, id.as_str()))
    }
}

impl FromIterator<(Classification, String)> for LabelMap {
    fn from_iter<T: IntoIterator<Item = (Classification, String)>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_names() {
        assert_eq!(
            Classification::parse("Reply_Must"),
            Some(Classification::ReplyMust)
        );
        assert_eq!(Classification::parse("Urgent"), Some(Classification::Urgent));
        assert_eq!(
            Classification::parse("Information"),
            Some(Classification::Information)
        );
        assert_eq!(
            Classification::parse("Low_Priority"),
            Some(Classification::LowPriority)
        );
        assert_eq!(
            Classification::parse("Spam_New"),
            Some(Classification::SpamNew)
        );
    }

    #[test]
    fn test_parse_rejects_inexact_names() {
        assert_eq!(Classification::parse("urgent"), None);
        assert_eq!(Classification::parse("I think Urgent"), None);
        assert_eq!(Classification::parse("Spam"), None);
        assert_eq!(Classification::parse(""), None);
    }

    #[test]
    fn test_label_names_round_trip() {
        for classification in Classification::ALL {
            assert_eq!(
                Classification::parse(classification.label_name()),
                Some(classification)
            );
        }
    }

    #[test]
    fn test_serde_uses_label_names() {
        let json = serde_json::to_string(&Classification::LowPriority).unwrap();
        assert_eq!(json, "\"Low_Priority\"");

        let parsed: Classification = serde_json::from_str("\"Spam_New\"").unwrap();
        assert_eq!(parsed, Classification::SpamNew);
    }

    #[test]
    fn test_label_map_tracking() {
        let map: LabelMap = [
            (Classification::Urgent, "Label_1".to_string()),
            (Classification::SpamNew, "Label_2".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(map.id_for(Classification::Urgent), Some("Label_1"));
        assert_eq!(map.id_for(Classification::ReplyMust), None);
        assert!(map.is_tracked("Label_2"));
        assert!(!map.is_tracked("INBOX"));
        assert!(map.contains_any(&["INBOX".to_string(), "Label_1".to_string()]));
        assert!(!map.contains_any(&["INBOX".to_string()]));
        assert_eq!(map.len(), 2);
    }
}
