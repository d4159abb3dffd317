//! Remote email classification via a chat-completion deployment

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{ClassifierConfig, ClassifierSecrets};
use crate::error::{GmailError, Result};
use crate::models::{Classification, EmailMessage};

const SYSTEM_PROMPT: &str = "You are an assistant that classifies emails.";

/// Outcome of one classification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierVerdict {
    /// The model returned exactly one of the five label names.
    Classified(Classification),
    /// The model replied, but with text that is not a label name. Not an
    /// error; the message is left unlabeled.
    NoMatch(String),
    /// The endpoint or key is not configured. The message is skipped for
    /// this cycle and retried once configuration appears.
    Unconfigured,
}

/// Seam between the decision loop and the remote model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, email: &EmailMessage) -> Result<ClassifierVerdict>;
}

/// Classifier backed by an Azure-OpenAI-style chat-completions deployment.
///
/// Secrets are re-read on every call, so creating `secret.json` while the
/// loop is running takes effect on the next message without a restart.
pub struct RemoteClassifier {
    http: reqwest::Client,
    secrets_path: PathBuf,
    deployment: String,
    api_version: String,
    max_tokens: u32,
    self_address: String,
}

impl RemoteClassifier {
    pub fn new(config: &ClassifierConfig, self_address: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secrets_path: config.secrets_path.clone(),
            deployment: config.deployment.clone(),
            api_version: config.api_version.clone(),
            max_tokens: config.max_tokens,
            self_address,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    /// Zero for deterministic sampling; the verdict must be reproducible.
    temperature: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn classify(&self, email: &EmailMessage) -> Result<ClassifierVerdict> {
        let secrets = match ClassifierSecrets::load(&self.secrets_path).await? {
            Some(secrets) => secrets,
            None => {
                warn!(
                    "Secrets file {:?} not found; skipping classification",
                    self.secrets_path
                );
                return Ok(ClassifierVerdict::Unconfigured);
            }
        };

        let (endpoint, api_key) = match (secrets.endpoint(), secrets.api_key()) {
            (Some(endpoint), Some(api_key)) => (endpoint.to_string(), api_key.to_string()),
            _ => {
                warn!("Classifier endpoint or key missing from secrets file");
                return Ok(ClassifierVerdict::Unconfigured);
            }
        };

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        );

        let prompt = build_prompt(email, &self.self_address);
        let request = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: 0,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GmailError::ClassificationError(format!(
                "Completion endpoint returned HTTP {}",
                status
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            GmailError::ClassificationError(format!("Malformed completion response: {}", e))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                GmailError::ClassificationError(
                    "Completion response contained no choices".to_string(),
                )
            })?;

        let verdict = normalize_verdict(&content);
        match Classification::parse(&verdict) {
            Some(classification) => {
                info!("AI classification: {}", classification);
                Ok(ClassifierVerdict::Classified(classification))
            }
            None => Ok(ClassifierVerdict::NoMatch(verdict)),
        }
    }
}

/// Strip surrounding whitespace and quote characters from a model reply.
fn normalize_verdict(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Build the instructional prompt embedding the message fields and the
/// five-way rule set.
fn build_prompt(email: &EmailMessage, self_address: &str) -> String {
    format!(
        r#"Analyze the email below, together with its recipients (TO/CC), and assign exactly one label.

Output format:
Return only one word, which must be one of:
Reply_Must | Urgent | Information | Low_Priority | Spam_New
Do not include explanations, reasoning, or extra text.

Labeling rules:
Reply_Must
Condition: the SELF address is in the "To" field.
The sender is directly requesting a reply or action.
Example: "Please confirm by today", "Can you share the report?".
Urgent
Condition: the SELF address is in the "To" field.
The sender mentions urgent, immediate, or critical action required.
Example: "Urgent! Need your response ASAP", "Please send acknowledgement immediately".
Information
Condition: the SELF address is in the "CC" field.
The email is FYI only; no action is required.
Example: "Sharing project updates for awareness", "Just for your information".
Low_Priority
Condition: the SELF address is in the "To" field.
The mail contains updates, work progress, or general sharing, but no action is expected.
Example: "Team has completed the task", "Work update shared".
Spam_New
Condition: the mail is irrelevant, advertisement, marketing, or spam.
Example: "Buy this product now", "Limited time offer".
If the SELF address appears in neither "To" nor "CC", treat the mail as Information.

Subject: {subject}
From: {from}
TO: {to}
CC: {cc}
SELF: {self_address} (the address the label is being identified for)
Body: {body}
"#,
        subject = email.subject,
        from = email.from,
        to = email.to,
        cc = email.cc,
        self_address = self_address,
        body = email.body,
    )
}
