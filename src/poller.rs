//! The polling decision loop: scan, classify, label, sleep, repeat

use std::io::IsTerminal;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, ClassifierVerdict};
use crate::config::PollConfig;
use crate::error::{GmailError, Result};
use crate::label_manager::LabelManager;
use crate::models::LabelMap;
use crate::scanner::MessageScanner;

/// Loop state. STOPPED is terminal; there is no resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Stopped,
}

/// Counters for one completed poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Candidate messages returned by the listing call.
    pub listed: usize,
    /// Messages skipped because a tracked label was already present.
    pub skipped: usize,
    /// Messages that received a label this cycle.
    pub labeled: usize,
    /// Messages whose verdict matched no tracked label name.
    pub unmatched: usize,
    /// Messages left unclassified because the classifier is unconfigured.
    pub unclassified: usize,
}

/// Sequential decision loop over one mailbox.
///
/// One message at a time, one page per cycle; every provider call blocks
/// the loop until it returns. The label map is the only state carried
/// across cycles.
pub struct Poller {
    scanner: MessageScanner,
    labels: LabelManager,
    classifier: Box<dyn Classifier>,
    label_map: LabelMap,
    interval: Duration,
    max_results: u32,
    state: PollState,
}

impl Poller {
    pub fn new(
        scanner: MessageScanner,
        labels: LabelManager,
        classifier: Box<dyn Classifier>,
        label_map: LabelMap,
        poll: &PollConfig,
    ) -> Self {
        Self {
            scanner,
            labels,
            classifier,
            label_map,
            interval: Duration::from_secs(poll.interval_secs),
            max_results: poll.max_results,
            state: PollState::Polling,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Poll until the quit key arrives. Errors inside a cycle are logged
    /// and the loop continues after the fixed delay; only the caller's
    /// setup failures are fatal.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Polling every {}s; press 'q' or Esc to stop",
            self.interval.as_secs()
        );

        while self.state == PollState::Polling {
            match self.run_cycle().await {
                Ok(outcome) => debug!(
                    listed = outcome.listed,
                    skipped = outcome.skipped,
                    labeled = outcome.labeled,
                    unmatched = outcome.unmatched,
                    "Cycle complete"
                ),
                Err(e) => warn!("Error: {}", e),
            }

            // The quit check runs between cycles; an in-flight cycle always
            // completes first.
            if wait_for_quit(self.interval).await {
                info!("Stopping");
                self.state = PollState::Stopped;
            }
        }

        Ok(())
    }

    /// One pass over the current page of candidate messages.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let mut outcome = CycleOutcome::default();

        let ids = self.scanner.list_candidate_ids(self.max_results).await?;
        outcome.listed = ids.len();
        if ids.is_empty() {
            info!("No messages found");
            return Ok(outcome);
        }

        for id in ids {
            // Metadata-only read first: a message already carrying one of
            // the tracked labels is never fetched in full or classified.
            let applied = self.labels.applied_label_ids(&id).await?;
            if self.label_map.contains_any(&applied) {
                debug!(message_id = %id, "Already labeled, skipping");
                outcome.skipped += 1;
                continue;
            }

            let email = self.scanner.fetch_full(&id).await?;

            match self.classifier.classify(&email).await? {
                ClassifierVerdict::Classified(classification) => {
                    let Some(label_id) = self
                        .label_map
                        .id_for(classification)
                        .map(str::to_string)
                    else {
                        warn!("No label id resolved for {}", classification);
                        outcome.unmatched += 1;
                        continue;
                    };

                    match self.labels.apply_label(&id, &label_id).await {
                        Ok(()) => {
                            info!("Applied label: {}", classification);
                            outcome.labeled += 1;
                        }
                        Err(GmailError::BadRequest(message)) => {
                            // Most likely a stale label id. Refresh the map
                            // in place; the message stays unlabeled and a
                            // later cycle picks it up again.
                            warn!("Apply failed ({}); refreshing label map", message);
                            self.label_map = self.labels.ensure_labels(&self.label_map).await?;
                        }
                        Err(e) => return Err(e),
                    }
                }
                ClassifierVerdict::NoMatch(verdict) => {
                    info!(message_id = %id, verdict = %verdict, "No matching label found");
                    outcome.unmatched += 1;
                }
                ClassifierVerdict::Unconfigured => {
                    outcome.unclassified += 1;
                }
            }
        }

        Ok(outcome)
    }
}

/// Wait out the inter-cycle delay while watching for the quit key
/// (`q` or Esc). Returns true when the user asked to stop.
async fn wait_for_quit(delay: Duration) -> bool {
    if !std::io::stdin().is_terminal() {
        tokio::time::sleep(delay).await;
        return false;
    }

    tokio::task::spawn_blocking(move || watch_quit_key(delay))
        .await
        .unwrap_or(false)
}

/// Blocking keyboard watch. Raw mode is held only for the duration of the
/// wait so regular log output stays on a cooked terminal.
fn watch_quit_key(delay: Duration) -> bool {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind};
    use crossterm::terminal;
    use std::time::Instant;

    if terminal::enable_raw_mode().is_err() {
        std::thread::sleep(delay);
        return false;
    }

    let deadline = Instant::now() + delay;
    let mut quit = false;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match event::poll(remaining) {
            Ok(true) => {
                if let Ok(Event::Key(key)) = event::read() {
                    // Only handle Press events to avoid key bounce on
                    // Windows, which also sends Repeat and Release.
                    if key.kind == KeyEventKind::Press
                        && matches!(
                            key.code,
                            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc
                        )
                    {
                        quit = true;
                        break;
                    }
                }
            }
            Ok(false) => break, // timed out
            Err(_) => {
                std::thread::sleep(remaining);
                break;
            }
        }
    }

    let _ = terminal::disable_raw_mode();
    quit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MockClassifier;
    use crate::client::{GmailClient, LabelInfo, MockGmailClient};
    use crate::models::Classification;
    use google_gmail1::api::Message;
    use std::sync::Arc;

    fn tracked_map() -> LabelMap {
        Classification::ALL
            .iter()
            .map(|c| (*c, format!("id_{}", c.label_name())))
            .collect()
    }

    fn poller(client: MockGmailClient, classifier: MockClassifier, map: LabelMap) -> Poller {
        let client: Arc<dyn GmailClient> = Arc::new(client);
        Poller::new(
            MessageScanner::new(Arc::clone(&client)),
            LabelManager::new(client),
            Box::new(classifier),
            map,
            &PollConfig::default(),
        )
    }

    fn bare_message(id: &str) -> Message {
        Message {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_already_labeled_message_is_skipped() {
        let mut client = MockGmailClient::new();
        client
            .expect_list_message_ids()
            .returning(|_| Ok(vec!["a".to_string()]));
        client
            .expect_get_message_label_ids()
            .returning(|_| Ok(vec!["id_Urgent".to_string()]));
        // No expectations for get_message_full or apply_label: the skip
        // invariant means neither may be called.
        let classifier = MockClassifier::new();

        let mut poller = poller(client, classifier, tracked_map());
        let outcome = poller.run_cycle().await.unwrap();

        assert_eq!(outcome.listed, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.labeled, 0);
    }

    #[tokio::test]
    async fn test_one_cycle_labels_unlabeled_messages() {
        let mut client = MockGmailClient::new();
        client.expect_list_message_ids().returning(|_| {
            Ok(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        });
        client
            .expect_get_message_label_ids()
            .returning(|id| match id {
                "a" => Ok(vec!["id_Urgent".to_string()]),
                "c" => Ok(vec!["INBOX".to_string()]),
                _ => Ok(vec![]),
            });
        client
            .expect_get_message_full()
            .times(2)
            .returning(|id| Ok(bare_message(id)));
        client
            .expect_apply_label()
            .withf(|id, label| id == "b" && label == "id_Low_Priority")
            .times(1)
            .returning(|_, _| Ok(()));
        client
            .expect_apply_label()
            .withf(|id, label| id == "c" && label == "id_Spam_New")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut classifier = MockClassifier::new();
        classifier.expect_classify().returning(|email| {
            Ok(match email.id.as_str() {
                "b" => ClassifierVerdict::Classified(Classification::LowPriority),
                _ => ClassifierVerdict::Classified(Classification::SpamNew),
            })
        });

        let mut poller = poller(client, classifier, tracked_map());
        let outcome = poller.run_cycle().await.unwrap();

        assert_eq!(outcome.listed, 3);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.labeled, 2);
        assert_eq!(outcome.unmatched, 0);
    }

    #[tokio::test]
    async fn test_unmatched_verdict_applies_nothing() {
        let mut client = MockGmailClient::new();
        client
            .expect_list_message_ids()
            .returning(|_| Ok(vec!["a".to_string()]));
        client
            .expect_get_message_label_ids()
            .returning(|_| Ok(vec![]));
        client
            .expect_get_message_full()
            .returning(|id| Ok(bare_message(id)));
        // No apply_label expectation: any apply call fails the test

        let mut classifier = MockClassifier::new();
        classifier
            .expect_classify()
            .returning(|_| Ok(ClassifierVerdict::NoMatch("I think Urgent".to_string())));

        let mut poller = poller(client, classifier, tracked_map());
        let outcome = poller.run_cycle().await.unwrap();

        assert_eq!(outcome.labeled, 0);
        assert_eq!(outcome.unmatched, 1);
    }

    #[tokio::test]
    async fn test_unconfigured_classifier_moves_to_next_message() {
        let mut client = MockGmailClient::new();
        client
            .expect_list_message_ids()
            .returning(|_| Ok(vec!["a".to_string(), "b".to_string()]));
        client
            .expect_get_message_label_ids()
            .returning(|_| Ok(vec![]));
        client
            .expect_get_message_full()
            .times(2)
            .returning(|id| Ok(bare_message(id)));
        client
            .expect_apply_label()
            .withf(|id, label| id == "b" && label == "id_Urgent")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut classifier = MockClassifier::new();
        classifier.expect_classify().returning(|email| {
            Ok(match email.id.as_str() {
                "a" => ClassifierVerdict::Unconfigured,
                _ => ClassifierVerdict::Classified(Classification::Urgent),
            })
        });

        let mut poller = poller(client, classifier, tracked_map());
        let outcome = poller.run_cycle().await.unwrap();

        assert_eq!(outcome.unclassified, 1);
        assert_eq!(outcome.labeled, 1);
    }

    #[tokio::test]
    async fn test_classifier_failure_ends_cycle() {
        let mut client = MockGmailClient::new();
        client
            .expect_list_message_ids()
            .returning(|_| Ok(vec!["a".to_string()]));
        client
            .expect_get_message_label_ids()
            .returning(|_| Ok(vec![]));
        client
            .expect_get_message_full()
            .returning(|id| Ok(bare_message(id)));

        let mut classifier = MockClassifier::new();
        classifier.expect_classify().returning(|_| {
            Err(GmailError::NetworkError("connection refused".to_string()))
        });

        let mut poller = poller(client, classifier, tracked_map());
        assert!(poller.run_cycle().await.is_err());
    }

    #[tokio::test]
    async fn test_stale_label_id_refreshes_map() {
        let mut client = MockGmailClient::new();
        client
            .expect_list_message_ids()
            .returning(|_| Ok(vec!["a".to_string()]));
        client
            .expect_get_message_label_ids()
            .returning(|_| Ok(vec![]));
        client
            .expect_get_message_full()
            .returning(|id| Ok(bare_message(id)));
        client
            .expect_apply_label()
            .times(1)
            .returning(|_, _| Err(GmailError::BadRequest("labelId not found".to_string())));
        // The refresh path re-lists labels and finds fresh ids
        client.expect_list_labels().times(1).returning(|| {
            Ok(Classification::ALL
                .iter()
                .map(|c| LabelInfo {
                    id: format!("fresh_{}", c.label_name()),
                    name: c.label_name().to_string(),
                })
                .collect())
        });

        let mut classifier = MockClassifier::new();
        classifier
            .expect_classify()
            .returning(|_| Ok(ClassifierVerdict::Classified(Classification::Urgent)));

        let mut poller = poller(client, classifier, tracked_map());
        let outcome = poller.run_cycle().await.unwrap();

        assert_eq!(outcome.labeled, 0);
        assert_eq!(
            poller.label_map.id_for(Classification::Urgent),
            Some("fresh_Urgent")
        );
    }

    #[tokio::test]
    async fn test_empty_listing_is_a_quiet_cycle() {
        let mut client = MockGmailClient::new();
        client.expect_list_message_ids().returning(|_| Ok(vec![]));

        let mut poller = poller(client, MockClassifier::new(), tracked_map());
        let outcome = poller.run_cycle().await.unwrap();

        assert_eq!(outcome, CycleOutcome::default());
        assert_eq!(poller.state(), PollState::Polling);
    }
}
