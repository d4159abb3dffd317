//! Gmail Priority Labeler
//!
//! A polling loop that classifies incoming Gmail messages with a remote
//! language model and files each one under one of five priority labels.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 authentication with token caching
//! - **Scanning**: one page of candidate messages per cycle, header and
//!   body extraction
//! - **Classification**: a single-word verdict from a chat-completion
//!   deployment, matched exactly against the tracked label names
//! - **Labeling**: name-to-id resolution with create-if-missing, applied
//!   at most once per message
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_priority::auth;
//! use gmail_priority::client::{GmailClient, ProductionGmailClient};
//! use gmail_priority::config::Config;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let _config = Config::load(Path::new("config.toml")).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         Path::new("credentials.json"),
//!         Path::new("token.json"),
//!     )
//!     .await?;
//!
//!     let client = ProductionGmailClient::new(hub);
//!     let address = client.profile_email_address().await?;
//!     println!("Connected to account: {}", address);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`client`] - Gmail API client behind a mockable trait
//! - [`classifier`] - Remote classification client and verdict parsing
//! - [`config`] - Configuration and classifier secrets
//! - [`error`] - Error types and result aliases
//! - [`label_manager`] - Label resolution, creation, and application
//! - [`models`] - Core data structures
//! - [`poller`] - The scan/classify/label decision loop
//! - [`scanner`] - Candidate listing and message content extraction

pub mod auth;
pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod label_manager;
pub mod models;
pub mod poller;
pub mod scanner;

// Re-export commonly used types for convenience
pub use error::{GmailError, Result};

// Core data models
pub use models::{Classification, EmailMessage, LabelMap};

// Classifier types
pub use classifier::{Classifier, ClassifierVerdict, RemoteClassifier};

// Client types
pub use client::{GmailClient, LabelInfo, ProductionGmailClient};

// Config types
pub use config::{AccountConfig, ClassifierConfig, ClassifierSecrets, Config, PollConfig};

// Manager and loop types
pub use label_manager::LabelManager;
pub use poller::{CycleOutcome, PollState, Poller};
pub use scanner::MessageScanner;
