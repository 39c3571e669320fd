//! Outbound notifications to students.

use crate::error::{CampusError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

/// Acknowledgement returned by a mailer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailReceipt {
    pub to: String,
    pub status: String,
}

/// A message handed to a mailer.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Trait for delivering messages to students.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, message: &str) -> Result<EmailReceipt>;
}

/// Mailer that only logs and remembers what it was asked to send.
#[derive(Default)]
pub struct MockMailer {
    outbox: Mutex<Vec<SentEmail>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far, oldest first.
    pub fn outbox(&self) -> Vec<SentEmail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, to: &str, message: &str) -> Result<EmailReceipt> {
        info!("[EMAIL MOCK] To: {} | Message: {}", to, message);

        self.outbox
            .lock()
            .map_err(|e| CampusError::Storage(format!("Failed to acquire lock: {}", e)))?
            .push(SentEmail {
                to: to.to_string(),
                message: message.to_string(),
                sent_at: Utc::now(),
            });

        Ok(EmailReceipt {
            to: to.to_string(),
            status: "sent".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_mailer_records_messages() {
        let mailer = MockMailer::new();
        let receipt = mailer.send("ana@uni.edu", "Fees are due").await.unwrap();
        assert_eq!(receipt.status, "sent");

        let outbox = mailer.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "ana@uni.edu");
        assert_eq!(outbox[0].message, "Fees are due");
    }

    #[test]
    fn test_mock_mailer_outbox_starts_empty() {
        let mailer = MockMailer::new();
        assert!(mailer.outbox().is_empty());

        tokio_test::block_on(mailer.send("ben@uni.edu", "Library closes early")).unwrap();
        assert_eq!(mailer.outbox().len(), 1);
    }
}
