//! Outbound notification seam.
//!
//! Services notify only after their transaction has committed. Delivery
//! failures are logged and never roll anything back.

use async_trait::async_trait;
use fediseer_common::AppResult;
use futures::future::join_all;
use std::sync::Arc;

/// Delivers messages to instance administrators.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message` to the administrators of `domain`.
    async fn notify(&self, domain: &str, message: &str) -> AppResult<()>;

    /// Send `message` privately to one admin account on `domain`.
    ///
    /// Used to deliver API keys, so callers treat failure as fatal.
    async fn direct_message(&self, domain: &str, username: &str, message: &str) -> AppResult<()>;
}

/// Notifier that writes every message to the log.
#[derive(Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, domain: &str, message: &str) -> AppResult<()> {
        tracing::info!(domain = domain, message = message, "Notification");
        Ok(())
    }

    async fn direct_message(&self, domain: &str, username: &str, _message: &str) -> AppResult<()> {
        // message bodies may carry API keys
        tracing::info!(domain = domain, username = username, "Direct message sent");
        Ok(())
    }
}

/// Type alias for a shared notifier.
pub type NotifierService = Arc<dyn Notifier>;

/// Notify each domain, logging failures.
pub async fn notify_all(notifier: &dyn Notifier, domains: &[String], message: &str) {
    let results = join_all(domains.iter().map(|d| notifier.notify(d, message))).await;
    for (domain, result) in domains.iter().zip(results) {
        if let Err(e) = result {
            tracing::warn!(domain = %domain, error = %e, "Failed to send notification");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every call.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail_direct: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, domain: &str, message: &str) -> AppResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((domain.to_string(), message.to_string()));
            Ok(())
        }

        async fn direct_message(
            &self,
            domain: &str,
            username: &str,
            message: &str,
        ) -> AppResult<()> {
            if self.fail_direct {
                return Err(fediseer_common::AppError::Federation("offline".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((format!("@{username}@{domain}"), message.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_notify_all_reaches_every_domain() {
        let notifier = RecordingNotifier::default();
        let domains = vec!["a.example".to_string(), "b.example".to_string()];

        notify_all(&notifier, &domains, "hello").await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].0, "b.example");
    }
}
