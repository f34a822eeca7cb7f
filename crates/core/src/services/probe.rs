//! Remote metadata probe seam.

use async_trait::async_trait;
use fediseer_common::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Metadata reported by a remote instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    /// Lowercase software family, e.g. `lemmy`.
    pub software: String,
    pub open_registrations: bool,
    pub approval_required: bool,
    pub email_verify: bool,
    pub has_captcha: bool,
}

impl InstanceMetadata {
    /// Placeholder metadata for an instance that could not be reached.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            software: "unknown".to_string(),
            open_registrations: false,
            approval_required: false,
            email_verify: false,
            has_captcha: false,
        }
    }
}

/// Probe failure.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{domain} is unreachable: {reason}")]
    Unreachable { domain: String, reason: String },

    #[error("{domain} returned an invalid response: {reason}")]
    InvalidResponse { domain: String, reason: String },
}

impl From<ProbeError> for AppError {
    fn from(err: ProbeError) -> Self {
        Self::ServiceUnavailable(err.to_string())
    }
}

/// Reads metadata and admin accounts from a remote instance.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    /// Fetch the instance's self-reported metadata.
    async fn probe(&self, domain: &str) -> Result<InstanceMetadata, ProbeError>;

    /// Usernames of the instance's administrators.
    ///
    /// `software` selects the discovery strategy.
    async fn admins(&self, domain: &str, software: &str) -> Result<Vec<String>, ProbeError>;
}

/// Type alias for a shared probe.
pub type ProbeService = Arc<dyn MetadataProbe>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe answering from fixed tables; unknown domains are unreachable.
    #[derive(Default)]
    pub struct StaticProbe {
        pub metadata: HashMap<String, InstanceMetadata>,
        pub admins: HashMap<String, Vec<String>>,
        /// Number of `probe` calls, shared with clones of the handle.
        pub calls: Arc<AtomicUsize>,
    }

    impl StaticProbe {
        pub fn with(domain: &str, software: &str, admins: &[&str]) -> Self {
            let mut probe = Self::default();
            probe.metadata.insert(
                domain.to_string(),
                InstanceMetadata {
                    software: software.to_string(),
                    ..InstanceMetadata::unknown()
                },
            );
            probe.admins.insert(
                domain.to_string(),
                admins.iter().map(|a| (*a).to_string()).collect(),
            );
            probe
        }
    }

    #[async_trait]
    impl MetadataProbe for StaticProbe {
        async fn probe(&self, domain: &str) -> Result<InstanceMetadata, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.metadata
                .get(domain)
                .cloned()
                .ok_or_else(|| ProbeError::Unreachable {
                    domain: domain.to_string(),
                    reason: "connection refused".to_string(),
                })
        }

        async fn admins(&self, domain: &str, _software: &str) -> Result<Vec<String>, ProbeError> {
            Ok(self.admins.get(domain).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_probe_error_is_service_unavailable() {
        let err: AppError = ProbeError::Unreachable {
            domain: "down.example".to_string(),
            reason: "timeout".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        assert!(err.to_string().contains("down.example"));
    }
}
