//! Runtime trust settings derived from configuration.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use fediseer_common::{
    Config,
    config::{RateLimitConfig, TrustConfig},
};

/// Database id of the root instance.
pub const ROOT_ID: i32 = 0;

/// The distinguished root of the guarantee tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustRoot {
    pub id: i32,
    pub domain: String,
    pub admin: String,
}

/// Limits and the root, shared by every service.
#[derive(Debug, Clone)]
pub struct TrustSettings {
    pub root: TrustRoot,
    pub trust: TrustConfig,
    pub rate_limit: RateLimitConfig,
}

impl TrustSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.trust.clone(), config.rate_limit.clone())
    }

    #[must_use]
    pub fn new(trust: TrustConfig, rate_limit: RateLimitConfig) -> Self {
        Self {
            root: TrustRoot {
                id: ROOT_ID,
                domain: trust.root_domain.to_lowercase(),
                admin: trust.root_admin.clone(),
            },
            trust,
            rate_limit,
        }
    }

    #[must_use]
    pub const fn is_root(&self, instance_id: i32) -> bool {
        instance_id == self.root.id
    }

    /// Start of the current rate-limit window.
    #[must_use]
    pub fn rate_window_start(&self) -> DateTime<FixedOffset> {
        ago(self.rate_limit.window_secs)
    }
}

/// `now - secs` as a database timestamp.
#[must_use]
pub fn ago(secs: i64) -> DateTime<FixedOffset> {
    (Utc::now() - Duration::seconds(secs)).fixed_offset()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn settings() -> TrustSettings {
        TrustSettings::new(
            TrustConfig {
                root_domain: "Fediseer.Example".to_string(),
                root_admin: "admin".to_string(),
                root_api_key: None,
                guarantee_cap: 20,
                default_max_list_size: 1000,
                withdraw_cooldown_secs: 86_400,
                solicitation_cooldown_secs: 86_400,
                endorsement_notify_quiet_secs: 3_600,
                max_tags: 100,
                orphan_grace_secs: 86_400,
                offline_after: 5,
            },
            RateLimitConfig::default(),
        )
    }

    #[test]
    fn test_root_domain_lowercased() {
        let settings = settings();
        assert_eq!(settings.root.domain, "fediseer.example");
        assert!(settings.is_root(0));
        assert!(!settings.is_root(1));
        assert!(settings.rate_window_start() < Utc::now().fixed_offset());
    }
}
