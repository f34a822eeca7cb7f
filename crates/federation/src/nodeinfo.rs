//! `NodeInfo` discovery documents.
//!
//! Only the fields the registry needs are modelled. Everything else in the
//! document is ignored.

use fediseer_core::InstanceMetadata;
use serde::Deserialize;
use serde_json::Value;

/// Well-known path listing the `NodeInfo` documents of a server.
pub const WELL_KNOWN_PATH: &str = "/.well-known/nodeinfo";

/// `/.well-known/nodeinfo` response.
#[derive(Debug, Clone, Deserialize)]
pub struct WellKnown {
    #[serde(default)]
    pub links: Vec<Link>,
}

/// One advertised `NodeInfo` document.
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

impl WellKnown {
    /// Link to the newest schema version advertised.
    ///
    /// Links whose `rel` does not carry a schema version sort last.
    #[must_use]
    pub fn best_link(&self) -> Option<&str> {
        self.links
            .iter()
            .max_by_key(|link| schema_version(&link.rel))
            .map(|link| link.href.as_str())
    }
}

/// `(major, minor)` from a rel such as `http://nodeinfo.diaspora.software/ns/schema/2.1`.
fn schema_version(rel: &str) -> (u32, u32) {
    let Some(version) = rel.rsplit('/').next() else {
        return (0, 0);
    };
    let mut parts = version.split('.').map(|p| p.parse::<u32>().ok());
    match (parts.next().flatten(), parts.next().flatten()) {
        (Some(major), Some(minor)) => (major, minor),
        (Some(major), None) => (major, 0),
        _ => (0, 0),
    }
}

/// `NodeInfo` document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub software: Software,
    #[serde(default)]
    pub open_registrations: bool,
    #[serde(default)]
    pub metadata: Value,
}

/// Software block of a `NodeInfo` document.
#[derive(Debug, Clone, Deserialize)]
pub struct Software {
    pub name: String,
}

impl NodeInfo {
    /// Registration metadata as stored on the instance row.
    #[must_use]
    pub fn to_metadata(&self) -> InstanceMetadata {
        InstanceMetadata {
            software: self.software.name.trim().to_lowercase(),
            open_registrations: self.open_registrations,
            approval_required: self.flag(&["approvalRequired", "accountActivationRequired"]),
            email_verify: self.flag(&["emailRequiredForSignup", "mailerEnabled"]),
            has_captcha: self.flag(&[
                "captchaEnabled",
                "enableHcaptcha",
                "enableRecaptcha",
                "enableTurnstile",
                "enableMcaptcha",
            ]),
        }
    }

    /// Staff account handles advertised in `metadata.staffAccounts`.
    ///
    /// Entries may be actor URLs; the last path segment is the username.
    #[must_use]
    pub fn staff_accounts(&self) -> Vec<String> {
        self.metadata
            .get("staffAccounts")
            .and_then(Value::as_array)
            .map(|accounts| {
                accounts
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|a| a.trim_end_matches('/').rsplit('/').next())
                    .map(|a| a.trim_start_matches('@').to_string())
                    .filter(|a| !a.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn flag(&self, keys: &[&str]) -> bool {
        keys.iter()
            .any(|key| self.metadata.get(*key).and_then(Value::as_bool) == Some(true))
    }
}
