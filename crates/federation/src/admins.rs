//! Admin discovery strategies keyed by software family.

use serde_json::Value;

/// How to find the administrators of a given software family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminStrategy {
    /// `GET /api/v3/site`, `admins[].person.name`.
    Lemmy,
    /// `GET /api/v2/instance`, `contact.account.username`.
    Mastodon,
    /// `POST /api/meta`, `maintainerName`.
    Misskey,
    /// `NodeInfo` `metadata.staffAccounts`.
    Generic,
}

impl AdminStrategy {
    /// Pick the strategy for a lowercase software name.
    #[must_use]
    pub fn for_software(software: &str) -> Self {
        match software {
            "lemmy" => Self::Lemmy,
            "mastodon" | "glitchsoc" | "glitch" | "hometown" => Self::Mastodon,
            "misskey" | "sharkey" | "firefish" | "calckey" | "foundkey" | "iceshrimp"
            | "cherrypick" => Self::Misskey,
            _ => Self::Generic,
        }
    }

    /// API path queried by this strategy. `None` means `NodeInfo` is used.
    #[must_use]
    pub const fn path(self) -> Option<&'static str> {
        match self {
            Self::Lemmy => Some("/api/v3/site"),
            Self::Mastodon => Some("/api/v2/instance"),
            Self::Misskey => Some("/api/meta"),
            Self::Generic => None,
        }
    }

    /// Misskey's API only answers POST.
    #[must_use]
    pub const fn uses_post(self) -> bool {
        matches!(self, Self::Misskey)
    }

    /// Extract admin usernames from the strategy's API response.
    #[must_use]
    pub fn parse(self, body: &Value) -> Vec<String> {
        let names: Vec<&str> = match self {
            Self::Lemmy => body
                .get("admins")
                .and_then(Value::as_array)
                .map(|admins| {
                    admins
                        .iter()
                        .filter_map(|a| a.pointer("/person/name").and_then(Value::as_str))
                        .collect()
                })
                .unwrap_or_default(),
            Self::Mastodon => body
                .pointer("/contact/account/username")
                .and_then(Value::as_str)
                .into_iter()
                .collect(),
            Self::Misskey => body
                .get("maintainerName")
                .and_then(Value::as_str)
                .into_iter()
                .collect(),
            Self::Generic => vec![],
        };
        names
            .into_iter()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strategy_table() {
        assert_eq!(AdminStrategy::for_software("lemmy"), AdminStrategy::Lemmy);
        assert_eq!(AdminStrategy::for_software("hometown"), AdminStrategy::Mastodon);
        assert_eq!(AdminStrategy::for_software("sharkey"), AdminStrategy::Misskey);
        assert_eq!(AdminStrategy::for_software("pleroma"), AdminStrategy::Generic);
        assert_eq!(AdminStrategy::Generic.path(), None);
    }

    #[test]
    fn test_parse_lemmy_admins() {
        let body = json!({
            "admins": [
                {"person": {"name": "alice"}},
                {"person": {"name": "bob"}},
                {"counts": {}}
            ]
        });
        assert_eq!(AdminStrategy::Lemmy.parse(&body), vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_mastodon_contact() {
        let body = json!({"contact": {"email": "x@a.example", "account": {"username": "Gargron"}}});
        assert_eq!(AdminStrategy::Mastodon.parse(&body), vec!["Gargron"]);
        assert!(AdminStrategy::Mastodon.parse(&json!({"contact": {}})).is_empty());
    }

    #[test]
    fn test_parse_misskey_maintainer() {
        let body = json!({"maintainerName": " syuilo "});
        assert_eq!(AdminStrategy::Misskey.parse(&body), vec!["syuilo"]);
    }
}
