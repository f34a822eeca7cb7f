//! Compatibility tests against `NodeInfo` and admin payloads as published
//! by common fediverse software.

use fediseer_federation::{AdminStrategy, NodeInfo, WellKnown};
use serde_json::json;

mod lemmy {
    use super::*;

    #[test]
    fn test_lemmy_nodeinfo() {
        let nodeinfo: NodeInfo = serde_json::from_value(json!({
            "version": "2.0",
            "software": {"name": "lemmy", "version": "0.19.3"},
            "protocols": ["activitypub"],
            "usage": {"users": {"total": 100}, "localPosts": 5},
            "openRegistrations": true
        }))
        .unwrap();

        let meta = nodeinfo.to_metadata();
        assert_eq!(meta.software, "lemmy");
        assert!(meta.open_registrations);
        assert!(!meta.has_captcha);
        assert_eq!(AdminStrategy::for_software(&meta.software), AdminStrategy::Lemmy);
    }

    #[test]
    fn test_lemmy_site_admins() {
        let site = json!({
            "site_view": {"site": {"name": "Lemmy"}},
            "admins": [
                {"person": {"id": 1, "name": "db0", "admin": true}, "counts": {}},
                {"person": {"id": 2, "name": "mod", "admin": true}, "counts": {}}
            ]
        });

        assert_eq!(AdminStrategy::Lemmy.parse(&site), vec!["db0", "mod"]);
    }
}

mod mastodon {
    use super::*;

    #[test]
    fn test_mastodon_well_known() {
        let well_known: WellKnown = serde_json::from_value(json!({
            "links": [{
                "rel": "http://nodeinfo.diaspora.software/ns/schema/2.0",
                "href": "https://mastodon.example/nodeinfo/2.0"
            }]
        }))
        .unwrap();

        assert_eq!(
            well_known.best_link(),
            Some("https://mastodon.example/nodeinfo/2.0")
        );
    }

    #[test]
    fn test_mastodon_instance_contact() {
        let instance = json!({
            "domain": "mastodon.example",
            "registrations": {"enabled": true, "approval_required": true},
            "contact": {"email": "admin@mastodon.example", "account": {"id": "1", "username": "admin"}}
        });

        assert_eq!(AdminStrategy::Mastodon.parse(&instance), vec!["admin"]);
    }
}

mod misskey {
    use super::*;

    #[test]
    fn test_misskey_meta() {
        let meta = json!({"maintainerName": "syuilo", "maintainerEmail": null});
        assert_eq!(AdminStrategy::Misskey.parse(&meta), vec!["syuilo"]);
        assert!(AdminStrategy::Misskey.uses_post());
    }
}

mod generic {
    use super::*;

    #[test]
    fn test_pleroma_staff_accounts() {
        let nodeinfo: NodeInfo = serde_json::from_value(json!({
            "software": {"name": "Pleroma"},
            "openRegistrations": false,
            "metadata": {
                "accountActivationRequired": true,
                "staffAccounts": ["https://pleroma.example/users/lain"]
            }
        }))
        .unwrap();

        let meta = nodeinfo.to_metadata();
        assert!(meta.approval_required);
        assert_eq!(AdminStrategy::for_software(&meta.software), AdminStrategy::Generic);
        assert_eq!(nodeinfo.staff_accounts(), vec!["lain"]);
    }
}
