//! Visibility rules for edge lists.

use std::collections::HashSet;

use fediseer_db::{entities::instance, entities::instance::ListVisibility, repositories::EdgeKind};

/// Decide whether a requester may read a list owned by `owner_id`.
///
/// `requester_endorses_owner` only matters for [`ListVisibility::Endorsed`].
#[must_use]
pub fn can_view(
    policy: ListVisibility,
    owner_id: i32,
    requester_id: Option<i32>,
    requester_endorses_owner: bool,
) -> bool {
    match policy {
        ListVisibility::Open => true,
        ListVisibility::Endorsed => {
            requester_id == Some(owner_id) || (requester_id.is_some() && requester_endorses_owner)
        }
        ListVisibility::Private => requester_id == Some(owner_id),
    }
}

/// The requester's point of view, loaded once per query.
#[derive(Debug, Clone, Default)]
pub struct ViewerScope {
    requester_id: Option<i32>,
    endorses: HashSet<i32>,
}

impl ViewerScope {
    /// Anonymous requester.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated requester and the instances it currently endorses.
    pub fn new(requester_id: i32, endorses: impl IntoIterator<Item = i32>) -> Self {
        Self {
            requester_id: Some(requester_id),
            endorses: endorses.into_iter().collect(),
        }
    }

    #[must_use]
    pub const fn requester_id(&self) -> Option<i32> {
        self.requester_id
    }

    /// Whether this viewer may read `owner`'s edges of `kind`.
    #[must_use]
    pub fn can_view(&self, kind: EdgeKind, owner: &instance::Model) -> bool {
        can_view(
            kind.visibility_of(owner),
            owner.id,
            self.requester_id,
            self.endorses.contains(&owner.id),
        )
    }
}
