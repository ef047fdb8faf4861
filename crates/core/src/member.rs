//! Group membership records.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::id::UserId;

/// A user's membership record within a group.
///
/// Name and email are display data carried alongside the identity; the ledger
/// itself keys everything on `UserId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

impl Member {
    pub fn new(user_id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            email: email.into(),
        }
    }
}

impl Entity for Member {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.user_id
    }
}
