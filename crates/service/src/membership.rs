//! Group membership port.
//!
//! The ledger only validates that expense participants belong to the group;
//! who manages the roster is somebody else's problem. Deployments back this
//! with whatever directory they already have.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use splitledger_core::{GroupId, Member, UserId};

/// Read-only view of group rosters.
pub trait MembershipDirectory: Send + Sync {
    fn is_member(&self, group_id: GroupId, user_id: UserId) -> bool;
    fn member(&self, group_id: GroupId, user_id: UserId) -> Option<Member>;
}

impl<M> MembershipDirectory for Arc<M>
where
    M: MembershipDirectory + ?Sized,
{
    fn is_member(&self, group_id: GroupId, user_id: UserId) -> bool {
        (**self).is_member(group_id, user_id)
    }

    fn member(&self, group_id: GroupId, user_id: UserId) -> Option<Member> {
        (**self).member(group_id, user_id)
    }
}

/// In-memory roster for tests/dev.
#[derive(Debug)]
pub struct InMemoryMembershipDirectory {
    groups: RwLock<HashMap<GroupId, Vec<Member>>>,
}

impl InMemoryMembershipDirectory {
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Add a member to a group's roster, replacing any record with the same
    /// user id.
    pub fn add_member(&self, group_id: GroupId, member: Member) {
        if let Ok(mut groups) = self.groups.write() {
            let roster = groups.entry(group_id).or_default();
            roster.retain(|m| m.user_id != member.user_id);
            roster.push(member);
        }
    }
}

impl Default for InMemoryMembershipDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipDirectory for InMemoryMembershipDirectory {
    fn is_member(&self, group_id: GroupId, user_id: UserId) -> bool {
        self.member(group_id, user_id).is_some()
    }

    fn member(&self, group_id: GroupId, user_id: UserId) -> Option<Member> {
        let groups = self.groups.read().ok()?;
        groups
            .get(&group_id)?
            .iter()
            .find(|m| m.user_id == user_id)
            .cloned()
    }
}
