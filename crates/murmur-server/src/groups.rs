//! Chat group membership rules.
//!
//! Owners and admins manage members; only the owner changes roles.  A group
//! always has exactly one owner, who can leave the owner role only by
//! handing it to another member.

use tracing::info;

use murmur_shared::{GroupId, GroupRole, UserId};
use murmur_store::{Database, Group, GroupMember, Membership};

use crate::error::ServerError;
use crate::store::Store;

#[derive(Clone)]
pub struct GroupService {
    store: Store,
}

impl GroupService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn create_group(&self, owner: UserId, name: &str) -> Result<Group, ServerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServerError::BadRequest("group name must not be empty".into()));
        }
        let group = self.store.call(|db| Ok(db.create_group(owner, name)?))?;
        info!(group = %group.id, owner = %owner, "Group created");
        Ok(group)
    }

    pub fn groups_for(&self, user: UserId) -> Result<Vec<Membership>, ServerError> {
        self.store.call(|db| Ok(db.list_groups_for_user(user)?))
    }

    /// Members of `group`; any member may look.
    pub fn members(&self, actor: UserId, group: GroupId) -> Result<Vec<GroupMember>, ServerError> {
        self.store.call(|db| {
            role_of(db, group, actor)?;
            Ok(db.list_group_members(group)?)
        })
    }

    /// Add users to `group`.  Users who are already members are skipped.
    /// Returns the users that were actually added.
    pub fn invite(
        &self,
        actor: UserId,
        group: GroupId,
        users: &[UserId],
    ) -> Result<Vec<UserId>, ServerError> {
        let added = self.store.transaction(|db| {
            if !role_of(db, group, actor)?.can_manage() {
                return Err(ServerError::Forbidden(
                    "only the owner or an admin may invite".into(),
                ));
            }

            let mut added = Vec::new();
            for &user in users {
                if !db.user_exists(user)? {
                    return Err(ServerError::NotFound(format!("user {user} does not exist")));
                }
                if db.add_group_member(group, user, GroupRole::Member)? {
                    added.push(user);
                }
            }
            Ok(added)
        })?;

        if !added.is_empty() {
            info!(group = %group, actor = %actor, added = added.len(), "Members invited");
        }
        Ok(added)
    }

    /// Remove `user` from `group`.  `actor == user` means leaving.
    pub fn remove_member(
        &self,
        actor: UserId,
        group: GroupId,
        user: UserId,
    ) -> Result<(), ServerError> {
        self.store.transaction(|db| {
            let actor_role = role_of(db, group, actor)?;
            let target_role = db
                .get_membership(group, user)?
                .map(|member| member.role)
                .ok_or_else(|| {
                    ServerError::NotFound(format!("user {user} is not a member of group {group}"))
                })?;

            if target_role == GroupRole::Owner {
                return Err(ServerError::InvalidState(
                    "the owner cannot leave or be removed; transfer ownership first".into(),
                ));
            }

            let allowed = actor == user
                || match actor_role {
                    GroupRole::Owner => true,
                    GroupRole::Admin => target_role == GroupRole::Member,
                    GroupRole::Member => false,
                };
            if !allowed {
                return Err(ServerError::Forbidden(format!(
                    "a {actor_role} may not remove a {target_role}"
                )));
            }

            db.remove_group_member(group, user)?;
            Ok(())
        })?;

        info!(group = %group, actor = %actor, user = %user, "Member removed");
        Ok(())
    }

    /// Promote or demote a member.  Owner only; ownership itself moves
    /// through [`GroupService::transfer_ownership`].
    pub fn change_role(
        &self,
        actor: UserId,
        group: GroupId,
        user: UserId,
        role: GroupRole,
    ) -> Result<(), ServerError> {
        self.store.transaction(|db| {
            if role_of(db, group, actor)? != GroupRole::Owner {
                return Err(ServerError::Forbidden("only the owner may change roles".into()));
            }
            if role == GroupRole::Owner {
                return Err(ServerError::InvalidState(
                    "use an ownership transfer to appoint a new owner".into(),
                ));
            }
            match db.get_membership(group, user)? {
                None => Err(ServerError::NotFound(format!(
                    "user {user} is not a member of group {group}"
                ))),
                Some(member) if member.role == GroupRole::Owner => Err(ServerError::InvalidState(
                    "the owner cannot be demoted; transfer ownership first".into(),
                )),
                Some(_) => {
                    db.set_member_role(group, user, role)?;
                    Ok(())
                }
            }
        })?;

        info!(group = %group, user = %user, role = %role, "Member role changed");
        Ok(())
    }

    /// Make `new_owner` the owner; the previous owner becomes an admin.
    pub fn transfer_ownership(
        &self,
        actor: UserId,
        group: GroupId,
        new_owner: UserId,
    ) -> Result<(), ServerError> {
        self.store.transaction(|db| {
            if role_of(db, group, actor)? != GroupRole::Owner {
                return Err(ServerError::Forbidden(
                    "only the owner may transfer ownership".into(),
                ));
            }
            if new_owner == actor {
                return Err(ServerError::InvalidState("user already owns the group".into()));
            }
            if db.get_membership(group, new_owner)?.is_none() {
                return Err(ServerError::NotFound(format!(
                    "user {new_owner} is not a member of group {group}"
                )));
            }

            db.set_member_role(group, new_owner, GroupRole::Owner)?;
            db.set_member_role(group, actor, GroupRole::Admin)?;
            db.set_group_owner(group, new_owner)?;
            Ok(())
        })?;

        info!(group = %group, from = %actor, to = %new_owner, "Group ownership transferred");
        Ok(())
    }

    /// Fails unless `user` belongs to `group`.
    pub fn ensure_member(&self, user: UserId, group: GroupId) -> Result<(), ServerError> {
        self.store.call(|db| role_of(db, group, user).map(|_| ()))
    }
}

/// `user`'s role in an existing `group`.
fn role_of(db: &Database, group: GroupId, user: UserId) -> Result<GroupRole, ServerError> {
    db.get_group(group).map_err(|e| match e {
        murmur_store::StoreError::NotFound => {
            ServerError::NotFound(format!("group {group} does not exist"))
        }
        other => other.into(),
    })?;
    db.get_membership(group, user)?
        .map(|member| member.role)
        .ok_or_else(|| ServerError::Forbidden(format!("user {user} is not a member of group {group}")))
}
