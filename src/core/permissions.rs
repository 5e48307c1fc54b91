// Who may run which command.
//
// Roles come from configured id lists. Every command handler calls `require`
// before touching a service.

use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Member,
    Moderator,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Chat, view profiles and the leaderboard.
    Participate,
    /// Warn, mute, ban and their reversals.
    Moderate,
    /// Edit XP, levels and multipliers; manage banned words.
    Administer,
}

impl Capability {
    fn minimum_role(self) -> Role {
        match self {
            Capability::Participate => Role::Member,
            Capability::Moderate => Role::Moderator,
            Capability::Administer => Role::Admin,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PermissionError {
    #[error("{role:?} lacks the {capability:?} permission")]
    Missing { role: Role, capability: Capability },
}

/// Admins can do everything moderators can.
pub fn require(role: Role, capability: Capability) -> Result<(), PermissionError> {
    if role >= capability.minimum_role() {
        Ok(())
    } else {
        Err(PermissionError::Missing { role, capability })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoleDirectory {
    admins: HashSet<u64>,
    moderators: HashSet<u64>,
}

impl RoleDirectory {
    pub fn new(
        admins: impl IntoIterator<Item = u64>,
        moderators: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            moderators: moderators.into_iter().collect(),
        }
    }

    pub fn role_of(&self, user_id: u64) -> Role {
        if self.admins.contains(&user_id) {
            Role::Admin
        } else if self.moderators.contains(&user_id) {
            Role::Moderator
        } else {
            Role::Member
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_resolve_from_directory() {
        let directory = RoleDirectory::new([1], [2, 1]);
        assert_eq!(directory.role_of(1), Role::Admin);
        assert_eq!(directory.role_of(2), Role::Moderator);
        assert_eq!(directory.role_of(3), Role::Member);
    }

    #[test]
    fn test_capabilities_follow_role_order() {
        assert!(require(Role::Admin, Capability::Moderate).is_ok());
        assert!(require(Role::Moderator, Capability::Moderate).is_ok());
        assert_eq!(
            require(Role::Moderator, Capability::Administer),
            Err(PermissionError::Missing {
                role: Role::Moderator,
                capability: Capability::Administer
            })
        );
        assert!(require(Role::Member, Capability::Moderate).is_err());
        assert!(require(Role::Member, Capability::Participate).is_ok());
    }
}
