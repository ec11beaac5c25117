//! User-related types
//!
//! Users are owned by the identity subsystem. The marketplace core only reads
//! them to check existence, account status and identity of the actor.

use super::ids::UserId;
use std::collections::BTreeSet;
use std::fmt;

/// Role a user may hold; a user may hold several at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

/// Moderation status of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Banned,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Suspended => "SUSPENDED",
            AccountStatus::Banned => "BANNED",
        };
        f.write_str(name)
    }
}

/// Aggregated review score
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reputation {
    /// Mean rating over all reviews, 0 when there are none
    pub average_rating: f32,
    /// Number of reviews received
    pub review_count: u32,
}

/// Marketplace user as seen by the core
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub roles: BTreeSet<Role>,
    pub status: AccountStatus,
    pub reputation: Reputation,
}

impl User {
    /// Create an active passenger with no reviews
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        User {
            id,
            name: name.into(),
            roles: BTreeSet::from([Role::Passenger]),
            status: AccountStatus::Active,
            reputation: Reputation::default(),
        }
    }

    /// Add a role, builder style
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_active_passenger() {
        let user = User::new(1, "Ana");

        assert!(user.is_active());
        assert!(user.has_role(Role::Passenger));
        assert!(!user.has_role(Role::Driver));
        assert_eq!(user.reputation.review_count, 0);
    }

    #[test]
    fn test_roles_are_not_exclusive() {
        let user = User::new(1, "Ana").with_role(Role::Driver);

        assert!(user.has_role(Role::Passenger));
        assert!(user.has_role(Role::Driver));
    }
}
