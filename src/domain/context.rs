//! Caller principal
//!
//! Resolved identity of the caller: who they are, which role they act
//! under, and which accounts they own. Authorization is a single capability
//! check (`can_operate_on`) handed to the orchestrator, not re-derived per
//! endpoint.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DomainError;

/// Caller role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN_ROLE",
            Self::Client => "CLIENT_ROLE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN_ROLE" => Some(Self::Admin),
            "CLIENT_ROLE" => Some(Self::Client),
            _ => None,
        }
    }
}

/// Resolved caller identity for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,

    pub role: Role,

    /// Accounts owned by this user
    pub account_ids: Vec<Uuid>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            account_ids: Vec::new(),
            correlation_id: None,
        }
    }

    pub fn with_accounts(mut self, account_ids: Vec<Uuid>) -> Self {
        self.account_ids = account_ids;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// True when the caller may move money out of `account_id`.
    ///
    /// Admins operate on any account; clients only on accounts they own.
    pub fn can_operate_on(&self, account_id: Uuid) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Client => self.account_ids.contains(&account_id),
        }
    }

    /// Fail with `NotOwner` unless `can_operate_on` holds.
    pub fn ensure_can_operate_on(&self, account_id: Uuid) -> Result<(), DomainError> {
        if self.can_operate_on(account_id) {
            Ok(())
        } else {
            Err(DomainError::NotOwner(account_id))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_owns_only_listed_accounts() {
        let owned = Uuid::new_v4();
        let other = Uuid::new_v4();
        let principal = Principal::new(Uuid::new_v4(), Role::Client).with_accounts(vec![owned]);

        assert!(principal.can_operate_on(owned));
        assert!(!principal.can_operate_on(other));
        assert!(matches!(
            principal.ensure_can_operate_on(other),
            Err(DomainError::NotOwner(id)) if id == other
        ));
    }

    #[test]
    fn test_admin_operates_on_any_account() {
        let principal = Principal::new(Uuid::new_v4(), Role::Admin);
        assert!(principal.can_operate_on(Uuid::new_v4()));
        assert!(principal.is_admin());
    }

    #[test]
    fn test_role_roundtrip() {
        assert_eq!(Role::parse("ADMIN_ROLE"), Some(Role::Admin));
        assert_eq!(Role::parse("CLIENT_ROLE"), Some(Role::Client));
        assert_eq!(Role::parse("ROOT"), None);
        assert_eq!(Role::Client.as_str(), "CLIENT_ROLE");
    }
}
