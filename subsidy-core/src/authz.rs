//! Authorization
//!
//! Principals carry role grants scoped to enterprise customers. Each
//! operation asks for one [`Capability`] against one enterprise customer and
//! gets back an explicit [`Authorization`] decision naming what was missing.
//!
//! | Role | Capabilities |
//! |------|--------------|
//! | learner | read transactions (own `lms_user_id` only) |
//! | admin | read subsidies, read transactions, read metadata |
//! | operator | everything, including creating transactions |

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Grant scope wildcard covering every enterprise customer
pub const ALL_ACCESS_SCOPE: &str = "*";

/// Permission checked by an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    ReadSubsidies,
    ReadTransactions,
    CreateTransactions,
    ReadMetadata,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ReadSubsidies => "subsidy.can_read_subsidies",
            Capability::ReadTransactions => "subsidy.can_read_transactions",
            Capability::CreateTransactions => "subsidy.can_create_transactions",
            Capability::ReadMetadata => "subsidy.can_read_metadata",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role held by a principal within a scope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Learner,
    Admin,
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Learner => "learner",
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "learner" => Some(Role::Learner),
            "admin" => Some(Role::Admin),
            "operator" => Some(Role::Operator),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Learner => &[Capability::ReadTransactions],
            Role::Admin => &[
                Capability::ReadSubsidies,
                Capability::ReadTransactions,
                Capability::ReadMetadata,
            ],
            Role::Operator => &[
                Capability::ReadSubsidies,
                Capability::ReadTransactions,
                Capability::CreateTransactions,
                Capability::ReadMetadata,
            ],
        }
    }

    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Enterprise customers a grant applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Enterprise(Uuid),
}

impl Scope {
    pub fn covers(&self, enterprise_customer_uuid: &Uuid) -> bool {
        match self {
            Scope::All => true,
            Scope::Enterprise(uuid) => uuid == enterprise_customer_uuid,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s == ALL_ACCESS_SCOPE {
            return Some(Scope::All);
        }
        Uuid::parse_str(s).ok().map(Scope::Enterprise)
    }
}

/// A role within a scope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RoleGrant {
    pub role: Role,
    pub scope: Scope,
}

/// Authorization decision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authorization {
    Allow,
    Deny { missing: Capability },
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allow)
    }

    /// Denial detail in the `MISSING: <capability>` form, if denied
    pub fn denial_detail(&self) -> Option<String> {
        match self {
            Authorization::Allow => None,
            Authorization::Deny { missing } => Some(format!("MISSING: {}", missing)),
        }
    }
}

/// Errors parsing a principal grant specification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrantParseError {
    #[error("Invalid lms_user_id: {0}")]
    InvalidUserId(String),
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("Invalid scope: {0}")]
    InvalidScope(String),
    #[error("Grant must be written as role@scope: {0}")]
    Malformed(String),
}

/// Authenticated caller
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
    pub lms_user_id: Option<i64>,
    pub grants: Vec<RoleGrant>,
}

impl Principal {
    pub fn new(lms_user_id: Option<i64>) -> Self {
        Self {
            lms_user_id,
            grants: Vec::new(),
        }
    }

    pub fn with_grant(mut self, role: Role, scope: Scope) -> Self {
        self.grants.push(RoleGrant { role, scope });
        self
    }

    /// Parse `[lms_user_id:]role@scope[,role@scope...]`, e.g.
    /// `1234:admin@3f0c...,learner@*`
    pub fn parse(raw: &str) -> Result<Self, GrantParseError> {
        let (user, grants) = match raw.split_once(':') {
            Some((user, grants)) => (Some(user.trim()), grants),
            None => (None, raw),
        };

        let lms_user_id = match user {
            Some(u) if !u.is_empty() => Some(
                u.parse::<i64>()
                    .map_err(|_| GrantParseError::InvalidUserId(u.to_string()))?,
            ),
            _ => None,
        };

        let mut principal = Principal::new(lms_user_id);
        for grant in grants.split(',').map(str::trim).filter(|g| !g.is_empty()) {
            let (role, scope) = grant
                .split_once('@')
                .ok_or_else(|| GrantParseError::Malformed(grant.to_string()))?;
            let role = Role::parse(role).ok_or_else(|| GrantParseError::UnknownRole(role.to_string()))?;
            let scope = Scope::parse(scope).ok_or_else(|| GrantParseError::InvalidScope(scope.to_string()))?;
            principal = principal.with_grant(role, scope);
        }

        Ok(principal)
    }

    /// Check `capability` against an enterprise customer.
    ///
    /// A missing enterprise customer (no permission object) is always denied.
    pub fn authorize(&self, capability: Capability, enterprise_customer_uuid: Option<&Uuid>) -> Authorization {
        let allowed = enterprise_customer_uuid.is_some_and(|enterprise| {
            self.grants
                .iter()
                .any(|g| g.role.grants(capability) && g.scope.covers(enterprise))
        });

        if allowed {
            Authorization::Allow
        } else {
            Authorization::Deny { missing: capability }
        }
    }

    /// Check read access to one transaction.
    ///
    /// Admins and operators read every transaction of their enterprise
    /// customers; learners only read their own.
    pub fn authorize_transaction_read(
        &self,
        enterprise_customer_uuid: &Uuid,
        transaction_lms_user_id: Option<i64>,
    ) -> Authorization {
        let allowed = self.grants.iter().any(|g| {
            if !g.role.grants(Capability::ReadTransactions) || !g.scope.covers(enterprise_customer_uuid) {
                return false;
            }
            match g.role {
                Role::Learner => self.lms_user_id.is_some() && self.lms_user_id == transaction_lms_user_id,
                Role::Admin | Role::Operator => true,
            }
        });

        if allowed {
            Authorization::Allow
        } else {
            Authorization::Deny {
                missing: Capability::ReadTransactions,
            }
        }
    }
}
