//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (IdentityId, QuestionId, etc.)
//! - The closed [`Role`] enum used by the authorization gate
//! - Permission and operation types used in `Forbidden` errors
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type IdentityId = Uuid;
pub type SessionId = Uuid;
pub type QuestionId = Uuid;
pub type AnswerId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Identity role. Roles are a flat, closed set: comparisons are exact and an unknown
/// value fails to deserialize instead of mapping to some default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "identity_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Standard,
    Premium,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Standard => write!(f, "standard"),
            Role::Premium => write!(f, "premium"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

// Operations that can be performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    Promote,
    Access,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Promote => write!(f, "promote"),
            Operation::Access => write!(f, "access"),
        }
    }
}

/// What a request was missing when it got rejected with 403.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// The identity must hold exactly this role
    HasRole(Role),
    /// The identity must own the targeted resource
    Owns,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_role_serde_is_exact() {
        assert_eq!(serde_json::from_str::<Role>("\"premium\"").unwrap(), Role::Premium);
        assert!(serde_json::from_str::<Role>("\"Premium\"").is_err());
        assert!(serde_json::from_str::<Role>("\"gold\"").is_err());
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
