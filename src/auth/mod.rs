//! Authentication and authorization module
//!
//! Provides JWT-based authentication, role-gated middleware and the
//! invariants that protect the admin account set.

mod guard;
mod jwt;
mod middleware;
mod password;

pub use guard::AdminGuard;
pub use jwt::{Claims, TokenError, TokenService, DEFAULT_TOKEN_TTL_HOURS};
pub use middleware::{authenticate, require_role, CurrentUser, Identity, RolePolicy};
pub use password::PasswordHasher;

use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Staff roles for authorization
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSql, FromSql,
)]
#[serde(rename_all = "snake_case")]
#[postgres(name = "staff_role")]
pub enum Role {
    /// Full access, including staff account management
    #[postgres(name = "admin")]
    Admin,
    /// Manages the public achievements list
    #[postgres(name = "subdireccion")]
    Subdireccion,
    /// Manages student records
    #[default]
    #[postgres(name = "control_escolar")]
    ControlEscolar,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Subdireccion, Role::ControlEscolar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Subdireccion => "subdireccion",
            Role::ControlEscolar => "control_escolar",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Unknown role '{}' (expected one of: admin, subdireccion, control_escolar)",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_rejects_legacy_values() {
        assert!("usuario".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
        assert!(serde_json::from_str::<Role>("\"usuario\"").is_err());
    }

    #[test]
    fn test_role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::ControlEscolar).unwrap(), "\"control_escolar\"");
        assert_eq!(Role::default(), Role::ControlEscolar);
    }
}
