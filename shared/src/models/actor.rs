//! Authenticated actor handed in by the request layer

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Roles recognised by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" | "administrador" => Ok(Role::Admin),
            "staff" | "vendedor" => Ok(Role::Staff),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Who a movement, reversal or record change is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn staff(id: Uuid) -> Self {
        Self::new(id, Role::Staff)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Gate for administrative operations
    pub fn ensure_admin(&self) -> Result<(), PermissionDenied> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(PermissionDenied { actor_id: self.id })
        }
    }
}

/// An actor attempted an administrative operation without the admin role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("actor {actor_id} is not an administrator")]
pub struct PermissionDenied {
    pub actor_id: Uuid,
}
