use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type TenantId = String;

/// Declared lowest-to-highest capability: `derive(Ord)` orders variants
/// by declaration position, and [`Role::at_least`]/[`User::highest_role`]
/// both depend on `Admin > Member > Viewer` holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  /// Read-only: can view effective catalogs and container shadows,
  /// cannot mutate or dispatch lifecycle actions.
  Viewer,
  /// Standard end user: owns their overlays, mutates their own
  /// private/custom catalogs, reads public ones.
  Member,
  /// Full read/write over every resource in the tenant, bypasses
  /// ownership checks on catalogs (data model "Ownership" section).
  Admin,
}

impl Role {
  pub fn at_least(&self, required: Role) -> bool {
    self >= &required
  }
}

/// A local-auth or api-key credential attached to a [`User`]. Never
/// serialized out (`password_hash`/`secret_hash` are write-only from
/// the wire's perspective): the client crate's `User` is a shared
/// shape, but credential material must never round-trip through any
/// response (data model invariant 6's spirit extended to credentials).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyCredential {
  pub key: String,
  #[serde(skip_serializing)]
  pub secret_hash: String,
  pub name: String,
  pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id: UserId,
  pub email: String,
  pub display_name: String,
  pub tenant_id: TenantId,
  pub roles: Vec<Role>,
  pub enabled: bool,
  pub created_at: i64,
  /// Set only for local-auth users; absent for identity-provider
  /// accounts (data model: "Created by identity-provider callback").
  #[serde(default, skip_serializing)]
  pub password_hash: Option<String>,
  #[serde(default, skip_serializing)]
  pub api_keys: Vec<ApiKeyCredential>,
}

impl User {
  pub fn admin(&self) -> bool {
    self.roles.contains(&Role::Admin)
  }

  pub fn highest_role(&self) -> Role {
    self.roles.iter().copied().max().unwrap_or(Role::Viewer)
  }

  pub fn has_role_at_least(&self, required: Role) -> bool {
    self.admin() || self.highest_role().at_least(required)
  }
}
