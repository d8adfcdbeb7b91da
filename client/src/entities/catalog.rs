use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::user::{TenantId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogType {
  SystemDefault,
  AdminBase,
  UserCustom,
  Imported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
  Private,
  Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOwner {
  System,
  User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
  pub host_port: u16,
  pub container_port: u16,
  #[serde(default)]
  pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMapping {
  pub host_path: String,
  pub container_path: String,
  #[serde(default)]
  pub read_only: bool,
}

/// A server definition inside a catalog's registry. `name` is unique
/// within its containing catalog (data model invariant 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDefinition {
  pub name: String,
  pub image: String,
  #[serde(default)]
  pub command: Option<String>,
  #[serde(default)]
  pub args: Vec<String>,
  #[serde(default)]
  pub environment: BTreeMap<String, String>,
  #[serde(default)]
  pub ports: Vec<PortMapping>,
  #[serde(default)]
  pub volumes: Vec<VolumeMapping>,
  #[serde(default)]
  pub working_dir: Option<String>,
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Admin may force-enable: a server with `mandatory: true` on the
  /// *base* catalog cannot be disabled by a user overlay (resolver
  /// merge step 4).
  #[serde(default)]
  pub mandatory: bool,
  #[serde(default)]
  pub metadata: BTreeMap<String, String>,
}

fn default_true() -> bool {
  true
}

/// A partial patch applied onto a base [`ServerDefinition`] by an
/// overlay override. Only fields present (`Some`) replace the base
/// value; absent fields retain the base value (resolver merge step 2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerDefinitionPatch {
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub command: Option<String>,
  #[serde(default)]
  pub args: Option<Vec<String>>,
  #[serde(default)]
  pub environment: Option<BTreeMap<String, String>>,
  #[serde(default)]
  pub ports: Option<Vec<PortMapping>>,
  #[serde(default)]
  pub volumes: Option<Vec<VolumeMapping>>,
  #[serde(default)]
  pub working_dir: Option<String>,
  #[serde(default)]
  pub enabled: Option<bool>,
  #[serde(default)]
  pub metadata: Option<BTreeMap<String, String>>,
}

impl ServerDefinitionPatch {
  pub fn apply(&self, base: &ServerDefinition) -> ServerDefinition {
    ServerDefinition {
      name: base.name.clone(),
      image: self.image.clone().unwrap_or_else(|| base.image.clone()),
      command: self
        .command
        .clone()
        .or_else(|| base.command.clone()),
      args: self.args.clone().unwrap_or_else(|| base.args.clone()),
      environment: self
        .environment
        .clone()
        .unwrap_or_else(|| base.environment.clone()),
      ports: self.ports.clone().unwrap_or_else(|| base.ports.clone()),
      volumes: self
        .volumes
        .clone()
        .unwrap_or_else(|| base.volumes.clone()),
      working_dir: self
        .working_dir
        .clone()
        .or_else(|| base.working_dir.clone()),
      enabled: self.enabled.unwrap_or(base.enabled),
      // mandatory is base-authoritative; an overlay override cannot
      // flip it (only the base catalog owner can).
      mandatory: base.mandatory,
      metadata: self
        .metadata
        .clone()
        .unwrap_or_else(|| base.metadata.clone()),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
  pub id: String,
  pub name: String,
  pub display_name: String,
  pub owner: CatalogOwner,
  /// Populated when `owner == CatalogOwner::User`.
  #[serde(default)]
  pub owner_user_id: Option<UserId>,
  pub tenant_id: TenantId,
  pub catalog_type: CatalogType,
  pub visibility: Visibility,
  /// Bumped on every mutation; part of the catalog cache key (spec
  /// §4.3 "Caching").
  pub version: u64,
  #[serde(default)]
  pub tags: IndexSet<String>,
  pub registry: IndexMap<String, ServerDefinition>,
  pub disabled_set: IndexSet<String>,
  #[serde(default)]
  pub metadata: BTreeMap<String, String>,
  pub created_at: i64,
  pub updated_at: i64,
  #[serde(default)]
  pub deleted_at: Option<i64>,
}

impl Catalog {
  pub fn is_deleted(&self) -> bool {
    self.deleted_at.is_some()
  }

  pub fn readable_by(&self, tenant_id: &str, user_id: &str) -> bool {
    if self.tenant_id != tenant_id {
      return false;
    }
    match self.visibility {
      Visibility::Public => true,
      Visibility::Private => {
        self.owner_user_id.as_deref() == Some(user_id)
      }
    }
  }

  pub fn mutable_by(&self, user_id: &str, is_admin: bool) -> bool {
    if is_admin {
      return true;
    }
    self.owner_user_id.as_deref() == Some(user_id)
  }
}

/// Per-user delta on top of a base catalog: disables, custom
/// additions, and partial overrides (data model `UserCatalogOverlay`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCatalogOverlay {
  pub id: String,
  pub user_id: UserId,
  pub tenant_id: TenantId,
  pub base_catalog_id: String,
  #[serde(default)]
  pub disabled: IndexSet<String>,
  #[serde(default)]
  pub custom: IndexMap<String, ServerDefinition>,
  #[serde(default)]
  pub overrides: IndexMap<String, ServerDefinitionPatch>,
  /// Bumped on every mutation; part of the catalog cache key.
  #[serde(default)]
  pub version: u64,
  #[serde(default)]
  pub updated_at: i64,
}
