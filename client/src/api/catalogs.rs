use serde::{Deserialize, Serialize};

use crate::entities::catalog::{
  Catalog, ServerDefinition, ServerDefinitionPatch, UserCatalogOverlay,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCatalogs {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCatalogsResponse {
  pub catalogs: Vec<Catalog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCatalog {
  pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCatalog {
  pub name: String,
  pub display_name: String,
  pub visibility: crate::entities::catalog::Visibility,
  #[serde(default)]
  pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCatalog {
  pub id: String,
  #[serde(default)]
  pub display_name: Option<String>,
  #[serde(default)]
  pub visibility: Option<crate::entities::catalog::Visibility>,
  #[serde(default)]
  pub upsert_servers: Vec<ServerDefinition>,
  #[serde(default)]
  pub remove_servers: Vec<String>,
  #[serde(default)]
  pub disabled_set: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCatalog {
  pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveCatalog {
  pub base_catalog_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedCatalog {
  pub registry: indexmap::IndexMap<String, ServerDefinition>,
  pub disabled: indexmap::IndexSet<String>,
  pub counts: ResolveCounts,
  pub warnings: Vec<ResolveWarning>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveCounts {
  pub base: usize,
  pub overrides_applied: usize,
  pub custom_added: usize,
  pub dangling: usize,
  pub collisions_resolved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveWarning {
  DanglingOverride { name: String },
  MandatoryOverride { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetOverlay {
  pub base_catalog_id: String,
  #[serde(default)]
  pub disabled: Vec<String>,
  #[serde(default)]
  pub custom: std::collections::BTreeMap<String, ServerDefinition>,
  #[serde(default)]
  pub overrides: std::collections::BTreeMap<String, ServerDefinitionPatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetOverlayResponse {
  pub overlay: UserCatalogOverlay,
}
