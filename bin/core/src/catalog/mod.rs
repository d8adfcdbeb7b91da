//! Catalog resolution engine (spec §4.3): merges an admin base catalog
//! with a user's overlay into the effective, per-user registry the UI
//! and the enable/disable operations act on, plus the CRUD operations
//! on catalogs and overlays that feed it.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};
use uuid::Uuid;
use wharf_client::{
  api::catalogs::{
    CreateCatalog, ResolveCounts, ResolveWarning, ResolvedCatalog,
    SetOverlay, UpdateCatalog,
  },
  entities::{
    audit::{Actor, AuditEventKind, AuditRecord, Severity},
    catalog::{Catalog, CatalogOwner, CatalogType, UserCatalogOverlay},
    user::User,
  },
  error::{AppError, AppResult, ErrorKind, KindContext},
  wharf_timestamp,
};

use crate::{
  auth::permission::{
    require_mutate_catalog, require_own_overlay, require_read_catalog,
  },
  state,
};

/// Defense-in-depth against unbumped versions (spec §4.3 "Caching").
const CACHE_TTL_MS: i64 = 5 * 60 * 1000;

static CACHE_HITS: AtomicU64 = AtomicU64::new(0);
static CACHE_MISSES: AtomicU64 = AtomicU64::new(0);
static SINGLE_FLIGHT_WAITS: AtomicU64 = AtomicU64::new(0);

/// Point-in-time counters for the resolution cache, exposed for ops
/// visibility the same way the realtime hub exposes `ConnectionStats`
/// (spec.md §4.3/§9 calls single-flight out as a named mechanism worth
/// observing; this is its counterpart, not named directly by spec.md).
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CatalogCacheStats {
  pub hits: u64,
  pub misses: u64,
  pub single_flight_waits: u64,
}

pub fn cache_stats() -> CatalogCacheStats {
  CatalogCacheStats {
    hits: CACHE_HITS.load(Ordering::Relaxed),
    misses: CACHE_MISSES.load(Ordering::Relaxed),
    single_flight_waits: SINGLE_FLIGHT_WAITS.load(Ordering::Relaxed),
  }
}

pub async fn list_catalogs(user: &User) -> AppResult<Vec<Catalog>> {
  state::repositories()
    .catalogs
    .list_readable(&user.tenant_id, &user.id)
    .await
    .kind(ErrorKind::Internal)
}

pub async fn get_catalog(user: &User, id: &str) -> AppResult<Catalog> {
  let catalog = load_catalog(&user.tenant_id, id).await?;
  require_read_catalog(user, &catalog)?;
  Ok(catalog)
}

pub async fn create_catalog(
  user: &User,
  request: CreateCatalog,
) -> AppResult<Catalog> {
  let now = wharf_timestamp();
  let catalog = Catalog {
    id: Uuid::new_v4().to_string(),
    name: request.name,
    display_name: request.display_name,
    owner: CatalogOwner::User,
    owner_user_id: Some(user.id.clone()),
    tenant_id: user.tenant_id.clone(),
    catalog_type: CatalogType::UserCustom,
    visibility: request.visibility,
    version: 1,
    tags: request.tags.into_iter().collect(),
    registry: IndexMap::new(),
    disabled_set: IndexSet::new(),
    metadata: Default::default(),
    created_at: now,
    updated_at: now,
    deleted_at: None,
  };
  state::repositories()
    .catalogs
    .insert(catalog.clone())
    .await
    .kind(ErrorKind::Internal)?;
  audit_catalog(user, &catalog.id, "create");
  Ok(catalog)
}

pub async fn update_catalog(
  user: &User,
  request: UpdateCatalog,
) -> AppResult<Catalog> {
  let mut catalog = load_catalog(&user.tenant_id, &request.id).await?;
  require_mutate_catalog(user, &catalog)?;

  if let Some(display_name) = request.display_name {
    catalog.display_name = display_name;
  }
  if let Some(visibility) = request.visibility {
    catalog.visibility = visibility;
  }
  for server in request.upsert_servers {
    catalog.registry.insert(server.name.clone(), server);
  }
  for name in &request.remove_servers {
    catalog.registry.shift_remove(name);
  }
  if let Some(disabled_set) = request.disabled_set {
    catalog.disabled_set = disabled_set.into_iter().collect();
  }
  catalog.version += 1;
  catalog.updated_at = wharf_timestamp();

  state::repositories()
    .catalogs
    .update(catalog.clone())
    .await
    .kind(ErrorKind::Internal)?;
  audit_catalog(user, &catalog.id, "update");
  Ok(catalog)
}

pub async fn delete_catalog(user: &User, id: &str) -> AppResult<()> {
  let catalog = load_catalog(&user.tenant_id, id).await?;
  require_mutate_catalog(user, &catalog)?;
  state::repositories()
    .catalogs
    .soft_delete(&user.tenant_id, id, wharf_timestamp())
    .await
    .kind(ErrorKind::Internal)?;
  audit_catalog(user, id, "delete");
  Ok(())
}

pub async fn set_overlay(
  user: &User,
  request: SetOverlay,
) -> AppResult<UserCatalogOverlay> {
  // An overlay is always the caller's own; there is no "owner" other
  // than the authenticated user, so this check only ever trips if a
  // future caller tries to act as someone else on their behalf.
  require_own_overlay(user, &user.id)?;

  let existing = state::repositories()
    .overlays
    .get(&user.tenant_id, &user.id, &request.base_catalog_id)
    .await
    .kind(ErrorKind::Internal)?;

  let mut overlay = existing.unwrap_or_else(|| UserCatalogOverlay {
    id: Uuid::new_v4().to_string(),
    user_id: user.id.clone(),
    tenant_id: user.tenant_id.clone(),
    base_catalog_id: request.base_catalog_id.clone(),
    ..Default::default()
  });

  overlay.disabled = request.disabled.into_iter().collect();
  overlay.custom = request.custom.into_iter().collect();
  overlay.overrides = request.overrides.into_iter().collect();
  overlay.version += 1;
  overlay.updated_at = wharf_timestamp();

  state::repositories()
    .overlays
    .upsert(overlay.clone())
    .await
    .kind(ErrorKind::Internal)?;
  audit_catalog(user, &overlay.base_catalog_id, "set_overlay");
  Ok(overlay)
}

/// Flips whether `name` is in the caller's overlay `disabled` set
/// against `base_catalog_id`, creating the overlay on first write the
/// same way [`set_overlay`] does. Used by the enable/disable server
/// endpoints, which act on one name at a time rather than replacing
/// the whole overlay.
async fn toggle_server_disabled(
  user: &User,
  base_catalog_id: &str,
  name: &str,
  disabled: bool,
) -> AppResult<()> {
  let catalog = load_catalog(&user.tenant_id, base_catalog_id).await?;
  require_read_catalog(user, &catalog)?;

  let existing = state::repositories()
    .overlays
    .get(&user.tenant_id, &user.id, base_catalog_id)
    .await
    .kind(ErrorKind::Internal)?;
  let mut overlay = existing.unwrap_or_else(|| UserCatalogOverlay {
    id: Uuid::new_v4().to_string(),
    user_id: user.id.clone(),
    tenant_id: user.tenant_id.clone(),
    base_catalog_id: base_catalog_id.to_string(),
    ..Default::default()
  });

  if disabled {
    overlay.disabled.insert(name.to_string());
  } else {
    overlay.disabled.shift_remove(name);
  }
  overlay.version += 1;
  overlay.updated_at = wharf_timestamp();

  state::repositories()
    .overlays
    .upsert(overlay)
    .await
    .kind(ErrorKind::Internal)?;
  audit_catalog(
    user,
    base_catalog_id,
    if disabled { "disable_server" } else { "enable_server" },
  );
  Ok(())
}

pub async fn enable_server(
  user: &User,
  base_catalog_id: &str,
  name: &str,
) -> AppResult<()> {
  toggle_server_disabled(user, base_catalog_id, name, false).await
}

pub async fn disable_server(
  user: &User,
  base_catalog_id: &str,
  name: &str,
) -> AppResult<()> {
  toggle_server_disabled(user, base_catalog_id, name, true).await
}

/// Single-flight, TTL- and version-keyed resolution (spec §4.3
/// "Caching"): the cache key embeds both `Catalog::version` and
/// `UserCatalogOverlay::version`, so a mutation to either bumps the key
/// and the next read misses and recomputes, with the TTL catching any
/// case where a version bump was itself missed.
pub async fn resolve(
  user: &User,
  base_catalog_id: &str,
) -> AppResult<ResolvedCatalog> {
  let catalog = load_catalog(&user.tenant_id, base_catalog_id).await?;
  require_read_catalog(user, &catalog)?;
  let overlay = state::repositories()
    .overlays
    .get(&user.tenant_id, &user.id, base_catalog_id)
    .await
    .kind(ErrorKind::Internal)?;
  let overlay_version = overlay.as_ref().map(|o| o.version).unwrap_or(0);

  let key = format!(
    "{}|{}|{}|{}|{}",
    user.tenant_id, user.id, base_catalog_id, catalog.version, overlay_version
  );

  let lock = state::catalog_cache().get_lock(key).await;
  let single_flight_wait = lock.try_lock().is_err();
  if single_flight_wait {
    SINGLE_FLIGHT_WAITS.fetch_add(1, Ordering::Relaxed);
  }
  let mut entry = lock.lock().await;
  let now = wharf_timestamp();
  if entry.last_ts != 0 && now - entry.last_ts < CACHE_TTL_MS {
    if let Ok(resolved) = &entry.res {
      CACHE_HITS.fetch_add(1, Ordering::Relaxed);
      return Ok(resolved.clone());
    }
  }

  CACHE_MISSES.fetch_add(1, Ordering::Relaxed);
  let result = merge(&catalog, overlay.as_ref());
  let anyhow_result = result
    .as_ref()
    .map(Clone::clone)
    .map_err(|e| anyhow::anyhow!(e.message()));
  entry.set(&anyhow_result, now);
  result
}

/// The merge algorithm (spec §4.3 steps 1-5): a pure function of its
/// inputs, so it can be unit tested without touching any repository or
/// cache.
fn merge(
  base: &Catalog,
  overlay: Option<&UserCatalogOverlay>,
) -> AppResult<ResolvedCatalog> {
  let mut registry = base.registry.clone();
  let mut warnings = Vec::new();
  let mut counts = ResolveCounts {
    base: base.registry.len(),
    ..Default::default()
  };

  if let Some(overlay) = overlay {
    for (name, patch) in &overlay.overrides {
      match registry.get(name) {
        Some(existing) => {
          registry.insert(name.clone(), patch.apply(existing));
          counts.overrides_applied += 1;
        }
        None => {
          warnings.push(ResolveWarning::DanglingOverride { name: name.clone() });
          counts.dangling += 1;
        }
      }
    }

    for (name, definition) in &overlay.custom {
      if registry.contains_key(name) {
        return Err(AppError::new(
          ErrorKind::NameCollision,
          anyhow::anyhow!(
            "custom server {name:?} collides with an existing registry entry"
          ),
        ));
      }
      registry.insert(name.clone(), definition.clone());
      counts.custom_added += 1;
    }
  }

  let mut disabled: IndexSet<String> = base.disabled_set.clone();
  if let Some(overlay) = overlay {
    disabled.extend(overlay.disabled.iter().cloned());
  }
  let mandatory_disabled: Vec<String> = disabled
    .iter()
    .filter(|name| {
      registry.get(*name).map(|def| def.mandatory).unwrap_or(false)
    })
    .cloned()
    .collect();
  for name in mandatory_disabled {
    disabled.shift_remove(&name);
    warnings.push(ResolveWarning::MandatoryOverride { name });
  }

  // Canonical order is established once here, not left to base
  // insertion order plus overlay append order (spec §4.3 property 3).
  registry.sort_unstable_keys();
  disabled.sort_unstable();

  Ok(ResolvedCatalog { registry, disabled, counts, warnings })
}

async fn load_catalog(tenant_id: &str, id: &str) -> AppResult<Catalog> {
  let catalog = state::repositories()
    .catalogs
    .get(tenant_id, id)
    .await
    .kind(ErrorKind::Internal)?
    .filter(|c| !c.is_deleted())
    .ok_or_else(|| {
      AppError::new(ErrorKind::NotFound, anyhow::anyhow!("catalog {id} not found"))
    })?;
  Ok(catalog)
}

fn audit_catalog(user: &User, catalog_id: &str, action: &str) {
  state::audit_sink().record(AuditRecord {
    id: Uuid::new_v4(),
    timestamp: wharf_timestamp(),
    tenant_id: user.tenant_id.clone(),
    actor: Actor::User(user.id.clone()),
    event_kind: AuditEventKind::CatalogMutated,
    resource_type: "catalog".to_string(),
    resource_id: catalog_id.to_string(),
    severity: Severity::Low,
    details: serde_json::json!({ "action": action }),
    fingerprint: None,
    request_id: None,
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use wharf_client::entities::catalog::{
    ServerDefinition, ServerDefinitionPatch, Visibility,
  };

  fn server(name: &str, mandatory: bool) -> ServerDefinition {
    ServerDefinition {
      name: name.to_string(),
      image: "alpine".to_string(),
      command: None,
      args: Vec::new(),
      environment: Default::default(),
      ports: Vec::new(),
      volumes: Vec::new(),
      working_dir: None,
      enabled: true,
      mandatory,
      metadata: Default::default(),
    }
  }

  fn base_catalog() -> Catalog {
    let mut registry = IndexMap::new();
    registry.insert("a".to_string(), server("a", false));
    registry.insert("b".to_string(), server("b", true));
    Catalog {
      id: "base".to_string(),
      name: "base".to_string(),
      display_name: "base".to_string(),
      owner: CatalogOwner::System,
      owner_user_id: None,
      tenant_id: "tenant-a".to_string(),
      catalog_type: CatalogType::AdminBase,
      visibility: Visibility::Public,
      version: 1,
      tags: Default::default(),
      registry,
      disabled_set: Default::default(),
      metadata: Default::default(),
      created_at: 0,
      updated_at: 0,
      deleted_at: None,
    }
  }

  fn overlay() -> UserCatalogOverlay {
    UserCatalogOverlay {
      id: "overlay".to_string(),
      user_id: "user-1".to_string(),
      tenant_id: "tenant-a".to_string(),
      base_catalog_id: "base".to_string(),
      ..Default::default()
    }
  }

  #[test]
  fn override_replaces_fields_on_existing_entry() {
    let base = base_catalog();
    let mut overlay = overlay();
    overlay.overrides.insert(
      "a".to_string(),
      ServerDefinitionPatch { image: Some("debian".to_string()), ..Default::default() },
    );
    let resolved = merge(&base, Some(&overlay)).unwrap();
    assert_eq!(resolved.registry["a"].image, "debian");
    assert_eq!(resolved.counts.overrides_applied, 1);
    assert!(resolved.warnings.is_empty());
  }

  #[test]
  fn override_on_mandatory_entry_still_applies() {
    let base = base_catalog();
    let mut overlay = overlay();
    overlay.overrides.insert(
      "b".to_string(),
      ServerDefinitionPatch { image: Some("debian".to_string()), ..Default::default() },
    );
    let resolved = merge(&base, Some(&overlay)).unwrap();
    assert_eq!(resolved.registry["b"].image, "debian");
    assert_eq!(resolved.counts.overrides_applied, 1);
    assert!(resolved.warnings.is_empty());
  }

  #[test]
  fn override_on_missing_entry_is_dangling() {
    let base = base_catalog();
    let mut overlay = overlay();
    overlay.overrides.insert("missing".to_string(), ServerDefinitionPatch::default());
    let resolved = merge(&base, Some(&overlay)).unwrap();
    assert_eq!(resolved.counts.dangling, 1);
    assert!(matches!(
      resolved.warnings[0],
      ResolveWarning::DanglingOverride { .. }
    ));
  }

  #[test]
  fn custom_colliding_with_base_name_fails_resolution() {
    let base = base_catalog();
    let mut overlay = overlay();
    overlay.custom.insert("a".to_string(), server("a", false));
    let err = merge(&base, Some(&overlay)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameCollision);
  }

  #[test]
  fn mandatory_entries_cannot_be_disabled() {
    let base = base_catalog();
    let mut overlay = overlay();
    overlay.disabled.insert("b".to_string());
    let resolved = merge(&base, Some(&overlay)).unwrap();
    assert!(!resolved.disabled.contains("b"));
    assert!(
      resolved
        .warnings
        .iter()
        .any(|w| matches!(w, ResolveWarning::MandatoryOverride { name } if name == "b"))
    );
  }

  #[test]
  fn effective_registry_is_sorted_lexicographically_regardless_of_insertion_order() {
    let mut base = base_catalog();
    base.registry = IndexMap::new();
    base.registry.insert("y".to_string(), server("y", false));
    base.registry.insert("x".to_string(), server("x", false));
    let mut overlay = overlay();
    overlay.custom.insert("w".to_string(), server("w", false));
    let resolved = merge(&base, Some(&overlay)).unwrap();
    let names: Vec<&str> =
      resolved.registry.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["w", "x", "y"]);
  }
}
