//! Ownership and role checks shared by `api/catalogs` and
//! `api/servers`. Grounded on the teacher's `permission.rs`: admins
//! bypass every check, and `transparent_mode` gives every enabled user
//! read access regardless of ownership/visibility — same shape as the
//! teacher's `required_permissions.level <= PermissionLevel::Read &&
//! core_config().transparent_mode` branch, generalized from Komodo's
//! tiered `PermissionLevel` to this service's coarser `Role`.

use wharf_client::{
  entities::{
    catalog::Catalog,
    container::ContainerShadow,
    user::{Role, User},
  },
  error::{AppError, AppResult, ErrorKind},
};

use crate::config::core_config;

/// True if `user` may read `catalog`: admins and the owner always can;
/// anyone else needs either public visibility or transparent mode.
pub fn can_read_catalog(user: &User, catalog: &Catalog) -> bool {
  if user.admin() {
    return true;
  }
  if core_config().transparent_mode {
    return catalog.tenant_id == user.tenant_id;
  }
  catalog.readable_by(&user.tenant_id, &user.id)
}

pub fn can_mutate_catalog(user: &User, catalog: &Catalog) -> bool {
  catalog.mutable_by(&user.id, user.admin())
}

pub fn require_read_catalog(user: &User, catalog: &Catalog) -> AppResult<()> {
  if can_read_catalog(user, catalog) {
    Ok(())
  } else {
    Err(AppError::new(
      ErrorKind::Forbidden,
      anyhow::anyhow!("not permitted to read catalog {}", catalog.id),
    ))
  }
}

pub fn require_mutate_catalog(user: &User, catalog: &Catalog) -> AppResult<()> {
  if can_mutate_catalog(user, catalog) {
    Ok(())
  } else {
    Err(AppError::new(
      ErrorKind::Forbidden,
      anyhow::anyhow!("not permitted to modify catalog {}", catalog.id),
    ))
  }
}

/// Overlays are always private to their owner; transparent mode only
/// ever relaxes *read* access to catalogs, never to another user's
/// overlay (data model invariant: overlays are per-user state, not a
/// shared resource).
pub fn require_own_overlay(user: &User, owner_user_id: &str) -> AppResult<()> {
  if user.admin() || user.id == owner_user_id {
    Ok(())
  } else {
    Err(AppError::new(
      ErrorKind::Forbidden,
      anyhow::anyhow!("not permitted to modify another user's overlay"),
    ))
  }
}

pub fn can_read_container(user: &User, shadow: &ContainerShadow) -> bool {
  if user.admin() || shadow.owner_user_id == user.id {
    return true;
  }
  core_config().transparent_mode
}

pub fn require_read_container(
  user: &User,
  shadow: &ContainerShadow,
) -> AppResult<()> {
  if can_read_container(user, shadow) {
    Ok(())
  } else {
    Err(AppError::new(
      ErrorKind::Forbidden,
      anyhow::anyhow!("not permitted to read container {}", shadow.id),
    ))
  }
}

pub fn require_mutate_container(
  user: &User,
  shadow: &ContainerShadow,
) -> AppResult<()> {
  if user.admin() || shadow.owner_user_id == user.id {
    Ok(())
  } else {
    Err(AppError::new(
      ErrorKind::Forbidden,
      anyhow::anyhow!(
        "not permitted to act on container {}",
        shadow.id
      ),
    ))
  }
}

/// Command-class dispatch (spec §4.1) is gated on role, not ownership:
/// a command class names the minimum role needed to invoke it at all.
pub fn require_role(user: &User, required: Role) -> AppResult<()> {
  if user.has_role_at_least(required) {
    Ok(())
  } else {
    Err(AppError::new(
      ErrorKind::Forbidden,
      anyhow::anyhow!("requires at least {required:?} role"),
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wharf_client::entities::catalog::{
    CatalogOwner, CatalogType, Visibility,
  };

  fn user(id: &str, roles: Vec<Role>) -> User {
    User {
      id: id.into(),
      email: format!("{id}@example.com"),
      display_name: id.into(),
      tenant_id: "tenant-a".into(),
      roles,
      enabled: true,
      created_at: 0,
      password_hash: None,
      api_keys: Vec::new(),
    }
  }

  fn catalog(owner_user_id: &str, visibility: Visibility) -> Catalog {
    Catalog {
      id: "cat-1".into(),
      name: "cat".into(),
      display_name: "cat".into(),
      owner: CatalogOwner::User,
      owner_user_id: Some(owner_user_id.into()),
      tenant_id: "tenant-a".into(),
      catalog_type: CatalogType::UserCustom,
      visibility,
      version: 1,
      tags: Default::default(),
      registry: Default::default(),
      disabled_set: Default::default(),
      metadata: Default::default(),
      created_at: 0,
      updated_at: 0,
      deleted_at: None,
    }
  }

  #[test]
  fn owner_can_read_private_catalog() {
    let user = user("user-1", vec![Role::Member]);
    let catalog = catalog("user-1", Visibility::Private);
    assert!(can_read_catalog(&user, &catalog));
  }

  #[test]
  fn stranger_cannot_read_private_catalog() {
    let user = user("user-2", vec![Role::Member]);
    let catalog = catalog("user-1", Visibility::Private);
    assert!(!can_read_catalog(&user, &catalog));
  }

  #[test]
  fn stranger_can_read_public_catalog() {
    let user = user("user-2", vec![Role::Member]);
    let catalog = catalog("user-1", Visibility::Public);
    assert!(can_read_catalog(&user, &catalog));
  }

  #[test]
  fn admin_can_mutate_any_catalog() {
    let admin = user("admin-1", vec![Role::Admin]);
    let catalog = catalog("user-1", Visibility::Private);
    assert!(can_mutate_catalog(&admin, &catalog));
  }
}
