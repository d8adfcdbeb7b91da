//! In-memory repository implementations. Used by test suites and by
//! any deployment mode that runs without a mongo connection string
//! configured; see `SPEC_FULL.md`'s repository section ("trait-only
//! dependency... an in-memory implementation for tests").

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use crypto::EncryptedStore;
use wharf_client::entities::{
  audit::AuditRecord,
  catalog::{Catalog, UserCatalogOverlay},
  container::ContainerShadow,
  session::Session,
  user::User,
};

use crate::{
  overlay_codec,
  traits::{
    AuditRepository, CatalogRepository, ContainerShadowRepository,
    OverlayRepository, SessionRepository, UserRepository,
  },
};

#[derive(Default)]
pub struct MemoryCatalogRepository {
  rows: Mutex<HashMap<(String, String), Catalog>>,
}

#[async_trait::async_trait]
impl CatalogRepository for MemoryCatalogRepository {
  async fn get(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<Option<Catalog>> {
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .get(&(tenant_id.to_string(), id.to_string()))
        .cloned(),
    )
  }

  async fn list_readable(
    &self,
    tenant_id: &str,
    user_id: &str,
  ) -> anyhow::Result<Vec<Catalog>> {
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .values()
        .filter(|c| {
          !c.is_deleted() && c.readable_by(tenant_id, user_id)
        })
        .cloned()
        .collect(),
    )
  }

  async fn insert(&self, catalog: Catalog) -> anyhow::Result<()> {
    self
      .rows
      .lock()
      .unwrap()
      .insert((catalog.tenant_id.clone(), catalog.id.clone()), catalog);
    Ok(())
  }

  async fn update(&self, catalog: Catalog) -> anyhow::Result<()> {
    self.insert(catalog).await
  }

  async fn soft_delete(
    &self,
    tenant_id: &str,
    id: &str,
    deleted_at: i64,
  ) -> anyhow::Result<()> {
    if let Some(c) = self
      .rows
      .lock()
      .unwrap()
      .get_mut(&(tenant_id.to_string(), id.to_string()))
    {
      c.deleted_at = Some(deleted_at);
    }
    Ok(())
  }
}

pub struct MemoryOverlayRepository {
  store: Arc<EncryptedStore>,
  rows: Mutex<HashMap<(String, String, String), crate::overlay_codec::EncodedOverlay>>,
}

impl MemoryOverlayRepository {
  pub fn new(store: Arc<EncryptedStore>) -> Self {
    Self { store, rows: Mutex::new(HashMap::new()) }
  }
}

#[async_trait::async_trait]
impl OverlayRepository for MemoryOverlayRepository {
  async fn get(
    &self,
    tenant_id: &str,
    user_id: &str,
    base_catalog_id: &str,
  ) -> anyhow::Result<Option<UserCatalogOverlay>> {
    let key = (
      tenant_id.to_string(),
      user_id.to_string(),
      base_catalog_id.to_string(),
    );
    let encoded = match self.rows.lock().unwrap().get(&key) {
      Some(e) => {
        // Cloning the fields out rather than the whole struct avoids
        // requiring Clone on EncodedOverlay just for this lookup.
        (
          e.id.clone(),
          e.user_id.clone(),
          e.tenant_id.clone(),
          e.base_catalog_id.clone(),
          e.version,
          e.updated_at,
          e.key_id.clone(),
          e.ciphertext.clone(),
        )
      }
      None => return Ok(None),
    };
    let (id, user_id, tenant_id, base_catalog_id, version, updated_at, key_id, ct) = encoded;
    overlay_codec::decode(
      &self.store, id, user_id, tenant_id, base_catalog_id, version,
      updated_at, key_id, ct,
    )
    .map(Some)
  }

  async fn upsert(
    &self,
    overlay: UserCatalogOverlay,
  ) -> anyhow::Result<()> {
    let encoded = overlay_codec::encode(&self.store, &overlay)?;
    let key = (
      overlay.tenant_id.clone(),
      overlay.user_id.clone(),
      overlay.base_catalog_id.clone(),
    );
    self.rows.lock().unwrap().insert(key, encoded);
    Ok(())
  }
}

#[derive(Default)]
pub struct MemoryContainerShadowRepository {
  rows: Mutex<HashMap<(String, String), ContainerShadow>>,
}

#[async_trait::async_trait]
impl ContainerShadowRepository for MemoryContainerShadowRepository {
  async fn get(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<Option<ContainerShadow>> {
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .get(&(tenant_id.to_string(), id.to_string()))
        .cloned(),
    )
  }

  async fn list_by_owner(
    &self,
    tenant_id: &str,
    owner_user_id: &str,
  ) -> anyhow::Result<Vec<ContainerShadow>> {
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .iter()
        .filter(|((t, _), shadow)| {
          t == tenant_id && shadow.owner_user_id == owner_user_id
        })
        .map(|(_, shadow)| shadow.clone())
        .collect(),
    )
  }

  async fn upsert(
    &self,
    tenant_id: &str,
    shadow: ContainerShadow,
  ) -> anyhow::Result<()> {
    self
      .rows
      .lock()
      .unwrap()
      .insert((tenant_id.to_string(), shadow.id.clone()), shadow);
    Ok(())
  }

  async fn remove(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<()> {
    self
      .rows
      .lock()
      .unwrap()
      .remove(&(tenant_id.to_string(), id.to_string()));
    Ok(())
  }
}

#[derive(Default)]
pub struct MemorySessionRepository {
  rows: Mutex<HashMap<String, Session>>,
}

#[async_trait::async_trait]
impl SessionRepository for MemorySessionRepository {
  async fn get(&self, id: &str) -> anyhow::Result<Option<Session>> {
    Ok(self.rows.lock().unwrap().get(id).cloned())
  }

  async fn insert(&self, session: Session) -> anyhow::Result<()> {
    self.rows.lock().unwrap().insert(session.id.clone(), session);
    Ok(())
  }

  async fn revoke(&self, id: &str) -> anyhow::Result<()> {
    if let Some(s) = self.rows.lock().unwrap().get_mut(id) {
      s.revoked = true;
    }
    Ok(())
  }

  async fn list_active_by_user(
    &self,
    tenant_id: &str,
    user_id: &str,
    now_ms: i64,
  ) -> anyhow::Result<Vec<Session>> {
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .values()
        .filter(|s| {
          s.tenant_id == tenant_id
            && s.user_id == user_id
            && s.is_valid(now_ms)
        })
        .cloned()
        .collect(),
    )
  }
}

#[derive(Default)]
pub struct MemoryAuditRepository {
  rows: Mutex<Vec<AuditRecord>>,
}

#[async_trait::async_trait]
impl AuditRepository for MemoryAuditRepository {
  async fn insert(&self, record: AuditRecord) -> anyhow::Result<()> {
    self.rows.lock().unwrap().push(record);
    Ok(())
  }

  async fn list_recent(
    &self,
    tenant_id: &str,
    limit: usize,
  ) -> anyhow::Result<Vec<AuditRecord>> {
    let rows = self.rows.lock().unwrap();
    Ok(
      rows
        .iter()
        .rev()
        .filter(|r| r.tenant_id == tenant_id)
        .take(limit)
        .cloned()
        .collect(),
    )
  }
}

#[derive(Default)]
pub struct MemoryUserRepository {
  rows: Mutex<HashMap<(String, String), User>>,
}

#[async_trait::async_trait]
impl UserRepository for MemoryUserRepository {
  async fn get(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<Option<User>> {
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .get(&(tenant_id.to_string(), id.to_string()))
        .cloned(),
    )
  }

  async fn get_by_email(
    &self,
    tenant_id: &str,
    email: &str,
  ) -> anyhow::Result<Option<User>> {
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .values()
        .find(|u| u.tenant_id == tenant_id && u.email == email)
        .cloned(),
    )
  }

  async fn get_by_api_key(
    &self,
    key: &str,
  ) -> anyhow::Result<Option<User>> {
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .values()
        .find(|u| u.api_keys.iter().any(|k| k.key == key))
        .cloned(),
    )
  }

  async fn upsert(&self, user: User) -> anyhow::Result<()> {
    self
      .rows
      .lock()
      .unwrap()
      .insert((user.tenant_id.clone(), user.id.clone()), user);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wharf_client::entities::{
    catalog::{CatalogOwner, CatalogType, Visibility},
    user::Role,
  };

  fn store() -> Arc<EncryptedStore> {
    Arc::new(EncryptedStore::new(("k1", "test-root-secret"), &[]))
  }

  #[tokio::test]
  async fn catalog_round_trips_and_soft_deletes() {
    let repo = MemoryCatalogRepository::default();
    let catalog = Catalog {
      id: "cat-1".into(),
      name: "default".into(),
      display_name: "Default".into(),
      owner: CatalogOwner::System,
      owner_user_id: None,
      tenant_id: "tenant-a".into(),
      catalog_type: CatalogType::SystemDefault,
      visibility: Visibility::Public,
      version: 1,
      tags: Default::default(),
      registry: Default::default(),
      disabled_set: Default::default(),
      metadata: Default::default(),
      created_at: 0,
      updated_at: 0,
      deleted_at: None,
    };
    repo.insert(catalog.clone()).await.unwrap();

    let fetched =
      repo.get("tenant-a", "cat-1").await.unwrap().unwrap();
    assert_eq!(fetched.name, "default");

    repo.soft_delete("tenant-a", "cat-1", 123).await.unwrap();
    let deleted = repo.get("tenant-a", "cat-1").await.unwrap().unwrap();
    assert!(deleted.is_deleted());

    let readable =
      repo.list_readable("tenant-a", "user-1").await.unwrap();
    assert!(readable.is_empty(), "soft-deleted catalogs must not be listed as readable");

    let _ = Role::Admin;
  }

  #[tokio::test]
  async fn overlay_payload_is_encrypted_at_rest() {
    let repo = MemoryOverlayRepository::new(store());
    let overlay = UserCatalogOverlay {
      id: "ov-1".into(),
      user_id: "user-1".into(),
      tenant_id: "tenant-a".into(),
      base_catalog_id: "cat-1".into(),
      disabled: ["sensitive-server-name".to_string()].into_iter().collect(),
      custom: Default::default(),
      overrides: Default::default(),
      version: 1,
      updated_at: 0,
    };
    repo.upsert(overlay.clone()).await.unwrap();

    let raw = repo
      .rows
      .lock()
      .unwrap()
      .get(&("tenant-a".into(), "user-1".into(), "cat-1".into()))
      .unwrap()
      .ciphertext
      .clone();
    let raw_str = String::from_utf8_lossy(&raw);
    assert!(
      !raw_str.contains("sensitive-server-name"),
      "overlay payload must not be observable in storage as plaintext"
    );

    let fetched = repo
      .get("tenant-a", "user-1", "cat-1")
      .await
      .unwrap()
      .unwrap();
    assert!(fetched.disabled.contains("sensitive-server-name"));
  }

  #[tokio::test]
  async fn session_revoke_fails_validity_even_before_expiry() {
    let repo = MemorySessionRepository::default();
    let session = Session {
      id: "sess-1".into(),
      user_id: "user-1".into(),
      tenant_id: "tenant-a".into(),
      issued_at: 0,
      expires_at: i64::MAX,
      fingerprint: wharf_client::entities::session::ClientFingerprint {
        ip: "127.0.0.1".into(),
        user_agent: "test".into(),
      },
      revoked: false,
    };
    repo.insert(session).await.unwrap();
    repo.revoke("sess-1").await.unwrap();

    let fetched = repo.get("sess-1").await.unwrap().unwrap();
    assert!(!fetched.is_valid(1));
  }

  #[tokio::test]
  async fn audit_list_recent_is_tenant_scoped_and_newest_first() {
    let repo = MemoryAuditRepository::default();
    for (tenant, ts) in
      [("tenant-a", 1), ("tenant-a", 2), ("tenant-b", 3)]
    {
      repo
        .insert(AuditRecord {
          id: uuid::Uuid::new_v4(),
          timestamp: ts,
          tenant_id: tenant.into(),
          actor: wharf_client::entities::audit::Actor::System,
          event_kind:
            wharf_client::entities::audit::AuditEventKind::AuthSuccess,
          resource_type: "session".into(),
          resource_id: "sess-1".into(),
          severity: wharf_client::entities::audit::Severity::Low,
          details: serde_json::json!({}),
          fingerprint: None,
          request_id: None,
        })
        .await
        .unwrap();
    }

    let recent = repo.list_recent("tenant-a", 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].timestamp, 2);
  }

  #[tokio::test]
  async fn user_lookup_by_email_and_api_key() {
    let repo = MemoryUserRepository::default();
    let user = User {
      id: "user-1".into(),
      email: "a@example.com".into(),
      display_name: "A".into(),
      tenant_id: "tenant-a".into(),
      roles: vec![Role::Member],
      enabled: true,
      created_at: 0,
      password_hash: None,
      api_keys: vec![wharf_client::entities::user::ApiKeyCredential {
        key: "key-1".into(),
        secret_hash: "hash".into(),
        name: "ci".into(),
        created_at: 0,
      }],
    };
    repo.upsert(user.clone()).await.unwrap();

    assert!(repo.get("tenant-a", "user-1").await.unwrap().is_some());
    assert!(repo
      .get_by_email("tenant-a", "a@example.com")
      .await
      .unwrap()
      .is_some());
    assert!(repo.get_by_api_key("key-1").await.unwrap().is_some());
    assert!(repo.get_by_api_key("nope").await.unwrap().is_none());
  }
}
