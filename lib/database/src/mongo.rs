//! `mongodb`-backed repository implementations (spec.md §9 "one
//! implementation backed by mongodb"). Collections are keyed by a
//! plain `tenant_id` field rather than Mongo's own `_id`, since every
//! lookup in this workspace is already tenant-scoped; a compound index
//! on `(tenant_id, id)` is expected to be created once at cluster setup
//! time (outside this crate's job).

use bson::doc;
use crypto::EncryptedStore;
use futures_util::TryStreamExt;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
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

pub struct MongoCatalogRepository {
  collection: Collection<Catalog>,
}

impl MongoCatalogRepository {
  pub fn new(db: &Database) -> Self {
    Self { collection: db.collection("catalogs") }
  }
}

#[async_trait::async_trait]
impl CatalogRepository for MongoCatalogRepository {
  async fn get(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<Option<Catalog>> {
    Ok(
      self
        .collection
        .find_one(doc! { "tenant_id": tenant_id, "id": id })
        .await?,
    )
  }

  async fn list_readable(
    &self,
    tenant_id: &str,
    user_id: &str,
  ) -> anyhow::Result<Vec<Catalog>> {
    let filter = doc! {
      "tenant_id": tenant_id,
      "deleted_at": null,
      "$or": [
        { "visibility": "public" },
        { "visibility": "private", "owner_user_id": user_id },
      ],
    };
    let mut cursor = self.collection.find(filter).await?;
    let mut out = Vec::new();
    while let Some(catalog) = cursor.try_next().await? {
      out.push(catalog);
    }
    Ok(out)
  }

  async fn insert(&self, catalog: Catalog) -> anyhow::Result<()> {
    self.collection.insert_one(catalog).await?;
    Ok(())
  }

  async fn update(&self, catalog: Catalog) -> anyhow::Result<()> {
    self
      .collection
      .replace_one(
        doc! { "tenant_id": &catalog.tenant_id, "id": &catalog.id },
        catalog,
      )
      .upsert(true)
      .await?;
    Ok(())
  }

  async fn soft_delete(
    &self,
    tenant_id: &str,
    id: &str,
    deleted_at: i64,
  ) -> anyhow::Result<()> {
    self
      .collection
      .update_one(
        doc! { "tenant_id": tenant_id, "id": id },
        doc! { "$set": { "deleted_at": deleted_at } },
      )
      .await?;
    Ok(())
  }
}

/// Wire shape of an overlay document: plaintext routing fields plus an
/// opaque, hex-encoded ciphertext blob for the sensitive payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OverlayDoc {
  id: String,
  user_id: String,
  tenant_id: String,
  base_catalog_id: String,
  version: u64,
  updated_at: i64,
  payload_key_id: String,
  payload_ciphertext_hex: String,
}

pub struct MongoOverlayRepository {
  collection: Collection<OverlayDoc>,
  store: Arc<EncryptedStore>,
}

impl MongoOverlayRepository {
  pub fn new(db: &Database, store: Arc<EncryptedStore>) -> Self {
    Self { collection: db.collection("overlays"), store }
  }
}

#[async_trait::async_trait]
impl OverlayRepository for MongoOverlayRepository {
  async fn get(
    &self,
    tenant_id: &str,
    user_id: &str,
    base_catalog_id: &str,
  ) -> anyhow::Result<Option<UserCatalogOverlay>> {
    let Some(doc) = self
      .collection
      .find_one(doc! {
        "tenant_id": tenant_id,
        "user_id": user_id,
        "base_catalog_id": base_catalog_id,
      })
      .await?
    else {
      return Ok(None);
    };

    let ciphertext = hex::decode(&doc.payload_ciphertext_hex)
      .map_err(|e| anyhow::anyhow!("corrupt overlay ciphertext: {e}"))?;

    overlay_codec::decode(
      &self.store,
      doc.id,
      doc.user_id,
      doc.tenant_id,
      doc.base_catalog_id,
      doc.version,
      doc.updated_at,
      doc.payload_key_id,
      ciphertext,
    )
    .map(Some)
  }

  async fn upsert(
    &self,
    overlay: UserCatalogOverlay,
  ) -> anyhow::Result<()> {
    let encoded = overlay_codec::encode(&self.store, &overlay)?;
    let doc = OverlayDoc {
      id: encoded.id,
      user_id: encoded.user_id,
      tenant_id: encoded.tenant_id.clone(),
      base_catalog_id: encoded.base_catalog_id.clone(),
      version: encoded.version,
      updated_at: encoded.updated_at,
      payload_key_id: encoded.key_id,
      payload_ciphertext_hex: hex::encode(encoded.ciphertext),
    };
    self
      .collection
      .replace_one(
        doc! {
          "tenant_id": &doc.tenant_id,
          "user_id": &doc.user_id,
          "base_catalog_id": &doc.base_catalog_id,
        },
        doc,
      )
      .upsert(true)
      .await?;
    Ok(())
  }
}

pub struct MongoContainerShadowRepository {
  collection: Collection<ContainerShadow>,
}

impl MongoContainerShadowRepository {
  pub fn new(db: &Database) -> Self {
    Self { collection: db.collection("container_shadows") }
  }
}

#[async_trait::async_trait]
impl ContainerShadowRepository for MongoContainerShadowRepository {
  async fn get(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<Option<ContainerShadow>> {
    // `tenant_id` is not a field on `ContainerShadow` itself (it shares
    // the catalog's tenant implicitly through ownership); the
    // collection is still partitioned per tenant to keep queries cheap.
    Ok(
      self
        .collection
        .find_one(doc! { "_tenant": tenant_id, "id": id })
        .await?,
    )
  }

  async fn list_by_owner(
    &self,
    tenant_id: &str,
    owner_user_id: &str,
  ) -> anyhow::Result<Vec<ContainerShadow>> {
    let mut cursor = self
      .collection
      .find(doc! { "_tenant": tenant_id, "owner_user_id": owner_user_id })
      .await?;
    let mut out = Vec::new();
    while let Some(shadow) = cursor.try_next().await? {
      out.push(shadow);
    }
    Ok(out)
  }

  async fn upsert(
    &self,
    tenant_id: &str,
    shadow: ContainerShadow,
  ) -> anyhow::Result<()> {
    self
      .collection
      .replace_one(
        doc! { "_tenant": tenant_id, "id": &shadow.id },
        shadow,
      )
      .upsert(true)
      .await?;
    Ok(())
  }

  async fn remove(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<()> {
    self
      .collection
      .delete_one(doc! { "_tenant": tenant_id, "id": id })
      .await?;
    Ok(())
  }
}

pub struct MongoSessionRepository {
  collection: Collection<Session>,
}

impl MongoSessionRepository {
  pub fn new(db: &Database) -> Self {
    Self { collection: db.collection("sessions") }
  }
}

#[async_trait::async_trait]
impl SessionRepository for MongoSessionRepository {
  async fn get(&self, id: &str) -> anyhow::Result<Option<Session>> {
    Ok(self.collection.find_one(doc! { "id": id }).await?)
  }

  async fn insert(&self, session: Session) -> anyhow::Result<()> {
    self.collection.insert_one(session).await?;
    Ok(())
  }

  async fn revoke(&self, id: &str) -> anyhow::Result<()> {
    self
      .collection
      .update_one(doc! { "id": id }, doc! { "$set": { "revoked": true } })
      .await?;
    Ok(())
  }

  async fn list_active_by_user(
    &self,
    tenant_id: &str,
    user_id: &str,
    now_ms: i64,
  ) -> anyhow::Result<Vec<Session>> {
    let filter = doc! {
      "tenant_id": tenant_id,
      "user_id": user_id,
      "revoked": false,
      "expires_at": { "$gt": now_ms },
    };
    let mut cursor = self.collection.find(filter).await?;
    let mut out = Vec::new();
    while let Some(session) = cursor.try_next().await? {
      out.push(session);
    }
    Ok(out)
  }
}

pub struct MongoAuditRepository {
  collection: Collection<AuditRecord>,
}

impl MongoAuditRepository {
  pub fn new(db: &Database) -> Self {
    Self { collection: db.collection("audit_log") }
  }
}

#[async_trait::async_trait]
impl AuditRepository for MongoAuditRepository {
  async fn insert(&self, record: AuditRecord) -> anyhow::Result<()> {
    self.collection.insert_one(record).await?;
    Ok(())
  }

  async fn list_recent(
    &self,
    tenant_id: &str,
    limit: usize,
  ) -> anyhow::Result<Vec<AuditRecord>> {
    let mut cursor = self
      .collection
      .find(doc! { "tenant_id": tenant_id })
      .sort(doc! { "timestamp": -1 })
      .limit(limit as i64)
      .await?;
    let mut out = Vec::new();
    while let Some(record) = cursor.try_next().await? {
      out.push(record);
    }
    Ok(out)
  }
}

pub struct MongoUserRepository {
  collection: Collection<User>,
}

impl MongoUserRepository {
  pub fn new(db: &Database) -> Self {
    Self { collection: db.collection("users") }
  }
}

#[async_trait::async_trait]
impl UserRepository for MongoUserRepository {
  async fn get(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<Option<User>> {
    Ok(
      self
        .collection
        .find_one(doc! { "tenant_id": tenant_id, "id": id })
        .await?,
    )
  }

  async fn get_by_email(
    &self,
    tenant_id: &str,
    email: &str,
  ) -> anyhow::Result<Option<User>> {
    Ok(
      self
        .collection
        .find_one(doc! { "tenant_id": tenant_id, "email": email })
        .await?,
    )
  }

  async fn get_by_api_key(
    &self,
    key: &str,
  ) -> anyhow::Result<Option<User>> {
    Ok(
      self
        .collection
        .find_one(doc! { "api_keys.key": key })
        .await?,
    )
  }

  async fn upsert(&self, user: User) -> anyhow::Result<()> {
    self
      .collection
      .replace_one(
        doc! { "tenant_id": &user.tenant_id, "id": &user.id },
        user,
      )
      .upsert(true)
      .await?;
    Ok(())
  }
}
