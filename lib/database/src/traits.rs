use wharf_client::entities::{
  audit::AuditRecord,
  catalog::{Catalog, UserCatalogOverlay},
  container::ContainerShadow,
  session::Session,
  user::User,
};

/// Tenant-scoped catalog persistence. Soft-delete only: a catalog is
/// never dropped from storage, `deleted_at` is stamped instead (data
/// model invariant on `Catalog.deleted_at`).
#[async_trait::async_trait]
pub trait CatalogRepository: Send + Sync {
  async fn get(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<Option<Catalog>>;

  /// All non-deleted catalogs in the tenant readable by `user_id`
  /// (public, or private and owned).
  async fn list_readable(
    &self,
    tenant_id: &str,
    user_id: &str,
  ) -> anyhow::Result<Vec<Catalog>>;

  async fn insert(&self, catalog: Catalog) -> anyhow::Result<()>;

  /// Replaces the stored catalog wholesale. Callers are expected to
  /// have bumped `version` and `updated_at` first.
  async fn update(&self, catalog: Catalog) -> anyhow::Result<()>;

  async fn soft_delete(
    &self,
    tenant_id: &str,
    id: &str,
    deleted_at: i64,
  ) -> anyhow::Result<()>;
}

/// Tenant-scoped overlay persistence. Implementations are responsible
/// for encrypting the overlay's sensitive fields (`disabled`, `custom`,
/// `overrides`) at rest and decrypting transparently on read — callers
/// never see ciphertext (data model invariant 6).
#[async_trait::async_trait]
pub trait OverlayRepository: Send + Sync {
  async fn get(
    &self,
    tenant_id: &str,
    user_id: &str,
    base_catalog_id: &str,
  ) -> anyhow::Result<Option<UserCatalogOverlay>>;

  /// Inserts or replaces the overlay for `(tenant_id, user_id,
  /// base_catalog_id)`. Callers are expected to have bumped `version`
  /// and `updated_at` first.
  async fn upsert(
    &self,
    overlay: UserCatalogOverlay,
  ) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait ContainerShadowRepository: Send + Sync {
  async fn get(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<Option<ContainerShadow>>;

  async fn list_by_owner(
    &self,
    tenant_id: &str,
    owner_user_id: &str,
  ) -> anyhow::Result<Vec<ContainerShadow>>;

  async fn upsert(
    &self,
    tenant_id: &str,
    shadow: ContainerShadow,
  ) -> anyhow::Result<()>;

  async fn remove(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait SessionRepository: Send + Sync {
  async fn get(&self, id: &str) -> anyhow::Result<Option<Session>>;

  async fn insert(&self, session: Session) -> anyhow::Result<()>;

  /// Marks a session revoked; a revoked session fails
  /// [`Session::is_valid`] even before `expires_at`.
  async fn revoke(&self, id: &str) -> anyhow::Result<()>;

  async fn list_active_by_user(
    &self,
    tenant_id: &str,
    user_id: &str,
    now_ms: i64,
  ) -> anyhow::Result<Vec<Session>>;
}

/// Append-only. Audit records are never updated or deleted by the
/// application; retention/rollup is an operational concern outside
/// this trait (spec.md §4 audit sink description).
#[async_trait::async_trait]
pub trait AuditRepository: Send + Sync {
  async fn insert(&self, record: AuditRecord) -> anyhow::Result<()>;

  async fn list_recent(
    &self,
    tenant_id: &str,
    limit: usize,
  ) -> anyhow::Result<Vec<AuditRecord>>;
}

/// Tenant-scoped user persistence. Users are created either by the
/// identity-provider callback (no `password_hash`) or by local signup
/// (bcrypt `password_hash` set); both paths go through `upsert`.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
  async fn get(
    &self,
    tenant_id: &str,
    id: &str,
  ) -> anyhow::Result<Option<User>>;

  async fn get_by_email(
    &self,
    tenant_id: &str,
    email: &str,
  ) -> anyhow::Result<Option<User>>;

  async fn get_by_api_key(
    &self,
    key: &str,
  ) -> anyhow::Result<Option<User>>;

  async fn upsert(&self, user: User) -> anyhow::Result<()>;
}
