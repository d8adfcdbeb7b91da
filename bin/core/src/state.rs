//! Process-wide singletons, following the same `OnceLock` accessor
//! shape as [`crate::config::core_config`]: each piece of shared state
//! is built once, lazily or during startup, and handed out as a
//! `&'static` reference for the lifetime of the process.

use std::sync::{Arc, OnceLock};

use cache::TimeoutCache;
use crypto::EncryptedStore;
use database::{
  AuditRepository, CatalogRepository, ContainerShadowRepository,
  OverlayRepository, SessionRepository, UserRepository,
  memory::{
    MemoryAuditRepository, MemoryCatalogRepository,
    MemoryContainerShadowRepository, MemoryOverlayRepository,
    MemorySessionRepository, MemoryUserRepository,
  },
  mongo::{
    MongoAuditRepository, MongoCatalogRepository,
    MongoContainerShadowRepository, MongoOverlayRepository,
    MongoSessionRepository, MongoUserRepository,
  },
};
use mongodb::Client as MongoClient;
use rate_limit::{RateLimiter, bucket::BucketRateLimiter};
use wharf_client::api::catalogs::ResolvedCatalog;

use crate::{
  audit::AuditSink, auth::jwt::JwtClient, config::core_config,
  realtime::Hub,
};

/// The bundle of repository trait objects the rest of `bin/core`
/// depends on. Built once at startup from `storage.uri`: a `memory://`
/// URI selects the in-memory backend (used by integration tests and
/// ephemeral deployments), anything else is handed to the `mongodb`
/// driver.
pub struct Repositories {
  pub catalogs: Arc<dyn CatalogRepository>,
  pub overlays: Arc<dyn OverlayRepository>,
  pub container_shadows: Arc<dyn ContainerShadowRepository>,
  pub sessions: Arc<dyn SessionRepository>,
  pub audit: Arc<dyn AuditRepository>,
  pub users: Arc<dyn UserRepository>,
}

static REPOSITORIES: OnceLock<Repositories> = OnceLock::new();

pub fn repositories() -> &'static Repositories {
  REPOSITORIES.get().unwrap_or_else(|| {
    tracing::error!("repositories accessed before init_repositories");
    std::process::exit(1);
  })
}

/// Must be called exactly once during startup, before any handler
/// runs. Connects to mongo (or builds the in-memory backend) and
/// stores the resulting trait objects.
pub async fn init_repositories() -> anyhow::Result<()> {
  let config = &core_config().storage;
  let store = encrypted_store();

  let repos = if config.uri.starts_with("memory://") {
    tracing::warn!(
      "storage.uri is memory://, using in-memory repositories (data does not persist)"
    );
    Repositories {
      catalogs: Arc::new(MemoryCatalogRepository::default()),
      overlays: Arc::new(MemoryOverlayRepository::new(store.clone())),
      container_shadows: Arc::new(
        MemoryContainerShadowRepository::default(),
      ),
      sessions: Arc::new(MemorySessionRepository::default()),
      audit: Arc::new(MemoryAuditRepository::default()),
      users: Arc::new(MemoryUserRepository::default()),
    }
  } else {
    let client = MongoClient::with_uri_str(&config.uri)
      .await
      .map_err(|e| {
        anyhow::anyhow!("failed to connect to storage.uri: {e}")
      })?;
    let db = client.database(&config.database);
    Repositories {
      catalogs: Arc::new(MongoCatalogRepository::new(&db)),
      overlays: Arc::new(MongoOverlayRepository::new(&db, store.clone())),
      container_shadows: Arc::new(
        MongoContainerShadowRepository::new(&db),
      ),
      sessions: Arc::new(MongoSessionRepository::new(&db)),
      audit: Arc::new(MongoAuditRepository::new(&db)),
      users: Arc::new(MongoUserRepository::new(&db)),
    }
  };

  REPOSITORIES.set(repos).map_err(|_| {
    anyhow::anyhow!("init_repositories called more than once")
  })
}

pub fn encrypted_store() -> Arc<EncryptedStore> {
  static STORE: OnceLock<Arc<EncryptedStore>> = OnceLock::new();
  STORE
    .get_or_init(|| {
      let security = &core_config().security;
      Arc::new(EncryptedStore::new(
        ("primary", &security.encryption_root_key),
        &[],
      ))
    })
    .clone()
}

pub fn jwt_client() -> &'static JwtClient {
  static JWT_CLIENT: OnceLock<JwtClient> = OnceLock::new();
  JWT_CLIENT.get_or_init(|| match JwtClient::new(core_config()) {
    Ok(client) => client,
    Err(e) => {
      tracing::error!("failed to initialize JwtClient: {e:#}");
      std::process::exit(1);
    }
  })
}

/// IP-keyed failure-only rate limiting for every auth entry point
/// (local login, OIDC callback, api key exchange), kept separate from
/// the per-command executor bucket below.
pub fn auth_rate_limiter() -> Arc<RateLimiter> {
  static LIMITER: OnceLock<Arc<RateLimiter>> = OnceLock::new();
  LIMITER
    .get_or_init(|| {
      let security = &core_config().security;
      if security.auth_rate_limit_disabled {
        tracing::warn!("auth rate limiting is disabled");
      }
      RateLimiter::new(
        security.auth_rate_limit_disabled,
        security.auth_rate_limit_max_attempts as usize,
        security.auth_rate_limit_window_secs,
      )
    })
    .clone()
}

/// Per `(user, command class)` token bucket guarding the command
/// executor (spec §4.1 rate limiting, testable property 7).
pub fn command_rate_limiter() -> Arc<BucketRateLimiter> {
  static LIMITER: OnceLock<Arc<BucketRateLimiter>> = OnceLock::new();
  LIMITER
    .get_or_init(|| {
      let security = &core_config().security;
      BucketRateLimiter::new(
        security.rate_requests as usize,
        std::time::Duration::from_secs(security.rate_window_secs),
      )
    })
    .clone()
}

/// Caps the number of command executions running concurrently across
/// the whole process (spec §4.1 "Concurrency ceiling").
pub fn executor_semaphore() -> &'static tokio::sync::Semaphore {
  static SEMAPHORE: OnceLock<tokio::sync::Semaphore> = OnceLock::new();
  SEMAPHORE.get_or_init(|| {
    tokio::sync::Semaphore::new(core_config().executor.max_concurrent)
  })
}

/// Single-flight cache of resolved catalogs, keyed by a string built
/// from every input that can change the resolution result (spec §4.3
/// "identical inputs within the TTL window return the same resolution
/// without recomputation").
pub type CatalogCache = TimeoutCache<String, ResolvedCatalog>;

pub fn catalog_cache() -> &'static CatalogCache {
  static CACHE: OnceLock<CatalogCache> = OnceLock::new();
  CACHE.get_or_init(Default::default)
}

pub fn realtime_hub() -> &'static Hub {
  static HUB: OnceLock<Hub> = OnceLock::new();
  HUB.get_or_init(|| Hub::new(&core_config().realtime))
}

pub fn audit_sink() -> &'static AuditSink {
  static SINK: OnceLock<AuditSink> = OnceLock::new();
  SINK.get_or_init(|| {
    AuditSink::spawn(repositories().audit.clone(), core_config().audit_queue_size)
  })
}
