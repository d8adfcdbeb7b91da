use serde::{Deserialize, Serialize};

/// Bootstrap environment, parsed with `envy` before the rest of the
/// config is resolved — mirrors the teacher's `Env` struct used to
/// discover config file paths before the full config is loaded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Env {
  #[serde(default)]
  pub wharf_config_paths: Vec<String>,
  #[serde(default)]
  pub wharf_config_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
  pub read_timeout_secs: u64,
  pub write_timeout_secs: u64,
  pub shutdown_timeout_secs: u64,
  pub max_header_bytes: usize,
  pub tls_enabled: bool,
  pub tls_cert_file: String,
  pub tls_key_file: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: "0.0.0.0".to_string(),
      port: 8120,
      read_timeout_secs: 30,
      write_timeout_secs: 30,
      shutdown_timeout_secs: 10,
      max_header_bytes: 1 << 20,
      tls_enabled: false,
      tls_cert_file: String::new(),
      tls_key_file: String::new(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  pub uri: String,
  pub database: String,
  pub max_conns: u32,
  pub min_conns: u32,
  pub max_conn_lifetime_secs: u64,
  pub max_conn_idle_time_secs: u64,
  pub statement_timeout_secs: u64,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      uri: "mongodb://localhost:27017".to_string(),
      database: "wharf".to_string(),
      max_conns: 20,
      min_conns: 1,
      max_conn_lifetime_secs: 30 * 60,
      max_conn_idle_time_secs: 10 * 60,
      statement_timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub addresses: Vec<String>,
  pub db: u32,
  pub pool_size: u32,
  pub dial_timeout_secs: u64,
  pub read_timeout_secs: u64,
  pub write_timeout_secs: u64,
  pub session_ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      addresses: vec!["127.0.0.1:6379".to_string()],
      db: 0,
      pool_size: 10,
      dial_timeout_secs: 5,
      read_timeout_secs: 5,
      write_timeout_secs: 5,
      session_ttl_secs: 24 * 60 * 60,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
  pub tenant_id: String,
  pub client_id: String,
  pub client_secret: String,
  pub redirect_url: String,
  pub scopes: Vec<String>,
  pub authority: String,
}

impl IdentityConfig {
  /// All four identifiers are required together (spec §6).
  pub fn is_configured(&self) -> bool {
    !self.client_id.is_empty()
      && !self.client_secret.is_empty()
      && !self.redirect_url.is_empty()
      && !self.authority.is_empty()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
  pub jwt_signing_key: String,
  pub jwt_issuer: String,
  pub jwt_audience: String,
  pub access_ttl_secs: u64,
  pub refresh_ttl_secs: u64,
  pub csrf_ttl_secs: u64,
  pub rate_requests: u32,
  pub rate_window_secs: u64,
  pub cors_origins: Vec<String>,
  pub cors_methods: Vec<String>,
  pub cors_headers: Vec<String>,
  pub cors_max_age_secs: u64,
  /// Root key for the encrypted store (lib `crypto`), sourced
  /// independently from env like every other `*_secret` field.
  pub encryption_root_key: String,
  pub auth_rate_limit_disabled: bool,
  pub auth_rate_limit_max_attempts: u32,
  pub auth_rate_limit_window_secs: u64,
}

impl Default for SecurityConfig {
  fn default() -> Self {
    Self {
      jwt_signing_key: String::new(),
      jwt_issuer: "wharf".to_string(),
      jwt_audience: "wharf-clients".to_string(),
      access_ttl_secs: 15 * 60,
      refresh_ttl_secs: 7 * 24 * 60 * 60,
      csrf_ttl_secs: 60 * 60,
      rate_requests: 100,
      rate_window_secs: 60,
      cors_origins: vec![],
      cors_methods: vec![],
      cors_headers: vec![],
      cors_max_age_secs: 3600,
      encryption_root_key: String::new(),
      auth_rate_limit_disabled: false,
      auth_rate_limit_max_attempts: 5,
      auth_rate_limit_window_secs: 15 * 60,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
  pub binary_path: String,
  pub working_dir: String,
  pub runtime_socket: String,
  pub command_timeout_secs: u64,
  pub max_concurrent: usize,
  pub output_buffer_size: usize,
  pub enable_debug: bool,
  /// Grace window before escalating from terminate to kill (spec
  /// §4.1 "Timeout & cancellation").
  pub kill_grace_secs: u64,
}

impl Default for ExecutorConfig {
  fn default() -> Self {
    Self {
      binary_path: "/usr/local/bin/fleetctl".to_string(),
      working_dir: "/var/lib/wharf".to_string(),
      runtime_socket: "/var/run/docker.sock".to_string(),
      command_timeout_secs: 30,
      max_concurrent: 16,
      output_buffer_size: 1 << 20,
      enable_debug: false,
      kill_grace_secs: 2,
    }
  }
}

impl ExecutorConfig {
  pub const MIN_COMMAND_TIMEOUT_SECS: u64 = 1;
  pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 30 * 60;

  pub fn clamp_timeout_secs(&self, requested: Option<u64>) -> u64 {
    requested
      .unwrap_or(self.command_timeout_secs)
      .clamp(Self::MIN_COMMAND_TIMEOUT_SECS, Self::MAX_COMMAND_TIMEOUT_SECS)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
  pub max_connections: usize,
  pub max_connections_per_user: usize,
  pub ping_interval_secs: u64,
  pub pong_timeout_secs: u64,
  pub read_timeout_secs: u64,
  pub write_timeout_secs: u64,
  pub max_message_size: usize,
  pub allowed_origins: Vec<String>,
  pub buffer_size: usize,
  pub enable_compression: bool,
  pub cleanup_interval_secs: u64,
}

impl Default for RealtimeConfig {
  fn default() -> Self {
    Self {
      max_connections: 1000,
      max_connections_per_user: 10,
      ping_interval_secs: 30,
      pong_timeout_secs: 10,
      read_timeout_secs: 60,
      write_timeout_secs: 10,
      max_message_size: 1 << 16,
      allowed_origins: vec![],
      buffer_size: 256,
      enable_compression: false,
      cleanup_interval_secs: 5 * 60,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WharfConfig {
  pub server: ServerConfig,
  pub storage: StorageConfig,
  pub cache: CacheConfig,
  pub identity: IdentityConfig,
  pub security: SecurityConfig,
  pub executor: ExecutorConfig,
  pub realtime: RealtimeConfig,
  pub log: LogConfig,
  /// Max size, in records, of the in-memory audit queue before the
  /// sink starts shedding from the tail (spec §9 "Audit sink
  /// buffering").
  pub audit_queue_size: usize,
  pub transparent_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioLogMode {
  Standard,
  Json,
  None,
}

impl Default for StdioLogMode {
  fn default() -> Self {
    StdioLogMode::Standard
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  pub level: String,
  pub stdio: StdioLogMode,
  pub pretty: bool,
  pub ansi: bool,
  pub location: bool,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      stdio: StdioLogMode::Standard,
      pretty: false,
      ansi: true,
      location: false,
    }
  }
}

impl Default for WharfConfig {
  fn default() -> Self {
    Self {
      server: ServerConfig::default(),
      storage: StorageConfig::default(),
      cache: CacheConfig::default(),
      identity: IdentityConfig::default(),
      security: SecurityConfig::default(),
      executor: ExecutorConfig::default(),
      realtime: RealtimeConfig::default(),
      log: LogConfig::default(),
      audit_queue_size: 10_000,
      transparent_mode: false,
    }
  }
}
