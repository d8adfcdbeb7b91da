use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadConfig {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadConfigResponse {
  pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfig {
  pub patch: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfigResponse {
  pub config: serde_json::Value,
}
