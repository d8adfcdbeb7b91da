use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStart {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStop {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatus {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayState {
  Running,
  Stopped,
  Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatusResponse {
  pub state: GatewayState,
  #[serde(default)]
  pub detail: Option<String>,
}
