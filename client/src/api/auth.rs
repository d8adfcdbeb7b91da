use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginBegin {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginBeginResponse {
  pub auth_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginComplete {
  pub code: String,
  pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCompleteResponse {
  pub session_id: String,
  pub jwt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginLocal {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupLocal {
  pub email: String,
  pub password: String,
  pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupLocalResponse {
  pub user: crate::entities::user::User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logout {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refresh {
  pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
  pub jwt: String,
}
