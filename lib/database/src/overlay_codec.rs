//! Splits a [`UserCatalogOverlay`] into plaintext routing fields (used
//! for lookups/indexing) and an encrypted payload (the parts a user
//! actually wrote: disables, custom servers, overrides). Shared by both
//! the mongo and in-memory repository implementations so encryption
//! behavior doesn't drift between them.

use anyhow::{Context, Result};
use crypto::{Ciphertext, EncryptedStore};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use wharf_client::entities::catalog::{
  ServerDefinition, ServerDefinitionPatch, UserCatalogOverlay,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OverlayPayload {
  disabled: IndexSet<String>,
  custom: IndexMap<String, ServerDefinition>,
  overrides: IndexMap<String, ServerDefinitionPatch>,
}

pub struct EncodedOverlay {
  pub id: String,
  pub user_id: String,
  pub tenant_id: String,
  pub base_catalog_id: String,
  pub version: u64,
  pub updated_at: i64,
  pub key_id: String,
  pub ciphertext: Vec<u8>,
}

pub fn encode(
  store: &EncryptedStore,
  overlay: &UserCatalogOverlay,
) -> Result<EncodedOverlay> {
  let payload = OverlayPayload {
    disabled: overlay.disabled.clone(),
    custom: overlay.custom.clone(),
    overrides: overlay.overrides.clone(),
  };
  let plaintext =
    serde_json::to_vec(&payload).context("serializing overlay payload")?;
  let ct = store.encrypt(&overlay.tenant_id, &plaintext)?;

  Ok(EncodedOverlay {
    id: overlay.id.clone(),
    user_id: overlay.user_id.clone(),
    tenant_id: overlay.tenant_id.clone(),
    base_catalog_id: overlay.base_catalog_id.clone(),
    version: overlay.version,
    updated_at: overlay.updated_at,
    key_id: ct.key_id,
    ciphertext: ct.bytes,
  })
}

#[allow(clippy::too_many_arguments)]
pub fn decode(
  store: &EncryptedStore,
  id: String,
  user_id: String,
  tenant_id: String,
  base_catalog_id: String,
  version: u64,
  updated_at: i64,
  key_id: String,
  ciphertext: Vec<u8>,
) -> Result<UserCatalogOverlay> {
  let ct = Ciphertext { key_id, bytes: ciphertext };
  let plaintext = store
    .decrypt(&tenant_id, &ct)
    .context("decrypting overlay payload")?;
  let payload: OverlayPayload = serde_json::from_slice(&plaintext)
    .context("deserializing overlay payload")?;

  Ok(UserCatalogOverlay {
    id,
    user_id,
    tenant_id,
    base_catalog_id,
    disabled: payload.disabled,
    custom: payload.custom,
    overrides: payload.overrides,
    version,
    updated_at,
  })
}
