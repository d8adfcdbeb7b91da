//! Encrypted-store capability for per-user overlay payloads (spec §9
//! "Encryption of user overlays", data model invariant 6: "Encrypted-store
//! payloads are never observable in logs, audit, or API responses").
//!
//! The repository only ever sees [`Ciphertext`] — an opaque blob plus
//! a `key_id` — never plaintext. Encryption/decryption is this
//! capability's job, not the repository's, exactly as spec §9 states.
//!
//! Keys rotate without re-encrypting data already at rest: each
//! [`EncryptedStore`] holds a small ordered set of root keys tagged by
//! id, the newest of which is used for new encryptions, while any
//! still-registered older key can still decrypt what it wrote. This
//! mirrors the teacher's `noise::RotatableKeyPair` naming/rotation
//! idiom (spec §9 names it explicitly), adapted from an asymmetric
//! handshake keypair to this store's symmetric per-tenant keys.

use std::collections::BTreeMap;

use aes_gcm::{
  Aes256Gcm, Key, KeyInit, Nonce,
  aead::{Aead, OsRng, rand_core::RngCore},
};
use anyhow::{Context, Result, anyhow};
use hmac::{Hmac, Mac};
use sha2::Sha256;

const NONCE_LEN: usize = 12;

/// Opaque, at-rest form of an encrypted overlay payload. Safe to log
/// the `key_id` (it identifies a root key generation, not a secret)
/// but never `bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
  pub key_id: String,
  pub bytes: Vec<u8>,
}

impl Ciphertext {
  /// Hex-encodes for storage in a text column / document field. The
  /// nonce is prepended to `bytes` by [`EncryptedStore::encrypt`], so
  /// this is the complete at-rest representation.
  pub fn to_hex(&self) -> String {
    hex::encode(&self.bytes)
  }

  pub fn from_hex(key_id: impl Into<String>, hex_str: &str) -> Result<Self> {
    Ok(Self {
      key_id: key_id.into(),
      bytes: hex::decode(hex_str).context("invalid ciphertext hex")?,
    })
  }
}

/// A root key tagged by id. Root keys are sourced from
/// `security.encryption_root_key` (and any retired predecessors an
/// operator keeps around during a rotation window); this type never
/// derives them — only the workspace's config layer reads the secret.
#[derive(Clone)]
struct RootKey {
  id: String,
  secret: Vec<u8>,
}

/// Rotatable symmetric encryption capability. Holds one or more root
/// keys; new encryptions always use the newest, but decryption looks
/// up the key by the `key_id` tag on the ciphertext, so old data stays
/// readable across a rotation.
pub struct EncryptedStore {
  keys: Vec<RootKey>,
}

impl EncryptedStore {
  /// `current` is used for all new encryptions. `retired` are
  /// previously-current keys kept only to decrypt data written before
  /// a rotation; pass an empty slice if this is the first key.
  pub fn new(current: (&str, &str), retired: &[(&str, &str)]) -> Self {
    let mut keys = vec![RootKey {
      id: current.0.to_string(),
      secret: current.1.as_bytes().to_vec(),
    }];
    keys.extend(retired.iter().map(|(id, secret)| RootKey {
      id: id.to_string(),
      secret: secret.as_bytes().to_vec(),
    }));
    Self { keys }
  }

  fn current(&self) -> &RootKey {
    &self.keys[0]
  }

  fn find(&self, key_id: &str) -> Result<&RootKey> {
    self
      .keys
      .iter()
      .find(|k| k.id == key_id)
      .ok_or_else(|| anyhow!("unknown encryption key id {key_id:?} (rotated out?)"))
  }

  /// Derives a per-tenant data-encryption key from a root key via
  /// HMAC-SHA256 (`HMAC(root_secret, tenant_id)`), so a single root
  /// key never directly encrypts more than one tenant's data under the
  /// same derived key.
  fn derive_dek(root: &RootKey, tenant_id: &str) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(&root.secret)
      .expect("HMAC accepts any key length");
    mac.update(tenant_id.as_bytes());
    mac.finalize().into_bytes().into()
  }

  /// Encrypts `plaintext` for `tenant_id` under the current root key.
  /// A random 96-bit nonce is generated per call and prepended to the
  /// returned ciphertext bytes.
  pub fn encrypt(&self, tenant_id: &str, plaintext: &[u8]) -> Result<Ciphertext> {
    let root = self.current();
    let dek = Self::derive_dek(root, tenant_id);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&dek));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut out = nonce_bytes.to_vec();
    out.extend(
      cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| anyhow!("encryption failed"))?,
    );

    Ok(Ciphertext {
      key_id: root.id.clone(),
      bytes: out,
    })
  }

  /// Decrypts a [`Ciphertext`] previously produced by [`Self::encrypt`]
  /// for the same `tenant_id`. Looks the root key up by `key_id` so
  /// data survives key rotation as long as the old key is still
  /// registered.
  pub fn decrypt(&self, tenant_id: &str, ct: &Ciphertext) -> Result<Vec<u8>> {
    if ct.bytes.len() < NONCE_LEN {
      return Err(anyhow!("ciphertext too short to contain a nonce"));
    }
    let root = self.find(&ct.key_id)?;
    let dek = Self::derive_dek(root, tenant_id);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&dek));

    let (nonce_bytes, body) = ct.bytes.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
      .decrypt(nonce, body)
      .map_err(|_| anyhow!("decryption failed: wrong key or tampered ciphertext"))
  }
}

/// Convenience snapshot used by ops tooling / diagnostics — never
/// exposes key material, only the ids currently registered (data model
/// invariant 6).
pub fn registered_key_ids(store: &EncryptedStore) -> BTreeMap<usize, String> {
  store
    .keys
    .iter()
    .enumerate()
    .map(|(i, k)| (i, k.id.clone()))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_for_same_tenant() {
    let store = EncryptedStore::new(("k1", "root-secret-one"), &[]);
    let ct = store.encrypt("tenant-a", b"top secret overlay").unwrap();
    let pt = store.decrypt("tenant-a", &ct).unwrap();
    assert_eq!(pt, b"top secret overlay");
  }

  #[test]
  fn different_tenants_produce_different_ciphertext_for_same_plaintext() {
    let store = EncryptedStore::new(("k1", "root-secret-one"), &[]);
    let a = store.encrypt("tenant-a", b"same plaintext").unwrap();
    let b = store.encrypt("tenant-b", b"same plaintext").unwrap();
    assert_ne!(a.bytes, b.bytes);
  }

  #[test]
  fn decrypt_fails_for_wrong_tenant() {
    let store = EncryptedStore::new(("k1", "root-secret-one"), &[]);
    let ct = store.encrypt("tenant-a", b"secret").unwrap();
    assert!(store.decrypt("tenant-b", &ct).is_err());
  }

  #[test]
  fn rotated_key_still_decrypts_old_data() {
    let old = EncryptedStore::new(("k1", "root-secret-one"), &[]);
    let ct = old.encrypt("tenant-a", b"secret from before rotation").unwrap();

    let rotated = EncryptedStore::new(("k2", "root-secret-two"), &[("k1", "root-secret-one")]);
    let pt = rotated.decrypt("tenant-a", &ct).unwrap();
    assert_eq!(pt, b"secret from before rotation");

    // New encryptions use the new key id.
    let new_ct = rotated.encrypt("tenant-a", b"secret after rotation").unwrap();
    assert_eq!(new_ct.key_id, "k2");
  }

  #[test]
  fn unknown_key_id_is_rejected() {
    let store = EncryptedStore::new(("k1", "root-secret-one"), &[]);
    let forged = Ciphertext {
      key_id: "k-never-registered".to_string(),
      bytes: vec![0u8; 32],
    };
    assert!(store.decrypt("tenant-a", &forged).is_err());
  }
}
