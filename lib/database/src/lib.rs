//! Repository traits plus a `mongodb` implementation and an in-memory
//! test implementation, so `bin/core` depends only on the traits in
//! [`traits`] and is free to swap the backing store.

pub mod memory;
pub mod mongo;
mod overlay_codec;
pub mod traits;

pub use traits::{
  AuditRepository, CatalogRepository, ContainerShadowRepository,
  OverlayRepository, SessionRepository, UserRepository,
};
