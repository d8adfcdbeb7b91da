//! Wire-level request/response shapes for the inbound action surface
//! (spec §6). These are plain, transport-agnostic structs — the
//! dispatch enums that route to them (`AuthRequest`, `CatalogRequest`,
//! `ServerRequest`, `GatewayRequest`, `ConfigRequest`) live in the
//! `wharf_core` binary alongside their handlers, exactly as the teacher
//! splits shared param types (client crate) from the server-side
//! dispatch enum (binary crate).

pub mod auth;
pub mod catalogs;
pub mod config;
pub mod gateway;
pub mod realtime;
pub mod servers;
