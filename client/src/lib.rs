pub mod api;
pub mod entities;
pub mod error;

/// Milliseconds since the UNIX epoch. The one timestamp primitive used
/// across every entity in this crate, so wire formats stay stable
/// integers rather than mixing in calendar types.
pub fn wharf_timestamp() -> i64 {
  chrono::Utc::now().timestamp_millis()
}
