use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use cache::CloneCache;
use tokio::sync::RwLock;

/// Per-`(user, command class)` token bucket, as required by the
/// executor's rate-limit check (testable property 7: across any
/// window, successful admissions for `(user, class)` never exceed
/// `max_attempts`).
///
/// Implemented as a sliding window over recorded admission instants,
/// the same shape as [`crate::auth::RateLimiter`] but counting every
/// admission attempt rather than only failures, since command abuse
/// is bounded regardless of whether the subprocess itself succeeds.
pub struct BucketRateLimiter {
  buckets: CloneCache<(String, String), Arc<RwLock<Vec<Instant>>>>,
  max_attempts: usize,
  window: Duration,
}

pub enum BucketStatus {
  Admitted,
  Limited { retry_after: Duration },
}

impl BucketRateLimiter {
  pub fn new(max_attempts: usize, window: Duration) -> Arc<Self> {
    let limiter = Arc::new(Self {
      buckets: CloneCache::default(),
      max_attempts,
      window,
    });
    spawn_cleanup_task(limiter.clone());
    limiter
  }

  /// Attempts to consume one token from the bucket for `(user_id, class)`.
  /// Always consumes on admission; never consumes on rejection (there is
  /// nothing more to consume).
  pub async fn try_admit(
    &self,
    user_id: &str,
    class: &str,
  ) -> BucketStatus {
    let key = (user_id.to_string(), class.to_string());
    let bucket = self.buckets.get_or_insert_default(&key).await;

    let now = Instant::now();
    let window_start = now - self.window;

    let read = bucket.read().await;
    let count = read.iter().filter(|&&t| t > window_start).count();
    drop(read);

    if count >= self.max_attempts {
      let mut write = bucket.write().await;
      write.retain(|&t| t > window_start);
      let oldest = write.first().copied().unwrap_or(now);
      let retry_after = (oldest + self.window)
        .saturating_duration_since(now);
      return BucketStatus::Limited { retry_after };
    }

    let mut write = bucket.write().await;
    write.retain(|&t| t > window_start);
    write.push(now);
    BucketStatus::Admitted
  }
}

fn spawn_cleanup_task(limiter: Arc<BucketRateLimiter>) {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
      interval.tick().await;
      let remove_before = Instant::now() - limiter.window;
      limiter
        .buckets
        .retain(|_, bucket| {
          let Ok(bucket) = bucket.try_read() else {
            return true;
          };
          let Some(&last) = bucket.last() else {
            return false;
          };
          last > remove_before
        })
        .await;
    }
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn admits_up_to_max_then_limits() {
    let limiter =
      BucketRateLimiter::new(2, Duration::from_secs(60));
    assert!(matches!(
      limiter.try_admit("u1", "server.enable").await,
      BucketStatus::Admitted
    ));
    assert!(matches!(
      limiter.try_admit("u1", "server.enable").await,
      BucketStatus::Admitted
    ));
    assert!(matches!(
      limiter.try_admit("u1", "server.enable").await,
      BucketStatus::Limited { .. }
    ));
  }

  #[tokio::test]
  async fn buckets_are_independent_per_class_and_user() {
    let limiter =
      BucketRateLimiter::new(1, Duration::from_secs(60));
    assert!(matches!(
      limiter.try_admit("u1", "server.enable").await,
      BucketStatus::Admitted
    ));
    assert!(matches!(
      limiter.try_admit("u1", "server.disable").await,
      BucketStatus::Admitted
    ));
    assert!(matches!(
      limiter.try_admit("u2", "server.enable").await,
      BucketStatus::Admitted
    ));
    assert!(matches!(
      limiter.try_admit("u1", "server.enable").await,
      BucketStatus::Limited { .. }
    ));
  }
}
