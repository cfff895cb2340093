//! Daily interaction quota for anonymous usage.
//!
//! Device-scoped, not user-scoped, since no identity exists yet. The counter
//! persists through the same key/value store as the local sessions and resets
//! when the device's local calendar day changes.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use confer_store::KeyValueStore;

use crate::error::SessionError;

/// Well-known key for the persisted quota counter.
pub const QUOTA_KEY: &str = "confer.quota";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct QuotaRecord {
    day: NaiveDate,
    used: u32,
}

impl QuotaRecord {
    fn fresh(day: NaiveDate) -> Self {
        Self { day, used: 0 }
    }
}

/// Per-day counter of assistant interactions for the anonymous identity.
pub struct InteractionQuota {
    kv: Arc<dyn KeyValueStore>,
    daily_limit: u32,
    // Held across the whole read-modify-write of the persisted record.
    lock: Mutex<()>,
}

impl InteractionQuota {
    pub fn new(kv: Arc<dyn KeyValueStore>, daily_limit: u32) -> Self {
        Self {
            kv,
            daily_limit,
            lock: Mutex::new(()),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Interactions left today. Never negative.
    pub async fn remaining(&self) -> u32 {
        let _guard = self.lock.lock().await;
        let record = self.load_record().await;
        self.daily_limit.saturating_sub(record.used)
    }

    /// Consumes one interaction and returns how many are left.
    ///
    /// Fails with `QuotaExceeded` when nothing remains; the counter is not
    /// touched in that case. Concurrent consumes serialize, so the last
    /// interaction can only be spent once.
    pub async fn consume(&self) -> Result<u32, SessionError> {
        let _guard = self.lock.lock().await;
        let mut record = self.load_record().await;
        if record.used >= self.daily_limit {
            return Err(SessionError::QuotaExceeded);
        }
        record.used += 1;
        self.save_record(&record).await?;
        Ok(self.daily_limit - record.used)
    }

    /// Loads the persisted counter for today.
    ///
    /// A record from an earlier day, a missing record, and an unreadable
    /// record all load as a fresh day.
    async fn load_record(&self) -> QuotaRecord {
        let today = Local::now().date_naive();
        let raw = match self.kv.get(QUOTA_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return QuotaRecord::fresh(today),
            Err(e) => {
                warn!(error = %e, "Failed to read quota counter; treating as fresh day");
                return QuotaRecord::fresh(today);
            }
        };
        match serde_json::from_str::<QuotaRecord>(&raw) {
            Ok(record) if record.day == today => record,
            Ok(_) => QuotaRecord::fresh(today),
            Err(e) => {
                warn!(error = %e, "Quota counter corrupt; treating as fresh day");
                QuotaRecord::fresh(today)
            }
        }
    }

    async fn save_record(&self, record: &QuotaRecord) -> Result<(), SessionError> {
        let raw = serde_json::to_string(record)
            .map_err(|e| SessionError::Store(e.to_string()))?;
        self.kv.set(QUOTA_KEY, &raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use confer_store::MemoryKvStore;

    fn make_quota(limit: u32) -> (InteractionQuota, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::new());
        let quota = InteractionQuota::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>, limit);
        (quota, kv)
    }

    #[tokio::test]
    async fn test_full_allowance_on_first_touch() {
        let (quota, _kv) = make_quota(5);
        assert_eq!(quota.remaining().await, 5);
    }

    #[tokio::test]
    async fn test_consume_decrements() {
        let (quota, _kv) = make_quota(3);
        assert_eq!(quota.consume().await.unwrap(), 2);
        assert_eq!(quota.consume().await.unwrap(), 1);
        assert_eq!(quota.remaining().await, 1);
    }

    #[tokio::test]
    async fn test_consume_at_zero_fails_and_stays_at_zero() {
        let (quota, _kv) = make_quota(1);
        quota.consume().await.unwrap();
        assert_eq!(quota.remaining().await, 0);

        let result = quota.consume().await;
        assert!(matches!(result, Err(SessionError::QuotaExceeded)));
        assert_eq!(quota.remaining().await, 0);

        // A second refusal does not push the counter negative either.
        assert!(quota.consume().await.is_err());
        assert_eq!(quota.remaining().await, 0);
    }

    #[tokio::test]
    async fn test_zero_limit_always_exhausted() {
        let (quota, _kv) = make_quota(0);
        assert_eq!(quota.remaining().await, 0);
        assert!(matches!(
            quota.consume().await,
            Err(SessionError::QuotaExceeded)
        ));
    }

    #[tokio::test]
    async fn test_resets_after_day_boundary() {
        let (quota, kv) = make_quota(4);
        let yesterday = Local::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .unwrap();
        let stale = serde_json::to_string(&QuotaRecord {
            day: yesterday,
            used: 4,
        })
        .unwrap();
        kv.set(QUOTA_KEY, &stale).await.unwrap();

        assert_eq!(quota.remaining().await, 4);
        assert_eq!(quota.consume().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_corrupt_counter_treated_as_fresh_day() {
        let (quota, kv) = make_quota(2);
        kv.set(QUOTA_KEY, "not a record").await.unwrap();

        assert_eq!(quota.remaining().await, 2);
        assert!(quota.consume().await.is_ok());
    }

    #[tokio::test]
    async fn test_joined_consumes_cannot_overspend() {
        // The file-backed store yields at every IO point, so the two
        // consumes genuinely interleave.
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(confer_store::FileKvStore::new(dir.path()));
        let quota = InteractionQuota::new(kv, 1);

        let (a, b) = tokio::join!(quota.consume(), quota.consume());
        let wins = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
        assert_eq!(wins, 1, "exactly one consume may take the last interaction");
        assert!([a, b]
            .into_iter()
            .any(|r| matches!(r, Err(SessionError::QuotaExceeded))));
        assert_eq!(quota.remaining().await, 0);
    }

    #[tokio::test]
    async fn test_counter_shared_through_kv() {
        let kv = Arc::new(MemoryKvStore::new());
        let first = InteractionQuota::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>, 3);
        first.consume().await.unwrap();

        // A second tracker over the same store sees the consumed interaction.
        let second = InteractionQuota::new(kv, 3);
        assert_eq!(second.remaining().await, 2);
    }

    #[tokio::test]
    async fn test_lowered_limit_keeps_remaining_non_negative() {
        let kv = Arc::new(MemoryKvStore::new());
        let generous = InteractionQuota::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>, 5);
        for _ in 0..4 {
            generous.consume().await.unwrap();
        }

        let strict = InteractionQuota::new(kv, 2);
        assert_eq!(strict.remaining().await, 0);
        assert!(matches!(
            strict.consume().await,
            Err(SessionError::QuotaExceeded)
        ));
    }
}
