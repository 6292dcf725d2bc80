//! Daily quota decisions on top of the session store.
//!
//! Quota is checked before new text is accepted and incremented only once the
//! text has been accepted, so a submission that fails validation is never
//! charged.

use crate::config::BotConfig;
use crate::session::SessionStore;
use crate::types::{UserId, UserTier};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Displayed reset boundary; the counter resets lazily on the first touch of a new day
pub const QUOTA_RESET_TIME: &str = "00:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCheck {
    pub has_quota: bool,
    pub remaining: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaStatus {
    pub has_quota: bool,
    pub remaining: u32,
    pub total: u32,
    pub used: u32,
    pub percentage_used: f64,
    pub reset_time: &'static str,
}

pub struct QuotaGovernor {
    store: Arc<dyn SessionStore>,
    daily_quota_free: u32,
    daily_quota_premium: u32,
    max_text_length: usize,
}

impl QuotaGovernor {
    pub fn new(store: Arc<dyn SessionStore>, config: &BotConfig) -> Self {
        Self {
            store,
            daily_quota_free: config.daily_quota_free,
            daily_quota_premium: config.daily_quota_premium,
            max_text_length: config.max_text_length,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Ceiling for a tier
    pub fn ceiling_for(&self, tier: UserTier) -> u32 {
        match tier {
            UserTier::Free => self.daily_quota_free,
            UserTier::Premium => self.daily_quota_premium,
        }
    }

    pub async fn check_quota(&self, user_id: UserId) -> Result<QuotaCheck> {
        let usage = self.store.get_daily_usage(user_id).await?;
        // Stored tier is not consulted: nothing assigns premium yet
        let total = self.ceiling_for(UserTier::Free);
        let remaining = total.saturating_sub(usage);
        debug!(target = "quota", user_id = %user_id, usage, remaining, "Quota checked");
        Ok(QuotaCheck {
            has_quota: remaining > 0,
            remaining,
            total,
        })
    }

    /// False for over-long text regardless of remaining quota
    pub async fn can_process_text(&self, user_id: UserId, length: usize) -> Result<bool> {
        if length > self.max_text_length {
            return Ok(false);
        }
        Ok(self.check_quota(user_id).await?.has_quota)
    }

    pub async fn increment_usage(&self, user_id: UserId) -> Result<()> {
        self.store.increment_usage(user_id).await
    }

    pub async fn get_quota_status(&self, user_id: UserId) -> Result<QuotaStatus> {
        let check = self.check_quota(user_id).await?;
        let used = check.total - check.remaining;
        let percentage_used = if check.total > 0 {
            f64::from(used) / f64::from(check.total) * 100.0
        } else {
            0.0
        };
        Ok(QuotaStatus {
            has_quota: check.has_quota,
            remaining: check.remaining,
            total: check.total,
            used,
            percentage_used,
            reset_time: QUOTA_RESET_TIME,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserRecord;
    use crate::types::LanguageCode;
    use crate::SpeechBotError;
    use async_trait::async_trait;

    mockall::mock! {
        Store {}

        #[async_trait]
        impl SessionStore for Store {
            async fn get_language(&self, user_id: UserId) -> LanguageCode;
            async fn set_language(&self, user_id: UserId, language: LanguageCode) -> Result<()>;
            async fn get_daily_usage(&self, user_id: UserId) -> Result<u32>;
            async fn increment_usage(&self, user_id: UserId) -> Result<()>;
            async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>>;
        }
    }

    fn config(free: u32) -> BotConfig {
        BotConfig {
            daily_quota_free: free,
            max_text_length: 100,
            ..BotConfig::default()
        }
    }

    #[tokio::test]
    async fn remaining_never_goes_negative() {
        let mut store = MockStore::new();
        store.expect_get_daily_usage().returning(|_| Ok(9));
        let governor = QuotaGovernor::new(Arc::new(store), &config(5));

        let check = governor.check_quota(UserId(1)).await.unwrap();
        assert_eq!(
            check,
            QuotaCheck {
                has_quota: false,
                remaining: 0,
                total: 5
            }
        );
    }

    #[tokio::test]
    async fn too_long_text_is_refused_without_touching_storage() {
        let mut store = MockStore::new();
        store.expect_get_daily_usage().never();
        let governor = QuotaGovernor::new(Arc::new(store), &config(5));

        assert!(!governor.can_process_text(UserId(1), 101).await.unwrap());
    }

    #[tokio::test]
    async fn status_reports_percentage() {
        let mut store = MockStore::new();
        store.expect_get_daily_usage().returning(|_| Ok(2));
        let governor = QuotaGovernor::new(Arc::new(store), &config(5));

        let status = governor.get_quota_status(UserId(7)).await.unwrap();
        assert_eq!(status.used, 2);
        assert_eq!(status.remaining, 3);
        assert!((status.percentage_used - 40.0).abs() < f64::EPSILON);
        assert_eq!(status.reset_time, QUOTA_RESET_TIME);
    }

    #[tokio::test]
    async fn zero_ceiling_does_not_divide_by_zero() {
        let mut store = MockStore::new();
        store.expect_get_daily_usage().returning(|_| Ok(0));
        let governor = QuotaGovernor::new(Arc::new(store), &config(0));

        let status = governor.get_quota_status(UserId(7)).await.unwrap();
        assert!(!status.has_quota);
        assert_eq!(status.percentage_used, 0.0);
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let mut store = MockStore::new();
        store
            .expect_get_daily_usage()
            .returning(|_| Err(SpeechBotError::Storage("disk gone".into())));
        store
            .expect_increment_usage()
            .returning(|_| Err(SpeechBotError::Storage("disk gone".into())));
        let governor = QuotaGovernor::new(Arc::new(store), &config(5));

        assert!(matches!(
            governor.check_quota(UserId(1)).await,
            Err(SpeechBotError::Storage(_))
        ));
        assert!(governor.increment_usage(UserId(1)).await.is_err());
    }
}
