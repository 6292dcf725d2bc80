//! Session storage interface.

use crate::types::{LanguageCode, UserId, UserTier};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Persisted per-user row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub language: LanguageCode,
    pub tier: UserTier,
    pub daily_usage: u32,
    pub last_reset_date: Option<NaiveDate>,
}

/// Single source of truth for quota decisions.
///
/// Usage reads and writes first apply the lazy day rollover: when the stored
/// `last_reset_date` is not today, the counter is zeroed before the operation
/// proceeds. There is no background sweep.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stored language, or the default when the user is unknown. Never fails.
    async fn get_language(&self, user_id: UserId) -> LanguageCode;

    /// Idempotent upsert of the language preference
    async fn set_language(&self, user_id: UserId, language: LanguageCode) -> Result<()>;

    /// Today's usage counter (0 for unknown users)
    async fn get_daily_usage(&self, user_id: UserId) -> Result<u32>;

    /// Create-or-increment today's usage counter by one
    async fn increment_usage(&self, user_id: UserId) -> Result<()>;

    /// Full record, if the user has one
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>>;
}
