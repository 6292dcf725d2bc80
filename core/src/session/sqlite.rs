// SQLite-backed session store
use crate::clock::Clock;
use crate::session::store::{SessionStore, UserRecord};
use crate::types::{LanguageCode, UserId, UserTier};
use crate::{Result, SpeechBotError};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub const SESSION_SCHEMA_VERSION: i64 = 1;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Session store over a single local SQLite database.
///
/// The connection sits behind a mutex so interleaved turns of different users
/// are serialized at the statement level. The rollover-then-mutate sequence is
/// not a transaction; two increments racing for the same user on the same
/// instant may lose one update.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteSessionStore {
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn, clock)?;
        info!(target = "session", path = %path.display(), "Session store opened");
        Ok(store)
    }

    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, clock)
    }

    fn from_connection(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SpeechBotError::Storage("session connection poisoned".into()))
    }

    fn today(&self) -> String {
        self.clock.today().format(DATE_FORMAT).to_string()
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > SESSION_SCHEMA_VERSION {
        return Err(SpeechBotError::Storage(format!(
            "unsupported schema version {current}, max supported {SESSION_SCHEMA_VERSION}"
        )));
    }
    if current < 1 {
        conn.execute_batch(include_str!("../../migrations/0001_users.sql"))?;
        conn.execute("PRAGMA user_version = 1", [])?;
    }
    Ok(())
}

/// Zero the counter when the stored reset date is not `today`
fn reset_daily_usage_if_needed(conn: &Connection, user_id: UserId, today: &str) -> Result<()> {
    let last: Option<Option<String>> = conn
        .query_row(
            "SELECT last_reset_date FROM users WHERE user_id = ?1",
            params![user_id.0],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(last) = last {
        if last.as_deref() != Some(today) {
            conn.execute(
                "UPDATE users SET daily_usage = 0, last_reset_date = ?1 WHERE user_id = ?2",
                params![today, user_id.0],
            )?;
            debug!(target = "session", user_id = %user_id, "Daily usage reset");
        }
    }
    Ok(())
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get_language(&self, user_id: UserId) -> LanguageCode {
        let lookup = || -> Result<Option<String>> {
            let conn = self.lock()?;
            Ok(conn
                .query_row(
                    "SELECT language FROM users WHERE user_id = ?1",
                    params![user_id.0],
                    |row| row.get(0),
                )
                .optional()?)
        };

        match lookup() {
            Ok(Some(code)) => LanguageCode::from_code(&code).unwrap_or_default(),
            Ok(None) => LanguageCode::default(),
            Err(e) => {
                warn!(target = "session", user_id = %user_id, error = %e, "Language lookup failed; using default");
                LanguageCode::default()
            }
        }
    }

    async fn set_language(&self, user_id: UserId, language: LanguageCode) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (user_id, language) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET language = excluded.language",
            params![user_id.0, language.code()],
        )?;
        debug!(target = "session", user_id = %user_id, language = %language, "Language stored");
        Ok(())
    }

    async fn get_daily_usage(&self, user_id: UserId) -> Result<u32> {
        let today = self.today();
        let conn = self.lock()?;
        reset_daily_usage_if_needed(&conn, user_id, &today)?;
        let usage: Option<u32> = conn
            .query_row(
                "SELECT daily_usage FROM users WHERE user_id = ?1",
                params![user_id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(usage.unwrap_or(0))
    }

    async fn increment_usage(&self, user_id: UserId) -> Result<()> {
        let today = self.today();
        let conn = self.lock()?;
        reset_daily_usage_if_needed(&conn, user_id, &today)?;
        conn.execute(
            "INSERT INTO users (user_id, daily_usage, last_reset_date) VALUES (?1, 1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET daily_usage = daily_usage + 1",
            params![user_id.0, today],
        )?;
        debug!(target = "session", user_id = %user_id, "Usage incremented");
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT language, tier, daily_usage, last_reset_date FROM users WHERE user_id = ?1",
                params![user_id.0],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((language, tier, daily_usage, last_reset)) = row else {
            return Ok(None);
        };
        let last_reset_date = match last_reset {
            Some(s) => Some(NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| {
                SpeechBotError::Storage(format!("invalid last_reset_date {s:?}: {e}"))
            })?),
            None => None,
        };

        Ok(Some(UserRecord {
            user_id,
            language: LanguageCode::from_code(&language).unwrap_or_default(),
            tier: UserTier::from_str_lossy(&tier),
            daily_usage,
            last_reset_date,
        }))
    }
}
