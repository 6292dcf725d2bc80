// Shared fakes for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use speechbot_core::{
    ArtifactManager, BotConfig, Clock, ConversationState, Dispatcher, IncomingMessage, MessageId,
    Reply, Result, SpeechBotError, SpeechSynthesizer, SqliteSessionStore, SynthesisError,
    Translations, Transport, UserId,
};
use speechbot_core::{AudioFormat, LanguageCode, SessionStore, Speed, UserRecord};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// What the transport saw, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message { id: MessageId, reply: Reply, file_existed: bool },
    Edit { id: MessageId, text: String },
    Delete { id: MessageId },
}

/// Transport that records everything and can be told to fail audio sends
#[derive(Default)]
pub struct RecordingTransport {
    log: Mutex<Vec<(UserId, Sent)>>,
    next_id: AtomicI64,
    fail_audio: AtomicBool,
    fail_text: Mutex<Option<String>>,
    fail_deletes: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_audio(&self, fail: bool) {
        self.fail_audio.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Reject text replies containing `needle`; `None` heals the transport
    pub fn fail_text_containing(&self, needle: Option<&str>) {
        *self.fail_text.lock().unwrap() = needle.map(str::to_string);
    }

    pub fn events(&self, user: UserId) -> Vec<Sent> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn replies(&self, user: UserId) -> Vec<Reply> {
        self.events(user)
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message { reply, .. } => Some(reply),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self, user: UserId) -> Vec<String> {
        self.replies(user)
            .into_iter()
            .filter(|r| r.audio.is_none())
            .map(|r| r.text)
            .collect()
    }

    pub fn last_text(&self, user: UserId) -> Option<String> {
        self.texts(user).pop()
    }

    /// Audio replies whose file was present when sent
    pub fn delivered_audio(&self, user: UserId) -> Vec<Reply> {
        self.events(user)
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message {
                    reply,
                    file_existed: true,
                    ..
                } if reply.audio.is_some() => Some(reply),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, user_id: UserId, reply: Reply) -> Result<MessageId> {
        let file_existed = match &reply.audio {
            Some(audio) => {
                if self.fail_audio.load(Ordering::SeqCst) {
                    return Err(SpeechBotError::Transport("upload rejected".into()));
                }
                audio.path.exists()
            }
            None => {
                if let Some(needle) = self.fail_text.lock().unwrap().as_deref() {
                    if reply.text.contains(needle) {
                        return Err(SpeechBotError::Transport("message rejected".into()));
                    }
                }
                false
            }
        };
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.log.lock().unwrap().push((
            user_id,
            Sent::Message {
                id,
                reply,
                file_existed,
            },
        ));
        Ok(id)
    }

    async fn edit_text(&self, user_id: UserId, message_id: MessageId, text: &str) -> Result<()> {
        self.log.lock().unwrap().push((
            user_id,
            Sent::Edit {
                id: message_id,
                text: text.to_string(),
            },
        ));
        Ok(())
    }

    async fn delete(&self, user_id: UserId, message_id: MessageId) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SpeechBotError::Transport("message already gone".into()));
        }
        self.log
            .lock()
            .unwrap()
            .push((user_id, Sent::Delete { id: message_id }));
        Ok(())
    }
}

/// Synthesizer that returns fixed bytes, or fails on demand
#[derive(Default)]
pub struct FakeSynthesizer {
    calls: AtomicUsize,
    failing: AtomicBool,
    last_speed: Mutex<Option<Speed>>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let synth = Self::default();
        synth.failing.store(true, Ordering::SeqCst);
        synth
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_speed(&self) -> Option<Speed> {
        *self.last_speed.lock().unwrap()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    fn name(&self) -> &str {
        "fake"
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    async fn synthesize(
        &self,
        text: &str,
        speed: Speed,
        _language: LanguageCode,
    ) -> std::result::Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_speed.lock().unwrap() = Some(speed);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SynthesisError::EngineFailed("engine exploded".into()));
        }
        Ok(format!("ID3 {text} @ {speed}").into_bytes())
    }
}

/// Clock the test moves by hand
pub struct ManualClock(Mutex<NaiveDate>);

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self(Mutex::new(today))
    }

    pub fn advance_days(&self, days: u64) {
        let mut today = self.0.lock().unwrap();
        *today = *today + chrono::Days::new(days);
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap()
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn test_config(dir: &Path) -> BotConfig {
    BotConfig {
        audio_temp_dir: dir.join("audio"),
        database_path: dir.join("bot.db"),
        cache_enabled: false,
        locales_dir: None,
        ..BotConfig::default()
    }
}

/// A dispatcher wired to fakes, an in-memory store and a temp directory
pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub transport: Arc<RecordingTransport>,
    pub synth: Arc<FakeSynthesizer>,
    pub store: Arc<SqliteSessionStore>,
    pub artifacts: Arc<ArtifactManager>,
    pub clock: Arc<ManualClock>,
    pub config: BotConfig,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeSynthesizer::new(), |_| {})
    }

    pub fn with(synth: FakeSynthesizer, tweak: impl FnOnce(&mut BotConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        tweak(&mut config);

        let clock = Arc::new(ManualClock::new(day(2024, 3, 1)));
        let store = Arc::new(SqliteSessionStore::open_in_memory(clock.clone()).unwrap());
        let transport = Arc::new(RecordingTransport::new());
        let synth = Arc::new(synth);
        let artifacts = Arc::new(ArtifactManager::from_config(&config));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(config.clone()),
            Arc::new(Translations::embedded().unwrap()),
            store.clone(),
            synth.clone(),
            artifacts.clone(),
            transport.clone(),
        ));

        Self {
            dispatcher,
            transport,
            synth,
            store,
            artifacts,
            clock,
            config,
            dir,
        }
    }

    pub async fn say(&self, user: UserId, text: &str) -> ConversationState {
        self.dispatcher
            .dispatch(IncomingMessage::text(user, text))
            .await
    }

    /// /start, pick English, open "Convert Text"
    pub async fn to_awaiting_text(&self, user: UserId) -> ConversationState {
        self.say(user, "/start").await;
        self.say(user, "🇺🇸 English").await;
        self.say(user, "🎤 Convert Text").await
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.config.audio_temp_dir.clone()
    }

    /// Regular files currently in the temporary audio directory
    pub fn audio_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.audio_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Store whose usage writes fail on demand
pub struct FlakyStore {
    pub inner: SqliteSessionStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(day(2024, 3, 1)));
        Self {
            inner: SqliteSessionStore::open_in_memory(clock).unwrap(),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get_language(&self, user_id: UserId) -> LanguageCode {
        self.inner.get_language(user_id).await
    }

    async fn set_language(&self, user_id: UserId, language: LanguageCode) -> Result<()> {
        self.inner.set_language(user_id, language).await
    }

    async fn get_daily_usage(&self, user_id: UserId) -> Result<u32> {
        self.inner.get_daily_usage(user_id).await
    }

    async fn increment_usage(&self, user_id: UserId) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SpeechBotError::Storage("database is locked".into()));
        }
        self.inner.increment_usage(user_id).await
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        self.inner.get_user(user_id).await
    }
}
