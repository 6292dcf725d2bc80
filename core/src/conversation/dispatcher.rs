use crate::artifact::ArtifactManager;
use crate::config::BotConfig;
use crate::conversation::input::{self, ContinuousAction, LanguageChoice, MenuAction};
use crate::conversation::state::{ConversationContext, ConversationState};
use crate::locale::Translations;
use crate::quota::QuotaGovernor;
use crate::rate_limit::RateLimiter;
use crate::session::SessionStore;
use crate::synth::SpeechSynthesizer;
use crate::transport::{IncomingMessage, MessageContent, Reply, ReplyMarkup, Transport};
use crate::types::{LanguageCode, Speed, UserId};
use crate::validation::{self, TextRejection};
use crate::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

type SharedContext = Arc<Mutex<ConversationContext>>;

/// Routes inbound messages to state handlers.
///
/// Turns of one user are serialized by a per-user lock; different users
/// proceed concurrently.
pub struct Dispatcher {
    pub(crate) config: Arc<BotConfig>,
    pub(crate) translations: Arc<Translations>,
    pub(crate) quota: QuotaGovernor,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) synthesizer: Arc<dyn SpeechSynthesizer>,
    pub(crate) artifacts: Arc<ArtifactManager>,
    pub(crate) transport: Arc<dyn Transport>,
    contexts: DashMap<UserId, SharedContext>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<BotConfig>,
        translations: Arc<Translations>,
        store: Arc<dyn SessionStore>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        artifacts: Arc<ArtifactManager>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let quota = QuotaGovernor::new(store, &config);
        let rate_limiter = RateLimiter::from_config(&config);
        Self {
            config,
            translations,
            quota,
            rate_limiter,
            synthesizer,
            artifacts,
            transport,
            contexts: DashMap::new(),
        }
    }

    pub fn config(&self) -> Arc<BotConfig> {
        Arc::clone(&self.config)
    }

    pub fn quota(&self) -> &QuotaGovernor {
        &self.quota
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Current state of a user's conversation, `None` if they never wrote
    pub async fn state_of(&self, user_id: UserId) -> Option<ConversationState> {
        let ctx = self.existing_context(user_id)?;
        let guard = ctx.lock().await;
        Some(guard.current_state)
    }

    /// Snapshot of a user's conversation context
    pub async fn context_of(&self, user_id: UserId) -> Option<ConversationContext> {
        let ctx = self.existing_context(user_id)?;
        let guard = ctx.lock().await;
        Some(guard.clone())
    }

    /// Forget conversations idle for longer than `max_idle`; returns how many.
    ///
    /// A context that is locked or held by an in-flight turn is kept.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(Instant::now(), max_idle)
    }

    pub fn evict_idle_at(&self, now: Instant, max_idle: Duration) -> usize {
        let before = self.contexts.len();
        self.contexts.retain(|_, shared| {
            if Arc::strong_count(shared) > 1 {
                return true;
            }
            match shared.try_lock() {
                Ok(ctx) => now.saturating_duration_since(ctx.last_active) < max_idle,
                Err(_) => true,
            }
        });
        before.saturating_sub(self.contexts.len())
    }

    fn existing_context(&self, user_id: UserId) -> Option<SharedContext> {
        self.contexts.get(&user_id).map(|entry| Arc::clone(entry.value()))
    }

    async fn context_for(&self, user_id: UserId) -> SharedContext {
        if let Some(ctx) = self.existing_context(user_id) {
            return ctx;
        }
        let language = self.quota.store().get_language(user_id).await;
        let entry = self
            .contexts
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(ConversationContext::new(language))));
        Arc::clone(entry.value())
    }

    /// Handle one inbound message and return the user's resulting state.
    ///
    /// Errors from handlers never escape: the context is restored to what it
    /// was before the turn and the user gets a generic error message.
    pub async fn dispatch(&self, msg: IncomingMessage) -> ConversationState {
        let user_id = msg.user_id;
        let shared = self.context_for(user_id).await;
        let mut ctx = shared.lock().await;
        ctx.last_active = Instant::now();

        if !self.rate_limiter.check_rate_limit(user_id) {
            debug!(target = "conversation", user_id = %user_id, "Message dropped by rate limit");
            let text = self.translations.lookup(ctx.language, "errors.rate_limited");
            if let Err(e) = self.transport.send(user_id, Reply::text(text)).await {
                warn!(target = "conversation", user_id = %user_id, error = %e, "Failed to send rate limit notice");
            }
            return ctx.current_state;
        }

        let before = ctx.clone();
        match self.handle(&mut ctx, &msg).await {
            Ok(next) => {
                if next != ConversationState::AwaitingSpeed {
                    ctx.pending_text = None;
                }
                if next != before.current_state {
                    debug!(
                        target = "conversation",
                        user_id = %user_id,
                        from = %before.current_state,
                        to = %next,
                        "State transition"
                    );
                }
                ctx.current_state = next;
                next
            }
            Err(e) => {
                error!(target = "conversation", user_id = %user_id, state = %before.current_state, error = %e, "Handler failed");
                *ctx = before;
                let text = self.translations.lookup(ctx.language, "errors.unexpected");
                if let Err(e) = self.transport.send(user_id, Reply::text(text)).await {
                    warn!(target = "conversation", user_id = %user_id, error = %e, "Failed to send error notice");
                }
                ctx.current_state
            }
        }
    }

    async fn handle(
        &self,
        ctx: &mut ConversationContext,
        msg: &IncomingMessage,
    ) -> Result<ConversationState> {
        let user_id = msg.user_id;

        if let Some(command) = msg.command() {
            return self.on_command(ctx, user_id, &command).await;
        }

        match ctx.current_state {
            ConversationState::LanguageSelection => self.on_language_selection(ctx, msg).await,
            ConversationState::MainMenu => self.on_main_menu(ctx, msg).await,
            ConversationState::AwaitingText => self.on_awaiting_text(ctx, msg).await,
            ConversationState::AwaitingSpeed => self.on_awaiting_speed(ctx, msg).await,
            ConversationState::ContinuousMode => self.on_continuous(ctx, msg).await,
            ConversationState::BatchMode => self.on_batch(ctx, msg).await,
            ConversationState::End => self.begin(ctx, user_id).await,
        }
    }

    async fn on_command(
        &self,
        ctx: &mut ConversationContext,
        user_id: UserId,
        command: &str,
    ) -> Result<ConversationState> {
        info!(target = "conversation", user_id = %user_id, command, "Command received");
        match command {
            "start" => self.begin(ctx, user_id).await,
            "cancel" => {
                *ctx = ConversationContext::new(ctx.language);
                self.reply_with(
                    user_id,
                    self.translations.lookup(ctx.language, "cancel.done"),
                    ReplyMarkup::Remove,
                )
                .await?;
                Ok(ConversationState::End)
            }
            "help" => {
                self.send_help(user_id, ctx.language).await?;
                Ok(ctx.current_state)
            }
            "language" => self.prompt_language(user_id, ctx.language, true).await,
            "quota" => {
                self.send_quota_status(user_id, ctx.language).await?;
                Ok(ctx.current_state)
            }
            "batch" => self.enter_batch(user_id, ctx.language).await,
            _ if ctx.current_state == ConversationState::ContinuousMode => {
                self.reply_with(
                    user_id,
                    self.translations
                        .lookup(ctx.language, "continuous_mode.invalid_input"),
                    input::continuous_keyboard(&self.translations, ctx.language),
                )
                .await?;
                Ok(ConversationState::ContinuousMode)
            }
            _ => {
                self.reply(
                    user_id,
                    self.translations.lookup(ctx.language, "errors.unexpected"),
                )
                .await?;
                Ok(ctx.current_state)
            }
        }
    }

    /// Fresh conversation: drop any transient data and ask for a language
    async fn begin(&self, ctx: &mut ConversationContext, user_id: UserId) -> Result<ConversationState> {
        let language = self.quota.store().get_language(user_id).await;
        *ctx = ConversationContext::new(language);
        self.prompt_language(user_id, language, false).await
    }

    async fn prompt_language(
        &self,
        user_id: UserId,
        language: LanguageCode,
        with_back: bool,
    ) -> Result<ConversationState> {
        let markup = input::language_keyboard(&self.translations, language, with_back);
        self.reply_with(
            user_id,
            self.translations.lookup(language, "language.prompt"),
            markup,
        )
        .await?;
        Ok(ConversationState::LanguageSelection)
    }

    async fn on_language_selection(
        &self,
        ctx: &mut ConversationContext,
        msg: &IncomingMessage,
    ) -> Result<ConversationState> {
        let user_id = msg.user_id;
        let choice = msg
            .as_text()
            .and_then(|text| input::parse_language_choice(&self.translations, ctx.language, text));

        match choice {
            Some(LanguageChoice::Select(language)) => {
                self.quota.store().set_language(user_id, language).await?;
                ctx.language = language;
                info!(target = "conversation", user_id = %user_id, language = %language, "Language selected");
                self.reply(user_id, self.translations.lookup(language, "language.changed"))
                    .await?;
                self.show_main_menu(user_id, language).await
            }
            Some(LanguageChoice::Back) => self.show_main_menu(user_id, ctx.language).await,
            None => {
                let markup = input::language_keyboard(&self.translations, ctx.language, true);
                self.reply_with(
                    user_id,
                    self.translations.lookup(ctx.language, "language.invalid"),
                    markup,
                )
                .await?;
                Ok(ConversationState::LanguageSelection)
            }
        }
    }

    pub(crate) async fn show_main_menu(
        &self,
        user_id: UserId,
        language: LanguageCode,
    ) -> Result<ConversationState> {
        let markup = input::main_menu_keyboard(&self.translations, language);
        self.reply_with(
            user_id,
            self.translations.lookup(language, "menu.main.welcome"),
            markup,
        )
        .await?;
        Ok(ConversationState::MainMenu)
    }

    async fn on_main_menu(
        &self,
        ctx: &mut ConversationContext,
        msg: &IncomingMessage,
    ) -> Result<ConversationState> {
        let user_id = msg.user_id;
        let language = ctx.language;
        let action = msg
            .as_text()
            .and_then(|text| input::parse_menu_action(&self.translations, language, text));

        match action {
            Some(MenuAction::ConvertText) => {
                self.reply_with(
                    user_id,
                    self.translations.lookup(language, "text_input.prompt"),
                    ReplyMarkup::Remove,
                )
                .await?;
                Ok(ConversationState::AwaitingText)
            }
            Some(MenuAction::Batch) => self.enter_batch(user_id, language).await,
            Some(MenuAction::Help) => {
                self.send_help(user_id, language).await?;
                Ok(ConversationState::MainMenu)
            }
            Some(MenuAction::ChangeLanguage) => self.prompt_language(user_id, language, true).await,
            None => {
                let markup = input::main_menu_keyboard(&self.translations, language);
                self.reply_with(
                    user_id,
                    self.translations.lookup(language, "errors.unexpected"),
                    markup,
                )
                .await?;
                Ok(ConversationState::MainMenu)
            }
        }
    }

    async fn on_awaiting_text(
        &self,
        ctx: &mut ConversationContext,
        msg: &IncomingMessage,
    ) -> Result<ConversationState> {
        let user_id = msg.user_id;
        let language = ctx.language;

        let check = self.quota.check_quota(user_id).await?;
        if !check.has_quota {
            self.send_quota_exceeded(user_id, language).await?;
            return self.show_main_menu(user_id, language).await;
        }

        let Some(text) = submitted_text(msg) else {
            self.reply(user_id, self.translations.lookup(language, "text_input.invalid"))
                .await?;
            return Ok(ConversationState::AwaitingText);
        };

        if let Err(rejection) = validation::validate_submission(&text, self.config.max_text_length) {
            debug!(target = "conversation", user_id = %user_id, reason = ?rejection, "Text rejected");
            self.send_rejection(user_id, language, rejection).await?;
            return Ok(ConversationState::AwaitingText);
        }

        let text = validation::sanitize_text(&text);
        self.reply(
            user_id,
            self.translations.format(
                language,
                "text_input.received",
                &[("char_count", validation::char_len(&text).to_string())],
            ),
        )
        .await?;
        self.reply_with(
            user_id,
            self.translations.lookup(language, "text_input.choose_speed"),
            input::speed_keyboard(&self.translations, language),
        )
        .await?;

        // Last fallible step: a failed turn is rolled back and must not be charged
        self.quota.increment_usage(user_id).await?;
        info!(
            target = "conversation",
            user_id = %user_id,
            chars = validation::char_len(&text),
            "Text accepted"
        );
        ctx.pending_text = Some(text);
        Ok(ConversationState::AwaitingSpeed)
    }

    async fn on_awaiting_speed(
        &self,
        ctx: &mut ConversationContext,
        msg: &IncomingMessage,
    ) -> Result<ConversationState> {
        let user_id = msg.user_id;
        let language = ctx.language;
        let input = msg.as_text().unwrap_or_default();

        if input::is_back(&self.translations, language, input) {
            return self.show_main_menu(user_id, language).await;
        }

        let Some(speed) = Speed::parse_token(input) else {
            self.reply_with(
                user_id,
                self.translations.lookup(language, "speed.select"),
                input::speed_keyboard(&self.translations, language),
            )
            .await?;
            return Ok(ConversationState::AwaitingSpeed);
        };

        let Some(text) = ctx.pending_text.take() else {
            warn!(target = "conversation", user_id = %user_id, "Speed chosen without pending text");
            self.reply(user_id, self.translations.lookup(language, "errors.unexpected"))
                .await?;
            return self.show_main_menu(user_id, language).await;
        };

        ctx.last_speed = Some(speed);
        if self.deliver_audio(user_id, language, &text, speed).await {
            self.offer_next(user_id, language).await?;
            Ok(ConversationState::ContinuousMode)
        } else {
            self.show_main_menu(user_id, language).await
        }
    }

    async fn on_continuous(
        &self,
        ctx: &mut ConversationContext,
        msg: &IncomingMessage,
    ) -> Result<ConversationState> {
        let user_id = msg.user_id;
        let language = ctx.language;

        let Some(text) = msg.as_text() else {
            self.reply_with(
                user_id,
                self.translations.lookup(language, "continuous_mode.invalid_input"),
                input::continuous_keyboard(&self.translations, language),
            )
            .await?;
            return Ok(ConversationState::ContinuousMode);
        };

        match input::parse_continuous_action(&self.translations, language, text) {
            Some(ContinuousAction::Stop) => return self.show_main_menu(user_id, language).await,
            Some(ContinuousAction::Continue) => {
                self.reply_with(
                    user_id,
                    self.translations.lookup(language, "continuous_mode.send_next"),
                    ReplyMarkup::Remove,
                )
                .await?;
                return Ok(ConversationState::AwaitingText);
            }
            None => {}
        }

        let length = validation::char_len(text.trim());
        if !self.quota.can_process_text(user_id, length).await? {
            if length > self.config.max_text_length {
                self.send_rejection(
                    user_id,
                    language,
                    TextRejection::TooLong {
                        current: length,
                        max: self.config.max_text_length,
                    },
                )
                .await?;
                return Ok(ConversationState::ContinuousMode);
            }
            self.send_quota_exceeded(user_id, language).await?;
            return self.show_main_menu(user_id, language).await;
        }

        if let Err(rejection) = validation::validate_submission(text, self.config.max_text_length) {
            self.send_rejection(user_id, language, rejection).await?;
            return Ok(ConversationState::ContinuousMode);
        }

        let text = validation::sanitize_text(text);
        self.quota.increment_usage(user_id).await?;
        let speed = ctx.speed_or(self.config.default_speed);

        // The charge has landed; nothing after this point may fail the turn
        if self.deliver_audio(user_id, language, &text, speed).await {
            if let Err(e) = self.offer_next(user_id, language).await {
                warn!(target = "conversation", user_id = %user_id, error = %e, "Failed to offer next step");
            }
            Ok(ConversationState::ContinuousMode)
        } else {
            if let Err(e) = self.show_main_menu(user_id, language).await {
                warn!(target = "conversation", user_id = %user_id, error = %e, "Failed to show main menu");
            }
            Ok(ConversationState::MainMenu)
        }
    }

    async fn enter_batch(&self, user_id: UserId, language: LanguageCode) -> Result<ConversationState> {
        self.reply_with(
            user_id,
            self.translations.lookup(language, "batch.prompt"),
            input::back_keyboard(&self.translations, language),
        )
        .await?;
        Ok(ConversationState::BatchMode)
    }

    async fn on_batch(
        &self,
        ctx: &mut ConversationContext,
        msg: &IncomingMessage,
    ) -> Result<ConversationState> {
        let user_id = msg.user_id;
        let language = ctx.language;

        if let Some(text) = msg.as_text() {
            if input::is_back(&self.translations, language, text) {
                return self.show_main_menu(user_id, language).await;
            }
        }

        let items: Vec<String> = submitted_text(msg)
            .map(|body| {
                body.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if items.is_empty() {
            self.reply(user_id, self.translations.lookup(language, "batch.empty"))
                .await?;
            return Ok(ConversationState::BatchMode);
        }

        if items.len() > self.config.max_batch_size {
            self.reply(
                user_id,
                self.translations.format(
                    language,
                    "batch.max_size",
                    &[("max_batch", self.config.max_batch_size.to_string())],
                ),
            )
            .await?;
            return Ok(ConversationState::BatchMode);
        }

        let (success, failed) = self.process_batch(user_id, language, &items).await;
        info!(target = "conversation", user_id = %user_id, success, failed, "Batch completed");

        self.reply(
            user_id,
            self.translations.format(
                language,
                "batch.completed",
                &[("success", success.to_string()), ("failed", failed.to_string())],
            ),
        )
        .await?;
        self.show_main_menu(user_id, language).await
    }

    async fn offer_next(&self, user_id: UserId, language: LanguageCode) -> Result<()> {
        self.reply_with(
            user_id,
            self.translations.lookup(language, "continuous_mode.next_action"),
            input::continuous_keyboard(&self.translations, language),
        )
        .await
    }

    async fn send_help(&self, user_id: UserId, language: LanguageCode) -> Result<()> {
        let text = ["help.title", "help.features", "help.commands"]
            .iter()
            .map(|key| self.translations.lookup(language, key))
            .collect::<Vec<_>>()
            .join("\n\n");
        self.reply(user_id, text).await
    }

    async fn send_quota_status(&self, user_id: UserId, language: LanguageCode) -> Result<()> {
        let status = self.quota.get_quota_status(user_id).await?;
        let text = self.translations.format(
            language,
            "quota.status",
            &[
                ("used", status.used.to_string()),
                ("total", status.total.to_string()),
                ("percentage", format!("{:.0}", status.percentage_used)),
                ("remaining", status.remaining.to_string()),
                ("reset_time", status.reset_time.to_string()),
            ],
        );
        self.reply(user_id, text).await
    }

    async fn send_quota_exceeded(&self, user_id: UserId, language: LanguageCode) -> Result<()> {
        let status = self.quota.get_quota_status(user_id).await?;
        info!(target = "conversation", user_id = %user_id, used = status.used, "Daily quota exhausted");
        let text = self.translations.format(
            language,
            "quota.exceeded",
            &[
                ("used", status.used.to_string()),
                ("total", status.total.to_string()),
                ("reset_time", status.reset_time.to_string()),
            ],
        );
        self.reply(user_id, text).await
    }

    async fn send_rejection(
        &self,
        user_id: UserId,
        language: LanguageCode,
        rejection: TextRejection,
    ) -> Result<()> {
        let text = match rejection {
            TextRejection::TooLong { current, max } => self.translations.format(
                language,
                rejection.locale_key(),
                &[("current", current.to_string()), ("max", max.to_string())],
            ),
            _ => self.translations.lookup(language, rejection.locale_key()),
        };
        self.reply(user_id, text).await
    }

    pub(crate) async fn reply(&self, user_id: UserId, text: String) -> Result<()> {
        self.transport.send(user_id, Reply::text(text)).await?;
        Ok(())
    }

    async fn reply_with(&self, user_id: UserId, text: String, markup: ReplyMarkup) -> Result<()> {
        self.transport
            .send(user_id, Reply::text(text).with_markup(markup))
            .await?;
        Ok(())
    }
}

/// Text carried by a submission: a plain message, a valid `.txt` upload, or
/// a photo caption
fn submitted_text(msg: &IncomingMessage) -> Option<String> {
    match &msg.content {
        MessageContent::Text(text) => Some(text.clone()),
        MessageContent::Document {
            file_name, bytes, ..
        } => {
            if !validation::validate_filename(file_name) {
                debug!(target = "conversation", file_name = %file_name, "Document rejected");
                return None;
            }
            String::from_utf8(bytes.clone()).ok()
        }
        MessageContent::Photo { caption } => caption.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_need_a_safe_text_name() {
        let user = UserId(1);
        let ok = IncomingMessage::document(user, "notes.txt", None, b"hello".to_vec());
        assert_eq!(submitted_text(&ok).as_deref(), Some("hello"));

        let pdf = IncomingMessage::document(user, "notes.pdf", None, b"hello".to_vec());
        assert_eq!(submitted_text(&pdf), None);

        let traversal = IncomingMessage::document(user, "../etc.txt", None, b"x".to_vec());
        assert_eq!(submitted_text(&traversal), None);

        let binary = IncomingMessage::document(user, "a.txt", None, vec![0xff, 0xfe]);
        assert_eq!(submitted_text(&binary), None);
    }

    #[test]
    fn photo_uses_its_caption() {
        let user = UserId(1);
        assert_eq!(
            submitted_text(&IncomingMessage::photo(user, Some("Caption".into()))).as_deref(),
            Some("Caption")
        );
        assert_eq!(submitted_text(&IncomingMessage::photo(user, None)), None);
    }
}
