//! Audio production and delivery for single items and batches.

use crate::artifact::Artifact;
use crate::conversation::Dispatcher;
use crate::transport::{AudioAttachment, MessageId, Reply};
use crate::types::{LanguageCode, Speed, UserId};
use crate::util;
use crate::validation;
use crate::{Result, SpeechBotError};
use tracing::{debug, error, info, warn};

pub const AUDIO_PERFORMER: &str = "SpeechBot";

/// Longest text excerpt shown in an audio title
const TITLE_EXCERPT_CHARS: usize = 30;

impl Dispatcher {
    /// Synthesize `text` at `speed` and send it to the user.
    ///
    /// Returns false when anything between synthesis and the final send
    /// failed; the user has then been told, and no artifact is left behind.
    pub(crate) async fn deliver_audio(
        &self,
        user_id: UserId,
        language: LanguageCode,
        text: &str,
        speed: Speed,
    ) -> bool {
        let progress = match self
            .transport
            .send(
                user_id,
                Reply::text(self.translations.lookup(language, "audio.generating")),
            )
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(target = "conversation", user_id = %user_id, error = %e, "Failed to send progress message");
                None
            }
        };

        match self
            .try_deliver(user_id, language, text, speed, progress)
            .await
        {
            Ok(()) => {
                info!(
                    target = "conversation",
                    user_id = %user_id,
                    speed = %speed,
                    chars = validation::char_len(text),
                    "Audio delivered"
                );
                if let Err(e) = self
                    .reply(user_id, self.translations.lookup(language, "audio.success"))
                    .await
                {
                    warn!(target = "conversation", user_id = %user_id, error = %e, "Failed to send confirmation");
                }
                true
            }
            Err(e) => {
                error!(target = "conversation", user_id = %user_id, error = %e, "Audio delivery failed");
                if let Some(id) = progress {
                    if let Err(e) = self.transport.delete(user_id, id).await {
                        warn!(target = "conversation", user_id = %user_id, error = %e, "Failed to delete progress message");
                    }
                }
                if let Err(e) = self
                    .reply(user_id, self.translations.lookup(language, "audio.failed"))
                    .await
                {
                    warn!(target = "conversation", user_id = %user_id, error = %e, "Failed to send failure notice");
                }
                false
            }
        }
    }

    async fn try_deliver(
        &self,
        user_id: UserId,
        language: LanguageCode,
        text: &str,
        speed: Speed,
        progress: Option<MessageId>,
    ) -> Result<()> {
        let artifact = self.produce_artifact(text, speed).await?;

        let sent = async {
            if let Some(id) = progress {
                let sending = self.translations.lookup(language, "audio.sending");
                self.transport.edit_text(user_id, id, &sending).await?;
            }
            let attachment = AudioAttachment {
                path: artifact.path.clone(),
                title: format!(
                    "{} - {}",
                    self.translations.lookup(language, "audio.title"),
                    util::truncate_text(text, TITLE_EXCERPT_CHARS)
                ),
                performer: AUDIO_PERFORMER.to_string(),
                caption: self.translations.format(
                    language,
                    "audio.caption",
                    &[
                        ("speed", format!("{speed}")),
                        ("length", validation::char_len(text).to_string()),
                        (
                            "duration",
                            util::format_duration(util::estimate_speech_duration(text, speed)),
                        ),
                    ],
                ),
            };
            self.transport.send(user_id, Reply::audio(attachment)).await?;
            if let Some(id) = progress {
                self.transport.delete(user_id, id).await?;
            }
            Ok::<(), SpeechBotError>(())
        }
        .await;

        self.artifacts.release(&artifact).await;
        sent
    }

    /// Audio file for `text`: a fresh cache entry when one exists, else a
    /// newly synthesized temporary file
    pub(crate) async fn produce_artifact(&self, text: &str, speed: Speed) -> Result<Artifact> {
        let language = validation::detect_language(text);
        let format = self.synthesizer.audio_format();

        if let Some(cache) = self.artifacts.cache() {
            if let Some(path) = cache.get(text, speed, language, format).await {
                return Ok(Artifact { path, cached: true });
            }
        }

        let bytes = self.synthesizer.synthesize(text, speed, language).await?;
        let name = self.artifacts.generate_name(format);
        let path = self.artifacts.save(&bytes, &name).await?;

        if let Some(cache) = self.artifacts.cache() {
            if let Err(e) = cache.put(text, speed, language, format, &bytes).await {
                warn!(target = "artifacts", error = %e, "Failed to cache audio");
            }
        }

        Ok(Artifact {
            path,
            cached: false,
        })
    }

    /// Convert each item at the default speed; returns (succeeded, failed).
    ///
    /// Items over the batch length limit or failing validation are counted
    /// as failures without being synthesized.
    pub(crate) async fn process_batch(
        &self,
        user_id: UserId,
        language: LanguageCode,
        items: &[String],
    ) -> (usize, usize) {
        let total = items.len();
        let speed = self.config.default_speed;
        let mut success = 0;
        let mut failed = 0;

        for (index, item) in items.iter().enumerate() {
            let current = index + 1;
            if let Err(rejection) =
                validation::validate_submission(item, self.config.max_batch_text_length)
            {
                debug!(target = "conversation", user_id = %user_id, item = current, reason = ?rejection, "Batch item rejected");
                failed += 1;
                continue;
            }

            match self
                .deliver_batch_item(user_id, language, item, speed, current, total)
                .await
            {
                Ok(()) => success += 1,
                Err(e) => {
                    warn!(target = "conversation", user_id = %user_id, item = current, error = %e, "Batch item failed");
                    failed += 1;
                }
            }
        }

        (success, failed)
    }

    async fn deliver_batch_item(
        &self,
        user_id: UserId,
        language: LanguageCode,
        item: &str,
        speed: Speed,
        current: usize,
        total: usize,
    ) -> Result<()> {
        let progress = self
            .transport
            .send(
                user_id,
                Reply::text(self.translations.format(
                    language,
                    "batch.processing",
                    &[("current", current.to_string()), ("total", total.to_string())],
                )),
            )
            .await?;

        let text = validation::sanitize_text(item);
        let outcome = async {
            let artifact = self.produce_artifact(&text, speed).await?;
            let attachment = AudioAttachment {
                path: artifact.path.clone(),
                title: self.translations.format(
                    language,
                    "batch.item_title",
                    &[("current", current.to_string())],
                ),
                performer: AUDIO_PERFORMER.to_string(),
                caption: self.translations.format(
                    language,
                    "batch.item_caption",
                    &[("current", current.to_string()), ("total", total.to_string())],
                ),
            };
            let sent = self.transport.send(user_id, Reply::audio(attachment)).await;
            self.artifacts.release(&artifact).await;
            sent?;
            Ok::<(), SpeechBotError>(())
        }
        .await;

        if let Err(e) = self.transport.delete(user_id, progress).await {
            warn!(target = "conversation", user_id = %user_id, error = %e, "Failed to delete progress message");
        }
        outcome
    }
}
