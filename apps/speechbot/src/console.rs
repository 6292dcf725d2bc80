// Line-oriented stdin/stdout transport for local use
use async_trait::async_trait;
use speechbot_core::{
    IncomingMessage, MessageId, Reply, ReplyMarkup, Result, Transport, UserId,
};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;
use tracing::warn;

/// User for lines without a `user_id:` prefix
pub const DEFAULT_USER: UserId = UserId(1);

pub struct ConsoleTransport {
    out: Mutex<Stdout>,
    next_id: AtomicI64,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
            next_id: AtomicI64::new(1),
        }
    }

    async fn write(&self, text: &str) -> Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(text.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, user_id: UserId, reply: Reply) -> Result<MessageId> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.write(&render_reply(user_id, id, &reply)).await?;
        Ok(id)
    }

    async fn edit_text(&self, user_id: UserId, message_id: MessageId, text: &str) -> Result<()> {
        self.write(&format!("[{user_id}] #{} (edited) {text}\n", message_id.0))
            .await
    }

    async fn delete(&self, user_id: UserId, message_id: MessageId) -> Result<()> {
        self.write(&format!("[{user_id}] #{} (deleted)\n", message_id.0))
            .await
    }
}

pub fn render_reply(user_id: UserId, id: MessageId, reply: &Reply) -> String {
    let mut out = String::new();
    if !reply.text.is_empty() {
        out.push_str(&format!("[{user_id}] #{} {}\n", id.0, reply.text));
    }
    if let Some(audio) = &reply.audio {
        out.push_str(&format!(
            "[{user_id}] #{} 🔊 {} by {} ({})\n    {}\n",
            id.0,
            audio.title,
            audio.performer,
            audio.path.display(),
            audio.caption
        ));
    }
    match &reply.markup {
        Some(ReplyMarkup::Keyboard { rows, .. }) => {
            for row in rows {
                out.push_str(&format!("    [ {} ]\n", row.join(" | ")));
            }
        }
        Some(ReplyMarkup::Remove) | None => {}
    }
    out
}

/// Split `user_id: message` lines; anything else belongs to the default user
pub fn parse_line(line: &str) -> Option<(UserId, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some((prefix, rest)) = line.split_once(':') {
        if let Ok(id) = prefix.trim().parse::<i64>() {
            let body = rest.trim();
            return (!body.is_empty()).then(|| (UserId(id), body.to_string()));
        }
    }
    Some((DEFAULT_USER, line.to_string()))
}

/// Turn a console body into a message: `@file <path>` uploads a document,
/// `@photo [caption]` sends a photo, anything else is text
pub async fn to_message(user_id: UserId, body: String) -> IncomingMessage {
    if let Some(path) = body.strip_prefix("@file ") {
        let path = Path::new(path.trim());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return match tokio::fs::read(path).await {
            Ok(bytes) => IncomingMessage::document(user_id, file_name, None, bytes),
            Err(e) => {
                warn!(target = "speechbot", path = %path.display(), error = %e, "Cannot read upload; sending empty document");
                IncomingMessage::document(user_id, file_name, None, Vec::new())
            }
        };
    }
    if let Some(rest) = body.strip_prefix("@photo") {
        let caption = rest.trim();
        return IncomingMessage::photo(
            user_id,
            (!caption.is_empty()).then(|| caption.to_string()),
        );
    }
    IncomingMessage::text(user_id, body)
}
