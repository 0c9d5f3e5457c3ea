//! Webhook delivery
//!
//! Messages go to a chat-style webhook. A text-only message is posted as a
//! JSON body; a message with files becomes a multipart form with one part
//! per [`Attachment`].

use crate::artifacts::Attachment;
use crate::config::NotifierConfig;
use crate::error::{OrthowatchError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::time::Duration;

/// Message flag asking the chat service not to expand links into embeds
pub const SUPPRESS_EMBEDS: u32 = 4;

/// A message and its files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationPayload {
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl NotificationPayload {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Delivery channel for notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &NotificationPayload) -> Result<()>;
}

/// Keep at most `max_chars` characters, counting chars rather than bytes
///
/// # Examples
///
/// ```
/// use orthowatch::notify::truncate_message;
///
/// assert_eq!(truncate_message("zażółć", 3), "zaż");
/// assert_eq!(truncate_message("short", 2000), "short");
/// ```
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((cut, _)) => message[..cut].to_string(),
        None => message.to_string(),
    }
}

/// Facts reported about one batch of new sheets
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub old_date: String,
    pub new_date: String,
    pub matched: u64,
    pub layer: String,
    pub url: String,
}

/// Render the announcement text
pub fn format_message(announcement: &Announcement) -> String {
    format!(
        "Wygląda na to, że dodano nowe arkusze ortofotomapy do pobrania z Geoportalu \
         z datami dodania do rejestru między: {old} i {new}.\n\
         \n\
         Zakres: {old}..{new}\n\
         Liczba nowych arkuszy: {matched}\n\
         Warstwa: {layer}\n\
         \n\
         [WFS URL]({url})\n\
         \n\
         Załączony plik z zasięgami zobrazowań. Po pobraniu możesz go wyświetlić \
         na przykład na stronie: [geojson.io](https://geojson.io)",
        old = announcement.old_date,
        new = announcement.new_date,
        matched = announcement.matched,
        layer = announcement.layer,
        url = announcement.url,
    )
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    flags: Option<u32>,
}

/// Posts notifications to a webhook URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    max_chars: usize,
    flags: Option<u32>,
}

impl std::fmt::Debug for WebhookNotifier {
    // The webhook URL embeds its secret token.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &"<redacted>")
            .field("max_chars", &self.max_chars)
            .field("flags", &self.flags)
            .finish()
    }
}

impl WebhookNotifier {
    /// Create a notifier from configuration
    ///
    /// # Errors
    ///
    /// Returns `OrthowatchError::Config` when no webhook URL is configured
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let url = config
            .webhook_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| OrthowatchError::Config("Missing env variable: WEBHOOK_URL".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url,
            max_chars: config.max_message_chars,
            flags: config.suppress_embeds.then_some(SUPPRESS_EMBEDS),
        })
    }

    fn multipart(&self, content: String, attachments: &[Attachment]) -> Result<Form> {
        let mut form = Form::new().text("content", content);
        if let Some(flags) = self.flags {
            form = form.text("flags", flags.to_string());
        }
        for attachment in attachments {
            let part = Part::bytes(attachment.bytes.to_vec())
                .file_name(attachment.file_name.clone())
                .mime_str(&attachment.mime)
                .map_err(|e| {
                    OrthowatchError::Delivery(format!(
                        "Invalid MIME type {:?}: {}",
                        attachment.mime, e
                    ))
                })?;
            form = form.part(attachment.field_name.clone(), part);
        }
        Ok(form)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<()> {
        let content = truncate_message(&payload.content, self.max_chars);
        if content.len() < payload.content.len() {
            tracing::warn!(
                limit = self.max_chars,
                "Message truncated to fit the webhook limit"
            );
        }

        let request = if payload.attachments.is_empty() {
            self.client.post(&self.url).json(&WebhookBody {
                content: &content,
                flags: self.flags,
            })
        } else {
            self.client
                .post(&self.url)
                .multipart(self.multipart(content, &payload.attachments)?)
        };

        tracing::info!(
            attachments = payload.attachments.len(),
            "Sending webhook notification"
        );
        let response = request
            .send()
            .await
            .map_err(|e| OrthowatchError::Delivery(format!("Webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrthowatchError::Delivery(format!(
                "Webhook returned {}: {}",
                status,
                truncate_message(body.trim(), 200)
            ))
            .into());
        }

        tracing::info!(status = status.as_u16(), "Webhook notification delivered");
        Ok(())
    }
}

/// Logs what would be sent instead of sending it
#[derive(Debug, Default)]
pub struct DryRunNotifier;

#[async_trait]
impl Notifier for DryRunNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<()> {
        let files: Vec<&str> = payload
            .attachments
            .iter()
            .map(|a| a.file_name.as_str())
            .collect();
        tracing::info!(attachments = ?files, "Dry run: notification not sent");
        println!("{}", payload.content);
        Ok(())
    }
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    async fn notify(&self, payload: &NotificationPayload) -> Result<()> {
        (**self).notify(payload).await
    }
}
