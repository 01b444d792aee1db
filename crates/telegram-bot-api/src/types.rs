//! Serde types for the Telegram Bot API.
//!
//! Only the fields this crate needs are modelled. Unknown response fields
//! are ignored; optional request fields are skipped when unset.

use serde::{Deserialize, Serialize};

use crate::error::{ApiFailure, BotApiError, BotApiResult};

/// Generic Telegram API response envelope.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
    pub parameters: Option<ResponseParameters>,
}

/// Extra information attached to failed responses.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseParameters {
    /// Flood control: seconds to wait before the request may be repeated.
    pub retry_after: Option<u64>,
    /// The group was upgraded to a supergroup with this id.
    pub migrate_to_chat_id: Option<i64>,
}

impl<T> ApiResponse<T> {
    /// Normalize the envelope into the result or an [`ApiFailure`].
    pub fn into_result(self) -> BotApiResult<T> {
        if self.ok {
            return self.result.ok_or(BotApiError::MissingResult);
        }

        Err(BotApiError::Api(ApiFailure {
            error_code: self.error_code.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            retry_after: self.parameters.and_then(|p| p.retry_after),
        }))
    }
}

/// The bot account returned by `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

/// A sent message (only the id is needed).
#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

/// Text formatting mode for message bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
    MarkdownV2,
    #[serde(rename = "HTML")]
    Html,
}

/// Link preview behaviour for a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkPreviewOptions {
    pub is_disabled: bool,
}

impl LinkPreviewOptions {
    pub fn disabled() -> Self {
        Self { is_disabled: true }
    }
}

/// `sendMessage` request body.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview_options: Option<LinkPreviewOptions>,
}

impl SendMessage {
    /// Plain-text message with no formatting options.
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            message_thread_id: None,
            parse_mode: None,
            link_preview_options: None,
        }
    }
}

/// `editMessageText` request body.
#[derive(Debug, Clone, Serialize)]
pub struct EditMessageText {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview_options: Option<LinkPreviewOptions>,
}

/// `sendDocument` request, sent as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct SendDocument {
    pub chat_id: i64,
    pub message_thread_id: Option<i64>,
    pub caption: Option<String>,
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl SendDocument {
    pub(crate) fn into_form(self) -> reqwest::multipart::Form {
        let part = reqwest::multipart::Part::bytes(self.contents).file_name(self.file_name);
        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.to_string())
            .part("document", part);

        if let Some(caption) = self.caption {
            form = form.text("caption", caption);
        }
        if let Some(thread_id) = self.message_thread_id {
            form = form.text("message_thread_id", thread_id.to_string());
        }
        form
    }
}
