//! Minimal Telegram Bot API client.
//!
//! Covers the four methods a log forwarder needs (`getMe`, `sendMessage`,
//! `editMessageText`, `sendDocument`). Calls block the caller, are bounded by
//! a per-call timeout, and can be cancelled through a shared
//! [`ShutdownSignal`].

pub mod client;
pub mod error;
pub mod shutdown;
pub mod types;

pub use client::{BotApi, BotApiBuilder, DEFAULT_API_URL, DEFAULT_TIMEOUT, IO_THREAD_NAME};
pub use error::{ApiFailure, BotApiError, BotApiResult};
pub use shutdown::ShutdownSignal;
pub use types::{
    ApiResponse, EditMessageText, LinkPreviewOptions, ParseMode, ResponseParameters, SendDocument,
    SendMessage, SentMessage, User,
};
