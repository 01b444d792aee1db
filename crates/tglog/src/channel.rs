//! Remote channel abstraction and its Telegram implementation.

use crate::config::SinkConfig;
use crate::error::SinkResult;
use crate::guard;
use telegram_bot_api::{
    BotApi, EditMessageText, LinkPreviewOptions, ParseMode, SendDocument, SendMessage,
    ShutdownSignal,
};

/// Identifier of a message created through a [`ChannelClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

/// Operations the flush engine needs from the remote side.
///
/// Errors are already normalized: rate limits arrive as
/// [`SinkError::RateLimited`](crate::SinkError::RateLimited) and a rejected
/// token as [`SinkError::Unauthorized`](crate::SinkError::Unauthorized).
pub trait ChannelClient: Send {
    fn create_message(&self, text: &str) -> SinkResult<MessageId>;

    fn edit_message(&self, id: MessageId, text: &str) -> SinkResult<()>;

    fn upload_document(&self, caption: &str, file_name: &str, contents: &[u8]) -> SinkResult<()>;
}

impl<C: ChannelClient + ?Sized> ChannelClient for Box<C> {
    fn create_message(&self, text: &str) -> SinkResult<MessageId> {
        (**self).create_message(text)
    }

    fn edit_message(&self, id: MessageId, text: &str) -> SinkResult<()> {
        (**self).edit_message(id, text)
    }

    fn upload_document(&self, caption: &str, file_name: &str, contents: &[u8]) -> SinkResult<()> {
        (**self).upload_document(caption, file_name, contents)
    }
}

/// [`ChannelClient`] backed by the Telegram Bot API.
pub struct TelegramChannel {
    api: BotApi,
    chat_id: i64,
    topic_id: Option<i64>,
}

impl TelegramChannel {
    /// Build the client for a validated configuration.
    ///
    /// The client's I/O threads are marked as dispatch threads so transport
    /// diagnostics never feed back into the sink.
    pub fn from_config(config: &SinkConfig, shutdown: ShutdownSignal) -> SinkResult<Self> {
        let api = BotApi::builder(&config.token)
            .base_url(config.api_base_url.as_str())
            .timeout(config.request_timeout)
            .shutdown(shutdown)
            .on_io_thread_start(guard::mark_current_thread)
            .build()?;

        Ok(Self {
            api,
            chat_id: config.chat_id,
            topic_id: config.topic(),
        })
    }

    /// Validate the token with `getMe` and return the bot's username.
    pub fn bot_username(&self) -> SinkResult<String> {
        let me = self.api.get_me()?;
        Ok(me.username.unwrap_or(me.first_name))
    }
}

impl ChannelClient for TelegramChannel {
    fn create_message(&self, text: &str) -> SinkResult<MessageId> {
        let request = SendMessage {
            message_thread_id: self.topic_id,
            parse_mode: Some(ParseMode::Markdown),
            link_preview_options: Some(LinkPreviewOptions::disabled()),
            ..SendMessage::new(self.chat_id, text)
        };
        let sent = self.api.send_message(&request)?;
        Ok(MessageId(sent.message_id))
    }

    fn edit_message(&self, id: MessageId, text: &str) -> SinkResult<()> {
        let request = EditMessageText {
            chat_id: self.chat_id,
            message_id: id.0,
            text: text.to_string(),
            parse_mode: Some(ParseMode::Markdown),
            link_preview_options: Some(LinkPreviewOptions::disabled()),
        };
        self.api.edit_message_text(&request)?;
        Ok(())
    }

    fn upload_document(&self, caption: &str, file_name: &str, contents: &[u8]) -> SinkResult<()> {
        let request = SendDocument {
            chat_id: self.chat_id,
            message_thread_id: self.topic_id,
            caption: Some(caption.to_string()),
            file_name: file_name.to_string(),
            contents: contents.to_vec(),
        };
        self.api.send_document(request)?;
        Ok(())
    }
}
