//! Sink configuration.
//!
//! Values come from defaults, an optional JSON file and `TGLOG_*`
//! environment variables, in that order. [`SinkConfig::validate`] turns the
//! result into a usable configuration.

use crate::error::{SinkError, SinkResult};
use crate::format::decoration_len;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TITLE: &str = "tglog";
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_MINIMUM_LINES: usize = 1;
/// Buffered bytes above which a flush uploads a document instead of text.
pub const DEFAULT_PENDING_SIZE: usize = 20_000;
/// Telegram's message length limit.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4096;
pub const DEFAULT_API_URL: &str = telegram_bot_api::DEFAULT_API_URL;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = telegram_bot_api::DEFAULT_TIMEOUT;
pub const DEFAULT_MIRROR_PATH: &str = "bot.log";
pub const DEFAULT_DOCUMENT_CAPTION: &str =
    "Too many logs for text logBuffer! This file contains the logs.";
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Bytes always reserved for decoration below the message size limit.
const RESERVED_BYTES: usize = 96;
/// Smallest working limit accepted by [`SinkConfig::validate`].
const MIN_WORKING_LIMIT: usize = 256;

/// Where flush network calls run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// On the writing thread, while the sink lock is held.
    #[default]
    Inline,
    /// On a dedicated sender thread.
    Background,
}

/// Configuration for a [`LogSink`](crate::LogSink).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Bot token issued by @BotFather.
    pub token: String,
    /// Target chat.
    pub chat_id: i64,
    /// Forum topic inside the chat; 0 for none.
    pub topic_id: u64,
    /// Header line of every message.
    pub title: String,
    /// Writes containing any of these substrings are not forwarded.
    pub excluded_patterns: Vec<String>,
    #[serde(rename = "update_interval_ms", with = "millis")]
    pub update_interval: Duration,
    pub minimum_lines: usize,
    pub pending_size: usize,
    pub max_message_size: usize,
    pub api_base_url: String,
    #[serde(rename = "request_timeout_ms", with = "millis")]
    pub request_timeout: Duration,
    /// Local copy of everything written; also the name of uploaded documents.
    pub mirror_path: Option<PathBuf>,
    pub echo_stdout: bool,
    pub document_caption: String,
    pub dispatch: DispatchMode,
    /// Wake-up queue depth for [`DispatchMode::Background`].
    pub queue_capacity: usize,
    /// Put text back into the buffer after a transport failure.
    pub requeue_failed: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: 0,
            topic_id: 0,
            title: DEFAULT_TITLE.to_string(),
            excluded_patterns: Vec::new(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            minimum_lines: DEFAULT_MINIMUM_LINES,
            pending_size: DEFAULT_PENDING_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            mirror_path: Some(PathBuf::from(DEFAULT_MIRROR_PATH)),
            echo_stdout: true,
            document_caption: DEFAULT_DOCUMENT_CAPTION.to_string(),
            dispatch: DispatchMode::Inline,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            requeue_failed: true,
        }
    }
}

// The token never reaches logs.
impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("topic_id", &self.topic_id)
            .field("title", &self.title)
            .field("excluded_patterns", &self.excluded_patterns)
            .field("update_interval", &self.update_interval)
            .field("minimum_lines", &self.minimum_lines)
            .field("pending_size", &self.pending_size)
            .field("max_message_size", &self.max_message_size)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("mirror_path", &self.mirror_path)
            .field("echo_stdout", &self.echo_stdout)
            .field("dispatch", &self.dispatch)
            .field("requeue_failed", &self.requeue_failed)
            .finish_non_exhaustive()
    }
}

impl SinkConfig {
    /// Defaults plus credentials.
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            token: token.into(),
            chat_id,
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load_from_file(path: &Path) -> SinkResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SinkConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from `TGLOG_*` variables. Unparsable values are ignored.
    pub fn load_from_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(token) = var("TGLOG_TOKEN") {
            self.token = token;
        }
        if let Some(chat_id) = var("TGLOG_CHAT_ID").and_then(|v| v.trim().parse().ok()) {
            self.chat_id = chat_id;
        }
        if let Some(topic_id) = parsed("TGLOG_TOPIC_ID") {
            self.topic_id = topic_id;
        }
        if let Some(title) = var("TGLOG_TITLE") {
            self.title = title;
        }
        if let Some(patterns) = var("TGLOG_EXCLUDE") {
            self.excluded_patterns = split_list(&patterns);
        }
        if let Some(ms) = parsed("TGLOG_UPDATE_INTERVAL_MS") {
            self.update_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parsed("TGLOG_MINIMUM_LINES") {
            self.minimum_lines = n as usize;
        }
        if let Some(n) = parsed("TGLOG_PENDING_SIZE") {
            self.pending_size = n as usize;
        }
        if let Some(n) = parsed("TGLOG_MAX_MESSAGE_SIZE") {
            self.max_message_size = n as usize;
        }
    }

    /// Check credentials and replace zero or empty fields with defaults.
    pub fn validate(mut self) -> SinkResult<Self> {
        if self.token.trim().is_empty() {
            return Err(SinkError::Config("please provide a bot token".into()));
        }
        if self.chat_id == 0 {
            return Err(SinkError::Config("please provide a chat id".into()));
        }

        if self.title.is_empty() {
            self.title = DEFAULT_TITLE.to_string();
        }
        if self.update_interval.is_zero() {
            self.update_interval = DEFAULT_UPDATE_INTERVAL;
        }
        if self.minimum_lines == 0 {
            self.minimum_lines = DEFAULT_MINIMUM_LINES;
        }
        if self.pending_size == 0 {
            self.pending_size = DEFAULT_PENDING_SIZE;
        }
        if self.max_message_size == 0 {
            self.max_message_size = DEFAULT_MAX_MESSAGE_SIZE;
        }
        if self.api_base_url.is_empty() {
            self.api_base_url = DEFAULT_API_URL.to_string();
        }
        if self.request_timeout.is_zero() {
            self.request_timeout = DEFAULT_REQUEST_TIMEOUT;
        }
        if self.document_caption.is_empty() {
            self.document_caption = DEFAULT_DOCUMENT_CAPTION.to_string();
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        self.excluded_patterns.retain(|p| !p.is_empty());

        if self.working_limit() < MIN_WORKING_LIMIT {
            return Err(SinkError::Config(format!(
                "max_message_size {} leaves less than {} bytes for log text with title {:?}",
                self.max_message_size, MIN_WORKING_LIMIT, self.title
            )));
        }

        Ok(self)
    }

    /// Byte budget for a message body before decoration.
    pub fn working_limit(&self) -> usize {
        let reserved = RESERVED_BYTES.max(decoration_len(&self.title));
        self.max_message_size.saturating_sub(reserved)
    }

    /// Forum topic as a Telegram `message_thread_id`.
    pub fn topic(&self) -> Option<i64> {
        match self.topic_id {
            0 => None,
            id => i64::try_from(id).ok(),
        }
    }

    /// Attachment name for document uploads.
    pub fn document_name(&self) -> String {
        self.mirror_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_MIRROR_PATH.to_string())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SinkConfig::default();
        assert_eq!(config.title, "tglog");
        assert_eq!(config.update_interval, Duration::from_secs(3));
        assert_eq!(config.minimum_lines, 1);
        assert_eq!(config.pending_size, 20_000);
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.working_limit(), 4000);
        assert_eq!(config.dispatch, DispatchMode::Inline);
        assert!(config.requeue_failed);
        assert_eq!(config.document_name(), "bot.log");
    }

    #[test]
    fn test_validate_requires_token() {
        let err = SinkConfig::new("", 1).validate().unwrap_err();
        assert_eq!(err.to_string(), "configuration error: please provide a bot token");
    }

    #[test]
    fn test_validate_requires_chat_id() {
        let err = SinkConfig::new("123:abc", 0).validate().unwrap_err();
        assert_eq!(err.to_string(), "configuration error: please provide a chat id");
    }

    #[test]
    fn test_validate_restores_defaults() {
        let config = SinkConfig {
            title: String::new(),
            update_interval: Duration::ZERO,
            minimum_lines: 0,
            pending_size: 0,
            max_message_size: 0,
            excluded_patterns: vec![String::new(), "DEBUG".into()],
            ..SinkConfig::new("123:abc", -100)
        }
        .validate()
        .unwrap();

        assert_eq!(config.title, DEFAULT_TITLE);
        assert_eq!(config.update_interval, DEFAULT_UPDATE_INTERVAL);
        assert_eq!(config.minimum_lines, 1);
        assert_eq!(config.pending_size, DEFAULT_PENDING_SIZE);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(config.excluded_patterns, vec!["DEBUG".to_string()]);
    }

    #[test]
    fn test_validate_rejects_tiny_messages() {
        let config = SinkConfig {
            max_message_size: 200,
            ..SinkConfig::new("123:abc", -100)
        };
        assert!(matches!(config.validate(), Err(SinkError::Config(_))));
    }

    #[test]
    fn test_long_title_reserves_more() {
        let config = SinkConfig {
            title: "x".repeat(200),
            ..SinkConfig::default()
        };
        assert_eq!(config.working_limit(), 4096 - 210);
    }

    #[test]
    fn test_topic() {
        let mut config = SinkConfig::default();
        assert_eq!(config.topic(), None);
        config.topic_id = 17;
        assert_eq!(config.topic(), Some(17));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = SinkConfig::new("123:secret", 1);
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SinkConfig::default();
        config.apply_env(env(&[
            ("TGLOG_TOKEN", "123:abc"),
            ("TGLOG_CHAT_ID", "-100987"),
            ("TGLOG_TOPIC_ID", "4"),
            ("TGLOG_TITLE", "worker"),
            ("TGLOG_EXCLUDE", "DEBUG, FLOODWAIT,,"),
            ("TGLOG_UPDATE_INTERVAL_MS", "500"),
            ("TGLOG_MINIMUM_LINES", "3"),
            ("TGLOG_PENDING_SIZE", "9000"),
            ("TGLOG_MAX_MESSAGE_SIZE", "not-a-number"),
        ]));

        assert_eq!(config.token, "123:abc");
        assert_eq!(config.chat_id, -100987);
        assert_eq!(config.topic(), Some(4));
        assert_eq!(config.title, "worker");
        assert_eq!(config.excluded_patterns, vec!["DEBUG", "FLOODWAIT"]);
        assert_eq!(config.update_interval, Duration::from_millis(500));
        assert_eq!(config.minimum_lines, 3);
        assert_eq!(config.pending_size, 9000);
        // Invalid values leave the previous setting
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tglog.json");
        std::fs::write(
            &path,
            r#"{
                "token": "123:abc",
                "chat_id": -100123,
                "update_interval_ms": 1500,
                "dispatch": "background",
                "mirror_path": null
            }"#,
        )
        .unwrap();

        let config = SinkConfig::load_from_file(&path).unwrap();
        assert_eq!(config.chat_id, -100123);
        assert_eq!(config.update_interval, Duration::from_millis(1500));
        assert_eq!(config.dispatch, DispatchMode::Background);
        assert_eq!(config.mirror_path, None);
        assert_eq!(config.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tglog.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            SinkConfig::load_from_file(&path),
            Err(SinkError::Json(_))
        ));
    }

    #[test]
    fn test_serialize_durations_as_millis() {
        let value = serde_json::to_value(SinkConfig::default()).unwrap();
        assert_eq!(value["update_interval_ms"], 3000);
        assert_eq!(value["request_timeout_ms"], 30000);
        assert_eq!(value["dispatch"], "inline");
    }
}
