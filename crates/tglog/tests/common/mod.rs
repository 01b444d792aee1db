#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tglog::{ChannelClient, MessageId, SinkConfig, SinkError, SinkResult};

pub const TITLE: &str = "test";

/// A request the channel accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { id: i64, text: String },
    Edit { id: i64, text: String },
    Upload {
        caption: String,
        file_name: String,
        contents: String,
    },
}

#[derive(Default)]
struct Recorded {
    calls: Vec<Call>,
    failures: VecDeque<SinkError>,
    attempts: usize,
    next_id: i64,
    deleted: Vec<i64>,
}

/// In-memory channel that records every successful request.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    inner: Arc<Mutex<Recorded>>,
    on_request: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` at the start of every request.
    pub fn with_hook(hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            on_request: Some(Arc::new(hook)),
            ..Self::default()
        }
    }

    pub fn boxed(&self) -> Box<dyn ChannelClient> {
        Box::new(self.clone())
    }

    /// Make the next request fail with `error`. Calls queue up.
    pub fn fail_next(&self, error: SinkError) {
        self.inner.lock().unwrap().failures.push_back(error);
    }

    /// Reject every later edit of message `id` as Telegram does once it is deleted.
    pub fn delete_message(&self, id: i64) {
        self.inner.lock().unwrap().deleted.push(id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Requests made, including failed ones.
    pub fn attempts(&self) -> usize {
        self.inner.lock().unwrap().attempts
    }

    /// Bodies of create/edit calls with the decoration removed.
    pub fn bodies(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                Call::Create { text, .. } | Call::Edit { text, .. } => body(text),
                Call::Upload { .. } => None,
            })
            .collect()
    }

    /// Final text of every message, in creation order.
    pub fn messages(&self) -> Vec<String> {
        let mut order: Vec<i64> = Vec::new();
        let mut latest = std::collections::HashMap::new();
        for call in self.calls() {
            match call {
                Call::Create { id, text } | Call::Edit { id, text } => {
                    if !order.contains(&id) {
                        order.push(id);
                    }
                    latest.insert(id, body(&text).unwrap_or_default());
                }
                Call::Upload { .. } => {}
            }
        }
        order
            .into_iter()
            .map(|id| latest.remove(&id).unwrap_or_default())
            .collect()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Upload { contents, .. } => Some(contents),
                _ => None,
            })
            .collect()
    }

    fn request(&self, call: impl FnOnce(i64) -> Call) -> SinkResult<i64> {
        if let Some(hook) = &self.on_request {
            hook();
        }
        let mut inner = self.inner.lock().unwrap();
        inner.attempts += 1;
        if let Some(error) = inner.failures.pop_front() {
            return Err(error);
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.calls.push(call(id));
        Ok(id)
    }
}

impl ChannelClient for RecordingChannel {
    fn create_message(&self, text: &str) -> SinkResult<MessageId> {
        self.request(|id| Call::Create {
            id,
            text: text.to_string(),
        })
        .map(MessageId)
    }

    fn edit_message(&self, id: MessageId, text: &str) -> SinkResult<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.deleted.contains(&id.0) {
                inner.attempts += 1;
                return Err(SinkError::Api {
                    code: 400,
                    description: "Bad Request: message to edit not found".into(),
                });
            }
        }
        self.request(|_| Call::Edit {
            id: id.0,
            text: text.to_string(),
        })
        .map(|_| ())
    }

    fn upload_document(&self, caption: &str, file_name: &str, contents: &[u8]) -> SinkResult<()> {
        self.request(|_| Call::Upload {
            caption: caption.to_string(),
            file_name: file_name.to_string(),
            contents: String::from_utf8_lossy(contents).into_owned(),
        })
        .map(|_| ())
    }
}

/// Body of a decorated message, `None` for the placeholder.
pub fn body(text: &str) -> Option<String> {
    let prefix = format!("```\n{TITLE}\n\n");
    text.strip_prefix(&prefix)
        .and_then(|rest| rest.strip_suffix("\n```"))
        .map(str::to_string)
}

pub fn placeholder() -> String {
    format!("```\nInitializing {TITLE}\n```")
}

/// Test configuration: no local mirror, short interval.
pub fn config() -> SinkConfig {
    SinkConfig {
        title: TITLE.to_string(),
        update_interval: Duration::from_millis(20),
        mirror_path: None,
        echo_stdout: false,
        ..SinkConfig::new("123:test", -100123)
    }
}

/// Every delivered line, in delivery order.
pub fn delivered_lines(channel: &RecordingChannel) -> Vec<String> {
    channel
        .messages()
        .iter()
        .flat_map(|text| text.lines())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn transport_error() -> SinkError {
    SinkError::Transport(telegram_bot_api::BotApiError::WorkerGone)
}
