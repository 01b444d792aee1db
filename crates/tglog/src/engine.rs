//! Flush engine.
//!
//! Delivers one [`Batch`] at a time: text batches grow the live message
//! until it is full, then continue in a new one; document batches are
//! uploaded as a file and end the live message.

use crate::buffer::Batch;
use crate::channel::{ChannelClient, MessageId};
use crate::error::SinkError;
use crate::format::{render_message, render_placeholder};
use crate::split::message_split;
use tracing::{debug, info, warn};

/// The live, editable remote message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageThread {
    #[default]
    Idle,
    Active { id: MessageId, text: String },
}

/// Result of one dispatch.
#[derive(Debug)]
pub enum DispatchOutcome {
    Delivered,
    /// `unsent` is the text that never reached the channel, in order.
    Undelivered { error: SinkError, unsent: String },
}

impl DispatchOutcome {
    fn failed(error: SinkError, unsent: impl Into<String>) -> Self {
        Self::Undelivered {
            error,
            unsent: unsent.into(),
        }
    }
}

pub struct FlushEngine {
    client: Box<dyn ChannelClient>,
    title: String,
    working_limit: usize,
    document_name: String,
    document_caption: String,
    thread: MessageThread,
}

impl FlushEngine {
    pub fn new(
        client: Box<dyn ChannelClient>,
        title: impl Into<String>,
        working_limit: usize,
        document_name: impl Into<String>,
        document_caption: impl Into<String>,
    ) -> Self {
        Self {
            client,
            title: title.into(),
            working_limit,
            document_name: document_name.into(),
            document_caption: document_caption.into(),
            thread: MessageThread::Idle,
        }
    }

    #[cfg(test)]
    fn thread(&self) -> &MessageThread {
        &self.thread
    }

    pub fn dispatch(&mut self, batch: Batch) -> DispatchOutcome {
        match batch {
            Batch::Text(chunk) => self.send_text(chunk),
            Batch::Document(contents) => self.send_document(contents),
        }
    }

    fn send_text(&mut self, chunk: String) -> DispatchOutcome {
        let (id, current) = match self.ensure_active() {
            Ok(active) => active,
            Err(error) => return DispatchOutcome::failed(error, chunk),
        };

        let mut combined = current.clone();
        if current.is_empty() {
            combined.push_str(chunk.strip_prefix('\n').unwrap_or(&chunk));
        } else {
            combined.push_str(&chunk);
        }
        if combined == current {
            return DispatchOutcome::Delivered;
        }

        if combined.len() <= self.working_limit {
            return match self.client.edit_message(id, &render_message(&self.title, &combined)) {
                Ok(()) => {
                    self.thread = MessageThread::Active { id, text: combined };
                    DispatchOutcome::Delivered
                }
                Err(error) => self.edit_failed(id, error, &chunk),
            };
        }

        let split = message_split(&combined, self.working_limit);
        let (head, tail) = combined.split_at(split);
        if head != current {
            if let Err(error) = self.client.edit_message(id, &render_message(&self.title, head)) {
                return self.edit_failed(id, error, &chunk);
            }
            self.thread = MessageThread::Active {
                id,
                text: head.to_string(),
            };
        }

        self.start_messages(tail)
    }

    /// Telegram refused the edit outright, e.g. the live message was deleted.
    /// Editing it again would fail forever, so `chunk` goes to a new message.
    fn edit_failed(&mut self, id: MessageId, error: SinkError, chunk: &str) -> DispatchOutcome {
        let SinkError::Api { code, description } = &error else {
            return DispatchOutcome::failed(error, chunk);
        };
        warn!(
            message_id = id.0,
            code,
            description = %description,
            "live log message rejected edit, continuing in a new message"
        );
        self.thread = MessageThread::Idle;
        self.start_messages(chunk)
    }

    /// The live message, creating the placeholder when there is none.
    fn ensure_active(&mut self) -> Result<(MessageId, String), SinkError> {
        if let MessageThread::Active { id, text } = &self.thread {
            return Ok((*id, text.clone()));
        }

        let id = self
            .client
            .create_message(&render_placeholder(&self.title))?;
        debug!(message_id = id.0, "started new log message");
        self.thread = MessageThread::Active {
            id,
            text: String::new(),
        };
        Ok((id, String::new()))
    }

    /// Send `rest` as one or more new messages, each becoming the live one.
    fn start_messages(&mut self, mut rest: &str) -> DispatchOutcome {
        loop {
            let body = rest.strip_prefix('\n').unwrap_or(rest);
            if body.is_empty() {
                return DispatchOutcome::Delivered;
            }
            let end = if body.len() > self.working_limit {
                message_split(body, self.working_limit)
            } else {
                body.len()
            };
            let piece = &body[..end];

            match self.client.create_message(&render_message(&self.title, piece)) {
                Ok(id) => {
                    debug!(message_id = id.0, "continued log in new message");
                    self.thread = MessageThread::Active {
                        id,
                        text: piece.to_string(),
                    };
                }
                Err(error) => return DispatchOutcome::failed(error, rest),
            }
            rest = &body[end..];
        }
    }

    fn send_document(&mut self, contents: String) -> DispatchOutcome {
        self.thread = MessageThread::Idle;
        let body = contents.strip_prefix('\n').unwrap_or(&contents);

        match self
            .client
            .upload_document(&self.document_caption, &self.document_name, body.as_bytes())
        {
            Ok(()) => {
                info!(bytes = body.len(), "log backlog uploaded as document");
                DispatchOutcome::Delivered
            }
            Err(error) => DispatchOutcome::failed(error, contents),
        }
    }
}
