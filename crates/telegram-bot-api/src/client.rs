//! Blocking Telegram Bot API client.
//!
//! Requests run on a private single-worker tokio runtime. Callers block on a
//! channel until the reply arrives, so the client can be used from plain
//! threads as well as from inside another async runtime. Each call is bounded
//! by the configured timeout and aborted early when the [`ShutdownSignal`]
//! fires.

use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::{BotApiError, BotApiResult};
use crate::shutdown::ShutdownSignal;
use crate::types::{ApiResponse, EditMessageText, SendDocument, SendMessage, SentMessage, User};

/// Public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
/// Per-call timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Name given to the client's I/O threads.
pub const IO_THREAD_NAME: &str = "telegram-bot-api-io";

type ThreadHook = Arc<dyn Fn() + Send + Sync>;

/// Builder for [`BotApi`].
pub struct BotApiBuilder {
    token: String,
    base_url: String,
    timeout: Duration,
    shutdown: Option<ShutdownSignal>,
    on_io_thread_start: Option<ThreadHook>,
}

impl BotApiBuilder {
    /// Override the API host (used by tests and self-hosted Bot API servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share a shutdown signal with the host application.
    pub fn shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run `hook` at the start of every I/O thread.
    pub fn on_io_thread_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_io_thread_start = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> BotApiResult<BotApi> {
        let http = Client::builder().timeout(self.timeout).build()?;

        let mut runtime = tokio::runtime::Builder::new_multi_thread();
        runtime
            .worker_threads(1)
            .thread_name(IO_THREAD_NAME)
            .enable_all();
        if let Some(hook) = self.on_io_thread_start {
            runtime.on_thread_start(move || hook());
        }

        Ok(BotApi {
            http,
            base_url: format!("{}/bot{}", self.base_url.trim_end_matches('/'), self.token),
            timeout: self.timeout,
            shutdown: self.shutdown.unwrap_or_default(),
            runtime: Some(runtime.build()?),
        })
    }
}

/// Request body variants.
enum Body<'a, S> {
    Empty,
    Json(&'a S),
    Multipart(reqwest::multipart::Form),
}

/// Low-level Telegram Bot API client.
pub struct BotApi {
    http: Client,
    /// `{host}/bot{token}`; never logged.
    base_url: String,
    timeout: Duration,
    shutdown: ShutdownSignal,
    runtime: Option<Runtime>,
}

impl BotApi {
    pub fn builder(token: &str) -> BotApiBuilder {
        BotApiBuilder {
            token: token.to_string(),
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            shutdown: None,
            on_io_thread_start: None,
        }
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Fetch the bot account; doubles as token validation.
    pub fn get_me(&self) -> BotApiResult<User> {
        self.call::<User, ()>("getMe", Body::Empty)
    }

    /// Send a text message and return its id.
    pub fn send_message(&self, request: &SendMessage) -> BotApiResult<SentMessage> {
        self.call("sendMessage", Body::Json(request))
    }

    /// Replace the text of an existing message.
    pub fn edit_message_text(&self, request: &EditMessageText) -> BotApiResult<()> {
        // Telegram answers with the edited Message, or `true` for inline messages.
        self.call::<serde_json::Value, _>("editMessageText", Body::Json(request))
            .map(|_| ())
    }

    /// Upload a document as `multipart/form-data`.
    pub fn send_document(&self, request: SendDocument) -> BotApiResult<SentMessage> {
        let form = request.into_form();
        self.call::<SentMessage, ()>("sendDocument", Body::Multipart(form))
    }

    fn call<T, S>(&self, method: &'static str, body: Body<'_, S>) -> BotApiResult<T>
    where
        T: DeserializeOwned + Send + 'static,
        S: serde::Serialize,
    {
        if self.shutdown.is_triggered() {
            return Err(BotApiError::Cancelled);
        }
        let runtime = self.runtime.as_ref().ok_or(BotApiError::WorkerGone)?;

        let url = format!("{}/{}", self.base_url, method);
        let request = match body {
            Body::Empty => self.http.post(url),
            Body::Json(payload) => self.http.post(url).json(payload),
            Body::Multipart(form) => self.http.post(url).multipart(form),
        };

        debug!(method, "calling Telegram Bot API");

        let shutdown = self.shutdown.clone();
        let timeout = self.timeout;
        let (reply_tx, reply_rx) = sync_channel(1);
        runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.triggered() => Err(BotApiError::Cancelled),
                result = execute::<T>(request, timeout) => result,
            };
            let _ = reply_tx.send(outcome);
        });

        reply_rx.recv().map_err(|_| BotApiError::WorkerGone)?
    }
}

impl Drop for BotApi {
    fn drop(&mut self) {
        // Never blocks, so the client may be dropped inside an async context.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn execute<T: DeserializeOwned>(request: RequestBuilder, timeout: Duration) -> BotApiResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(e, timeout))?;
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    let envelope: ApiResponse<T> = serde_json::from_slice(&body)?;
    envelope.into_result()
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> BotApiError {
    if err.is_timeout() {
        BotApiError::Timeout(timeout)
    } else {
        BotApiError::Http(err)
    }
}
