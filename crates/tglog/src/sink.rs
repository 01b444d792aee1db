//! The log sink.
//!
//! [`LogSink`] is a cheap, cloneable handle. Writes are mirrored locally,
//! filtered, buffered, and flushed to Telegram either on the writing thread
//! ([`DispatchMode::Inline`]) or on a dedicated sender thread
//! ([`DispatchMode::Background`]).

use crate::background::BackgroundSender;
use crate::buffer::{Accumulator, Batch, Limits};
use crate::channel::{ChannelClient, TelegramChannel};
use crate::config::{DispatchMode, SinkConfig};
use crate::engine::{DispatchOutcome, FlushEngine};
use crate::error::{SinkError, SinkResult};
use crate::filter::ExcludeFilter;
use crate::guard::{self, DispatchScope};
use crate::mirror::LocalMirror;
use crate::scheduler::FlushPolicy;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use telegram_bot_api::ShutdownSignal;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Running,
    /// Stopped after a fatal error; writes are only mirrored.
    Halted,
    /// Shut down.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// Regular check; honours interval, minimum lines and backoff.
    Scheduled,
    /// Explicit flush; honours backoff only.
    Forced,
}

/// Flush settings shared by both dispatch modes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rules {
    pub policy: FlushPolicy,
    pub limits: Limits,
    pub requeue_failed: bool,
}

pub(crate) struct SinkState {
    pub accumulator: Accumulator,
    pub lifecycle: Lifecycle,
}

impl SinkState {
    fn new() -> Self {
        Self {
            accumulator: Accumulator::new(),
            lifecycle: Lifecycle::Running,
        }
    }

    /// Buffer `text`; returns whether a scheduled flush is now due.
    pub fn append(&mut self, text: &str, rules: &Rules, now: Instant) -> bool {
        if self.lifecycle != Lifecycle::Running {
            return false;
        }
        self.accumulator.append(text);
        rules.policy.is_due(&self.accumulator, now)
    }

    pub fn next_batch(
        &mut self,
        trigger: Trigger,
        rules: &Rules,
        now: Instant,
    ) -> SinkResult<Option<Batch>> {
        match (self.lifecycle, trigger) {
            (Lifecycle::Running, _) => {}
            (_, Trigger::Scheduled) => return Ok(None),
            (_, Trigger::Forced) => return Err(SinkError::Halted),
        }

        let acc = &self.accumulator;
        match trigger {
            Trigger::Scheduled if !rules.policy.is_due(acc, now) => return Ok(None),
            Trigger::Forced if !rules.policy.backoff_elapsed(acc, now) => {
                let since = acc
                    .last_flush()
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or_default();
                return Err(SinkError::RateLimited {
                    retry_after: acc.backoff().current().saturating_sub(since),
                });
            }
            _ => {}
        }

        Ok(self.accumulator.begin_flush(&rules.limits, now))
    }

    /// Apply the outcome of a dispatch to the buffer and lifecycle.
    pub fn settle(&mut self, outcome: DispatchOutcome, rules: &Rules, now: Instant) -> SinkResult<()> {
        let DispatchOutcome::Undelivered { error, unsent } = outcome else {
            return Ok(());
        };

        if let Some(wait) = error.retry_after() {
            warn!(
                retry_after_secs = wait.as_secs(),
                pending_bytes = unsent.len(),
                "Telegram flood control, delaying log delivery"
            );
            self.accumulator.restore(&unsent);
            self.accumulator.throttle(wait, now);
            return Ok(());
        }

        if error.is_fatal() {
            error!(error = %error, "Telegram rejected the bot token, log forwarding stopped");
            self.lifecycle = Lifecycle::Halted;
            return Err(error);
        }

        match &error {
            SinkError::Api { .. } => {
                warn!(error = %error, dropped_bytes = unsent.len(), "Telegram refused log batch");
            }
            _ if rules.requeue_failed => {
                warn!(error = %error, "failed to deliver logs, will retry");
                self.accumulator.restore(&unsent);
            }
            _ => {
                warn!(error = %error, dropped_bytes = unsent.len(), "failed to deliver logs");
            }
        }
        Err(error)
    }
}

/// One flush cycle with the state and engine locked together.
///
/// Returns whether a batch was dispatched.
fn run_cycle(core: &mut InlineCore, rules: &Rules, trigger: Trigger) -> SinkResult<bool> {
    let Some(batch) = core.state.next_batch(trigger, rules, Instant::now())? else {
        return Ok(false);
    };
    let outcome = core.engine.dispatch(batch);
    core.state.settle(outcome, rules, Instant::now())?;
    Ok(true)
}

/// Forced cycles until nothing is left to send or a cycle fails.
pub(crate) fn drain(mut cycle: impl FnMut() -> SinkResult<bool>) -> SinkResult<()> {
    while cycle()? {}
    Ok(())
}

struct InlineCore {
    state: SinkState,
    engine: FlushEngine,
}

enum Delivery {
    Inline(Mutex<InlineCore>),
    Background {
        state: Arc<Mutex<SinkState>>,
        sender: BackgroundSender,
    },
}

struct Inner {
    filter: ExcludeFilter,
    rules: Rules,
    mirror: LocalMirror,
    shutdown: ShutdownSignal,
    username: Option<String>,
    delivery: Delivery,
}

/// Process-wide log sink forwarding to a Telegram chat.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Inner>,
}

impl LogSink {
    /// Validate `config`, check the token with `getMe` and start the sink.
    pub fn connect(config: SinkConfig) -> SinkResult<Self> {
        let config = config.validate()?;
        let shutdown = ShutdownSignal::new();
        let channel = TelegramChannel::from_config(&config, shutdown.clone())?;
        let username = channel.bot_username()?;
        info!(bot = %username, chat_id = config.chat_id, "Using @{username}");

        Self::build(config, Box::new(channel), shutdown, Some(username))
    }

    /// Start the sink on a custom channel, skipping token validation.
    pub fn with_client(config: SinkConfig, client: Box<dyn ChannelClient>) -> SinkResult<Self> {
        let config = config.validate()?;
        Self::build(config, client, ShutdownSignal::new(), None)
    }

    fn build(
        config: SinkConfig,
        client: Box<dyn ChannelClient>,
        shutdown: ShutdownSignal,
        username: Option<String>,
    ) -> SinkResult<Self> {
        let mirror = LocalMirror::open(config.mirror_path.as_deref(), config.echo_stdout)?;
        let rules = Rules {
            policy: FlushPolicy {
                update_interval: config.update_interval,
                minimum_lines: config.minimum_lines,
            },
            limits: Limits {
                working_limit: config.working_limit(),
                pending_size: config.pending_size,
            },
            requeue_failed: config.requeue_failed,
        };
        let engine = FlushEngine::new(
            client,
            config.title.as_str(),
            rules.limits.working_limit,
            config.document_name(),
            config.document_caption.as_str(),
        );

        let delivery = match config.dispatch {
            DispatchMode::Inline => Delivery::Inline(Mutex::new(InlineCore {
                state: SinkState::new(),
                engine,
            })),
            DispatchMode::Background => {
                let state = Arc::new(Mutex::new(SinkState::new()));
                let sender =
                    BackgroundSender::spawn(state.clone(), engine, rules, config.queue_capacity)?;
                Delivery::Background { state, sender }
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                filter: ExcludeFilter::new(config.excluded_patterns),
                rules,
                mirror,
                shutdown,
                username,
                delivery,
            }),
        })
    }

    /// Buffer one write for forwarding, flushing if due.
    ///
    /// Delivery failures are logged, never returned.
    pub fn record(&self, text: &str) {
        if guard::is_dispatch_thread() || !self.inner.filter.admits(text) {
            return;
        }
        let rules = &self.inner.rules;

        match &self.inner.delivery {
            Delivery::Inline(core) => {
                let mut core = core.lock();
                if core.state.append(text, rules, Instant::now()) {
                    let _scope = DispatchScope::enter();
                    // Failures are logged by `settle`
                    let _ = run_cycle(&mut core, rules, Trigger::Scheduled);
                }
            }
            Delivery::Background { state, sender } => {
                let due = state.lock().append(text, rules, Instant::now());
                if due {
                    sender.wake();
                }
            }
        }
    }

    /// A writer that mirrors and forwards everything written to it.
    pub fn writer(&self) -> SinkWriter {
        SinkWriter { sink: self.clone() }
    }

    /// Run one flush cycle now, ignoring the interval and minimum lines.
    pub fn flush(&self) -> SinkResult<()> {
        match &self.inner.delivery {
            Delivery::Inline(core) => {
                let mut core = core.lock();
                let _scope = DispatchScope::enter();
                run_cycle(&mut core, &self.inner.rules, Trigger::Forced).map(|_| ())
            }
            Delivery::Background { sender, .. } => sender.flush(),
        }
    }

    /// Flush what is left, stop the sender and cancel in-flight requests.
    ///
    /// Idempotent; later calls return `Ok(())`.
    pub fn shutdown(&self) -> SinkResult<()> {
        let result = match &self.inner.delivery {
            Delivery::Inline(core) => {
                let mut core = core.lock();
                if core.state.lifecycle == Lifecycle::Closed {
                    return Ok(());
                }
                let _scope = DispatchScope::enter();
                let rules = &self.inner.rules;
                let result = drain(|| run_cycle(&mut core, rules, Trigger::Forced));
                core.state.lifecycle = Lifecycle::Closed;
                result
            }
            Delivery::Background { state, sender } => {
                if state.lock().lifecycle == Lifecycle::Closed {
                    return Ok(());
                }
                let result = sender.stop();
                state.lock().lifecycle = Lifecycle::Closed;
                result
            }
        };

        self.inner.shutdown.trigger();
        if let Err(e) = self.inner.mirror.flush() {
            warn!(error = %e, "failed to flush local log mirror");
        }
        result
    }

    /// Signal that cancels in-flight Telegram requests when triggered.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.inner.shutdown.clone()
    }

    /// Bytes buffered and not yet delivered.
    pub fn pending_bytes(&self) -> usize {
        match &self.inner.delivery {
            Delivery::Inline(core) => core.lock().state.accumulator.pending().len(),
            Delivery::Background { state, .. } => state.lock().accumulator.pending().len(),
        }
    }

    /// Username reported by `getMe`, when connected through [`LogSink::connect`].
    pub fn bot_username(&self) -> Option<&str> {
        self.inner.username.as_deref()
    }

    /// Whether the sink stopped forwarding after a fatal error or shutdown.
    pub fn is_halted(&self) -> bool {
        let lifecycle = match &self.inner.delivery {
            Delivery::Inline(core) => core.lock().state.lifecycle,
            Delivery::Background { state, .. } => state.lock().lifecycle,
        };
        lifecycle != Lifecycle::Running
    }
}

/// [`io::Write`] handle for a [`LogSink`].
///
/// Each write is mirrored first; only mirror I/O errors are reported.
pub struct SinkWriter {
    sink: LogSink,
}

impl io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.inner.mirror.write(buf)?;
        self.sink.record(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.inner.mirror.flush()
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer()
    }
}
