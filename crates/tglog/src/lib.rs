//! Forward application logs to a Telegram chat.
//!
//! Writes are buffered and delivered as a single live message that is
//! edited as new lines arrive, instead of one message per line. When the
//! message fills up a new one is started, and a large backlog is uploaded as
//! a file attachment.
//!
//! ```no_run
//! use tglog::{LogSink, SinkConfig};
//! use tracing_subscriber::fmt;
//!
//! let sink = LogSink::connect(SinkConfig::new("123:token", -100123)).unwrap();
//! fmt().with_writer(sink.clone()).with_ansi(false).init();
//!
//! tracing::info!("service started");
//! sink.shutdown().unwrap();
//! ```

mod background;
pub mod backoff;
pub mod buffer;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod format;
mod guard;
pub mod mirror;
pub mod scheduler;
mod sink;
pub mod split;

pub use channel::{ChannelClient, MessageId, TelegramChannel};
pub use config::{DispatchMode, SinkConfig};
pub use error::{SinkError, SinkResult};
pub use sink::{LogSink, SinkWriter};
pub use telegram_bot_api::ShutdownSignal;
