//! Dedicated sender thread for [`DispatchMode::Background`](crate::DispatchMode).
//!
//! Producers only touch the buffer lock and wake the sender. The sender owns
//! the flush engine, so exactly one batch is in flight at a time.

use crate::engine::FlushEngine;
use crate::error::{SinkError, SinkResult};
use crate::guard;
use crate::sink::{drain, Rules, SinkState, Trigger};
use parking_lot::Mutex;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, warn};

const THREAD_NAME: &str = "tglog-sender";

enum Signal {
    /// A scheduled flush may be due.
    Wake,
    /// Run one forced cycle and report.
    Flush(SyncSender<SinkResult<()>>),
    /// Drain the buffer, report and exit.
    Stop(SyncSender<SinkResult<()>>),
}

pub(crate) struct BackgroundSender {
    sender: SyncSender<Signal>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundSender {
    pub fn spawn(
        state: Arc<Mutex<SinkState>>,
        engine: FlushEngine,
        rules: Rules,
        capacity: usize,
    ) -> SinkResult<Self> {
        let (sender, receiver) = sync_channel(capacity.max(1));
        let worker = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_sender(receiver, state, engine, rules))?;

        Ok(Self {
            sender,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Never blocks; a full queue already holds a pending wake-up.
    pub fn wake(&self) {
        let _ = self.sender.try_send(Signal::Wake);
    }

    pub fn flush(&self) -> SinkResult<()> {
        let (reply, response) = sync_channel(1);
        self.sender
            .send(Signal::Flush(reply))
            .map_err(|_| SinkError::Halted)?;
        response.recv().map_err(|_| SinkError::Halted)?
    }

    /// Drain the buffer and join the sender thread.
    pub fn stop(&self) -> SinkResult<()> {
        let (reply, response) = sync_channel(1);
        let result = match self.sender.send(Signal::Stop(reply)) {
            Ok(()) => response.recv().map_err(|_| SinkError::Halted)?,
            Err(_) => Err(SinkError::Halted),
        };

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("log sender thread panicked");
            }
        }
        result
    }
}

/// One flush cycle. The buffer lock is released while the batch is in flight.
fn run_cycle(
    state: &Mutex<SinkState>,
    engine: &mut FlushEngine,
    rules: &Rules,
    trigger: Trigger,
) -> SinkResult<bool> {
    let batch = state.lock().next_batch(trigger, rules, Instant::now())?;
    let Some(batch) = batch else {
        return Ok(false);
    };
    let outcome = engine.dispatch(batch);
    state.lock().settle(outcome, rules, Instant::now())?;
    Ok(true)
}

fn run_sender(
    receiver: Receiver<Signal>,
    state: Arc<Mutex<SinkState>>,
    mut engine: FlushEngine,
    rules: Rules,
) {
    guard::mark_current_thread();
    debug!("log sender started");

    loop {
        match receiver.recv_timeout(rules.policy.update_interval) {
            Ok(Signal::Wake) | Err(RecvTimeoutError::Timeout) => {
                // Failures are logged by `settle`
                let _ = run_cycle(&state, &mut engine, &rules, Trigger::Scheduled);
            }
            Ok(Signal::Flush(reply)) => {
                let result = run_cycle(&state, &mut engine, &rules, Trigger::Forced).map(|_| ());
                let _ = reply.send(result);
            }
            Ok(Signal::Stop(reply)) => {
                let result = drain(|| run_cycle(&state, &mut engine, &rules, Trigger::Forced));
                let _ = reply.send(result);
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = drain(|| run_cycle(&state, &mut engine, &rules, Trigger::Forced));
                break;
            }
        }
    }

    debug!("log sender stopped");
}
