//! One-shot re-armable timer thread that drives a stream's ticks.
//!
//! The callback runs on a dedicated thread and returns the delay until it
//! wants to run again, or `None` to go idle. Control messages are handled
//! strictly between callbacks, in the order they were sent, so a disarm sent
//! while a tick is running takes effect as soon as that tick returns.
//!
//! Three ways to cancel, by how long the caller is willing to wait:
//! - [`TickTimer::disarm`]: no further ticks; returns immediately.
//! - [`TickTimer::disarm_sync`]: no further ticks, and any running tick has finished.
//! - [`TickTimer::disarm_and_join`]: as above, and the thread has exited.

use crate::error::{Result, VsndError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error};

enum TimerMsg {
    Arm(Duration),
    Disarm,
    Sync(Sender<()>),
    Shutdown,
}

/// Handle to the timer thread.
pub struct TickTimer {
    tx: Sender<TimerMsg>,
    thread: Option<JoinHandle<()>>,
}

impl TickTimer {
    /// Spawn the timer thread, initially disarmed.
    pub fn spawn<F>(name: String, on_tick: F) -> Result<Self>
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || run(rx, on_tick))
            .map_err(|e| VsndError::ResourceExhausted {
                message: format!("failed to spawn clock thread: {e}"),
            })?;
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// Schedule the next tick `delay` from now, replacing any pending one.
    pub fn arm(&self, delay: Duration) {
        self.send(TimerMsg::Arm(delay));
    }

    /// Cancel pending ticks without waiting for a running one.
    pub fn disarm(&self) {
        self.send(TimerMsg::Disarm);
    }

    /// Cancel pending ticks and wait until no tick is running.
    pub fn disarm_sync(&self) {
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send(TimerMsg::Sync(ack_tx)).is_ok() && ack_rx.recv().is_err() {
            debug!("clock thread exited before acknowledging disarm");
        }
    }

    /// Cancel, wait for a running tick, and join the thread. Idempotent.
    pub fn disarm_and_join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.send(TimerMsg::Shutdown);
        if thread.join().is_err() {
            error!("clock thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn send(&self, msg: TimerMsg) {
        if self.tx.send(msg).is_err() {
            debug!("clock thread already exited");
        }
    }
}

impl Drop for TickTimer {
    fn drop(&mut self) {
        self.disarm_and_join();
    }
}

fn run<F>(rx: Receiver<TimerMsg>, mut on_tick: F)
where
    F: FnMut() -> Option<Duration>,
{
    let mut deadline: Option<Instant> = None;
    loop {
        let msg = match deadline {
            Some(at) => rx.recv_deadline(at),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match msg {
            Ok(TimerMsg::Arm(delay)) => deadline = Some(Instant::now() + delay),
            Ok(TimerMsg::Disarm) => deadline = None,
            Ok(TimerMsg::Sync(ack)) => {
                deadline = None;
                if ack.send(()).is_err() {
                    debug!("disarm acknowledgement dropped");
                }
            }
            Ok(TimerMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                deadline = on_tick().map(|delay| Instant::now() + delay);
            }
        }
    }
}
