//! Background thread running a consumer worker.

use std::any::Any;
use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::error;

use super::consumer::{ConsumerWorker, WorkerStats};
use super::handler::MessageHandler;
use crate::bus::Subscriber;

/// A consumer worker running on its own thread.
///
/// ## Example
///
/// ```ignore
/// let worker = WorkerThread::spawn(pipeline.prospect_worker());
///
/// // ... serve requests ...
///
/// let stats = worker.stop();
/// println!("acked {} messages", stats.acked);
/// ```
pub struct WorkerThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl WorkerThread {
    /// Start `worker` on a new thread.
    pub fn spawn<S, H>(worker: ConsumerWorker<S, H>) -> Self
    where
        S: Subscriber + 'static,
        H: MessageHandler + 'static,
    {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            worker.run_until(|| match stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => true,
                Err(TryRecvError::Empty) => false,
            })
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stop taking new messages and wait for the current round to finish.
    /// Returns the worker statistics, or empty statistics if the worker
    /// thread panicked.
    pub fn stop(mut self) -> WorkerStats {
        let _ = self.stop_tx.send(());
        let Some(handle) = self.handle.take() else {
            return WorkerStats::default();
        };
        match handle.join() {
            Ok(stats) => stats,
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "worker thread panicked");
                WorkerStats::default()
            }
        }
    }

    /// Signal the worker to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
