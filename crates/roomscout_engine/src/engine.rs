use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use engine_logging::engine_error;

use crate::pipeline::{Pipeline, PipelineError};
use crate::sink::ChannelEventSink;
use crate::{PipelineEvent, RunSummary};

/// A pipeline run on its own thread with its own tokio runtime.
///
/// Progress arrives as [`PipelineEvent`]s; [`PipelineHandle::join`] returns the outcome.
pub struct PipelineHandle {
    event_rx: mpsc::Receiver<PipelineEvent>,
    worker: thread::JoinHandle<Result<RunSummary, HandleError>>,
}

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("could not start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("pipeline thread panicked")]
    Panicked,
}

impl PipelineHandle {
    pub fn spawn(mut pipeline: Pipeline) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .inspect_err(|err| engine_error!("tokio runtime: {err}"))?;
            let sink = ChannelEventSink::new(event_tx);
            let summary = runtime.block_on(pipeline.run(&sink))?;
            Ok(summary)
        });
        Self { event_rx, worker }
    }

    pub fn try_recv(&self) -> Option<PipelineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Next event, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PipelineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Waits for the run; events not yet received are returned alongside.
    pub fn join(self) -> (Result<RunSummary, HandleError>, Vec<PipelineEvent>) {
        let outcome = self.worker.join().unwrap_or(Err(HandleError::Panicked));
        let remaining = self.event_rx.try_iter().collect();
        (outcome, remaining)
    }
}
