// Execution Events
// Progress reporting and event types for a computation

use crate::error::PipelineError;

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted while computing a dataset
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Computation started
    ComputeStarted {
        dataset: String,
        total_pipelines: usize,
    },

    /// A statistic matrix was computed (once per scheme)
    StatisticComputed {
        statistic: String,
        success: bool,
        duration: Duration,
    },

    /// Pipeline execution started
    PipelineStarted { pipeline: String },

    /// Pipeline produced its values
    PipelineCompleted {
        pipeline: String,
        width: usize,
        duration: Duration,
    },

    /// Pipeline failed; its columns hold the unavailable sentinel
    PipelineFailed {
        pipeline: String,
        error: PipelineError,
    },

    /// Computation completed
    ComputeCompleted {
        dataset: String,
        successful: usize,
        failed: usize,
        duration: Duration,
    },
}

impl ExecutionEvent {
    pub fn compute_started(dataset: impl Into<String>, total_pipelines: usize) -> Self {
        Self::ComputeStarted {
            dataset: dataset.into(),
            total_pipelines,
        }
    }

    pub fn statistic_computed(statistic: impl Into<String>, success: bool, duration: Duration) -> Self {
        Self::StatisticComputed {
            statistic: statistic.into(),
            success,
            duration,
        }
    }

    pub fn pipeline_started(pipeline: impl Into<String>) -> Self {
        Self::PipelineStarted {
            pipeline: pipeline.into(),
        }
    }

    pub fn pipeline_completed(pipeline: impl Into<String>, width: usize, duration: Duration) -> Self {
        Self::PipelineCompleted {
            pipeline: pipeline.into(),
            width,
            duration,
        }
    }

    pub fn pipeline_failed(pipeline: impl Into<String>, error: PipelineError) -> Self {
        Self::PipelineFailed {
            pipeline: pipeline.into(),
            error,
        }
    }

    pub fn compute_completed(
        dataset: impl Into<String>,
        successful: usize,
        failed: usize,
        duration: Duration,
    ) -> Self {
        Self::ComputeCompleted {
            dataset: dataset.into(),
            successful,
            failed,
            duration,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
