// Statistic Cache
// Write-once store of statistic matrices, shared by the pipelines of one computation

use crate::address::SchemeAddress;
use crate::error::PipelineError;

use nalgebra::DMatrix;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Cached result of one statistic scheme; failures are cached too
pub type StatisticOutcome = Result<Arc<DMatrix<f64>>, PipelineError>;

/// Per-computation memo keyed by statistic scheme address
///
/// Each statistic runs in its own detached task. Callers only wait on the
/// task's result, so a caller that gives up never cancels or restarts it.
#[derive(Debug, Default)]
pub struct StatisticCache {
    entries: Mutex<HashMap<SchemeAddress, watch::Receiver<Option<StatisticOutcome>>>>,
    computed: AtomicUsize,
}

impl StatisticCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the outcome for `address`, spawning `compute` if it has not started yet.
    ///
    /// Concurrent callers for the same address wait for the same task.
    pub async fn get_or_compute<F, Fut>(&self, address: &SchemeAddress, compute: F) -> StatisticOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StatisticOutcome> + Send + 'static,
    {
        let mut receiver = {
            let mut entries = self.entries.lock().await;
            match entries.get(address) {
                Some(receiver) => receiver.clone(),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    let task = compute();
                    self.computed.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        let _ = sender.send(Some(task.await));
                    });
                    entries.insert(address.clone(), receiver.clone());
                    receiver
                }
            }
        };

        // The sender is dropped without a value only if the task panicked
        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(PipelineError::Panicked {
                component: address.to_string(),
            })
        })
    }

    /// Number of statistic computations started
    pub fn computed(&self) -> usize {
        self.computed.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
