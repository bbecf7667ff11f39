// Calculator
// Runs a pipeline set against a dataset with memoized statistics and per-pipeline isolation

use crate::address::SchemeAddress;
use crate::dataset::Dataset;
use crate::error::PipelineError;
use crate::execution::cache::{StatisticCache, StatisticOutcome};
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::shape::{check_reduced, check_reduction, check_statistic, check_width, pairwise_matrix};
use crate::pipeline::{ComponentPipeline, PipelineSet, ResolvedScheme};
use crate::registry::{ComponentKind, ComponentOutput, ComponentResult, Implementation};
use crate::result::{PipelineOutcome, ResultAssembler, ResultRecord};

use nalgebra::DMatrix;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Configuration for a computation
#[derive(Debug, Clone, Default)]
pub struct CalculatorConfig {
    /// Maximum pipelines running at once (0 = unlimited, 1 = sequential)
    pub max_parallel_pipelines: usize,
    /// Per-pipeline timeout; expiry marks the pipeline unavailable
    pub pipeline_timeout: Option<Duration>,
}

impl CalculatorConfig {
    pub fn with_max_parallel_pipelines(mut self, max: usize) -> Self {
        self.max_parallel_pipelines = max;
        self
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_timeout = Some(timeout);
        self
    }
}

/// Pipeline executor
///
/// Holds no per-computation state; every `compute` call starts with an empty
/// statistic cache.
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    config: CalculatorConfig,
    event_tx: Option<ProgressSender>,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set calculator configuration
    pub fn with_config(mut self, config: CalculatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Run every pipeline and assemble the result record.
    ///
    /// Never fails: pipeline errors become NaN entries of full expected width.
    pub async fn compute(&self, pipelines: &PipelineSet, dataset: Arc<Dataset>) -> ResultRecord {
        let start = Instant::now();
        let total = pipelines.len();

        self.event_tx
            .send_event(ExecutionEvent::compute_started(dataset.name(), total));
        info!(
            dataset = dataset.name(),
            pipelines = total,
            observations = dataset.n_observations(),
            variables = dataset.n_variables(),
            "computing"
        );

        let cache = Arc::new(StatisticCache::new());
        let semaphore = (self.config.max_parallel_pipelines > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_parallel_pipelines)));

        let mut tasks = JoinSet::new();
        for (idx, pipeline) in pipelines.pipelines().iter().enumerate() {
            let pipeline = pipeline.clone();
            let dataset = Arc::clone(&dataset);
            let cache = Arc::clone(&cache);
            let semaphore = semaphore.clone();
            let event_tx = self.event_tx.clone();
            let timeout = self.config.pipeline_timeout;

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = run_tracked(&pipeline, dataset, cache, event_tx, timeout).await;
                (idx, outcome)
            });
        }

        let mut outcomes: Vec<Option<PipelineOutcome>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
                Err(e) => warn!(error = %e, "pipeline task aborted"),
            }
        }

        let record = ResultAssembler::assemble(dataset.name(), pipelines, outcomes);
        let failed = record.failures().count();
        let duration = start.elapsed();

        self.event_tx.send_event(ExecutionEvent::compute_completed(
            dataset.name(),
            total - failed,
            failed,
            duration,
        ));
        info!(
            dataset = dataset.name(),
            columns = record.len(),
            failed,
            statistics_computed = cache.computed(),
            elapsed_ms = duration.as_millis() as u64,
            "computation finished"
        );

        record
    }
}

/// Run one pipeline with events, logging and the optional timeout
async fn run_tracked(
    pipeline: &ComponentPipeline,
    dataset: Arc<Dataset>,
    cache: Arc<StatisticCache>,
    event_tx: Option<ProgressSender>,
    timeout: Option<Duration>,
) -> PipelineOutcome {
    let id = pipeline.column_base();
    let start = Instant::now();
    event_tx.send_event(ExecutionEvent::pipeline_started(&id));

    let run = run_pipeline(pipeline, dataset, cache, event_tx.clone());
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .unwrap_or(Err(PipelineError::Timeout(limit))),
        None => run.await,
    };

    match &outcome {
        Ok(values) => {
            debug!(pipeline = %id, width = values.len(), "pipeline completed");
            event_tx.send_event(ExecutionEvent::pipeline_completed(
                &id,
                values.len(),
                start.elapsed(),
            ));
        }
        Err(error) => {
            warn!(pipeline = %id, %error, "pipeline unavailable");
            event_tx.send_event(ExecutionEvent::pipeline_failed(&id, error.clone()));
        }
    }
    outcome
}

async fn run_pipeline(
    pipeline: &ComponentPipeline,
    dataset: Arc<Dataset>,
    cache: Arc<StatisticCache>,
    event_tx: Option<ProgressSender>,
) -> PipelineOutcome {
    match pipeline {
        ComponentPipeline::Reduction { statistic, reducer } => {
            let matrix = cache
                .get_or_compute(&statistic.address, || {
                    compute_statistic(Arc::clone(statistic), dataset, event_tx)
                })
                .await?;

            let scheme = Arc::clone(reducer);
            let input = Arc::clone(&matrix);
            let output = run_blocking(&reducer.address, move || call_reducer(&scheme, &input)).await?;

            let values = check_reduction(&reducer.address, &matrix, output)?;
            check_width(&reducer.address, reducer.expected_width(), values)
        }
        ComponentPipeline::Reduced { statistic } => {
            let scheme = Arc::clone(statistic);
            let output =
                run_blocking(&statistic.address, move || call_reduced(&scheme, dataset.data())).await?;

            let values = check_reduced(&statistic.address, output)?;
            check_width(&statistic.address, statistic.expected_width(), values)
        }
    }
}

async fn compute_statistic(
    statistic: Arc<ResolvedScheme>,
    dataset: Arc<Dataset>,
    event_tx: Option<ProgressSender>,
) -> StatisticOutcome {
    let start = Instant::now();
    let address = statistic.address.clone();

    let scheme = Arc::clone(&statistic);
    let outcome = run_blocking(&address, move || call_statistic(&scheme, dataset.data()))
        .await
        .and_then(|matrix| {
            check_statistic(&address, &matrix)?;
            Ok(Arc::new(matrix))
        });

    debug!(statistic = %address, success = outcome.is_ok(), "statistic computed");
    event_tx.send_event(ExecutionEvent::statistic_computed(
        address.to_string(),
        outcome.is_ok(),
        start.elapsed(),
    ));
    outcome
}

/// Run a component callable on the blocking pool, mapping errors and panics
async fn run_blocking<T, F>(component: &SchemeAddress, f: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> ComponentResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PipelineError::compute(component, e)),
        Err(_) => Err(PipelineError::Panicked {
            component: component.to_string(),
        }),
    }
}

fn call_statistic(scheme: &ResolvedScheme, data: &DMatrix<f64>) -> ComponentResult<DMatrix<f64>> {
    let component = &scheme.component;
    match (&component.implementation, &component.definition.kind) {
        (Implementation::Statistic(f), _) => f(data, &scheme.params),
        (Implementation::Pairwise(f), ComponentKind::PairwiseStatistic(spec)) => {
            pairwise_matrix(data, spec, f, &scheme.params)
        }
        _ => Err(format!("'{}' is not a statistic", component.path).into()),
    }
}

fn call_reducer(scheme: &ResolvedScheme, matrix: &DMatrix<f64>) -> ComponentResult<ComponentOutput> {
    match &scheme.component.implementation {
        Implementation::Reducer(f) => f(matrix, &scheme.params),
        _ => Err(format!("'{}' is not a reducer", scheme.component.path).into()),
    }
}

fn call_reduced(scheme: &ResolvedScheme, data: &DMatrix<f64>) -> ComponentResult<ComponentOutput> {
    match &scheme.component.implementation {
        Implementation::ReducedStatistic(f) => f(data, &scheme.params),
        _ => Err(format!("'{}' is not a reduced statistic", scheme.component.path).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::execution::events::progress_channel;
    use crate::filter::FilterSet;
    use crate::pipeline::build;
    use crate::registry::{ComponentDefinition, Params, Registry};
    use crate::result::PipelineStatus;
    use crate::test_support::{demo_registry, sample_dataset};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_registry(calls: Arc<AtomicUsize>) -> Registry {
        let mut registry = demo_registry();
        registry
            .register(
                "stats.Counted".parse().unwrap(),
                ComponentDefinition::new("Counted", "counted", ComponentKind::Statistic),
                Implementation::statistic(move |data: &DMatrix<f64>, _: &Params| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(data.transpose() * data)
                }),
            )
            .unwrap();
        registry
    }

    fn register_failing(registry: &mut Registry) {
        registry
            .register(
                "red.Broken".parse().unwrap(),
                ComponentDefinition::new("Broken", "broken", ComponentKind::Reducer),
                Implementation::reducer(|_: &DMatrix<f64>, _: &Params| Err("singular matrix".into())),
            )
            .unwrap();
        registry
            .register(
                "red.Panics".parse().unwrap(),
                ComponentDefinition::new("Panics", "panics", ComponentKind::Reducer),
                Implementation::reducer(|_: &DMatrix<f64>, _: &Params| -> ComponentResult<ComponentOutput> {
                    panic!("reducer bug")
                }),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_statistic_computed_once_for_two_reducers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(Arc::clone(&calls));

        let mut config = Config::new();
        config.add_statistic("stats", "Counted", "gram", Params::new()).unwrap();
        config.add_reducer("red", "Trace", "plain", Params::new(), None).unwrap();
        config
            .add_reducer("red", "Diag", "two", Params::new(), None)
            .unwrap();

        let set = build(&registry, &config).unwrap();
        let record = Calculator::new().compute(&set, sample_dataset()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(record.len(), 3);
        assert!(record.failures().next().is_none());
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let mut registry = demo_registry();
        register_failing(&mut registry);

        let mut config = Config::new();
        config.add_statistic("stats", "Cov", "a", Params::new()).unwrap();
        config.add_reducer("red", "Trace", "plain", Params::new(), None).unwrap();
        config.add_reducer("red", "Broken", "x", Params::new(), None).unwrap();
        config.add_reducer("red", "Panics", "x", Params::new(), None).unwrap();
        config
            .add_reducer("red", "Diag", "three", Params::new().with("num_values", 3), None)
            .unwrap();
        let set = build(&registry, &config).unwrap();

        let healthy = {
            let mut config = Config::new();
            config.add_statistic("stats", "Cov", "a", Params::new()).unwrap();
            config.add_reducer("red", "Trace", "plain", Params::new(), None).unwrap();
            config
                .add_reducer("red", "Diag", "three", Params::new().with("num_values", 3), None)
                .unwrap();
            let set = build(&registry, &config).unwrap();
            Calculator::new().compute(&set, sample_dataset()).await
        };

        let record = Calculator::new().compute(&set, sample_dataset()).await;

        assert_eq!(record.len(), 1 + 1 + 1 + 3);
        assert!(record.get("stats.Cov.a.red.Broken.x").unwrap().is_nan());
        assert!(record.get("stats.Cov.a.red.Panics.x").unwrap().is_nan());
        assert_eq!(
            record.get("stats.Cov.a.red.Trace.plain"),
            healthy.get("stats.Cov.a.red.Trace.plain")
        );
        for i in 1..=3 {
            let column = format!("stats.Cov.a.red.Diag.three.{}", i);
            assert_eq!(record.get(&column), healthy.get(&column));
        }

        let errors: Vec<&PipelineError> = record.failures().map(|(_, e)| e).collect();
        assert!(matches!(errors[0], PipelineError::Compute { message, .. } if message == "singular matrix"));
        assert!(matches!(errors[1], PipelineError::Panicked { .. }));
        assert_eq!(record.summary().count(PipelineStatus::Unavailable), 2);
    }

    #[tokio::test]
    async fn test_statistic_failure_fills_every_dependent_pipeline() {
        let mut registry = demo_registry();
        registry
            .register(
                "stats.Wide".parse().unwrap(),
                ComponentDefinition::new("Wide", "wide", ComponentKind::Statistic),
                Implementation::statistic(|data: &DMatrix<f64>, _: &Params| Ok(data.clone())),
            )
            .unwrap();

        let mut config = Config::new();
        config.add_statistic("stats", "Wide", "raw", Params::new()).unwrap();
        config.add_statistic("stats", "Cov", "a", Params::new()).unwrap();
        config.add_reducer("red", "Trace", "plain", Params::new(), None).unwrap();
        config.add_reducer("red", "Diag", "two", Params::new(), None).unwrap();
        let set = build(&registry, &config).unwrap();

        let record = Calculator::new().compute(&set, sample_dataset()).await;

        // The 4 x 3 sample is not square: both Wide pipelines fail with full width
        let wide: Vec<f64> = record.values()[..3].to_vec();
        assert!(wide.iter().all(|v| v.is_nan()));
        assert!(record.values()[3..].iter().all(|v| v.is_finite()));
        assert!(record
            .failures()
            .all(|(_, e)| matches!(e, PipelineError::ShapeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_reducer_shape_contract() {
        let mut registry = demo_registry();
        registry
            .register(
                "red.Everything".parse().unwrap(),
                ComponentDefinition::new("Everything", "everything", ComponentKind::Reducer)
                    .with_output(crate::registry::OutputArity::Dynamic),
                Implementation::reducer(|m: &DMatrix<f64>, _: &Params| {
                    Ok(ComponentOutput::Vector(m.iter().copied().collect()))
                }),
            )
            .unwrap();

        let mut config = Config::new();
        config.add_statistic("stats", "Cov", "a", Params::new()).unwrap();
        config.add_reducer("red", "Everything", "all", Params::new(), None).unwrap();
        let set = build(&registry, &config).unwrap();

        let record = Calculator::new().compute(&set, sample_dataset()).await;
        assert_eq!(record.len(), 1);
        assert!(matches!(
            record.failures().next(),
            Some((_, PipelineError::ShapeMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_deterministic_across_runs_and_parallelism() {
        let registry = demo_registry();
        let mut config = Config::new();
        config.add_statistic("stats", "Cov", "a", Params::new()).unwrap();
        config.add_statistic("stats", "Dist", "euclid", Params::new()).unwrap();
        config
            .add_reducer(
                "red",
                "Trace",
                "plain",
                Params::new(),
                Some(FilterSet::parse_all(["stats"]).unwrap()),
            )
            .unwrap();
        config.add_reducer("red", "Diag", "two", Params::new(), None).unwrap();
        config
            .add_reduced_statistic("rstats", "Means", "plain", Params::new())
            .unwrap();
        let set = build(&registry, &config).unwrap();

        let parallel = Calculator::new().compute(&set, sample_dataset()).await;
        let again = Calculator::new().compute(&set, sample_dataset()).await;
        let sequential = Calculator::new()
            .with_config(CalculatorConfig::default().with_max_parallel_pipelines(1))
            .compute(&set, sample_dataset())
            .await;

        assert_eq!(parallel, again);
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.len(), 2 + 2 * 2 + 3);
    }

    #[tokio::test]
    async fn test_timeout_marks_pipeline_unavailable() {
        let mut registry = demo_registry();
        registry
            .register(
                "rstats.Slow".parse().unwrap(),
                ComponentDefinition::new("Slow", "slow", ComponentKind::ReducedStatistic),
                Implementation::reduced_statistic(|_: &DMatrix<f64>, _: &Params| {
                    std::thread::sleep(Duration::from_millis(300));
                    Ok(ComponentOutput::Scalar(1.0))
                }),
            )
            .unwrap();

        let mut config = Config::new();
        config.add_reduced_statistic("rstats", "Slow", "x", Params::new()).unwrap();
        config.add_reduced_statistic("rstats", "Means", "plain", Params::new()).unwrap();
        let set = build(&registry, &config).unwrap();

        let record = Calculator::new()
            .with_config(CalculatorConfig::default().with_pipeline_timeout(Duration::from_millis(50)))
            .compute(&set, sample_dataset())
            .await;

        assert!(record.get("rstats.Slow.x").unwrap().is_nan());
        assert!(matches!(
            record.failures().next(),
            Some((_, PipelineError::Timeout(_)))
        ));
        assert!(record.get("rstats.Means.plain.1").unwrap().is_finite());
    }

    #[tokio::test]
    async fn test_timed_out_statistic_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = demo_registry();
        registry
            .register(
                "stats.Slow".parse().unwrap(),
                ComponentDefinition::new("Slow", "slow", ComponentKind::Statistic),
                Implementation::statistic(move |data: &DMatrix<f64>, _: &Params| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(200));
                    Ok(data.transpose() * data)
                }),
            )
            .unwrap();

        let mut config = Config::new();
        config.add_statistic("stats", "Slow", "x", Params::new()).unwrap();
        for scheme in ["a", "b", "c"] {
            config.add_reducer("red", "Trace", scheme, Params::new(), None).unwrap();
        }
        let set = build(&registry, &config).unwrap();

        let record = Calculator::new()
            .with_config(
                CalculatorConfig::default()
                    .with_max_parallel_pipelines(1)
                    .with_pipeline_timeout(Duration::from_millis(50)),
            )
            .compute(&set, sample_dataset())
            .await;

        assert_eq!(record.failures().count(), 3);
        assert!(record
            .failures()
            .all(|(_, e)| matches!(e, PipelineError::Timeout(_))));

        // Let the detached statistic finish before counting
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let registry = demo_registry();
        let mut config = Config::new();
        config.add_statistic("stats", "Cov", "a", Params::new()).unwrap();
        config.add_reducer("red", "Trace", "plain", Params::new(), None).unwrap();
        config.add_reducer("red", "Diag", "two", Params::new(), None).unwrap();
        let set = build(&registry, &config).unwrap();

        let (tx, mut rx) = progress_channel();
        Calculator::new()
            .with_progress(tx)
            .compute(&set, sample_dataset())
            .await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert!(matches!(events.first(), Some(ExecutionEvent::ComputeStarted { total_pipelines: 2, .. })));
        assert!(matches!(
            events.last(),
            Some(ExecutionEvent::ComputeCompleted { successful: 2, failed: 0, .. })
        ));
        let statistics = events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::StatisticComputed { .. }))
            .count();
        assert_eq!(statistics, 1);
        let completed = events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::PipelineCompleted { .. }))
            .count();
        assert_eq!(completed, 2);
    }
}
