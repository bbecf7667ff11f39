// Execution Module
// Runs built pipelines against a dataset: statistic memoization, shape checks and progress events

pub mod cache;
pub mod calculator;
pub mod events;
pub mod shape;

// Re-export key types
pub use cache::{StatisticCache, StatisticOutcome};
pub use calculator::{Calculator, CalculatorConfig};
pub use events::{progress_channel, EventSender, ExecutionEvent, ProgressReceiver, ProgressSender};
