// Statistics Pipeline Engine
// Builds statistic/reducer pipelines from a declarative configuration and computes them on a dataset

pub mod address;
pub mod config;
pub mod dataset;
pub mod error;
pub mod execution;
pub mod filter;
pub mod pipeline;
pub mod registry;
pub mod result;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use error::{EngineError, EngineResult, PipelineError};

pub use address::{AddressError, ComponentPath, SchemeAddress};
pub use filter::{FilterError, FilterPattern, FilterSet};

// Re-export registry types
pub use registry::{
    ComponentDefinition, ComponentKind, ComponentOutput, ComponentResult, Implementation,
    OutputArity, PairwiseDim, PairwiseSpec, ParamSchema, ParamSpec, ParamType, Params, Registry,
};

// Re-export configuration types
pub use config::{Config, ConfigParser, ParseError, ParseErrorKind, Section};

// Re-export pipeline and execution types
pub use dataset::{Dataset, DimOrder};
pub use execution::{progress_channel, Calculator, CalculatorConfig, ExecutionEvent, ProgressSender};
pub use pipeline::{build, BuildOptions, BuildWarning, ComponentPipeline, PipelineBuilder, PipelineSet};
pub use result::{ComputationSummary, PipelineStatus, ResultAssembler, ResultRecord};
