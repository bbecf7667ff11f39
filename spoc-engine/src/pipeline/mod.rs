// Pipeline Module
// Component pipelines and the builder that derives them from a configuration

pub mod builder;
pub mod models;

pub use builder::{build, PipelineBuilder};
pub use models::{
    BuildOptions, BuildWarning, ComponentPipeline, PipelineId, PipelineSet, ResolvedScheme,
};
