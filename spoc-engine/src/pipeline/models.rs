// Pipeline Data Models
// Resolved schemes, component pipelines, build warnings and build options

use crate::address::{ComponentPath, SchemeAddress};
use crate::config::{Config, Section};
use crate::registry::{Params, RegisteredComponent};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A configured scheme bound to its registered component
#[derive(Debug, Clone)]
pub struct ResolvedScheme {
    pub address: SchemeAddress,
    pub component: RegisteredComponent,
    /// Declared values plus schema defaults
    pub params: Params,
}

impl ResolvedScheme {
    /// Output width declared by the component for these parameters
    pub fn expected_width(&self) -> Option<usize> {
        self.component.definition.output.resolve(&self.params)
    }
}

/// Identity of a pipeline: its statistic address and, for reductions, the reducer address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId {
    pub statistic: SchemeAddress,
    pub reducer: Option<SchemeAddress>,
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reducer {
            Some(reducer) => write!(f, "{}.{}", self.statistic, reducer),
            None => write!(f, "{}", self.statistic),
        }
    }
}

/// One executable unit of work
#[derive(Debug, Clone)]
pub enum ComponentPipeline {
    /// Statistic matrix fed to a reducer
    Reduction {
        statistic: Arc<ResolvedScheme>,
        reducer: Arc<ResolvedScheme>,
    },
    /// Standalone reduced statistic
    Reduced { statistic: Arc<ResolvedScheme> },
}

impl ComponentPipeline {
    pub fn id(&self) -> PipelineId {
        match self {
            ComponentPipeline::Reduction { statistic, reducer } => PipelineId {
                statistic: statistic.address.clone(),
                reducer: Some(reducer.address.clone()),
            },
            ComponentPipeline::Reduced { statistic } => PipelineId {
                statistic: statistic.address.clone(),
                reducer: None,
            },
        }
    }

    pub fn statistic(&self) -> &Arc<ResolvedScheme> {
        match self {
            ComponentPipeline::Reduction { statistic, .. } => statistic,
            ComponentPipeline::Reduced { statistic } => statistic,
        }
    }

    pub fn reducer(&self) -> Option<&Arc<ResolvedScheme>> {
        match self {
            ComponentPipeline::Reduction { reducer, .. } => Some(reducer),
            ComponentPipeline::Reduced { .. } => None,
        }
    }

    /// Scheme that produces the final values
    pub fn output_scheme(&self) -> &Arc<ResolvedScheme> {
        self.reducer().unwrap_or_else(|| self.statistic())
    }

    /// Column identifier prefix: `statistic[.reducer]`
    pub fn column_base(&self) -> String {
        self.id().to_string()
    }

    /// Declared output width, if known before running
    pub fn expected_width(&self) -> Option<usize> {
        self.output_scheme().expected_width()
    }
}

/// Non-fatal problem found while building
#[derive(Debug, Clone, PartialEq)]
pub enum BuildWarning {
    /// Reducer scheme admits no statistic and yields no pipelines
    EmptyFilterResult { reducer: SchemeAddress },
    /// Filter pattern matches none of the declared statistics
    UnmatchedFilter {
        reducer: SchemeAddress,
        pattern: String,
    },
    /// Component left out because a dependency is unavailable
    SkippedComponent {
        section: Section,
        path: ComponentPath,
        missing: Vec<String>,
    },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::EmptyFilterResult { reducer } => {
                write!(f, "reducer scheme '{}' admits no statistic scheme", reducer)
            }
            BuildWarning::UnmatchedFilter { reducer, pattern } => write!(
                f,
                "filter '{}' on reducer scheme '{}' matches no declared statistic",
                pattern, reducer
            ),
            BuildWarning::SkippedComponent {
                section,
                path,
                missing,
            } => write!(
                f,
                "skipping {} component '{}': missing dependencies {}",
                section,
                path,
                missing.join(", ")
            ),
        }
    }
}

/// Options controlling pipeline resolution
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Treat a reducer admitting no statistic as an error
    pub strict_filters: bool,
    /// Dependencies components may require
    pub available_dependencies: BTreeSet<String>,
}

impl BuildOptions {
    pub fn with_strict_filters(mut self, strict: bool) -> Self {
        self.strict_filters = strict;
        self
    }

    pub fn with_available_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }
}

/// Ordered pipelines produced from one configuration
#[derive(Debug, Clone)]
pub struct PipelineSet {
    pub(crate) pipelines: Vec<ComponentPipeline>,
    pub(crate) warnings: Vec<BuildWarning>,
    pub(crate) config: Config,
}

impl PipelineSet {
    pub fn pipelines(&self) -> &[ComponentPipeline] {
        &self.pipelines
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    /// Configuration actually resolved, without skipped components
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn ids(&self) -> Vec<PipelineId> {
        self.pipelines.iter().map(ComponentPipeline::id).collect()
    }
}
