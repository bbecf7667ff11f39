// Pipeline Builder
// Resolves a Config against the registry and expands the filtered statistic x reducer product

use super::models::{BuildOptions, BuildWarning, ComponentPipeline, PipelineSet, ResolvedScheme};
use crate::address::SchemeAddress;
use crate::config::{ComponentDecl, Config, SchemeDecl, Section, SectionDecl};
use crate::error::{EngineError, EngineResult};
use crate::filter::FilterSet;
use crate::registry::{ComponentKind, OutputArity, Registry, MAX_OUTPUT_WIDTH};

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds ordered pipeline sets from configurations
pub struct PipelineBuilder<'a> {
    registry: &'a Registry,
    options: BuildOptions,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve a configuration into its ordered pipelines.
    ///
    /// Order: statistics in declaration order, reducers in declaration order
    /// within each statistic, then reduced statistics.
    pub fn build(&self, config: &Config) -> EngineResult<PipelineSet> {
        let mut warnings = Vec::new();
        let config = self.drop_unavailable(config, &mut warnings);
        config.validate()?;

        let statistics = self.resolve_section(&config.statistics, Section::Statistics)?;
        let reducers = self.resolve_section(&config.reducers, Section::Reducers)?;
        let reduced = self.resolve_section(&config.reduced_statistics, Section::ReducedStatistics)?;

        let addresses: Vec<&SchemeAddress> = statistics.iter().map(|(s, _)| &s.address).collect();
        let mut admitted = Vec::with_capacity(reducers.len());
        for (reducer, filters) in &reducers {
            admitted.push(self.admitted_by(reducer, filters, &addresses, &mut warnings)?);
        }

        let mut pipelines = Vec::new();
        for (i, (statistic, _)) in statistics.iter().enumerate() {
            for (j, (reducer, _)) in reducers.iter().enumerate() {
                if admitted[j][i] {
                    pipelines.push(ComponentPipeline::Reduction {
                        statistic: Arc::clone(statistic),
                        reducer: Arc::clone(reducer),
                    });
                }
            }
        }
        pipelines.extend(reduced.into_iter().map(|(statistic, _)| ComponentPipeline::Reduced { statistic }));

        for warning in &warnings {
            warn!("{}", warning);
        }
        info!(
            pipelines = pipelines.len(),
            statistics = statistics.len(),
            reducers = reducers.len(),
            warnings = warnings.len(),
            "built pipelines"
        );

        Ok(PipelineSet {
            pipelines,
            warnings,
            config,
        })
    }

    /// Copy of the config without components whose dependencies are missing
    fn drop_unavailable(&self, config: &Config, warnings: &mut Vec<BuildWarning>) -> Config {
        let mut resolved = config.clone();
        for section in Section::ALL {
            for component in config.section(section).components() {
                let missing = self.missing_dependencies(component);
                if missing.is_empty() {
                    continue;
                }
                for scheme in &component.schemes {
                    match section {
                        Section::Statistics => resolved.remove_statistic(&scheme.address),
                        Section::Reducers => resolved.remove_reducer(&scheme.address),
                        Section::ReducedStatistics => resolved.remove_reduced_statistic(&scheme.address),
                    };
                }
                warnings.push(BuildWarning::SkippedComponent {
                    section,
                    path: component.path.clone(),
                    missing,
                });
            }
        }
        resolved
    }

    fn missing_dependencies(&self, component: &ComponentDecl) -> Vec<String> {
        component
            .dependencies
            .iter()
            .filter(|d| !self.options.available_dependencies.contains(d.as_str()))
            .cloned()
            .collect()
    }

    /// Resolve every scheme of a section, keeping each scheme's filters
    fn resolve_section(
        &self,
        section_decl: &SectionDecl,
        section: Section,
    ) -> EngineResult<Vec<(Arc<ResolvedScheme>, FilterSet)>> {
        section_decl
            .schemes()
            .map(|(component, scheme)| -> EngineResult<_> {
                let resolved = self.resolve_scheme(scheme, section)?;
                Ok((Arc::new(resolved), component.filters_for(scheme).clone()))
            })
            .collect()
    }

    fn resolve_scheme(&self, scheme: &SchemeDecl, section: Section) -> EngineResult<ResolvedScheme> {
        let component = self.registry.resolve(scheme.address.path())?;
        let definition = &component.definition;

        let (fits, expected) = match section {
            Section::Statistics => (definition.kind.produces_matrix(), "statistic"),
            Section::Reducers => (definition.kind == ComponentKind::Reducer, "reducer"),
            Section::ReducedStatistics => {
                (definition.kind == ComponentKind::ReducedStatistic, "reduced statistic")
            }
        };
        if !fits {
            return Err(EngineError::ComponentKindMismatch {
                path: component.path.to_string(),
                expected: expected.to_string(),
                found: definition.kind.to_string(),
            });
        }

        let invalid = |reason: String| EngineError::InvalidParameters {
            address: scheme.address.to_string(),
            reason,
        };
        let params = definition.schema.resolve(&scheme.params).map_err(invalid)?;

        if let OutputArity::FromParam(name) = &definition.output {
            match definition.output.resolve(&params) {
                None => {
                    return Err(invalid(format!(
                        "parameter '{}' must be a non-negative integer or a list to size the output",
                        name
                    )))
                }
                Some(width) if width > MAX_OUTPUT_WIDTH => {
                    return Err(invalid(format!(
                        "parameter '{}' asks for {} output values, the limit is {}",
                        name, width, MAX_OUTPUT_WIDTH
                    )))
                }
                Some(_) => {}
            }
        }

        debug!(scheme = %scheme.address, "resolved scheme");
        Ok(ResolvedScheme {
            address: scheme.address.clone(),
            component: component.clone(),
            params,
        })
    }

    /// Admission mask of one reducer over the statistic addresses
    fn admitted_by(
        &self,
        reducer: &ResolvedScheme,
        filters: &FilterSet,
        statistics: &[&SchemeAddress],
        warnings: &mut Vec<BuildWarning>,
    ) -> EngineResult<Vec<bool>> {
        for pattern in filters.unmatched_patterns(statistics) {
            warnings.push(BuildWarning::UnmatchedFilter {
                reducer: reducer.address.clone(),
                pattern: pattern.to_string(),
            });
        }

        let mask: Vec<bool> = statistics.iter().map(|a| filters.admits(a)).collect();
        if !mask.contains(&true) {
            if self.options.strict_filters {
                return Err(EngineError::EmptyFilterResult {
                    reducer: reducer.address.to_string(),
                });
            }
            warnings.push(BuildWarning::EmptyFilterResult {
                reducer: reducer.address.clone(),
            });
        }
        Ok(mask)
    }
}

/// Build pipelines with default options
pub fn build(registry: &Registry, config: &Config) -> EngineResult<PipelineSet> {
    PipelineBuilder::new(registry).build(config)
}
