// Configuration Data Models
// Declared statistic, reducer and reduced-statistic schemes, kept in tree order

use crate::address::{ComponentPath, SchemeAddress};
use crate::error::{EngineError, EngineResult};
use crate::filter::FilterSet;
use crate::registry::{Params, Registry};

use std::fmt;

/// Top-level configuration section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Statistics,
    Reducers,
    ReducedStatistics,
}

impl Section {
    pub const ALL: [Section; 3] = [
        Section::Statistics,
        Section::Reducers,
        Section::ReducedStatistics,
    ];

    /// Key used in configuration files
    pub fn key(&self) -> &'static str {
        match self {
            Section::Statistics => "Statistics",
            Section::Reducers => "Reducers",
            Section::ReducedStatistics => "ReducedStatistics",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One named parameterization of a component
#[derive(Debug, Clone, PartialEq)]
pub struct SchemeDecl {
    pub address: SchemeAddress,
    /// Declared values only; defaults are filled in at build time
    pub params: Params,
    /// Per-scheme filters, overriding the component filters (reducers only)
    pub filters: Option<FilterSet>,
}

impl SchemeDecl {
    pub fn name(&self) -> &str {
        self.address.scheme()
    }
}

/// A component block with its schemes
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDecl {
    pub path: ComponentPath,
    pub dependencies: Vec<String>,
    /// Component-level filters (reducers only)
    pub filters: FilterSet,
    pub schemes: Vec<SchemeDecl>,
}

impl ComponentDecl {
    fn new(path: ComponentPath) -> Self {
        Self {
            path,
            dependencies: Vec::new(),
            filters: FilterSet::default(),
            schemes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.path.component()
    }

    /// Filters in force for one of this component's schemes
    pub fn filters_for<'a>(&'a self, scheme: &'a SchemeDecl) -> &'a FilterSet {
        scheme.filters.as_ref().unwrap_or(&self.filters)
    }
}

/// Components declared under one module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDecl {
    pub name: String,
    pub components: Vec<ComponentDecl>,
}

/// Modules of one section in first-appearance order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectionDecl {
    pub modules: Vec<ModuleDecl>,
}

impl SectionDecl {
    pub fn is_empty(&self) -> bool {
        self.modules.iter().all(|m| m.components.iter().all(|c| c.schemes.is_empty()))
    }

    /// Components in declaration order
    pub fn components(&self) -> impl Iterator<Item = &ComponentDecl> {
        self.modules.iter().flat_map(|m| m.components.iter())
    }

    /// Schemes in declaration order with their owning component
    pub fn schemes(&self) -> impl Iterator<Item = (&ComponentDecl, &SchemeDecl)> {
        self.components()
            .flat_map(|c| c.schemes.iter().map(move |s| (c, s)))
    }

    pub fn scheme_count(&self) -> usize {
        self.components().map(|c| c.schemes.len()).sum()
    }

    pub fn contains(&self, address: &SchemeAddress) -> bool {
        self.component(address.path())
            .is_some_and(|c| c.schemes.iter().any(|s| &s.address == address))
    }

    pub fn component(&self, path: &ComponentPath) -> Option<&ComponentDecl> {
        self.components().find(|c| &c.path == path)
    }

    fn component_mut(&mut self, path: &ComponentPath) -> Option<&mut ComponentDecl> {
        self.modules
            .iter_mut()
            .flat_map(|m| m.components.iter_mut())
            .find(|c| &c.path == path)
    }

    /// Component block for a path, appended in tree order when new
    fn entry(&mut self, path: &ComponentPath) -> &mut ComponentDecl {
        let module_idx = match self.modules.iter().position(|m| m.name == path.module()) {
            Some(idx) => idx,
            None => {
                self.modules.push(ModuleDecl {
                    name: path.module().to_string(),
                    components: Vec::new(),
                });
                self.modules.len() - 1
            }
        };

        let components = &mut self.modules[module_idx].components;
        let component_idx = match components.iter().position(|c| &c.path == path) {
            Some(idx) => idx,
            None => {
                components.push(ComponentDecl::new(path.clone()));
                components.len() - 1
            }
        };

        &mut components[component_idx]
    }

    fn insert(&mut self, scheme: SchemeDecl) {
        let path = scheme.address.path().clone();
        self.entry(&path).schemes.push(scheme);
    }

    fn remove(&mut self, address: &SchemeAddress) -> bool {
        let Some(component) = self.component_mut(address.path()) else {
            return false;
        };
        let before = component.schemes.len();
        component.schemes.retain(|s| &s.address != address);
        let removed = component.schemes.len() != before;
        self.prune();
        removed
    }

    /// Drop components without schemes and modules without components
    fn prune(&mut self) {
        for module in &mut self.modules {
            module.components.retain(|c| !c.schemes.is_empty());
        }
        self.modules.retain(|m| !m.components.is_empty());
    }
}

/// Declarative set of statistic, reducer and reduced-statistic schemes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub statistics: SectionDecl,
    pub reducers: SectionDecl,
    pub reduced_statistics: SectionDecl,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, section: Section) -> &SectionDecl {
        match section {
            Section::Statistics => &self.statistics,
            Section::Reducers => &self.reducers,
            Section::ReducedStatistics => &self.reduced_statistics,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut SectionDecl {
        match section {
            Section::Statistics => &mut self.statistics,
            Section::Reducers => &mut self.reducers,
            Section::ReducedStatistics => &mut self.reduced_statistics,
        }
    }

    /// Declare a statistic scheme
    pub fn add_statistic(
        &mut self,
        module: &str,
        component: &str,
        scheme: &str,
        params: Params,
    ) -> EngineResult<()> {
        let address = SchemeAddress::new(module, component, scheme)?;
        if self.statistics.contains(&address) {
            return Err(EngineError::DuplicateStatisticName {
                address: address.to_string(),
            });
        }
        self.statistics.insert(SchemeDecl {
            address,
            params,
            filters: None,
        });
        Ok(())
    }

    /// Declare a reducer scheme, optionally with its own filters
    pub fn add_reducer(
        &mut self,
        module: &str,
        component: &str,
        scheme: &str,
        params: Params,
        filters: Option<FilterSet>,
    ) -> EngineResult<()> {
        let address = SchemeAddress::new(module, component, scheme)?;
        if self.reducers.contains(&address) {
            return Err(EngineError::DuplicateReducerScheme {
                address: address.to_string(),
            });
        }
        self.reducers.insert(SchemeDecl {
            address,
            params,
            filters,
        });
        Ok(())
    }

    /// Declare a reduced statistic scheme
    pub fn add_reduced_statistic(
        &mut self,
        module: &str,
        component: &str,
        scheme: &str,
        params: Params,
    ) -> EngineResult<()> {
        let address = SchemeAddress::new(module, component, scheme)?;
        if self.reduced_statistics.contains(&address) {
            return Err(EngineError::DuplicateStatisticName {
                address: address.to_string(),
            });
        }
        self.reduced_statistics.insert(SchemeDecl {
            address,
            params,
            filters: None,
        });
        Ok(())
    }

    /// Replace the component-level filters of a declared reducer
    pub fn set_reducer_filters(&mut self, path: &ComponentPath, filters: FilterSet) -> EngineResult<()> {
        let component = self
            .reducers
            .component_mut(path)
            .ok_or_else(|| EngineError::UnknownComponent {
                path: path.to_string(),
            })?;
        component.filters = filters;
        Ok(())
    }

    /// Replace the dependency list of a declared component
    pub fn set_dependencies(
        &mut self,
        section: Section,
        path: &ComponentPath,
        dependencies: Vec<String>,
    ) -> EngineResult<()> {
        let component = self
            .section_mut(section)
            .component_mut(path)
            .ok_or_else(|| EngineError::UnknownComponent {
                path: path.to_string(),
            })?;
        component.dependencies = dependencies;
        Ok(())
    }

    pub fn remove_statistic(&mut self, address: &SchemeAddress) -> bool {
        self.statistics.remove(address)
    }

    pub fn remove_reducer(&mut self, address: &SchemeAddress) -> bool {
        self.reducers.remove(address)
    }

    pub fn remove_reduced_statistic(&mut self, address: &SchemeAddress) -> bool {
        self.reduced_statistics.remove(address)
    }

    /// Needs at least one (statistic, reducer) pair or one reduced statistic
    pub fn validate(&self) -> EngineResult<()> {
        let has_pairs = !self.statistics.is_empty() && !self.reducers.is_empty();
        if !has_pairs && self.reduced_statistics.is_empty() {
            return Err(EngineError::EmptyConfiguration);
        }
        Ok(())
    }

    /// Keep only statistics and reduced statistics carrying every keyword as a label.
    ///
    /// Reducers are kept as they are.
    pub fn select_by_labels<S: AsRef<str>>(&self, registry: &Registry, keywords: &[S]) -> EngineResult<Config> {
        let keywords: Vec<String> = keywords.iter().map(|k| k.as_ref().to_string()).collect();
        let mut selected = Config {
            reducers: self.reducers.clone(),
            ..Config::default()
        };

        for (source, target) in [
            (&self.statistics, &mut selected.statistics),
            (&self.reduced_statistics, &mut selected.reduced_statistics),
        ] {
            for component in source.components() {
                let definition = &registry.resolve(&component.path)?.definition;
                if keywords.iter().all(|k| definition.has_label(k)) {
                    target.entry(&component.path).clone_from(component);
                }
            }
        }

        if selected.statistics.is_empty() && selected.reduced_statistics.is_empty() {
            return Err(EngineError::NoLabelMatch { keywords });
        }
        Ok(selected)
    }
}
