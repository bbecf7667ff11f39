// Registry Module
// Explicit registration table mapping component paths to definitions and callables

pub mod definition;
pub mod schema;

// Re-export key types
pub use definition::{
    ComponentDefinition, ComponentError, ComponentKind, ComponentOutput, ComponentResult,
    Implementation, OutputArity, PairwiseDim, PairwiseSpec, MAX_OUTPUT_WIDTH,
};
pub use schema::{ParamSchema, ParamSpec, ParamType, Params};

use crate::address::ComponentPath;
use crate::error::{EngineError, EngineResult};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// A definition together with its callable
#[derive(Debug, Clone)]
pub struct RegisteredComponent {
    pub path: ComponentPath,
    pub definition: Arc<ComponentDefinition>,
    pub implementation: Implementation,
}

/// Registry of available components, built once at startup
#[derive(Debug, Clone, Default)]
pub struct Registry {
    components: BTreeMap<ComponentPath, RegisteredComponent>,
    /// identifier -> owning path
    identifiers: HashMap<String, ComponentPath>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component.
    ///
    /// Registering the same path again with an equal definition is a no-op;
    /// a different definition is rejected. Identifiers are unique across paths.
    pub fn register(
        &mut self,
        path: ComponentPath,
        definition: ComponentDefinition,
        implementation: Implementation,
    ) -> EngineResult<()> {
        if self.is_duplicate(&path, &definition)? {
            return Ok(());
        }
        if let Some(existing) = self.identifiers.get(&definition.identifier) {
            return Err(EngineError::DuplicateIdentifier {
                identifier: definition.identifier.clone(),
                path: path.to_string(),
                existing: existing.to_string(),
            });
        }
        Self::validate(&path, &definition, &implementation)?;

        debug!(component = %path, kind = %definition.kind, "registered component");
        self.identifiers
            .insert(definition.identifier.clone(), path.clone());
        self.components.insert(
            path.clone(),
            RegisteredComponent {
                path,
                definition: Arc::new(definition),
                implementation,
            },
        );
        Ok(())
    }

    /// Register a batch; any failure leaves the registry untouched
    pub fn register_many<I>(&mut self, entries: I) -> EngineResult<()>
    where
        I: IntoIterator<Item = (ComponentPath, ComponentDefinition, Implementation)>,
    {
        let mut staged = self.clone();
        for (path, definition, implementation) in entries {
            staged.register(path, definition, implementation)?;
        }
        *self = staged;
        Ok(())
    }

    /// Look up a component, failing if it is not registered
    pub fn resolve(&self, path: &ComponentPath) -> EngineResult<&RegisteredComponent> {
        self.components
            .get(path)
            .ok_or_else(|| EngineError::UnknownComponent {
                path: path.to_string(),
            })
    }

    pub fn get(&self, path: &ComponentPath) -> Option<&RegisteredComponent> {
        self.components.get(path)
    }

    pub fn contains(&self, path: &ComponentPath) -> bool {
        self.components.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Registered paths in sorted order
    pub fn paths(&self) -> impl Iterator<Item = &ComponentPath> {
        self.components.keys()
    }

    /// Components carrying every given label
    pub fn with_labels<'a>(&'a self, labels: &'a [String]) -> impl Iterator<Item = &'a RegisteredComponent> {
        self.components
            .values()
            .filter(move |c| labels.iter().all(|l| c.definition.has_label(l)))
    }

    fn is_duplicate(&self, path: &ComponentPath, definition: &ComponentDefinition) -> EngineResult<bool> {
        match self.components.get(path) {
            Some(existing) if existing.definition.as_ref() == definition => Ok(true),
            Some(_) => Err(EngineError::DuplicateRegistration {
                path: path.to_string(),
            }),
            None => Ok(false),
        }
    }

    fn validate(
        path: &ComponentPath,
        definition: &ComponentDefinition,
        implementation: &Implementation,
    ) -> EngineResult<()> {
        let invalid = |reason: String| EngineError::InvalidRegistration {
            path: path.to_string(),
            reason,
        };

        if !implementation.matches(&definition.kind) {
            return Err(invalid(format!(
                "callable {:?} does not fit a {}",
                implementation, definition.kind
            )));
        }

        if definition.kind.produces_matrix() && definition.output != OutputArity::Scalar {
            return Err(invalid(
                "statistics produce square matrices and cannot declare an output arity".to_string(),
            ));
        }

        if let OutputArity::Vector(n) = definition.output {
            if n == 0 || n > MAX_OUTPUT_WIDTH {
                return Err(invalid(format!(
                    "declared output width {} is outside 1..={}",
                    n, MAX_OUTPUT_WIDTH
                )));
            }
        }

        if let OutputArity::FromParam(name) = &definition.output {
            if definition.schema.get(name).is_none() {
                return Err(invalid(format!(
                    "output arity refers to undeclared parameter '{}'",
                    name
                )));
            }
        }

        if let Some(spec) = definition
            .schema
            .params()
            .iter()
            .find(|spec| matches!(&spec.default, Some(d) if !spec.ty.accepts(d)))
        {
            return Err(invalid(format!(
                "default of parameter '{}' is not a valid {}",
                spec.name, spec.ty
            )));
        }

        Ok(())
    }
}
