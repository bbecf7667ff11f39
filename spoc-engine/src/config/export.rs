// Configuration Export
// Writes a Config back to the same tree shape the parser reads

use super::models::{ComponentDecl, Config, Section, SectionDecl};
use super::parser::mapping_of;
use crate::error::{EngineError, EngineResult};
use crate::filter::FilterSet;

use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

fn filters_value(filters: &FilterSet) -> Value {
    Value::Sequence(filters.to_strings().into_iter().map(Value::String).collect())
}

fn component_value(component: &ComponentDecl) -> Value {
    let mut block = Mapping::new();

    if !component.dependencies.is_empty() {
        block.insert(
            Value::from("dependencies"),
            Value::Sequence(component.dependencies.iter().cloned().map(Value::String).collect()),
        );
    }

    if !component.filters.is_empty() {
        block.insert(Value::from("filters"), filters_value(&component.filters));
    }

    let overrides = mapping_of(component.schemes.iter().filter_map(|s| {
        s.filters
            .as_ref()
            .map(|f| (s.name().to_string(), filters_value(f)))
    }));
    if !overrides.is_empty() {
        block.insert(Value::from("scheme_filters"), Value::Mapping(overrides));
    }

    let schemes = mapping_of(
        component
            .schemes
            .iter()
            .map(|s| (s.name().to_string(), s.params.to_value())),
    );
    block.insert(Value::from("schemes"), Value::Mapping(schemes));

    Value::Mapping(block)
}

fn section_value(section: &SectionDecl) -> Value {
    Value::Mapping(mapping_of(section.modules.iter().map(|module| {
        let components = mapping_of(
            module
                .components
                .iter()
                .map(|c| (c.name().to_string(), component_value(c))),
        );
        (module.name.clone(), Value::Mapping(components))
    })))
}

impl Config {
    /// Configuration tree; empty sections are omitted
    pub fn to_value(&self) -> Value {
        Value::Mapping(mapping_of(
            Section::ALL
                .into_iter()
                .filter(|s| !self.section(*s).is_empty())
                .map(|s| (s.key(), section_value(self.section(s)))),
        ))
    }

    pub fn to_yaml(&self) -> EngineResult<String> {
        serde_yaml::to_string(&self.to_value()).map_err(|e| EngineError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(&self.to_value())
            .map_err(|e| EngineError::Serialization(e.to_string()))
    }

    /// Write to a file; `.json` files get JSON, anything else YAML
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        let path = path.as_ref();
        let json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let content = if json { self.to_json()? } else { self.to_yaml()? };
        fs::write(path, content)?;
        debug!(file = %path.display(), "wrote configuration");
        Ok(())
    }
}
