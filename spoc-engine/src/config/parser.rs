// Configuration Parser
// Walks a generic YAML/JSON value tree into a Config, reporting errors by config path

use super::error::{closest_match, ParseError, ParseErrorKind, ParseResult};
use super::models::{Config, Section};
use crate::address::{validate_segment, ComponentPath};
use crate::filter::FilterSet;
use crate::registry::Params;

use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

const SCHEMES: &str = "schemes";
const FILTERS: &str = "filters";
/// Older spelling of `filters`
const FILTERS_LEGACY: &str = "Statistics";
const SCHEME_FILTERS: &str = "scheme_filters";
const DEPENDENCIES: &str = "dependencies";

/// Format-agnostic configuration parser
pub struct ConfigParser;

impl ConfigParser {
    /// Parse configuration from a YAML string
    pub fn parse_yaml(content: &str) -> ParseResult<Config> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|e| ParseError::from_yaml_error(&e, content))?;
        Self::from_value(&value)
    }

    /// Parse configuration from a JSON string
    pub fn parse_json(content: &str) -> ParseResult<Config> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| ParseError::from_json_error(&e, content))?;
        Self::from_value(&value)
    }

    /// Parse configuration from a file; `.json` files are read as JSON, anything else as YAML
    pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<Config> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ParseError::new(format!("failed to read {}: {}", path.display(), e), 0, 0)
                .with_kind(ParseErrorKind::IoError)
        })?;

        debug!(file = %path.display(), "parsing configuration file");
        if is_json(path) {
            Self::parse_json(&content)
        } else {
            Self::parse_yaml(&content)
        }
    }

    /// Build a configuration from an in-memory value tree
    pub fn from_value(value: &Value) -> ParseResult<Config> {
        let root = match value {
            Value::Null => return Ok(Config::default()),
            Value::Mapping(map) => map,
            _ => {
                return Err(ParseError::at(
                    "<root>",
                    "configuration must be a mapping of sections",
                    ParseErrorKind::InvalidSchema,
                ))
            }
        };

        let section_keys: Vec<&str> = Section::ALL.iter().map(Section::key).collect();
        for key in root.keys() {
            let name = key_str(key, "<root>")?;
            if !section_keys.contains(&name) {
                return Err(unknown_key("<root>", name, &section_keys));
            }
        }

        let mut config = Config::default();
        for section in Section::ALL {
            if let Some(modules) = root.get(section.key()) {
                Self::parse_section(&mut config, section, modules)?;
            }
        }

        debug!(
            statistics = config.statistics.scheme_count(),
            reducers = config.reducers.scheme_count(),
            reduced_statistics = config.reduced_statistics.scheme_count(),
            "parsed configuration"
        );
        Ok(config)
    }

    fn parse_section(config: &mut Config, section: Section, value: &Value) -> ParseResult<()> {
        let at = section.key();
        for (module, components) in entries(value, at)? {
            let module = segment(module, at)?;
            let at = format!("{}.{}", at, module);

            for (component, block) in entries(components, &at)? {
                let component = segment(component, &at)?;
                let at = format!("{}.{}", at, component);
                let path = ComponentPath::new(module, component)
                    .map_err(|e| ParseError::at(&at, e.to_string(), ParseErrorKind::InvalidValue))?;
                Self::parse_component(config, section, &path, block, &at)?;
            }
        }
        Ok(())
    }

    fn parse_component(
        config: &mut Config,
        section: Section,
        path: &ComponentPath,
        block: &Value,
        at: &str,
    ) -> ParseResult<()> {
        let block = block.as_mapping().ok_or_else(|| {
            ParseError::at(at, "component block must be a mapping", ParseErrorKind::InvalidSchema)
                .with_suggestion("declare named parameterizations under 'schemes:'")
        })?;

        let allowed: &[&str] = match section {
            Section::Reducers => &[SCHEMES, FILTERS, FILTERS_LEGACY, SCHEME_FILTERS, DEPENDENCIES],
            _ => &[SCHEMES, DEPENDENCIES],
        };
        for key in block.keys() {
            let name = key_str(key, at)?;
            if !allowed.contains(&name) {
                let mut err = unknown_key(at, name, allowed);
                if section != Section::Reducers && [FILTERS, SCHEME_FILTERS].contains(&name) {
                    err = err.with_suggestion("filters can only be attached to reducers");
                }
                return Err(err);
            }
        }

        let schemes = block.get(SCHEMES).ok_or_else(|| {
            ParseError::at(at, "missing 'schemes'", ParseErrorKind::InvalidSchema)
                .with_suggestion("add 'schemes:' with at least one named scheme")
        })?;
        let schemes_at = format!("{}.{}", at, SCHEMES);
        let declared = entries(schemes, &schemes_at)?;
        if declared.is_empty() {
            return Err(ParseError::at(
                &schemes_at,
                "a component needs at least one scheme",
                ParseErrorKind::InvalidSchema,
            ));
        }

        let mut scheme_filters = match block.get(SCHEME_FILTERS) {
            Some(value) => parse_scheme_filters(value, &format!("{}.{}", at, SCHEME_FILTERS))?,
            None => Vec::new(),
        };

        for (scheme, params) in declared {
            let scheme = segment(scheme, &schemes_at)?;
            let scheme_at = format!("{}.{}", schemes_at, scheme);
            let params = parse_params(params, &scheme_at)?;

            let added = match section {
                Section::Statistics => {
                    config.add_statistic(path.module(), path.component(), scheme, params)
                }
                Section::Reducers => {
                    let idx = scheme_filters.iter().position(|(name, _)| name == scheme);
                    let filters = idx.map(|idx| scheme_filters.remove(idx).1);
                    config.add_reducer(path.module(), path.component(), scheme, params, filters)
                }
                Section::ReducedStatistics => {
                    config.add_reduced_statistic(path.module(), path.component(), scheme, params)
                }
            };
            added.map_err(|e| ParseError::at(&scheme_at, e.to_string(), ParseErrorKind::ValidationError))?;
        }

        if let Some((name, _)) = scheme_filters.first() {
            return Err(ParseError::at(
                format!("{}.{}.{}", at, SCHEME_FILTERS, name),
                format!("filters given for undeclared scheme '{}'", name),
                ParseErrorKind::ValidationError,
            ));
        }

        if section == Section::Reducers {
            let filters = match (block.get(FILTERS), block.get(FILTERS_LEGACY)) {
                (Some(_), Some(_)) => {
                    return Err(ParseError::at(
                        at,
                        format!("both '{}' and '{}' are given", FILTERS, FILTERS_LEGACY),
                        ParseErrorKind::InvalidSchema,
                    )
                    .with_suggestion(format!("keep only '{}'", FILTERS)))
                }
                (Some(value), None) => parse_filters(value, &format!("{}.{}", at, FILTERS))?,
                (None, Some(value)) => parse_filters(value, &format!("{}.{}", at, FILTERS_LEGACY))?,
                (None, None) => FilterSet::default(),
            };
            config
                .set_reducer_filters(path, filters)
                .map_err(|e| ParseError::at(at, e.to_string(), ParseErrorKind::ValidationError))?;
        }

        if let Some(value) = block.get(DEPENDENCIES) {
            let dependencies = string_list(value, &format!("{}.{}", at, DEPENDENCIES))?;
            config
                .set_dependencies(section, path, dependencies)
                .map_err(|e| ParseError::at(at, e.to_string(), ParseErrorKind::ValidationError))?;
        }

        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Entries of a mapping; null counts as empty
fn entries<'a>(value: &'a Value, at: &str) -> ParseResult<Vec<(&'a Value, &'a Value)>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Mapping(map) => Ok(map.iter().collect()),
        other => Err(ParseError::at(
            at,
            format!("expected a mapping, found {}", type_name(other)),
            ParseErrorKind::InvalidSchema,
        )),
    }
}

fn key_str<'a>(key: &'a Value, at: &str) -> ParseResult<&'a str> {
    key.as_str().ok_or_else(|| {
        ParseError::at(
            at,
            format!("keys must be strings, found {}", type_name(key)),
            ParseErrorKind::InvalidSchema,
        )
    })
}

/// A module, component or scheme name
fn segment<'a>(key: &'a Value, at: &str) -> ParseResult<&'a str> {
    let name = key_str(key, at)?;
    validate_segment(name).map_err(|reason| {
        ParseError::at(
            format!("{}.{}", at, name),
            format!("invalid name: {}", reason),
            ParseErrorKind::InvalidValue,
        )
    })?;
    Ok(name)
}

fn unknown_key(at: &str, name: &str, allowed: &[&str]) -> ParseError {
    let err = ParseError::at(
        at,
        format!("unknown field '{}', expected one of: {}", name, allowed.join(", ")),
        ParseErrorKind::UnknownField,
    );
    match closest_match(name, allowed) {
        Some(candidate) => err.with_suggestion(format!("did you mean '{}'?", candidate)),
        None => err,
    }
}

fn parse_params(value: &Value, at: &str) -> ParseResult<Params> {
    match value {
        Value::Null => Ok(Params::new()),
        Value::Mapping(map) => Params::from_mapping(map.clone())
            .map_err(|reason| ParseError::at(at, reason, ParseErrorKind::InvalidValue)),
        other => Err(ParseError::at(
            at,
            format!("scheme parameters must be a mapping, found {}", type_name(other)),
            ParseErrorKind::InvalidValue,
        )
        .with_suggestion("use '{}' for a scheme without parameters")),
    }
}

/// A list of strings, or a single whitespace-separated string
fn string_list(value: &Value, at: &str) -> ParseResult<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ParseError::at(
                        at,
                        format!("expected a string, found {}", type_name(item)),
                        ParseErrorKind::InvalidValue,
                    )
                })
            })
            .collect(),
        other => Err(ParseError::at(
            at,
            format!("expected a list of strings, found {}", type_name(other)),
            ParseErrorKind::InvalidValue,
        )),
    }
}

fn parse_filters(value: &Value, at: &str) -> ParseResult<FilterSet> {
    let patterns = string_list(value, at)?;
    FilterSet::parse_all(&patterns)
        .map_err(|e| ParseError::at(at, e.to_string(), ParseErrorKind::InvalidFilter))
}

fn parse_scheme_filters(value: &Value, at: &str) -> ParseResult<Vec<(String, FilterSet)>> {
    entries(value, at)?
        .into_iter()
        .map(|(scheme, filters)| {
            let scheme = key_str(scheme, at)?;
            let filters = parse_filters(filters, &format!("{}.{}", at, scheme))?;
            Ok((scheme.to_string(), filters))
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Convert a mapping key list into a mapping for tests and export
pub(crate) fn mapping_of<I, K>(entries: I) -> Mapping
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries
        .into_iter()
        .map(|(k, v)| (Value::String(k.into()), v))
        .collect()
}
