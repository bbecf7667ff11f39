// Parameter Schemas
// Declared parameters of a component and the resolved values handed to its callable

use serde_yaml::{Mapping, Value};
use std::fmt;

/// Accepted type of a scheme parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Integer,
    /// Any number; integers are accepted
    Float,
    String,
    List,
    Any,
}

impl ParamType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::Bool => value.is_bool(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Float => value.is_number(),
            ParamType::String => value.is_string(),
            ParamType::List => value.is_sequence(),
            ParamType::Any => true,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Bool => "bool",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::String => "string",
            ParamType::List => "list",
            ParamType::Any => "any",
        };
        f.write_str(name)
    }
}

/// A single declared parameter; required when it has no default
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Some(default.into()),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Ordered set of parameters a component accepts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: ParamSpec) -> Self {
        self.params.retain(|p| p.name != spec.name);
        self.params.push(spec);
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Validate declared values and fill in defaults.
    ///
    /// Resolved parameters follow schema order. The error string lists every
    /// problem found, not only the first.
    pub fn resolve(&self, declared: &Params) -> Result<Params, String> {
        let mut problems = Vec::new();

        for (name, _) in declared.iter() {
            if self.get(name).is_none() {
                let known: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
                if known.is_empty() {
                    problems.push(format!("unknown parameter '{}' (component takes none)", name));
                } else {
                    problems.push(format!(
                        "unknown parameter '{}' (expected one of: {})",
                        name,
                        known.join(", ")
                    ));
                }
            }
        }

        let mut resolved = Params::new();
        let mut missing = Vec::new();

        for spec in &self.params {
            match declared.get(&spec.name) {
                Some(value) if spec.ty.accepts(value) => {
                    resolved.insert(spec.name.clone(), value.clone());
                }
                Some(value) => problems.push(format!(
                    "parameter '{}' expects {}, found {}",
                    spec.name,
                    spec.ty,
                    describe_value(value)
                )),
                None => match &spec.default {
                    Some(default) => resolved.insert(spec.name.clone(), default.clone()),
                    None => missing.push(spec.name.as_str()),
                },
            }
        }

        if !missing.is_empty() {
            problems.push(format!("missing required parameters: {}", missing.join(", ")));
        }

        if problems.is_empty() {
            Ok(resolved)
        } else {
            Err(problems.join("; "))
        }
    }
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Named parameter values of one scheme, in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params(Mapping);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a generic mapping; every key must be a string
    pub fn from_mapping(mapping: Mapping) -> Result<Self, String> {
        if let Some(key) = mapping.keys().find(|k| !k.is_string()) {
            return Err(format!(
                "parameter names must be strings, found {}",
                describe_value(key)
            ));
        }
        Ok(Self(mapping))
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(Value::String(name.into()), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_usize(&self, name: &str) -> Option<usize> {
        self.get(name)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Numeric list parameter; `None` if any element is not a number
    pub fn get_f64_list(&self, name: &str) -> Option<Vec<f64>> {
        self.get(name)?
            .as_sequence()?
            .iter()
            .map(Value::as_f64)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter_map(|(k, v)| k.as_str().map(|name| (name, v)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Mapping(self.0.clone())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eigen_schema() -> ParamSchema {
        ParamSchema::new()
            .with(ParamSpec::optional("num_values", ParamType::Integer, 2))
            .with(ParamSpec::required("method", ParamType::String))
            .with(ParamSpec::optional("scale", ParamType::Float, 1.0))
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let declared = Params::new().with("method", "qr");
        let resolved = eigen_schema().resolve(&declared).unwrap();

        assert_eq!(resolved.get_usize("num_values"), Some(2));
        assert_eq!(resolved.get_str("method"), Some("qr"));
        assert_eq!(resolved.get_f64("scale"), Some(1.0));
        let names: Vec<&str> = resolved.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["num_values", "method", "scale"]);
    }

    #[test]
    fn test_resolve_reports_missing_and_unknown() {
        let declared = Params::new().with("bogus", true);
        let err = eigen_schema().resolve(&declared).unwrap_err();

        assert!(err.contains("unknown parameter 'bogus'"));
        assert!(err.contains("missing required parameters: method"));
    }

    #[test]
    fn test_resolve_checks_types() {
        let declared = Params::new().with("method", "qr").with("num_values", 2.5);
        let err = eigen_schema().resolve(&declared).unwrap_err();
        assert!(err.contains("parameter 'num_values' expects integer, found float"));

        // Integers are valid floats
        let declared = Params::new().with("method", "qr").with("scale", 3);
        assert!(eigen_schema().resolve(&declared).is_ok());
    }

    #[test]
    fn test_params_scalar_access() {
        let params = Params::new().with("lag", -3).with("centre", true);
        assert_eq!(params.get_i64("lag"), Some(-3));
        assert_eq!(params.get_usize("lag"), None);
        assert_eq!(params.get_bool("centre"), Some(true));
        assert_eq!(params.get_bool("lag"), None);

        let schema = eigen_schema();
        let required: Vec<&str> = schema
            .params()
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(required, vec!["method"]);
    }

    #[test]
    fn test_params_list_access() {
        let params = Params::new().with("moments", vec![1, 2, 3]);
        assert_eq!(params.get_f64_list("moments"), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(params.get_f64_list("missing"), None);
    }

    #[test]
    fn test_params_from_mapping_rejects_non_string_keys() {
        let mut mapping = Mapping::new();
        mapping.insert(Value::from(1), Value::from(true));
        assert!(Params::from_mapping(mapping).is_err());
    }
}
