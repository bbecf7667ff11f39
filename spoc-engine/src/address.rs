// Component Addresses
// Dotted names for registered components (module.Component) and configured schemes

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between address segments
pub const SEPARATOR: char = '.';

/// Prefix negating a filter pattern
pub const NEGATION: char = '\u{00AC}';

/// Per-segment wildcard in filter patterns
pub const WILDCARD: &str = "*";

/// Malformed component path or scheme address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid address '{address}': {reason}")]
pub struct AddressError {
    pub address: String,
    pub reason: String,
}

impl AddressError {
    fn new(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

/// Check that a single name is usable as an address segment
pub fn validate_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("segments must not be empty".to_string());
    }
    if segment.contains(SEPARATOR) {
        return Err(format!("'{}' must not contain '{}'", segment, SEPARATOR));
    }
    if segment == WILDCARD {
        return Err("'*' is reserved for filter patterns".to_string());
    }
    if segment.starts_with(NEGATION) {
        return Err(format!("'{}' must not start with '{}'", segment, NEGATION));
    }
    if segment.chars().any(char::is_whitespace) {
        return Err(format!("'{}' must not contain whitespace", segment));
    }
    Ok(())
}

fn split_exact<const N: usize>(text: &str) -> Result<[&str; N], AddressError> {
    let parts: Vec<&str> = text.split(SEPARATOR).collect();
    let parts: [&str; N] = parts.try_into().map_err(|parts: Vec<&str>| {
        AddressError::new(
            text,
            format!("expected {} segments, found {}", N, parts.len()),
        )
    })?;

    for part in parts {
        validate_segment(part).map_err(|reason| AddressError::new(text, reason))?;
    }

    Ok(parts)
}

/// Registry key of a component: `module.Component`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentPath {
    module: String,
    component: String,
}

impl ComponentPath {
    pub fn new(module: impl Into<String>, component: impl Into<String>) -> Result<Self, AddressError> {
        let module = module.into();
        let component = component.into();
        let text = format!("{}{}{}", module, SEPARATOR, component);

        for segment in [&module, &component] {
            validate_segment(segment).map_err(|reason| AddressError::new(&text, reason))?;
        }

        Ok(Self { module, component })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Address of a named scheme of this component
    pub fn scheme(&self, scheme: impl Into<String>) -> Result<SchemeAddress, AddressError> {
        SchemeAddress::new(self.module.clone(), self.component.clone(), scheme)
    }
}

impl FromStr for ComponentPath {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [module, component] = split_exact::<2>(s)?;
        Ok(Self {
            module: module.to_string(),
            component: component.to_string(),
        })
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.module, SEPARATOR, self.component)
    }
}

/// Unique address of a configured scheme: `module.Component.scheme`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemeAddress {
    path: ComponentPath,
    scheme: String,
}

impl SchemeAddress {
    pub fn new(
        module: impl Into<String>,
        component: impl Into<String>,
        scheme: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let path = ComponentPath::new(module, component)?;
        let scheme = scheme.into();
        validate_segment(&scheme)
            .map_err(|reason| AddressError::new(format!("{}{}{}", path, SEPARATOR, scheme), reason))?;
        Ok(Self { path, scheme })
    }

    pub fn path(&self) -> &ComponentPath {
        &self.path
    }

    pub fn module(&self) -> &str {
        self.path.module()
    }

    pub fn component(&self) -> &str {
        self.path.component()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Segments in matching order: module, component, scheme
    pub fn segments(&self) -> [&str; 3] {
        [self.module(), self.component(), self.scheme()]
    }
}

impl FromStr for SchemeAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [module, component, scheme] = split_exact::<3>(s)?;
        Ok(Self {
            path: ComponentPath {
                module: module.to_string(),
                component: component.to_string(),
            },
            scheme: scheme.to_string(),
        })
    }
}

impl fmt::Display for SchemeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.path, SEPARATOR, self.scheme)
    }
}
