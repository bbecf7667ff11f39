// Configuration parse errors
// Location, config path, source excerpt and suggestions for malformed configurations

use std::fmt;

/// Detailed parse error with location and context
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown)
    pub column: usize,
    /// Dotted location inside the configuration tree, e.g. `Reducers.red.Trace.filters`
    pub path: Option<String>,
    /// Surrounding source lines
    pub context: String,
    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
    /// The kind of error
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// YAML syntax error
    YamlSyntax,
    /// JSON syntax error
    JsonSyntax,
    /// Wrong structure (wrong types, missing sections)
    InvalidSchema,
    /// Unknown key
    UnknownField,
    /// Invalid value (bad name, bad parameter map)
    InvalidValue,
    /// Malformed filter pattern
    InvalidFilter,
    /// IO error (file not found, etc.)
    IoError,
    /// Validation error (semantic)
    ValidationError,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            path: None,
            context: String::new(),
            suggestion: None,
            kind: ParseErrorKind::InvalidSchema,
        }
    }

    /// Error found while walking the parsed tree, located by config path
    pub fn at(path: impl Into<String>, message: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self::new(message, 0, 0).with_path(path).with_kind(kind)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    fn with_suggestion_opt(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    /// Create context from source content
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        if self.line == 0 {
            return self;
        }

        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(context_lines + 1);
        let end = (self.line + context_lines).min(lines.len());

        let mut context = String::new();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            let prefix = if line_num == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", prefix, line_num, line));

            if line_num == self.line && self.column > 0 {
                let indicator = " ".repeat(self.column + 7) + "^";
                context.push_str(&format!("       | {}\n", indicator));
            }
        }

        self.context = context;
        self
    }

    /// Create from serde_yaml error
    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        let suggestion = suggest_syntax_fix(source, line);

        ParseError::new(err.to_string(), line, column)
            .with_kind(ParseErrorKind::YamlSyntax)
            .with_source_context(source, 2)
            .with_suggestion_opt(suggestion)
    }

    /// Create from serde_json error
    pub fn from_json_error(err: &serde_json::Error, source: &str) -> Self {
        ParseError::new(err.to_string(), err.line(), err.column())
            .with_kind(ParseErrorKind::JsonSyntax)
            .with_source_context(source, 2)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        if self.line > 0 {
            writeln!(f, "  --> line {}:{}", self.line, self.column)?;
        }
        if let Some(path) = &self.path {
            writeln!(f, "  --> at {}", path)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.context)?;
        }

        if let Some(suggestion) = &self.suggestion {
            writeln!(f)?;
            writeln!(f, "help: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Suggest fixes for common syntax mistakes
fn suggest_syntax_fix(source: &str, line: usize) -> Option<String> {
    let error_line = source.lines().nth(line.saturating_sub(1)).unwrap_or("");

    if error_line.starts_with('\t') {
        return Some(
            "YAML prefers spaces over tabs for indentation. Replace tabs with spaces.".to_string(),
        );
    }

    let trimmed = error_line.trim_start();
    if trimmed.starts_with('*') || trimmed.starts_with("- *") {
        return Some(
            "a leading '*' is a YAML alias; quote filter patterns such as \"*.Covariance\""
                .to_string(),
        );
    }

    None
}

/// Closest candidate within a small edit distance, used for "did you mean" hints
pub(crate) fn closest_match<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let lower = input.to_lowercase();
    candidates
        .iter()
        .map(|c| (*c, edit_distance(&lower, &c.to_lowercase())))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            let next = (prev + cost).min(row[j] + 1).min(row[j + 1] + 1);
            prev = row[j + 1];
            row[j + 1] = next;
        }
    }

    row[b.len()]
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;
