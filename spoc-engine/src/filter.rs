// Filter Matcher
// Dotted-path patterns with per-segment wildcards and whole-pattern negation

use crate::address::{validate_segment, SchemeAddress, NEGATION, SEPARATOR, WILDCARD};

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of segments: module, component, scheme
const MAX_SEGMENTS: usize = 3;

/// Malformed filter pattern
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter '{pattern}': {reason}")]
pub struct FilterError {
    pub pattern: String,
    pub reason: String,
}

/// One segment of a filter pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Wildcard,
    Literal(String),
}

impl Segment {
    fn matches(&self, value: &str) -> bool {
        match self {
            Segment::Wildcard => true,
            Segment::Literal(literal) => literal == value,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Wildcard => f.write_str(WILDCARD),
            Segment::Literal(literal) => f.write_str(literal),
        }
    }
}

/// A parsed filter such as `stats.Cov.*` or `¬stats.Dist`
///
/// Patterns shorter than a full scheme address match every value of the
/// missing trailing segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPattern {
    negated: bool,
    segments: Vec<Segment>,
}

impl FilterPattern {
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let error = |reason: String| FilterError {
            pattern: text.to_string(),
            reason,
        };

        let trimmed = text.trim();
        let (negated, body) = match trimmed.strip_prefix(NEGATION) {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        if body.is_empty() {
            return Err(error("pattern is empty".to_string()));
        }

        let parts: Vec<&str> = body.split(SEPARATOR).collect();
        if parts.len() > MAX_SEGMENTS {
            return Err(error(format!(
                "expected at most {} segments, found {}",
                MAX_SEGMENTS,
                parts.len()
            )));
        }

        let segments = parts
            .into_iter()
            .map(|part| {
                if part == WILDCARD {
                    Ok(Segment::Wildcard)
                } else {
                    validate_segment(part).map(|_| Segment::Literal(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(error)?;

        Ok(Self { negated, segments })
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment-wise match, ignoring negation
    pub fn matches(&self, address: &SchemeAddress) -> bool {
        self.segments
            .iter()
            .zip(address.segments())
            .all(|(segment, value)| segment.matches(value))
    }
}

impl FromStr for FilterPattern {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FilterPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "{}", NEGATION)?;
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Filter list attached to a reducer scheme
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSet {
    patterns: Vec<FilterPattern>,
}

impl FilterSet {
    pub fn new(patterns: Vec<FilterPattern>) -> Self {
        Self { patterns }
    }

    /// Parse a list of pattern strings
    pub fn parse_all<I, S>(patterns: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .map(|p| FilterPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Parse a whitespace-separated pattern string
    pub fn parse_str(text: &str) -> Result<Self, FilterError> {
        Self::parse_all(text.split_whitespace())
    }

    pub fn patterns(&self) -> &[FilterPattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether the filter list admits a statistic scheme.
    ///
    /// Affirmative patterns combine with OR (vacuously true when there are
    /// none); any matching negative pattern excludes the address.
    pub fn admits(&self, address: &SchemeAddress) -> bool {
        let mut affirmative = self.patterns.iter().filter(|p| !p.negated).peekable();
        let aff_match = affirmative.peek().is_none() || affirmative.any(|p| p.matches(address));
        let neg_match = self
            .patterns
            .iter()
            .filter(|p| p.negated)
            .any(|p| p.matches(address));

        aff_match && !neg_match
    }

    /// Admitted addresses, preserving input order
    pub fn admitted<'a, I>(&self, addresses: I) -> Vec<&'a SchemeAddress>
    where
        I: IntoIterator<Item = &'a SchemeAddress>,
    {
        addresses.into_iter().filter(|a| self.admits(a)).collect()
    }

    /// Patterns that match none of the given addresses
    pub fn unmatched_patterns<'a>(&'a self, addresses: &[&SchemeAddress]) -> Vec<&'a FilterPattern> {
        self.patterns
            .iter()
            .filter(|p| !addresses.iter().any(|a| p.matches(a)))
            .collect()
    }

    /// Canonical pattern strings
    pub fn to_strings(&self) -> Vec<String> {
        self.patterns.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SchemeAddress {
        s.parse().unwrap()
    }

    fn filters(patterns: &[&str]) -> FilterSet {
        FilterSet::parse_all(patterns).unwrap()
    }

    #[test]
    fn test_parse_pattern() {
        let pattern = FilterPattern::parse("\u{00AC}stats.*.fast").unwrap();
        assert!(pattern.is_negated());
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("stats".to_string()),
                Segment::Wildcard,
                Segment::Literal("fast".to_string())
            ]
        );
        assert_eq!(pattern.to_string(), "\u{00AC}stats.*.fast");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(FilterPattern::parse("").is_err());
        assert!(FilterPattern::parse("\u{00AC}").is_err());
        assert!(FilterPattern::parse("a.b.c.d").is_err());
        assert!(FilterPattern::parse("a..c").is_err());
        assert!(FilterPattern::parse("\u{00AC}\u{00AC}a").is_err());
    }

    #[test]
    fn test_affirmative_and_negative() {
        let set = filters(&["m.A", "\u{00AC}m.B"]);
        let stats = [addr("m.A.x"), addr("m.B.x"), addr("m.C.x")];
        let admitted: Vec<String> = set.admitted(&stats).iter().map(|a| a.to_string()).collect();
        assert_eq!(admitted, vec!["m.A.x"]);
    }

    #[test]
    fn test_negative_only() {
        let set = filters(&["\u{00AC}m.B"]);
        let stats = [addr("m.A.x"), addr("m.B.x"), addr("m.C.x")];
        let admitted: Vec<String> = set.admitted(&stats).iter().map(|a| a.to_string()).collect();
        assert_eq!(admitted, vec!["m.A.x", "m.C.x"]);
    }

    #[test]
    fn test_wildcard_scheme() {
        let set = filters(&["mod.S.*"]);
        let stats = [addr("mod.S.x"), addr("mod.S.y"), addr("mod.T.z")];
        assert_eq!(set.admitted(&stats).len(), 2);
        assert!(!set.admits(&addr("mod.T.z")));
    }

    #[test]
    fn test_empty_set_admits_everything() {
        let set = FilterSet::default();
        assert!(set.admits(&addr("any.Thing.here")));
    }

    #[test]
    fn test_partial_and_case_sensitive() {
        let set = filters(&["stats"]);
        assert!(set.admits(&addr("stats.Cov.a")));
        assert!(!set.admits(&addr("Stats.Cov.a")));

        let set = filters(&["*.Cov"]);
        assert!(set.admits(&addr("other.Cov.b")));
        assert!(!set.admits(&addr("other.Covariance.b")));
    }

    #[test]
    fn test_unknown_pattern_never_matches() {
        let set = filters(&["gone.Stat", "m.A"]);
        let a = addr("m.A.x");
        let unmatched = set.unmatched_patterns(&[&a]);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].to_string(), "gone.Stat");
    }

    #[test]
    fn test_parse_whitespace_string() {
        let set = FilterSet::parse_str("m.A  \u{00AC}m.A.slow").unwrap();
        assert_eq!(set.to_strings(), vec!["m.A", "\u{00AC}m.A.slow"]);
        assert!(set.admits(&addr("m.A.fast")));
        assert!(!set.admits(&addr("m.A.slow")));
    }
}
