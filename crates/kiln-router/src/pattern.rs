//! Route path patterns.
//!
//! A pattern is a `/`-separated list of segments. Each segment is either a
//! literal token or a `{name}` placeholder, where `name` is an identifier
//! (`[A-Za-z_][A-Za-z0-9_]*`). Patterns are validated once, at registration.

use crate::RouteError;
use kiln_core::Params;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// One segment of a [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment exactly.
    Literal(String),
    /// Captures the request segment under this name.
    Param(String),
}

/// A parsed route pattern such as `/api/users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: SmallVec<[Segment; 4]>,
}

impl PathPattern {
    /// Parses and validates `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the pattern does not start with `/`, has a
    /// malformed placeholder or stray brace, or repeats a placeholder name.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash {
                pattern: pattern.to_string(),
            });
        }

        let mut segments = SmallVec::new();
        for segment in pattern.split('/') {
            let parsed = parse_segment(pattern, segment)?;
            if let Segment::Param(name) = &parsed {
                let duplicate = segments
                    .iter()
                    .any(|seen| matches!(seen, Segment::Param(other) if other == name));
                if duplicate {
                    return Err(RouteError::DuplicateParam {
                        pattern: pattern.to_string(),
                        name: name.clone(),
                    });
                }
            }
            segments.push(parsed);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Returns the pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed segments, including the empty one before the
    /// leading `/`.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the placeholder names in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Matches `path` against the pattern, capturing placeholder values.
    ///
    /// Segment counts must be equal. Placeholders accept any segment,
    /// including an empty one; literals must match exactly. A trailing slash
    /// therefore makes a different path.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let mut params = Params::new();
        let mut candidate = path.split('/');

        for segment in &self.segments {
            let value = candidate.next()?;
            match segment {
                Segment::Literal(literal) if literal == value => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params.push(name.as_str(), value),
            }
        }

        if candidate.next().is_some() {
            return None;
        }
        Some(params)
    }
}

fn parse_segment(pattern: &str, segment: &str) -> Result<Segment, RouteError> {
    let invalid = || RouteError::InvalidSegment {
        pattern: pattern.to_string(),
        segment: segment.to_string(),
    };

    if !segment.contains(['{', '}']) {
        return Ok(Segment::Literal(segment.to_string()));
    }

    let name = segment
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(invalid)?;
    if is_identifier(name) {
        Ok(Segment::Param(name.to_string()))
    } else {
        Err(invalid())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for PathPattern {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
