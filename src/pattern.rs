//! Path patterns: parsing, constraint checks, matching and rendering.
//!
//! A pattern is a list of `/`-separated segments. Each segment is either a
//! literal (`users`) or a named parameter (`{id}`). Empty segments are
//! dropped on both sides, so `/users/`, `users` and `//users` are the same
//! path.
//!
//! Parameter values are percent-decoded when matched and percent-encoded
//! when rendered, so a value containing `/` survives a round trip.

use std::collections::HashMap;
use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use regex::Regex;

use crate::error::ConfigError;

/// Bytes escaped inside a rendered path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ').add(b'"').add(b'#').add(b'%').add(b'/').add(b'<')
    .add(b'>').add(b'?').add(b'`').add(b'{').add(b'}');

/// What a parameter segment accepts. Every kind also requires a non-empty token.
#[derive(Clone, Debug)]
pub enum Constraint {
    Any,
    /// `^[0-9]+$`
    Numeric,
    /// `^[a-z0-9-]+$`
    Slug,
    /// `^[a-zA-Z]+$`
    Alpha,
    /// User-supplied regex, anchored at both ends.
    Pattern(Regex),
}

impl Constraint {
    pub(crate) fn pattern(param: &str, regex: &str) -> Result<Self, ConfigError> {
        Regex::new(&format!("^(?:{regex})$"))
            .map(Self::Pattern)
            .map_err(|source| ConfigError::InvalidConstraint { param: param.to_owned(), source })
    }

    pub fn accepts(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        match self {
            Self::Any => true,
            Self::Numeric => token.bytes().all(|b| b.is_ascii_digit()),
            Self::Slug => token.bytes().all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-')),
            Self::Alpha => token.bytes().all(|b| b.is_ascii_alphabetic()),
            Self::Pattern(re) => re.is_match(token),
        }
    }
}

#[derive(Clone, Debug)]
enum Segment {
    Literal(String),
    Param { name: String, constraint: Constraint },
}

/// A parsed route pattern such as `/users/{id}/posts`.
#[derive(Clone, Debug)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub(crate) fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidPattern { pattern: raw.to_owned(), reason };
        let mut segments: Vec<Segment> = Vec::new();

        for token in raw.split('/').filter(|s| !s.is_empty()) {
            let Some(inner) = token.strip_prefix('{') else {
                if token.contains(['{', '}']) {
                    return Err(invalid("braces must wrap a whole segment"));
                }
                segments.push(Segment::Literal(token.to_owned()));
                continue;
            };
            let name = inner.strip_suffix('}').ok_or_else(|| invalid("unclosed parameter"))?;
            if !is_identifier(name) {
                return Err(invalid("parameter names must be identifiers"));
            }
            let taken = segments.iter().any(|s| matches!(s, Segment::Param { name: n, .. } if n == name));
            if taken {
                return Err(invalid("duplicate parameter name"));
            }
            segments.push(Segment::Param { name: name.to_owned(), constraint: Constraint::Any });
        }

        Ok(Self { raw: render_raw(&segments), segments })
    }

    /// Normalised text form, always starting with `/`.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parameter names in path order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub(crate) fn constrain(&mut self, param: &str, constraint: Constraint) -> Result<(), ConfigError> {
        let slot = self.segments.iter_mut().find_map(|s| match s {
            Segment::Param { name, constraint: slot } if name == param => Some(slot),
            _ => None,
        });
        match slot {
            Some(slot) => {
                *slot = constraint;
                Ok(())
            }
            None => Err(ConfigError::UnknownParameter {
                pattern: self.raw.clone(),
                param: param.to_owned(),
            }),
        }
    }

    /// Segment-by-segment match on decoded segments. Literals compare
    /// case-sensitively; a segment that is not valid UTF-8 once decoded
    /// never matches.
    pub(crate) fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut tokens = path.split('/').filter(|s| !s.is_empty());
        let mut params = HashMap::new();

        for segment in &self.segments {
            let token = percent_decode_str(tokens.next()?).decode_utf8().ok()?;
            match segment {
                Segment::Literal(lit) if *lit == token => {}
                Segment::Literal(_) => return None,
                Segment::Param { name, constraint } => {
                    if !constraint.accepts(&token) {
                        return None;
                    }
                    params.insert(name.clone(), token.into_owned());
                }
            }
        }

        tokens.next().is_none().then_some(params)
    }

    /// Substitutes `values` into the pattern. Returns the first placeholder
    /// without a value as the error.
    pub(crate) fn render(&self, values: &[(String, String)]) -> Result<String, String> {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param { name, .. } => {
                    let value = values.iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v)
                        .ok_or_else(|| name.clone())?;
                    out.extend(utf8_percent_encode(value, SEGMENT));
                }
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Joins a group prefix and a path into one normalised path.
pub(crate) fn join(prefix: &str, path: &str) -> String {
    let parts: Vec<&str> = prefix.split('/')
        .chain(path.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", parts.join("/"))
}

fn render_raw(segments: &[Segment]) -> String {
    let parts: Vec<String> = segments.iter()
        .map(|s| match s {
            Segment::Literal(lit) => lit.clone(),
            Segment::Param { name, .. } => format!("{{{name}}}"),
        })
        .collect();
    format!("/{}", parts.join("/"))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_slashes() {
        assert_eq!(Pattern::parse("users//{id}/").unwrap().as_str(), "/users/{id}");
        assert_eq!(Pattern::parse("").unwrap().as_str(), "/");
        assert_eq!(join("/v1/", "api"), "/v1/api");
        assert_eq!(join("", "/"), "/");
    }

    #[test]
    fn rejects_malformed_parameters() {
        for bad in ["/users/{id", "/users/{}", "/users/{1d}", "/a{b}", "/{id}/{id}", "/x/{id?}"] {
            assert!(
                matches!(Pattern::parse(bad), Err(ConfigError::InvalidPattern { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn binds_parameters() {
        let p = Pattern::parse("/users/{id}/posts/{post}").unwrap();
        let params = p.matches("/users/42/posts/hello").unwrap();
        assert_eq!(params["id"], "42");
        assert_eq!(params["post"], "hello");
        assert!(p.matches("/users/42/posts").is_none());
        assert!(p.matches("/users/42/posts/hello/extra").is_none());
        assert!(p.matches("/Users/42/posts/hello").is_none());
    }

    #[test]
    fn decodes_segments_before_matching() {
        let p = Pattern::parse("/files/{name}").unwrap();
        assert_eq!(p.matches("/files/a%2Fb").unwrap()["name"], "a/b");
        assert_eq!(p.matches("/files/caf%C3%A9%20au%20lait").unwrap()["name"], "café au lait");
        assert!(p.matches("/files/%FF").is_none());
    }

    #[test]
    fn builtin_constraints() {
        assert!(Constraint::Numeric.accepts("0042"));
        assert!(!Constraint::Numeric.accepts("4a"));
        assert!(Constraint::Slug.accepts("hello-world-2"));
        assert!(!Constraint::Slug.accepts("Hello"));
        assert!(Constraint::Alpha.accepts("Hello"));
        assert!(!Constraint::Alpha.accepts("hello1"));
        assert!(!Constraint::Any.accepts(""));
    }

    #[test]
    fn custom_pattern_is_anchored() {
        let c = Constraint::pattern("code", "[A-Z]{3}").unwrap();
        assert!(c.accepts("EUR"));
        assert!(!c.accepts("EURO"));
        assert!(Constraint::pattern("code", "[").is_err());
    }

    #[test]
    fn constrain_unknown_parameter_fails() {
        let mut p = Pattern::parse("/users/{id}").unwrap();
        assert!(matches!(
            p.constrain("slug", Constraint::Slug),
            Err(ConfigError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn renders_values() {
        let p = Pattern::parse("/users/{id}/edit").unwrap();
        let url = p.render(&[("id".to_owned(), "42".to_owned())]).unwrap();
        assert_eq!(url, "/users/42/edit");
        assert_eq!(p.render(&[]).unwrap_err(), "id");
    }

    #[test]
    fn renders_encoded_values_that_match_back() {
        let p = Pattern::parse("/files/{name}").unwrap();
        let url = p.render(&[("name".to_owned(), "a/b c?%".to_owned())]).unwrap();
        assert_eq!(url, "/files/a%2Fb%20c%3F%25");
        assert_eq!(p.matches(&url).unwrap()["name"], "a/b c?%");
    }
}
