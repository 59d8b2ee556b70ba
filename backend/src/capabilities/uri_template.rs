//! Minimal URI templates (`scheme://{name}`) for parameterized resources.
//!
//! Only simple string expansion is supported. A variable never matches an empty
//! string or a `/`.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriTemplateError {
    #[error("Unclosed variable in template: {0}")]
    Unclosed(String),

    #[error("Invalid variable name: {0:?}")]
    InvalidVariable(String),

    #[error("Adjacent variables are ambiguous in template: {0}")]
    AdjacentVariables(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self, UriTemplateError> {
        let mut segments = Vec::new();
        let mut rest = template;

        while !rest.is_empty() {
            match rest.find('{') {
                Some(0) => {
                    let close = rest
                        .find('}')
                        .ok_or_else(|| UriTemplateError::Unclosed(template.to_string()))?;
                    let name = rest[1..close].trim();
                    if name.is_empty()
                        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    {
                        return Err(UriTemplateError::InvalidVariable(name.to_string()));
                    }
                    if matches!(segments.last(), Some(Segment::Variable(_))) {
                        return Err(UriTemplateError::AdjacentVariables(template.to_string()));
                    }
                    segments.push(Segment::Variable(name.to_string()));
                    rest = &rest[close + 1..];
                }
                Some(open) => {
                    segments.push(Segment::Literal(rest[..open].to_string()));
                    rest = &rest[open..];
                }
                None => {
                    segments.push(Segment::Literal(rest.to_string()));
                    rest = "";
                }
            }
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Names of the variables, in template order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a concrete URI, returning the captured variables.
    pub fn matches(&self, uri: &str) -> Option<HashMap<String, String>> {
        let mut rest = uri;
        let mut variables = HashMap::new();
        let mut segments = self.segments.iter().peekable();

        while let Some(segment) = segments.next() {
            match segment {
                Segment::Literal(literal) => {
                    rest = rest.strip_prefix(literal.as_str())?;
                }
                Segment::Variable(name) => {
                    let end = match segments.peek() {
                        Some(Segment::Literal(next)) => rest.find(next.as_str())?,
                        _ => rest.len(),
                    };
                    let value = &rest[..end];
                    if value.is_empty() || value.contains('/') {
                        return None;
                    }
                    variables.insert(name.clone(), value.to_string());
                    rest = &rest[end..];
                }
            }
        }

        rest.is_empty().then_some(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_single_variable() {
        let template = UriTemplate::parse("greeting://{name}").unwrap();
        let vars = template.matches("greeting://Ada").unwrap();
        assert_eq!(vars.get("name").map(String::as_str), Some("Ada"));

        assert!(template.matches("greeting://").is_none());
        assert!(template.matches("greeting://a/b").is_none());
        assert!(template.matches("time://current").is_none());
    }

    #[test]
    fn test_match_variable_between_literals() {
        let template = UriTemplate::parse("users://{id}/profile").unwrap();
        let vars = template.matches("users://42/profile").unwrap();
        assert_eq!(vars["id"], "42");
        assert!(template.matches("users://42/settings").is_none());
        assert_eq!(template.variable_names().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_static_template() {
        let template = UriTemplate::parse("time://current").unwrap();
        assert!(template.matches("time://current").unwrap().is_empty());
        assert!(template.matches("time://current/x").is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            UriTemplate::parse("greeting://{name"),
            Err(UriTemplateError::Unclosed("greeting://{name".to_string()))
        );
        assert!(matches!(
            UriTemplate::parse("greeting://{}"),
            Err(UriTemplateError::InvalidVariable(_))
        ));
        assert!(matches!(
            UriTemplate::parse("x://{a}{b}"),
            Err(UriTemplateError::AdjacentVariables(_))
        ));
    }
}
