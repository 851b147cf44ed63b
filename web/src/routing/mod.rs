//! Conventional route templates such as `{controller=Home}/{action=Index}/{id?}`.

pub mod dispatch;

pub use dispatch::{ControllerRegistry, dispatch};

use std::collections::HashMap;

/// Template of the application's single conventional route
pub const DEFAULT_ROUTE: &str = "{controller=Home}/{action=Index}/{id?}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Parameter {
        name: String,
        default: Option<String>,
        optional: bool,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteTemplateError {
    #[error("Empty segment in route template '{0}'")]
    EmptySegment(String),
    #[error("Unbalanced braces in route segment '{0}'")]
    UnbalancedBraces(String),
    #[error("Parameter '{0}' cannot be both optional and have a default")]
    OptionalWithDefault(String),
    #[error("Parameter '{0}' appears more than once")]
    DuplicateParameter(String),
    #[error("Required segment '{0}' follows an optional one")]
    RequiredAfterOptional(String),
}

/// A parsed route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    template: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(template: &str) -> Result<Self, RouteTemplateError> {
        let trimmed = template.trim_matches('/');
        let mut segments = Vec::new();
        let mut seen_optional = false;

        if trimmed.is_empty() {
            return Ok(Self {
                template: template.to_string(),
                segments,
            });
        }

        for raw in trimmed.split('/') {
            if raw.is_empty() {
                return Err(RouteTemplateError::EmptySegment(template.to_string()));
            }

            let segment = match (raw.strip_prefix('{'), raw.ends_with('}')) {
                (Some(inner), true) => parse_parameter(&inner[..inner.len() - 1], raw)?,
                (None, false) if !raw.contains(['{', '}']) => Segment::Literal(raw.to_string()),
                _ => return Err(RouteTemplateError::UnbalancedBraces(raw.to_string())),
            };

            match &segment {
                Segment::Parameter { name, default, optional } => {
                    let duplicate = segments.iter().any(|s| {
                        matches!(s, Segment::Parameter { name: existing, .. } if existing.eq_ignore_ascii_case(name))
                    });
                    if duplicate {
                        return Err(RouteTemplateError::DuplicateParameter(name.clone()));
                    }
                    if default.is_some() || *optional {
                        seen_optional = true;
                    } else if seen_optional {
                        return Err(RouteTemplateError::RequiredAfterOptional(name.clone()));
                    }
                }
                Segment::Literal(literal) if seen_optional => {
                    return Err(RouteTemplateError::RequiredAfterOptional(literal.clone()));
                }
                Segment::Literal(_) => {}
            }

            segments.push(segment);
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    /// The [`DEFAULT_ROUTE`] template, built without parsing
    pub fn conventional() -> Self {
        let parameter = |name: &str, default: Option<&str>, optional| Segment::Parameter {
            name: name.to_string(),
            default: default.map(str::to_string),
            optional,
        };
        Self {
            template: DEFAULT_ROUTE.to_string(),
            segments: vec![
                parameter("controller", Some("Home"), false),
                parameter("action", Some("Index"), false),
                parameter("id", None, true),
            ],
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Matches a request path, filling in defaults for missing trailing
    /// segments. Literals compare case-insensitively.
    pub fn match_path(&self, path: &str) -> Option<RouteValues> {
        let trimmed = path.trim_matches('/');
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        if parts.len() > self.segments.len() || parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        let mut values = RouteValues::default();
        for (index, segment) in self.segments.iter().enumerate() {
            let part = parts.get(index).copied();
            match (segment, part) {
                (Segment::Literal(literal), Some(part)) => {
                    if !literal.eq_ignore_ascii_case(part) {
                        return None;
                    }
                }
                (Segment::Literal(_), None) => return None,
                (Segment::Parameter { name, .. }, Some(part)) => {
                    values.insert(name, part);
                }
                (Segment::Parameter { name, default, .. }, None) => {
                    if let Some(default) = default {
                        values.insert(name, default);
                    }
                }
            }
        }

        Some(values)
    }
}

fn parse_parameter(inner: &str, raw: &str) -> Result<Segment, RouteTemplateError> {
    if inner.is_empty() || inner.contains(['{', '}']) {
        return Err(RouteTemplateError::UnbalancedBraces(raw.to_string()));
    }

    let (name, default) = match inner.split_once('=') {
        Some((name, default)) => (name, Some(default.to_string())),
        None => (inner, None),
    };
    let (name, optional) = match name.strip_suffix('?') {
        Some(name) => (name, true),
        None => (name, false),
    };

    if optional && default.is_some() {
        return Err(RouteTemplateError::OptionalWithDefault(name.to_string()));
    }

    Ok(Segment::Parameter {
        name: name.to_string(),
        default,
        optional,
    })
}

/// Values captured by a matched route, keyed case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteValues {
    values: HashMap<String, String>,
}

impl RouteValues {
    fn insert(&mut self, name: &str, value: &str) {
        self.values
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn controller(&self) -> Option<&str> {
        self.get("controller")
    }

    pub fn action(&self) -> Option<&str> {
        self.get("action")
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id")
    }
}
