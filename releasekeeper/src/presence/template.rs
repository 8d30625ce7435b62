//! Deterministic per-vendor storage path templates.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::model::GroupingKey;

/// Placeholders a template may use.
const PLACEHOLDERS: &[&str] = &["year", "month", "cycle", "name"];

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_]+)\}").expect("valid placeholder regex"))
}

/// Errors from parsing a path template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("path template is empty")]
    Empty,

    #[error("unknown placeholder '{{{placeholder}}}' in '{template}'")]
    UnknownPlaceholder {
        placeholder: String,
        template: String,
    },

    #[error("path template '{0}' must be relative to the storage root")]
    Absolute(String),

    #[error("path template '{0}' must not contain '..'")]
    ParentTraversal(String),

    #[error("path template '{0}' does not use {{name}}")]
    MissingName(String),
}

/// Relative path pattern such as `{year}/{month}/{cycle}/{name}`.
///
/// `{month}` renders as two digits, `{year}` as four. A `{cycle}` segment
/// that renders empty (no cycle) is dropped from the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
}

impl PathTemplate {
    /// Parse and validate a template.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TemplateError::Empty);
        }
        if raw.starts_with('/') || raw.starts_with('\\') {
            return Err(TemplateError::Absolute(raw.to_string()));
        }
        if raw.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(TemplateError::ParentTraversal(raw.to_string()));
        }

        for caps in placeholder_regex().captures_iter(raw) {
            let name = &caps[1];
            if !PLACEHOLDERS.contains(&name) {
                return Err(TemplateError::UnknownPlaceholder {
                    placeholder: name.to_string(),
                    template: raw.to_string(),
                });
            }
        }

        if !raw.contains("{name}") {
            return Err(TemplateError::MissingName(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
        })
    }

    /// Template from a crate constant, already known to be valid.
    pub(crate) fn builtin(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Relative path for an artifact.
    pub fn render(&self, name: &str, grouping: &GroupingKey) -> PathBuf {
        let rendered = placeholder_regex().replace_all(&self.raw, |caps: &Captures| {
            match &caps[1] {
                "year" => format!("{:04}", grouping.year),
                "month" => format!("{:02}", grouping.month),
                "cycle" => grouping.cycle.clone().unwrap_or_default(),
                "name" => name.to_string(),
                other => format!("{{{}}}", other),
            }
        });

        rendered
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}
