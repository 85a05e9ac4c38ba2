//! Structured resolution failures.
//!
//! A failure mirrors the request graph: each failed request lists its own
//! errors, and a request whose dependencies failed carries the nested failure
//! tree of those dependencies, so a report can name the exact transitive
//! dependency that broke.

use pkx_schema::{ModuleGraph, ModuleId, ModuleIndex, PackageRequest};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// What is known about a (possibly partially) resolved module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSummary {
    pub id: ModuleId,
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub dependencies: Vec<ModuleId>,
}

impl ModuleSummary {
    pub fn from_graph(graph: &ModuleGraph, idx: ModuleIndex) -> Option<Self> {
        let module = graph.get(idx)?;
        let meta = module.meta();
        Some(Self {
            id: module.id.clone(),
            title: meta.and_then(|m| m.title.clone()),
            version: meta.and_then(|m| m.version.clone()),
            description: meta.and_then(|m| m.description.clone()),
            dependencies: module
                .dependencies
                .iter()
                .filter_map(|&d| graph.get(d).map(|m| m.id.clone()))
                .collect(),
        })
    }

    pub fn render_lines(&self, indent: &str) -> Vec<String> {
        let mut out = vec![format!("{indent}Request '{}':", self.id)];
        if self.title.is_some() || self.version.is_some() || self.description.is_some() {
            out.push(format!(
                "{indent}  Title  : {}",
                self.title.as_deref().unwrap_or("")
            ));
            out.push(format!(
                "{indent}  Version: {}",
                self.version.as_deref().unwrap_or("")
            ));
            out.push(format!("{indent}  Description:"));
            out.push(format!(
                "{indent}    {}",
                self.description.as_deref().unwrap_or("")
            ));
        }
        if !self.dependencies.is_empty() {
            out.push(format!("{indent}  Dependencies:"));
            for dep in &self.dependencies {
                out.push(format!("{indent}    {dep}"));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveError {
    /// One or more dependencies of the request failed; the nested tree says which.
    Dependency { failure: ResolveFailure },
    Failed {
        message: String,
        inner: Option<Box<ResolveError>>,
    },
}

impl ResolveError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            inner: None,
        }
    }

    #[must_use]
    pub fn caused_by(self, inner: ResolveError) -> Self {
        match self {
            Self::Failed { message, .. } => Self::Failed {
                message,
                inner: Some(Box::new(inner)),
            },
            dep @ Self::Dependency { .. } => dep,
        }
    }

    /// The innermost error of a chain of causes.
    pub fn deepest(&self) -> &ResolveError {
        let mut current = self;
        while let Self::Failed {
            inner: Some(inner), ..
        } = current
        {
            current = inner.as_ref();
        }
        current
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dependency { .. } => f.write_str("one or more dependencies failed to load"),
            Self::Failed { message, .. } => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestFailure {
    pub request: PackageRequest,
    pub module: Option<ModuleSummary>,
    pub errors: Vec<ResolveError>,
}

#[derive(Debug, Clone, Default, Serialize, Error)]
#[error("{} of the requested packages could not be resolved", .requests.len())]
pub struct ResolveFailure {
    /// Errors of the resolver itself, not tied to one request.
    pub loader: Vec<String>,
    pub requests: Vec<RequestFailure>,
}

impl ResolveFailure {
    pub fn is_empty(&self) -> bool {
        self.loader.is_empty() && self.requests.is_empty()
    }

    /// Indented human-readable report of the whole tree.
    pub fn render_lines(&self, indent: &str) -> Vec<String> {
        let mut out: Vec<String> = self.loader.iter().map(|e| format!("{indent}{e}")).collect();

        for req in &self.requests {
            match &req.module {
                Some(summary) => out.extend(summary.render_lines(indent)),
                None => out.push(format!("{indent}Request '{}':", req.request.package)),
            }
            for err in &req.errors {
                match err {
                    ResolveError::Dependency { failure } => {
                        out.push(format!("{indent}  Dependencies:"));
                        out.push(format!(
                            "{indent}    One or more dependencies failed to load."
                        ));
                        out.extend(failure.render_lines(&format!("{indent}    ")));
                    }
                    ResolveError::Failed { .. } => {
                        out.push(format!("{indent}  {}", err.deepest()));
                    }
                }
            }
        }
        out
    }
}
