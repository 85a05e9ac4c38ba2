use crate::package::DependencySpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request must not be empty")]
    Empty,
    #[error("invalid request '{0}': expected a package id, a request object, or an array of them")]
    Invalid(String),
    #[error("invalid request object: {0}")]
    Object(#[from] serde_json::Error),
}

/// A request handed to the dependency resolver.
///
/// `package` is a package id or a location; `raw` asks for the module source
/// untouched; `wrap` marks the module for wrapping. Any other fields are kept
/// and forwarded to the resolver unchanged.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PackageRequest {
    pub package: String,
    #[serde(default)]
    pub raw: bool,
    #[serde(default)]
    pub wrap: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageRequest {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            raw: false,
            wrap: false,
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn for_wrap(mut self) -> Self {
        self.raw = true;
        self.wrap = true;
        self
    }
}

/// Parse a command-line request argument.
///
/// The argument may be JSON (a string, a request object, or an array of
/// either); anything that is not valid JSON is taken as a plain package id.
pub fn parse_request_argument(arg: &str, wrap: bool) -> Result<Vec<PackageRequest>, RequestError> {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return Err(RequestError::Empty);
    }

    let requests = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| request_from_value(item, arg))
            .collect::<Result<Vec<_>, _>>()?,
        Ok(value) => vec![request_from_value(value, arg)?],
        Err(_) => vec![PackageRequest::new(trimmed)],
    };

    if requests.is_empty() {
        return Err(RequestError::Empty);
    }

    Ok(if wrap {
        requests.into_iter().map(PackageRequest::for_wrap).collect()
    } else {
        requests
    })
}

fn request_from_value(value: serde_json::Value, arg: &str) -> Result<PackageRequest, RequestError> {
    match value {
        serde_json::Value::String(id) if !id.trim().is_empty() => Ok(PackageRequest::new(id)),
        serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
        _ => Err(RequestError::Invalid(arg.to_owned())),
    }
}

/// Turn a package's declared dependencies into wrap requests.
pub fn requests_for_wrap(deps: &[DependencySpec]) -> Vec<PackageRequest> {
    deps.iter()
        .map(|dep| dep.to_request().for_wrap())
        .collect()
}
