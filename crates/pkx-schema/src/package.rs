use crate::request::PackageRequest;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to read package file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse package file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("package id must not be empty")]
    EmptyId,
    #[error("package file is not a JSON object")]
    NotAnObject,
}

/// The packaging metadata of a pkx module, as declared in its `package.json`.
///
/// Presence of this record is what makes a module wrappable.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PackageMeta {
    pub id: String,
    #[serde(default)]
    pub main: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(
        default,
        rename = "pkxDependencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub pkx_dependencies: Option<Vec<DependencySpec>>,
}

/// A dependency entry: either a bare package id or a full request object.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DependencySpec {
    Id(String),
    Request(PackageRequest),
}

impl DependencySpec {
    pub fn package(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Request(req) => &req.package,
        }
    }

    pub fn to_request(&self) -> PackageRequest {
        match self {
            Self::Id(id) => PackageRequest::new(id.clone()),
            Self::Request(req) => req.clone(),
        }
    }
}

impl PackageMeta {
    /// Dependencies used for resolution: `pkxDependencies` wins when present.
    pub fn effective_dependencies(&self) -> &[DependencySpec] {
        self.pkx_dependencies
            .as_deref()
            .unwrap_or(&self.dependencies)
    }

    pub fn validate(&self) -> Result<(), PackageError> {
        if self.id.trim().is_empty() {
            return Err(PackageError::EmptyId);
        }
        Ok(())
    }
}

pub fn parse_package_str(input: &str) -> Result<PackageMeta, PackageError> {
    let meta: PackageMeta = serde_json::from_str(input)?;
    meta.validate()?;
    Ok(meta)
}

pub fn parse_package_file(path: impl AsRef<Path>) -> Result<PackageMeta, PackageError> {
    let content = fs::read_to_string(path)?;
    parse_package_str(&content)
}

/// Rewrite the `version` field of a `package.json` in place.
///
/// All other fields are kept in their original order. The file is replaced
/// atomically and pretty-printed with two-space indentation.
pub fn rewrite_version(path: impl AsRef<Path>, version: &Version) -> Result<(), PackageError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let mut doc: serde_json::Value = serde_json::from_str(&content)?;
    let obj = doc.as_object_mut().ok_or(PackageError::NotAnObject)?;
    obj.insert(
        "version".to_owned(),
        serde_json::Value::String(version.to_string()),
    );
    let rendered = serde_json::to_string_pretty(&doc)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, rendered.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PackageError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_package() {
        let input = r#"{
  "id": "acme.widgets.1.0.0",
  "name": "widgets",
  "version": "1.0.0",
  "title": "Widgets",
  "description": "UI widgets",
  "main": "widgets.js",
  "dependencies": ["acme.util.strings.1.0.0", {"package": "acme.util.math.1.0.0", "raw": true}]
}"#;
        let meta = parse_package_str(input).unwrap();
        assert_eq!(meta.id, "acme.widgets.1.0.0");
        assert_eq!(meta.main, "widgets.js");
        assert_eq!(meta.title.as_deref(), Some("Widgets"));
        let deps: Vec<&str> = meta
            .effective_dependencies()
            .iter()
            .map(DependencySpec::package)
            .collect();
        assert_eq!(deps, vec!["acme.util.strings.1.0.0", "acme.util.math.1.0.0"]);
    }

    #[test]
    fn pkx_dependencies_take_precedence() {
        let input = r#"{
  "id": "acme.widgets",
  "main": "widgets.js",
  "dependencies": ["left-pad"],
  "pkxDependencies": ["acme.util.strings"]
}"#;
        let meta = parse_package_str(input).unwrap();
        assert_eq!(meta.effective_dependencies().len(), 1);
        assert_eq!(meta.effective_dependencies()[0].package(), "acme.util.strings");
    }

    #[test]
    fn missing_dependencies_default_to_empty() {
        let meta = parse_package_str(r#"{"id": "acme.util.math", "main": "math.js"}"#).unwrap();
        assert!(meta.effective_dependencies().is_empty());
    }

    #[test]
    fn rejects_empty_id() {
        let err = parse_package_str(r#"{"id": "  ", "main": "x.js"}"#).unwrap_err();
        assert!(matches!(err, PackageError::EmptyId));
    }

    #[test]
    fn rejects_missing_id() {
        assert!(parse_package_str(r#"{"main": "x.js"}"#).is_err());
    }

    #[test]
    fn rewrite_version_preserves_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        fs::write(
            &path,
            r#"{"id": "acme.widgets", "version": "1.2.3", "main": "widgets.js", "custom": {"keep": true}}"#,
        )
        .unwrap();

        rewrite_version(&path, &Version::new(1, 2, 4)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"version\": \"1.2.4\""));
        assert!(content.contains("\"keep\": true"));
        let id_pos = content.find("\"id\"").unwrap();
        let main_pos = content.find("\"main\"").unwrap();
        assert!(id_pos < main_pos);
    }
}
