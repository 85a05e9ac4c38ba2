use crate::package::PackageMeta;
use crate::types::CanonicalName;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("package '{0}' declares no main entry")]
    MissingMain(String),
    #[error("module '{module}' does not belong to package '{package}'")]
    ForeignModule { module: String, package: String },
}

/// Whether a dot-delimited id segment is a version marker.
///
/// Empty segments and segments that read as a finite decimal number count as
/// version markers and are dropped from canonical names.
pub fn is_version_segment(segment: &str) -> bool {
    let trimmed = segment.trim();
    trimmed.is_empty() || trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Strip numeric version segments from a dot-delimited package id.
///
/// `acme.widgets.1.0.0` becomes `acme.widgets`. A trailing `/` (the resolver's
/// package-root marker) is ignored.
pub fn canonical_name(id: &str) -> CanonicalName {
    let id = id.strip_suffix('/').unwrap_or(id);
    let kept: Vec<&str> = id
        .split('.')
        .filter(|segment| !is_version_segment(segment))
        .collect();
    CanonicalName::new(kept.join("."))
}

/// Derive the canonical directory name and file name for a wrappable module.
///
/// The package root (`<id>` or `<id>/`) is written under its declared `main`
/// entry; a submodule `<id>/<path>` keeps the path after the package prefix.
pub fn entry_name(module_id: &str, meta: &PackageMeta) -> Result<(CanonicalName, String), EntryError> {
    let canonical = canonical_name(&meta.id);
    let package_root = format!("{}/", meta.id);

    if module_id == meta.id || module_id == package_root {
        let main = meta.main.trim();
        if main.is_empty() {
            return Err(EntryError::MissingMain(meta.id.clone()));
        }
        return Ok((canonical, main.trim_start_matches("./").to_owned()));
    }

    match module_id.strip_prefix(&package_root) {
        Some(rest) if !rest.is_empty() => Ok((canonical, rest.to_owned())),
        _ => Err(EntryError::ForeignModule {
            module: module_id.to_owned(),
            package: meta.id.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::parse_package_str;

    fn meta(id: &str, main: &str) -> PackageMeta {
        parse_package_str(&format!(r#"{{"id": "{id}", "main": "{main}"}}"#)).unwrap()
    }

    #[test]
    fn strips_numeric_segments() {
        assert_eq!(canonical_name("acme.widgets.1.0.0"), "acme.widgets");
        assert_eq!(canonical_name("acme.util.strings"), "acme.util.strings");
        assert_eq!(canonical_name("acme.2.widgets.10"), "acme.widgets");
    }

    #[test]
    fn ignores_package_root_marker() {
        assert_eq!(canonical_name("acme.widgets.1.0.0/"), "acme.widgets");
    }

    #[test]
    fn drops_empty_segments() {
        assert_eq!(canonical_name("acme..widgets."), "acme.widgets");
    }

    #[test]
    fn keeps_alphanumeric_segments() {
        assert!(!is_version_segment("v2"));
        assert!(!is_version_segment("1a"));
        assert!(is_version_segment("12"));
        assert!(is_version_segment(" "));
    }

    #[test]
    fn package_root_uses_main() {
        let m = meta("acme.widgets.1.0.0", "widgets.js");
        let (dir, file) = entry_name("acme.widgets.1.0.0/", &m).unwrap();
        assert_eq!(dir, "acme.widgets");
        assert_eq!(file, "widgets.js");

        let (_, file) = entry_name("acme.widgets.1.0.0", &m).unwrap();
        assert_eq!(file, "widgets.js");
    }

    #[test]
    fn submodule_keeps_relative_path() {
        let m = meta("acme.widgets.1.0.0", "widgets.js");
        let (dir, file) = entry_name("acme.widgets.1.0.0/lib/extra.js", &m).unwrap();
        assert_eq!(dir, "acme.widgets");
        assert_eq!(file, "lib/extra.js");
    }

    #[test]
    fn foreign_module_is_rejected() {
        let m = meta("acme.widgets.1.0.0", "widgets.js");
        let err = entry_name("acme.other.1.0.0/", &m).unwrap_err();
        assert!(matches!(err, EntryError::ForeignModule { .. }));
    }

    #[test]
    fn missing_main_is_rejected() {
        let m = meta("acme.widgets", "");
        assert_eq!(
            entry_name("acme.widgets/", &m).unwrap_err(),
            EntryError::MissingMain("acme.widgets".to_owned())
        );
    }
}
