use crate::StoreError;
use std::path::{Path, PathBuf};

/// Reject paths that are absolute, drive-qualified, or climb out of their base.
pub fn check_relative(path: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidOutput {
        path: path.to_owned(),
        reason: reason.to_owned(),
    };

    if path.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(invalid("must be relative to the project directory"));
    }
    if path.contains(':') {
        return Err(invalid("must not contain a drive or scheme separator"));
    }
    if path.split(['/', '\\']).any(|c| c == "..") {
        return Err(invalid("must not escape the project directory"));
    }
    Ok(())
}

/// Where wrapped modules and their auxiliary files land.
///
/// Everything is written below `<project root>/<output>`, where `output` is a
/// validated relative prefix (possibly empty) that always ends with `/`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    project_root: PathBuf,
    output: String,
}

impl OutputLayout {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            output: String::new(),
        }
    }

    /// Set the relative output prefix, e.g. `bin` or `bin/wrapped/`.
    pub fn with_output(mut self, output: &str) -> Result<Self, StoreError> {
        check_relative(output)?;
        let mut output = output.trim_start_matches("./").to_owned();
        if !output.is_empty() && !output.ends_with('/') {
            output.push('/');
        }
        self.output = output;
        Ok(self)
    }

    #[inline]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The validated output prefix, empty or ending in `/`.
    #[inline]
    pub fn output_prefix(&self) -> &str {
        &self.output
    }

    #[inline]
    pub fn output_root(&self) -> PathBuf {
        if self.output.is_empty() {
            self.project_root.clone()
        } else {
            self.project_root.join(self.output.trim_end_matches('/'))
        }
    }

    #[inline]
    pub fn module_dir(&self, canonical_name: &str) -> PathBuf {
        self.output_root().join(canonical_name)
    }

    #[inline]
    pub fn module_file(&self, canonical_name: &str, file_name: &str) -> PathBuf {
        self.module_dir(canonical_name).join(file_name)
    }

    /// Path of an auxiliary artifact (loader script, cache manifest).
    pub fn artifact_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        check_relative(name)?;
        Ok(self.output_root().join(name))
    }
}
