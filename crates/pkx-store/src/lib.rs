//! On-disk artifacts of a pkx wrap: output layout, materialized modules,
//! loader script, and the offline cache manifest.
//!
//! `OutputLayout` validates the relative output root and derives module paths,
//! `Materializer` writes module sources idempotently (atomic writes, one write
//! per module identity), `generate_loader` renders the inclusion script, and
//! `AppCache` is the typed cache manifest with its non-destructive merge.

pub mod appcache;
pub mod layout;
pub mod loader;
pub mod materialize;

pub use appcache::{
    merge, merge_appcache_file, new_stamp, AppCache, AppCacheError, ManifestLine, MergeOutcome,
    Section,
};
pub use layout::{check_relative, OutputLayout};
pub use loader::{generate_loader, write_loader, LOADER_POLYFILL};
pub use materialize::{
    MaterializeFailure, MaterializeReport, MaterializedModule, Materializer, WrapJob,
};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid output path '{path}': {reason}")]
    InvalidOutput { path: String, reason: String },
    #[error("I/O error for module '{module}' at {path}: {source}")]
    ModuleIo {
        module: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cache manifest {path}: {source}")]
    Format {
        path: String,
        #[source]
        source: AppCacheError,
    },
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_invalid_output() {
        let e = StoreError::InvalidOutput {
            path: "/abs".to_owned(),
            reason: "must be relative".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/abs"));
        assert!(msg.contains("must be relative"));
    }

    #[test]
    fn store_error_display_module_io() {
        let e = StoreError::ModuleIo {
            module: "acme.widgets/".to_owned(),
            path: "./acme.widgets/widgets.js".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = e.to_string();
        assert!(msg.contains("acme.widgets/"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn store_error_display_format() {
        let e = StoreError::Format {
            path: "app.appcache".to_owned(),
            source: AppCacheError::DuplicateHeader { line: 4 },
        };
        let msg = e.to_string();
        assert!(msg.contains("app.appcache"));
        assert!(msg.contains('4'));
    }

    #[test]
    fn store_error_display_lock_failed() {
        let e = StoreError::LockFailed("busy".to_owned());
        assert!(e.to_string().contains("busy"));
    }
}
