use crate::{fsync_dir, StoreError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Defines `require` for runtimes without a module system: relative paths
/// are loaded by injecting a script tag, anything else throws.
pub const LOADER_POLYFILL: &str = r#"if (typeof require === "undefined") {
    var require = function (path) {
        if (typeof path === "string" && (path.indexOf("./") === 0 || path.indexOf("../") === 0)) {
            var script = document.createElement("script");
            script.src = path;
            script.async = false;
            document.head.appendChild(script);
            return;
        }
        throw new Error("Cannot load module '" + path + "': only relative paths are supported.");
    };
}
"#;

/// Render the loader script: one `require` per path, in the given order.
pub fn generate_loader(paths: &[String], polyfill: bool) -> String {
    let mut out = String::new();
    if polyfill {
        out.push_str(LOADER_POLYFILL);
    }
    for path in paths {
        let target = format!("./{}", path.trim_start_matches("./"));
        // A JSON string literal is a valid JS string literal.
        let quoted = serde_json::Value::String(target).to_string();
        out.push_str("require(");
        out.push_str(&quoted);
        out.push_str(");\n");
    }
    out
}

/// Atomically replace the loader script at `path`.
pub fn write_loader(path: &Path, script: &str) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(script.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}
