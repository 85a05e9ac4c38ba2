use super::{json_pretty, EXIT_SUCCESS};
use std::path::Path;

pub fn install(project: &Path, json: bool) -> Result<u8, String> {
    let path = pkx_core::install_hook(project).map_err(|e| e.to_string())?;
    report(&path, "installed", json)
}

pub fn uninstall(project: &Path, json: bool) -> Result<u8, String> {
    let path = pkx_core::uninstall_hook(project).map_err(|e| e.to_string())?;
    report(&path, "removed", json)
}

fn report(path: &Path, status: &str, json: bool) -> Result<u8, String> {
    if json {
        let payload = serde_json::json!({
            "hook": path.display().to_string(),
            "status": status,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{status} pre-commit hook {}", path.display());
    }
    Ok(EXIT_SUCCESS)
}
