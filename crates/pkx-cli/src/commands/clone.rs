use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use std::path::Path;

pub fn run(
    repository: &str,
    parent: &Path,
    dir: Option<&str>,
    hook: bool,
    json: bool,
) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner(&format!("cloning {repository}...")))
    };

    let target = match pkx_core::clone_project(repository, parent, dir, hook) {
        Ok(t) => t,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "clone failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        let payload = serde_json::json!({
            "repository": repository,
            "path": target.display().to_string(),
            "hook": hook,
        });
        println!("{}", json_pretty(&payload)?);
    } else if let Some(ref pb) = pb {
        spin_ok(pb, &format!("cloned into {}", target.display()));
    }
    Ok(EXIT_SUCCESS)
}
