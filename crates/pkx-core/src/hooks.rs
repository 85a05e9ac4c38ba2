use crate::CoreError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Pre-commit hook that rebuilds the package archive before every commit.
pub const PRE_COMMIT_HOOK: &str = "#! /bin/sh\npkx build\nexit $?";

fn hook_path(project: &Path) -> PathBuf {
    project.join(".git").join("hooks").join("pre-commit")
}

/// Write `.git/hooks/pre-commit`, replacing any existing hook.
///
/// The hooks directory is created if the repository has none.
pub fn install_hook(project: &Path) -> Result<PathBuf, CoreError> {
    let path = hook_path(project);
    let git_dir = project.join(".git");
    if !git_dir.is_dir() {
        return Err(CoreError::Hook(format!(
            "{} not found; is {} a git repository?",
            git_dir.display(),
            project.display()
        )));
    }
    std::fs::create_dir_all(git_dir.join("hooks"))?;

    std::fs::write(&path, PRE_COMMIT_HOOK)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }
    info!("installed pre-commit hook at {}", path.display());
    Ok(path)
}

pub fn uninstall_hook(project: &Path) -> Result<PathBuf, CoreError> {
    let path = hook_path(project);
    if !path.is_file() {
        return Err(CoreError::Hook(format!(
            "no pre-commit hook at {}",
            path.display()
        )));
    }
    std::fs::remove_file(&path)?;
    info!("removed pre-commit hook at {}", path.display());
    Ok(path)
}
