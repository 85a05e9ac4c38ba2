use crate::hooks::install_hook;
use crate::CoreError;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info, warn};

fn git_tag(project: &Path, args: &[&str]) -> Result<(), String> {
    let output = Command::new("git")
        .arg("tag")
        .args(args)
        .current_dir(project)
        .output()
        .map_err(|e| format!("failed to run git: {e}"))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_owned())
    }
}

/// Move the version tag from `old` to `new` in the repository at `project`.
///
/// Deleting the old tag may fail harmlessly (it may never have existed).
/// Returns whether the new tag was created.
pub fn retag(project: &Path, old: &str, new: &str) -> bool {
    if let Err(e) = git_tag(project, &["-d", old]) {
        warn!("could not delete git tag {old}: {e}");
    }
    match git_tag(project, &[new]) {
        Ok(()) => {
            info!("tagged {new}");
            true
        }
        Err(e) => {
            error!("could not create git tag {new}: {e}");
            false
        }
    }
}

/// Directory name `git clone` picks for `repository` when none is given.
pub fn clone_dir_name(repository: &str) -> Option<String> {
    let trimmed = repository.trim_end_matches(['/', '\\']);
    let trimmed = trimmed.strip_suffix("/.git").unwrap_or(trimmed);
    let last = trimmed.rsplit(['/', '\\', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_owned())
    }
}

/// Clone `repository` with its submodules below `parent` and, when `hook`
/// is set, install the pre-commit hook in the new checkout.
pub fn clone_project(
    repository: &str,
    parent: &Path,
    dir: Option<&str>,
    hook: bool,
) -> Result<PathBuf, CoreError> {
    let name = match dir {
        Some(d) => d.to_owned(),
        None => clone_dir_name(repository).ok_or_else(|| {
            CoreError::Git(format!("cannot derive a directory name from '{repository}'"))
        })?,
    };
    std::fs::create_dir_all(parent)?;
    let target = parent.join(&name);

    info!("cloning {repository} into {}", target.display());
    let output = Command::new("git")
        .args(["clone", "--recursive", "--", repository, &name])
        .current_dir(parent)
        .output()
        .map_err(|e| CoreError::Git(format!("failed to run git: {e}")))?;
    if !output.status.success() {
        return Err(CoreError::Git(
            String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        ));
    }

    if hook {
        install_hook(&target)?;
    }
    Ok(target)
}
