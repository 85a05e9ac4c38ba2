use crate::CoreError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Pack a project directory into a deterministic tar archive at `archive_path`.
///
/// Only top-level entries that are not hidden and not named in `excludes`
/// are included; directories are packed recursively. Entries are sorted by
/// path with zeroed timestamps and ownership, so an unchanged project packs
/// to identical bytes. Returns the archived paths in order.
pub fn pack_project(
    project: &Path,
    archive_path: &Path,
    excludes: &[String],
) -> Result<Vec<String>, CoreError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(project)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || excludes.iter().any(|e| *e == name) {
            debug!("not archiving {name}");
            continue;
        }
        let full = entry.path();
        if full == archive_path {
            continue;
        }
        if full.symlink_metadata()?.is_dir() {
            entries.push((name.clone(), full.clone()));
            collect_entries(project, &full, &mut entries)?;
        } else {
            entries.push((name, full));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut ar = tar::Builder::new(Vec::new());
    ar.follow_symlinks(false);
    let mut packed = Vec::with_capacity(entries.len());

    for (rel_path, full_path) in &entries {
        let meta = full_path.symlink_metadata()?;
        if meta.is_file() {
            let data = fs::read(full_path)?;
            let mut header = make_header(&meta, tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_cksum();
            ar.append_data(&mut header, rel_path, data.as_slice())
                .map_err(|e| CoreError::Archive(format!("{rel_path}: {e}")))?;
        } else if meta.is_dir() {
            let mut header = make_header(&meta, tar::EntryType::Directory);
            header.set_size(0);
            header.set_cksum();
            ar.append_data(&mut header, format!("{rel_path}/"), &[] as &[u8])
                .map_err(|e| CoreError::Archive(format!("{rel_path}: {e}")))?;
        } else {
            warn!("skipping unsupported file type: {rel_path}");
            continue;
        }
        packed.push(rel_path.clone());
    }

    let data = ar
        .into_inner()
        .map_err(|e| CoreError::Archive(format!("finishing archive: {e}")))?;
    let mut file = fs::File::create(archive_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    Ok(packed)
}

fn collect_entries(
    root: &Path,
    current: &Path,
    out: &mut Vec<(String, PathBuf)>,
) -> Result<(), CoreError> {
    for entry in fs::read_dir(current)? {
        let full = entry?.path();
        let rel = full
            .strip_prefix(root)
            .map_err(|e| CoreError::Archive(format!("path strip: {e}")))?
            .to_string_lossy()
            .replace('\\', "/");
        if full.symlink_metadata()?.is_dir() {
            out.push((rel, full.clone()));
            collect_entries(root, &full, out)?;
        } else {
            out.push((rel, full));
        }
    }
    Ok(())
}

fn make_header(meta: &fs::Metadata, entry_type: tar::EntryType) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(mode_of(meta, entry_type));
    header
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata, _entry_type: tar::EntryType) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata, entry_type: tar::EntryType) -> u32 {
    if entry_type == tar::EntryType::Directory {
        0o755
    } else {
        0o644
    }
}
