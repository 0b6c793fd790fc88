//! Local scratch storage housekeeping

use std::path::Path;

/// Remove a transferred scratch file, then every directory between it and
/// `root` that is left empty. `root` itself is kept.
pub fn remove_and_prune(file: &Path, root: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(file) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        let mut entries = match std::fs::read_dir(current) {
            Ok(entries) => entries,
            // Never created, e.g. a download that failed before writing
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                dir = current.parent();
                continue;
            }
            Err(e) => return Err(e),
        };
        if entries.next().is_some() {
            break;
        }
        std::fs::remove_dir(current)?;
        tracing::debug!(dir = %current.display(), "Pruned empty scratch directory");
        dir = current.parent();
    }
    Ok(())
}
