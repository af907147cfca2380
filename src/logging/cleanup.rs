//! Pruning of rotated log files beyond the configured retention.

use std::io;
use std::path::Path;

use super::filename::parse_rotated_filename;

/// Delete the oldest rotated files so at most `max_files` remain.
pub fn prune_rotated_logs(base: &Path, max_files: usize) -> io::Result<()> {
    let Some(dir) = base.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return prune_in_dir(Path::new("."), base, max_files);
    };
    prune_in_dir(dir, base, max_files)
}

fn prune_in_dir(dir: &Path, base: &Path, max_files: usize) -> io::Result<()> {
    let mut rotated = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = parse_rotated_filename(base, &entry.path()) {
            rotated.push(name);
        }
    }
    rotated.sort_by_key(|name| std::cmp::Reverse(name.rotated_at_epoch_secs));
    for stale in rotated.iter().skip(max_files) {
        if let Err(err) = std::fs::remove_file(&stale.path) {
            tracing::warn!(path = %stale.path.display(), error = %err, "failed to prune log");
        }
    }
    Ok(())
}
