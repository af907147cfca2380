//! Naming scheme for rotated log files: `<base>.<epoch-seconds>`.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A rotated log file recovered from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedLogName {
    pub path: PathBuf,
    pub rotated_at_epoch_secs: u64,
}

/// Name for the rotation happening now.
pub fn format_rotated_filename(base: &Path) -> PathBuf {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{epoch}"));
    PathBuf::from(name)
}

/// Recover the rotation timestamp from a file name, or `None` when the
/// name does not belong to `base`'s rotation set.
pub fn parse_rotated_filename(base: &Path, candidate: &Path) -> Option<RotatedLogName> {
    let base_name = base.file_name()?.to_str()?;
    let candidate_name = candidate.file_name()?.to_str()?;
    let suffix = candidate_name
        .strip_prefix(base_name)?
        .strip_prefix('.')?;
    let rotated_at_epoch_secs = suffix.parse().ok()?;
    Some(RotatedLogName {
        path: candidate.to_path_buf(),
        rotated_at_epoch_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let base = Path::new("/var/log/weir.log");
        let rotated = format_rotated_filename(base);
        let parsed = parse_rotated_filename(base, &rotated).expect("parse rotated name");
        assert_eq!(parsed.path, rotated);
        assert!(parsed.rotated_at_epoch_secs > 0);
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let base = Path::new("weir.log");
        assert!(parse_rotated_filename(base, Path::new("other.log.123")).is_none());
        assert!(parse_rotated_filename(base, Path::new("weir.log")).is_none());
        assert!(parse_rotated_filename(base, Path::new("weir.log.notanumber")).is_none());
    }
}
