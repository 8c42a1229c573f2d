use chrono::{DateTime, Utc};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

// Directory extensions treated as opaque packages: the walk neither
// descends into them nor charges their contents.
const OPAQUE_BUNDLE_EXTENSIONS: &[&str] = &[
    "app",
    "framework",
    "bundle",
    "kext",
    "photoslibrary",
    "musiclibrary",
    "tvlibrary",
];

/// Recursively sums regular-file sizes under `path`. Hidden entries and
/// package directories are skipped, unreadable entries are logged and
/// skipped, and a cancelled token stops the walk with the partial sum.
/// Nonexistent or empty directories yield 0.
pub fn directory_size(path: &Path, cancel: &CancellationToken) -> u64 {
    let mut total = 0u64;

    let walker = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || should_visit(e));

    for entry in walker {
        if cancel.is_cancelled() {
            return total;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable entry under {}: {err}", path.display());
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata() {
            Ok(meta) => total += meta.len(),
            Err(err) => debug!("no metadata for {}: {err}", entry.path().display()),
        }
    }

    total
}

pub(super) fn should_visit(entry: &DirEntry) -> bool {
    if is_hidden(entry) {
        return false;
    }
    if entry.file_type().is_dir() && is_opaque_bundle(entry.path()) {
        return false;
    }
    true
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn is_opaque_bundle(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| OPAQUE_BUNDLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    path.metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .map(|t| t.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn test_empty_directory_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(directory_size(dir.path(), &token()), 0);
    }

    #[test]
    fn test_nonexistent_directory_is_zero() {
        let path = Path::new("/definitely/not/a/real/path");
        assert_eq!(directory_size(path, &token()), 0);
    }

    #[test]
    fn test_sums_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("top.bin"), vec![0u8; 1000]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/nested.bin"), vec![0u8; 2500]).unwrap();

        assert_eq!(directory_size(dir.path(), &token()), 3500);
    }

    #[test]
    fn test_hidden_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("visible.bin"), vec![0u8; 100]).unwrap();
        fs::write(dir.path().join(".hidden.bin"), vec![0u8; 900]).unwrap();
        fs::create_dir(dir.path().join(".hidden-dir")).unwrap();
        fs::write(dir.path().join(".hidden-dir/inner.bin"), vec![0u8; 900]).unwrap();

        assert_eq!(directory_size(dir.path(), &token()), 100);
    }

    #[test]
    fn test_requested_root_may_itself_be_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let hidden_root = dir.path().join(".cache");
        fs::create_dir(&hidden_root).unwrap();
        fs::write(hidden_root.join("blob.bin"), vec![0u8; 640]).unwrap();

        assert_eq!(directory_size(&hidden_root, &token()), 640);
    }

    #[test]
    fn test_bundle_directories_are_opaque() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("loose.bin"), vec![0u8; 300]).unwrap();
        fs::create_dir(dir.path().join("Tool.app")).unwrap();
        fs::write(dir.path().join("Tool.app/binary"), vec![0u8; 5000]).unwrap();

        assert_eq!(directory_size(dir.path(), &token()), 300);
    }

    #[test]
    fn test_cancelled_walk_returns_partial_sum() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            fs::write(dir.path().join(format!("f{i}.bin")), vec![0u8; 100]).unwrap();
        }

        let cancel = token();
        cancel.cancel();
        let size = directory_size(dir.path(), &cancel);
        assert!(size < 2000, "cancelled walk should stop early, got {size}");
    }

    #[test]
    fn test_modified_at_for_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stamp.bin");
        fs::write(&file, b"x").unwrap();

        assert!(modified_at(&file).is_some());
        assert!(modified_at(Path::new("/no/such/file")).is_none());
    }
}
