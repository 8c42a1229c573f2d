use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::walk::directory_size;

const DU_BIN: &str = "/usr/bin/du";

/// Aggregate byte counts for directory trees. The batched form is the
/// primary entry point; callers size all sibling directories of a listing
/// in one call.
pub trait SizeProbe: Send + Sync {
    /// Sizes each path. Paths that cannot be measured are absent from the
    /// returned map; callers treat absence as zero.
    fn sizes_of(&self, paths: &[PathBuf]) -> HashMap<PathBuf, u64>;

    fn size_of(&self, path: &Path) -> u64 {
        let paths = [path.to_path_buf()];
        self.sizes_of(&paths).get(path).copied().unwrap_or(0)
    }
}

/// Probe backed by the system `du` utility. One process per batch, sizes in
/// allocated 1024-byte blocks.
pub struct DuProbe {
    du_path: PathBuf,
}

impl DuProbe {
    pub fn new() -> Self {
        Self {
            du_path: PathBuf::from(DU_BIN),
        }
    }

    pub fn with_path(du_path: PathBuf) -> Self {
        Self { du_path }
    }

    pub fn available(&self) -> bool {
        self.du_path.exists()
    }
}

impl Default for DuProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SizeProbe for DuProbe {
    fn sizes_of(&self, paths: &[PathBuf]) -> HashMap<PathBuf, u64> {
        if paths.is_empty() {
            return HashMap::new();
        }

        let output = match Command::new(&self.du_path).arg("-sk").args(paths).output() {
            Ok(output) => output,
            Err(err) => {
                debug!("du failed to launch: {err}");
                return HashMap::new();
            }
        };

        // du exits non-zero when any requested path is missing but still
        // reports the rest on stdout, so the exit status is ignored.
        parse_du_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Pure-walk substitute for platforms or sandboxes without the external
/// utility. Reports logical file sizes rather than allocated blocks.
pub struct WalkProbe;

impl SizeProbe for WalkProbe {
    fn sizes_of(&self, paths: &[PathBuf]) -> HashMap<PathBuf, u64> {
        let cancel = CancellationToken::new();
        paths
            .iter()
            .filter(|p| p.exists())
            .map(|p| (p.clone(), directory_size(p, &cancel)))
            .collect()
    }
}

/// Picks the `du` probe when the binary is present, falling back to the
/// pure walk otherwise.
pub fn select_probe(du_path: Option<PathBuf>) -> Arc<dyn SizeProbe> {
    let du = match du_path {
        Some(path) => DuProbe::with_path(path),
        None => DuProbe::new(),
    };

    if du.available() {
        Arc::new(du)
    } else {
        debug!("du binary not found, using walk probe");
        Arc::new(WalkProbe)
    }
}

fn parse_du_output(output: &str) -> HashMap<PathBuf, u64> {
    let mut sizes = HashMap::new();

    for line in output.lines() {
        if let Some((path, bytes)) = parse_du_line(line) {
            sizes.insert(path, bytes);
        }
    }

    sizes
}

fn parse_du_line(line: &str) -> Option<(PathBuf, u64)> {
    let parts: Vec<&str> = line.splitn(2, '\t').collect();
    if parts.len() != 2 {
        return None;
    }

    let kilobytes: u64 = parts[0].trim().parse().ok()?;
    let path = parts[1];
    if path.is_empty() {
        return None;
    }

    Some((PathBuf::from(path), kilobytes * 1024))
}
