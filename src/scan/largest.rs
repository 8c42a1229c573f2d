use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use super::walk;
use crate::catalog;
use crate::model::CategoryItem;

/// Sweeps the given roots for files larger than `threshold`, racing a
/// deadline. Each root walks on its own blocking task and reports its
/// batch when done; roots still walking when the deadline fires are
/// cancelled and their partial batches dropped. Returns the global top
/// `limit` by size, possibly empty, never an error.
pub async fn scan_largest_files(
    roots: Vec<PathBuf>,
    threshold: u64,
    limit: usize,
    deadline: Duration,
) -> Vec<CategoryItem> {
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<CategoryItem>>();

    let mut spawned = 0usize;
    for root in roots {
        if !root.is_dir() {
            continue;
        }
        spawned += 1;
        let tx = tx.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let found = collect_large_files(&root, threshold, &cancel);
            let _ = tx.send(found);
        });
    }
    drop(tx);

    if spawned == 0 {
        return Vec::new();
    }

    let mut merged: Vec<CategoryItem> = Vec::new();
    let timer = tokio::time::sleep(deadline);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            batch = rx.recv() => match batch {
                Some(mut items) => merged.append(&mut items),
                None => break,
            },
            _ = &mut timer => {
                debug!("largest-files sweep hit its {deadline:?} deadline");
                cancel.cancel();
                // Batches that landed before the deadline still count.
                while let Ok(mut items) = rx.try_recv() {
                    merged.append(&mut items);
                }
                break;
            }
        }
    }

    merged.sort_by(|a, b| b.size.cmp(&a.size));
    merged.truncate(limit);
    merged
}

fn collect_large_files(root: &Path, threshold: u64, cancel: &CancellationToken) -> Vec<CategoryItem> {
    let mut found = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || walk::should_visit(e));

    for entry in walker {
        if cancel.is_cancelled() {
            debug!("sweep cancelled under {}", root.display());
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.len() <= threshold {
            continue;
        }

        let modified = meta.modified().ok().map(|t| t.into());
        found.push(
            CategoryItem::new(
                entry.path().to_path_buf(),
                meta.len(),
                false,
                catalog::DEFAULT_COLOR,
            )
            .with_modified(modified),
        );
    }

    found
}
