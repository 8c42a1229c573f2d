pub mod largest;
pub mod probe;
pub mod walk;

pub use largest::scan_largest_files;
pub use probe::{select_probe, DuProbe, SizeProbe, WalkProbe};
pub use walk::directory_size;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::{Category, CategoryItem};

// Cache directories the OS withholds even from a granted scan; listing
// them stalls or fails, so they are dropped by name up front.
const PROTECTED_CACHE_NAMES: &[&str] = &[
    "com.apple.findmy.fmipcore",
    "com.apple.HomeKit",
    "com.apple.CloudKit",
    "com.apple.ap.adprivacyd",
    "com.apple.homed",
    "com.apple.Music",
    "FamilyCircle",
];

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub item_limit: usize,
    pub largest_threshold: u64,
    pub largest_limit: usize,
    pub sweep_timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            item_limit: 100,
            largest_threshold: 100 * 1024 * 1024,
            largest_limit: 20,
            sweep_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// Progress events emitted while a scan runs. The most recent
/// `CategoryFinished` doubles as the "currently scanning" label.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    ScanStarted {
        total: usize,
    },
    CategoryFinished {
        id: String,
        name: String,
        size: u64,
        item_count: usize,
        completed: usize,
        total: usize,
    },
    SweepStarted,
    SweepFinished {
        item_count: usize,
    },
    ScanFinished,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub categories: Vec<Category>,
    pub largest_files: Vec<CategoryItem>,
    pub duration: Duration,
}

#[derive(Debug, Default)]
struct CategoryListing {
    size: u64,
    items: Vec<CategoryItem>,
}

/// Coordinates the full scan: one task per category fans out, results
/// join back here in arrival order, and nothing else writes category
/// state. Per-category reloads go through `load_items`, where each new
/// request supersedes the one before it.
pub struct ScanOrchestrator {
    probe: Arc<dyn SizeProbe>,
    sweep_roots: Vec<PathBuf>,
    options: ScanOptions,
    events: broadcast::Sender<ScanEvent>,
    reload_cancel: Mutex<CancellationToken>,
}

impl ScanOrchestrator {
    pub fn new(probe: Arc<dyn SizeProbe>, sweep_roots: Vec<PathBuf>, options: ScanOptions) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            probe,
            sweep_roots,
            options,
            events,
            reload_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    /// Scans every category concurrently, then sweeps for the largest
    /// files. A category whose path cannot be listed resolves to zero
    /// and empty items without disturbing the others.
    pub async fn scan_all(&self, categories: Vec<Category>) -> ScanOutcome {
        let start = Instant::now();
        let mut results = categories;
        let total = results.len();
        self.emit(ScanEvent::ScanStarted { total });

        for cat in results.iter_mut() {
            cat.is_scanning = true;
        }

        let mut tasks = JoinSet::new();
        for (index, cat) in results.iter().enumerate() {
            let probe = Arc::clone(&self.probe);
            let path = cat.path.clone();
            let color = cat.color.clone();
            let item_limit = self.options.item_limit;
            tasks.spawn(async move {
                let listing = tokio::task::spawn_blocking(move || {
                    list_category(&path, &color, probe.as_ref(), item_limit)
                })
                .await
                .unwrap_or_default();
                (index, listing)
            });
        }

        let mut completed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok((index, listing)) => {
                    let cat = &mut results[index];
                    cat.size = listing.size;
                    cat.items = listing.items;
                    cat.is_scanning = false;
                    self.emit(ScanEvent::CategoryFinished {
                        id: cat.id.clone(),
                        name: cat.name.clone(),
                        size: cat.size,
                        item_count: cat.item_count(),
                        completed,
                        total,
                    });
                }
                Err(err) => warn!("category task failed: {err}"),
            }
        }

        for cat in results.iter_mut() {
            cat.is_scanning = false;
        }

        // Deliberate pause between the last join and the final state
        // transition; consumers rely on the pacing.
        tokio::time::sleep(self.options.settle_delay).await;

        self.emit(ScanEvent::SweepStarted);
        let largest_files = scan_largest_files(
            self.sweep_roots.clone(),
            self.options.largest_threshold,
            self.options.largest_limit,
            self.options.sweep_timeout,
        )
        .await;
        self.emit(ScanEvent::SweepFinished {
            item_count: largest_files.len(),
        });
        self.emit(ScanEvent::ScanFinished);

        ScanOutcome {
            categories: results,
            largest_files,
            duration: start.elapsed(),
        }
    }

    /// On-demand reload of one category's listing. Last request wins: a
    /// call supersedes any reload still in flight, and a superseded
    /// reload resolves to None so its output is never applied.
    pub async fn load_items(&self, category: &Category) -> Option<Vec<CategoryItem>> {
        let my_token = {
            let mut current = self.reload_cancel.lock().await;
            current.cancel();
            *current = CancellationToken::new();
            current.clone()
        };

        let probe = Arc::clone(&self.probe);
        let path = category.path.clone();
        let color = category.color.clone();
        let item_limit = self.options.item_limit;

        let listing = tokio::task::spawn_blocking(move || {
            list_category(&path, &color, probe.as_ref(), item_limit)
        })
        .await
        .unwrap_or_default();

        if my_token.is_cancelled() {
            debug!("discarding superseded reload for {}", category.id);
            return None;
        }

        Some(listing.items)
    }

    fn emit(&self, event: ScanEvent) {
        let _ = self.events.send(event);
    }
}

/// Lists the immediate children of a category path: hidden and protected
/// names dropped, directories sized in one probe batch, files sized from
/// metadata, merged descending and capped. The category total is the sum
/// of the items that survive.
fn list_category(
    path: &Path,
    color: &str,
    probe: &dyn SizeProbe,
    item_limit: usize,
) -> CategoryListing {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("cannot list {}: {err}", path.display());
            return CategoryListing::default();
        }
    };

    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut files: Vec<(PathBuf, u64)> = Vec::new();

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || PROTECTED_CACHE_NAMES.contains(&name.as_ref()) {
            continue;
        }

        let child = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => dirs.push(child),
            Ok(ft) if ft.is_file() => {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                files.push((child, size));
            }
            _ => {}
        }
    }

    let dir_sizes = probe.sizes_of(&dirs);

    let mut items: Vec<CategoryItem> = Vec::with_capacity(dirs.len() + files.len());
    for dir in dirs {
        let size = dir_sizes.get(&dir).copied().unwrap_or(0);
        let modified = walk::modified_at(&dir);
        items.push(CategoryItem::new(dir, size, true, color).with_modified(modified));
    }
    for (file, size) in files {
        let modified = walk::modified_at(&file);
        items.push(CategoryItem::new(file, size, false, color).with_modified(modified));
    }

    items.sort_by(|a, b| b.size.cmp(&a.size));
    items.truncate(item_limit);

    let size = items.iter().map(|i| i.size).sum();
    CategoryListing { size, items }
}
