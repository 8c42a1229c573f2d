use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One fixed storage category (Downloads, Caches, ...) with its scan state.
#[derive(Debug, Clone)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub color: String,
    pub icon: String,
    pub size: u64,
    pub is_scanning: bool,
    pub items: Vec<CategoryItem>,
}

impl Category {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        path: PathBuf,
        color: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path,
            color: color.into(),
            icon: icon.into(),
            size: 0,
            is_scanning: false,
            items: Vec::new(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// A single file or directory surfaced by a scan. Items are rebuilt from
/// scratch on every pass, so each carries a fresh id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryItem {
    pub id: Uuid,
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_directory: bool,
    pub color: String,
}

impl CategoryItem {
    pub fn new(path: PathBuf, size: u64, is_directory: bool, color: impl Into<String>) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("?")
            .to_string();

        Self {
            id: Uuid::new_v4(),
            path,
            name,
            size,
            modified: None,
            is_directory,
            color: color.into(),
        }
    }

    pub fn with_modified(mut self, dt: Option<DateTime<Utc>>) -> Self {
        self.modified = dt;
        self
    }
}
