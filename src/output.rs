use byte_unit::{Byte, UnitType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::model::{Category, CategoryItem};

/// Decimal units, matching how file sizes are reported to users elsewhere
/// on the platform.
pub fn format_size(bytes: u64) -> String {
    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Decimal);
    format!("{adjusted:.1}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDocument {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub root: PathBuf,
    pub categories: Vec<CategoryReport>,
    pub largest_files: Vec<ItemReport>,
    pub total_size_bytes: u64,
    pub total_item_count: usize,
    pub scan_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub color: String,
    pub icon: String,
    pub size_bytes: u64,
    pub item_count: usize,
    pub items: Vec<ItemReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub id: Uuid,
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    pub is_directory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsDocument {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub category_id: String,
    pub category_name: String,
    pub total_size_bytes: u64,
    pub items: Vec<ItemReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LargestDocument {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub threshold_bytes: u64,
    pub items: Vec<ItemReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDocument {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub root: PathBuf,
    pub has_grant: bool,
    pub has_elevated_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<DateTime<Utc>>,
    pub cache_valid: bool,
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub item_count: usize,
}

impl From<&CategoryItem> for ItemReport {
    fn from(item: &CategoryItem) -> Self {
        Self {
            id: item.id,
            path: item.path.clone(),
            name: item.name.clone(),
            size_bytes: item.size,
            modified: item.modified,
            is_directory: item.is_directory,
        }
    }
}

impl From<&Category> for CategoryReport {
    fn from(cat: &Category) -> Self {
        Self {
            id: cat.id.clone(),
            name: cat.name.clone(),
            path: cat.path.clone(),
            color: cat.color.clone(),
            icon: cat.icon.clone(),
            size_bytes: cat.size,
            item_count: cat.item_count(),
            items: cat.items.iter().map(ItemReport::from).collect(),
        }
    }
}

impl From<&Category> for CategorySummary {
    fn from(cat: &Category) -> Self {
        Self {
            id: cat.id.clone(),
            name: cat.name.clone(),
            size_bytes: cat.size,
            item_count: cat.item_count(),
        }
    }
}

impl ScanDocument {
    pub fn new(
        root: PathBuf,
        categories: &[Category],
        largest_files: &[CategoryItem],
        duration_ms: u64,
    ) -> Self {
        let categories: Vec<CategoryReport> = categories.iter().map(CategoryReport::from).collect();
        let total_size_bytes = categories.iter().map(|c| c.size_bytes).sum();
        let total_item_count = categories.iter().map(|c| c.item_count).sum();

        Self {
            version: "1.0".to_string(),
            timestamp: Utc::now(),
            root,
            categories,
            largest_files: largest_files.iter().map(ItemReport::from).collect(),
            total_size_bytes,
            total_item_count,
            scan_duration_ms: duration_ms,
        }
    }
}

impl ItemsDocument {
    pub fn new(category: &Category, items: &[CategoryItem]) -> Self {
        Self {
            version: "1.0".to_string(),
            timestamp: Utc::now(),
            category_id: category.id.clone(),
            category_name: category.name.clone(),
            total_size_bytes: items.iter().map(|i| i.size).sum(),
            items: items.iter().map(ItemReport::from).collect(),
        }
    }
}

impl LargestDocument {
    pub fn new(threshold_bytes: u64, items: &[CategoryItem]) -> Self {
        Self {
            version: "1.0".to_string(),
            timestamp: Utc::now(),
            threshold_bytes,
            items: items.iter().map(ItemReport::from).collect(),
        }
    }
}

impl StatusDocument {
    pub fn new(
        root: PathBuf,
        has_grant: bool,
        has_elevated_access: bool,
        last_scan: Option<DateTime<Utc>>,
        cache_valid: bool,
        categories: &[Category],
    ) -> Self {
        Self {
            version: "1.0".to_string(),
            timestamp: Utc::now(),
            root,
            has_grant,
            has_elevated_access,
            last_scan,
            cache_valid,
            categories: categories.iter().map(CategorySummary::from).collect(),
        }
    }
}
