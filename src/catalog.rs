use crate::model::Category;
use std::path::{Path, PathBuf};

pub const DEFAULT_COLOR: &str = "4D4C48";
pub const DEFAULT_ICON: &str = "folder";

struct CategoryDef {
    id: &'static str,
    name: &'static str,
    // Entries starting with '/' are absolute, everything else hangs off the
    // granted root.
    path: &'static str,
}

const CATALOG: &[CategoryDef] = &[
    CategoryDef {
        id: "system_junk",
        name: "System Junk",
        path: "Library/Caches",
    },
    CategoryDef {
        id: "user_library",
        name: "Application Support",
        path: "Library/Application Support",
    },
    CategoryDef {
        id: "downloads",
        name: "Downloads",
        path: "Downloads",
    },
    CategoryDef {
        id: "containers",
        name: "Containers",
        path: "Library/Containers",
    },
    CategoryDef {
        id: "desktop",
        name: "Desktop",
        path: "Desktop",
    },
    CategoryDef {
        id: "media",
        name: "Movies",
        path: "Movies",
    },
    CategoryDef {
        id: "documents",
        name: "Documents",
        path: "Documents",
    },
    CategoryDef {
        id: "applications",
        name: "Applications",
        path: "/Applications",
    },
];

pub fn color_for(id: &str) -> &'static str {
    match id {
        "system_junk" => "D97757",
        "user_library" => "4A90E2",
        "downloads" => "7ED321",
        "containers" => "9B59B6",
        "desktop" => "AAB7B8",
        "media" => "BD10E0",
        "documents" => "F5A623",
        "applications" => "50E3C2",
        _ => DEFAULT_COLOR,
    }
}

pub fn icon_for(id: &str) -> &'static str {
    match id {
        "system_junk" => "gearshape.2.fill",
        "user_library" => "folder.fill",
        "downloads" => "arrow.down.circle.fill",
        "containers" => "archivebox.fill",
        "desktop" => "desktopcomputer",
        "media" => "film.fill",
        "documents" => "doc.fill",
        "applications" => "app.fill",
        _ => DEFAULT_ICON,
    }
}

fn resolve(root: &Path, raw: &str) -> PathBuf {
    if raw.starts_with('/') {
        PathBuf::from(raw)
    } else {
        root.join(raw)
    }
}

/// Expands the fixed catalog against a resolved root. Order is the display
/// order and stays stable across calls.
pub fn build_categories(root: &Path) -> Vec<Category> {
    CATALOG
        .iter()
        .map(|def| {
            Category::new(
                def.id,
                def.name,
                resolve(root, def.path),
                color_for(def.id),
                icon_for(def.id),
            )
        })
        .collect()
}

/// Roots covered by the largest-files sweep.
pub fn sweep_roots(root: &Path) -> Vec<PathBuf> {
    vec![
        root.join("Downloads"),
        root.join("Documents"),
        root.join("Desktop"),
        root.join("Movies"),
        root.join("Music"),
        root.join("Library/Application Support"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_eight_categories() {
        let categories = build_categories(Path::new("/Users/test"));
        assert_eq!(categories.len(), 8);
    }

    #[test]
    fn test_every_category_has_id_name_and_path() {
        let categories = build_categories(Path::new("/Users/test"));
        for cat in &categories {
            assert!(!cat.id.is_empty());
            assert!(!cat.name.is_empty());
            assert!(cat.path.as_os_str().len() > 0);
        }
    }

    #[test]
    fn test_category_ids_are_unique() {
        let categories = build_categories(Path::new("/Users/test"));
        let mut ids: Vec<_> = categories.iter().map(|c| c.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_relative_paths_hang_off_the_root() {
        let categories = build_categories(Path::new("/Users/test"));
        let downloads = categories.iter().find(|c| c.id == "downloads").unwrap();
        assert_eq!(downloads.path, PathBuf::from("/Users/test/Downloads"));
    }

    #[test]
    fn test_applications_is_absolute() {
        let categories = build_categories(Path::new("/Users/test"));
        let apps = categories.iter().find(|c| c.id == "applications").unwrap();
        assert_eq!(apps.path, PathBuf::from("/Applications"));
    }

    #[test]
    fn test_known_ids_have_fixed_colors_and_icons() {
        assert_eq!(color_for("system_junk"), "D97757");
        assert_eq!(icon_for("system_junk"), "gearshape.2.fill");
        assert_eq!(color_for("downloads"), "7ED321");
        assert_eq!(icon_for("downloads"), "arrow.down.circle.fill");
        assert_eq!(color_for("documents"), "F5A623");
        assert_eq!(icon_for("documents"), "doc.fill");
        assert_eq!(icon_for("desktop"), "desktopcomputer");
    }

    #[test]
    fn test_unknown_id_falls_back_to_defaults() {
        assert_eq!(color_for("no_such_category"), DEFAULT_COLOR);
        assert_eq!(icon_for("no_such_category"), DEFAULT_ICON);
    }

    #[test]
    fn test_sweep_roots_sit_under_the_root() {
        let roots = sweep_roots(Path::new("/Users/test"));
        assert_eq!(roots.len(), 6);
        for root in &roots {
            assert!(root.starts_with("/Users/test"));
        }
    }
}
