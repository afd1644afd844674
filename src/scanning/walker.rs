//! File system walker for discovering sidecar and script files.
//!
//! This module provides efficient directory traversal with support for:
//! - .gitignore rules
//! - Custom ignore patterns from configuration
//! - Sidecar and script extension filtering
//! - Hidden file handling

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;

/// A file the scan pass cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEntry {
    /// A `.meta` sidecar carrying an asset's id and references.
    Sidecar(PathBuf),
    /// A script source scanned for weak references.
    Script(PathBuf),
}

/// Walks directories to find files to scan
pub struct ProjectWalker {
    settings: Arc<Settings>,
}

impl ProjectWalker {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Walk a directory and return an iterator of scan entries
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = ScanEntry> {
        let mut builder = WalkBuilder::new(root);

        builder
            .hidden(false) // visit entries inside non-hidden dirs, filter below
            .git_ignore(true) // respect .gitignore files
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .max_depth(None)
            .require_git(false); // allow gitignore to work in non-git directories

        builder.add_custom_ignore_filename(".depscanignore");

        // Add custom ignore patterns using overrides. This is the correct way
        // to add glob patterns programmatically.
        let mut override_builder = ignore::overrides::OverrideBuilder::new(root);
        for pattern in &self.settings.scan.ignore_patterns {
            // Add as exclusion pattern (prefix with !)
            if let Err(e) = override_builder.add(&format!("!{pattern}")) {
                tracing::warn!("Invalid ignore pattern '{pattern}': {e}");
            }
        }

        if let Ok(overrides) = override_builder.build() {
            builder.overrides(overrides);
        }

        let meta_suffix = format!(".{}", self.settings.scan.meta_extension.to_lowercase());
        let script_extensions: Vec<String> = self
            .settings
            .scan
            .script_extensions
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect();

        builder
            .build()
            .filter_map(Result::ok) // skip files we can't access
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(move |entry| {
                let path = entry.path();

                // Skip hidden files
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with('.') {
                        return None;
                    }
                    if name.to_lowercase().ends_with(&meta_suffix) {
                        return Some(ScanEntry::Sidecar(path.to_path_buf()));
                    }
                }

                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_lowercase())?;
                if script_extensions.contains(&ext) {
                    return Some(ScanEntry::Script(path.to_path_buf()));
                }

                None
            })
    }

    /// Count files that would be scanned (useful for dry runs)
    pub fn count_files(&self, root: &Path) -> usize {
        self.walk(root).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_settings() -> Arc<Settings> {
        Arc::new(Settings::default())
    }

    #[test]
    fn test_walk_classifies_entries() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("rock.mat"), "%YAML 1.1").unwrap();
        fs::write(root.join("rock.mat.meta"), "guid: aa").unwrap();
        fs::write(root.join("Player.cs"), "class Player {}").unwrap();
        fs::write(root.join("README.md"), "# Test").unwrap();

        let walker = ProjectWalker::new(create_test_settings());
        let entries: Vec<_> = walker.walk(root).collect();

        assert_eq!(entries.len(), 2);
        assert!(
            entries
                .iter()
                .any(|e| matches!(e, ScanEntry::Sidecar(p) if p.ends_with("rock.mat.meta")))
        );
        assert!(
            entries
                .iter()
                .any(|e| matches!(e, ScanEntry::Script(p) if p.ends_with("Player.cs")))
        );
    }

    #[test]
    fn test_ignore_hidden_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join(".hidden.meta"), "guid: aa").unwrap();
        fs::write(root.join("visible.meta"), "guid: aa").unwrap();

        let walker = ProjectWalker::new(create_test_settings());
        let entries: Vec<_> = walker.walk(root).collect();

        assert_eq!(entries.len(), 1);
        assert!(matches!(&entries[0], ScanEntry::Sidecar(p) if p.ends_with("visible.meta")));
    }

    #[test]
    fn test_gitignore_respected() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        // Works without git init because of require_git(false)
        fs::write(root.join(".gitignore"), "ignored.mat.meta\n").unwrap();

        fs::write(root.join("ignored.mat.meta"), "guid: aa").unwrap();
        fs::write(root.join("included.mat.meta"), "guid: aa").unwrap();

        let walker = ProjectWalker::new(create_test_settings());
        let entries: Vec<_> = walker.walk(root).collect();

        assert_eq!(entries.len(), 1);
        assert!(matches!(&entries[0], ScanEntry::Sidecar(p) if p.ends_with("included.mat.meta")));
    }

    #[test]
    fn test_custom_ignore_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("library")).unwrap();
        fs::write(root.join("library/cache.meta"), "guid: aa").unwrap();
        fs::write(root.join("kept.meta"), "guid: aa").unwrap();

        let walker = ProjectWalker::new(create_test_settings());
        let entries: Vec<_> = walker.walk(root).collect();

        // Default ignore patterns exclude library/**
        assert_eq!(entries.len(), 1);
        assert!(matches!(&entries[0], ScanEntry::Sidecar(p) if p.ends_with("kept.meta")));
    }

    #[test]
    fn test_script_extensions_from_settings() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("a.cs"), "").unwrap();
        fs::write(root.join("b.lua"), "").unwrap();

        let mut settings = Settings::default();
        settings.scan.script_extensions = vec!["lua".to_string()];
        let walker = ProjectWalker::new(Arc::new(settings));
        let entries: Vec<_> = walker.walk(root).collect();

        assert_eq!(entries.len(), 1);
        assert!(matches!(&entries[0], ScanEntry::Script(p) if p.ends_with("b.lua")));
    }
}
