//! Concurrent document registry for a single scan pass.
//!
//! Tracks bidirectional id to path mappings, lowercase alias keys for the
//! script scanner, and the set of ids excluded from tracking. The registry is
//! append-only while a scan runs; every build constructs a fresh one.

use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::types::AssetId;

/// Normalize a project-relative path to the registry's key form:
/// lowercase, forward slashes only.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

pub struct DocumentRegistry {
    id_to_path: DashMap<AssetId, String>,
    path_to_id: DashMap<String, AssetId>,
    aliases: DashMap<String, AssetId>,
    sidecar_cache: DashMap<PathBuf, Option<AssetId>>,
    folders: DashSet<AssetId>,
    builtins: HashSet<AssetId>,
    ignored: HashSet<AssetId>,
}

impl DocumentRegistry {
    pub fn new(ignored: HashSet<AssetId>) -> Self {
        Self {
            id_to_path: DashMap::new(),
            path_to_id: DashMap::new(),
            aliases: DashMap::new(),
            sidecar_cache: DashMap::new(),
            folders: DashSet::new(),
            builtins: HashSet::new(),
            ignored,
        }
    }

    pub fn is_ignored(&self, id: &AssetId) -> bool {
        self.ignored.contains(id)
    }

    /// Register a document. First writer wins on both directions; ignored ids
    /// are dropped. Returns true when the id was newly registered.
    pub fn register(&self, id: AssetId, path: &str) -> bool {
        if self.is_ignored(&id) {
            return false;
        }
        let normalized = normalize_path(path);
        let inserted = match self.id_to_path.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(normalized.clone());
                true
            }
        };
        self.path_to_id.entry(normalized).or_insert(id);
        inserted
    }

    /// Mark a host-builtin id as tracked. When the host can name a path for
    /// it, the id registers like any document; otherwise it only counts as
    /// resolvable so references to it never classify as missing.
    pub fn register_builtin(&mut self, id: AssetId, path: Option<&str>) {
        if self.is_ignored(&id) {
            return;
        }
        match path {
            Some(p) => {
                self.register(id, p);
            }
            None => {
                self.builtins.insert(id);
            }
        }
    }

    /// Register the lowercase alias forms for a document path: full path,
    /// file stem, file name, and `dir/stem`.
    pub fn add_aliases(&self, path: &str, id: AssetId) {
        let normalized = normalize_path(path);
        self.aliases.entry(normalized.clone()).or_insert(id);

        let p = Path::new(&normalized);
        if let Some(stem) = p.file_stem().and_then(|s| s.to_str()) {
            self.aliases.entry(stem.to_string()).or_insert(id);
            if let Some(dir) = p
                .parent()
                .and_then(|d| d.file_name())
                .and_then(|d| d.to_str())
            {
                self.aliases.entry(format!("{dir}/{stem}")).or_insert(id);
            }
        }
        if let Some(name) = p.file_name().and_then(|s| s.to_str()) {
            self.aliases.entry(name.to_string()).or_insert(id);
        }
    }

    /// Lowercase alias lookup used by the script scanner.
    pub fn alias_of(&self, text: &str) -> Option<AssetId> {
        self.aliases.get(text).map(|entry| *entry.value())
    }

    pub fn path_of(&self, id: &AssetId) -> Option<String> {
        self.id_to_path.get(id).map(|entry| entry.value().clone())
    }

    pub fn id_of(&self, path: &str) -> Option<AssetId> {
        self.path_to_id
            .get(&normalize_path(path))
            .map(|entry| *entry.value())
    }

    /// Mark a registered document as a directory.
    pub fn mark_folder(&self, id: AssetId) {
        self.folders.insert(id);
    }

    pub fn is_folder(&self, id: &AssetId) -> bool {
        self.folders.contains(id)
    }

    /// Whether references to this id resolve to a known document.
    pub fn is_resolvable(&self, id: &AssetId) -> bool {
        self.id_to_path.contains_key(id) || self.builtins.contains(id)
    }

    /// Read the id from a sidecar file's `guid:` line. Results are cached per
    /// sidecar path, including negative ones.
    pub fn sidecar_id(&self, sidecar: &Path) -> Option<AssetId> {
        if let Some(cached) = self.sidecar_cache.get(sidecar) {
            return *cached.value();
        }
        let resolved = std::fs::read_to_string(sidecar)
            .ok()
            .and_then(|text| parse_sidecar_id(&text));
        self.sidecar_cache.insert(sidecar.to_path_buf(), resolved);
        resolved
    }

    /// Sorted snapshot of all registered documents.
    pub fn documents(&self) -> Vec<(AssetId, String)> {
        let mut docs: Vec<(AssetId, String)> = self
            .id_to_path
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        docs.sort();
        docs
    }

    pub fn len(&self) -> usize {
        self.id_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_path.is_empty()
    }
}

/// Extract the id from the first `guid:` line of sidecar text. Accepts the
/// plain 32-hex form and the dashed UUID form.
pub fn parse_sidecar_id(text: &str) -> Option<AssetId> {
    for line in text.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("guid:") {
            if let Some(id) = AssetId::parse(rest.trim()) {
                return Some(id);
            }
        }
    }
    None
}
