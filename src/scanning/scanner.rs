//! Parallel reference scan over sidecars and asset bodies.
//!
//! The scan fills two shared structures: the [`DocumentRegistry`] (id and
//! path bookkeeping) and the [`ReferenceGraph`] (forward and reverse edge
//! sets, with weak-edge provenance). Single-file failures are logged and
//! skipped so one unreadable asset never aborts a build.

use dashmap::{DashMap, DashSet};
use rayon::prelude::*;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::config::Settings;
use crate::debug_event;
use crate::error::{Error, Result};
use crate::registry::{DocumentRegistry, normalize_path};
use crate::scanning::patterns::extract_ids;
use crate::scanning::script::process_script;
use crate::scanning::walker::{ProjectWalker, ScanEntry};
use crate::types::AssetId;

/// Directed reference edges collected during a scan.
///
/// Every tracked document is seeded into both maps so untargeted documents
/// still answer `in`/`out` counts with zero.
#[derive(Default)]
pub struct ReferenceGraph {
    forward: DashMap<AssetId, DashSet<AssetId>>,
    reverse: DashMap<AssetId, DashSet<AssetId>>,
    weak: DashSet<(AssetId, AssetId)>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed empty edge sets for a tracked document.
    pub fn track(&self, id: AssetId) {
        self.forward.entry(id).or_default();
        self.reverse.entry(id).or_default();
    }

    /// Insert an edge into both directions. Self-edges and edges touching an
    /// ignored id are discarded. Re-insertion is a no-op.
    pub fn add_edge(
        &self,
        registry: &DocumentRegistry,
        from: AssetId,
        to: AssetId,
        weak: bool,
    ) {
        if from == to || registry.is_ignored(&from) || registry.is_ignored(&to) {
            return;
        }
        self.forward.entry(from).or_default().insert(to);
        self.reverse.entry(to).or_default().insert(from);
        if weak {
            self.weak.insert((from, to));
        }
    }

    pub fn is_weak(&self, from: &AssetId, to: &AssetId) -> bool {
        self.weak.contains(&(*from, *to))
    }

    /// Sorted snapshot of outgoing edges per document.
    pub fn outgoing(&self) -> Vec<(AssetId, Vec<AssetId>)> {
        Self::snapshot(&self.forward)
    }

    /// Sorted snapshot of incoming edges per document.
    pub fn incoming(&self) -> Vec<(AssetId, Vec<AssetId>)> {
        Self::snapshot(&self.reverse)
    }

    fn snapshot(map: &DashMap<AssetId, DashSet<AssetId>>) -> Vec<(AssetId, Vec<AssetId>)> {
        let mut entries: Vec<(AssetId, Vec<AssetId>)> = map
            .iter()
            .map(|entry| {
                let mut targets: Vec<AssetId> = entry.value().iter().map(|t| *t).collect();
                targets.sort();
                (*entry.key(), targets)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn edge_count(&self) -> usize {
        self.forward.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn weak_edge_count(&self) -> usize {
        self.weak.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStats {
    pub sidecars: usize,
    pub scripts: usize,
}

/// Runs the parallel scan pass over a project tree.
pub struct ReferenceScanner<'a> {
    settings: Arc<Settings>,
    registry: &'a DocumentRegistry,
    graph: &'a ReferenceGraph,
}

impl<'a> ReferenceScanner<'a> {
    pub fn new(
        settings: Arc<Settings>,
        registry: &'a DocumentRegistry,
        graph: &'a ReferenceGraph,
    ) -> Self {
        Self {
            settings,
            registry,
            graph,
        }
    }

    /// Scan the project tree rooted at `root`.
    ///
    /// Sidecars are processed first so the registry and alias map are
    /// complete before the script pass resolves quoted literals against them.
    pub fn scan(&self, root: &Path) -> Result<ScanStats> {
        if !root.exists() {
            return Err(Error::ProjectRoot {
                path: root.to_path_buf(),
            });
        }

        let walker = ProjectWalker::new(self.settings.clone());
        let mut sidecars = Vec::new();
        let mut scripts = Vec::new();
        for entry in walker.walk(root) {
            match entry {
                ScanEntry::Sidecar(path) => sidecars.push(path),
                ScanEntry::Script(path) => scripts.push(path),
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.scan.parallel_threads)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        pool.install(|| {
            sidecars
                .par_iter()
                .for_each(|sidecar| self.process_sidecar(root, sidecar));
        });

        pool.install(|| {
            scripts
                .par_iter()
                .for_each(|script| process_script(self.registry, self.graph, root, script));
        });

        Ok(ScanStats {
            sidecars: sidecars.len(),
            scripts: scripts.len(),
        })
    }

    fn process_sidecar(&self, root: &Path, sidecar: &Path) {
        // The asset lives next to its sidecar, minus the meta extension.
        let asset = sidecar.with_extension("");
        if !asset.exists() {
            debug_event!("scan", "dangling sidecar", "{}", sidecar.display());
            return;
        }

        let Some(id) = self.registry.sidecar_id(sidecar) else {
            debug_event!("scan", "sidecar without id", "{}", sidecar.display());
            return;
        };
        if self.registry.is_ignored(&id) {
            return;
        }

        let Ok(rel) = asset.strip_prefix(root) else {
            return;
        };
        let rel_norm = normalize_path(&rel.to_string_lossy());

        self.registry.register(id, &rel_norm);
        self.registry.add_aliases(&rel_norm, id);
        self.graph.track(id);

        if asset.is_dir() {
            // Directory sidecars register the folder itself; there is no
            // content to scan.
            self.registry.mark_folder(id);
            return;
        }

        match std::fs::read_to_string(sidecar) {
            Ok(text) => self.collect_references(id, &text),
            Err(e) => {
                debug_event!("scan", "unreadable sidecar", "{}: {e}", sidecar.display());
            }
        }

        if has_yaml_header(&asset) {
            match std::fs::read_to_string(&asset) {
                Ok(text) => self.collect_references(id, &text),
                Err(e) => {
                    debug_event!("scan", "unreadable asset", "{}: {e}", asset.display());
                }
            }
        }
    }

    fn collect_references(&self, from: AssetId, text: &str) {
        for target in extract_ids(text) {
            self.graph.add_edge(self.registry, from, target, false);
        }
    }
}

/// Text assets start with a 5-byte `%YAML` signature; anything else is
/// binary and not worth scanning.
fn has_yaml_header(path: &Path) -> bool {
    let mut buf = [0u8; 5];
    match std::fs::File::open(path).and_then(|mut f| f.read_exact(&mut buf)) {
        Ok(()) => &buf == b"%YAML",
        Err(_) => false,
    }
}
