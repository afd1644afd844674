//! Build orchestration and index handoff.
//!
//! The service owns the current index behind a mutex and swaps it wholesale
//! after a successful build. Readers clone the `Arc` and keep querying the
//! old snapshot while a rebuild runs; only one build may run at a time.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::index::persistence;
use crate::index::search::{SearchResult, search};
use crate::index::{BuildStats, DependencyIndex, IndexBuilder};
use crate::query::parse_query;
use crate::registry::DocumentRegistry;
use crate::scanning::{ReferenceGraph, ReferenceScanner};
use crate::types::AssetId;

/// Resolves ids the host knows about outside the scanned tree, such as
/// builtin resources shipped with the editor.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, id: &AssetId) -> Option<String>;
}

/// Resolver for hosts with no out-of-tree documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHostResolver;

impl PathResolver for NoHostResolver {
    fn resolve(&self, _id: &AssetId) -> Option<String> {
        None
    }
}

#[derive(Default)]
struct ServiceState {
    index: Option<Arc<DependencyIndex>>,
    building: bool,
}

pub struct DependencyService {
    settings: Arc<Settings>,
    resolver: Box<dyn PathResolver>,
    state: Mutex<ServiceState>,
    ready: Condvar,
    use_counts: DashMap<AssetId, u64>,
}

impl DependencyService {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self::with_resolver(settings, Box::new(NoHostResolver))
    }

    pub fn with_resolver(settings: Arc<Settings>, resolver: Box<dyn PathResolver>) -> Self {
        Self {
            settings,
            resolver,
            state: Mutex::new(ServiceState::default()),
            ready: Condvar::new(),
            use_counts: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Scan, build, persist and install a fresh index.
    ///
    /// Returns [`Error::BuildInProgress`] when another build holds the slot.
    pub fn build(&self) -> Result<BuildStats> {
        {
            let mut state = self.state.lock();
            if state.building {
                return Err(Error::BuildInProgress);
            }
            state.building = true;
        }

        let result = self.run_build();

        let mut state = self.state.lock();
        state.building = false;
        match result {
            Ok((index, stats)) => {
                state.index = Some(Arc::new(index));
                drop(state);
                self.use_counts.clear();
                self.ready.notify_all();
                Ok(stats)
            }
            Err(e) => {
                drop(state);
                self.ready.notify_all();
                Err(e)
            }
        }
    }

    /// Run [`build`](Self::build) on a background thread.
    pub fn build_background(self: &Arc<Self>) -> std::thread::JoinHandle<Result<BuildStats>> {
        let service = Arc::clone(self);
        std::thread::spawn(move || service.build())
    }

    fn run_build(&self) -> Result<(DependencyIndex, BuildStats)> {
        let started = Instant::now();
        let root = self.settings.project_root();
        crate::log_event!("build", "scanning", "{}", root.display());

        let ignored: HashSet<AssetId> = self
            .settings
            .scan
            .ignore_ids
            .iter()
            .filter_map(|raw| AssetId::parse(raw))
            .collect();
        let mut registry = DocumentRegistry::new(ignored);
        for raw in &self.settings.scan.builtin_ids {
            let Some(id) = AssetId::parse(raw) else {
                tracing::warn!("invalid builtin id in configuration: {raw}");
                continue;
            };
            let path = self.resolver.resolve(&id);
            registry.register_builtin(id, path.as_deref());
        }

        let graph = ReferenceGraph::new();
        let scan = ReferenceScanner::new(self.settings.clone(), &registry, &graph).scan(&root)?;

        let index =
            IndexBuilder::new(&registry, &graph, &self.settings.scan.packages_root).build();

        let blob_bytes = persistence::save(&index, &self.settings.blob_path())?;

        let stats = BuildStats {
            documents: index.len(),
            edges: graph.edge_count(),
            weak_edges: graph.weak_edge_count(),
            elapsed: started.elapsed(),
            blob_bytes,
        };
        crate::log_event!(
            "build",
            "index written",
            "{} documents, {} edges ({} weak) from {} sidecars and {} scripts in {:?}",
            stats.documents,
            stats.edges,
            stats.weak_edges,
            scan.sidecars,
            scan.scripts,
            stats.elapsed
        );
        Ok((index, stats))
    }

    /// Make sure an index is installed: reuse the current one, load a
    /// persisted blob, or build from scratch as a last resort.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.wait_ready().is_some() {
            return Ok(());
        }

        let blob = self.settings.blob_path();
        if persistence::exists(&blob) {
            match persistence::load(&blob) {
                Ok(index) => {
                    self.install(index);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("discarding unreadable index blob: {e}");
                }
            }
        }

        match self.build() {
            Ok(_) => Ok(()),
            // Someone else is already building; their result serves us too.
            Err(Error::BuildInProgress) => match self.wait_ready() {
                Some(_) => Ok(()),
                None => Err(Error::IndexNotBuilt),
            },
            Err(e) => Err(e),
        }
    }

    /// Parse and evaluate a query, building or loading the index first when
    /// none is installed. `first` caps the result list. A query that fails
    /// to parse matches nothing.
    pub fn query(&self, input: &str, first: Option<usize>) -> Result<Vec<SearchResult>> {
        let Some(parsed) = parse_query(input) else {
            tracing::debug!("unparseable query: {input}");
            return Ok(Vec::new());
        };

        self.ensure_ready()?;
        let index = self.wait_ready().ok_or(Error::IndexNotBuilt)?;

        let mut results = search(&index, &parsed);
        if let Some(n) = first {
            results.truncate(n);
        }
        Ok(results)
    }

    /// Evaluate a query against the installed index only. Returns `None`
    /// while no index is available rather than triggering a build.
    pub fn try_query(&self, input: &str) -> Option<Vec<SearchResult>> {
        let index = self.snapshot()?;
        let Some(parsed) = parse_query(input) else {
            return Some(Vec::new());
        };
        Some(search(&index, &parsed))
    }

    /// Path for an id, from the index when known, otherwise from the host
    /// resolver.
    pub fn resolve_path(&self, id: &AssetId) -> Option<String> {
        if let Some(index) = self.snapshot() {
            if let Some(path) = index
                .doc_id(id)
                .and_then(|doc| index.document(doc))
                .and_then(|d| d.path.clone())
            {
                return Some(path);
            }
        }
        self.resolver.resolve(id)
    }

    /// How many documents reference this id. Cached per id until the next
    /// index swap; ids the index never saw count zero.
    pub fn use_by_count(&self, id: &AssetId) -> u64 {
        if let Some(cached) = self.use_counts.get(id) {
            return *cached.value();
        }
        let count = self
            .snapshot()
            .and_then(|index| {
                let doc = index.doc_id(id)?;
                index.number_of("in", doc)
            })
            .unwrap_or(0);
        self.use_counts.insert(*id, count);
        count
    }

    fn install(&self, index: DependencyIndex) {
        let mut state = self.state.lock();
        state.index = Some(Arc::new(index));
        drop(state);
        self.use_counts.clear();
        self.ready.notify_all();
    }

    fn snapshot(&self) -> Option<Arc<DependencyIndex>> {
        self.state.lock().index.clone()
    }

    /// Current index snapshot, waiting out any in-flight build first.
    fn wait_ready(&self) -> Option<Arc<DependencyIndex>> {
        let mut state = self.state.lock();
        while state.building {
            self.ready.wait(&mut state);
        }
        state.index.clone()
    }
}
