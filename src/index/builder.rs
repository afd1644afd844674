//! Single-threaded fold of scan results into the inverted index.
//!
//! The parallel scan collects edges concurrently; document numbering and
//! posting insertion happen here on one thread so ids assign densely and the
//! resulting index is deterministic for identical inputs.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::index::{DependencyIndex, Document};
use crate::registry::DocumentRegistry;
use crate::scanning::ReferenceGraph;
use crate::types::AssetId;

/// Summary of one completed build.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub documents: usize,
    pub edges: usize,
    pub weak_edges: usize,
    pub elapsed: Duration,
    pub blob_bytes: u64,
}

pub struct IndexBuilder<'a> {
    registry: &'a DocumentRegistry,
    graph: &'a ReferenceGraph,
    packages_prefix: String,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(registry: &'a DocumentRegistry, graph: &'a ReferenceGraph, packages_root: &str) -> Self {
        Self {
            registry,
            graph,
            packages_prefix: format!("{}/", packages_root.to_lowercase()),
        }
    }

    pub fn build(&self) -> DependencyIndex {
        let mut index = DependencyIndex::new();

        self.add_registered_documents(&mut index);
        self.add_outgoing(&mut index);
        self.add_incoming(&mut index);

        index
    }

    fn add_registered_documents(&self, index: &mut DependencyIndex) {
        for (id, path) in self.registry.documents() {
            let is_folder = self.registry.is_folder(&id);
            let extension = if is_folder {
                None
            } else {
                Path::new(&path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(String::from)
            };
            let is_package = path.starts_with(&self.packages_prefix);

            let doc = index.add_document(Document {
                id,
                path: Some(path.clone()),
                extension: extension.clone(),
                is_folder,
                is_package,
            });

            index.add_exact_word("all", doc);
            index.add_exact_word(&id.to_hex(), doc);
            index.add_property("id", &id.to_hex(), doc);
            index.add_property("path", &path, doc);
            if let Some(ext) = &extension {
                index.add_property("t", ext, doc);
            }
            index.add_property("is", if is_folder { "folder" } else { "file" }, doc);
            if is_package {
                index.add_property("is", "package", doc);
            }
            for word in path_components(&path) {
                index.add_word(word, doc);
            }
        }
    }

    fn add_outgoing(&self, index: &mut DependencyIndex) {
        for (from, targets) in self.graph.outgoing() {
            let Some(doc) = index.doc_id(&from) else {
                continue;
            };
            index.add_number("out", targets.len() as u64, doc);
            for target in &targets {
                index.add_property("to", &target.to_hex(), doc);
                if let Some(path) = self.registry.path_of(target) {
                    index.add_property("to", &path, doc);
                }
                if self.graph.is_weak(&from, target) {
                    index.add_property("weak", &target.to_hex(), doc);
                    if let Some(path) = self.registry.path_of(target) {
                        index.add_property("weak", &path, doc);
                    }
                }
            }
        }
    }

    fn add_incoming(&self, index: &mut DependencyIndex) {
        // referrer id -> missing targets it structurally references
        let mut broken: BTreeMap<AssetId, Vec<AssetId>> = BTreeMap::new();

        for (to, sources) in self.graph.incoming() {
            let doc = match index.doc_id(&to) {
                Some(doc) => doc,
                None => {
                    // Referenced but never scanned: the document exists only
                    // as an id.
                    let doc = index.add_document(Document {
                        id: to,
                        path: None,
                        extension: None,
                        is_folder: false,
                        is_package: false,
                    });
                    index.add_exact_word(&to.to_hex(), doc);
                    index.add_property("id", &to.to_hex(), doc);
                    doc
                }
            };

            index.add_number("in", sources.len() as u64, doc);
            for source in &sources {
                index.add_property("from", &source.to_hex(), doc);
                if let Some(path) = self.registry.path_of(source) {
                    index.add_property("from", &path, doc);
                }
            }

            if self.registry.is_resolvable(&to) {
                index.add_property("is", "valid", doc);
            } else {
                index.add_property("is", "missing", doc);
                let referrers: Vec<String> = sources
                    .iter()
                    .map(|s| self.registry.path_of(s).unwrap_or_else(|| s.to_hex()))
                    .collect();
                index.add_metadata(doc, format!("Referred by {}", referrers.join(", ")));

                // Weak references resolve against registered documents at
                // scan time, so they never reach a missing target. The check
                // keeps the invariant explicit.
                for source in &sources {
                    if !self.graph.is_weak(source, &to) {
                        broken.entry(*source).or_default().push(to);
                    }
                }
            }
        }

        for (source, mut missing) in broken {
            let Some(doc) = index.doc_id(&source) else {
                continue;
            };
            index.add_property("is", "broken", doc);
            missing.sort();
            let list: Vec<String> = missing.iter().map(|m| m.to_hex()).collect();
            index.add_metadata(doc, format!("Broken links {}", list.join(", ")));
        }
    }
}

/// Free-text word components of a normalized path.
fn path_components(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '.', '_', '-', ' '])
        .filter(|part| !part.is_empty())
}
