//! The inverted dependency index.
//!
//! This is just plain data - the whole structure serializes as one blob.
//! Ordered maps keep serialization deterministic: rebuilding over identical
//! inputs yields an identical byte stream.

pub mod builder;
pub mod persistence;
pub mod search;

pub use builder::{BuildStats, IndexBuilder};
pub use search::SearchResult;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use crate::types::{AssetId, DocId};

/// Comparison operators for numeric postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One indexed document: a tracked asset, or a referenced id that never
/// resolved to a path.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Document {
    pub id: AssetId,
    pub path: Option<String>,
    pub extension: Option<String>,
    pub is_folder: bool,
    pub is_package: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DependencyIndex {
    documents: Vec<Document>,
    exact_words: BTreeMap<String, BTreeSet<DocId>>,
    words: BTreeMap<String, BTreeSet<DocId>>,
    properties: BTreeMap<String, BTreeMap<String, BTreeSet<DocId>>>,
    numbers: BTreeMap<String, BTreeMap<u64, BTreeSet<DocId>>>,
    metadata: BTreeMap<DocId, Vec<String>>,

    /// Rebuilt after deserialization, never persisted.
    #[serde(skip)]
    doc_map: HashMap<AssetId, DocId>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, document: Document) -> DocId {
        let id = document.id;
        self.documents.push(document);
        let doc_id = DocId::new(self.documents.len() as u32)
            .unwrap_or_else(|| unreachable!("document table is non-empty"));
        self.doc_map.insert(id, doc_id);
        doc_id
    }

    pub fn doc_id(&self, id: &AssetId) -> Option<DocId> {
        self.doc_map.get(id).copied()
    }

    pub fn document(&self, doc: DocId) -> Option<&Document> {
        self.documents.get(doc.index())
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Restore the id lookup after deserialization.
    pub fn rebuild_lookups(&mut self) {
        self.doc_map = self
            .documents
            .iter()
            .enumerate()
            .filter_map(|(i, document)| DocId::new(i as u32 + 1).map(|d| (document.id, d)))
            .collect();
    }

    pub fn add_exact_word(&mut self, word: &str, doc: DocId) {
        self.exact_words
            .entry(word.to_lowercase())
            .or_default()
            .insert(doc);
    }

    pub fn add_word(&mut self, word: &str, doc: DocId) {
        self.words
            .entry(word.to_lowercase())
            .or_default()
            .insert(doc);
    }

    pub fn add_property(&mut self, name: &str, value: &str, doc: DocId) {
        self.properties
            .entry(name.to_lowercase())
            .or_default()
            .entry(value.to_lowercase())
            .or_default()
            .insert(doc);
    }

    pub fn add_number(&mut self, name: &str, value: u64, doc: DocId) {
        self.numbers
            .entry(name.to_lowercase())
            .or_default()
            .entry(value)
            .or_default()
            .insert(doc);
    }

    pub fn add_metadata(&mut self, doc: DocId, annotation: String) {
        self.metadata.entry(doc).or_default().push(annotation);
    }

    pub fn metadata(&self, doc: DocId) -> &[String] {
        self.metadata.get(&doc).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn exact_word_docs(&self, word: &str) -> Option<&BTreeSet<DocId>> {
        self.exact_words.get(word)
    }

    pub fn word_docs(&self, word: &str) -> Option<&BTreeSet<DocId>> {
        self.words.get(word)
    }

    pub fn property_docs(&self, name: &str, value: &str) -> Option<&BTreeSet<DocId>> {
        self.properties.get(name)?.get(value)
    }

    /// Evaluate a numeric comparison against one posting list.
    pub fn number_docs(&self, name: &str, op: NumOp, value: u64) -> BTreeSet<DocId> {
        let Some(postings) = self.numbers.get(name) else {
            return BTreeSet::new();
        };
        let mut docs = BTreeSet::new();
        let range: Box<dyn Iterator<Item = (&u64, &BTreeSet<DocId>)>> = match op {
            NumOp::Eq => {
                if let Some(set) = postings.get(&value) {
                    docs.extend(set.iter().copied());
                }
                return docs;
            }
            NumOp::Ne => Box::new(postings.iter().filter(move |(v, _)| **v != value)),
            NumOp::Lt => Box::new(postings.range(..value)),
            NumOp::Le => Box::new(postings.range(..=value)),
            NumOp::Gt => Box::new(postings.range((Bound::Excluded(value), Bound::Unbounded))),
            NumOp::Ge => Box::new(postings.range(value..)),
        };
        for (_, set) in range {
            docs.extend(set.iter().copied());
        }
        docs
    }

    /// The value recorded under a numeric field for one document.
    pub fn number_of(&self, name: &str, doc: DocId) -> Option<u64> {
        self.numbers
            .get(name)?
            .iter()
            .find(|(_, docs)| docs.contains(&doc))
            .map(|(value, _)| *value)
    }

    /// Every document in the index, for negation complements.
    pub fn all_docs(&self) -> BTreeSet<DocId> {
        (1..=self.documents.len() as u32)
            .filter_map(DocId::new)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(hex: &str) -> AssetId {
        AssetId::from_hex(hex).unwrap()
    }

    fn doc(hex: &str) -> Document {
        Document {
            id: id(hex),
            path: Some(format!("assets/{hex}.mat")),
            extension: Some("mat".to_string()),
            is_folder: false,
            is_package: false,
        }
    }

    #[test]
    fn test_add_and_lookup_document() {
        let mut index = DependencyIndex::new();
        let d = index.add_document(doc("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));

        assert_eq!(index.len(), 1);
        assert_eq!(index.doc_id(&id("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")), Some(d));
        assert_eq!(index.document(d).unwrap().extension.as_deref(), Some("mat"));
    }

    #[test]
    fn test_postings_are_case_folded() {
        let mut index = DependencyIndex::new();
        let d = index.add_document(doc("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));

        index.add_property("T", "MAT", d);
        assert!(index.property_docs("t", "mat").unwrap().contains(&d));
    }

    #[test]
    fn test_number_comparisons() {
        let mut index = DependencyIndex::new();
        let d1 = index.add_document(doc("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
        let d2 = index.add_document(doc("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"));
        let d3 = index.add_document(doc("cccccccccccccccccccccccccccccccc"));

        index.add_number("in", 0, d1);
        index.add_number("in", 2, d2);
        index.add_number("in", 5, d3);

        assert_eq!(index.number_docs("in", NumOp::Eq, 2).len(), 1);
        assert_eq!(index.number_docs("in", NumOp::Ne, 2).len(), 2);
        assert_eq!(index.number_docs("in", NumOp::Gt, 0).len(), 2);
        assert_eq!(index.number_docs("in", NumOp::Ge, 0).len(), 3);
        assert_eq!(index.number_docs("in", NumOp::Lt, 5).len(), 2);
        assert_eq!(index.number_docs("in", NumOp::Le, 5).len(), 3);
        assert!(index.number_docs("out", NumOp::Ge, 0).is_empty());
    }

    #[test]
    fn test_number_of_reads_back_per_document() {
        let mut index = DependencyIndex::new();
        let d1 = index.add_document(doc("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
        let d2 = index.add_document(doc("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"));

        index.add_number("in", 7, d1);
        assert_eq!(index.number_of("in", d1), Some(7));
        assert_eq!(index.number_of("in", d2), None);
        assert_eq!(index.number_of("out", d1), None);
    }

    #[test]
    fn test_rebuild_lookups() {
        let mut index = DependencyIndex::new();
        index.add_document(doc("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
        index.add_document(doc("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"));

        let original_b = index.doc_id(&id("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"));
        index.doc_map.clear();
        assert!(index.doc_id(&id("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")).is_none());

        index.rebuild_lookups();
        assert_eq!(
            index.doc_id(&id("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")),
            original_b
        );
    }

    #[test]
    fn test_metadata_accumulates() {
        let mut index = DependencyIndex::new();
        let d = index.add_document(doc("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));

        assert!(index.metadata(d).is_empty());
        index.add_metadata(d, "first".to_string());
        index.add_metadata(d, "second".to_string());
        assert_eq!(index.metadata(d), ["first", "second"]);
    }
}
