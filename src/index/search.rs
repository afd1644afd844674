//! Query evaluation over the inverted index.
//!
//! Groups of or-joined clauses intersect; scores accumulate across groups so
//! a document matching on an exact word ranks above one matched by a partial
//! path component.

use std::collections::BTreeMap;

use crate::index::DependencyIndex;
use crate::query::{Clause, ClauseKind, Query};
use crate::types::{AssetId, DocId};

const SCORE_EXACT_WORD: u32 = 30;
const SCORE_PROPERTY: u32 = 10;
const SCORE_WORD: u32 = 5;
const SCORE_NUMBER: u32 = 5;

/// One matched document with its accumulated relevance score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub id: AssetId,
    pub path: Option<String>,
    pub score: u32,
}

/// Evaluate a parsed query and return matches sorted by descending score,
/// ties broken by id so output order is stable.
pub fn search(index: &DependencyIndex, query: &Query) -> Vec<SearchResult> {
    let mut combined: Option<BTreeMap<DocId, u32>> = None;

    for group in &query.groups {
        let matches = eval_group(index, group);
        combined = Some(match combined {
            None => matches,
            Some(prev) => intersect(prev, matches),
        });
    }

    let mut results: Vec<SearchResult> = combined
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(doc, score)| {
            index.document(doc).map(|d| SearchResult {
                id: d.id,
                path: d.path.clone(),
                score,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.id.cmp(&b.id))
    });
    results
}

/// Union of the group's clauses, keeping the best score per document.
fn eval_group(index: &DependencyIndex, group: &[Clause]) -> BTreeMap<DocId, u32> {
    let mut docs: BTreeMap<DocId, u32> = BTreeMap::new();
    for clause in group {
        for (doc, score) in eval_clause(index, clause) {
            let entry = docs.entry(doc).or_insert(0);
            if score > *entry {
                *entry = score;
            }
        }
    }
    docs
}

fn eval_clause(index: &DependencyIndex, clause: &Clause) -> BTreeMap<DocId, u32> {
    let mut docs: BTreeMap<DocId, u32> = BTreeMap::new();

    match &clause.kind {
        ClauseKind::Word(word) => {
            if let Some(set) = index.exact_word_docs(word) {
                for doc in set {
                    docs.insert(*doc, SCORE_EXACT_WORD);
                }
            }
            if let Some(set) = index.word_docs(word) {
                for doc in set {
                    docs.entry(*doc).or_insert(SCORE_WORD);
                }
            }
        }
        ClauseKind::Property { name, value } => {
            if let Some(set) = index.property_docs(name, value) {
                for doc in set {
                    docs.insert(*doc, SCORE_PROPERTY);
                }
            }
        }
        ClauseKind::Number { name, op, value } => {
            for doc in index.number_docs(name, *op, *value) {
                docs.insert(doc, SCORE_NUMBER);
            }
        }
    }

    if clause.negated {
        let mut complement = BTreeMap::new();
        for doc in index.all_docs() {
            if !docs.contains_key(&doc) {
                complement.insert(doc, 0);
            }
        }
        return complement;
    }

    docs
}

fn intersect(a: BTreeMap<DocId, u32>, b: BTreeMap<DocId, u32>) -> BTreeMap<DocId, u32> {
    a.into_iter()
        .filter_map(|(doc, score)| b.get(&doc).map(|s| (doc, score + s)))
        .collect()
}
