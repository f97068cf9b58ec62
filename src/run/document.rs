//! Scored documents and per-topic result sets

use crate::error::{Result, RunfuseError};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single retrieved document with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// External document id, unique within a result set
    pub docid: String,

    /// Opaque reference back to the producer (line number for loaded runs)
    pub ordinal: u64,

    /// Relevance score, higher is better
    pub score: f64,
}

impl ScoredDocument {
    pub fn new(docid: impl Into<String>, ordinal: u64, score: f64) -> Self {
        Self {
            docid: docid.into(),
            ordinal,
            score,
        }
    }

    /// Copy of this document carrying a different score
    pub fn with_score(&self, score: f64) -> Self {
        Self {
            docid: self.docid.clone(),
            ordinal: self.ordinal,
            score,
        }
    }
}

/// Descending score order. Total over all floats, so safe for `sort_by`.
pub fn by_score_desc(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    b.score.total_cmp(&a.score)
}

/// Ordered documents for exactly one query.
///
/// Rank is never stored: the rank of a document is its 1-based position in
/// [`ResultSet::documents`]. Operations return new result sets instead of
/// mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    query_id: String,
    documents: Vec<ScoredDocument>,
}

impl ResultSet {
    /// Build a result set, rejecting repeated document ids
    pub fn new(query_id: impl Into<String>, documents: Vec<ScoredDocument>) -> Result<Self> {
        let query_id = query_id.into();
        let mut seen: AHashSet<&str> = AHashSet::with_capacity(documents.len());

        for doc in &documents {
            if !seen.insert(doc.docid.as_str()) {
                return Err(RunfuseError::DuplicateDocument {
                    topic: query_id,
                    docid: doc.docid.clone(),
                });
            }
        }

        Ok(Self {
            query_id,
            documents,
        })
    }

    pub fn empty(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            documents: Vec::new(),
        }
    }

    /// Caller guarantees the ids are already unique (e.g. a reorder of a valid set)
    pub(crate) fn from_unique(query_id: impl Into<String>, documents: Vec<ScoredDocument>) -> Self {
        debug_assert!({
            let mut seen = AHashSet::new();
            documents.iter().all(|d| seen.insert(d.docid.as_str()))
        });

        Self {
            query_id: query_id.into(),
            documents,
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn documents(&self) -> &[ScoredDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents paired with their 1-based rank
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &ScoredDocument)> {
        self.documents.iter().enumerate().map(|(i, doc)| (i + 1, doc))
    }

    /// Look up a document and its 1-based rank
    pub fn find(&self, docid: &str) -> Option<(usize, &ScoredDocument)> {
        self.ranked().find(|(_, doc)| doc.docid == docid)
    }

    /// The first `depth` documents (all of them if fewer)
    pub fn top(&self, depth: usize) -> &[ScoredDocument] {
        &self.documents[..depth.min(self.documents.len())]
    }

    /// Copy limited to the first `depth` documents
    pub fn truncated(&self, depth: usize) -> Self {
        Self::from_unique(self.query_id.clone(), self.top(depth).to_vec())
    }

    /// Copy re-sorted by descending score; equal scores keep their current order
    pub fn sorted_by_score(&self) -> Self {
        let mut documents = self.documents.clone();
        documents.sort_by(by_score_desc);
        Self::from_unique(self.query_id.clone(), documents)
    }

    pub fn into_documents(self) -> Vec<ScoredDocument> {
        self.documents
    }
}
