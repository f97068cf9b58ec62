//! Tie-break reranking of single result sets

mod attributes;
mod tiebreak;

pub use attributes::{
    AttributeLookup, AttributeTable, DocumentAttributes, ExcludeIds, NumericDocId, PatternKey,
};
pub use tiebreak::{
    exclude_none, larger_key_first, rerank, KeyComparator, KeyedDocument, TieBreakPolicy,
    TieBreakReranker, DEFAULT_EPSILON, DEFAULT_PERTURBATION_STEP,
};
