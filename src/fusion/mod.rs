//! Run rescoring and multi-run fusion
//!
//! Reciprocal rank fusion scores a document at rank `r` with
//! `weight / (k + r)`. Rescoring applies that (or min-max normalization, or
//! linear scaling) to a single run; merging sums per-run contributions by
//! document id across several runs.

mod merge;
mod rescore;

pub use merge::{merge, FusionMethod, MergeOptions, RunMerger, DEFAULT_DEPTH};
pub use rescore::{
    min_max_scores, rescore, rescore_result_set, rrf_score, RescoreStrategy, DEFAULT_RRF_K,
};
