//! runfuse - reranking and fusion of retrieval runs
//!
//! Loads TREC-style run files, reorders result lists with deterministic
//! tie-breaking, rescores them (reciprocal rank, min-max, linear scaling) and
//! fuses several runs over the same topics into one.

pub mod cli;
pub mod config;
pub mod error;
pub mod fusion;
pub mod rerank;
pub mod run;

pub use error::{Result, RunfuseError};
