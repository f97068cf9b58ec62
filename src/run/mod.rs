//! Runs: ranked result lists for a whole topic set
//!
//! A [`Run`] maps topic ids to [`ResultSet`]s and remembers the order in which
//! topics first appeared. It is filled once (by the loader or by a search
//! step) and read-only afterwards; every transformation produces a new run.

mod document;
mod io;

pub use document::{by_score_desc, ResultSet, ScoredDocument};
pub use io::{load_run, parse_run, save_run, write_run, RunWriter, PLACEHOLDER_COLUMN};

use crate::error::{Result, RunfuseError};
use ahash::AHashMap;
use rayon::prelude::*;
use serde::Serialize;

/// Ranked lists for every topic of one retrieval configuration
#[derive(Debug, Clone, Default)]
pub struct Run {
    tag: String,
    topics: Vec<ResultSet>,
    index: AHashMap<String, usize>,
}

impl Run {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            topics: Vec::new(),
            index: AHashMap::new(),
        }
    }

    /// Build a run from result sets, in the given topic order
    pub fn from_result_sets(
        tag: impl Into<String>,
        result_sets: impl IntoIterator<Item = ResultSet>,
    ) -> Result<Self> {
        let mut run = Self::new(tag);
        for rs in result_sets {
            run.insert(rs)?;
        }
        Ok(run)
    }

    /// Append a topic. Each topic id may only be added once.
    pub fn insert(&mut self, result_set: ResultSet) -> Result<()> {
        if self.index.contains_key(result_set.query_id()) {
            return Err(RunfuseError::DuplicateTopic {
                topic: result_set.query_id().to_string(),
            });
        }

        self.index
            .insert(result_set.query_id().to_string(), self.topics.len());
        self.topics.push(result_set);
        Ok(())
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Topic ids in order of first appearance
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|rs| rs.query_id())
    }

    pub fn result_sets(&self) -> &[ResultSet] {
        &self.topics
    }

    pub fn result_set(&self, topic: &str) -> Option<&ResultSet> {
        self.index.get(topic).map(|&i| &self.topics[i])
    }

    /// Documents retrieved for `topic`, in run order. Unknown topics yield an empty slice.
    pub fn docs_by_topic(&self, topic: &str) -> &[ScoredDocument] {
        self.result_set(topic)
            .map(|rs| rs.documents())
            .unwrap_or(&[])
    }

    /// Like [`Run::docs_by_topic`] but limited to the top `depth` documents
    pub fn top_docs_by_topic(&self, topic: &str, depth: usize) -> &[ScoredDocument] {
        self.result_set(topic)
            .map(|rs| rs.top(depth))
            .unwrap_or(&[])
    }

    /// Number of topics
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Total number of documents across all topics
    pub fn document_count(&self) -> usize {
        self.topics.iter().map(ResultSet::len).sum()
    }

    /// Copy keeping at most `depth` documents per topic
    pub fn truncate(&self, depth: usize) -> Run {
        Run {
            tag: self.tag.clone(),
            topics: self.topics.iter().map(|rs| rs.truncated(depth)).collect(),
            index: self.index.clone(),
        }
    }

    /// Apply `f` to every topic in parallel and collect a new run in the same topic order.
    ///
    /// `f` must return a result set for the same query id it was given.
    pub fn map_topics<F>(&self, tag: impl Into<String>, f: F) -> Result<Run>
    where
        F: Fn(&ResultSet) -> Result<ResultSet> + Sync + Send,
    {
        let topics: Vec<ResultSet> = self.topics.par_iter().map(f).collect::<Result<_>>()?;

        debug_assert!(topics
            .iter()
            .zip(&self.topics)
            .all(|(out, input)| out.query_id() == input.query_id()));

        Ok(Run {
            tag: tag.into(),
            topics,
            index: self.index.clone(),
        })
    }

    /// Per-topic depth statistics
    pub fn summary(&self) -> RunSummary {
        let depths: Vec<usize> = self.topics.iter().map(ResultSet::len).collect();

        RunSummary {
            tag: self.tag.clone(),
            topics: self.topics.len(),
            documents: depths.iter().sum(),
            min_depth: depths.iter().copied().min().unwrap_or(0),
            max_depth: depths.iter().copied().max().unwrap_or(0),
            empty_topics: depths.iter().filter(|&&d| d == 0).count(),
        }
    }
}

/// Shape of a run, as reported by `runfuse inspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub tag: String,
    pub topics: usize,
    pub documents: usize,
    pub min_depth: usize,
    pub max_depth: usize,
    pub empty_topics: usize,
}
