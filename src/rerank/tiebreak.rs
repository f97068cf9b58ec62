//! Score ordering with deterministic resolution of near-ties
//!
//! Documents are sorted by descending score. Documents whose score is within
//! `epsilon` of the highest score of their tie group are ordered by a
//! comparator over a numeric key (by default larger key first, which favors
//! more recent documents when the key is a creation-ordered id). Emitted
//! scores inside a tie group are then pushed apart by `perturbation_step` so
//! the output is strictly decreasing.

use super::attributes::AttributeLookup;
use crate::error::{Result, RunfuseError};
use crate::run::{ResultSet, Run, ScoredDocument};
use std::cmp::Ordering;

pub const DEFAULT_EPSILON: f64 = 0.001;
pub const DEFAULT_PERTURBATION_STEP: f64 = 0.000_001;

/// Numeric tolerances of the tie-break reranker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TieBreakPolicy {
    /// Scores this close to a tie group's top score count as tied
    pub epsilon: f64,

    /// Amount subtracted per position inside a tie group
    pub perturbation_step: f64,
}

impl TieBreakPolicy {
    pub fn new(epsilon: f64, perturbation_step: f64) -> Result<Self> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(RunfuseError::InvalidParameter(format!(
                "epsilon must be finite and non-negative, got {}",
                epsilon
            )));
        }
        if !perturbation_step.is_finite() || perturbation_step < 0.0 {
            return Err(RunfuseError::InvalidParameter(format!(
                "perturbation step must be finite and non-negative, got {}",
                perturbation_step
            )));
        }

        Ok(Self {
            epsilon,
            perturbation_step,
        })
    }
}

impl Default for TieBreakPolicy {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            perturbation_step: DEFAULT_PERTURBATION_STEP,
        }
    }
}

/// A document paired with its resolved tie-break key
#[derive(Debug, Clone, Copy)]
pub struct KeyedDocument<'a> {
    pub doc: &'a ScoredDocument,
    pub key: i64,
}

/// Default tie comparator: larger key first, then external id ascending
pub fn larger_key_first(a: &KeyedDocument<'_>, b: &KeyedDocument<'_>) -> Ordering {
    b.key
        .cmp(&a.key)
        .then_with(|| a.doc.docid.cmp(&b.doc.docid))
}

/// Predicate that keeps every document
pub fn exclude_none(_doc: &ScoredDocument) -> bool {
    false
}

/// Comparator over keyed documents used inside a tie group
pub type KeyComparator = fn(&KeyedDocument<'_>, &KeyedDocument<'_>) -> Ordering;

/// Tie-break reranker. The comparator is configuration, not part of the document type.
#[derive(Debug, Clone, Copy)]
pub struct TieBreakReranker<C = KeyComparator> {
    policy: TieBreakPolicy,
    comparator: C,
}

impl TieBreakReranker {
    pub fn new(policy: TieBreakPolicy) -> Self {
        Self {
            policy,
            comparator: larger_key_first,
        }
    }
}

impl Default for TieBreakReranker {
    fn default() -> Self {
        Self::new(TieBreakPolicy::default())
    }
}

impl<C> TieBreakReranker<C>
where
    C: Fn(&KeyedDocument<'_>, &KeyedDocument<'_>) -> Ordering + Sync,
{
    /// Reranker ordering tie groups with a custom comparator.
    /// The comparator must be a total order.
    pub fn with_comparator(policy: TieBreakPolicy, comparator: C) -> Self {
        Self { policy, comparator }
    }

    pub fn policy(&self) -> &TieBreakPolicy {
        &self.policy
    }

    /// Rerank one result set.
    ///
    /// Documents for which `exclude` returns true are dropped. `key` must
    /// produce a tie-break key for every remaining document; the first
    /// failure aborts the whole operation.
    ///
    /// Emitted scores inside a tie group count down from the group leader's
    /// score, not from each document's own score, so a near-tied document
    /// can come out above its input score.
    pub fn rerank<E, K>(&self, result_set: &ResultSet, exclude: E, key: K) -> Result<ResultSet>
    where
        E: Fn(&ScoredDocument) -> bool,
        K: Fn(&ScoredDocument) -> Result<i64>,
    {
        let mut keyed = Vec::with_capacity(result_set.len());
        for doc in result_set.documents() {
            if exclude(doc) {
                continue;
            }
            keyed.push(KeyedDocument { doc, key: key(doc)? });
        }

        let excluded = result_set.len() - keyed.len();

        keyed.sort_by(|a, b| {
            b.doc
                .score
                .total_cmp(&a.doc.score)
                .then_with(|| (self.comparator)(a, b))
        });

        let epsilon = self.policy.epsilon;
        let step = self.policy.perturbation_step;
        let mut documents = Vec::with_capacity(keyed.len());
        let mut start = 0;

        while start < keyed.len() {
            let top = keyed[start].doc.score;
            let mut end = start + 1;
            while end < keyed.len() && top - keyed[end].doc.score <= epsilon {
                end += 1;
            }

            let group = &mut keyed[start..end];
            group.sort_by(|a, b| (self.comparator)(a, b));

            if step > 0.0 && (group.len() - 1) as f64 * step > epsilon {
                tracing::warn!(
                    "Topic {}: {} tied documents at {}; perturbed scores may cross the next group",
                    result_set.query_id(),
                    group.len(),
                    top
                );
            }

            for (duplicate, entry) in group.iter().enumerate() {
                let score = top - step * duplicate as f64;
                documents.push(entry.doc.with_score(score));
            }

            start = end;
        }

        tracing::debug!(
            "Reranked topic {}: {} documents, {} excluded",
            result_set.query_id(),
            documents.len(),
            excluded
        );

        Ok(ResultSet::from_unique(result_set.query_id(), documents))
    }

    /// Rerank using an attribute lookup for both the key and the exclusion flag
    pub fn rerank_with<L: AttributeLookup + ?Sized>(
        &self,
        result_set: &ResultSet,
        lookup: &L,
    ) -> Result<ResultSet> {
        self.rerank(
            result_set,
            |doc| lookup.is_excluded(doc),
            |doc| lookup.tie_break_key(doc),
        )
    }

    /// Rerank every topic of a run. Topics are processed in parallel.
    pub fn rerank_run<E, K>(&self, run: &Run, exclude: E, key: K, tag: &str) -> Result<Run>
    where
        E: Fn(&ScoredDocument) -> bool + Sync + Send,
        K: Fn(&ScoredDocument) -> Result<i64> + Sync + Send,
    {
        run.map_topics(tag, |rs| self.rerank(rs, &exclude, &key))
    }
}

/// Rerank with the default policy and comparator
pub fn rerank<E, K>(result_set: &ResultSet, exclude: E, key: K) -> Result<ResultSet>
where
    E: Fn(&ScoredDocument) -> bool,
    K: Fn(&ScoredDocument) -> Result<i64>,
{
    TieBreakReranker::default().rerank(result_set, exclude, key)
}
