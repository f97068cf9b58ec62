//! Fusion of several runs over the same topic set

use super::rescore::{check_rrf_k, min_max_scores, rrf_score, DEFAULT_RRF_K};
use crate::error::{Result, RunfuseError};
use crate::run::{by_score_desc, ResultSet, Run, ScoredDocument};
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;

/// Default number of documents taken from each input run per topic
pub const DEFAULT_DEPTH: usize = 1000;

/// How per-run scores are combined into a fused score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionMethod {
    /// Sum of `weight / (k + rank)` over runs
    Rrf { k: f64 },

    /// Weighted sum of per-topic min-max normalized scores, divided by the run count
    Average,

    /// `alpha * first + (1 - alpha) * second` over normalized scores; exactly two runs
    Interpolation { alpha: f64 },
}

impl Default for FusionMethod {
    fn default() -> Self {
        Self::Rrf { k: DEFAULT_RRF_K }
    }
}

impl FusionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rrf { .. } => "rrf",
            Self::Average => "average",
            Self::Interpolation { .. } => "interpolation",
        }
    }
}

/// Parameters of a merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    pub method: FusionMethod,

    /// One weight per input run; uniform when `None`
    pub weights: Option<Vec<f64>>,

    /// Documents considered from each run per topic
    pub depth: usize,

    /// Documents kept per topic after fusion; unlimited when `None`
    pub max_docs: Option<usize>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            method: FusionMethod::default(),
            weights: None,
            depth: DEFAULT_DEPTH,
            max_docs: None,
        }
    }
}

/// Combines runs topic by topic
#[derive(Debug, Clone)]
pub struct RunMerger {
    options: MergeOptions,
}

impl RunMerger {
    pub fn new(options: MergeOptions) -> Result<Self> {
        if options.depth == 0 {
            return Err(RunfuseError::InvalidParameter(
                "merge depth must be greater than 0".to_string(),
            ));
        }
        if options.max_docs == Some(0) {
            return Err(RunfuseError::InvalidParameter(
                "max_docs must be greater than 0".to_string(),
            ));
        }

        match options.method {
            FusionMethod::Rrf { k } => check_rrf_k(k)?,
            FusionMethod::Average => {}
            FusionMethod::Interpolation { alpha } => {
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(RunfuseError::InvalidParameter(format!(
                        "interpolation alpha must be in [0, 1], got {}",
                        alpha
                    )));
                }
            }
        }

        if let Some(weights) = &options.weights {
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(RunfuseError::InvalidParameter(
                    "weights must be finite and non-negative".to_string(),
                ));
            }
            if !weights.is_empty() && weights.iter().all(|w| *w == 0.0) {
                return Err(RunfuseError::InvalidParameter(
                    "at least one weight must be positive".to_string(),
                ));
            }
        }

        Ok(Self { options })
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Fuse `runs` into one run tagged `tag`.
    ///
    /// Earlier runs win ties: equal fused scores keep the order in which
    /// documents were first met, run by run and rank by rank. The output
    /// covers the union of input topics in order of first appearance.
    pub fn merge(&self, runs: &[Run], tag: &str) -> Result<Run> {
        if runs.is_empty() {
            return Err(RunfuseError::InvalidParameter("no runs to merge".to_string()));
        }

        let weights = match &self.options.weights {
            Some(w) if w.len() != runs.len() => {
                return Err(RunfuseError::InvalidParameter(format!(
                    "{} weights given for {} runs",
                    w.len(),
                    runs.len()
                )))
            }
            Some(w) => w.clone(),
            None => vec![1.0; runs.len()],
        };

        if let FusionMethod::Interpolation { .. } = self.options.method {
            if runs.len() != 2 {
                return Err(RunfuseError::InvalidParameter(format!(
                    "interpolation needs exactly 2 runs, got {}",
                    runs.len()
                )));
            }
        }

        let mut seen = AHashSet::new();
        let topics: Vec<&str> = runs
            .iter()
            .flat_map(|run| run.topics())
            .filter(|topic| seen.insert(*topic))
            .collect();

        let fused: Vec<ResultSet> = topics
            .par_iter()
            .map(|topic| self.fuse_topic(topic, runs, &weights))
            .collect();

        let merged = Run::from_result_sets(tag, fused)?;

        tracing::info!(
            "Fused {} runs with {} (depth {}): {} topics, {} documents",
            runs.len(),
            self.options.method.name(),
            self.options.depth,
            merged.len(),
            merged.document_count()
        );

        Ok(merged)
    }

    /// Contribution of every considered document of one run, in rank order
    fn contributions(
        &self,
        docs: &[ScoredDocument],
        run_index: usize,
        run_count: usize,
        weight: f64,
    ) -> Vec<f64> {
        match self.options.method {
            FusionMethod::Rrf { k } => (1..=docs.len())
                .map(|rank| rrf_score(rank, k, weight))
                .collect(),
            FusionMethod::Average => min_max_scores(docs)
                .into_iter()
                .map(|s| weight * s / run_count as f64)
                .collect(),
            FusionMethod::Interpolation { alpha } => {
                let share = if run_index == 0 { alpha } else { 1.0 - alpha };
                min_max_scores(docs)
                    .into_iter()
                    .map(|s| weight * share * s)
                    .collect()
            }
        }
    }

    fn fuse_topic(&self, topic: &str, runs: &[Run], weights: &[f64]) -> ResultSet {
        let mut fused: Vec<ScoredDocument> = Vec::new();
        let mut slots: AHashMap<&str, usize> = AHashMap::new();

        for (i, run) in runs.iter().enumerate() {
            let docs = run.top_docs_by_topic(topic, self.options.depth);
            let contributions = self.contributions(docs, i, runs.len(), weights[i]);

            for (doc, contribution) in docs.iter().zip(contributions) {
                match slots.get(doc.docid.as_str()) {
                    Some(&slot) => fused[slot].score += contribution,
                    None => {
                        slots.insert(doc.docid.as_str(), fused.len());
                        fused.push(doc.with_score(contribution));
                    }
                }
            }
        }

        // stable: ties keep first-seen order
        fused.sort_by(by_score_desc);

        if let Some(max_docs) = self.options.max_docs {
            fused.truncate(max_docs);
        }

        tracing::debug!("Fused topic {}: {} documents", topic, fused.len());

        ResultSet::from_unique(topic, fused)
    }
}

/// Reciprocal rank fusion with `k = 60`.
///
/// `weights` defaults to uniform; `depth` limits how many documents of each
/// run are considered per topic.
pub fn merge(runs: &[Run], weights: Option<&[f64]>, depth: usize, tag: &str) -> Result<Run> {
    RunMerger::new(MergeOptions {
        method: FusionMethod::default(),
        weights: weights.map(<[f64]>::to_vec),
        depth,
        max_docs: None,
    })?
    .merge(runs, tag)
}
