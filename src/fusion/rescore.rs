//! Per-run score transformations

use crate::error::{Result, RunfuseError};
use crate::run::{by_score_desc, ResultSet, Run, ScoredDocument};

/// Smoothing constant of reciprocal rank fusion
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Score rewrite applied to every topic of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RescoreStrategy {
    /// `weight / (k + rank)` with 1-based rank
    Rrf { k: f64, weight: f64 },

    /// `(score - min) / (max - min)` per topic; 0.0 when all scores are equal
    MinMax,

    /// `score * factor`
    Scale { factor: f64 },
}

impl RescoreStrategy {
    /// RRF with `k = 60` and unit weight
    pub fn rrf() -> Self {
        Self::Rrf {
            k: DEFAULT_RRF_K,
            weight: 1.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rrf { .. } => "rrf",
            Self::MinMax => "min-max",
            Self::Scale { .. } => "scale",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Rrf { k, weight } => {
                check_rrf_k(k)?;
                if !weight.is_finite() {
                    return Err(RunfuseError::InvalidParameter(format!(
                        "RRF weight must be finite, got {}",
                        weight
                    )));
                }
            }
            Self::MinMax => {}
            Self::Scale { factor } => {
                if !factor.is_finite() {
                    return Err(RunfuseError::InvalidParameter(format!(
                        "scale factor must be finite, got {}",
                        factor
                    )));
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn check_rrf_k(k: f64) -> Result<()> {
    if !k.is_finite() || k < 0.0 {
        return Err(RunfuseError::InvalidParameter(format!(
            "RRF k must be finite and non-negative, got {}",
            k
        )));
    }
    Ok(())
}

/// RRF contribution of a document at 1-based `rank`
pub fn rrf_score(rank: usize, k: f64, weight: f64) -> f64 {
    weight / (k + rank as f64)
}

/// Min-max normalized scores, in document order.
///
/// A topic whose scores are all equal normalizes to 0.0 everywhere.
pub fn min_max_scores(documents: &[ScoredDocument]) -> Vec<f64> {
    let (min, max) = documents
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
            (lo.min(d.score), hi.max(d.score))
        });

    let range = max - min;
    documents
        .iter()
        .map(|d| {
            if range > 0.0 {
                (d.score - min) / range
            } else {
                0.0
            }
        })
        .collect()
}

/// Rescore one topic and re-sort it by the new score.
///
/// Equal new scores keep their previous relative order.
pub fn rescore_result_set(result_set: &ResultSet, strategy: &RescoreStrategy) -> ResultSet {
    let docs = result_set.documents();

    let scores: Vec<f64> = match *strategy {
        RescoreStrategy::Rrf { k, weight } => result_set
            .ranked()
            .map(|(rank, _)| rrf_score(rank, k, weight))
            .collect(),
        RescoreStrategy::MinMax => min_max_scores(docs),
        RescoreStrategy::Scale { factor } => docs.iter().map(|d| d.score * factor).collect(),
    };

    let mut rescored: Vec<ScoredDocument> = docs
        .iter()
        .zip(scores)
        .map(|(doc, score)| doc.with_score(score))
        .collect();
    rescored.sort_by(by_score_desc);

    ResultSet::from_unique(result_set.query_id(), rescored)
}

/// Rescore every topic of `run`.
///
/// Copy-producing: `run` is left untouched and the result keeps its tag,
/// topic set and per-topic membership.
pub fn rescore(run: &Run, strategy: &RescoreStrategy) -> Result<Run> {
    strategy.validate()?;

    let rescored = run.map_topics(run.tag(), |rs| Ok(rescore_result_set(rs, strategy)))?;

    tracing::info!(
        "Rescored {} topics with {}",
        rescored.len(),
        strategy.name()
    );
    Ok(rescored)
}
