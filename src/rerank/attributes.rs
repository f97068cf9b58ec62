//! Document attribute lookups used for tie-breaking and exclusion

use crate::error::{Result, RunfuseError};
use crate::run::ScoredDocument;
use ahash::{AHashMap, AHashSet};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Per-document attributes consulted by the tie-break reranker
pub trait AttributeLookup: Sync {
    /// Numeric key ordering near-tied documents (larger wins).
    /// Must fail rather than invent a default.
    fn tie_break_key(&self, doc: &ScoredDocument) -> Result<i64>;

    /// Whether the document should be dropped from the output
    fn is_excluded(&self, _doc: &ScoredDocument) -> bool {
        false
    }
}

/// Uses the whole external id as the key, e.g. tweet ids
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericDocId;

impl AttributeLookup for NumericDocId {
    fn tie_break_key(&self, doc: &ScoredDocument) -> Result<i64> {
        doc.docid.parse().map_err(|e| RunfuseError::TieBreakKey {
            docid: doc.docid.clone(),
            message: format!("not an integer ({})", e),
        })
    }
}

/// Extracts the key from the first capture group of a regex over the id
#[derive(Debug, Clone)]
pub struct PatternKey {
    pattern: Regex,
}

impl PatternKey {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            RunfuseError::InvalidParameter(format!("Invalid key pattern {:?}: {}", pattern, e))
        })?;

        if pattern.captures_len() < 2 {
            return Err(RunfuseError::InvalidParameter(format!(
                "Key pattern {:?} needs a capture group",
                pattern.as_str()
            )));
        }

        Ok(Self { pattern })
    }
}

impl AttributeLookup for PatternKey {
    fn tie_break_key(&self, doc: &ScoredDocument) -> Result<i64> {
        let captured = self
            .pattern
            .captures(&doc.docid)
            .and_then(|c| c.get(1))
            .ok_or_else(|| RunfuseError::TieBreakKey {
                docid: doc.docid.clone(),
                message: format!("does not match {:?}", self.pattern.as_str()),
            })?;

        captured
            .as_str()
            .parse()
            .map_err(|e| RunfuseError::TieBreakKey {
                docid: doc.docid.clone(),
                message: format!("captured {:?} is not an integer ({})", captured.as_str(), e),
            })
    }
}

/// Attributes of one document in an [`AttributeTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentAttributes {
    pub key: i64,
    pub excluded: bool,
}

/// Attributes loaded from a side file: `<docid> <key> [excluded 0|1]` per line.
///
/// Documents missing from the table have no key, which fails the rerank.
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    entries: AHashMap<String, DocumentAttributes>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, docid: impl Into<String>, attributes: DocumentAttributes) {
        self.entries.insert(docid.into(), attributes);
    }

    pub fn get(&self, docid: &str) -> Option<&DocumentAttributes> {
        self.entries.get(docid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            RunfuseError::io(e, format!("Failed to open attribute file: {:?}", path))
        })?;

        let table = Self::parse(BufReader::new(file), path)?;
        tracing::info!("Loaded attributes for {} documents from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn parse<R: BufRead>(reader: R, source: &Path) -> Result<Self> {
        let mut table = Self::new();

        for (i, line) in reader.lines().enumerate() {
            let line =
                line.map_err(|e| RunfuseError::io(e, format!("Failed to read {:?}", source)))?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let parse_error = |message: String| RunfuseError::Parse {
                path: source.to_path_buf(),
                line: i + 1,
                message,
            };

            let fields: Vec<&str> = line.split_whitespace().collect();
            let (docid, key, excluded) = match fields.as_slice() {
                [docid, key] => (*docid, *key, "0"),
                [docid, key, excluded] => (*docid, *key, *excluded),
                _ => {
                    return Err(parse_error(format!(
                        "expected 2 or 3 columns, found {}",
                        fields.len()
                    )))
                }
            };

            let key: i64 = key
                .parse()
                .map_err(|_| parse_error(format!("key is not an integer: {:?}", key)))?;
            let excluded = match excluded {
                "0" => false,
                "1" => true,
                other => {
                    return Err(parse_error(format!(
                        "exclusion flag must be 0 or 1: {:?}",
                        other
                    )))
                }
            };

            table.insert(docid, DocumentAttributes { key, excluded });
        }

        Ok(table)
    }
}

impl AttributeLookup for AttributeTable {
    fn tie_break_key(&self, doc: &ScoredDocument) -> Result<i64> {
        self.entries
            .get(&doc.docid)
            .map(|a| a.key)
            .ok_or_else(|| RunfuseError::TieBreakKey {
                docid: doc.docid.clone(),
                message: "no entry in attribute table".to_string(),
            })
    }

    fn is_excluded(&self, doc: &ScoredDocument) -> bool {
        self.entries.get(&doc.docid).is_some_and(|a| a.excluded)
    }
}

/// Set of external ids to drop, one per line in its file form
#[derive(Debug, Clone, Default)]
pub struct ExcludeIds {
    ids: AHashSet<String>,
}

impl ExcludeIds {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            RunfuseError::io(e, format!("Failed to open exclusion file: {:?}", path))
        })?;

        let mut ids = AHashSet::new();
        for line in BufReader::new(file).lines() {
            let line =
                line.map_err(|e| RunfuseError::io(e, format!("Failed to read {:?}", path)))?;
            let id = line.trim();
            if !id.is_empty() && !id.starts_with('#') {
                ids.insert(id.to_string());
            }
        }

        tracing::debug!("Loaded {} excluded ids from {:?}", ids.len(), path);
        Ok(Self { ids })
    }

    pub fn contains(&self, doc: &ScoredDocument) -> bool {
        self.ids.contains(&doc.docid)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExcludeIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
