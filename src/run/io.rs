//! Reading and writing TREC-style run files
//!
//! Six columns: `<topic> Q0 <docid> <rank> <score> <tag>`.
//! The four column form `<topic> <docid> <rank> <score>` is accepted on input.

use super::{ResultSet, Run, ScoredDocument};
use crate::error::{Result, RunfuseError};
use ahash::{AHashMap, AHashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Second column of every written line
pub const PLACEHOLDER_COLUMN: &str = "Q0";

/// Load a run file from disk
pub fn load_run(path: &Path) -> Result<Run> {
    let file = File::open(path)
        .map_err(|e| RunfuseError::io(e, format!("Failed to open run file: {:?}", path)))?;

    let run = parse_run(BufReader::new(file), path)?;

    tracing::info!(
        "Loaded run {:?}: {} topics, {} documents",
        path,
        run.len(),
        run.document_count()
    );

    Ok(run)
}

/// Parse run lines from any reader. `source` only labels parse errors.
///
/// Topics keep their order of first appearance. Documents are ordered by the
/// rank column, so a file listing ranks out of order still ranks as written.
/// Blank lines are skipped; anything else that does not parse is an error.
pub fn parse_run<R: BufRead>(reader: R, source: &Path) -> Result<Run> {
    struct Topic {
        id: String,
        docs: Vec<(u32, ScoredDocument)>,
        seen: AHashSet<String>,
        ranks: AHashSet<u32>,
    }

    let mut topics: Vec<Topic> = Vec::new();
    let mut index: AHashMap<String, usize> = AHashMap::new();
    let mut tag: Option<String> = None;

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line
            .map_err(|e| RunfuseError::io(e, format!("Failed to read {:?}", source)))?;

        if line.trim().is_empty() {
            continue;
        }

        let parse_error = |message: String| RunfuseError::Parse {
            path: source.to_path_buf(),
            line: line_no,
            message,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let (topic, docid, rank, score, line_tag) = match fields.as_slice() {
            [topic, _q0, docid, rank, score, line_tag] => {
                (*topic, *docid, *rank, *score, Some(*line_tag))
            }
            [topic, docid, rank, score] => (*topic, *docid, *rank, *score, None),
            _ => {
                return Err(parse_error(format!(
                    "expected 6 or 4 columns, found {}: {:?}",
                    fields.len(),
                    line
                )))
            }
        };

        let rank: u32 = rank
            .parse()
            .map_err(|_| parse_error(format!("rank is not a positive integer: {:?}", rank)))?;
        if rank == 0 {
            return Err(parse_error("rank must start at 1".to_string()));
        }

        let score: f64 = score
            .parse()
            .map_err(|_| parse_error(format!("score is not a number: {:?}", score)))?;
        if !score.is_finite() {
            return Err(parse_error(format!("score is not finite: {}", score)));
        }

        if tag.is_none() {
            tag = Some(line_tag.unwrap_or_default().to_string());
        }

        let slot = *index.entry(topic.to_string()).or_insert_with(|| {
            topics.push(Topic {
                id: topic.to_string(),
                docs: Vec::new(),
                seen: AHashSet::new(),
                ranks: AHashSet::new(),
            });
            topics.len() - 1
        });
        let entry = &mut topics[slot];

        if !entry.seen.insert(docid.to_string()) {
            return Err(RunfuseError::DuplicateDocument {
                topic: topic.to_string(),
                docid: docid.to_string(),
            });
        }

        if !entry.ranks.insert(rank) {
            return Err(parse_error(format!(
                "rank {} appears twice in topic {}",
                rank, topic
            )));
        }

        entry
            .docs
            .push((rank, ScoredDocument::new(docid, line_no as u64, score)));
    }

    let result_sets = topics.into_iter().map(|mut t| {
        t.docs.sort_by_key(|(rank, _)| *rank);
        let docs = t.docs.into_iter().map(|(_, doc)| doc).collect();
        ResultSet::from_unique(t.id, docs)
    });

    Run::from_result_sets(tag.unwrap_or_default(), result_sets)
}

/// Run file writer
#[derive(Debug, Clone)]
pub struct RunWriter {
    tag: String,
    precision: Option<usize>,
}

impl RunWriter {
    /// Writer stamping every line with `tag`
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            precision: None,
        }
    }

    /// Print scores with a fixed number of decimals instead of the shortest exact form
    pub fn with_precision(mut self, precision: Option<usize>) -> Self {
        self.precision = precision;
        self
    }

    fn format_score(&self, score: f64) -> String {
        match self.precision {
            Some(p) => format!("{:.*}", p, score),
            None => format!("{}", score),
        }
    }

    /// Write every topic of `run`, ranks renumbered from 1 in document order.
    /// Nothing is written unless every field is valid.
    pub fn write<W: Write>(&self, run: &Run, writer: W) -> Result<()> {
        self.check(run)?;
        self.write_lines(run, writer)
    }

    /// Write `run` to a file, replacing any existing content.
    /// The file is not created when a field is invalid.
    pub fn save(&self, run: &Run, path: &Path) -> Result<()> {
        self.check(run)?;

        let file = File::create(path)
            .map_err(|e| RunfuseError::io(e, format!("Failed to create run file: {:?}", path)))?;

        self.write_lines(run, file)?;

        tracing::info!(
            "Wrote run {:?} ({} topics, {} documents, tag {})",
            path,
            run.len(),
            run.document_count(),
            self.tag
        );
        Ok(())
    }

    fn check(&self, run: &Run) -> Result<()> {
        check_field("run tag", &self.tag)?;

        for rs in run.result_sets() {
            check_field("topic id", rs.query_id())?;
            for doc in rs.documents() {
                check_field("document id", &doc.docid)?;
            }
        }
        Ok(())
    }

    fn write_lines<W: Write>(&self, run: &Run, writer: W) -> Result<()> {
        let mut out = BufWriter::new(writer);
        for rs in run.result_sets() {
            for (rank, doc) in rs.ranked() {
                writeln!(
                    out,
                    "{} {} {} {} {} {}",
                    rs.query_id(),
                    PLACEHOLDER_COLUMN,
                    doc.docid,
                    rank,
                    self.format_score(doc.score),
                    self.tag
                )
                .map_err(|e| RunfuseError::io(e, "Failed to write run line"))?;
            }
        }

        out.flush()
            .map_err(|e| RunfuseError::io(e, "Failed to flush run output"))
    }
}

/// Write `run` to `writer` tagged with `tag`
pub fn write_run<W: Write>(run: &Run, writer: W, tag: &str) -> Result<()> {
    RunWriter::new(tag).write(run, writer)
}

/// Save `run` to `path` tagged with `tag`
pub fn save_run(run: &Run, path: &Path, tag: &str) -> Result<()> {
    RunWriter::new(tag).save(run, path)
}

/// Output fields must be non-empty ASCII without whitespace, or the line cannot be read back
fn check_field(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || !value.is_ascii() || value.chars().any(|c| c.is_ascii_whitespace()) {
        return Err(RunfuseError::InvalidParameter(format!(
            "{} must be non-empty ASCII without whitespace: {:?}",
            what, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<Run> {
        parse_run(Cursor::new(text), Path::new("test.run"))
    }

    #[test]
    fn test_parse_six_columns() {
        let run = parse(
            "101 Q0 d1 1 12.5 bm25\n\
             101 Q0 d2 2 11.0 bm25\n\
             102 Q0 d9 1 3.25 bm25\n",
        )
        .unwrap();

        assert_eq!(run.tag(), "bm25");
        assert_eq!(run.topics().collect::<Vec<_>>(), vec!["101", "102"]);
        assert_eq!(run.docs_by_topic("101")[1].docid, "d2");
        assert_eq!(run.docs_by_topic("102")[0].score, 3.25);
    }

    #[test]
    fn test_parse_four_columns() {
        let run = parse("7 docA 1 0.9\n7 docB 2 0.8\n\n").unwrap();

        assert_eq!(run.tag(), "");
        assert_eq!(run.docs_by_topic("7").len(), 2);
    }

    #[test]
    fn test_interleaved_topics_grouped_in_first_appearance_order() {
        let run = parse("2 a 1 1.0\n1 b 1 1.0\n2 c 2 0.5\n").unwrap();

        assert_eq!(run.topics().collect::<Vec<_>>(), vec!["2", "1"]);
        let ids: Vec<&str> = run.docs_by_topic("2").iter().map(|d| d.docid.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = parse("101 Q0 d1 1 1.0 run\n101 abc notanumber\n").unwrap_err();

        match err {
            RunfuseError::Parse { path, line, .. } => {
                assert_eq!(path, Path::new("test.run"));
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_score_is_error() {
        let err = parse("101 d1 1 high\n").unwrap_err();
        assert!(matches!(err, RunfuseError::Parse { line: 1, .. }));

        let err = parse("101 d1 1 NaN\n").unwrap_err();
        assert!(matches!(err, RunfuseError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_rank_zero_is_error() {
        let err = parse("101 d1 0 1.0\n").unwrap_err();
        assert!(matches!(err, RunfuseError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_duplicate_document_in_topic() {
        let err = parse("1 a 1 2.0\n1 a 2 1.0\n").unwrap_err();
        assert!(matches!(err, RunfuseError::DuplicateDocument { .. }));

        // same id under different topics is fine
        assert!(parse("1 a 1 2.0\n2 a 1 1.0\n").is_ok());
    }

    #[test]
    fn test_documents_follow_rank_column() {
        let run = parse("1 Q0 a 2 0.5 t\n1 Q0 b 1 0.9 t\n1 Q0 c 3 0.1 t\n").unwrap();

        let ids: Vec<&str> = run.docs_by_topic("1").iter().map(|d| d.docid.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let ranks: Vec<usize> = run.result_set("1").unwrap().ranked().map(|(r, _)| r).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_rank_in_topic() {
        let err = parse("1 a 1 2.0\n1 b 2 1.5\n1 c 1 1.0\n").unwrap_err();
        assert!(matches!(err, RunfuseError::Parse { line: 3, .. }));

        assert!(parse("1 a 1 2.0\n2 b 1 1.0\n").is_ok());
    }

    #[test]
    fn test_write_renumbers_ranks() {
        let run = parse("5 x 4 3.0\n5 y 9 2.5\n").unwrap();

        let mut buf = Vec::new();
        write_run(&run, &mut buf, "fused").unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "5 Q0 x 1 3 fused\n5 Q0 y 2 2.5 fused\n");
    }

    #[test]
    fn test_write_with_precision() {
        let run = parse("5 x 1 0.123456789\n").unwrap();

        let mut buf = Vec::new();
        RunWriter::new("t")
            .with_precision(Some(4))
            .write(&run, &mut buf)
            .unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "5 Q0 x 1 0.1235 t\n");
    }

    #[test]
    fn test_write_rejects_bad_tag() {
        let run = parse("5 x 1 1.0\n").unwrap();

        let mut buf = Vec::new();
        let err = write_run(&run, &mut buf, "two words").unwrap_err();
        assert!(matches!(err, RunfuseError::InvalidParameter(_)));
    }

    #[test]
    fn test_write_checks_every_field_before_output() {
        let run = parse("1 Q0 a 1 1.0 t\n2 Q0 café 1 1.0 t\n").unwrap();

        let mut buf = Vec::new();
        let err = write_run(&run, &mut buf, "x").unwrap_err();
        assert!(matches!(err, RunfuseError::InvalidParameter(_)));
        assert!(buf.is_empty());
    }
}
