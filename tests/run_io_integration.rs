// Integration test for loading and saving run files
use std::fs;
use tempfile::TempDir;
use runfuse::fusion::{rescore, RescoreStrategy};
use runfuse::run::{load_run, save_run};
use runfuse::RunfuseError;

const BM25_RUN: &str = "\
301 Q0 FBIS3-10082 1 15.3210 bm25
301 Q0 FBIS3-10169 2 14.9012 bm25
301 Q0 LA070389-0001 3 14.9012 bm25
302 Q0 FT943-1234 1 22.5000 bm25
302 Q0 FT943-5678 2 18.0000 bm25
303 Q0 LA010189-0018 1 9.1000 bm25
";

#[test]
fn test_round_trip_preserves_topics_and_counts() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("bm25.run");
    let output = temp.path().join("copy.run");
    fs::write(&input, BM25_RUN).unwrap();

    let original = load_run(&input).unwrap();
    save_run(&original, &output, "copy").unwrap();
    let reloaded = load_run(&output).unwrap();

    assert_eq!(
        original.topics().collect::<Vec<_>>(),
        reloaded.topics().collect::<Vec<_>>()
    );
    for topic in original.topics() {
        let before = original.docs_by_topic(topic);
        let after = reloaded.docs_by_topic(topic);
        assert_eq!(before.len(), after.len());

        for (a, b) in before.iter().zip(after) {
            assert_eq!(a.docid, b.docid);
            assert_eq!(a.score, b.score);
        }
    }
    assert_eq!(reloaded.tag(), "copy");
}

#[test]
fn test_written_file_format() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("bm25.run");
    let output = temp.path().join("out.run");
    fs::write(&input, BM25_RUN).unwrap();

    let run = load_run(&input).unwrap();
    save_run(&run, &output, "out").unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.is_ascii());
    assert!(text.ends_with('\n'));

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "301 Q0 FBIS3-10082 1 15.321 out");
    assert_eq!(lines[3], "302 Q0 FT943-1234 1 22.5 out");
}

#[test]
fn test_rescored_run_round_trip() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("bm25.run");
    let output = temp.path().join("rrf.run");
    fs::write(&input, BM25_RUN).unwrap();

    let run = load_run(&input).unwrap();
    let rrf = rescore(&run, &RescoreStrategy::rrf()).unwrap();
    save_run(&rrf, &output, "rrf").unwrap();

    let reloaded = load_run(&output).unwrap();
    assert_eq!(reloaded.docs_by_topic("301")[0].score, 1.0 / 61.0);
    assert_eq!(reloaded.docs_by_topic("301")[2].score, 1.0 / 63.0);
}

#[test]
fn test_four_column_input() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("simple.run");
    fs::write(&input, "1 d1 1 0.5\n1 d2 2 0.25\n2 d3 1 1.0\n").unwrap();

    let run = load_run(&input).unwrap();
    assert_eq!(run.len(), 2);
    assert_eq!(run.document_count(), 3);
}

#[test]
fn test_malformed_line_names_file_and_line() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("broken.run");
    fs::write(&input, "101 Q0 d1 1 2.0 x\n101 abc notanumber\n").unwrap();

    let err = load_run(&input).unwrap_err();
    match &err {
        RunfuseError::Parse { path, line, .. } => {
            assert_eq!(path, &input);
            assert_eq!(*line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("broken.run:2"));
}

#[test]
fn test_missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = load_run(&temp.path().join("nope.run")).unwrap_err();
    assert!(matches!(err, RunfuseError::Io { .. }));
}

#[test]
fn test_empty_file_gives_empty_run() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("empty.run");
    fs::write(&input, "").unwrap();

    let run = load_run(&input).unwrap();
    assert!(run.is_empty());
}

#[test]
fn test_rrf_uses_rank_column_not_line_order() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("shuffled.run");
    fs::write(&input, "1 Q0 a 2 0.5 t\n1 Q0 b 1 0.9 t\n").unwrap();

    let run = load_run(&input).unwrap();
    let rrf = rescore(&run, &RescoreStrategy::rrf()).unwrap();

    let docs = rrf.docs_by_topic("1");
    assert_eq!(docs[0].docid, "b");
    assert_eq!(docs[0].score, 1.0 / 61.0);
    assert_eq!(docs[1].docid, "a");
    assert_eq!(docs[1].score, 1.0 / 62.0);
}

#[test]
fn test_invalid_docid_leaves_no_output_file() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("accented.run");
    let output = temp.path().join("out.run");
    fs::write(&input, "1 Q0 a 1 1.0 t\n2 Q0 café 1 1.0 t\n").unwrap();

    let run = load_run(&input).unwrap();
    let err = save_run(&run, &output, "x").unwrap_err();

    assert!(matches!(err, RunfuseError::InvalidParameter(_)));
    assert!(!output.exists());
}
