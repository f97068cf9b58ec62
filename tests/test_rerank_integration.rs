// Integration test for tie-break reranking of a microblog-style run
use std::fs;
use tempfile::TempDir;
use runfuse::rerank::{
    exclude_none, AttributeLookup, AttributeTable, ExcludeIds, NumericDocId, PatternKey,
    TieBreakPolicy, TieBreakReranker,
};
use runfuse::run::{load_run, Run};
use runfuse::RunfuseError;

// Tweet ids grow with creation time, so larger ids are newer.
const TWEETS: &str = "\
MB01 Q0 298000000000000001 1 7.5 ql
MB01 Q0 298000000000000009 2 7.5 ql
MB01 Q0 298000000000000005 3 7.5 ql
MB01 Q0 298000000000000003 4 6.0 ql
MB01 Q0 298000000000000002 5 6.0 ql
MB02 Q0 298000000000000100 1 3.0 ql
";

fn load_tweets(temp: &TempDir) -> Run {
    let path = temp.path().join("tweets.run");
    fs::write(&path, TWEETS).unwrap();
    load_run(&path).unwrap()
}

fn ids(run: &Run, topic: &str) -> Vec<String> {
    run.docs_by_topic(topic)
        .iter()
        .map(|d| d.docid.clone())
        .collect()
}

#[test]
fn test_newer_tweets_win_ties() {
    let temp = TempDir::new().unwrap();
    let run = load_tweets(&temp);

    let reranker = TieBreakReranker::default();
    let out = reranker
        .rerank_run(&run, exclude_none, |d| NumericDocId.tie_break_key(d), "tb")
        .unwrap();

    assert_eq!(
        ids(&out, "MB01"),
        vec![
            "298000000000000009",
            "298000000000000005",
            "298000000000000001",
            "298000000000000003",
            "298000000000000002",
        ]
    );

    for rs in out.result_sets() {
        for pair in rs.documents().windows(2) {
            assert!(pair[0].score > pair[1].score);
        }
    }
    assert_eq!(out.tag(), "tb");
}

#[test]
fn test_rerank_is_deterministic_across_calls() {
    let temp = TempDir::new().unwrap();
    let run = load_tweets(&temp);
    let reranker = TieBreakReranker::default();

    let first = reranker
        .rerank_run(&run, exclude_none, |d| NumericDocId.tie_break_key(d), "a")
        .unwrap();
    for _ in 0..5 {
        let again = reranker
            .rerank_run(&run, exclude_none, |d| NumericDocId.tie_break_key(d), "a")
            .unwrap();
        assert_eq!(first.result_sets(), again.result_sets());
    }
}

#[test]
fn test_exclusion_file() {
    let temp = TempDir::new().unwrap();
    let run = load_tweets(&temp);

    let exclude_path = temp.path().join("retweets.txt");
    fs::write(&exclude_path, "# retweets\n298000000000000009\n298000000000000002\n").unwrap();
    let excluded = ExcludeIds::load(&exclude_path).unwrap();
    assert_eq!(excluded.len(), 2);

    let out = TieBreakReranker::default()
        .rerank_run(
            &run,
            |d| excluded.contains(d),
            |d| NumericDocId.tie_break_key(d),
            "tb",
        )
        .unwrap();

    assert_eq!(out.docs_by_topic("MB01").len(), run.docs_by_topic("MB01").len() - 2);
    assert_eq!(out.docs_by_topic("MB02").len(), 1);
}

#[test]
fn test_attribute_table_drives_key_and_exclusion() {
    let temp = TempDir::new().unwrap();
    let run_path = temp.path().join("docs.run");
    fs::write(&run_path, "q1 Q0 alpha 1 2.0 r\nq1 Q0 beta 2 2.0 r\nq1 Q0 gamma 3 2.0 r\n")
        .unwrap();
    let attrs_path = temp.path().join("attrs.tsv");
    fs::write(&attrs_path, "alpha\t10\nbeta\t30\ngamma\t20\t1\n").unwrap();

    let run = load_run(&run_path).unwrap();
    let table = AttributeTable::load(&attrs_path).unwrap();

    let reranker = TieBreakReranker::default();
    let out = reranker
        .rerank_with(run.result_set("q1").unwrap(), &table)
        .unwrap();

    let ids: Vec<&str> = out.documents().iter().map(|d| d.docid.as_str()).collect();
    assert_eq!(ids, vec!["beta", "alpha"]);
}

#[test]
fn test_pattern_key_and_unparseable_ids() {
    let temp = TempDir::new().unwrap();
    let run_path = temp.path().join("docs.run");
    fs::write(&run_path, "q1 Q0 doc-7 1 1.0 r\nq1 Q0 doc-9 2 1.0 r\nq1 Q0 misc 3 0.5 r\n")
        .unwrap();
    let run = load_run(&run_path).unwrap();

    let lookup = PatternKey::new(r"^doc-(\d+)$").unwrap();
    let reranker = TieBreakReranker::new(TieBreakPolicy::default());

    let err = reranker
        .rerank_run(&run, exclude_none, |d| lookup.tie_break_key(d), "t")
        .unwrap_err();
    assert!(matches!(err, RunfuseError::TieBreakKey { docid, .. } if docid == "misc"));

    let out = reranker
        .rerank_run(&run, |d| d.docid == "misc", |d| lookup.tie_break_key(d), "t")
        .unwrap();
    assert_eq!(ids(&out, "q1"), vec!["doc-9", "doc-7"]);
}
