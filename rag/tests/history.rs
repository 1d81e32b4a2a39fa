use rag::{HistoryEntry, HistoryLog};

#[test]
fn appends_accumulate_in_order_per_user() {
    let dir = tempfile::tempdir().expect("temp dir");
    let log = HistoryLog::open(dir.path().join("history.json"));

    for i in 1..=7 {
        log.append("alice", &format!("question {}", i), &format!("answer {}", i), Some("Source: geo.pdf (Page 1)"))
            .expect("append");
    }
    log.append("bob", "who?", "nobody", None).expect("append for bob");

    let entries = log.entries("alice");
    assert_eq!(entries.len(), 7);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.query, format!("question {}", i + 1));
        assert_eq!(entry.answer, format!("answer {}", i + 1));
    }

    assert_eq!(
        log.entries("bob"),
        vec![HistoryEntry {
            query: "who?".to_string(),
            answer: "nobody".to_string(),
            source_label: None,
        }]
    );
    assert!(log.entries("carol").is_empty());
}

#[test]
fn recent_returns_newest_first() {
    let dir = tempfile::tempdir().expect("temp dir");
    let log = HistoryLog::open(dir.path().join("history.json"));
    for i in 1..=7 {
        log.append("alice", &format!("q{}", i), "a", None).expect("append");
    }
    assert_eq!(log.recent("alice", 5), vec!["q7", "q6", "q5", "q4", "q3"]);
    assert_eq!(log.recent("alice", 0), Vec::<String>::new());
}

#[test]
fn history_is_read_back_from_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("history.json");
    HistoryLog::open(&path)
        .append("alice", "first", "one", None)
        .expect("append");

    let reopened = HistoryLog::open(&path);
    reopened.append("alice", "second", "two", None).expect("append");
    let queries: Vec<String> = reopened.entries("alice").into_iter().map(|e| e.query).collect();
    assert_eq!(queries, vec!["first", "second"]);
}

#[test]
fn corrupt_history_starts_over() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("history.json");
    std::fs::write(&path, "[1, 2,").expect("write corrupt file");

    let log = HistoryLog::open(&path);
    assert!(log.entries("alice").is_empty());
    log.append("alice", "q", "a", None).expect("append after corruption");
    assert_eq!(log.entries("alice").len(), 1);
}
