use image_ranker::ranker::Side;
use image_ranker::{JsonlTraceSink, TraceSink, VoteSource, VoteTrace};
use tempfile::tempdir;

#[derive(Debug, serde::Deserialize)]
struct TraceRow {
    vote_index: usize,
    side: String,
    winner: String,
    loser: String,
    winner_votes: u32,
    source: String,
}

fn make_trace(vote_index: usize, side: Side, source: VoteSource) -> VoteTrace {
    let (winner, loser) = match side {
        Side::Left => ("a.png", "b.png"),
        Side::Right => ("b.png", "a.png"),
    };
    VoteTrace {
        timestamp_ms: 0,
        session_id: "session".to_string(),
        vote_index,
        side,
        winner: winner.to_string(),
        loser: loser.to_string(),
        winner_votes: vote_index as u32,
        source,
    }
}

#[test]
fn jsonl_trace_sink_writes_events_and_flushes_on_join() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");

    let (sink, worker) = JsonlTraceSink::new(&path).unwrap();
    sink.record(make_trace(1, Side::Left, VoteSource::User))
        .unwrap();
    sink.record(make_trace(2, Side::Right, VoteSource::AiComparison))
        .unwrap();

    drop(sink);
    worker.join().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: TraceRow = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first.vote_index, 1);
    assert_eq!(first.side, "left");
    assert_eq!(first.winner, "a.png");
    assert_eq!(first.loser, "b.png");
    assert_eq!(first.source, "user");

    let second: TraceRow = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second.side, "right");
    assert_eq!(second.winner, "b.png");
    assert_eq!(second.winner_votes, 2);
    assert_eq!(second.source, "ai_comparison");
}

#[test]
fn cloned_sinks_share_one_writer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");

    let (sink, worker) = JsonlTraceSink::new(&path).unwrap();
    let other = sink.clone();
    sink.record(make_trace(1, Side::Left, VoteSource::User))
        .unwrap();
    other
        .record(make_trace(2, Side::Left, VoteSource::User))
        .unwrap();

    drop(sink);
    drop(other);
    worker.join().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw.lines().count(), 2);
}

#[test]
fn unwritable_trace_path_fails_up_front() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("trace.jsonl");
    assert!(JsonlTraceSink::new(&path).is_err());
}
