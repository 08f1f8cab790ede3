mod common;

use std::fs::File;

use common::assert_no_more_lines;
use common::eventually;
use common::recv_lines;
use common::test_config;
use common::LogFile;
use logfetcher::gather_metrics;
use logfetcher::offset_lines;
use logfetcher::Connection;
use logfetcher::Error;
use logfetcher::TailError;
use logfetcher::TailHandler;
use logfetcher::TailRequest;
use tokio::sync::mpsc;

#[test]
fn test_offset_lines_on_empty_file_is_empty() {
    let log = LogFile::with_lines(&[]);
    let mut file = File::open(log.path()).unwrap();

    let lines = offset_lines(&mut file, 3).unwrap();

    assert!(lines.is_empty());
}

#[test]
fn test_offset_lines_returns_min_of_n_and_k() {
    let log = LogFile::with_lines(&["a", "b", "c", "d", "e"]);
    let mut file = File::open(log.path()).unwrap();

    assert_eq!(offset_lines(&mut file, 3).unwrap(), vec!["c", "d", "e"]);
    assert_eq!(offset_lines(&mut file, 9).unwrap(), vec!["a", "b", "c", "d", "e"]);
    assert!(offset_lines(&mut file, 0).unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tail_session_end_to_end() {
    let log = LogFile::with_lines(&["Tail0", "Tail1"]);
    let handler = TailHandler::new(test_config()).unwrap();

    // first client replays everything it can and then follows
    let first_conn = Connection::new();
    let (tx1, mut rx1) = mpsc::unbounded_channel::<String>();
    let ack = handler
        .tail(TailRequest::new(log.path(), tx1).with_line_offset(3), &first_conn)
        .await
        .unwrap();
    assert_eq!(ack.replayed, 2);
    assert_eq!(recv_lines(&mut rx1, 2).await, vec!["Tail0", "Tail1"]);

    // second client joins without replay
    let second_conn = Connection::new();
    let (tx2, mut rx2) = mpsc::unbounded_channel::<String>();
    handler
        .tail(TailRequest::new(log.path(), tx2), &second_conn)
        .await
        .unwrap();
    assert_no_more_lines(&mut rx2).await;

    log.append_lines(&["Tail2", "Tail3"]);
    assert_eq!(recv_lines(&mut rx1, 2).await, vec!["Tail2", "Tail3"]);
    assert_eq!(recv_lines(&mut rx2, 2).await, vec!["Tail2", "Tail3"]);

    // transport reports the second client gone
    handler.disconnect(&second_conn);
    assert!(eventually(|| handler.registry().subscriber_count(&ack.path) == 1).await);

    log.append_lines(&["Tail4", "Tail5"]);
    assert_eq!(recv_lines(&mut rx1, 2).await, vec!["Tail4", "Tail5"]);
    assert_no_more_lines(&mut rx2).await;

    // last client gone: nothing left running
    first_conn.close();
    assert!(eventually(|| handler.registry().watcher_count() == 0).await);

    let metrics = gather_metrics();
    assert!(metrics.contains("logfetcher_lines_broadcast_total"));
    assert!(metrics.contains("logfetcher_replayed_lines_total"));
}

#[tokio::test]
async fn test_many_files_are_watched_independently() {
    let logs: Vec<LogFile> = (0..3).map(|_| LogFile::with_lines(&[])).collect();
    let handler = TailHandler::new(test_config()).unwrap();
    let connection = Connection::new();

    let mut receivers = Vec::new();
    for log in &logs {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        handler.tail(TailRequest::new(log.path(), tx), &connection).await.unwrap();
        receivers.push(rx);
    }
    assert_eq!(handler.registry().watcher_count(), 3);

    for (i, log) in logs.iter().enumerate() {
        let line = format!("file-{i}");
        log.append_lines(&[line.as_str()]);
    }
    for (i, rx) in receivers.iter_mut().enumerate() {
        assert_eq!(recv_lines(rx, 1).await, vec![format!("file-{i}")]);
        assert_no_more_lines(rx).await;
    }

    handler.shutdown();
    assert_eq!(handler.registry().watcher_count(), 0);
}

#[tokio::test]
async fn test_unreadable_target_fails_the_call() {
    let handler = TailHandler::new(test_config()).unwrap();
    let (tx, _rx) = mpsc::unbounded_channel::<String>();

    let result = handler
        .tail(TailRequest::new("/var/empty/missing.log", tx), &Connection::new())
        .await;

    assert!(matches!(result, Err(Error::Tail(TailError::NotFound { .. }))));
    assert_eq!(handler.registry().watcher_count(), 0);
}
