use super::*;
use crate::kernel::buffer::Span;
use crate::kernel::diagnostics::Severity;
use crate::kernel::services::adapters::file::LocalFileSystem;
use crate::kernel::services::ports::SearchMatch;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

/// A runtime nobody drives: spawned workers never run, so tests feed results by hand.
fn idle_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn create_host(rt: &tokio::runtime::Runtime) -> (IntelHost, Receiver<HostEvent>) {
    IntelHost::new(
        rt.handle().clone(),
        Arc::new(LocalFileSystem::new()),
        Settings::default(),
    )
}

fn drive_until<F>(host: &mut IntelHost, events: &Receiver<HostEvent>, mut pred: F) -> HostEvent
where
    F: FnMut(&HostEvent) -> bool,
{
    for _ in 0..500 {
        host.tick(Instant::now());
        while let Ok(event) = events.try_recv() {
            if pred(&event) {
                return event;
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("event never arrived");
}

fn finished(task_id: TaskId, buffer: BufferId, revision: Revision, message: &str) -> WorkerMessage {
    let diagnostics: Arc<[Diagnostic]> = vec![Diagnostic::new(
        Severity::Warning,
        "test",
        Span::new(revision, 0, 1),
        message,
    )]
    .into();
    WorkerMessage::Analysis(AnalysisMessage::Finished {
        task_id,
        buffer,
        revision,
        diagnostics,
    })
}

#[test]
fn test_edit_burst_dispatches_one_analysis_of_latest_revision() {
    let rt = create_runtime();
    let (mut host, events) = create_host(&rt);
    let t0 = Instant::now();

    let buffer = host.open_buffer(LanguageId::Python, "import os\n", t0);
    host.on_change(buffer, "import os\nx = 1\n", t0 + Duration::from_millis(50))
        .unwrap();
    let last = host
        .on_change(buffer, "import os\nx = 2\n", t0 + Duration::from_millis(100))
        .unwrap();
    assert_eq!(last, 2);

    host.tick(t0 + Duration::from_millis(399));
    assert!(host.buffers[&buffer].analysis.active().is_none());

    host.tick(t0 + Duration::from_millis(400));
    let active = host.buffers[&buffer].analysis.active().unwrap();
    assert_eq!(active.revision(), Some(2));

    let event = drive_until(&mut host, &events, |e| {
        matches!(e, HostEvent::DiagnosticsUpdated { .. })
    });
    match event {
        HostEvent::DiagnosticsUpdated {
            revision,
            diagnostics,
            ..
        } => {
            assert_eq!(revision, 2);
            let codes: Vec<_> = diagnostics.iter().map(|d| d.code).collect();
            assert!(codes.contains(&"unused-import"));
            assert!(codes.contains(&"unused-variable"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(host.problems().revision(buffer), Some(2));
    assert!(events.try_recv().is_err());
}

#[test]
fn test_superseded_analysis_result_is_dropped() {
    let rt = idle_runtime();
    let (mut host, events) = create_host(&rt);
    let t0 = Instant::now();
    let buffer = host.open_buffer(LanguageId::Python, "a = 1\n", t0);

    let old_task = host.analyze_now(buffer).unwrap();
    host.on_change(buffer, "a = 2\n", t0).unwrap();
    let new_task = host.analyze_now(buffer).unwrap();
    assert_ne!(old_task, new_task);

    assert!(host.handle_worker_message(finished(new_task, buffer, 1, "new")));
    assert!(!host.handle_worker_message(finished(old_task, buffer, 0, "old")));

    let published = host.problems().get(buffer).unwrap();
    assert_eq!(published.revision, 1);
    assert_eq!(published.diagnostics[0].message, "new");

    let delivered: Vec<_> = events.try_iter().collect();
    assert_eq!(delivered.len(), 1);
}

#[test]
fn test_analysis_failure_is_reported() {
    let rt = idle_runtime();
    let (mut host, events) = create_host(&rt);
    let buffer = host.open_buffer(LanguageId::Python, "a = 1\n", Instant::now());
    let task = host.analyze_now(buffer).unwrap();

    assert!(host.handle_worker_message(WorkerMessage::Analysis(AnalysisMessage::Failed {
        task_id: task,
        buffer,
        revision: 0,
        reason: "boom".to_string(),
    })));
    assert!(host.problems().get(buffer).is_none());
    assert!(matches!(
        events.try_recv(),
        Ok(HostEvent::AnalysisFailed { reason, .. }) if reason == "boom"
    ));
}

#[test]
fn test_invalid_pattern_fails_before_dispatch() {
    let rt = idle_runtime();
    let (mut host, _events) = create_host(&rt);
    let buffer = host.open_buffer(LanguageId::PlainText, "abc", Instant::now());

    let err = host
        .request_search(buffer, SearchQuery::regex("(unclosed"))
        .unwrap_err();
    assert!(matches!(err, HostError::Search(SearchError::InvalidPattern(_))));
    assert!(host.buffers[&buffer].search.active().is_none());
}

#[test]
fn test_unknown_buffer() {
    let rt = idle_runtime();
    let (mut host, _events) = create_host(&rt);
    let missing = BufferId::new(99);
    assert!(matches!(
        host.on_change(missing, "x", Instant::now()),
        Err(HostError::UnknownBuffer(id)) if id == missing
    ));
    assert!(!host.close_buffer(missing));
}

#[test]
fn test_search_reruns_after_edit() {
    let rt = create_runtime();
    let (mut host, events) = create_host(&rt);
    let t0 = Instant::now();
    let buffer = host.open_buffer(LanguageId::PlainText, "foo bar", t0);

    let first = host
        .request_search(buffer, SearchQuery::literal("foo"))
        .unwrap();
    let event = drive_until(&mut host, &events, |e| {
        matches!(e, HostEvent::SearchResultsUpdated { .. })
    });
    match event {
        HostEvent::SearchResultsUpdated { query_id, results } => {
            assert_eq!(query_id, first);
            assert_eq!(results.len(), 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    host.on_change(buffer, "foo foo bar foo", Instant::now()).unwrap();
    let event = drive_until(&mut host, &events, |e| {
        matches!(e, HostEvent::SearchResultsUpdated { .. })
    });
    match event {
        HostEvent::SearchResultsUpdated { results, .. } => {
            assert_eq!(results.revision(), 1);
            let starts: Vec<_> = results.matches().iter().map(SearchMatch::start).collect();
            assert_eq!(starts, vec![0, 4, 12]);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn test_replace_all_applies_current_results() {
    let rt = create_runtime();
    let (mut host, events) = create_host(&rt);
    let buffer = host.open_buffer(LanguageId::PlainText, "x=1 y=2", Instant::now());

    host.request_search(buffer, SearchQuery::regex(r"(\w)=(\d)"))
        .unwrap();
    drive_until(&mut host, &events, |e| {
        matches!(e, HostEvent::SearchResultsUpdated { .. })
    });

    let revision = host
        .request_replace(buffer, ReplaceTarget::All, "$2=$1", Instant::now())
        .unwrap();
    assert_eq!(revision, 1);
    assert_eq!(&*host.snapshot(buffer).unwrap().text(), "1=x 2=y");
    assert!(host.search_results(buffer).is_none());
    drive_until(&mut host, &events, |e| {
        matches!(e, HostEvent::ReplaceApplied { revision: 1, .. })
    });
}

#[test]
fn test_replace_with_stale_results_leaves_buffer_unchanged() {
    let rt = idle_runtime();
    let (mut host, events) = create_host(&rt);
    let t0 = Instant::now();
    let buffer = host.open_buffer(LanguageId::PlainText, "aaa", t0);
    let search_id = host
        .request_search(buffer, SearchQuery::literal("a"))
        .unwrap();

    let matches: Arc<[SearchMatch]> = vec![SearchMatch::new(Span::new(0, 0, 1), 0, 0)].into();
    assert!(host.handle_worker_message(WorkerMessage::Search(SearchMessage::Matches {
        search_id,
        buffer,
        revision: 0,
        matches,
    })));
    let _ = events.try_iter().count();

    host.on_change(buffer, "bbb", t0).unwrap();
    let err = host
        .request_replace(buffer, ReplaceTarget::One(0), "z", t0)
        .unwrap_err();

    assert!(matches!(err, HostError::Replace(ReplaceError::StaleMatchSet(_))));
    assert_eq!(&*host.snapshot(buffer).unwrap().text(), "bbb");
    assert_eq!(host.snapshot(buffer).unwrap().revision(), 1);
    assert!(matches!(
        events.try_recv(),
        Ok(HostEvent::ReplaceFailed { buffer: Some(b), .. }) if b == buffer
    ));
}

#[test]
fn test_cancel_by_task_id() {
    let rt = idle_runtime();
    let (mut host, _events) = create_host(&rt);
    let buffer = host.open_buffer(LanguageId::Python, "a = 1\n", Instant::now());
    let task = host.analyze_now(buffer).unwrap();

    assert!(host.cancel(task));
    assert!(!host.cancel(task));
    assert!(host.buffers[&buffer].analysis.active().is_none());
}

#[test]
fn test_multi_file_search_then_replace_in_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.py"), "old = 1\n").unwrap();
    fs::create_dir(dir.path().join("pkg")).unwrap();
    fs::write(dir.path().join("pkg").join("b.py"), "print(old)\n").unwrap();

    let rt = create_runtime();
    let (mut host, events) = create_host(&rt);
    let id = host
        .request_multi_file_search(
            dir.path().to_path_buf(),
            SearchQuery::literal("old").whole_word(true),
            FileFilter::default(),
        )
        .unwrap();

    let event = drive_until(&mut host, &events, |e| {
        matches!(e, HostEvent::MultiFileSearchComplete { .. })
    });
    match event {
        HostEvent::MultiFileSearchComplete { query_id, outcome } => {
            assert_eq!(query_id, id);
            assert_eq!(outcome.total_matches, 2);
            assert!(!outcome.partial);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(!host.is_busy());

    let outcomes = host.replace_in_files("new").unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(FileReplaceOutcome::is_ok));
    assert_eq!(
        fs::read_to_string(dir.path().join("pkg").join("b.py")).unwrap(),
        "print(new)\n"
    );
}

#[test]
fn test_literal_replace_inserts_dollar_text_verbatim() {
    let rt = create_runtime();
    let (mut host, events) = create_host(&rt);
    let buffer = host.open_buffer(LanguageId::PlainText, "cost: PRICE", Instant::now());

    host.request_search(buffer, SearchQuery::literal("PRICE"))
        .unwrap();
    drive_until(&mut host, &events, |e| {
        matches!(e, HostEvent::SearchResultsUpdated { .. })
    });
    host.request_replace(buffer, ReplaceTarget::All, "$5 USD", Instant::now())
        .unwrap();
    assert_eq!(&*host.snapshot(buffer).unwrap().text(), "cost: $5 USD");

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("prices.txt"), "total = PRICE\n").unwrap();
    host.request_multi_file_search(
        dir.path().to_path_buf(),
        SearchQuery::literal("PRICE"),
        FileFilter::default(),
    )
    .unwrap();
    drive_until(&mut host, &events, |e| {
        matches!(e, HostEvent::MultiFileSearchComplete { .. })
    });
    let outcomes = host.replace_in_files("${amount}").unwrap();
    assert!(outcomes.iter().all(FileReplaceOutcome::is_ok));
    assert_eq!(
        fs::read_to_string(dir.path().join("prices.txt")).unwrap(),
        "total = ${amount}\n"
    );
}

#[test]
fn test_edit_clears_selection_scoped_search() {
    let rt = idle_runtime();
    let (mut host, events) = create_host(&rt);
    let t0 = Instant::now();
    let buffer = host.open_buffer(LanguageId::PlainText, "abc abc", t0);

    let search_id = host
        .request_search(buffer, SearchQuery::literal("abc").in_selection(Span::new(0, 0, 3)))
        .unwrap();
    let matches: Arc<[SearchMatch]> = vec![SearchMatch::new(Span::new(0, 0, 3), 0, 0)].into();
    assert!(host.handle_worker_message(WorkerMessage::Search(SearchMessage::Matches {
        search_id,
        buffer,
        revision: 0,
        matches,
    })));
    let _ = events.try_iter().count();

    host.on_change(buffer, "xabc abc", t0).unwrap();
    host.tick(t0 + Duration::from_secs(5));

    let state = &host.buffers[&buffer];
    assert!(state.query.is_none());
    assert!(!state.search.is_pending());
    assert!(state.search.active().is_none());
    assert!(host.search_results(buffer).is_none());
    assert!(!events
        .try_iter()
        .any(|e| matches!(e, HostEvent::SearchFailed { .. })));
}

#[test]
fn test_edit_keeps_buffer_scoped_search_pending() {
    let rt = idle_runtime();
    let (mut host, _events) = create_host(&rt);
    let t0 = Instant::now();
    let buffer = host.open_buffer(LanguageId::PlainText, "abc", t0);

    let first = host
        .request_search(buffer, SearchQuery::literal("abc"))
        .unwrap();
    host.on_change(buffer, "abc abc", t0).unwrap();
    host.tick(t0 + Duration::from_secs(5));

    let active = host.buffers[&buffer].search.active().unwrap();
    assert_ne!(active.id(), first);
    assert_eq!(active.revision(), Some(1));
}
