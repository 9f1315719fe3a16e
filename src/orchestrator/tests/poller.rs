use crate::orchestrator::test_helpers::*;
use crate::engine::{EngineState, EngineStatus};
use crate::types::{Event, SessionState};
use std::time::Duration;

#[tokio::test]
async fn test_observer_receives_progress() {
    let (orchestrator, _temp_dir, engine, _net) = create_test_orchestrator().await;
    let mut events = orchestrator.subscribe();

    let handle = orchestrator.start(server_record("10.3.0")).await.unwrap();
    engine.set_progress(handle, 50, 200);
    let _observer = orchestrator.observe();

    let event = wait_for_event(&mut events, |e| {
        matches!(e, Event::Progress { bytes_downloaded: 50, .. })
    })
    .await;
    match event {
        Event::Progress {
            handle: h,
            bytes_total,
            ..
        } => {
            assert_eq!(h, handle);
            assert_eq!(bytes_total, Some(200));
        }
        other => panic!("unexpected event {other:?}"),
    }

    let session = orchestrator.session().await;
    assert_eq!(session.bytes_downloaded, 50);
    assert_eq!(session.fraction(), Some(0.25));
}

#[tokio::test]
async fn test_no_polling_without_observer() {
    let (orchestrator, _temp_dir, _engine, _net) = create_test_orchestrator().await;

    orchestrator.start(server_record("10.3.0")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(orchestrator.stats().polls, 0);
}

#[tokio::test]
async fn test_dropping_last_observer_stops_polling_but_not_download() {
    let (orchestrator, _temp_dir, engine, _net) = create_test_orchestrator().await;

    let handle = orchestrator.start(server_record("10.3.0")).await.unwrap();
    let observer = orchestrator.observe();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(observer);

    // Let an in-flight poll finish
    tokio::time::sleep(Duration::from_millis(30)).await;
    let polls = orchestrator.stats().polls;
    assert!(polls > 0);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(orchestrator.stats().polls, polls);

    assert!(engine.removed().is_empty());
    let session = orchestrator.session().await;
    assert_eq!(session.state, SessionState::Downloading);
    assert_eq!(session.handle, Some(handle));
}

#[tokio::test]
async fn test_polling_resumes_when_observed_again() {
    let (orchestrator, _temp_dir, engine, _net) = create_test_orchestrator().await;
    let mut events = orchestrator.subscribe();

    let handle = orchestrator.start(server_record("10.3.0")).await.unwrap();
    drop(orchestrator.observe());

    engine.set_progress(handle, 120, 200);
    let _observer = orchestrator.observe();

    wait_for_event(&mut events, |e| {
        matches!(e, Event::Progress { bytes_downloaded: 120, .. })
    })
    .await;
}

#[tokio::test]
async fn test_observer_before_start_picks_up_new_download() {
    let (orchestrator, _temp_dir, engine, _net) = create_test_orchestrator().await;
    let mut events = orchestrator.subscribe();

    let _observer = orchestrator.observe();
    let handle = orchestrator.start(server_record("10.3.0")).await.unwrap();
    engine.set_progress(handle, 10, 100);

    wait_for_event(&mut events, |e| {
        matches!(e, Event::Progress { bytes_downloaded: 10, .. })
    })
    .await;
}

#[tokio::test]
async fn test_lost_handle_stops_polling_without_state_change() {
    let (orchestrator, _temp_dir, engine, _net) = create_test_orchestrator().await;
    let mut events = orchestrator.subscribe();

    let handle = orchestrator.start(server_record("10.3.0")).await.unwrap();
    engine.forget(handle);
    let _observer = orchestrator.observe();

    let event = wait_for_event(&mut events, |e| matches!(e, Event::PollStopped { .. })).await;
    match event {
        Event::PollStopped { handle: h, .. } => assert_eq!(h, handle),
        other => panic!("unexpected event {other:?}"),
    }

    assert_eq!(orchestrator.stats().anomalies, 1);
    assert_eq!(orchestrator.session().await.state, SessionState::Downloading);
    let state = orchestrator.db.load_state().await.unwrap();
    assert_eq!(state.active_download_handle, Some(handle));
}

#[tokio::test]
async fn test_engine_failure_without_signal_stops_polling_with_warning() {
    let (orchestrator, _temp_dir, engine, _net) = create_test_orchestrator().await;
    let mut events = orchestrator.subscribe();

    let handle = orchestrator.start(server_record("10.3.0")).await.unwrap();
    engine.set_status(
        handle,
        EngineStatus {
            bytes_downloaded: 40,
            bytes_total: Some(100),
            state: EngineState::Failed,
            local_path: None,
        },
    );
    let _observer = orchestrator.observe();

    let event = wait_for_event(&mut events, |e| matches!(e, Event::PollStopped { .. })).await;
    match event {
        Event::PollStopped { handle: h, reason } => {
            assert_eq!(h, handle);
            assert!(reason.contains("Failed"), "reason was {reason}");
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert_eq!(orchestrator.stats().anomalies, 1);
    let session = orchestrator.session().await;
    assert_eq!(session.state, SessionState::Downloading);
    assert_eq!(session.bytes_downloaded, 40);

    // The completion signal still settles the session
    let partial = write_partial(&orchestrator, "cm-10.3.0.zip", b"payload").await;
    let state = orchestrator.complete(handle, &partial).await.unwrap();
    assert_eq!(state, SessionState::Completed);
}

#[tokio::test]
async fn test_query_errors_are_retried() {
    let (orchestrator, _temp_dir, engine, _net) = create_test_orchestrator().await;
    let mut events = orchestrator.subscribe();

    let handle = orchestrator.start(server_record("10.3.0")).await.unwrap();
    engine.fail_query(true);
    let _observer = orchestrator.observe();
    tokio::time::sleep(Duration::from_millis(50)).await;

    engine.fail_query(false);
    engine.set_progress(handle, 80, 100);

    wait_for_event(&mut events, |e| {
        matches!(e, Event::Progress { bytes_downloaded: 80, .. })
    })
    .await;
    assert_eq!(orchestrator.stats().anomalies, 0);
}

#[tokio::test]
async fn test_cancel_stops_polling() {
    let (orchestrator, _temp_dir, _engine, _net) = create_test_orchestrator().await;

    orchestrator.start(server_record("10.3.0")).await.unwrap();
    let _observer = orchestrator.observe();
    tokio::time::sleep(Duration::from_millis(30)).await;

    orchestrator.cancel().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    let polls = orchestrator.stats().polls;

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(orchestrator.stats().polls, polls);
}
