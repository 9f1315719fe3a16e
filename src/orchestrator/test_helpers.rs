//! Shared test helpers for creating DownloadOrchestrator instances in tests.

use crate::config::Config;
use crate::engine::{DownloadEngine, DownloadRequest, EngineState, EngineStatus, ManualConnectivity};
use crate::error::{Error, Result};
use crate::orchestrator::{Collaborators, DownloadOrchestrator};
use crate::platform::StaticPlatform;
use crate::types::{DownloadHandle, Event, UpdateRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tempfile::tempdir;

/// Scriptable download engine
///
/// Enqueued requests start out `Running` with nothing transferred. Tests move
/// them along with [`set_status`](Self::set_status) or make them vanish with
/// [`forget`](Self::forget).
#[derive(Default)]
pub(crate) struct MockEngine {
    next_handle: AtomicI64,
    statuses: Mutex<HashMap<DownloadHandle, EngineStatus>>,
    requests: Mutex<Vec<DownloadRequest>>,
    removed: Mutex<Vec<DownloadHandle>>,
    fail_enqueue: AtomicBool,
    fail_query: AtomicBool,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self {
            next_handle: AtomicI64::new(100),
            ..Default::default()
        }
    }

    pub(crate) fn set_status(&self, handle: DownloadHandle, status: EngineStatus) {
        self.statuses.lock().unwrap().insert(handle, status);
    }

    pub(crate) fn set_progress(&self, handle: DownloadHandle, downloaded: u64, total: u64) {
        self.set_status(
            handle,
            EngineStatus {
                bytes_downloaded: downloaded,
                bytes_total: Some(total),
                state: EngineState::Running,
                local_path: None,
            },
        );
    }

    pub(crate) fn forget(&self, handle: DownloadHandle) {
        self.statuses.lock().unwrap().remove(&handle);
    }

    pub(crate) fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn removed(&self) -> Vec<DownloadHandle> {
        self.removed.lock().unwrap().clone()
    }

    pub(crate) fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_query(&self, fail: bool) {
        self.fail_query.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DownloadEngine for MockEngine {
    async fn enqueue(&self, request: DownloadRequest) -> Result<DownloadHandle> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(Error::Engine("enqueue rejected".to_string()));
        }
        let handle = DownloadHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.requests.lock().unwrap().push(request);
        self.set_status(
            handle,
            EngineStatus {
                bytes_downloaded: 0,
                bytes_total: None,
                state: EngineState::Running,
                local_path: None,
            },
        );
        Ok(handle)
    }

    async fn query(&self, handle: DownloadHandle) -> Result<Option<EngineStatus>> {
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(Error::Engine("query failed".to_string()));
        }
        Ok(self.statuses.lock().unwrap().get(&handle).cloned())
    }

    async fn remove(&self, handle: DownloadHandle) -> Result<()> {
        self.statuses.lock().unwrap().remove(&handle);
        self.removed.lock().unwrap().push(handle);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Config rooted in `dir` with a fast poll interval
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("test.db");
    config.store.updates_dir = dir.join("updates");
    config.store.staging_path = dir.join("cache").join("update.zip");
    config.download.poll_interval_ms = 10;
    config
}

pub(crate) fn test_platform() -> StaticPlatform {
    StaticPlatform::new()
        .with("ro.product.device", "mako")
        .with("ro.modversion", "10.2.0")
}

/// Orchestrator over `config` with the given engine and connectivity
pub(crate) async fn orchestrator_with(
    config: Config,
    engine: Arc<MockEngine>,
    connectivity: ManualConnectivity,
) -> DownloadOrchestrator {
    let collaborators = Collaborators {
        engine,
        connectivity: Arc::new(connectivity),
        platform: Arc::new(test_platform()),
    };
    DownloadOrchestrator::new(config, collaborators).await.unwrap()
}

/// Helper to create a test DownloadOrchestrator backed by a temp directory.
/// Returns the orchestrator, the tempdir (which must be kept alive), the mock
/// engine and the connectivity switch.
pub(crate) async fn create_test_orchestrator() -> (
    DownloadOrchestrator,
    tempfile::TempDir,
    Arc<MockEngine>,
    ManualConnectivity,
) {
    let temp_dir = tempdir().unwrap();
    let engine = Arc::new(MockEngine::new());
    let connectivity = ManualConnectivity::new(true);

    let orchestrator = orchestrator_with(
        test_config(temp_dir.path()),
        Arc::clone(&engine),
        connectivity.clone(),
    )
    .await;

    (orchestrator, temp_dir, engine, connectivity)
}

/// A downloadable server record for `version`
pub(crate) fn server_record(version: &str) -> UpdateRecord {
    UpdateRecord::server(
        format!("cm-{version}.zip"),
        format!("https://updates.example.com/cm-{version}.zip"),
        "",
    )
    .with_changelog(format!("changes in {version}"))
}

/// Write `contents` where the engine would leave the finished `.partial` file
pub(crate) async fn write_partial(
    orchestrator: &DownloadOrchestrator,
    file_name: &str,
    contents: &[u8],
) -> PathBuf {
    let path = orchestrator.store().partial_path(file_name);
    tokio::fs::create_dir_all(orchestrator.store().dir())
        .await
        .unwrap();
    tokio::fs::write(&path, contents).await.unwrap();
    path
}

/// Wait for the next event matching `pred`, failing after one second
pub(crate) async fn wait_for_event<F>(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    pred: F,
) -> Event
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
