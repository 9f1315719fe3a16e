//! Test configuration helpers for creating orchestrators over a temp directory

use super::fixtures::FileEngine;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use update_stager::{
    Collaborators, Config, DownloadOrchestrator, ManualConnectivity, StaticPlatform,
};

/// Installed version reported by the test platform
pub const INSTALLED_VERSION: &str = "10.2.0";

/// Config with every path inside `dir` and a fast poll interval
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("state").join("update-stager.db");
    config.store.updates_dir = dir.join("updates");
    config.store.staging_path = dir.join("cache").join("update.zip");
    config.download.poll_interval_ms = 10;
    config
}

/// Orchestrator over `dir` driving `engine`
pub async fn open_orchestrator(dir: &Path, engine: Arc<FileEngine>) -> DownloadOrchestrator {
    let platform = StaticPlatform::new()
        .with("ro.product.device", "mako")
        .with("ro.modversion", format!("{INSTALLED_VERSION}-20240301-NIGHTLY-mako"));
    let collaborators = Collaborators {
        engine,
        connectivity: Arc::new(ManualConnectivity::new(true)),
        platform: Arc::new(platform),
    };
    DownloadOrchestrator::new(test_config(dir), collaborators)
        .await
        .expect("Failed to create orchestrator")
}

/// Fresh temp directory, engine and orchestrator
pub async fn create_test_orchestrator() -> (DownloadOrchestrator, Arc<FileEngine>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let engine = Arc::new(FileEngine::new());
    let orchestrator = open_orchestrator(temp_dir.path(), Arc::clone(&engine)).await;
    (orchestrator, engine, temp_dir)
}
