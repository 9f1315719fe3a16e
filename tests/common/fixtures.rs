//! Catalog fixtures and an in-process download engine

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use update_stager::{
    DownloadEngine, DownloadHandle, DownloadRequest, EngineState, EngineStatus, Result,
    UpdateCatalog, UpdateRecord,
};

/// Payload served for every "download"
pub const PAYLOAD: &[u8] = b"PK\x03\x04 not really a zip";

/// MD5 of [`PAYLOAD`]
pub fn payload_md5() -> String {
    format!("{:x}", md5::compute(PAYLOAD))
}

/// Server record for `cm-<version>-mako.zip` with the payload checksum
pub fn record(version: &str) -> UpdateRecord {
    let file_name = format!("cm-{version}-mako.zip");
    UpdateRecord::server(
        file_name.clone(),
        format!("https://download.example.org/get/{file_name}"),
        payload_md5(),
    )
    .with_changelog(format!("* Changes in {version}"))
}

/// Catalog with the given full update versions, newest first
pub fn catalog(versions: &[&str]) -> UpdateCatalog {
    UpdateCatalog {
        full_updates: versions.iter().map(|v| record(v)).collect(),
        incremental_updates: vec![],
    }
}

struct Transfer {
    request: DownloadRequest,
    status: EngineStatus,
}

/// Engine that writes [`PAYLOAD`] to the request destination when told to finish
///
/// Shared between orchestrator instances to simulate an engine that outlives
/// the process.
#[derive(Default)]
pub struct FileEngine {
    next_handle: AtomicI64,
    transfers: Mutex<HashMap<DownloadHandle, Transfer>>,
}

impl FileEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the byte counter of a running transfer
    pub fn progress(&self, handle: DownloadHandle, bytes: u64) {
        let mut transfers = self.transfers.lock().unwrap();
        let transfer = transfers.get_mut(&handle).expect("unknown handle");
        transfer.status.bytes_downloaded = bytes;
        transfer.status.bytes_total = Some(PAYLOAD.len() as u64 * 4);
    }

    /// Write the payload and mark the transfer successful; returns where it was written
    pub fn finish(&self, handle: DownloadHandle) -> std::path::PathBuf {
        let mut transfers = self.transfers.lock().unwrap();
        let transfer = transfers.get_mut(&handle).expect("unknown handle");
        let destination = transfer.request.destination.clone();
        std::fs::write(&destination, PAYLOAD).unwrap();
        transfer.status = EngineStatus {
            bytes_downloaded: PAYLOAD.len() as u64,
            bytes_total: Some(PAYLOAD.len() as u64),
            state: EngineState::Successful,
            local_path: Some(destination.clone()),
        };
        destination
    }

    /// Drop all knowledge of a transfer, as an engine reset would
    pub fn lose(&self, handle: DownloadHandle) {
        self.transfers.lock().unwrap().remove(&handle);
    }

    pub fn active_transfers(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

#[async_trait]
impl DownloadEngine for FileEngine {
    async fn enqueue(&self, request: DownloadRequest) -> Result<DownloadHandle> {
        let handle = DownloadHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.transfers.lock().unwrap().insert(
            handle,
            Transfer {
                request,
                status: EngineStatus {
                    bytes_downloaded: 0,
                    bytes_total: None,
                    state: EngineState::Pending,
                    local_path: None,
                },
            },
        );
        Ok(handle)
    }

    async fn query(&self, handle: DownloadHandle) -> Result<Option<EngineStatus>> {
        Ok(self
            .transfers
            .lock()
            .unwrap()
            .get(&handle)
            .map(|t| t.status.clone()))
    }

    async fn remove(&self, handle: DownloadHandle) -> Result<()> {
        if let Some(transfer) = self.transfers.lock().unwrap().remove(&handle) {
            std::fs::remove_file(&transfer.request.destination).ok();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
