//! Catalog reconciliation
//!
//! Merges the server-advertised update list with the artifacts already in the
//! updates directory:
//!
//! 1. local artifacts are listed (only the configured extension)
//! 2. obsolete artifacts are pruned when the retention policy is enabled
//! 3. the kept artifacts are sorted newest version first
//! 4. server records whose file name is already present locally are dropped
//!
//! No file name ever appears in both halves of the resulting [`CatalogView`].

use crate::error::{Result, VersionParseError};
use crate::retention::RetentionPolicy;
use crate::store::ArtifactStore;
use crate::types::{CatalogView, UpdateRecord, version_from_file_name};
use crate::version::compare_versions;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Reconcile server records against the artifact store
///
/// Obsolete artifacts (and their changelog sidecars) are deleted from disk as a
/// side effect. A failure to delete one is logged and the artifact is still
/// left out of the view.
///
/// # Errors
///
/// A malformed version in a local file name or in `installed_version` fails the
/// whole pass with [`crate::Error::Version`]. Listing errors other than a
/// missing directory are propagated as well.
pub async fn reconcile(
    server_records: Vec<UpdateRecord>,
    store: &ArtifactStore,
    installed_version: &str,
    policy: RetentionPolicy,
) -> Result<CatalogView> {
    let extension = store.extension();
    let files = store.list().await?.into_files();

    let mut kept = Vec::with_capacity(files.len());
    for file_name in files {
        let version = version_from_file_name(&file_name, extension);
        if policy.is_obsolete(version, installed_version)? {
            tracing::info!(
                file_name = %file_name,
                version,
                installed_version,
                "pruning obsolete update"
            );
            if let Err(e) = store.delete(&file_name).await {
                tracing::warn!(file_name = %file_name, error = %e, "failed to prune obsolete update");
            }
            continue;
        }
        kept.push(file_name);
    }

    let kept = sort_newest_first(kept, extension)?;
    let view = merge(server_records, kept);

    tracing::debug!(
        server_only = view.server_only.len(),
        local = view.local.len(),
        "catalog reconciled"
    );
    Ok(view)
}

/// Sort artifact file names by descending embedded version
///
/// Equal versions fall back to descending file name so the order is stable
/// across passes.
pub fn sort_newest_first(
    mut files: Vec<String>,
    extension: &str,
) -> std::result::Result<Vec<String>, VersionParseError> {
    let mut first_error: Option<VersionParseError> = None;

    files.sort_by(|a, b| {
        let version_a = version_from_file_name(a, extension);
        let version_b = version_from_file_name(b, extension);
        match compare_versions(version_a, version_b) {
            Ok(0) => b.cmp(a),
            Ok(diff) if diff > 0 => Ordering::Less,
            Ok(_) => Ordering::Greater,
            Err(e) => {
                first_error.get_or_insert(e);
                Ordering::Equal
            }
        }
    });

    match first_error {
        Some(e) => Err(e),
        None => Ok(files),
    }
}

/// Build the view from server records and the kept local file names
///
/// `local_files` must already be in display order.
pub fn merge(server_records: Vec<UpdateRecord>, local_files: Vec<String>) -> CatalogView {
    let present: HashSet<&str> = local_files.iter().map(String::as_str).collect();

    let server_only = server_records
        .into_iter()
        .filter(|record| !present.contains(record.file_name.as_str()))
        .collect();

    let local = local_files.iter().cloned().map(UpdateRecord::local).collect();

    CatalogView { server_only, local }
}
