//! Fetch a snapshot and turn it into a parameter template.

use templater_core::extract::{extract_snapshot, ExtractOptions, Extraction};

use crate::source::{SnapshotSource, SourceError};

/// Fetch one snapshot from `source` and run extraction on it.
///
/// The fetch is the only suspending step; extraction runs to completion
/// synchronously once the snapshot is in hand. Callers must not start a
/// second build for the same editor before this one resolves.
pub async fn build_params(
    source: &dyn SnapshotSource,
    options: &ExtractOptions,
) -> Result<Extraction, SourceError> {
    let snapshot = match source.fetch().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(source = %source.describe(), error = %e, "Snapshot fetch failed");
            return Err(e);
        }
    };

    tracing::debug!(
        source = %source.describe(),
        visual_nodes = snapshot.workflow.nodes.len(),
        prompt_nodes = snapshot.output.len(),
        "Fetched editor snapshot",
    );

    Ok(extract_snapshot(snapshot, options))
}
