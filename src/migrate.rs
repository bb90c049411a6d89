//! One-shot migration of pre-sync local data into the remote store.
//!
//! Runs at startup, ahead of first render. Legacy records are replayed
//! through the normal `add` path and the deprecated keys are only cleared
//! once every write succeeded; a partial failure leaves the legacy data and
//! the marker untouched so the whole run repeats next startup. Re-adding
//! already-migrated records as duplicates on such a retry is accepted:
//! deduplication could discard legitimately distinct records with identical
//! content, and losing data is the one thing this path must never do.

use serde_json::Value;
use tracing::{info, warn};

use crate::cache::DurableCache;
use crate::error::{AppError, AppResult};
use crate::model::{CollectionKind, SCHEMA_VERSION};
use crate::remote::RemoteStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub migrated: bool,
    pub expenses: usize,
    pub goals: usize,
}

pub async fn run_legacy_migration(
    cache: &DurableCache,
    remote: &dyn RemoteStore,
) -> AppResult<MigrationOutcome> {
    if cache.migration_complete() || !cache.has_legacy_data() {
        return Ok(MigrationOutcome::default());
    }

    let legacy = cache.load_legacy_data();
    if legacy.is_empty() {
        // Keys exist but hold nothing worth replaying.
        cache.clear_legacy_data();
        return Ok(MigrationOutcome::default());
    }

    let expenses = replay_documents(
        remote,
        CollectionKind::Expenses,
        &legacy.expenses,
        "MIGRATION/PARTIAL",
    )
    .await?;
    let goals = replay_documents(
        remote,
        CollectionKind::Goals,
        &legacy.goals,
        "MIGRATION/PARTIAL",
    )
    .await?;

    cache.clear_legacy_data();
    info!(
        target: "tallykeep",
        event = "legacy_migration_complete",
        expenses,
        goals
    );
    Ok(MigrationOutcome {
        migrated: true,
        expenses,
        goals,
    })
}

/// Replay raw records through the normal `add` path: old identifiers are
/// stripped (the store assigns new ones), the schema-version tag is added,
/// and a present `createdAt` rides along so the original creation time
/// survives best-effort. Non-object entries are skipped.
pub(crate) async fn replay_documents(
    remote: &dyn RemoteStore,
    kind: CollectionKind,
    records: &[Value],
    error_code: &str,
) -> AppResult<usize> {
    let mut written = 0usize;
    for record in records {
        let Some(map) = record.as_object() else {
            continue;
        };
        let mut document = map.clone();
        document.remove("id");
        document.insert(
            "schemaVersion".to_string(),
            Value::String(SCHEMA_VERSION.to_string()),
        );
        remote.add(kind.name(), document).await.map_err(|err| {
            warn!(
                target: "tallykeep",
                event = "replay_write_failed",
                collection = %kind,
                error = %err
            );
            AppError::new(error_code, err.to_string())
                .with_context("collection", kind.name())
                .with_context("written", written.to_string())
        })?;
        written += 1;
    }
    Ok(written)
}
