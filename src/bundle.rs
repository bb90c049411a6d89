//! Versioned export/import of the synced collections.
//!
//! The bundle is the persisted backup file format. Import is additive: every
//! record goes back through the normal `add` path and receives a fresh
//! identifier, so importing is never a restore-to-identical-ids operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::migrate::replay_documents;
use crate::model::{Budget, CollectionKind, Expense, Income, SavingsGoal, SCHEMA_VERSION};
use crate::remote::RemoteStore;
use crate::time::now_iso;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BundleError {
    #[error("failed to parse backup bundle: {0}")]
    Parse(String),
    #[error("backup bundle is not a JSON object")]
    NotAnObject,
    #[error("backup bundle is missing its schema version tag")]
    MissingVersion,
    #[error("backup bundle field `{0}` is not an array")]
    NotAnArray(&'static str),
}

impl From<BundleError> for AppError {
    fn from(error: BundleError) -> Self {
        AppError::new("BUNDLE/INVALID", error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupBundle {
    pub schema_version: String,
    pub exported_at: String,
    pub expenses: Vec<Value>,
    pub goals: Vec<Value>,
    pub incomes: Vec<Value>,
    pub budgets: Vec<Value>,
}

fn to_values<T: Serialize>(records: &[T]) -> Vec<Value> {
    records
        .iter()
        .filter_map(|record| serde_json::to_value(record).ok())
        .collect()
}

/// Snapshot the four exportable collections into a bundle stamped with the
/// current schema version and export time.
pub fn export_bundle(
    expenses: &[Expense],
    goals: &[SavingsGoal],
    incomes: &[Income],
    budgets: &[Budget],
) -> BackupBundle {
    BackupBundle {
        schema_version: SCHEMA_VERSION.to_string(),
        exported_at: now_iso(),
        expenses: to_values(expenses),
        goals: to_values(goals),
        incomes: to_values(incomes),
        budgets: to_values(budgets),
    }
}

fn array_field(map: &serde_json::Map<String, Value>, name: &'static str) -> Result<Vec<Value>, BundleError> {
    match map.get(name) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(BundleError::NotAnArray(name)),
    }
}

/// Parse and validate a serialized bundle: the version tag must be present
/// and each collection field must be an array when it appears at all.
pub fn parse_bundle(json: &str) -> Result<BackupBundle, BundleError> {
    let value: Value =
        serde_json::from_str(json).map_err(|err| BundleError::Parse(err.to_string()))?;
    let map = value.as_object().ok_or(BundleError::NotAnObject)?;
    let schema_version = map
        .get("schemaVersion")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(BundleError::MissingVersion)?
        .to_string();
    let exported_at = map
        .get("exportedAt")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(BackupBundle {
        schema_version,
        exported_at,
        expenses: array_field(map, "expenses")?,
        goals: array_field(map, "goals")?,
        incomes: array_field(map, "incomes")?,
        budgets: array_field(map, "budgets")?,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub expenses: usize,
    pub goals: usize,
    pub incomes: usize,
    pub budgets: usize,
}

impl ImportStats {
    pub fn total(&self) -> usize {
        self.expenses + self.goals + self.incomes + self.budgets
    }
}

/// Replay every bundled record through the remote `add` path. Identifiers
/// are reassigned by the store; `createdAt` stamps ride along.
pub async fn import_bundle(
    remote: &dyn RemoteStore,
    bundle: &BackupBundle,
) -> AppResult<ImportStats> {
    let stats = ImportStats {
        expenses: replay_documents(
            remote,
            CollectionKind::Expenses,
            &bundle.expenses,
            "BUNDLE/IMPORT",
        )
        .await?,
        goals: replay_documents(remote, CollectionKind::Goals, &bundle.goals, "BUNDLE/IMPORT")
            .await?,
        incomes: replay_documents(
            remote,
            CollectionKind::Incomes,
            &bundle.incomes,
            "BUNDLE/IMPORT",
        )
        .await?,
        budgets: replay_documents(
            remote,
            CollectionKind::Budgets,
            &bundle.budgets,
            "BUNDLE/IMPORT",
        )
        .await?,
    };
    info!(
        target: "tallykeep",
        event = "bundle_imported",
        records = stats.total()
    );
    Ok(stats)
}
