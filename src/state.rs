use std::sync::Arc;

use tracing::{info, warn};

use crate::bundle::{self, BackupBundle, ImportStats};
use crate::cache::DurableCache;
use crate::error::AppResult;
use crate::migrate;
use crate::model::{Budget, Debt, Expense, Income, RecurringExpense, SavingsGoal};
use crate::remote::{QueryOptions, RemoteStore};
use crate::sync::{RetryPolicy, SyncedCollection};

/// Everything the UI talks to: one synced view per collection, the durable
/// cache behind them, and the remote store handle the pass-through writes
/// go to.
pub struct AppState {
    cache: Arc<DurableCache>,
    remote: Arc<dyn RemoteStore>,
    pub expenses: SyncedCollection<Expense>,
    pub goals: SyncedCollection<SavingsGoal>,
    pub incomes: SyncedCollection<Income>,
    pub budgets: SyncedCollection<Budget>,
    pub debts: SyncedCollection<Debt>,
    pub recurring: SyncedCollection<RecurringExpense>,
}

impl AppState {
    /// Run the one-shot legacy migration, then spawn every collection
    /// manager. Collections are presented newest-first.
    ///
    /// Migration failure is deliberately not fatal: the marker stays unset,
    /// the legacy data stays put, and the next startup retries the whole
    /// run.
    pub async fn bootstrap(remote: Arc<dyn RemoteStore>, cache: Arc<DurableCache>) -> Self {
        Self::bootstrap_with_retry(remote, cache, RetryPolicy::default()).await
    }

    pub async fn bootstrap_with_retry(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<DurableCache>,
        retry: RetryPolicy,
    ) -> Self {
        match migrate::run_legacy_migration(cache.as_ref(), remote.as_ref()).await {
            Ok(outcome) if outcome.migrated => {
                info!(
                    target: "tallykeep",
                    event = "startup_migration_done",
                    expenses = outcome.expenses,
                    goals = outcome.goals
                );
            }
            Ok(_) => {}
            Err(err) => {
                warn!(target: "tallykeep", event = "startup_migration_failed", error = %err);
            }
        }

        let newest_first = QueryOptions::order_by_desc("createdAt");
        AppState {
            expenses: SyncedCollection::spawn_with_retry(
                remote.clone(),
                cache.clone(),
                newest_first.clone(),
                retry,
            ),
            goals: SyncedCollection::spawn_with_retry(
                remote.clone(),
                cache.clone(),
                newest_first.clone(),
                retry,
            ),
            incomes: SyncedCollection::spawn_with_retry(
                remote.clone(),
                cache.clone(),
                newest_first.clone(),
                retry,
            ),
            budgets: SyncedCollection::spawn_with_retry(
                remote.clone(),
                cache.clone(),
                newest_first.clone(),
                retry,
            ),
            debts: SyncedCollection::spawn_with_retry(
                remote.clone(),
                cache.clone(),
                newest_first.clone(),
                retry,
            ),
            recurring: SyncedCollection::spawn_with_retry(
                remote.clone(),
                cache.clone(),
                newest_first,
                retry,
            ),
            cache,
            remote,
        }
    }

    pub fn cache(&self) -> Arc<DurableCache> {
        self.cache.clone()
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        self.remote.clone()
    }

    /// Snapshot-all backup of the exportable collections.
    pub fn export_bundle(&self) -> BackupBundle {
        let expenses = self.expenses.snapshot();
        let goals = self.goals.snapshot();
        let incomes = self.incomes.snapshot();
        let budgets = self.budgets.snapshot();
        bundle::export_bundle(&expenses, &goals, &incomes, &budgets)
    }

    /// Additive replay of a backup bundle through the normal write path.
    pub async fn import_bundle(&self, bundle: &BackupBundle) -> AppResult<ImportStats> {
        bundle::import_bundle(self.remote.as_ref(), bundle).await
    }

    /// Tear down every collection's subscription and retry timer.
    pub fn shutdown(&self) {
        self.expenses.shutdown();
        self.goals.shutdown();
        self.incomes.shutdown();
        self.budgets.shutdown();
        self.debts.shutdown();
        self.recurring.shutdown();
    }
}
