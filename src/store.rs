//! Async facade over the treasury store.
//!
//! Store operations suspend on storage I/O, so the form layer must never run
//! them on its interactive thread. Every call here hops through
//! `spawn_blocking`; the single mutex around the connection serializes all
//! mutations (the chain transitions and the catalog's set-difference are
//! check-then-act and must not interleave).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::badi::BadiDate;
use crate::db::values::ORGANIZATION_PANEL;
use crate::db::{
    FiscalYearRow, FormValue, MonthFilter, MonthRow, SaveOutcome, TreasuryDb, ValueRow, YearFilter,
};
use crate::error::StoreError;
use crate::settings::Settings;
use crate::snapshot::SnapshotCache;

/// Shared handle to the store and the organization snapshot cache.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<TreasuryDb>>,
    snapshot: Arc<SnapshotCache>,
}

impl Store {
    /// Open the store off the calling thread.
    pub async fn open(settings: &Settings) -> Result<Self, StoreError> {
        let settings = settings.clone();
        let db = tokio::task::spawn_blocking(move || TreasuryDb::open(&settings))
            .await
            .map_err(|e| StoreError::Background(e.to_string()))??;
        Ok(Self::with_db(db))
    }

    /// Wrap an already-open database. Useful for testing.
    pub fn with_db(db: TreasuryDb) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            snapshot: Arc::new(SnapshotCache::new()),
        }
    }

    /// Run a closure against the database on a blocking thread.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&TreasuryDb) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| StoreError::Background(format!("store mutex poisoned: {e}")))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))?
    }

    /// Persist one panel's values. A successful organization save rebuilds
    /// the snapshot cache wholesale from what was just written.
    pub async fn save_panel_values(
        &self,
        panel: &str,
        incoming: HashMap<String, FormValue>,
        entered: BadiDate,
    ) -> Result<SaveOutcome, StoreError> {
        let panel_owned = panel.to_string();
        let fields: HashSet<String> = incoming.keys().cloned().collect();

        let outcome = self
            .run(move |db| db.save_panel_values(&panel_owned, &incoming, entered))
            .await?;

        if panel == ORGANIZATION_PANEL {
            let persisted: HashSet<String> = fields
                .into_iter()
                .filter(|f| !outcome.skipped.contains(f))
                .collect();
            if !persisted.is_empty() {
                let map = self
                    .run(move |db| db.panel_snapshot(&persisted, entered.year))
                    .await?;
                self.snapshot.replace(map);
            }
        }
        Ok(outcome)
    }

    /// The cached organization snapshot; empty before the first save or load.
    pub fn organization_snapshot(&self) -> HashMap<String, String> {
        self.snapshot.get()
    }

    /// Populate the snapshot cache from the store, e.g. on startup for an
    /// existing set of books.
    pub async fn refresh_organization_snapshot(
        &self,
        fields: HashSet<String>,
    ) -> Result<(), StoreError> {
        let Some(current) = self.current_fiscal_year().await? else {
            return Ok(());
        };
        let rows = self
            .run(move |db| db.transaction_values(&fields, current.year, None))
            .await?;
        self.snapshot.replace_with_rows(&rows);
        Ok(())
    }

    pub async fn current_fiscal_year(&self) -> Result<Option<FiscalYearRow>, StoreError> {
        self.run(|db| db.current_fiscal_year()).await
    }

    pub async fn fiscal_years(&self, filter: YearFilter) -> Result<Vec<FiscalYearRow>, StoreError> {
        self.run(move |db| db.fiscal_years(filter)).await
    }

    pub async fn months(&self, filter: Option<MonthFilter>) -> Result<Vec<MonthRow>, StoreError> {
        self.run(move |db| db.months(filter)).await
    }

    pub async fn transaction_values(
        &self,
        fields: HashSet<String>,
        year: i32,
        month: Option<String>,
    ) -> Result<Vec<ValueRow>, StoreError> {
        self.run(move |db| db.transaction_values(&fields, year, month.as_deref()))
            .await
    }

    /// Flattened panel view for form population.
    pub async fn panel_snapshot(
        &self,
        fields: HashSet<String>,
        year: i32,
    ) -> Result<HashMap<String, String>, StoreError> {
        self.run(move |db| db.panel_snapshot(&fields, year)).await
    }
}

// =============================================================================
// Tests
// =============================================================================
