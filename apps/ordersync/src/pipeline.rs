//! Run orchestration: extract every market, back up, reconcile, report, notify.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use ordersync_connector::{Enricher, Extractor, LocationLookup, OrderApiClient, TokenCache};
use ordersync_core::{rowset, Record};
use ordersync_reconcile::{
    DestinationTable, PgDestinationTable, ReconcileError, ReconcileReport, ReconcileResult,
    ReconciliationEngine,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::backup::write_backup;
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::notify::{Attachment, Notifier, RunStatus, RunSummary};
use crate::report::{write_report, ReportArtifact};

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub total_rows: usize,
    pub reconcile: Option<ReconcileReport>,
    pub reconcile_error: Option<String>,
    pub report: Option<ReportArtifact>,
}

impl RunOutcome {
    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self, fail_on_partial: bool) -> u8 {
        if fail_on_partial && self.status == RunStatus::PartialFailure {
            2
        } else {
            0
        }
    }
}

/// One scheduled run.
pub struct Pipeline {
    config: AppConfig,
    notifier: Box<dyn Notifier>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
}

impl Pipeline {
    /// Creates a pipeline run.
    #[must_use]
    pub fn new(config: AppConfig, notifier: Box<dyn Notifier>) -> Self {
        Self {
            config,
            notifier,
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    /// Returns the run configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Executes the full run against the configured `PostgreSQL` table.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that abort the run: invalid
    /// connector configuration or a credential failure.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn run(&self) -> AppResult<RunOutcome> {
        let rows = self.extract().await?;
        if rows.is_empty() {
            info!("No data extracted, nothing to reconcile");
            return Ok(RunOutcome {
                run_id: self.run_id,
                status: RunStatus::NoData,
                total_rows: 0,
                reconcile: None,
                reconcile_error: None,
                report: None,
            });
        }

        Ok(self.complete(rows, || self.connect_table()).await)
    }

    /// Extracts and concatenates the rows of every market, in order.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid connector configuration or a credential
    /// failure.
    pub async fn extract(&self) -> AppResult<Vec<Record>> {
        let lookup = LocationLookup::load(&self.config.city_mapping_file).await;
        let tokens = TokenCache::new(&self.config.api, self.config.api_credentials())?;
        let client = OrderApiClient::new(self.config.api.clone(), Arc::new(tokens))?;
        let extractor = Extractor::new(&client, Enricher::new(&client, &lookup));

        let mut rows = Vec::new();
        for market in &self.config.markets {
            info!(market = %market, "Processing market");
            rows.extend(extractor.extract_market(market).await?);
        }
        info!(rows = rows.len(), markets = self.config.markets.len(), "Extraction complete");
        Ok(rows)
    }

    /// Opens the destination table.
    pub async fn connect_table(&self) -> ReconcileResult<PgDestinationTable> {
        let db = &self.config.database;
        let options = db
            .connect_options()
            .map_err(|e| ReconcileError::Config(e.to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .acquire_timeout(db.connect_timeout)
            .connect_with(options)
            .await?;
        Ok(PgDestinationTable::new(pool, db.schema.clone(), db.table.clone())
            .with_insert_chunk_rows(self.config.reconcile.insert_chunk_rows))
    }

    /// Runs every stage after extraction.
    ///
    /// The backup is written before `connect` opens the destination table.
    /// Backup, reconciliation, report and notification failures are logged
    /// and never abort the remaining stages.
    pub async fn complete<T, F, Fut>(&self, mut rows: Vec<Record>, connect: F) -> RunOutcome
    where
        T: DestinationTable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ReconcileResult<T>>,
    {
        let dropped = rowset::drop_all_null_columns(&mut rows);
        if !dropped.is_empty() {
            info!(columns = ?dropped, "Dropped all-null columns");
        }

        if let Err(e) = write_backup(&rows, &self.config.base_dir, Local::now().date_naive()) {
            error!(error = %e, "Backup failed");
        }

        let table = connect().await;
        let (reconcile, reconcile_error) = match self.reconcile(table, &rows).await {
            Ok(report) => (Some(report), None),
            Err(e) => {
                error!(error = %e, "CRITICAL: reconciliation could not run");
                (None, Some(e.to_string()))
            }
        };

        let status = match &reconcile {
            Some(report) if !report.has_failures() => RunStatus::Success,
            _ => RunStatus::PartialFailure,
        };

        let report_at = Local::now().naive_local();
        let report = match write_report(&rows, &self.config.base_dir, report_at) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                error!(error = %e, "Report failed");
                None
            }
        };

        let outcome = RunOutcome {
            run_id: self.run_id,
            status,
            total_rows: rows.len(),
            reconcile,
            reconcile_error,
            report,
        };

        if let Err(e) = self.notifier.notify(&self.summary(&outcome)).await {
            error!(error = %e, "Notification failed");
        }

        info!(
            status = ?outcome.status,
            rows = outcome.total_rows,
            elapsed_secs = (Utc::now() - self.started_at).num_seconds(),
            "Run finished"
        );
        outcome
    }

    async fn reconcile<T: DestinationTable>(
        &self,
        table: ReconcileResult<T>,
        rows: &[Record],
    ) -> ReconcileResult<ReconcileReport> {
        let engine = ReconciliationEngine::with_config(table?, self.config.reconcile.clone())?;
        engine.reconcile(rows).await
    }

    fn summary(&self, outcome: &RunOutcome) -> RunSummary {
        let attachment = outcome.report.as_ref().and_then(|artifact| {
            match std::fs::read(&artifact.path) {
                Ok(bytes) => Some(Attachment::zip(artifact.file_name.clone(), &bytes)),
                Err(e) => {
                    warn!(path = %artifact.path.display(), error = %e, "Report not attachable");
                    None
                }
            }
        });

        let finished_at = Utc::now();
        RunSummary {
            run_id: self.run_id,
            status: outcome.status,
            subject: RunSummary::subject_for(outcome.status, finished_at),
            recipients: self.config.notify.recipients.clone(),
            markets: self.config.markets.clone(),
            total_rows: outcome.total_rows,
            reconcile: outcome.reconcile.clone(),
            reconcile_error: outcome.reconcile_error.clone(),
            started_at: self.started_at,
            finished_at,
            attachment,
        }
    }
}
