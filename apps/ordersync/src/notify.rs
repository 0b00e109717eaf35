//! Completion notifications.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use ordersync_reconcile::ReconcileReport;

use crate::error::{AppError, AppResult};

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage completed.
    Success,
    /// Reconciliation failed for some batches or could not start.
    PartialFailure,
    /// No rows were extracted.
    NoData,
}

impl RunStatus {
    /// Subject line prefix.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "Data Pipeline Success",
            Self::PartialFailure => "Data Pipeline Partial Failure",
            Self::NoData => "Data Pipeline No Data",
        }
    }
}

/// A file attached to a notification.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub content_base64: String,
}

impl Attachment {
    /// Creates a ZIP attachment.
    #[must_use]
    pub fn zip(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "application/zip".to_string(),
            content_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Summary sent when a run completes.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub subject: String,
    pub recipients: Vec<String>,
    pub markets: Vec<String>,
    pub total_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile: Option<ReconcileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl RunSummary {
    /// Subject line in the form `"<status> - YYYY-MM-DD"`.
    #[must_use]
    pub fn subject_for(status: RunStatus, date: DateTime<Utc>) -> String {
        format!("{} - {}", status.label(), date.format("%Y-%m-%d"))
    }
}

/// Delivers run summaries.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends the summary.
    async fn notify(&self, summary: &RunSummary) -> AppResult<()>;
}

/// Logs the summary instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, summary: &RunSummary) -> AppResult<()> {
        info!(
            run_id = %summary.run_id,
            subject = %summary.subject,
            total_rows = summary.total_rows,
            inserted = summary.reconcile.as_ref().map_or(0, |r| r.inserted),
            updated = summary.reconcile.as_ref().map_or(0, |r| r.updated),
            attachment = summary.attachment.as_ref().map(|a| a.file_name.as_str()),
            "Run summary"
        );
        Ok(())
    }
}

/// Posts the summary as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Creates a webhook notifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Notify(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, summary), fields(run_id = %summary.run_id))]
    async fn notify(&self, summary: &RunSummary) -> AppResult<()> {
        let response = self
            .http_client
            .post(&self.url)
            .json(summary)
            .send()
            .await
            .map_err(|e| AppError::Notify(format!("Webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(4096)
                .collect::<String>();
            return Err(AppError::Notify(format!(
                "Webhook returned HTTP {status}: {body}"
            )));
        }

        info!(status = status.as_u16(), "Notification delivered");
        Ok(())
    }
}
