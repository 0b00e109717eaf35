//! ordersync - scheduled order extraction and reconciliation run
//!
//! A run extracts orders for every configured market, expands them into
//! line-item rows, writes a columnar backup, reconciles the rows into the
//! destination fact table, and delivers a compressed report with a
//! completion notification.

pub mod backup;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod report;

pub use config::{AppConfig, ConfigError, LogFormat};
pub use error::{AppError, AppResult};
pub use notify::{LogNotifier, Notifier, RunStatus, RunSummary, WebhookNotifier};
pub use pipeline::{Pipeline, RunOutcome};
