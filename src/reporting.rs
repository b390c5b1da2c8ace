//! Error reporting
//!
//! Failures of fire-and-forget operations (upload, sample data, dashboard
//! refresh) never reach the caller. They are handed to an `ErrorReporter`
//! and kept in the `last_error` cell instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::models::Operation;

/// A reported failure
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorReport {
    pub report_id: Uuid,
    pub operation: Operation,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            operation,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Sink for user-facing failure notifications
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, report: &ErrorReport);
}

/// Default reporter: emits a warning through `tracing`
pub struct LogReporter;

#[async_trait]
impl ErrorReporter for LogReporter {
    async fn report(&self, report: &ErrorReport) {
        warn!(
            report_id = %report.report_id,
            operation = %report.operation,
            "{}",
            report.message
        );
    }
}

/// Keeps every report in memory, oldest first
#[derive(Clone, Default)]
pub struct RecordingReporter {
    reports: Arc<RwLock<Vec<ErrorReport>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reports(&self) -> Vec<ErrorReport> {
        self.reports.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, report: &ErrorReport) {
        self.reports.write().await.push(report.clone());
    }
}
