//! Tutor backend client
//!
//! Maps each backend endpoint to one async operation. Dashboard-shaped
//! responses are written into the shared `AppState`; explanations and
//! personas are handed back to the caller.
//! Uses a long-lived reqwest::Client for connection pooling.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::error::TutorError;
use crate::models::{AiMode, Dashboard, ExplainAction, ExplainRequest, Insight, Operation, Persona};
use crate::reporting::{ErrorReport, ErrorReporter, LogReporter};
use crate::state::AppState;
use crate::Result;

/// A CSV statement ready to upload
#[derive(Debug, Clone)]
pub struct CsvFile {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl CsvFile {
    pub fn new(file_name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.csv")
            .to_string();

        Ok(Self {
            file_name,
            contents,
        })
    }

    fn into_form(self) -> Result<Form> {
        let part = Part::bytes(self.contents)
            .file_name(self.file_name)
            .mime_str("text/csv")
            .map_err(|e| {
                TutorError::for_operation(Operation::Upload, format!("invalid file part: {}", e))
            })?;

        Ok(Form::new().part("file", part))
    }
}

/// Reusable tutor client (connection-pooled)
#[derive(Clone)]
pub struct TutorClient {
    client: Client,
    config: ClientConfig,
    state: Arc<AppState>,
    reporter: Arc<dyn ErrorReporter>,
}

impl TutorClient {
    /// Client with a fresh `AppState` using the configured ordering
    pub fn new(config: ClientConfig) -> Result<Self> {
        let state = Arc::new(AppState::with_ordering(config.ordering));
        Self::with_state(config, state)
    }

    pub fn with_state(config: ClientConfig, state: Arc<AppState>) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            config,
            state,
            reporter: Arc::new(LogReporter),
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =============================
    // Dashboard Operations
    // =============================

    /// Upload a CSV statement. Failures are reported, not returned.
    pub async fn upload_csv(&self, file: CsvFile) {
        self.load_dashboard(Operation::Upload, || {
            let form = file.into_form()?;
            Ok(self.client.post(self.config.endpoint("/upload")).multipart(form))
        })
        .await;
    }

    /// Load the backend's demo data set. Failures are reported, not returned.
    pub async fn get_sample_data(&self) {
        self.load_dashboard(Operation::SampleData, || {
            Ok(self.client.get(self.config.endpoint("/sample-data")))
        })
        .await;
    }

    /// Re-read the dashboard for the data already on the backend.
    /// Failures are reported, not returned.
    pub async fn refresh_dashboard(&self) {
        self.load_dashboard(Operation::Dashboard, || {
            Ok(self.client.get(self.config.endpoint("/dashboard")))
        })
        .await;
    }

    // =============================
    // Caller-handled Operations
    // =============================

    /// Ask the tutor about an insight. `style` defaults to polite and
    /// `action` to explain. Nothing is written to the store.
    pub async fn explain_insight(
        &self,
        insight: &Insight,
        follow_up: Option<&str>,
        style: Option<AiMode>,
        action: Option<ExplainAction>,
    ) -> Result<Value> {
        let body = ExplainRequest {
            insight,
            follow_up,
            style: style.unwrap_or_default(),
            action: action.unwrap_or_default(),
        };

        info!(
            style = %body.style,
            action = %body.action,
            follow_up = body.follow_up.is_some(),
            "Requesting insight explanation"
        );

        let request = self
            .client
            .post(self.config.endpoint("/explain-insight"))
            .json(&body);
        self.send_json(Operation::Explain, request).await
    }

    /// `explain_insight` in the tone currently selected in the ai-mode cell
    pub async fn explain_in_current_mode(
        &self,
        insight: &Insight,
        follow_up: Option<&str>,
    ) -> Result<Value> {
        let style = self.state.ai_mode().get();
        self.explain_insight(insight, follow_up, Some(style), None).await
    }

    /// Generate a spending persona. The caller decides whether to store it.
    pub async fn generate_persona(&self) -> Result<Persona> {
        info!("Requesting persona");
        let request = self.client.post(self.config.endpoint("/generate-persona"));
        self.send_json(Operation::Persona, request).await
    }

    pub async fn health(&self) -> Result<Value> {
        let request = self.client.get(self.config.endpoint("/health"));
        self.send_json(Operation::Health, request).await
    }

    // =============================
    // Internals
    // =============================

    async fn load_dashboard<F>(&self, operation: Operation, build: F)
    where
        F: FnOnce() -> Result<RequestBuilder>,
    {
        let _loading = self.state.begin_loading();
        let ticket = self.state.issue_ticket();

        info!(%operation, ticket = ticket.sequence(), "Fetching dashboard");

        let outcome = match build() {
            Ok(request) => self.fetch_dashboard(operation, request).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(dashboard) => {
                let expenses = dashboard.expenses().len();
                let insights = dashboard.insights().len();

                if self.state.apply_dashboard(ticket, dashboard) {
                    info!(%operation, expenses, insights, "Dashboard updated");
                } else {
                    debug!(%operation, ticket = ticket.sequence(), "Dashboard response superseded");
                }
            }
            Err(e) => self.report_failure(operation, &e).await,
        }
    }

    async fn fetch_dashboard(&self, operation: Operation, request: RequestBuilder) -> Result<Dashboard> {
        let body = self.send_json(operation, request).await?;

        Dashboard::from_value(body).map_err(|e| TutorError::for_operation(operation, e.to_string()))
    }

    async fn send_json(&self, operation: Operation, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|e| {
            debug!(%operation, "Request failed: {}", e);
            TutorError::for_operation(operation, format!("request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            debug!(%operation, %status, "Backend error response: {}", error_text);
            return Err(TutorError::for_operation(
                operation,
                format!("HTTP {}: {}", status, error_text.trim()),
            ));
        }

        response.json::<Value>().await.map_err(|e| {
            TutorError::for_operation(operation, format!("invalid JSON body: {}", e))
        })
    }

    async fn report_failure(&self, operation: Operation, err: &TutorError) {
        error!(%operation, "{}", err);

        let report = ErrorReport::new(operation, err.to_string());
        self.state.record_error(report.clone());
        self.reporter.report(&report).await;
    }
}
