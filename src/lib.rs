//! Finance Tutor Client
//!
//! Data-fetching and state-synchronization layer for the finance tutor:
//! - Uploads CSV statements and loads sample data from the tutor backend
//! - Keeps dashboard, expenses and insights in observable cells
//! - Requests AI explanations of insights and spending personas
//! - Reports background failures through a pluggable reporter
//!
//! FLOW:
//! ACTION → REQUEST → RESPONSE → STATE → SUBSCRIBERS

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod reporting;
pub mod state;

pub use error::Result;

// Re-export common types
pub use client::{CsvFile, TutorClient};
pub use config::ClientConfig;
pub use error::TutorError;
pub use models::*;
pub use reporting::{ErrorReport, ErrorReporter, LogReporter, RecordingReporter};
pub use state::{AppState, Cell, LoadingScope, ResponseOrdering, Subscription, Ticket};
