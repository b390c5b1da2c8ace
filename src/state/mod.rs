//! Application state
//!
//! One `AppState` is shared (behind an `Arc`) between the API client and
//! whatever renders it. Cells are read-only from the outside; every write
//! goes through the methods here so the dashboard group stays consistent.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::models::{AiMode, Dashboard, Expense, Insight, Persona};
use crate::reporting::ErrorReport;

pub mod cell;

pub use cell::{Cell, Subscription};

/// How completions of overlapping dashboard fetches are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrdering {
    /// Whichever response finishes last is stored
    #[default]
    LastWriteWins,
    /// Responses to requests issued before the newest applied one are dropped
    LatestIssued,
}

impl FromStr for ResponseOrdering {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "last-write-wins" => Ok(ResponseOrdering::LastWriteWins),
            "latest-issued" => Ok(ResponseOrdering::LatestIssued),
            other => Err(format!(
                "unknown response ordering '{}', expected last-write-wins or latest-issued",
                other
            )),
        }
    }
}

/// Sequence number taken before a dashboard fetch is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

pub struct AppState {
    dashboard: Cell<Option<Dashboard>>,
    expenses: Cell<Vec<Expense>>,
    insights: Cell<Vec<Insight>>,
    ai_mode: Cell<AiMode>,
    loading: Cell<bool>,
    persona: Cell<Option<Persona>>,
    last_error: Cell<Option<ErrorReport>>,

    ordering: ResponseOrdering,
    issued: AtomicU64,
    /// Newest ticket written into the dashboard group; also serializes group writes
    applied: Mutex<u64>,
    in_flight: AtomicUsize,
    /// Orders loading flag transitions; the count itself is read lock-free
    loading_transition: Mutex<()>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_ordering(ResponseOrdering::default())
    }

    pub fn with_ordering(ordering: ResponseOrdering) -> Self {
        Self {
            dashboard: Cell::new(None),
            expenses: Cell::new(Vec::new()),
            insights: Cell::new(Vec::new()),
            ai_mode: Cell::new(AiMode::default()),
            loading: Cell::new(false),
            persona: Cell::new(None),
            last_error: Cell::new(None),
            ordering,
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
            in_flight: AtomicUsize::new(0),
            loading_transition: Mutex::new(()),
        }
    }

    // =============================
    // Read Access
    // =============================

    pub fn dashboard(&self) -> &Cell<Option<Dashboard>> {
        &self.dashboard
    }

    pub fn expenses(&self) -> &Cell<Vec<Expense>> {
        &self.expenses
    }

    pub fn insights(&self) -> &Cell<Vec<Insight>> {
        &self.insights
    }

    pub fn ai_mode(&self) -> &Cell<AiMode> {
        &self.ai_mode
    }

    pub fn loading(&self) -> &Cell<bool> {
        &self.loading
    }

    pub fn persona(&self) -> &Cell<Option<Persona>> {
        &self.persona
    }

    pub fn last_error(&self) -> &Cell<Option<ErrorReport>> {
        &self.last_error
    }

    pub fn ordering(&self) -> ResponseOrdering {
        self.ordering
    }

    // =============================
    // Controlled Mutation
    // =============================

    pub fn issue_ticket(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Store a dashboard together with its expenses and insights.
    ///
    /// All three cells hold the new values before any subscriber runs.
    /// Returns `false` when the ordering policy discarded the response.
    /// Callbacks run while the group lock is held and must not write the
    /// dashboard group themselves.
    pub fn apply_dashboard(&self, ticket: Ticket, dashboard: Dashboard) -> bool {
        let mut applied = lock(&self.applied);

        if self.ordering == ResponseOrdering::LatestIssued && ticket.0 < *applied {
            debug!(
                ticket = ticket.0,
                applied = *applied,
                "Discarding stale dashboard response"
            );
            return false;
        }
        *applied = (*applied).max(ticket.0);

        self.expenses.replace(dashboard.expenses().to_vec());
        self.insights.replace(dashboard.insights().to_vec());
        self.dashboard.replace(Some(dashboard));

        self.dashboard.notify();
        self.expenses.notify();
        self.insights.notify();

        true
    }

    pub fn set_ai_mode(&self, mode: AiMode) {
        self.ai_mode.set(mode);
    }

    pub fn set_persona(&self, persona: Option<Persona>) {
        self.persona.set(persona);
    }

    pub(crate) fn record_error(&self, report: ErrorReport) {
        self.last_error.set(Some(report));
    }

    pub fn clear_error(&self) {
        self.last_error.set(None);
    }

    /// Raise the loading flag until the returned scope is dropped.
    /// Scopes nest: the flag falls only when the last one ends.
    ///
    /// Loading subscribers may read [`AppState::in_flight`] but must not
    /// open or close scopes themselves.
    pub fn begin_loading(&self) -> LoadingScope<'_> {
        let _transition = lock(&self.loading_transition);
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.loading.set(true);
        }
        LoadingScope { state: self }
    }

    /// Number of open loading scopes
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn end_loading(&self) {
        let _transition = lock(&self.loading_transition);
        let remaining = self.in_flight.load(Ordering::SeqCst).saturating_sub(1);
        self.in_flight.store(remaining, Ordering::SeqCst);
        if remaining == 0 {
            self.loading.set(false);
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps the loading flag raised while alive
#[must_use = "the loading flag drops as soon as the scope is dropped"]
pub struct LoadingScope<'a> {
    state: &'a AppState,
}

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        self.state.end_loading();
    }
}
