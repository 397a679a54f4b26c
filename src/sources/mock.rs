//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::models::CandidateRecord;
use crate::sources::{MetadataSource, SourceError};

#[derive(Debug, Default)]
struct MockState {
    /// Records returned for unscripted searches and searched for DOI fetches
    records: Vec<CandidateRecord>,
    /// Exact search text -> scripted result
    scripted: HashMap<String, Result<Vec<CandidateRecord>, SourceError>>,
    /// One-shot failures consumed before anything else
    search_failures: VecDeque<SourceError>,
    doi_failures: VecDeque<SourceError>,
}

/// A mock source for testing that returns predefined responses.
///
/// Counts calls and tracks the highest number of calls in flight at once.
#[derive(Debug, Default)]
pub struct MockSource {
    state: Mutex<MockState>,
    latency: Option<Duration>,
    search_calls: AtomicUsize,
    doi_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add a record to the pool used by DOI fetches and unscripted searches.
    pub fn add_record(&self, record: CandidateRecord) {
        self.state().records.push(record);
    }

    /// Return `records` for searches with exactly this text.
    pub fn set_search_results(&self, text: &str, records: Vec<CandidateRecord>) {
        self.state().scripted.insert(text.to_string(), Ok(records));
    }

    /// Fail every search with exactly this text.
    pub fn fail_search(&self, text: &str, error: SourceError) {
        self.state().scripted.insert(text.to_string(), Err(error));
    }

    /// Fail the next search, whatever its text.
    pub fn push_search_failure(&self, error: SourceError) {
        self.state().search_failures.push_back(error);
    }

    /// Fail the next DOI fetch.
    pub fn push_doi_failure(&self, error: SourceError) {
        self.state().doi_failures.push_back(error);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn doi_calls(&self) -> usize {
        self.doi_calls.load(Ordering::SeqCst)
    }

    /// Most calls observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        guard
    }
}

/// Decrements the in-flight counter on drop, including on cancellation
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataSource for MockSource {
    fn name(&self) -> &str {
        "Mock Source"
    }

    async fn search(&self, text: &str, rows: usize) -> Result<Vec<CandidateRecord>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter().await;

        let mut state = self.state();
        if let Some(error) = state.search_failures.pop_front() {
            return Err(error);
        }
        let mut records = match state.scripted.get(text) {
            Some(scripted) => scripted.clone()?,
            None => state.records.clone(),
        };
        records.truncate(rows);
        Ok(records)
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<CandidateRecord>, SourceError> {
        self.doi_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter().await;

        let mut state = self.state();
        if let Some(error) = state.doi_failures.pop_front() {
            return Err(error);
        }
        Ok(state
            .records
            .iter()
            .find(|r| r.doi.eq_ignore_ascii_case(doi))
            .cloned())
    }
}
