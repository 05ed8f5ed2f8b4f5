//! Per-run state shared by every query of one run.
//!
//! A [`RunContext`] is created when a batch (or a single lookup) starts and
//! passed explicitly into each resolve call. Once a source is marked
//! unusable it stays that way until the context is dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Whether a source may still be queried during this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceState {
    Usable,
    Unusable { reason: String },
}

impl SourceState {
    pub fn is_usable(&self) -> bool {
        matches!(self, SourceState::Usable)
    }
}

#[derive(Debug, Default)]
struct RunState {
    states: HashMap<String, SourceState>,
    /// Consecutive rate-limited answers per source
    strikes: HashMap<String, u32>,
    requests: HashMap<String, u64>,
}

#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    inner: Mutex<RunState>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4().to_string())
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            inner: Mutex::new(RunState::default()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // Updates are single map writes, so a poisoned guard is still valid.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self, source_id: &str) -> SourceState {
        self.lock()
            .states
            .get(source_id)
            .cloned()
            .unwrap_or(SourceState::Usable)
    }

    pub fn is_usable(&self, source_id: &str) -> bool {
        self.state(source_id).is_usable()
    }

    /// Mark a source unusable for the rest of the run.
    ///
    /// Returns `false` if it already was; the first reason is kept.
    pub fn mark_unusable(&self, source_id: &str, reason: impl Into<String>) -> bool {
        let mut inner = self.lock();
        match inner.states.get(source_id) {
            Some(SourceState::Unusable { .. }) => false,
            _ => {
                inner.states.insert(
                    source_id.to_string(),
                    SourceState::Unusable {
                        reason: reason.into(),
                    },
                );
                true
            }
        }
    }

    /// Count one more rate-limited answer and return the running total.
    pub fn record_rate_limit(&self, source_id: &str) -> u32 {
        let mut inner = self.lock();
        let strikes = inner.strikes.entry(source_id.to_string()).or_insert(0);
        *strikes += 1;
        *strikes
    }

    /// A successful answer ends a rate-limit streak.
    pub fn clear_strikes(&self, source_id: &str) {
        self.lock().strikes.remove(source_id);
    }

    pub fn strikes(&self, source_id: &str) -> u32 {
        self.lock().strikes.get(source_id).copied().unwrap_or(0)
    }

    pub fn record_request(&self, source_id: &str) {
        *self
            .lock()
            .requests
            .entry(source_id.to_string())
            .or_insert(0) += 1;
    }

    pub fn request_count(&self, source_id: &str) -> u64 {
        self.lock().requests.get(source_id).copied().unwrap_or(0)
    }

    /// Sources switched off so far, with the reason, sorted by id.
    pub fn disabled_sources(&self) -> Vec<(String, String)> {
        let mut disabled: Vec<(String, String)> = self
            .lock()
            .states
            .iter()
            .filter_map(|(id, state)| match state {
                SourceState::Unusable { reason } => Some((id.clone(), reason.clone())),
                SourceState::Usable => None,
            })
            .collect();
        disabled.sort();
        disabled
    }
}
