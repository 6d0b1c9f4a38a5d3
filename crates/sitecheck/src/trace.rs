//! Action trace for one test attempt.
//!
//! Every page action and assertion is recorded with its timing and outcome.
//! The runner writes the trace as `trace.json` into the attempt's artifact
//! directory when trace capture is on.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use uuid::Uuid;

use crate::result::CheckResult;

/// Category of a traced action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    /// Page navigation
    Navigation,
    /// User interaction (click)
    Interaction,
    /// Retrying assertion
    Assertion,
    /// Screenshot capture
    Screenshot,
    /// Viewport or page lifecycle
    Page,
}

/// Outcome of a traced action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Completed successfully
    Ok,
    /// Completed with an error
    Error,
}

/// One recorded action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedAction {
    /// Unique action ID
    pub id: String,
    /// Action name (e.g. `goto`, `click`, `toHaveTitle`)
    pub name: String,
    /// Category
    pub category: ActionCategory,
    /// Selector, URL or snapshot name the action targeted
    pub target: Option<String>,
    /// Start, ms since the trace began
    pub start_ms: u64,
    /// Duration in ms
    pub duration_ms: u64,
    /// Outcome
    pub status: ActionStatus,
    /// Error message when the action failed
    pub error: Option<String>,
}

/// Serialized form of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceData {
    /// Page the trace belongs to
    pub page_id: String,
    /// Recorded actions, in completion order
    pub actions: Vec<TracedAction>,
}

/// Thread-safe action recorder
#[derive(Debug)]
pub struct TraceRecorder {
    page_id: String,
    enabled: bool,
    started: Instant,
    actions: Mutex<Vec<TracedAction>>,
}

impl TraceRecorder {
    /// Create a recorder. A disabled recorder drops every action.
    #[must_use]
    pub fn new(page_id: impl Into<String>, enabled: bool) -> Self {
        Self {
            page_id: page_id.into(),
            enabled,
            started: Instant::now(),
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Check if recording is on
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an action that started at `started` and has just finished
    pub fn record<E: std::fmt::Display>(
        &self,
        name: &str,
        category: ActionCategory,
        target: Option<String>,
        started: Instant,
        outcome: Result<(), &E>,
    ) {
        if !self.enabled {
            return;
        }
        let action = TracedAction {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category,
            target,
            start_ms: started.saturating_duration_since(self.started).as_millis() as u64,
            duration_ms: started.elapsed().as_millis() as u64,
            status: if outcome.is_ok() {
                ActionStatus::Ok
            } else {
                ActionStatus::Error
            },
            error: outcome.err().map(ToString::to_string),
        };
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }

    /// Snapshot of the recorded actions
    #[must_use]
    pub fn actions(&self) -> Vec<TracedAction> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded actions
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializable copy of the trace
    #[must_use]
    pub fn data(&self) -> TraceData {
        TraceData {
            page_id: self.page_id.clone(),
            actions: self.actions(),
        }
    }

    /// Write the trace as pretty JSON
    pub fn save(&self, path: &Path) -> CheckResult<()> {
        let json = serde_json::to_string_pretty(&self.data())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::result::CheckError;

    #[test]
    fn test_records_success_and_failure() {
        let recorder = TraceRecorder::new("page-1", true);
        recorder.record::<CheckError>(
            "goto",
            ActionCategory::Navigation,
            Some("http://localhost:3000/".into()),
            Instant::now(),
            Ok(()),
        );
        let err = CheckError::assertion("title mismatch");
        recorder.record(
            "toHaveTitle",
            ActionCategory::Assertion,
            None,
            Instant::now(),
            Err(&err),
        );

        let actions = recorder.actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].status, ActionStatus::Ok);
        assert_eq!(actions[1].status, ActionStatus::Error);
        assert!(actions[1].error.as_deref().unwrap().contains("title mismatch"));
    }

    #[test]
    fn test_disabled_recorder_drops_actions() {
        let recorder = TraceRecorder::new("page-1", false);
        recorder.record::<CheckError>("click", ActionCategory::Interaction, None, Instant::now(), Ok(()));
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_save_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        let recorder = TraceRecorder::new("page-1", true);
        recorder.record::<CheckError>("click", ActionCategory::Interaction, None, Instant::now(), Ok(()));
        recorder.save(&path).unwrap();

        let data: TraceData = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(data.page_id, "page-1");
        assert_eq!(data.actions[0].name, "click");
    }
}
