//! Action runs: bulk jobs over a fixed set of lead rows.
//!
//! Row statuses are written only by the external job executor. This module
//! reads them and derives completion on every call; nothing is cached.

use crate::error::{LeadError, Result};
use crate::store::{LeadStore, owned_lead_sheet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Row statuses after which no further change is expected.
pub const TERMINAL_STATUSES: [&str; 2] = ["completed", "failed"];

pub fn is_terminal(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

/// A bulk job applied to rows of one lead sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRun {
    pub id: String,

    /// Owning lead sheet.
    pub lead_file_id: String,

    /// Outreach action this run performs, as named by the trigger.
    #[serde(default)]
    pub action: String,

    /// Rows processed by this run, fixed at creation.
    pub row_ids: Vec<String>,

    /// Row id -> status. A missing entry means the row has not started.
    #[serde(default)]
    pub statuses: BTreeMap<String, String>,

    pub created_at: DateTime<Utc>,
}

impl ActionRun {
    pub fn new(lead_file_id: &str, action: &str, row_ids: Vec<String>) -> Self {
        ActionRun {
            id: Uuid::new_v4().to_string(),
            lead_file_id: lead_file_id.to_string(),
            action: action.to_string(),
            row_ids,
            statuses: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Status of a row, `""` when the executor has not reported one.
    pub fn status_of(&self, row_id: &str) -> &str {
        self.statuses.get(row_id).map(String::as_str).unwrap_or("")
    }

    /// True once every row has a terminal status.
    pub fn is_complete(&self) -> bool {
        self.row_ids.iter().all(|id| is_terminal(self.status_of(id)))
    }

    pub fn status(&self) -> RunStatus {
        let terminal = self
            .row_ids
            .iter()
            .filter(|id| is_terminal(self.status_of(id)))
            .count();
        RunStatus {
            statuses: self.statuses.clone(),
            is_complete: terminal == self.row_ids.len(),
            total: self.row_ids.len(),
            terminal,
        }
    }
}

/// Snapshot returned to a polling client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub statuses: BTreeMap<String, String>,
    pub is_complete: bool,
    pub total: usize,
    pub terminal: usize,
}

/// Current status of a run, visible only to the owner of its lead sheet.
///
/// A run that does not exist under `sheet_id` and a run whose sheet belongs
/// to someone else both yield [`LeadError::NotFound`].
pub fn get_run_status(store: &dyn LeadStore, sheet_id: &str, run_id: &str, user_id: &str) -> Result<RunStatus> {
    let run = store
        .action_run(sheet_id, run_id)?
        .ok_or(LeadError::NotFound)?;
    owned_lead_sheet(store, sheet_id, user_id)?;
    Ok(run.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::LeadRecord;
    use crate::store::{JsonStore, LeadRow, LeadSheet};

    fn run_with(statuses: &[(&str, &str)]) -> ActionRun {
        let mut run = ActionRun::new("sheet", "email", vec!["r1".into(), "r2".into()]);
        for (row, status) in statuses {
            run.statuses.insert(row.to_string(), status.to_string());
        }
        run
    }

    fn seeded_store() -> (tempfile::TempDir, JsonStore, ActionRun) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::init(dir.path()).unwrap();
        let mut sheet = LeadSheet::new("alice", "leads.csv", vec!["Email".into()]);
        sheet.rows = vec![
            LeadRow::new(LeadRecord::default()),
            LeadRow::new(LeadRecord::default()),
        ];
        store.insert_lead_sheet(&sheet).unwrap();
        let run = ActionRun::new(&sheet.id, "email", sheet.rows.iter().map(|r| r.id.clone()).collect());
        store.insert_action_run(&run).unwrap();
        (dir, store, run)
    }

    #[test]
    fn test_completion_requires_every_row() {
        assert!(!run_with(&[("r1", "completed")]).is_complete());
        assert!(run_with(&[("r1", "completed"), ("r2", "failed")]).is_complete());
    }

    #[test]
    fn test_non_terminal_statuses() {
        assert!(!run_with(&[("r1", "completed"), ("r2", "running")]).is_complete());
        assert!(!run_with(&[("r1", "Completed"), ("r2", "failed")]).is_complete());
        assert!(!run_with(&[("r1", ""), ("r2", "failed")]).is_complete());
    }

    #[test]
    fn test_status_counts() {
        let status = run_with(&[("r1", "failed"), ("r2", "queued")]).status();
        assert_eq!(status.total, 2);
        assert_eq!(status.terminal, 1);
        assert!(!status.is_complete);
        assert_eq!(status.statuses.get("r2").map(String::as_str), Some("queued"));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let json = serde_json::to_value(run_with(&[]).status()).unwrap();
        assert_eq!(json["isComplete"], serde_json::json!(false));
        assert!(json.get("statuses").is_some());
    }

    #[test]
    fn test_get_run_status_for_owner() {
        let (_dir, store, run) = seeded_store();
        let before = get_run_status(&store, &run.lead_file_id, &run.id, "alice").unwrap();
        assert!(!before.is_complete);

        for row in &run.row_ids {
            store
                .record_row_status(&run.lead_file_id, &run.id, row, "completed")
                .unwrap();
        }
        let after = get_run_status(&store, &run.lead_file_id, &run.id, "alice").unwrap();
        assert!(after.is_complete);
        assert_eq!(after.terminal, 2);
    }

    #[test]
    fn test_get_run_status_unknown_job() {
        let (_dir, store, run) = seeded_store();
        let err = get_run_status(&store, &run.lead_file_id, "missing", "alice").unwrap_err();
        assert!(matches!(err, LeadError::NotFound));
    }

    #[test]
    fn test_get_run_status_wrong_sheet() {
        let (_dir, store, run) = seeded_store();
        let other = LeadSheet::new("alice", "other.csv", Vec::new());
        store.insert_lead_sheet(&other).unwrap();
        let err = get_run_status(&store, &other.id, &run.id, "alice").unwrap_err();
        assert!(matches!(err, LeadError::NotFound));
    }

    #[test]
    fn test_get_run_status_other_owner() {
        let (_dir, store, run) = seeded_store();
        let err = get_run_status(&store, &run.lead_file_id, &run.id, "mallory").unwrap_err();
        assert!(matches!(err, LeadError::NotFound));
    }
}
