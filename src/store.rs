use crate::error::{LeadError, Result};
use crate::mapper::LeadRecord;
use crate::runs::ActionRun;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

// Constants
const LEAD_SHEETS_FILE: &str = "lead_sheets.json";
const ACTION_RUNS_FILE: &str = "action_runs.json";

/// A user-owned import of lead records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSheet {
    pub id: String,

    /// Owner; the ownership boundary for everything under this sheet
    pub user_id: String,

    pub name: String,

    /// Header row of the uploaded file
    pub headers: Vec<String>,

    #[serde(default)]
    pub rows: Vec<LeadRow>,

    pub created_at: DateTime<Utc>,
}

impl LeadSheet {
    pub fn new(user_id: &str, name: &str, headers: Vec<String>) -> Self {
        LeadSheet {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            headers,
            rows: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A persisted lead record with its row identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRow {
    pub id: String,
    pub record: LeadRecord,
}

impl LeadRow {
    pub fn new(record: LeadRecord) -> Self {
        LeadRow {
            id: Uuid::new_v4().to_string(),
            record,
        }
    }
}

/// Row-level access to lead sheets and action runs
///
/// Lookups are point reads by primary id, scoped by parent where the entity
/// has one. Implementations must not cache: every call reflects the current
/// persisted state.
pub trait LeadStore: Send + Sync {
    fn lead_sheet(&self, id: &str) -> Result<Option<LeadSheet>>;

    fn insert_lead_sheet(&self, sheet: &LeadSheet) -> Result<()>;

    /// Run `run_id`, only if it belongs to sheet `sheet_id`
    fn action_run(&self, sheet_id: &str, run_id: &str) -> Result<Option<ActionRun>>;

    fn insert_action_run(&self, run: &ActionRun) -> Result<()>;

    /// Executor-side status update for one row of a run
    fn record_row_status(&self, sheet_id: &str, run_id: &str, row_id: &str, status: &str) -> Result<()>;
}

/// Fetch a lead sheet on behalf of `user_id`
///
/// Missing sheets and sheets owned by someone else are both `NotFound`.
pub fn owned_lead_sheet(store: &dyn LeadStore, sheet_id: &str, user_id: &str) -> Result<LeadSheet> {
    let sheet = store.lead_sheet(sheet_id)?.ok_or(LeadError::NotFound)?;
    if sheet.user_id != user_id {
        log::debug!("user {user_id} denied access to lead sheet {sheet_id}");
        return Err(LeadError::NotFound);
    }
    Ok(sheet)
}

/// File-backed store keeping one JSON object per table in a data directory
pub struct JsonStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Open a store, creating the directory and empty tables if needed
    ///
    /// # Arguments
    /// * `dir` - Data directory
    ///
    /// # Returns
    /// * `Result<JsonStore>` - The opened store or an `Internal` error
    pub fn init(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            create_dir_all(&dir)?;
        }

        for table in [LEAD_SHEETS_FILE, ACTION_RUNS_FILE] {
            let path = dir.join(table);
            if !path.exists() {
                let mut file = File::create(&path)?;
                file.write_all(b"{}")?;
            }
        }

        Ok(JsonStore {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| LeadError::Internal("store lock poisoned".into()))
    }

    fn read_table<T: DeserializeOwned>(&self, table: &str) -> Result<HashMap<String, T>> {
        let contents = fs::read_to_string(self.dir.join(table))?;
        Ok(serde_json::from_str(&contents)?)
    }

    // Written to a sibling file and renamed so readers never see a partial table
    fn write_table<T: Serialize>(&self, table: &str, rows: &HashMap<String, T>) -> Result<()> {
        let json = serde_json::to_string_pretty(rows)?;
        let tmp = self.dir.join(format!("{table}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.dir.join(table))?;
        Ok(())
    }
}

impl LeadStore for JsonStore {
    fn lead_sheet(&self, id: &str) -> Result<Option<LeadSheet>> {
        let mut sheets: HashMap<String, LeadSheet> = self.read_table(LEAD_SHEETS_FILE)?;
        Ok(sheets.remove(id))
    }

    fn insert_lead_sheet(&self, sheet: &LeadSheet) -> Result<()> {
        let _guard = self.lock()?;
        let mut sheets: HashMap<String, LeadSheet> = self.read_table(LEAD_SHEETS_FILE)?;
        sheets.insert(sheet.id.clone(), sheet.clone());
        self.write_table(LEAD_SHEETS_FILE, &sheets)
    }

    fn action_run(&self, sheet_id: &str, run_id: &str) -> Result<Option<ActionRun>> {
        let mut runs: HashMap<String, ActionRun> = self.read_table(ACTION_RUNS_FILE)?;
        Ok(runs.remove(run_id).filter(|run| run.lead_file_id == sheet_id))
    }

    fn insert_action_run(&self, run: &ActionRun) -> Result<()> {
        let sheet = self.lead_sheet(&run.lead_file_id)?.ok_or(LeadError::NotFound)?;
        let known: HashSet<&str> = sheet.rows.iter().map(|row| row.id.as_str()).collect();
        if let Some(unknown) = run.row_ids.iter().find(|id| !known.contains(id.as_str())) {
            return Err(LeadError::InvalidInput(format!(
                "row {unknown} does not belong to lead sheet {}",
                sheet.id
            )));
        }
        if let Some(stray) = run.statuses.keys().find(|id| !run.row_ids.contains(id)) {
            return Err(LeadError::InvalidInput(format!("status for unknown row {stray}")));
        }

        let _guard = self.lock()?;
        let mut runs: HashMap<String, ActionRun> = self.read_table(ACTION_RUNS_FILE)?;
        runs.insert(run.id.clone(), run.clone());
        self.write_table(ACTION_RUNS_FILE, &runs)
    }

    fn record_row_status(&self, sheet_id: &str, run_id: &str, row_id: &str, status: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut runs: HashMap<String, ActionRun> = self.read_table(ACTION_RUNS_FILE)?;
        let run = runs
            .get_mut(run_id)
            .filter(|run| run.lead_file_id == sheet_id)
            .ok_or(LeadError::NotFound)?;
        if !run.row_ids.iter().any(|id| id == row_id) {
            return Err(LeadError::InvalidInput(format!(
                "row {row_id} is not part of run {run_id}"
            )));
        }
        run.statuses.insert(row_id.to_string(), status.to_string());
        self.write_table(ACTION_RUNS_FILE, &runs)
    }
}
