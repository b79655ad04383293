//! The on-disk `schedules/{managerId}.json` store: `{schedules: Schedule[]}`,
//! written via write-tmp-then-rename so a reader never observes a partial
//! payload. `CronScheduler` is the store's sole writer.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hive_core::ids::AgentId;
use hive_core::model::Schedule;

use crate::errors::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    schedules: Vec<Schedule>,
}

/// Reads and writes one manager's `schedules/{managerId}.json` file.
pub struct ScheduleStore {
    dir: PathBuf,
}

impl ScheduleStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("schedules"),
        }
    }

    fn path_for(&self, manager_id: &AgentId) -> PathBuf {
        self.dir.join(format!("{manager_id}.json"))
    }

    /// Load `manager_id`'s persisted schedules, or an empty list if no file
    /// exists yet.
    pub fn load(&self, manager_id: &AgentId) -> Result<Vec<Schedule>> {
        let path = self.path_for(manager_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        let file: StoreFile = serde_json::from_str(&raw)?;
        Ok(file.schedules)
    }

    /// Load every manager's schedules under the schedules directory, keyed
    /// by the manager id parsed from the file name. Entries whose file name
    /// doesn't parse as an `AgentId` are skipped.
    pub fn load_all(&self) -> Result<Vec<(AgentId, Vec<Schedule>)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(manager_id) = AgentId::parse(stem) else {
                continue;
            };
            let schedules = self.load(&manager_id)?;
            out.push((manager_id, schedules));
        }
        Ok(out)
    }

    /// Persist `manager_id`'s schedules by writing to a sibling temp file
    /// then renaming it over the real path.
    pub fn save(&self, manager_id: &AgentId, schedules: &[Schedule]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(manager_id);
        let file = StoreFile {
            schedules: schedules.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}
