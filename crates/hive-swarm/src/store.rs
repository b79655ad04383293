//! The on-disk `agents.json` store: `{agents: AgentDescriptor[]}`,
//! pretty-printed, written via write-tmp-then-rename so a reader never
//! observes a partial payload.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hive_core::model::AgentDescriptor;

use crate::errors::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    agents: Vec<AgentDescriptor>,
}

/// Reads and writes `agents.json`. `SwarmManager` is the store's sole
/// writer; this type only knows how to get bytes on and off disk.
pub struct AgentStore {
    path: PathBuf,
}

impl AgentStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("agents.json"),
        }
    }

    /// Load the persisted descriptor list, or an empty list if the file
    /// doesn't exist yet (first boot).
    pub fn load(&self) -> Result<Vec<AgentDescriptor>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let file: StoreFile = serde_json::from_str(&raw)?;
        Ok(file.agents)
    }

    /// Persist `agents` by writing to a sibling temp file then renaming it
    /// over the real path, so concurrent readers never see a truncated
    /// write.
    pub fn save(&self, agents: &[AgentDescriptor]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = StoreFile {
            agents: agents.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::ids::AgentId;
    use hive_core::model::{AgentRole, AgentStatus, ModelSelector};

    fn descriptor(id: &str) -> AgentDescriptor {
        let agent_id = AgentId::parse(id).unwrap();
        let now = chrono::Utc::now();
        AgentDescriptor {
            agent_id: agent_id.clone(),
            display_name: id.to_owned(),
            role: AgentRole::Manager,
            manager_id: agent_id,
            archetype_id: Some("manager".into()),
            status: AgentStatus::Idle,
            created_at: now,
            updated_at: now,
            cwd: "/tmp".into(),
            model: ModelSelector::default(),
            session_file: format!("sessions/{id}.jsonl"),
            context_usage: None,
        }
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentStore::new(dir.path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentStore::new(dir.path());
        let agents = vec![descriptor("root")];
        store.save(&agents).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, agents);
    }

    #[test]
    fn save_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentStore::new(dir.path());
        store.save(&[descriptor("root")]).unwrap();
        assert!(!dir.path().join("agents.json.tmp").exists());
        assert!(dir.path().join("agents.json").exists());
    }

    #[test]
    fn save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentStore::new(dir.path());
        store.save(&[descriptor("root")]).unwrap();
        store.save(&[descriptor("root"), descriptor("worker-1")]).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
    }
}
