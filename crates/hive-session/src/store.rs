//! Append-only per-agent session log: `sessions/{agentId}.jsonl`.
//!
//! Writes are line-flushed (one `write` + `flush` per record) so a crash
//! mid-append loses at most the last line, never corrupts prior ones.
//! Reads tolerate a truncated trailing line, skipping it rather than
//! failing the whole read — the same "don't let one bad tail ruin the
//! read" posture as `hive-settings::loader`'s whole-file parse, applied
//! line-by-line instead of to one JSON document.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::errors::Result;
use crate::record::SessionRecord;

/// One agent's append-only session log.
pub struct SessionStore {
    path: PathBuf,
    file: File,
}

impl SessionStore {
    /// Open (creating if absent) the session file for `agent_id` under
    /// `sessions_dir`.
    pub fn open(sessions_dir: &Path, agent_id: &str) -> Result<Self> {
        std::fs::create_dir_all(sessions_dir)?;
        let path = sessions_dir.join(format!("{agent_id}.jsonl"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self { path, file })
    }

    /// The on-disk path of this session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, flushing immediately.
    pub fn append(&mut self, record: &SessionRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }

    /// Read every well-formed record in file order.
    ///
    /// A truncated or malformed trailing line (the result of a crash
    /// mid-write) is skipped with a warning rather than failing the read;
    /// a malformed line in the middle of the file is also skipped, since a
    /// reader has no way to distinguish "truncated tail" from "one bad
    /// record" without re-reading the whole file after every append.
    pub fn read_all(&self) -> Result<Vec<SessionRecord>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %self.path.display(), line_no = idx + 1, %err, "skipping malformed session record"),
            }
        }
        Ok(records)
    }

    /// Return the most recent `custom` record with the given `custom_type`,
    /// if any — the common pattern for reading back persisted state like
    /// `threadId`.
    pub fn latest_custom(&self, custom_type: &str) -> Result<Option<serde_json::Value>> {
        let records = self.read_all()?;
        Ok(records
            .iter()
            .rev()
            .find_map(|r| r.as_custom(custom_type).cloned()))
    }
}
