//! Short-term memory: a bounded per-agent buffer with a JSON snapshot.

use crate::entry::StmEntry;
use anyhow::{Context, Result};
use entelgia_core::MemoryConfig;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    agent: String,
    entries: VecDeque<StmEntry>,
    max_entries: usize,
    trim_batch: usize,
    snapshot: Option<PathBuf>,
}

/// `<data_dir>/stm_<agent>.json`, with the agent name made filesystem-safe.
pub fn snapshot_path(data_dir: &Path, agent: &str) -> PathBuf {
    let safe: String = agent
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect();
    data_dir.join(format!("stm_{}.json", safe))
}

impl ShortTermMemory {
    /// In-memory buffer with no snapshot file.
    pub fn new(agent: &str, max_entries: usize, trim_batch: usize) -> Self {
        Self {
            agent: agent.to_string(),
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
            trim_batch: trim_batch.max(1),
            snapshot: None,
        }
    }

    /// Open the agent's buffer, loading its snapshot if one exists.
    pub fn open(cfg: &MemoryConfig, agent: &str) -> Result<Self> {
        let path = snapshot_path(&cfg.data_dir, agent);
        let mut stm = Self::new(agent, cfg.stm_max_entries, cfg.stm_trim_batch);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read STM snapshot: {}", path.display()))?;
            let entries: Vec<StmEntry> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse STM snapshot: {}", path.display()))?;
            stm.entries = entries.into();
            stm.evict();
            tracing::debug!("Loaded {} STM entries for {}", stm.entries.len(), agent);
        }
        stm.snapshot = Some(path);
        Ok(stm)
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &StmEntry> {
        self.entries.iter()
    }

    /// The last `k` entries, oldest first.
    pub fn tail(&self, k: usize) -> Vec<&StmEntry> {
        let start = self.entries.len().saturating_sub(k);
        self.entries.range(start..).collect()
    }

    /// Append an entry. When the bound is exceeded the oldest batch is
    /// evicted and the snapshot rewritten. Returns the number evicted.
    pub fn append(&mut self, entry: StmEntry) -> Result<usize> {
        self.entries.push_back(entry);
        let evicted = self.evict();
        if evicted > 0 {
            tracing::debug!("STM {} evicted {} oldest entries", self.agent, evicted);
            self.flush()?;
        }
        Ok(evicted)
    }

    fn evict(&mut self) -> usize {
        if self.entries.len() <= self.max_entries {
            return 0;
        }
        let overflow = self.entries.len() - self.max_entries;
        let drop = overflow.max(self.trim_batch).min(self.entries.len());
        self.entries.drain(..drop);
        drop
    }

    /// Drop entries failing `keep`. Returns how many were removed.
    pub fn retain<F: FnMut(&StmEntry) -> bool>(&mut self, keep: F) -> usize {
        let before = self.entries.len();
        self.entries.retain(keep);
        before - self.entries.len()
    }

    /// Atomically overwrite the snapshot (temp file, then rename).
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data dir: {}", dir.display()))?;
        }
        let entries: Vec<&StmEntry> = self.entries.iter().collect();
        let json = serde_json::to_string(&entries).context("Failed to serialize STM")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write STM snapshot: {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace STM snapshot: {}", path.display()))?;
        Ok(())
    }
}
