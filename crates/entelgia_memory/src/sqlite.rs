use crate::entry::{now_ts, MemoryEntry, MemoryLayer, MemorySource};
use anyhow::{Context, Result};
use entelgia_core::state::{AgentState, DriveVector};
use entelgia_core::text::{jaccard, keywords};
use entelgia_core::SigningKey;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const FINGERPRINT_KEY: &str = "key_fingerprint";
/// Rows considered by relevance scoring.
const RELEVANCE_SCAN: i64 = 200;

const MEMORY_COLUMNS: &str = "id, agent, ts, layer, content, topic, emotion, emotion_intensity, \
     importance, source, promoted_from, intrusive, suppressed, signature_hex";

/// Durable, signed long-term store.
///
/// Every row is signed on write and verified on read. Rows that fail
/// verification are excluded from results and logged as security events.
#[derive(Clone)]
pub struct LongTermStore {
    pool: Pool<Sqlite>,
    key: SigningKey,
    resign_pending: Arc<AtomicBool>,
}

impl LongTermStore {
    pub async fn new<P: AsRef<Path>>(db_path: P, key: SigningKey) -> Result<Self> {
        let path = db_path.as_ref();
        let in_memory = path.as_os_str() == ":memory:";
        if !in_memory {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create data dir: {}", dir.display()))?;
            }
        }

        let db_url = format!("sqlite://{}?mode=rwc", path.display());
        // An in-memory database exists per connection; keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self {
            pool,
            key,
            resign_pending: Arc::new(AtomicBool::new(false)),
        };
        store.migrate().await?;
        store.check_key_fingerprint().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                agent TEXT NOT NULL,
                ts TEXT NOT NULL,
                layer TEXT NOT NULL,
                content TEXT NOT NULL,
                topic TEXT NOT NULL DEFAULT '',
                emotion TEXT NOT NULL DEFAULT 'neutral',
                emotion_intensity REAL NOT NULL DEFAULT 0,
                importance REAL NOT NULL DEFAULT 0,
                source TEXT NOT NULL DEFAULT 'direct',
                promoted_from TEXT,
                intrusive INTEGER NOT NULL DEFAULT 0,
                suppressed INTEGER NOT NULL DEFAULT 0,
                signature_hex TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create memories table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_mem_agent_ts ON memories(agent, ts DESC)")
            .execute(&self.pool)
            .await
            .context("Failed to create memories ts index")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_mem_agent_layer ON memories(agent, layer)")
            .execute(&self.pool)
            .await
            .context("Failed to create memories layer index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_state (
                agent TEXT PRIMARY KEY,
                ts TEXT NOT NULL,
                id_strength REAL NOT NULL,
                ego_strength REAL NOT NULL,
                superego_strength REAL NOT NULL,
                self_awareness REAL NOT NULL,
                energy REAL NOT NULL,
                pressure REAL NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create agent_state table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create settings table")?;

        Ok(())
    }

    /// Record the key fingerprint on first use; on mismatch, schedule a
    /// re-sign for the next write instead of migrating eagerly.
    async fn check_key_fingerprint(&self) -> Result<()> {
        let current = self.key.fingerprint();
        match self.get_setting(FINGERPRINT_KEY).await? {
            None => self.set_setting(FINGERPRINT_KEY, &current).await?,
            Some(stored) if stored == current => {}
            Some(_) => {
                tracing::warn!(
                    target: "entelgia::security",
                    "Signing key fingerprint changed; long-term rows will be re-signed on next write"
                );
                self.resign_pending.store(true, Ordering::SeqCst);
            }
        }
        if self.key.is_insecure() {
            tracing::warn!(
                target: "entelgia::security",
                "Long-term store opened with the insecure development key"
            );
        }
        Ok(())
    }

    pub fn resign_pending(&self) -> bool {
        self.resign_pending.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read setting")?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("Failed to write setting")?;
        Ok(())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Re-sign every row under the current key and store its fingerprint.
    /// Returns the number of rows rewritten.
    pub async fn resign_all(&self) -> Result<u64> {
        let rows = sqlx::query("SELECT id, ts, content, topic, emotion FROM memories")
            .fetch_all(&self.pool)
            .await
            .context("Failed to scan memories for re-signing")?;

        let mut tx = self.pool.begin().await?;
        let mut count = 0;
        for row in rows {
            let id: String = row.get("id");
            let ts: String = row.get("ts");
            let content: String = row.get("content");
            let topic: String = row.get("topic");
            let emotion: String = row.get("emotion");
            let payload = entelgia_core::SignedPayload::new(&content, &emotion, &topic, &ts);
            let sig = match self.key.sign(&payload) {
                Ok(sig) => sig,
                Err(e) => {
                    tracing::warn!("Skipping unsignable row {}: {}", id, e);
                    continue;
                }
            };
            sqlx::query("UPDATE memories SET signature_hex = ? WHERE id = ?")
                .bind(&sig)
                .bind(&id)
                .execute(&mut *tx)
                .await
                .context("Failed to re-sign memory")?;
            count += 1;
        }
        tx.commit().await?;

        self.set_setting(FINGERPRINT_KEY, &self.key.fingerprint()).await?;
        self.resign_pending.store(false, Ordering::SeqCst);
        tracing::info!("Re-signed {} long-term memories under the current key", count);
        Ok(count)
    }

    async fn resign_if_pending(&self) -> Result<()> {
        if self.resign_pending() {
            self.resign_all().await?;
        }
        Ok(())
    }

    /// Sign and append an entry. Nothing is written if signing fails.
    pub async fn insert(&self, entry: &MemoryEntry) -> Result<()> {
        self.resign_if_pending().await?;
        let sig = self
            .key
            .sign(&entry.payload())
            .context("Refusing to persist an unsignable memory")?;

        sqlx::query(
            "INSERT INTO memories (id, agent, ts, layer, content, topic, emotion, emotion_intensity, \
             importance, source, promoted_from, intrusive, suppressed, signature_hex) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.agent)
        .bind(&entry.ts)
        .bind(entry.layer.as_str())
        .bind(&entry.content)
        .bind(&entry.topic)
        .bind(&entry.emotion)
        .bind(entry.emotion_intensity as f64)
        .bind(entry.importance as f64)
        .bind(entry.source.as_str())
        .bind(entry.promoted_from.as_deref())
        .bind(entry.intrusive as i64)
        .bind(entry.suppressed as i64)
        .bind(&sig)
        .execute(&self.pool)
        .await
        .context("Failed to insert memory")?;

        tracing::debug!("Memory {} stored ({})", entry.id, entry.layer.as_str());
        Ok(())
    }

    /// Insert into the conscious layer unless the agent already holds a
    /// conscious entry with identical content. Returns whether it was written.
    pub async fn insert_conscious_dedup(&self, entry: &MemoryEntry) -> Result<bool> {
        let exists = sqlx::query(
            "SELECT 1 FROM memories WHERE agent = ? AND layer = ? AND content = ? LIMIT 1",
        )
        .bind(&entry.agent)
        .bind(MemoryLayer::Conscious.as_str())
        .bind(&entry.content)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to check for duplicate memory")?;
        if exists.is_some() {
            return Ok(false);
        }
        let mut entry = entry.clone();
        entry.layer = MemoryLayer::Conscious;
        self.insert(&entry).await?;
        Ok(true)
    }

    /// Promote a copy of `entry` into the conscious layer, deduplicated by content.
    pub async fn promote(&self, entry: &MemoryEntry, source: MemorySource) -> Result<Option<MemoryEntry>> {
        let copy = entry.promoted_copy(source);
        if self.insert_conscious_dedup(&copy).await? {
            Ok(Some(copy))
        } else {
            Ok(None)
        }
    }

    // ========================================================================
    // Reads (signature-filtered)
    // ========================================================================

    /// Reverse-chronological, verified entries.
    pub async fn recent(
        &self,
        agent: &str,
        limit: usize,
        layer: Option<MemoryLayer>,
    ) -> Result<Vec<MemoryEntry>> {
        let layer_clause = if layer.is_some() { "AND layer = ? " } else { "" };
        let sql = format!(
            "SELECT {} FROM memories WHERE agent = ? {}ORDER BY ts DESC, rowid DESC LIMIT ?",
            MEMORY_COLUMNS, layer_clause
        );
        let mut query = sqlx::query(&sql).bind(agent);
        if let Some(layer) = layer {
            query = query.bind(layer.as_str());
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query memories")?;

        Ok(self.verified(rows))
    }

    /// Most recent verified entries carrying at least one defense flag.
    pub async fn flagged_recent(&self, agent: &str, limit: usize) -> Result<Vec<MemoryEntry>> {
        let sql = format!(
            "SELECT {} FROM memories WHERE agent = ? AND layer = ? \
             AND (intrusive = 1 OR suppressed = 1) ORDER BY ts DESC, rowid DESC LIMIT ?",
            MEMORY_COLUMNS
        );
        let rows = sqlx::query(&sql)
        .bind(agent)
        .bind(MemoryLayer::Subconscious.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query flagged memories")?;
        Ok(self.verified(rows))
    }

    /// Topic- and dialogue-aware retrieval, best first.
    pub async fn relevant(
        &self,
        agent: &str,
        layer: Option<MemoryLayer>,
        topic: &str,
        dialogue: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        let candidates = self.recent(agent, RELEVANCE_SCAN as usize, layer).await?;
        let topic_kw = keywords(topic, 3);
        let dialogue_kw = keywords(dialogue, 3);

        let mut scored: Vec<(f32, MemoryEntry)> = candidates
            .into_iter()
            .map(|e| (relevance_score(&e, &topic_kw, &dialogue_kw), e))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(limit).map(|(_, e)| e).collect())
    }

    pub async fn count(&self, agent: &str, layer: MemoryLayer) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM memories WHERE agent = ? AND layer = ?")
            .bind(agent)
            .bind(layer.as_str())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count memories")?;
        Ok(row.get("n"))
    }

    fn verified(&self, rows: Vec<SqliteRow>) -> Vec<MemoryEntry> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let sig: String = row.get("signature_hex");
            let entry = row_to_entry(&row);
            match self.key.verify(&entry.payload(), &sig) {
                Ok(true) => out.push(entry),
                Ok(false) => tracing::warn!(
                    target: "entelgia::security",
                    "Invalid signature, memory {} forgotten",
                    entry.id
                ),
                Err(e) => tracing::warn!(
                    target: "entelgia::security",
                    "Unverifiable memory {} forgotten: {}",
                    entry.id,
                    e
                ),
            }
        }
        out
    }

    // ========================================================================
    // Agent state checkpoints
    // ========================================================================

    pub async fn save_agent_state(&self, agent: &str, state: &AgentState) -> Result<()> {
        sqlx::query(
            "INSERT INTO agent_state (agent, ts, id_strength, ego_strength, superego_strength, \
             self_awareness, energy, pressure) VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(agent) DO UPDATE SET ts = excluded.ts, \
             id_strength = excluded.id_strength, ego_strength = excluded.ego_strength, \
             superego_strength = excluded.superego_strength, \
             self_awareness = excluded.self_awareness, energy = excluded.energy, \
             pressure = excluded.pressure",
        )
        .bind(agent)
        .bind(now_ts())
        .bind(state.drives.id as f64)
        .bind(state.drives.ego as f64)
        .bind(state.drives.superego as f64)
        .bind(state.self_awareness as f64)
        .bind(state.energy as f64)
        .bind(state.pressure as f64)
        .execute(&self.pool)
        .await
        .context("Failed to save agent state")?;
        tracing::debug!("Agent state for {} checkpointed", agent);
        Ok(())
    }

    pub async fn load_agent_state(&self, agent: &str) -> Result<Option<AgentState>> {
        let row = sqlx::query(
            "SELECT id_strength, ego_strength, superego_strength, self_awareness, energy, pressure \
             FROM agent_state WHERE agent = ?",
        )
        .bind(agent)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load agent state")?;

        Ok(row.map(|r| {
            let mut state = AgentState {
                drives: DriveVector {
                    id: r.get::<f64, _>("id_strength") as f32,
                    ego: r.get::<f64, _>("ego_strength") as f32,
                    superego: r.get::<f64, _>("superego_strength") as f32,
                },
                self_awareness: r.get::<f64, _>("self_awareness") as f32,
                energy: r.get::<f64, _>("energy") as f32,
                pressure: r.get::<f64, _>("pressure") as f32,
                ..AgentState::default()
            };
            state.normalize();
            state
        }))
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

fn row_to_entry(row: &SqliteRow) -> MemoryEntry {
    let layer: String = row.get("layer");
    let source: String = row.get("source");
    MemoryEntry {
        id: row.get("id"),
        agent: row.get("agent"),
        layer: MemoryLayer::parse(&layer).unwrap_or(MemoryLayer::Subconscious),
        content: row.get("content"),
        topic: row.get("topic"),
        emotion: row.get("emotion"),
        emotion_intensity: row.get::<f64, _>("emotion_intensity") as f32,
        importance: row.get::<f64, _>("importance") as f32,
        source: MemorySource::parse(&source),
        promoted_from: row.get("promoted_from"),
        intrusive: row.get::<i64, _>("intrusive") != 0,
        suppressed: row.get::<i64, _>("suppressed") != 0,
        ts: row.get("ts"),
    }
}

/// `0.4*topic + 0.3*importance + 0.2*dialogue + 0.05`.
pub fn relevance_score(
    entry: &MemoryEntry,
    topic_kw: &BTreeSet<String>,
    dialogue_kw: &BTreeSet<String>,
) -> f32 {
    let mut entry_kw = keywords(&entry.content, 3);
    entry_kw.extend(keywords(&entry.topic, 3));
    0.4 * jaccard(&entry_kw, topic_kw)
        + 0.3 * entry.importance
        + 0.2 * jaccard(&entry_kw, dialogue_kw)
        + 0.1 * 0.5
}
