//! Authoritative persistence and retrieval of skills.
//!
//! On-disk markdown is the source of truth; the SQLite index (FTS5 +
//! optional vectors + metadata) is a derived cache, rebuildable at any time.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    chrono::{NaiveDate, Utc},
    sha2::{Digest, Sha256},
    sqlx::{SqlitePool, sqlite::SqliteConnectOptions},
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
    walkdir::WalkDir,
};

use prism_common::{Error, Result};

use crate::{
    embeddings::{EmbeddingProvider, blob_to_vec, cosine_similarity, vec_to_blob},
    frontmatter,
    schema::{self, EMBEDDING_MODEL_KEY, MetaRow, db_err},
    skill::{Skill, SkillStatus, SkillType, extract_title},
};

/// Subdirectories of the memory root that hold skill documents.
pub const MEMORY_SUBDIRS: [&str; 4] = ["skills", "gotchas", "decisions", "episodes"];

/// A search candidate: the skill plus raw lexical/semantic scores.
/// Normalization happens in the ranker.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub skill: Skill,
    pub lexical: f32,
    pub semantic: f32,
}

/// Status filter for `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(SkillStatus),
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<StatusFilter>,
    pub kind: Option<SkillType>,
    pub tag: Option<String>,
}

pub struct SkillStore {
    root: PathBuf,
    pool: SqlitePool,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    /// `put`, `increment_reuse` and `rebuild_index` serialize here; readers
    /// do not take it.
    writer: Mutex<()>,
}

/// Open (or create) the index database next to the corpus.
pub async fn open_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);
    SqlitePool::connect_with(opts).await.map_err(db_err)
}

impl SkillStore {
    /// Open a store over `root`, creating the layout and index schema.
    ///
    /// If the recorded embedding model differs from the provider's, stored
    /// vectors are wiped so they are rebuilt rather than silently misused.
    pub async fn open(
        root: impl Into<PathBuf>,
        pool: SqlitePool,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Result<Self> {
        let root = root.into();
        for sub in MEMORY_SUBDIRS {
            std::fs::create_dir_all(root.join(sub))?;
        }
        schema::init_schema(&pool).await?;

        if let Some(ref embedder) = embedder {
            let recorded: Option<(String,)> =
                sqlx::query_as("SELECT value FROM index_meta WHERE key = ?")
                    .bind(EMBEDDING_MODEL_KEY)
                    .fetch_optional(&pool)
                    .await
                    .map_err(db_err)?;
            let model = embedder.model_name();
            if recorded.as_ref().map(|(m,)| m.as_str()) != Some(model) {
                if let Some((old,)) = recorded {
                    warn!(old = %old, new = %model, "embedding model changed, clearing vectors");
                }
                sqlx::query("DELETE FROM skill_embeddings")
                    .execute(&pool)
                    .await
                    .map_err(db_err)?;
                sqlx::query(
                    "INSERT INTO index_meta (key, value) VALUES (?, ?)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )
                .bind(EMBEDDING_MODEL_KEY)
                .bind(model)
                .execute(&pool)
                .await
                .map_err(db_err)?;
            }
        }

        Ok(Self {
            root,
            pool,
            embedder,
            writer: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_embeddings(&self) -> bool {
        self.embedder.is_some()
    }

    /// Create or update a skill by `skill_id`. The document hits disk before
    /// the index, so a reader never observes an indexed-but-unwritten skill.
    pub async fn put(&self, skill: &mut Skill) -> Result<PathBuf> {
        skill.header.validate()?;
        let _guard = self.writer.lock().await;

        if let Some(existing) = self.meta_row(&skill.header.skill_id).await?
            && existing.kind != skill.header.kind.as_str()
        {
            return Err(Error::conflict(format!(
                "skill '{}' already stored as type '{}', refusing '{}'",
                skill.header.skill_id,
                existing.kind,
                skill.header.kind.as_str()
            )));
        }

        skill.title = extract_title(&skill.body);
        let path = self
            .root
            .join(skill.header.kind.subdir())
            .join(skill.header.file_name());
        let rendered = frontmatter::render_skill(skill)?;
        atomic_write(&path, &rendered)?;
        skill.path = Some(path.clone());

        self.index_skill(skill, &path).await?;
        debug!(skill_id = %skill.header.skill_id, path = %path.display(), "stored skill");
        Ok(path)
    }

    /// Fetch the current document for `skill_id`.
    pub async fn get(&self, skill_id: &str) -> Result<Skill> {
        let row = self
            .meta_row(skill_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("skill '{skill_id}'")))?;
        self.load_document(&row)
    }

    /// List skills, optionally filtered by status, type, or domain tag.
    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<Skill>> {
        let rows: Vec<MetaRow> = match filter.status {
            Some(StatusFilter::Only(status)) => {
                sqlx::query_as("SELECT * FROM skills_meta WHERE status = ? ORDER BY skill_id")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_err)?
            },
            _ => sqlx::query_as("SELECT * FROM skills_meta ORDER BY skill_id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?,
        };

        let mut skills = Vec::with_capacity(rows.len());
        for row in rows {
            let skill = self.load_document(&row)?;
            if let Some(kind) = filter.kind
                && skill.header.kind != kind
            {
                continue;
            }
            if let Some(ref tag) = filter.tag
                && !skill.header.domain_tags.iter().any(|t| t == tag)
            {
                continue;
            }
            skills.push(skill);
        }
        Ok(skills)
    }

    /// Lexical (and, when enabled, semantic) retrieval of up to `limit`
    /// candidates, ordered by lexical score.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let mut hits = self.fts_search(query, limit).await?;

        if let Some(ref embedder) = self.embedder {
            match embedder.embed(query).await {
                Ok(query_emb) => {
                    let neighbors = self.vector_search(&query_emb, limit).await?;
                    for (skill_id, sem) in neighbors {
                        if let Some(hit) =
                            hits.iter_mut().find(|h| h.skill.header.skill_id == skill_id)
                        {
                            hit.semantic = sem;
                        } else if let Some(row) = self.meta_row(&skill_id).await? {
                            hits.push(SearchHit {
                                skill: self.load_document(&row)?,
                                lexical: 0.0,
                                semantic: sem,
                            });
                        }
                    }
                },
                Err(e) => {
                    warn!(error = %e, "query embedding failed, lexical-only search");
                },
            }
        }

        hits.sort_by(|a, b| {
            b.lexical
                .total_cmp(&a.lexical)
                .then(b.semantic.total_cmp(&a.semantic))
                .then(a.skill.header.skill_id.cmp(&b.skill.header.skill_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Record that a skill was emitted into an artifact: bump `reuse_count`,
    /// set `last_used` to today, on disk and in the index.
    pub async fn increment_reuse(&self, skill_id: &str) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut skill = self.get(skill_id).await?;
        skill.header.reuse_count += 1;
        skill.header.last_used = Some(today());

        let path = self
            .root
            .join(skill.header.kind.subdir())
            .join(skill.header.file_name());
        atomic_write(&path, &frontmatter::render_skill(&skill)?)?;

        sqlx::query("UPDATE skills_meta SET reuse_count = ?, last_used = ? WHERE skill_id = ?")
            .bind(skill.header.reuse_count as i64)
            .bind(skill.header.effective_last_used().to_string())
            .bind(skill_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Flip a skill's lifecycle status (retirement path).
    pub async fn set_status(&self, skill_id: &str, status: SkillStatus) -> Result<()> {
        let mut skill = self.get(skill_id).await?;
        skill.header.status = status;
        self.put(&mut skill).await?;
        Ok(())
    }

    /// Discard the index and recreate it from the on-disk corpus.
    ///
    /// Unparseable documents are skipped with a warning; rebuild never
    /// touches the documents themselves.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let _guard = self.writer.lock().await;

        sqlx::query("DELETE FROM skills_fts")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM skills_meta")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let mut seen: Vec<String> = Vec::new();
        for sub in MEMORY_SUBDIRS {
            let dir = self.root.join(sub);
            if !dir.exists() {
                continue;
            }
            for entry in WalkDir::new(&dir).into_iter().flatten() {
                let path = entry.path();
                if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                let content = std::fs::read_to_string(path)?;
                let mut skill = match frontmatter::parse_skill(&content) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unparseable document");
                        continue;
                    },
                };
                skill.path = Some(path.to_path_buf());
                self.index_skill(&skill, path).await?;
                seen.push(skill.header.skill_id);
            }
        }

        // Drop vectors for documents that no longer exist.
        let existing: Vec<(String,)> = sqlx::query_as("SELECT skill_id FROM skill_embeddings")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        for (skill_id,) in existing {
            if !seen.contains(&skill_id) {
                sqlx::query("DELETE FROM skill_embeddings WHERE skill_id = ?")
                    .bind(&skill_id)
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
            }
        }

        info!(count = seen.len(), "index rebuilt");
        Ok(seen.len())
    }

    pub async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM skills_meta")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count as u64)
    }

    // ── Internals ────────────────────────────────────────────────────────

    async fn meta_row(&self, skill_id: &str) -> Result<Option<MetaRow>> {
        sqlx::query_as("SELECT * FROM skills_meta WHERE skill_id = ?")
            .bind(skill_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    fn load_document(&self, row: &MetaRow) -> Result<Skill> {
        let path = Path::new(&row.file_path);
        let content = std::fs::read_to_string(path).map_err(|_| {
            Error::conflict(format!(
                "index references '{}' but the document is missing",
                row.file_path
            ))
        })?;
        let mut skill = frontmatter::parse_skill(&content)?;
        skill.path = Some(path.to_path_buf());
        Ok(skill)
    }

    async fn index_skill(&self, skill: &Skill, path: &Path) -> Result<()> {
        let header = &skill.header;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM skills_fts WHERE skill_id = ?")
            .bind(&header.skill_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query(
            "INSERT INTO skills_fts (skill_id, title, body, domain_tags, type, status, stack_context)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&header.skill_id)
        .bind(&skill.title)
        .bind(&skill.body)
        .bind(header.domain_tags.join(" "))
        .bind(header.kind.as_str())
        .bind(header.status.as_str())
        .bind(header.stack_context.join(" "))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO skills_meta
               (skill_id, file_path, kind, status, created, last_used, reuse_count, verified_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(skill_id) DO UPDATE SET
               file_path = excluded.file_path, kind = excluded.kind,
               status = excluded.status, created = excluded.created,
               last_used = excluded.last_used, reuse_count = excluded.reuse_count,
               verified_by = excluded.verified_by",
        )
        .bind(&header.skill_id)
        .bind(path.to_string_lossy().as_ref())
        .bind(header.kind.as_str())
        .bind(header.status.as_str())
        .bind(header.created.to_string())
        .bind(header.last_used.map(|d| d.to_string()))
        .bind(header.reuse_count as i64)
        .bind(match header.verified_by {
            crate::skill::VerifiedBy::Human => "human",
            crate::skill::VerifiedBy::Agent => "agent",
        })
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        self.upsert_embedding(skill).await;
        Ok(())
    }

    /// Embed and store the skill's vector when the capability is present.
    /// Failures degrade to lexical-only retrieval rather than failing `put`.
    async fn upsert_embedding(&self, skill: &Skill) {
        let Some(ref embedder) = self.embedder else {
            return;
        };
        let text = skill.embedding_text();
        let hash = sha256_hex(&text);

        let existing: std::result::Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT content_hash FROM skill_embeddings WHERE skill_id = ?")
                .bind(&skill.header.skill_id)
                .fetch_optional(&self.pool)
                .await;
        if let Ok(Some((prior,))) = existing
            && prior == hash
        {
            return;
        }

        let embedding = match embedder.embed(&text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(skill_id = %skill.header.skill_id, error = %e, "embedding failed");
                return;
            },
        };
        let result = sqlx::query(
            "INSERT INTO skill_embeddings (skill_id, embedding, model, content_hash, generated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(skill_id) DO UPDATE SET
               embedding = excluded.embedding, model = excluded.model,
               content_hash = excluded.content_hash, generated_at = excluded.generated_at",
        )
        .bind(&skill.header.skill_id)
        .bind(vec_to_blob(&embedding))
        .bind(embedder.model_name())
        .bind(&hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            warn!(skill_id = %skill.header.skill_id, error = %e, "embedding upsert failed");
        }
    }

    async fn fts_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let Some(match_expr) = build_match_query(query) else {
            return Ok(Vec::new());
        };
        let rows: Vec<(String, f64)> = sqlx::query_as(
            "SELECT skill_id, bm25(skills_fts) AS score FROM skills_fts
             WHERE skills_fts MATCH ? ORDER BY score LIMIT ?",
        )
        .bind(&match_expr)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut hits = Vec::with_capacity(rows.len());
        for (skill_id, score) in rows {
            if let Some(row) = self.meta_row(&skill_id).await? {
                hits.push(SearchHit {
                    skill: self.load_document(&row)?,
                    // bm25 ranks better matches more negative.
                    lexical: score.abs() as f32,
                    semantic: 0.0,
                });
            }
        }
        Ok(hits)
    }

    async fn vector_search(&self, query_emb: &[f32], limit: usize) -> Result<Vec<(String, f32)>> {
        let rows: Vec<(String, Vec<u8>)> =
            sqlx::query_as("SELECT skill_id, embedding FROM skill_embeddings")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        let mut scored: Vec<(String, f32)> = rows
            .into_iter()
            .map(|(id, blob)| {
                let sim = cosine_similarity(query_emb, &blob_to_vec(&blob));
                (id, sim)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Sanitize a free-text query into an FTS5 MATCH expression: alphanumeric
/// words OR-ed together. `None` when nothing queryable remains.
fn build_match_query(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

/// Write via a temp file in the same directory, then rename into place, so
/// readers see either the prior or the new version, never a partial file.
pub(crate) fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("md.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests {
    use {super::*, crate::skill::tests::header, async_trait::async_trait, tempfile::TempDir};

    pub(crate) async fn open_test_store(tmp: &TempDir) -> SkillStore {
        let pool = open_pool(&tmp.path().join("index.db")).await.unwrap();
        SkillStore::open(tmp.path().join("memory"), pool, None)
            .await
            .unwrap()
    }

    fn make_skill(id: &str, body: &str) -> Skill {
        Skill::new(header(id), body)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;

        let mut skill = make_skill("retry-backoff", "# Retry with backoff\n\nJittered delays.\n");
        skill.header.extra.insert(
            "custom_key".into(),
            serde_yaml::Value::String("kept".into()),
        );
        store.put(&mut skill).await.unwrap();

        let got = store.get("retry-backoff").await.unwrap();
        assert_eq!(got.header.skill_id, "retry-backoff");
        assert_eq!(got.header.domain_tags, skill.header.domain_tags);
        assert_eq!(got.header.created, skill.header.created);
        assert_eq!(got.title, "Retry with backoff");
        assert_eq!(
            got.body.trim_end_matches('\n'),
            skill.body.trim_end_matches('\n')
        );
        assert!(got.header.extra.contains_key("custom_key"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;
        assert!(matches!(
            store.get("nope").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_type_collision_is_conflict() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;

        let mut skill = make_skill("same-id", "# One\n");
        store.put(&mut skill).await.unwrap();

        let mut other = make_skill("same-id", "# Two\n");
        other.header.kind = SkillType::Gotcha;
        assert!(matches!(
            store.put(&mut other).await,
            Err(Error::Conflict(_))
        ));
        // Prior state intact.
        assert_eq!(store.get("same-id").await.unwrap().title, "One");
    }

    #[tokio::test]
    async fn test_search_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;
        let hits = store.search("jwt auth", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_read_your_writes() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;

        let mut skill = make_skill(
            "jwt-rotation",
            "# JWT refresh rotation\n\nRotate refresh tokens on every use.\n",
        );
        store.put(&mut skill).await.unwrap();

        let hits = store.search("jwt rotation", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].skill.header.skill_id, "jwt-rotation");
        assert!(hits[0].lexical > 0.0);

        // Update the body; search must reflect it immediately.
        skill.body = "# JWT refresh rotation\n\nNow mentions signing keys.\n".into();
        store.put(&mut skill).await.unwrap();
        let hits = store.search("signing", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_punctuation_only_query_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;
        let mut skill = make_skill("anything", "# Anything\n");
        store.put(&mut skill).await.unwrap();
        assert!(store.search("???!!!", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_increment_reuse_updates_disk_and_index() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;

        let mut skill = make_skill("bump-me", "# Bump\n");
        let path = store.put(&mut skill).await.unwrap();

        store.increment_reuse("bump-me").await.unwrap();
        store.increment_reuse("bump-me").await.unwrap();

        let got = store.get("bump-me").await.unwrap();
        assert_eq!(got.header.reuse_count, 2);
        assert_eq!(got.header.last_used, Some(today()));

        // The on-disk document agrees with the index.
        let on_disk = frontmatter::parse_skill(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.header.reuse_count, 2);
        assert_eq!(on_disk.header.last_used, Some(today()));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;

        let mut a = make_skill("alpha", "# Alpha\n");
        a.header.domain_tags = vec!["auth".into()];
        store.put(&mut a).await.unwrap();

        let mut b = make_skill("beta", "# Beta\n");
        b.header.kind = SkillType::Gotcha;
        b.header.status = SkillStatus::Deprecated;
        b.header.domain_tags = vec!["db".into()];
        store.put(&mut b).await.unwrap();

        let all = store.list(&ListFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let active = store
            .list(&ListFilter {
                status: Some(StatusFilter::Only(SkillStatus::Active)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].header.skill_id, "alpha");

        let gotchas = store
            .list(&ListFilter {
                kind: Some(SkillType::Gotcha),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(gotchas.len(), 1);

        let tagged = store
            .list(&ListFilter {
                tag: Some("auth".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].header.skill_id, "alpha");
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;

        for (id, body) in [
            ("one", "# One\n\nrust async channels\n"),
            ("two", "# Two\n\nreact component testing\n"),
        ] {
            let mut s = make_skill(id, body);
            store.put(&mut s).await.unwrap();
        }

        let first = store.rebuild_index().await.unwrap();
        let hits1: Vec<String> = store
            .search("rust channels", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.skill.header.skill_id)
            .collect();

        let second = store.rebuild_index().await.unwrap();
        let hits2: Vec<String> = store
            .search("rust channels", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.skill.header.skill_id)
            .collect();

        assert_eq!(first, second);
        assert_eq!(hits1, hits2);
        assert_eq!(hits1, vec!["one".to_string()]);
    }

    #[tokio::test]
    async fn test_rebuild_recovers_dropped_index() {
        let tmp = TempDir::new().unwrap();
        let store = open_test_store(&tmp).await;

        let mut s = make_skill("survivor", "# Survivor\n\ncontent\n");
        store.put(&mut s).await.unwrap();

        // Simulate index corruption: wipe the tables, documents stay.
        sqlx::query("DELETE FROM skills_meta")
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM skills_fts")
            .execute(&store.pool)
            .await
            .unwrap();
        assert!(store.get("survivor").await.is_err());

        let count = store.rebuild_index().await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.get("survivor").await.unwrap().title, "Survivor");
    }

    // ── Semantic path ────────────────────────────────────────────────────

    struct KeywordEmbedder {
        name: String,
    }

    const KEYWORDS: [&str; 4] = ["rust", "react", "database", "auth"];

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(KEYWORDS
                .iter()
                .map(|kw| if lower.contains(kw) { 1.0 } else { 0.0 })
                .collect())
        }

        fn model_name(&self) -> &str {
            &self.name
        }

        fn dimensions(&self) -> usize {
            KEYWORDS.len()
        }
    }

    async fn open_semantic_store(tmp: &TempDir, model: &str) -> SkillStore {
        let pool = open_pool(&tmp.path().join("index.db")).await.unwrap();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(KeywordEmbedder { name: model.into() });
        SkillStore::open(tmp.path().join("memory"), pool, Some(embedder))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_semantic_union_includes_non_lexical_hit() {
        let tmp = TempDir::new().unwrap();
        let store = open_semantic_store(&tmp, "kw-v1").await;

        // Lexically unrelated to the query, semantically adjacent via "auth".
        let mut s = make_skill("session-fixation", "# Session fixation\n\nauth pitfall\n");
        store.put(&mut s).await.unwrap();

        let hits = store.search("auth login flows", 10).await.unwrap();
        assert!(
            hits.iter()
                .any(|h| h.skill.header.skill_id == "session-fixation" && h.semantic > 0.0)
        );
    }

    #[tokio::test]
    async fn test_model_change_clears_vectors() {
        let tmp = TempDir::new().unwrap();
        {
            let store = open_semantic_store(&tmp, "kw-v1").await;
            let mut s = make_skill("vec-holder", "# Vec\n\nrust database\n");
            store.put(&mut s).await.unwrap();
            let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM skill_embeddings")
                .fetch_one(&store.pool)
                .await
                .unwrap();
            assert_eq!(n, 1);
        }
        {
            let store = open_semantic_store(&tmp, "kw-v2").await;
            let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM skill_embeddings")
                .fetch_one(&store.pool)
                .await
                .unwrap();
            assert_eq!(n, 0, "model change must clear stored vectors");
        }
    }
}
