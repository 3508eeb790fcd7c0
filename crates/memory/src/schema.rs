//! Index database schema. The index is a derived cache over the on-disk
//! corpus; everything here must be reconstructible by `RebuildIndex`.

use sqlx::SqlitePool;

use prism_common::Result;

/// One row per skill in the metadata table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MetaRow {
    pub skill_id: String,
    pub file_path: String,
    pub kind: String,
    pub status: String,
    pub created: String,
    pub last_used: Option<String>,
    pub reuse_count: i64,
    pub verified_by: String,
}

/// Create the index tables.
///
/// `skills_fts` uses the unicode61 tokenizer with full diacritic removal:
/// unicode-word segmentation, case-folded, ASCII-folded, no stemming.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE VIRTUAL TABLE IF NOT EXISTS skills_fts USING fts5(
            skill_id, title, body, domain_tags, type, status, stack_context,
            tokenize = 'unicode61 remove_diacritics 2'
        )",
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS skills_meta (
            skill_id     TEXT PRIMARY KEY,
            file_path    TEXT NOT NULL,
            kind         TEXT NOT NULL,
            status       TEXT NOT NULL,
            created      TEXT NOT NULL,
            last_used    TEXT,
            reuse_count  INTEGER NOT NULL DEFAULT 0,
            verified_by  TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS skill_embeddings (
            skill_id     TEXT PRIMARY KEY,
            embedding    BLOB NOT NULL,
            model        TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            generated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS index_meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(())
}

/// Key in `index_meta` recording which embedding model produced the vectors.
pub const EMBEDDING_MODEL_KEY: &str = "embedding_model";

pub(crate) fn db_err(e: sqlx::Error) -> prism_common::Error {
    prism_common::Error::message(format!("index database: {e}"))
}
