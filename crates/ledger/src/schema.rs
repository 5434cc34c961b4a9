//! Idempotent schema application, one function per table — mirroring the
//! teacher's migration-function style, but with SQLite `REFERENCES` clauses
//! doing the work its own ScyllaDB schema could not.

use sqlx::SqlitePool;

use crate::LedgerError;

pub async fn apply(pool: &SqlitePool) -> Result<(), LedgerError> {
    sqlx::query("PRAGMA foreign_keys = ON;").execute(pool).await?;
    create_queries_table(pool).await?;
    create_hops_table(pool).await?;
    create_hop_documents_table(pool).await?;
    create_responses_table(pool).await?;
    create_evidence_chains_table(pool).await?;
    Ok(())
}

async fn create_queries_table(pool: &SqlitePool) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queries (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_queries_text ON queries(text);")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_hops_table(pool: &SqlitePool) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hops (
            id TEXT PRIMARY KEY,
            query_id TEXT NOT NULL REFERENCES queries(id),
            hop_order INTEGER NOT NULL,
            sub_query TEXT NOT NULL,
            reasoning TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
        );
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_hops_query_id ON hops(query_id);")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_hop_documents_table(pool: &SqlitePool) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hop_documents (
            id TEXT PRIMARY KEY,
            hop_id TEXT NOT NULL REFERENCES hops(id),
            document_id TEXT NOT NULL,
            dense_score REAL NOT NULL,
            sparse_score REAL NOT NULL,
            rank_position INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_hop_documents_hop_id ON hop_documents(hop_id);")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_hop_documents_document_id ON hop_documents(document_id);",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_responses_table(pool: &SqlitePool) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS responses (
            id TEXT PRIMARY KEY,
            query_id TEXT NOT NULL REFERENCES queries(id),
            content TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            user_feedback INTEGER NOT NULL DEFAULT 0,
            user_correction TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_responses_query_id ON responses(query_id);")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_evidence_chains_table(pool: &SqlitePool) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evidence_chains (
            id TEXT PRIMARY KEY,
            response_id TEXT NOT NULL REFERENCES responses(id),
            hop_ids TEXT NOT NULL,
            document_ids TEXT NOT NULL,
            confidence_score REAL NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_evidence_chains_response_id ON evidence_chains(response_id);",
    )
    .execute(pool)
    .await?;
    Ok(())
}
