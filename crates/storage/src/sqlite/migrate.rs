use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs versioned migrations for the client-side cache schema.
///
/// Version 1 creates analysis result history, cached topic statistics,
/// and the local roadmap copy with per-task completion overrides.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS analysis_results (
                    id INTEGER PRIMARY KEY,
                    result_id TEXT NOT NULL UNIQUE,
                    submission_id TEXT NOT NULL,
                    kind TEXT NOT NULL
                        CHECK (kind IN ('feedback', 'recommendation', 'practice', 'improvement')),
                    subject TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS topic_statistics_cache (
                    student_id TEXT NOT NULL,
                    topic TEXT NOT NULL,
                    accuracy REAL NOT NULL CHECK (accuracy BETWEEN 0.0 AND 1.0),
                    fetched_at TEXT NOT NULL,
                    PRIMARY KEY (student_id, topic)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // Marker row so a student with an empty statistics map is still "cached".
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS topic_statistics_fetches (
                    student_id TEXT PRIMARY KEY,
                    fetched_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS roadmaps (
                    student_id TEXT PRIMARY KEY,
                    document TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS roadmap_task_completions (
                    student_id TEXT NOT NULL,
                    task_id TEXT NOT NULL,
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (student_id, task_id),
                    FOREIGN KEY (student_id) REFERENCES roadmaps(student_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_analysis_results_submission_kind
                    ON analysis_results (submission_id, kind, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
