use assess_core::model::{StudentId, TaskId};
use assess_core::roadmap::{Roadmap, RoadmapProgress};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{bool_from_i64, conn, ser};
use crate::repository::{RoadmapRepository, StorageError};

#[async_trait::async_trait]
impl RoadmapRepository for SqliteRepository {
    async fn save_roadmap(
        &self,
        student_id: &StudentId,
        roadmap: &Roadmap,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let document = serde_json::to_string(roadmap).map_err(ser)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO roadmaps (student_id, document, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(student_id) DO UPDATE SET
                    document = excluded.document,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(student_id.as_str())
        .bind(document)
        .bind(updated_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM roadmap_task_completions WHERE student_id = ?1")
            .bind(student_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn load_roadmap(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<RoadmapProgress>, StorageError> {
        let Some(row) = sqlx::query("SELECT document FROM roadmaps WHERE student_id = ?1")
            .bind(student_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
        else {
            return Ok(None);
        };
        let document: String = row.try_get("document").map_err(ser)?;
        let roadmap: Roadmap = serde_json::from_str(&document).map_err(ser)?;
        let mut progress = RoadmapProgress::new(roadmap);

        let overrides = sqlx::query(
            r"
                SELECT task_id, completed
                FROM roadmap_task_completions
                WHERE student_id = ?1
                ORDER BY updated_at ASC
            ",
        )
        .bind(student_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        for row in overrides {
            let task_id: String = row.try_get("task_id").map_err(ser)?;
            let completed = bool_from_i64(
                "completed",
                row.try_get::<i64, _>("completed").map_err(ser)?,
            )?;
            progress.set_completed(&TaskId::new(task_id), completed);
        }

        Ok(Some(progress))
    }

    async fn set_task_completed(
        &self,
        student_id: &StudentId,
        task_id: &TaskId,
        completed: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO roadmap_task_completions (student_id, task_id, completed, updated_at)
                SELECT ?1, ?2, ?3, ?4
                WHERE EXISTS (SELECT 1 FROM roadmaps WHERE student_id = ?1)
                ON CONFLICT(student_id, task_id) DO UPDATE SET
                    completed = excluded.completed,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(student_id.as_str())
        .bind(task_id.as_str())
        .bind(i64::from(completed))
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
