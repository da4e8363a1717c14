use assess_core::model::StudentId;
use assess_core::reconcile::TopicStatistics;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{CachedStatistics, StorageError, TopicStatisticsRepository};

#[async_trait::async_trait]
impl TopicStatisticsRepository for SqliteRepository {
    async fn cache_statistics(
        &self,
        student_id: &StudentId,
        statistics: &TopicStatistics,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM topic_statistics_cache WHERE student_id = ?1")
            .bind(student_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (topic, accuracy) in statistics.iter() {
            sqlx::query(
                r"
                    INSERT INTO topic_statistics_cache (student_id, topic, accuracy, fetched_at)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(student_id.as_str())
            .bind(topic)
            .bind(accuracy)
            .bind(fetched_at)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        sqlx::query(
            r"
                INSERT INTO topic_statistics_fetches (student_id, fetched_at)
                VALUES (?1, ?2)
                ON CONFLICT(student_id) DO UPDATE SET fetched_at = excluded.fetched_at
            ",
        )
        .bind(student_id.as_str())
        .bind(fetched_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn cached_statistics(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<CachedStatistics>, StorageError> {
        let Some(marker) =
            sqlx::query("SELECT fetched_at FROM topic_statistics_fetches WHERE student_id = ?1")
                .bind(student_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(conn)?
        else {
            return Ok(None);
        };
        let fetched_at: DateTime<Utc> = marker.try_get("fetched_at").map_err(ser)?;

        let rows = sqlx::query(
            r"
                SELECT topic, accuracy
                FROM topic_statistics_cache
                WHERE student_id = ?1
            ",
        )
        .bind(student_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut statistics = TopicStatistics::new();
        for row in rows {
            let topic: String = row.try_get("topic").map_err(ser)?;
            let accuracy: f64 = row.try_get("accuracy").map_err(ser)?;
            statistics.insert(topic, accuracy);
        }

        Ok(Some(CachedStatistics {
            statistics,
            fetched_at,
        }))
    }
}
