use assess_core::analysis::{AnalysisKind, AnalysisResult};
use assess_core::model::{ResultId, SubmissionId};
use chrono::{DateTime, Utc};

use super::SqliteRepository;
use super::mapping::{conn, decode_result, encode_result, insert_err};
use crate::repository::{AnalysisResultRepository, StorageError};

#[async_trait::async_trait]
impl AnalysisResultRepository for SqliteRepository {
    async fn append_result(
        &self,
        submission_id: &SubmissionId,
        result: &AnalysisResult,
        created_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let payload = encode_result(result)?;

        let res = sqlx::query(
            r"
                INSERT INTO analysis_results (
                    result_id, submission_id, kind, subject, payload, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(result.result_id().as_str())
        .bind(submission_id.as_str())
        .bind(result.kind().as_str())
        .bind(result.subject())
        .bind(payload)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_results(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Vec<AnalysisResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT kind, payload
                FROM analysis_results
                WHERE submission_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(submission_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(decode_result).collect()
    }

    async fn get_result(&self, result_id: &ResultId) -> Result<AnalysisResult, StorageError> {
        let row = sqlx::query(
            r"
                SELECT kind, payload
                FROM analysis_results
                WHERE result_id = ?1
            ",
        )
        .bind(result_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        decode_result(&row)
    }

    async fn latest_result(
        &self,
        submission_id: &SubmissionId,
        kind: AnalysisKind,
    ) -> Result<Option<AnalysisResult>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT kind, payload
                FROM analysis_results
                WHERE submission_id = ?1 AND kind = ?2
                ORDER BY id DESC
                LIMIT 1
            ",
        )
        .bind(submission_id.as_str())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(decode_result).transpose()
    }
}
