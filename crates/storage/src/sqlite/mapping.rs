use assess_core::analysis::{AnalysisKind, AnalysisResult};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps a unique-constraint violation to `Conflict`, anything else to `Connection`.
pub(crate) fn insert_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => conn(e),
    }
}

pub(crate) fn encode_result(result: &AnalysisResult) -> Result<String, StorageError> {
    serde_json::to_string(result).map_err(ser)
}

pub(crate) fn decode_result(row: &sqlx::sqlite::SqliteRow) -> Result<AnalysisResult, StorageError> {
    let payload: String = row.try_get("payload").map_err(ser)?;
    let kind: String = row.try_get("kind").map_err(ser)?;
    let result: AnalysisResult = serde_json::from_str(&payload).map_err(ser)?;

    let expected = AnalysisKind::parse(&kind)
        .ok_or_else(|| StorageError::Serialization(format!("unknown result kind: {kind}")))?;
    if result.kind() != expected {
        return Err(StorageError::Serialization(format!(
            "payload kind {} does not match column kind {kind}",
            result.kind().as_str()
        )));
    }
    Ok(result)
}

pub(crate) fn bool_from_i64(field: &'static str, v: i64) -> Result<bool, StorageError> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!("invalid {field}: {other}"))),
    }
}
