use cacao_core::model::{CourseId, CourseProgress, LessonId, Notification};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<CourseProgress, StorageError> {
    let course_id: String = row.try_get("course_id").map_err(ser)?;
    let overall_progress: f64 = row.try_get("overall_progress").map_err(ser)?;
    let lessons: String = row.try_get("completed_lessons").map_err(ser)?;
    let completed_lessons: Vec<LessonId> = from_json(&lessons)?;

    Ok(CourseProgress::new(
        CourseId::new(course_id),
        overall_progress,
        completed_lessons,
    ))
}

pub(crate) fn map_notification_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Notification, StorageError> {
    let payload: String = row.try_get("payload").map_err(ser)?;
    from_json(&payload)
}

pub(crate) fn position_to_i64(position: usize) -> Result<i64, StorageError> {
    i64::try_from(position).map_err(|_| StorageError::Serialization("position overflow".into()))
}
