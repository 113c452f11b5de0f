//! # Progress Module - Course Consumption Tracking
//!
//! Tracks which lectures each enrolled student has completed:
//! - Lazy per-(course, user) progress rows
//! - Idempotent completion marking
//! - Derived completion percentage (never stored)
//!
//! Set membership lives in join tables with composite unique keys, so
//! "create if absent" and "mark completed once" are single
//! `INSERT .. ON CONFLICT DO NOTHING` statements and stay correct under
//! concurrent requests.

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::courses::{sections, sub_sections};
use crate::shared::error::ApiError;
use crate::shared::state::AppState;
use crate::shared::utils::DbPool;

// ============================================================================
// DATABASE SCHEMA
// ============================================================================

diesel::table! {
    course_progress (id) {
        id -> Uuid,
        course_id -> Uuid,
        user_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    completed_lectures (id) {
        id -> Uuid,
        progress_id -> Uuid,
        sub_section_id -> Uuid,
        completed_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(course_progress, completed_lectures);

// ============================================================================
// DATA MODELS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = course_progress)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = completed_lectures)]
#[serde(rename_all = "camelCase")]
pub struct CompletedLecture {
    pub id: Uuid,
    pub progress_id: Uuid,
    pub sub_section_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressOutcome {
    Recorded,
    AlreadyCompleted,
}

/// Percentage = 100 * completed / total, rounded to 2 decimal places.
/// A course with no content reads as 0%, never a division error.
fn percentage(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = 100.0 * completed as f64 / total as f64;
    (pct * 100.0).round() / 100.0
}

// ============================================================================
// PROGRESS ENGINE
// ============================================================================

/// Progress engine handling completion tracking operations
pub struct ProgressEngine {
    db: DbPool,
}

impl ProgressEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Creates the (course, user) progress row when missing. Safe to
    /// call repeatedly and from concurrent enrollments.
    pub async fn ensure_progress(&self, course_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        let mut conn = self.db.get()?;
        ensure_progress_row(&mut conn, course_id, user_id)?;
        Ok(())
    }

    /// Marks one lecture completed. Re-marking an already-completed
    /// lecture reports [`ProgressOutcome::AlreadyCompleted`] instead of
    /// erroring.
    pub async fn update_progress(
        &self,
        course_id: Uuid,
        sub_section_id: Uuid,
        user_id: Uuid,
    ) -> Result<ProgressOutcome, ApiError> {
        let mut conn = self.db.get()?;

        let lecture: Option<Uuid> = sub_sections::table
            .filter(sub_sections::id.eq(sub_section_id))
            .select(sub_sections::id)
            .first(&mut conn)
            .optional()?;
        if lecture.is_none() {
            return Err(ApiError::NotFound("Invalid subsection".to_string()));
        }

        let progress = ensure_progress_row(&mut conn, course_id, user_id)?;

        let inserted = diesel::insert_into(completed_lectures::table)
            .values(&CompletedLecture {
                id: Uuid::new_v4(),
                progress_id: progress.id,
                sub_section_id,
                completed_at: Utc::now(),
            })
            .on_conflict((
                completed_lectures::progress_id,
                completed_lectures::sub_section_id,
            ))
            .do_nothing()
            .execute(&mut conn)?;

        if inserted == 0 {
            Ok(ProgressOutcome::AlreadyCompleted)
        } else {
            Ok(ProgressOutcome::Recorded)
        }
    }

    /// Derived completion percentage; counts every lecture type.
    pub async fn progress_percentage(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> Result<f64, ApiError> {
        let mut conn = self.db.get()?;

        let section_ids: Vec<Uuid> = sections::table
            .filter(sections::course_id.eq(course_id))
            .select(sections::id)
            .load(&mut conn)?;
        let total: i64 = sub_sections::table
            .filter(sub_sections::section_id.eq_any(&section_ids))
            .count()
            .get_result(&mut conn)?;

        let completed = match find_progress_row(&mut conn, course_id, user_id)? {
            Some(progress) => completed_lectures::table
                .filter(completed_lectures::progress_id.eq(progress.id))
                .count()
                .get_result(&mut conn)?,
            None => 0,
        };

        Ok(percentage(completed, total))
    }

    /// The caller's completed-lecture identifiers for one course; empty
    /// when no progress row exists yet.
    pub async fn completed_lectures_for(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Uuid>, ApiError> {
        let mut conn = self.db.get()?;

        match find_progress_row(&mut conn, course_id, user_id)? {
            Some(progress) => {
                let ids = completed_lectures::table
                    .filter(completed_lectures::progress_id.eq(progress.id))
                    .select(completed_lectures::sub_section_id)
                    .load(&mut conn)?;
                Ok(ids)
            }
            None => Ok(Vec::new()),
        }
    }
}

fn find_progress_row(
    conn: &mut PgConnection,
    course_id: Uuid,
    user_id: Uuid,
) -> Result<Option<CourseProgress>, diesel::result::Error> {
    course_progress::table
        .filter(course_progress::course_id.eq(course_id))
        .filter(course_progress::user_id.eq(user_id))
        .first::<CourseProgress>(conn)
        .optional()
}

/// Insert-if-absent then read back; the unique (course_id, user_id) key
/// collapses concurrent creates into one row.
pub(crate) fn ensure_progress_row(
    conn: &mut PgConnection,
    course_id: Uuid,
    user_id: Uuid,
) -> Result<CourseProgress, diesel::result::Error> {
    diesel::insert_into(course_progress::table)
        .values(&CourseProgress {
            id: Uuid::new_v4(),
            course_id,
            user_id,
            created_at: Utc::now(),
        })
        .on_conflict((course_progress::course_id, course_progress::user_id))
        .do_nothing()
        .execute(conn)?;

    course_progress::table
        .filter(course_progress::course_id.eq(course_id))
        .filter(course_progress::user_id.eq(user_id))
        .first::<CourseProgress>(conn)
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressBody {
    pub course_id: Option<Uuid>,
    pub subsection_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Mark a lecture completed for a student
pub async fn update_progress_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateProgressBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (course_id, subsection_id, user_id) =
        match (body.course_id, body.subsection_id, body.user_id) {
            (Some(course_id), Some(subsection_id), Some(user_id)) => {
                (course_id, subsection_id, user_id)
            }
            _ => return Err(ApiError::Validation("All fields are required".to_string())),
        };

    let engine = ProgressEngine::new(state.conn.clone());
    let outcome = engine
        .update_progress(course_id, subsection_id, user_id)
        .await?;

    let message = match outcome {
        ProgressOutcome::Recorded => "Course progress updated successfully",
        ProgressOutcome::AlreadyCompleted => "Subsection already completed",
    };

    Ok(Json(json!({
        "success": true,
        "message": message
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPercentageBody {
    pub course_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Derived completion percentage for one (course, student) pair
pub async fn get_progress_percentage_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProgressPercentageBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (course_id, user_id) = match (body.course_id, body.user_id) {
        (Some(course_id), Some(user_id)) => (course_id, user_id),
        _ => return Err(ApiError::Validation("All fields are required".to_string())),
    };

    let engine = ProgressEngine::new(state.conn.clone());
    let data = engine.progress_percentage(course_id, user_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

// ============================================================================
// ROUTE CONFIGURATION
// ============================================================================

/// Configure all progress module routes
pub fn configure_progress_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/progress/updateCourseProgress",
            post(update_progress_handler),
        )
        .route(
            "/api/v1/progress/getProgressPercentage",
            post(get_progress_percentage_handler),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    #[test]
    fn test_percentage_rounds_to_two_places() {
        test_util::setup();
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(1, 7), 14.29);
    }

    #[test]
    fn test_percentage_bounds() {
        test_util::setup();
        assert_eq!(percentage(0, 10), 0.0);
        assert_eq!(percentage(10, 10), 100.0);
    }

    #[test]
    fn test_percentage_empty_course_is_zero() {
        test_util::setup();
        assert_eq!(percentage(0, 0), 0.0);
    }
}
