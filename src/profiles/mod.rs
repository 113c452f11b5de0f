//! # Profiles Module - Student and Instructor Views
//!
//! Read-side aggregation over accounts:
//! - Student detail and enrolled-course listing with derived progress
//! - Instructor dashboard (enrollment counts and revenue per course)
//! - Admin listings of students and instructors
//! - Account teardown
//!
//! Account rows are created by the outer auth layer; this module reads
//! them and owns only their teardown. Authored courses deliberately
//! survive teardown, the catalog shows a placeholder instructor for
//! them.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
    routing::{delete, get},
    Router,
};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::courses::catalog::section_views;
use crate::courses::types::{
    convert_seconds_to_duration, course_stats, EnrolledCourseView, InstructorCourseStats,
};
use crate::courses::{courses, enrollments, Course};
use crate::progress::{completed_lectures, course_progress, ProgressEngine};
use crate::shared::error::ApiError;
use crate::shared::models::{users, User, UserRole};
use crate::shared::state::AppState;
use crate::shared::utils::DbPool;

// ============================================================================
// PROFILE ENGINE
// ============================================================================

/// Profile engine aggregating per-user course state
pub struct ProfileEngine {
    db: DbPool,
}

impl ProfileEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn user_details(&self, user_id: Uuid) -> Result<User, ApiError> {
        let mut conn = self.db.get()?;
        users::table
            .find(user_id)
            .first::<User>(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    /// Every enrolled course with its content tree, total duration, and
    /// derived progress percentage.
    pub async fn enrolled_courses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<EnrolledCourseView>, ApiError> {
        self.user_details(user_id).await?;

        let course_ids: Vec<Uuid> = {
            let mut conn = self.db.get()?;
            enrollments::table
                .filter(enrollments::user_id.eq(user_id))
                .order(enrollments::enrolled_at.asc())
                .select(enrollments::course_id)
                .load(&mut conn)?
        };

        let progress = ProgressEngine::new(self.db.clone());
        let mut views = Vec::with_capacity(course_ids.len());
        for course_id in course_ids {
            let mut conn = self.db.get()?;
            let course: Option<Course> = courses::table
                .find(course_id)
                .first(&mut conn)
                .optional()?;
            let course = match course {
                Some(course) => course,
                None => {
                    log::warn!("Enrollment references missing course {}", course_id);
                    continue;
                }
            };

            let (course_content, total_seconds) = section_views(&mut conn, course_id, true)?;
            drop(conn);

            let progress_percentage = progress.progress_percentage(course_id, user_id).await?;

            views.push(EnrolledCourseView {
                id: course.id,
                course_name: course.course_name,
                course_description: course.course_description,
                thumbnail: course.thumbnail,
                price: course.price,
                course_content,
                total_duration: convert_seconds_to_duration(total_seconds),
                progress_percentage,
            });
        }

        Ok(views)
    }

    /// Per authored course: enrolled count and revenue (price times
    /// enrollments).
    pub async fn instructor_dashboard(
        &self,
        instructor_id: Uuid,
    ) -> Result<Vec<InstructorCourseStats>, ApiError> {
        self.user_details(instructor_id).await?;

        let mut conn = self.db.get()?;
        let authored = courses::table
            .filter(courses::instructor_id.eq(instructor_id))
            .order(courses::created_at.desc())
            .load::<Course>(&mut conn)?;

        let mut stats = Vec::with_capacity(authored.len());
        for course in authored {
            let enrolled: i64 = enrollments::table
                .filter(enrollments::course_id.eq(course.id))
                .count()
                .get_result(&mut conn)?;
            stats.push(course_stats(&course, enrolled));
        }

        Ok(stats)
    }

    pub async fn all_students(&self) -> Result<Vec<User>, ApiError> {
        self.users_by_role(UserRole::Student).await
    }

    pub async fn all_instructors(&self) -> Result<Vec<User>, ApiError> {
        self.users_by_role(UserRole::Instructor).await
    }

    async fn users_by_role(&self, role: UserRole) -> Result<Vec<User>, ApiError> {
        let mut conn = self.db.get()?;
        let rows = users::table
            .filter(users::role.eq(role.to_string()))
            .order(users::created_at.desc())
            .load::<User>(&mut conn)?;
        Ok(rows)
    }

    /// Removes the account and its learning state in one transaction:
    /// completed lectures, progress rows, enrollments, then the user
    /// row. Authored courses stay.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), ApiError> {
        self.user_details(user_id).await?;

        let mut conn = self.db.get()?;
        conn.transaction::<(), diesel::result::Error, _>(|conn| {
            let progress_ids: Vec<Uuid> = course_progress::table
                .filter(course_progress::user_id.eq(user_id))
                .select(course_progress::id)
                .load(conn)?;
            diesel::delete(
                completed_lectures::table
                    .filter(completed_lectures::progress_id.eq_any(&progress_ids)),
            )
            .execute(conn)?;
            diesel::delete(course_progress::table.filter(course_progress::user_id.eq(user_id)))
                .execute(conn)?;
            diesel::delete(enrollments::table.filter(enrollments::user_id.eq(user_id)))
                .execute(conn)?;
            diesel::delete(users::table.filter(users::id.eq(user_id))).execute(conn)?;
            Ok(())
        })?;

        log::info!("Account {} deleted", user_id);
        Ok(())
    }
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Uuid,
}

/// Fetch one account's details
pub async fn get_user_details_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = ProfileEngine::new(state.conn.clone());
    let user = engine.user_details(query.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": user,
        "message": "User data fetched successfully"
    })))
}

/// Enrolled courses with content trees and progress
pub async fn get_enrolled_courses_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = ProfileEngine::new(state.conn.clone());
    let data = engine.enrolled_courses(query.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorQuery {
    pub instructor_id: Uuid,
}

/// Enrollment counts and revenue per authored course
pub async fn instructor_dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InstructorQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = ProfileEngine::new(state.conn.clone());
    let data = engine.instructor_dashboard(query.instructor_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

/// List every student account
pub async fn get_all_students_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = ProfileEngine::new(state.conn.clone());
    let data = engine.all_students().await?;

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

/// List every instructor account
pub async fn get_all_instructors_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = ProfileEngine::new(state.conn.clone());
    let data = engine.all_instructors().await?;

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProfileBody {
    pub user_id: Uuid,
}

/// Delete an account and its learning state
pub async fn delete_profile_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteProfileBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = ProfileEngine::new(state.conn.clone());
    engine.delete_account(body.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully"
    })))
}

// ============================================================================
// ROUTE CONFIGURATION
// ============================================================================

/// Configure all profile module routes
pub fn configure_profile_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/profile/getUserDetails", get(get_user_details_handler))
        .route(
            "/api/v1/profile/getEnrolledCourses",
            get(get_enrolled_courses_handler),
        )
        .route(
            "/api/v1/profile/instructorDashboard",
            get(instructor_dashboard_handler),
        )
        .route("/api/v1/profile/getAllStudents", get(get_all_students_handler))
        .route(
            "/api/v1/profile/getAllInstructors",
            get(get_all_instructors_handler),
        )
        .route("/api/v1/profile/deleteProfile", delete(delete_profile_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;
    use chrono::Utc;

    #[test]
    fn test_revenue_is_price_times_enrollment() {
        test_util::setup();
        let course = Course {
            id: Uuid::new_v4(),
            course_name: "c".to_string(),
            course_description: "d".to_string(),
            what_you_will_learn: "w".to_string(),
            price: 499.0,
            thumbnail: "t".to_string(),
            tag: json!(["x"]),
            instructions: json!(["y"]),
            instructor_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            status: "Published".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let stats = course_stats(&course, 7);
        assert_eq!(stats.total_students_enrolled, 7);
        assert_eq!(stats.total_amount_generated, 3493.0);

        let empty = course_stats(&course, 0);
        assert_eq!(empty.total_amount_generated, 0.0);
    }
}
