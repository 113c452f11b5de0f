//! Catalog read side: course listings and resolved content trees.
//!
//! Reads run as plain sequential queries per course, which is fine under
//! the small-catalog assumption this service makes. The public details
//! view strips video URLs; the enrolled ("full") view keeps them and
//! attaches the caller's completed-lecture set.

use std::sync::Arc;

use axum::{extract::State, response::Json};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::types::{
    convert_seconds_to_duration, video_seconds, CategorySummary, CourseSummary, CourseTree,
    InstructorSummary, SectionView, SubSectionView,
};
use super::{categories, courses, enrollments, sections, sub_sections};
use super::{Category, Course, CourseEngine, Section, SubSection};
use crate::progress::ProgressEngine;
use crate::shared::error::ApiError;
use crate::shared::models::{users, User};
use crate::shared::state::AppState;

// ============================================================================
// CATALOG ENGINE OPERATIONS
// ============================================================================

impl CourseEngine {
    /// Every course as a catalog card: projection plus resolved
    /// instructor/category summaries and the enrolled count.
    pub async fn list_all_courses(&self) -> Result<Vec<CourseSummary>, ApiError> {
        let mut conn = self.db.get()?;

        let rows = courses::table
            .order(courses::created_at.desc())
            .load::<Course>(&mut conn)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for course in rows {
            let instructor = instructor_summary(&mut conn, course.instructor_id)?;
            let category = category_summary(&mut conn, course.category_id)?;
            let students_enrolled = enrolled_count(&mut conn, course.id)?;
            summaries.push(CourseSummary {
                id: course.id,
                course_name: course.course_name,
                course_description: course.course_description,
                price: course.price,
                thumbnail: course.thumbnail,
                tag: course.tag,
                status: course.status,
                instructor,
                category,
                students_enrolled,
                created_at: course.created_at,
            });
        }

        Ok(summaries)
    }

    /// Resolves the full containment tree. `include_video` is false for
    /// the public details view (content paywall) and true everywhere
    /// authoring or enrollment already vouches for the caller.
    pub async fn course_tree(
        &self,
        course_id: Uuid,
        include_video: bool,
    ) -> Result<CourseTree, ApiError> {
        let course = self.find_course(course_id).await?;

        let mut conn = self.db.get()?;
        let instructor = instructor_summary(&mut conn, course.instructor_id)?;
        let category = category_summary(&mut conn, course.category_id)?;
        let students_enrolled = enrolled_count(&mut conn, course.id)?;
        let (course_content, total_seconds) = section_views(&mut conn, course_id, include_video)?;

        Ok(CourseTree {
            id: course.id,
            course_name: course.course_name,
            course_description: course.course_description,
            what_you_will_learn: course.what_you_will_learn,
            price: course.price,
            thumbnail: course.thumbnail,
            tag: course.tag,
            instructions: course.instructions,
            status: course.status,
            instructor,
            category,
            course_content,
            students_enrolled,
            total_duration: convert_seconds_to_duration(total_seconds),
            created_at: course.created_at,
            updated_at: course.updated_at,
            completed_videos: None,
        })
    }

    /// The enrolled view: full tree plus the caller's completed-lecture
    /// set (empty when no progress row exists yet).
    pub async fn full_course_details(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> Result<CourseTree, ApiError> {
        let mut tree = self.course_tree(course_id, true).await?;

        let progress = ProgressEngine::new(self.db.clone());
        let completed = progress.completed_lectures_for(course_id, user_id).await?;
        tree.completed_videos = Some(completed);

        Ok(tree)
    }
}

/// Authored courses survive account teardown, so a missing instructor
/// row degrades to a placeholder instead of failing the listing.
fn instructor_summary(
    conn: &mut PgConnection,
    instructor_id: Uuid,
) -> Result<InstructorSummary, diesel::result::Error> {
    let found = users::table
        .find(instructor_id)
        .first::<User>(conn)
        .optional()?;
    Ok(match found {
        Some(user) => user.into(),
        None => InstructorSummary {
            id: instructor_id,
            first_name: "Removed".to_string(),
            last_name: "Instructor".to_string(),
            email: String::new(),
            image: None,
        },
    })
}

fn category_summary(
    conn: &mut PgConnection,
    category_id: Uuid,
) -> Result<CategorySummary, diesel::result::Error> {
    let found = categories::table
        .find(category_id)
        .first::<Category>(conn)
        .optional()?;
    Ok(match found {
        Some(category) => category.into(),
        None => CategorySummary {
            id: category_id,
            name: "Uncategorized".to_string(),
            description: None,
        },
    })
}

fn enrolled_count(
    conn: &mut PgConnection,
    course_id: Uuid,
) -> Result<i64, diesel::result::Error> {
    enrollments::table
        .filter(enrollments::course_id.eq(course_id))
        .count()
        .get_result(conn)
}

/// Sections in position order with their lectures, plus the summed
/// video seconds for the duration readout.
pub(crate) fn section_views(
    conn: &mut PgConnection,
    course_id: Uuid,
    include_video: bool,
) -> Result<(Vec<SectionView>, i64), diesel::result::Error> {
    let section_rows = sections::table
        .filter(sections::course_id.eq(course_id))
        .order(sections::position.asc())
        .load::<Section>(conn)?;

    let mut views = Vec::with_capacity(section_rows.len());
    let mut total_seconds = 0i64;

    for section in section_rows {
        let subs = sub_sections::table
            .filter(sub_sections::section_id.eq(section.id))
            .order(sub_sections::position.asc())
            .load::<SubSection>(conn)?;
        total_seconds += subs.iter().map(video_seconds).sum::<i64>();
        views.push(SectionView {
            id: section.id,
            section_name: section.section_name,
            sub_section: subs
                .into_iter()
                .map(|row| SubSectionView::from_row(row, include_video))
                .collect(),
        });
    }

    Ok((views, total_seconds))
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

/// List every course as a catalog card
pub async fn get_all_courses_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    let data = engine.list_all_courses().await?;

    Ok(Json(json!({
        "success": true,
        "data": data
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetailsBody {
    pub course_id: Option<Uuid>,
}

/// Public course details: full tree without video URLs
pub async fn get_course_details_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CourseDetailsBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let course_id = body
        .course_id
        .ok_or_else(|| ApiError::Validation("All fields are required".to_string()))?;

    let engine = CourseEngine::new(state.conn.clone());
    let tree = engine.course_tree(course_id, false).await?;

    Ok(Json(json!({
        "success": true,
        "data": tree
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullCourseDetailsBody {
    pub course_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Enrolled course details: full tree with video URLs and the caller's
/// completed lectures
pub async fn get_full_course_details_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FullCourseDetailsBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (course_id, user_id) = match (body.course_id, body.user_id) {
        (Some(course_id), Some(user_id)) => (course_id, user_id),
        _ => return Err(ApiError::Validation("All fields are required".to_string())),
    };

    let engine = CourseEngine::new(state.conn.clone());
    let tree = engine.full_course_details(course_id, user_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": tree
    })))
}
