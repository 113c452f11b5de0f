//! # Courses Module - Authoring and Catalog
//!
//! Course marketplace core:
//! - Course management (create/edit/delete with thumbnail assets)
//! - Section and sub-section authoring (video, reading, and quiz lectures)
//! - Category taxonomy with startup seeding
//! - Catalog queries resolving the full course content tree
//!
//! ## Architecture
//!
//! Follows the engine pattern used across the server:
//! - Diesel ORM for database operations
//! - Axum handlers for HTTP routes
//! - Serde for JSON serialization
//! - UUID for unique identifiers
//!
//! Handlers own asset-store orchestration (uploads happen after the
//! request validates, deletes happen after the transaction commits);
//! the engine owns every database touch.

pub mod catalog;
pub mod section_handlers;
pub mod types;

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::assets;
use crate::shared::error::ApiError;
use crate::shared::models::users;
use crate::shared::state::AppState;
use crate::shared::utils::DbPool;
use types::{
    read_form, CreateCourseRequest, EditCourseRequest, UploadedFile,
};

// ============================================================================
// DATABASE SCHEMA
// ============================================================================

diesel::table! {
    categories (id) {
        id -> Uuid,
        name -> Text,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    courses (id) {
        id -> Uuid,
        course_name -> Text,
        course_description -> Text,
        what_you_will_learn -> Text,
        price -> Float8,
        thumbnail -> Text,
        tag -> Jsonb,
        instructions -> Jsonb,
        instructor_id -> Uuid,
        category_id -> Uuid,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    sections (id) {
        id -> Uuid,
        course_id -> Uuid,
        section_name -> Text,
        position -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    sub_sections (id) {
        id -> Uuid,
        section_id -> Uuid,
        title -> Text,
        description -> Text,
        lecture_type -> Text,
        video_url -> Nullable<Text>,
        time_duration -> Nullable<Text>,
        content -> Nullable<Text>,
        external_link -> Nullable<Text>,
        questions -> Nullable<Jsonb>,
        total_questions -> Int4,
        position -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    enrollments (id) {
        id -> Uuid,
        course_id -> Uuid,
        user_id -> Uuid,
        enrolled_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    categories,
    courses,
    sections,
    sub_sections,
    enrollments,
);

// ============================================================================
// DATA MODELS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = categories)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = courses)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub course_name: String,
    pub course_description: String,
    pub what_you_will_learn: String,
    pub price: f64,
    pub thumbnail: String,
    pub tag: serde_json::Value,
    pub instructions: serde_json::Value,
    pub instructor_id: Uuid,
    pub category_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = sections)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    pub course_id: Uuid,
    pub section_name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = sub_sections)]
#[serde(rename_all = "camelCase")]
pub struct SubSection {
    pub id: Uuid,
    pub section_id: Uuid,
    pub title: String,
    pub description: String,
    pub lecture_type: String,
    pub video_url: Option<String>,
    pub time_duration: Option<String>,
    pub content: Option<String>,
    pub external_link: Option<String>,
    pub questions: Option<serde_json::Value>,
    pub total_questions: i32,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = enrollments)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CourseStatus {
    Draft,
    Published,
}

impl From<&str> for CourseStatus {
    fn from(value: &str) -> Self {
        match value {
            "Published" => Self::Published,
            _ => Self::Draft,
        }
    }
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "Draft"),
            Self::Published => write!(f, "Published"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LectureType {
    Video,
    Reading,
    Quiz,
}

impl From<&str> for LectureType {
    fn from(value: &str) -> Self {
        match value {
            "reading" => Self::Reading,
            "quiz" => Self::Quiz,
            _ => Self::Video,
        }
    }
}

impl std::fmt::Display for LectureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Reading => write!(f, "reading"),
            Self::Quiz => write!(f, "quiz"),
        }
    }
}

/// Remote assets released after a course or section delete commits.
#[derive(Debug, Default)]
pub struct CourseAssets {
    pub thumbnail: Option<String>,
    pub videos: Vec<String>,
}

const DEFAULT_CATEGORIES: [(&str, &str); 8] = [
    ("Web Development", "Frontend and backend web technologies"),
    ("Data Science", "Statistics, machine learning, and data tooling"),
    ("Mobile Development", "Native and cross-platform mobile apps"),
    ("Programming Languages", "Language fundamentals and mastery"),
    ("Design & UI/UX", "Interface design and user experience"),
    ("DevOps & Cloud", "Infrastructure, deployment, and operations"),
    ("Database & SQL", "Data modeling and query languages"),
    ("Cybersecurity", "Offensive and defensive security practice"),
];

// ============================================================================
// COURSE ENGINE
// ============================================================================

/// Course engine owning authoring and catalog database operations
pub struct CourseEngine {
    db: DbPool,
}

impl CourseEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    // ----- Category Operations -----

    /// Seeds the default taxonomy on an empty table; later startups are
    /// no-ops.
    pub async fn seed_default_categories(&self) -> Result<usize, ApiError> {
        let mut conn = self.db.get()?;

        let existing: i64 = categories::table.count().get_result(&mut conn)?;
        if existing > 0 {
            return Ok(0);
        }

        let now = Utc::now();
        let rows: Vec<Category> = DEFAULT_CATEGORIES
            .iter()
            .map(|(name, description)| Category {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: Some(description.to_string()),
                created_at: now,
            })
            .collect();

        let inserted = diesel::insert_into(categories::table)
            .values(&rows)
            .on_conflict(categories::name)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(inserted)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let mut conn = self.db.get()?;
        let rows = categories::table
            .order(categories::name.asc())
            .load::<Category>(&mut conn)?;
        Ok(rows)
    }

    pub async fn create_category(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<Category, ApiError> {
        let mut conn = self.db.get()?;
        let category = Category {
            id: Uuid::new_v4(),
            name,
            description,
            created_at: Utc::now(),
        };

        diesel::insert_into(categories::table)
            .values(&category)
            .execute(&mut conn)?;

        Ok(category)
    }

    pub async fn category_exists(&self, category_id: Uuid) -> Result<(), ApiError> {
        let mut conn = self.db.get()?;
        let found = categories::table
            .find(category_id)
            .first::<Category>(&mut conn)
            .optional()?;
        match found {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound("Category not found".to_string())),
        }
    }

    pub async fn instructor_exists(&self, instructor_id: Uuid) -> Result<(), ApiError> {
        let mut conn = self.db.get()?;
        let found: Option<Uuid> = users::table
            .filter(users::id.eq(instructor_id))
            .select(users::id)
            .first(&mut conn)
            .optional()?;
        match found {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound("Instructor not found".to_string())),
        }
    }

    // ----- Course Operations -----

    pub async fn create_course(
        &self,
        req: CreateCourseRequest,
        thumbnail: String,
    ) -> Result<Course, ApiError> {
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            course_name: req.course_name,
            course_description: req.course_description,
            what_you_will_learn: req.what_you_will_learn,
            price: req.price,
            thumbnail,
            tag: json!(req.tag),
            instructions: json!(req.instructions),
            instructor_id: req.instructor_id,
            category_id: req.category_id,
            status: req.status.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.db.get()?;

        diesel::insert_into(courses::table)
            .values(&course)
            .execute(&mut conn)?;

        Ok(course)
    }

    pub async fn find_course(&self, course_id: Uuid) -> Result<Course, ApiError> {
        let mut conn = self.db.get()?;
        courses::table
            .find(course_id)
            .first::<Course>(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))
    }

    pub async fn edit_course(
        &self,
        course_id: Uuid,
        req: EditCourseRequest,
        new_thumbnail: Option<String>,
    ) -> Result<Course, ApiError> {
        self.find_course(course_id).await?;

        if let Some(category_id) = req.category_id {
            self.category_exists(category_id).await?;
        }

        let mut conn = self.db.get()?;

        diesel::update(courses::table.filter(courses::id.eq(course_id)))
            .set(courses::updated_at.eq(Utc::now()))
            .execute(&mut conn)?;

        if let Some(course_name) = req.course_name {
            diesel::update(courses::table.filter(courses::id.eq(course_id)))
                .set(courses::course_name.eq(course_name))
                .execute(&mut conn)?;
        }

        if let Some(course_description) = req.course_description {
            diesel::update(courses::table.filter(courses::id.eq(course_id)))
                .set(courses::course_description.eq(course_description))
                .execute(&mut conn)?;
        }

        if let Some(what_you_will_learn) = req.what_you_will_learn {
            diesel::update(courses::table.filter(courses::id.eq(course_id)))
                .set(courses::what_you_will_learn.eq(what_you_will_learn))
                .execute(&mut conn)?;
        }

        if let Some(price) = req.price {
            diesel::update(courses::table.filter(courses::id.eq(course_id)))
                .set(courses::price.eq(price))
                .execute(&mut conn)?;
        }

        if let Some(tag) = req.tag {
            diesel::update(courses::table.filter(courses::id.eq(course_id)))
                .set(courses::tag.eq(json!(tag)))
                .execute(&mut conn)?;
        }

        if let Some(category_id) = req.category_id {
            diesel::update(courses::table.filter(courses::id.eq(course_id)))
                .set(courses::category_id.eq(category_id))
                .execute(&mut conn)?;
        }

        if let Some(instructions) = req.instructions {
            diesel::update(courses::table.filter(courses::id.eq(course_id)))
                .set(courses::instructions.eq(json!(instructions)))
                .execute(&mut conn)?;
        }

        if let Some(status) = req.status {
            diesel::update(courses::table.filter(courses::id.eq(course_id)))
                .set(courses::status.eq(status.to_string()))
                .execute(&mut conn)?;
        }

        if let Some(thumbnail) = new_thumbnail {
            diesel::update(courses::table.filter(courses::id.eq(course_id)))
                .set(courses::thumbnail.eq(thumbnail))
                .execute(&mut conn)?;
        }

        self.find_course(course_id).await
    }

    /// Deletes the course and everything hanging off it in one
    /// transaction, returning the remote asset URLs for post-commit
    /// cleanup. Enrollments and progress rows go with it.
    pub async fn delete_course(&self, course_id: Uuid) -> Result<CourseAssets, ApiError> {
        use crate::progress::{completed_lectures, course_progress};

        let course = self.find_course(course_id).await?;

        let mut conn = self.db.get()?;
        let assets = conn.transaction::<CourseAssets, diesel::result::Error, _>(|conn| {
            let progress_ids: Vec<Uuid> = course_progress::table
                .filter(course_progress::course_id.eq(course_id))
                .select(course_progress::id)
                .load(conn)?;
            diesel::delete(
                completed_lectures::table
                    .filter(completed_lectures::progress_id.eq_any(&progress_ids)),
            )
            .execute(conn)?;
            diesel::delete(
                course_progress::table.filter(course_progress::course_id.eq(course_id)),
            )
            .execute(conn)?;

            diesel::delete(enrollments::table.filter(enrollments::course_id.eq(course_id)))
                .execute(conn)?;

            let section_ids: Vec<Uuid> = sections::table
                .filter(sections::course_id.eq(course_id))
                .select(sections::id)
                .load(conn)?;
            let videos: Vec<Option<String>> = sub_sections::table
                .filter(sub_sections::section_id.eq_any(&section_ids))
                .select(sub_sections::video_url)
                .load(conn)?;
            diesel::delete(
                sub_sections::table.filter(sub_sections::section_id.eq_any(&section_ids)),
            )
            .execute(conn)?;
            diesel::delete(sections::table.filter(sections::id.eq_any(&section_ids)))
                .execute(conn)?;

            diesel::delete(courses::table.filter(courses::id.eq(course_id))).execute(conn)?;

            Ok(CourseAssets {
                thumbnail: Some(course.thumbnail),
                videos: videos.into_iter().flatten().collect(),
            })
        })?;

        Ok(assets)
    }

    pub async fn instructor_courses(&self, instructor_id: Uuid) -> Result<Vec<Course>, ApiError> {
        let mut conn = self.db.get()?;
        let rows = courses::table
            .filter(courses::instructor_id.eq(instructor_id))
            .order(courses::created_at.desc())
            .load::<Course>(&mut conn)?;
        Ok(rows)
    }
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

/// Uploads one form file to the drive, mapping missing configuration and
/// store failures onto the API error taxonomy.
pub(crate) async fn upload_to_drive(
    state: &AppState,
    file: UploadedFile,
) -> Result<String, ApiError> {
    let client = state
        .drive
        .as_ref()
        .ok_or_else(|| ApiError::Upload("Asset storage is not configured".to_string()))?;
    assets::upload_asset(client, &state.config.drive, &file.file_name, file.data)
        .await
        .map_err(|e| ApiError::Upload(format!("Could not upload asset: {}", e)))
}

/// Best-effort remote deletes once the database transaction is done.
pub(crate) async fn release_assets(state: &AppState, assets_to_drop: CourseAssets) {
    let client = match state.drive.as_ref() {
        Some(client) => client,
        None => return,
    };

    let urls = assets_to_drop
        .thumbnail
        .into_iter()
        .chain(assets_to_drop.videos);
    for url in urls {
        if let Err(e) = assets::delete_asset(client, &state.config.drive, &url).await {
            log::warn!("Failed to delete asset {}: {}", url, e);
        }
    }
}

/// Create a new course from a multipart form carrying the thumbnail
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    multipart: axum::extract::Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut form = read_form(multipart).await;

    let req = CreateCourseRequest::from_form(&form).map_err(ApiError::Validation)?;
    let thumbnail = form
        .take_file("thumbnailImage")
        .ok_or_else(|| ApiError::Validation("All fields are required".to_string()))?;
    assets::validate_image(&thumbnail.file_name, thumbnail.data.len())
        .map_err(ApiError::Validation)?;

    let engine = CourseEngine::new(state.conn.clone());
    engine.category_exists(req.category_id).await?;
    engine.instructor_exists(req.instructor_id).await?;

    let thumbnail_url = upload_to_drive(&state, thumbnail).await?;
    let course = engine.create_course(req, thumbnail_url).await?;

    log::info!("Course {} created by {}", course.id, course.instructor_id);

    Ok(Json(json!({
        "success": true,
        "data": course,
        "message": "Course created successfully"
    })))
}

/// Edit course fields; any subset may be supplied
pub async fn edit_course_handler(
    State(state): State<Arc<AppState>>,
    multipart: axum::extract::Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut form = read_form(multipart).await;

    let (course_id, req) = EditCourseRequest::from_form(&form).map_err(ApiError::Validation)?;

    let new_thumbnail = match form.take_file("thumbnailImage") {
        Some(file) => {
            assets::validate_image(&file.file_name, file.data.len())
                .map_err(ApiError::Validation)?;
            Some(upload_to_drive(&state, file).await?)
        }
        None => None,
    };

    let engine = CourseEngine::new(state.conn.clone());
    engine.edit_course(course_id, req, new_thumbnail).await?;
    let tree = engine.course_tree(course_id, true).await?;

    Ok(Json(json!({
        "success": true,
        "data": tree,
        "message": "Course updated successfully"
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCourseBody {
    pub course_id: Uuid,
}

/// Delete a course, its content tree, enrollments, and progress
pub async fn delete_course_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteCourseBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    let orphaned = engine.delete_course(body.course_id).await?;

    release_assets(&state, orphaned).await;

    log::info!("Course {} deleted", body.course_id);

    Ok(Json(json!({
        "success": true,
        "message": "Course deleted successfully"
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorQuery {
    pub instructor_id: Uuid,
}

/// List courses authored by one instructor, newest first
pub async fn get_instructor_courses_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InstructorQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    let courses = engine.instructor_courses(query.instructor_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": courses
    })))
}

/// List every category
pub async fn show_all_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let engine = CourseEngine::new(state.conn.clone());
    let rows = engine.list_categories().await?;

    Ok(Json(json!({
        "success": true,
        "data": rows
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryBody {
    pub name: String,
    pub description: Option<String>,
}

pub async fn create_category_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCategoryBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("All fields are required".to_string()));
    }

    let engine = CourseEngine::new(state.conn.clone());
    let category = engine
        .create_category(body.name, body.description)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": category,
        "message": "Category created successfully"
    })))
}

// ============================================================================
// ROUTE CONFIGURATION
// ============================================================================

/// Configure all course module routes
pub fn configure_course_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Course authoring
        .route("/api/v1/course/createCourse", post(create_course_handler))
        .route("/api/v1/course/editCourse", post(edit_course_handler))
        .route("/api/v1/course/deleteCourse", delete(delete_course_handler))
        // Catalog reads
        .route("/api/v1/course/getAllCourses", get(catalog::get_all_courses_handler))
        .route(
            "/api/v1/course/getCourseDetails",
            post(catalog::get_course_details_handler),
        )
        .route(
            "/api/v1/course/getFullCourseDetails",
            post(catalog::get_full_course_details_handler),
        )
        .route(
            "/api/v1/course/getInstructorCourses",
            get(get_instructor_courses_handler),
        )
        // Section authoring
        .route("/api/v1/course/addSection", post(section_handlers::add_section_handler))
        .route("/api/v1/course/updateSection", post(section_handlers::update_section_handler))
        .route("/api/v1/course/deleteSection", post(section_handlers::delete_section_handler))
        // Sub-section authoring
        .route("/api/v1/course/addSubSection", post(section_handlers::add_sub_section_handler))
        .route(
            "/api/v1/course/updateSubSection",
            post(section_handlers::update_sub_section_handler),
        )
        .route(
            "/api/v1/course/deleteSubSection",
            post(section_handlers::delete_sub_section_handler),
        )
        // Categories
        .route("/api/v1/course/showAllCategories", get(show_all_categories))
        .route("/api/v1/course/createCategory", post(create_category_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    #[test]
    fn test_course_status_conversion() {
        test_util::setup();
        assert_eq!(CourseStatus::from("Published"), CourseStatus::Published);
        assert_eq!(CourseStatus::from("Draft"), CourseStatus::Draft);
        assert_eq!(CourseStatus::from("anything"), CourseStatus::Draft);
    }

    #[test]
    fn test_course_status_display() {
        test_util::setup();
        assert_eq!(CourseStatus::Draft.to_string(), "Draft");
        assert_eq!(CourseStatus::Published.to_string(), "Published");
    }

    #[test]
    fn test_lecture_type_conversion() {
        test_util::setup();
        assert_eq!(LectureType::from("video"), LectureType::Video);
        assert_eq!(LectureType::from("reading"), LectureType::Reading);
        assert_eq!(LectureType::from("quiz"), LectureType::Quiz);
        assert_eq!(LectureType::from("unknown"), LectureType::Video);
    }

    #[test]
    fn test_lecture_type_display_round_trip() {
        test_util::setup();
        for lecture_type in [LectureType::Video, LectureType::Reading, LectureType::Quiz] {
            assert_eq!(
                LectureType::from(lecture_type.to_string().as_str()),
                lecture_type
            );
        }
    }

    #[test]
    fn test_default_categories_are_unique() {
        test_util::setup();
        let mut names: Vec<&str> = DEFAULT_CATEGORIES.iter().map(|(name, _)| *name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), DEFAULT_CATEGORIES.len());
    }
}
