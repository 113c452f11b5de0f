//! Section and sub-section authoring.
//!
//! Sections order a course's content; sub-sections are the lectures
//! inside them. Ordering uses a per-parent position column assigned at
//! insert. Lecture payloads are validated per type before anything is
//! persisted; video bytes go to the asset store first and only the URL
//! reaches the database.

use std::sync::Arc;

use axum::{extract::State, response::Json};
use chrono::Utc;
use diesel::dsl::max;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::types::{
    read_form, LectureData, LectureForm, SectionView, SubSectionUpdate, SubSectionView,
};
use super::{
    release_assets, sections, sub_sections, upload_to_drive, CourseAssets, CourseEngine,
    LectureType, Section, SubSection,
};
use crate::shared::error::ApiError;
use crate::shared::state::AppState;

// ============================================================================
// SECTION ENGINE OPERATIONS
// ============================================================================

impl CourseEngine {
    pub async fn find_section(&self, section_id: Uuid) -> Result<Section, ApiError> {
        let mut conn = self.db.get()?;
        sections::table
            .find(section_id)
            .first::<Section>(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("Section not found".to_string()))
    }

    pub async fn add_section(
        &self,
        course_id: Uuid,
        section_name: String,
    ) -> Result<Section, ApiError> {
        self.find_course(course_id).await?;

        let mut conn = self.db.get()?;
        let last: Option<i32> = sections::table
            .filter(sections::course_id.eq(course_id))
            .select(max(sections::position))
            .first(&mut conn)?;

        let section = Section {
            id: Uuid::new_v4(),
            course_id,
            section_name,
            position: last.unwrap_or(0) + 1,
            created_at: Utc::now(),
        };

        diesel::insert_into(sections::table)
            .values(&section)
            .execute(&mut conn)?;

        Ok(section)
    }

    pub async fn update_section(
        &self,
        section_id: Uuid,
        section_name: String,
    ) -> Result<Section, ApiError> {
        self.find_section(section_id).await?;

        let mut conn = self.db.get()?;
        diesel::update(sections::table.filter(sections::id.eq(section_id)))
            .set(sections::section_name.eq(section_name))
            .execute(&mut conn)?;

        self.find_section(section_id).await
    }

    /// Drops the section and its lectures in one transaction; returns
    /// the orphaned video URLs for post-commit cleanup.
    pub async fn delete_section(&self, section_id: Uuid) -> Result<CourseAssets, ApiError> {
        self.find_section(section_id).await?;

        let mut conn = self.db.get()?;
        let assets = conn.transaction::<CourseAssets, diesel::result::Error, _>(|conn| {
            let videos: Vec<Option<String>> = sub_sections::table
                .filter(sub_sections::section_id.eq(section_id))
                .select(sub_sections::video_url)
                .load(conn)?;
            diesel::delete(sub_sections::table.filter(sub_sections::section_id.eq(section_id)))
                .execute(conn)?;
            diesel::delete(sections::table.filter(sections::id.eq(section_id))).execute(conn)?;

            Ok(CourseAssets {
                thumbnail: None,
                videos: videos.into_iter().flatten().collect(),
            })
        })?;

        Ok(assets)
    }

    // ----- Sub-section Operations -----

    pub async fn create_sub_section(
        &self,
        section_id: Uuid,
        title: String,
        description: String,
        data: LectureData,
    ) -> Result<SubSection, ApiError> {
        self.find_section(section_id).await?;

        let mut conn = self.db.get()?;
        let last: Option<i32> = sub_sections::table
            .filter(sub_sections::section_id.eq(section_id))
            .select(max(sub_sections::position))
            .first(&mut conn)?;

        let lecture_type = data.lecture_type();
        let (video_url, time_duration, content, external_link, questions, total_questions) =
            match data {
                LectureData::Video {
                    video_url,
                    time_duration,
                } => (Some(video_url), Some(time_duration), None, None, None, 0),
                LectureData::Reading {
                    content,
                    external_link,
                } => (None, None, content, external_link, None, 0),
                LectureData::Quiz { questions } => {
                    let count = questions.len() as i32;
                    (None, None, None, None, Some(json!(questions)), count)
                }
            };

        let row = SubSection {
            id: Uuid::new_v4(),
            section_id,
            title,
            description,
            lecture_type: lecture_type.to_string(),
            video_url,
            time_duration,
            content,
            external_link,
            questions,
            total_questions,
            position: last.unwrap_or(0) + 1,
            created_at: Utc::now(),
        };

        diesel::insert_into(sub_sections::table)
            .values(&row)
            .execute(&mut conn)?;

        Ok(row)
    }

    pub async fn update_sub_section(
        &self,
        sub_section_id: Uuid,
        update: SubSectionUpdate,
    ) -> Result<SubSection, ApiError> {
        let mut conn = self.db.get()?;
        let row: SubSection = sub_sections::table
            .find(sub_section_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("SubSection not found".to_string()))?;

        if let Some(title) = &update.title {
            diesel::update(sub_sections::table.filter(sub_sections::id.eq(sub_section_id)))
                .set(sub_sections::title.eq(title))
                .execute(&mut conn)?;
        }

        if let Some(description) = &update.description {
            diesel::update(sub_sections::table.filter(sub_sections::id.eq(sub_section_id)))
                .set(sub_sections::description.eq(description))
                .execute(&mut conn)?;
        }

        if let Some(new_type) = update.lecture_type {
            let payload = resolve_payload(&row, new_type, &update)?;
            diesel::update(sub_sections::table.filter(sub_sections::id.eq(sub_section_id)))
                .set((
                    sub_sections::lecture_type.eq(payload.lecture_type),
                    sub_sections::video_url.eq(payload.video_url),
                    sub_sections::time_duration.eq(payload.time_duration),
                    sub_sections::content.eq(payload.content),
                    sub_sections::external_link.eq(payload.external_link),
                    sub_sections::questions.eq(payload.questions),
                    sub_sections::total_questions.eq(payload.total_questions),
                ))
                .execute(&mut conn)?;
        } else if let Some(video_url) = &update.video_url {
            // Replacement upload without a type switch only applies to
            // video lectures.
            if LectureType::from(row.lecture_type.as_str()) == LectureType::Video {
                diesel::update(sub_sections::table.filter(sub_sections::id.eq(sub_section_id)))
                    .set(sub_sections::video_url.eq(video_url))
                    .execute(&mut conn)?;
                if let Some(time_duration) = &update.time_duration {
                    diesel::update(
                        sub_sections::table.filter(sub_sections::id.eq(sub_section_id)),
                    )
                    .set(sub_sections::time_duration.eq(time_duration))
                    .execute(&mut conn)?;
                }
            }
        }

        let updated = sub_sections::table
            .find(sub_section_id)
            .first::<SubSection>(&mut conn)?;
        Ok(updated)
    }

    /// Returns the deleted row so the handler can release its video
    /// asset.
    pub async fn delete_sub_section(&self, sub_section_id: Uuid) -> Result<SubSection, ApiError> {
        let mut conn = self.db.get()?;
        let row: SubSection = sub_sections::table
            .find(sub_section_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("SubSection not found".to_string()))?;

        diesel::delete(sub_sections::table.filter(sub_sections::id.eq(sub_section_id)))
            .execute(&mut conn)?;

        Ok(row)
    }

    /// One section with its lectures in position order; authoring
    /// responses always include video URLs.
    pub async fn section_view(&self, section_id: Uuid) -> Result<SectionView, ApiError> {
        let section = self.find_section(section_id).await?;

        let mut conn = self.db.get()?;
        let rows = sub_sections::table
            .filter(sub_sections::section_id.eq(section_id))
            .order(sub_sections::position.asc())
            .load::<SubSection>(&mut conn)?;

        Ok(SectionView {
            id: section.id,
            section_name: section.section_name,
            sub_section: rows
                .into_iter()
                .map(|row| SubSectionView::from_row(row, true))
                .collect(),
        })
    }
}

/// Effective payload columns after a lecture-type update. The payload is
/// re-validated from scratch; stored values only carry over when the
/// type is unchanged.
#[derive(Debug)]
struct PayloadColumns {
    lecture_type: String,
    video_url: Option<String>,
    time_duration: Option<String>,
    content: Option<String>,
    external_link: Option<String>,
    questions: Option<serde_json::Value>,
    total_questions: i32,
}

fn resolve_payload(
    row: &SubSection,
    new_type: LectureType,
    update: &SubSectionUpdate,
) -> Result<PayloadColumns, ApiError> {
    let same_type = LectureType::from(row.lecture_type.as_str()) == new_type;

    match new_type {
        LectureType::Video => {
            let video_url = update
                .video_url
                .clone()
                .or_else(|| if same_type { row.video_url.clone() } else { None })
                .ok_or_else(|| ApiError::Validation("Video file is required".to_string()))?;
            let time_duration = update
                .time_duration
                .clone()
                .or_else(|| {
                    if same_type {
                        row.time_duration.clone()
                    } else {
                        None
                    }
                })
                .unwrap_or_else(|| "0".to_string());
            Ok(PayloadColumns {
                lecture_type: new_type.to_string(),
                video_url: Some(video_url),
                time_duration: Some(time_duration),
                content: None,
                external_link: None,
                questions: None,
                total_questions: 0,
            })
        }
        LectureType::Reading => {
            let content = update
                .content
                .clone()
                .or_else(|| if same_type { row.content.clone() } else { None });
            let external_link = update.external_link.clone().or_else(|| {
                if same_type {
                    row.external_link.clone()
                } else {
                    None
                }
            });
            if content.is_none() && external_link.is_none() {
                return Err(ApiError::Validation(
                    "Reading lectures need content or an external link".to_string(),
                ));
            }
            Ok(PayloadColumns {
                lecture_type: new_type.to_string(),
                video_url: None,
                time_duration: None,
                content,
                external_link,
                questions: None,
                total_questions: 0,
            })
        }
        LectureType::Quiz => {
            let (questions, total_questions) = match &update.questions {
                Some(questions) => (json!(questions), questions.len() as i32),
                None if same_type => {
                    let existing = row.questions.clone().ok_or_else(|| {
                        ApiError::Validation(
                            "Questions are required for quiz lectures".to_string(),
                        )
                    })?;
                    (existing, row.total_questions)
                }
                None => {
                    return Err(ApiError::Validation(
                        "Questions are required for quiz lectures".to_string(),
                    ))
                }
            };
            Ok(PayloadColumns {
                lecture_type: new_type.to_string(),
                video_url: None,
                time_duration: None,
                content: None,
                external_link: None,
                questions: Some(questions),
                total_questions,
            })
        }
    }
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSectionBody {
    pub course_id: Option<Uuid>,
    pub section_name: Option<String>,
}

/// Add a section to a course
pub async fn add_section_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddSectionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (course_id, section_name) = match (body.course_id, body.section_name) {
        (Some(course_id), Some(name)) if !name.trim().is_empty() => (course_id, name),
        _ => return Err(ApiError::Validation("All fields are required".to_string())),
    };

    let engine = CourseEngine::new(state.conn.clone());
    engine.add_section(course_id, section_name).await?;
    let tree = engine.course_tree(course_id, true).await?;

    Ok(Json(json!({
        "success": true,
        "data": tree,
        "message": "Section created successfully"
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSectionBody {
    pub course_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub section_name: Option<String>,
}

/// Rename a section
pub async fn update_section_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateSectionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (course_id, section_id, section_name) =
        match (body.course_id, body.section_id, body.section_name) {
            (Some(course_id), Some(section_id), Some(name)) if !name.trim().is_empty() => {
                (course_id, section_id, name)
            }
            _ => return Err(ApiError::Validation("All fields are required".to_string())),
        };

    let engine = CourseEngine::new(state.conn.clone());
    engine.update_section(section_id, section_name).await?;
    let tree = engine.course_tree(course_id, true).await?;

    Ok(Json(json!({
        "success": true,
        "data": tree,
        "message": "Section updated successfully"
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSectionBody {
    pub course_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
}

/// Delete a section and its lectures
pub async fn delete_section_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteSectionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (course_id, section_id) = match (body.course_id, body.section_id) {
        (Some(course_id), Some(section_id)) => (course_id, section_id),
        _ => return Err(ApiError::Validation("All fields are required".to_string())),
    };

    let engine = CourseEngine::new(state.conn.clone());
    let orphaned = engine.delete_section(section_id).await?;
    release_assets(&state, orphaned).await;

    let tree = engine.course_tree(course_id, true).await?;

    Ok(Json(json!({
        "success": true,
        "data": tree,
        "message": "Section deleted successfully"
    })))
}

/// Add a lecture to a section; payload shape depends on `lectureType`
pub async fn add_sub_section_handler(
    State(state): State<Arc<AppState>>,
    multipart: axum::extract::Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut form = read_form(multipart).await;

    let section_id = form.required_uuid("sectionId").map_err(ApiError::Validation)?;
    let title = form
        .required("title")
        .map_err(ApiError::Validation)?
        .to_string();
    let description = form
        .required("description")
        .map_err(ApiError::Validation)?
        .to_string();
    let lecture_type = LectureType::from(
        form.required("lectureType").map_err(ApiError::Validation)?,
    );

    let lecture_form =
        LectureForm::from_form(lecture_type, &mut form, "video").map_err(ApiError::Validation)?;

    let data = match lecture_form {
        LectureForm::Video {
            file,
            time_duration,
        } => {
            let video_url = upload_to_drive(&state, file).await?;
            LectureData::Video {
                video_url,
                time_duration,
            }
        }
        LectureForm::Reading {
            content,
            external_link,
        } => LectureData::Reading {
            content,
            external_link,
        },
        LectureForm::Quiz { questions } => LectureData::Quiz { questions },
    };

    let engine = CourseEngine::new(state.conn.clone());
    engine
        .create_sub_section(section_id, title, description, data)
        .await?;
    let section = engine.section_view(section_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": section,
        "message": "SubSection created successfully"
    })))
}

/// Update a lecture; supplying `lectureType` re-validates the payload
pub async fn update_sub_section_handler(
    State(state): State<Arc<AppState>>,
    multipart: axum::extract::Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut form = read_form(multipart).await;

    let sub_section_id = form
        .required_uuid("subSectionId")
        .map_err(ApiError::Validation)?;
    let lecture_type = form.value("lectureType").map(LectureType::from);

    let questions = match form.value("questions") {
        Some(raw) => Some(
            super::types::validate_questions(raw).map_err(ApiError::Validation)?,
        ),
        None => None,
    };

    let video_url = match form.take_file("videoFile") {
        Some(file) => Some(upload_to_drive(&state, file).await?),
        None => None,
    };

    let update = SubSectionUpdate {
        title: form.value("title").map(str::to_string),
        description: form.value("description").map(str::to_string),
        lecture_type,
        video_url,
        time_duration: form.value("timeDuration").map(str::to_string),
        content: form.value("content").map(str::to_string),
        external_link: form.value("externalLink").map(str::to_string),
        questions,
    };

    let engine = CourseEngine::new(state.conn.clone());
    let updated = engine.update_sub_section(sub_section_id, update).await?;
    let section = engine.section_view(updated.section_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": section,
        "message": "SubSection updated successfully"
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSubSectionBody {
    pub section_id: Option<Uuid>,
    pub sub_section_id: Option<Uuid>,
}

/// Delete a lecture
pub async fn delete_sub_section_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteSubSectionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (section_id, sub_section_id) = match (body.section_id, body.sub_section_id) {
        (Some(section_id), Some(sub_section_id)) => (section_id, sub_section_id),
        _ => return Err(ApiError::Validation("All fields are required".to_string())),
    };

    let engine = CourseEngine::new(state.conn.clone());
    let removed = engine.delete_sub_section(sub_section_id).await?;

    if let Some(video_url) = removed.video_url {
        release_assets(
            &state,
            CourseAssets {
                thumbnail: None,
                videos: vec![video_url],
            },
        )
        .await;
    }

    let section = engine.section_view(section_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": section,
        "message": "SubSection deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    fn video_row() -> SubSection {
        SubSection {
            id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            title: "Intro".to_string(),
            description: "d".to_string(),
            lecture_type: "video".to_string(),
            video_url: Some("http://drive/old.mp4".to_string()),
            time_duration: Some("120".to_string()),
            content: None,
            external_link: None,
            questions: None,
            total_questions: 0,
            position: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_same_type_update_keeps_stored_video() {
        test_util::setup();
        let row = video_row();
        let update = SubSectionUpdate {
            lecture_type: Some(LectureType::Video),
            ..Default::default()
        };
        let payload = resolve_payload(&row, LectureType::Video, &update).unwrap();
        assert_eq!(payload.video_url.as_deref(), Some("http://drive/old.mp4"));
        assert_eq!(payload.time_duration.as_deref(), Some("120"));
    }

    #[test]
    fn test_new_upload_replaces_stored_video() {
        test_util::setup();
        let row = video_row();
        let update = SubSectionUpdate {
            lecture_type: Some(LectureType::Video),
            video_url: Some("http://drive/new.mp4".to_string()),
            time_duration: Some("300".to_string()),
            ..Default::default()
        };
        let payload = resolve_payload(&row, LectureType::Video, &update).unwrap();
        assert_eq!(payload.video_url.as_deref(), Some("http://drive/new.mp4"));
        assert_eq!(payload.time_duration.as_deref(), Some("300"));
    }

    #[test]
    fn test_switch_to_video_requires_upload() {
        test_util::setup();
        let mut row = video_row();
        row.lecture_type = "reading".to_string();
        row.video_url = None;
        row.content = Some("text".to_string());

        let update = SubSectionUpdate {
            lecture_type: Some(LectureType::Video),
            ..Default::default()
        };
        let err = resolve_payload(&row, LectureType::Video, &update).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_switch_to_reading_clears_video_columns() {
        test_util::setup();
        let row = video_row();
        let update = SubSectionUpdate {
            lecture_type: Some(LectureType::Reading),
            content: Some("read me".to_string()),
            ..Default::default()
        };
        let payload = resolve_payload(&row, LectureType::Reading, &update).unwrap();
        assert_eq!(payload.lecture_type, "reading");
        assert!(payload.video_url.is_none());
        assert!(payload.time_duration.is_none());
        assert_eq!(payload.content.as_deref(), Some("read me"));
    }

    #[test]
    fn test_switch_to_reading_requires_content_or_link() {
        test_util::setup();
        let row = video_row();
        let update = SubSectionUpdate {
            lecture_type: Some(LectureType::Reading),
            ..Default::default()
        };
        let err = resolve_payload(&row, LectureType::Reading, &update).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_switch_to_quiz_requires_questions() {
        test_util::setup();
        let row = video_row();
        let update = SubSectionUpdate {
            lecture_type: Some(LectureType::Quiz),
            ..Default::default()
        };
        let err = resolve_payload(&row, LectureType::Quiz, &update).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_quiz_update_counts_questions() {
        test_util::setup();
        let row = video_row();
        let update = SubSectionUpdate {
            lecture_type: Some(LectureType::Quiz),
            questions: Some(vec![
                super::super::types::QuizQuestion {
                    question_text: "q1".to_string(),
                    options: vec!["a".to_string(), "b".to_string()],
                    correct_answer: 0,
                },
                super::super::types::QuizQuestion {
                    question_text: "q2".to_string(),
                    options: vec!["a".to_string(), "b".to_string()],
                    correct_answer: 1,
                },
            ]),
            ..Default::default()
        };
        let payload = resolve_payload(&row, LectureType::Quiz, &update).unwrap();
        assert_eq!(payload.total_questions, 2);
        assert!(payload.questions.is_some());
    }
}
