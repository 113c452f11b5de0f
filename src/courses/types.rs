//! Form payloads, validation, and response shapes for the course surface.
//!
//! Authoring requests arrive as multipart forms (the thumbnail and video
//! travel with the fields), so everything here first lands in a
//! [`FormData`] bag and is then checked into typed requests before any
//! engine call. Validation failures carry the user-facing message.

use std::collections::HashMap;

use axum::extract::Multipart;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Category, Course, CourseStatus, LectureType, SubSection};
use crate::shared::models::User;

// ----- Multipart form intake -----

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str, String> {
        self.value(name)
            .ok_or_else(|| "All fields are required".to_string())
    }

    pub fn required_uuid(&self, name: &str) -> Result<Uuid, String> {
        self.required(name)?
            .parse()
            .map_err(|_| format!("Invalid format for field: {}", name))
    }

    pub fn optional_uuid(&self, name: &str) -> Result<Option<Uuid>, String> {
        match self.value(name) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| format!("Invalid format for field: {}", name)),
            None => Ok(None),
        }
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

pub async fn read_form(mut multipart: Multipart) -> FormData {
    let mut form = FormData::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        if let Some(file_name) = field.file_name() {
            let file_name = file_name.to_string();
            if let Ok(bytes) = field.bytes().await {
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        data: bytes.to_vec(),
                    },
                );
            }
        } else if let Ok(value) = field.text().await {
            form.fields.insert(name, value);
        }
    }
    form
}

// ----- Field-level validation -----

/// Tags and instructions arrive as serialized JSON arrays of strings.
pub fn parse_string_array(name: &str, raw: &str) -> Result<Vec<String>, String> {
    let values: Vec<String> =
        serde_json::from_str(raw).map_err(|_| format!("Invalid format for field: {}", name))?;
    Ok(values)
}

/// Free-course policy: absent, unparsable, or non-positive prices all
/// normalize to 0, never an error.
pub fn normalize_price(raw: Option<&str>) -> f64 {
    raw.and_then(|v| v.parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

/// A single bad question fails the whole batch, naming the offending
/// index so the author can fix it in place.
pub fn validate_questions(raw: &str) -> Result<Vec<QuizQuestion>, String> {
    let questions: Vec<QuizQuestion> =
        serde_json::from_str(raw).map_err(|_| "Invalid format for field: questions".to_string())?;

    if questions.is_empty() {
        return Err("Questions are required for quiz lectures".to_string());
    }

    for (i, q) in questions.iter().enumerate() {
        let valid = !q.question_text.trim().is_empty()
            && q.options.len() >= 2
            && q.correct_answer < q.options.len();
        if !valid {
            return Err(format!("Invalid question format at index {}", i));
        }
    }

    Ok(questions)
}

// ----- Course authoring requests -----

#[derive(Debug, Clone)]
pub struct CreateCourseRequest {
    pub instructor_id: Uuid,
    pub course_name: String,
    pub course_description: String,
    pub what_you_will_learn: String,
    pub price: f64,
    pub tag: Vec<String>,
    pub category_id: Uuid,
    pub instructions: Vec<String>,
    pub status: CourseStatus,
}

impl CreateCourseRequest {
    pub fn from_form(form: &FormData) -> Result<Self, String> {
        let instructor_id = form.required_uuid("instructorId")?;
        let course_name = form.required("courseName")?.to_string();
        let course_description = form.required("courseDescription")?.to_string();
        let what_you_will_learn = form.required("whatYouWillLearn")?.to_string();
        let category_id = form.required_uuid("category")?;

        let tag = parse_string_array("tag", form.required("tag")?)?;
        if tag.is_empty() {
            return Err("Tags are required".to_string());
        }
        let instructions = parse_string_array("instructions", form.required("instructions")?)?;
        if instructions.is_empty() {
            return Err("Instructions are required".to_string());
        }

        Ok(Self {
            instructor_id,
            course_name,
            course_description,
            what_you_will_learn,
            price: normalize_price(form.value("price")),
            tag,
            category_id,
            instructions,
            status: form
                .value("status")
                .map(CourseStatus::from)
                .unwrap_or(CourseStatus::Draft),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditCourseRequest {
    pub course_name: Option<String>,
    pub course_description: Option<String>,
    pub what_you_will_learn: Option<String>,
    pub price: Option<f64>,
    pub tag: Option<Vec<String>>,
    pub category_id: Option<Uuid>,
    pub instructions: Option<Vec<String>>,
    pub status: Option<CourseStatus>,
}

impl EditCourseRequest {
    pub fn from_form(form: &FormData) -> Result<(Uuid, Self), String> {
        let course_id = form.required_uuid("courseId")?;

        let tag = match form.value("tag") {
            Some(raw) => Some(parse_string_array("tag", raw)?),
            None => None,
        };
        let instructions = match form.value("instructions") {
            Some(raw) => Some(parse_string_array("instructions", raw)?),
            None => None,
        };

        let req = Self {
            course_name: form.value("courseName").map(str::to_string),
            course_description: form.value("courseDescription").map(str::to_string),
            what_you_will_learn: form.value("whatYouWillLearn").map(str::to_string),
            price: form.value("price").map(|raw| normalize_price(Some(raw))),
            tag,
            category_id: form.optional_uuid("category")?,
            instructions,
            status: form.value("status").map(CourseStatus::from),
        };

        Ok((course_id, req))
    }
}

// ----- Lecture payloads -----

/// Validated form of a lecture payload before any asset upload. Video
/// still carries raw bytes at this stage; the handler uploads them and
/// converts to [`LectureData`].
#[derive(Debug)]
pub enum LectureForm {
    Video {
        file: UploadedFile,
        time_duration: String,
    },
    Reading {
        content: Option<String>,
        external_link: Option<String>,
    },
    Quiz {
        questions: Vec<QuizQuestion>,
    },
}

impl LectureForm {
    pub fn from_form(
        lecture_type: LectureType,
        form: &mut FormData,
        video_field: &str,
    ) -> Result<Self, String> {
        match lecture_type {
            LectureType::Video => {
                let file = form
                    .take_file(video_field)
                    .ok_or_else(|| "Video file is required".to_string())?;
                let time_duration = form
                    .value("timeDuration")
                    .unwrap_or("0")
                    .to_string();
                Ok(Self::Video {
                    file,
                    time_duration,
                })
            }
            LectureType::Reading => {
                let content = form.value("content").map(str::to_string);
                let external_link = form.value("externalLink").map(str::to_string);
                if content.is_none() && external_link.is_none() {
                    return Err("Reading lectures need content or an external link".to_string());
                }
                Ok(Self::Reading {
                    content,
                    external_link,
                })
            }
            LectureType::Quiz => {
                let raw = form
                    .value("questions")
                    .ok_or_else(|| "Questions are required for quiz lectures".to_string())?;
                Ok(Self::Quiz {
                    questions: validate_questions(raw)?,
                })
            }
        }
    }
}

/// Lecture payload with assets already resolved to URLs; what the engine
/// persists.
#[derive(Debug, Clone)]
pub enum LectureData {
    Video {
        video_url: String,
        time_duration: String,
    },
    Reading {
        content: Option<String>,
        external_link: Option<String>,
    },
    Quiz {
        questions: Vec<QuizQuestion>,
    },
}

impl LectureData {
    pub fn lecture_type(&self) -> LectureType {
        match self {
            Self::Video { .. } => LectureType::Video,
            Self::Reading { .. } => LectureType::Reading,
            Self::Quiz { .. } => LectureType::Quiz,
        }
    }
}

/// Partial sub-section update. When `lecture_type` is set the payload is
/// re-validated from scratch; fields fall back to the stored row only
/// when the type is unchanged.
#[derive(Debug, Clone, Default)]
pub struct SubSectionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub lecture_type: Option<LectureType>,
    pub video_url: Option<String>,
    pub time_duration: Option<String>,
    pub content: Option<String>,
    pub external_link: Option<String>,
    pub questions: Option<Vec<QuizQuestion>>,
}

// ----- Duration formatting -----

/// Human-readable duration from seconds: "2h 5m", "4m 30s", or "45s".
pub fn convert_seconds_to_duration(total_seconds: i64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Only video lectures carry playable time; other types contribute 0
/// even when a stray duration field is present.
pub fn video_seconds(sub_section: &SubSection) -> i64 {
    if LectureType::from(sub_section.lecture_type.as_str()) != LectureType::Video {
        return 0;
    }
    sub_section
        .time_duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .map(|d| d as i64)
        .unwrap_or(0)
}

// ----- Response shapes -----

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image: Option<String>,
}

impl From<User> for InstructorSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            image: user.image,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<Category> for CategorySummary {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
        }
    }
}

/// Catalog projection: no content internals, just what a course card
/// needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: Uuid,
    pub course_name: String,
    pub course_description: String,
    pub price: f64,
    pub thumbnail: String,
    pub tag: serde_json::Value,
    pub status: String,
    pub instructor: InstructorSummary,
    pub category: CategorySummary,
    pub students_enrolled: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSectionView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub lecture_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<serde_json::Value>,
    pub total_questions: i32,
}

impl SubSectionView {
    /// `include_video` is the content paywall: the public details view
    /// strips `videoUrl`, the enrolled view keeps it.
    pub fn from_row(row: SubSection, include_video: bool) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            lecture_type: row.lecture_type,
            video_url: if include_video { row.video_url } else { None },
            time_duration: row.time_duration,
            content: row.content,
            external_link: row.external_link,
            questions: row.questions,
            total_questions: row.total_questions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    pub id: Uuid,
    pub section_name: String,
    pub sub_section: Vec<SubSectionView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTree {
    pub id: Uuid,
    pub course_name: String,
    pub course_description: String,
    pub what_you_will_learn: String,
    pub price: f64,
    pub thumbnail: String,
    pub tag: serde_json::Value,
    pub instructions: serde_json::Value,
    pub status: String,
    pub instructor: InstructorSummary,
    pub category: CategorySummary,
    pub course_content: Vec<SectionView>,
    pub students_enrolled: i64,
    pub total_duration: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_videos: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourseView {
    pub id: Uuid,
    pub course_name: String,
    pub course_description: String,
    pub thumbnail: String,
    pub price: f64,
    pub course_content: Vec<SectionView>,
    pub total_duration: String,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorCourseStats {
    pub id: Uuid,
    pub course_name: String,
    pub course_description: String,
    pub thumbnail: String,
    pub price: f64,
    pub total_students_enrolled: i64,
    pub total_amount_generated: f64,
}

pub fn course_stats(course: &Course, enrolled: i64) -> InstructorCourseStats {
    InstructorCourseStats {
        id: course.id,
        course_name: course.course_name.clone(),
        course_description: course.course_description.clone(),
        thumbnail: course.thumbnail.clone(),
        price: course.price,
        total_students_enrolled: enrolled,
        total_amount_generated: course.price * enrolled as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    #[test]
    fn test_normalize_price() {
        test_util::setup();
        assert_eq!(normalize_price(Some("499.5")), 499.5);
        assert_eq!(normalize_price(Some("0")), 0.0);
        assert_eq!(normalize_price(Some("-10")), 0.0);
        assert_eq!(normalize_price(Some("not a number")), 0.0);
        assert_eq!(normalize_price(None), 0.0);
    }

    #[test]
    fn test_parse_string_array() {
        test_util::setup();
        assert_eq!(
            parse_string_array("tag", r#"["rust","web"]"#).unwrap(),
            vec!["rust".to_string(), "web".to_string()]
        );
        let err = parse_string_array("tag", "rust,web").unwrap_err();
        assert_eq!(err, "Invalid format for field: tag");
    }

    #[test]
    fn test_validate_questions_happy_path() {
        test_util::setup();
        let raw = r#"[
            {"questionText": "2 + 2?", "options": ["3", "4"], "correctAnswer": 1},
            {"questionText": "Capital of France?", "options": ["Paris", "Lyon", "Nice"], "correctAnswer": 0}
        ]"#;
        let questions = validate_questions(raw).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].correct_answer, 1);
    }

    #[test]
    fn test_validate_questions_rejects_bad_entries() {
        test_util::setup();
        let empty = validate_questions("[]").unwrap_err();
        assert_eq!(empty, "Questions are required for quiz lectures");

        let malformed = validate_questions("{").unwrap_err();
        assert_eq!(malformed, "Invalid format for field: questions");

        let one_option =
            r#"[{"questionText": "q", "options": ["only"], "correctAnswer": 0}]"#;
        assert_eq!(
            validate_questions(one_option).unwrap_err(),
            "Invalid question format at index 0"
        );

        let out_of_range = r#"[
            {"questionText": "ok", "options": ["a", "b"], "correctAnswer": 0},
            {"questionText": "bad", "options": ["a", "b"], "correctAnswer": 2}
        ]"#;
        assert_eq!(
            validate_questions(out_of_range).unwrap_err(),
            "Invalid question format at index 1"
        );

        let blank_text = r#"[{"questionText": "  ", "options": ["a", "b"], "correctAnswer": 0}]"#;
        assert_eq!(
            validate_questions(blank_text).unwrap_err(),
            "Invalid question format at index 0"
        );
    }

    #[test]
    fn test_convert_seconds_to_duration() {
        test_util::setup();
        assert_eq!(convert_seconds_to_duration(7500), "2h 5m");
        assert_eq!(convert_seconds_to_duration(3600), "1h 0m");
        assert_eq!(convert_seconds_to_duration(270), "4m 30s");
        assert_eq!(convert_seconds_to_duration(45), "45s");
        assert_eq!(convert_seconds_to_duration(0), "0s");
    }

    #[test]
    fn test_video_seconds_ignores_non_video() {
        test_util::setup();
        let base = SubSection {
            id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            title: "t".to_string(),
            description: "d".to_string(),
            lecture_type: "video".to_string(),
            video_url: Some("http://example/v.mp4".to_string()),
            time_duration: Some("120.9".to_string()),
            content: None,
            external_link: None,
            questions: None,
            total_questions: 0,
            position: 1,
            created_at: Utc::now(),
        };
        assert_eq!(video_seconds(&base), 120);

        let reading = SubSection {
            lecture_type: "reading".to_string(),
            time_duration: Some("500".to_string()),
            ..base.clone()
        };
        assert_eq!(video_seconds(&reading), 0);

        let no_duration = SubSection {
            time_duration: None,
            ..base
        };
        assert_eq!(video_seconds(&no_duration), 0);
    }

    #[test]
    fn test_quiz_question_wire_names() {
        test_util::setup();
        let q = QuizQuestion {
            question_text: "What is ownership?".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_answer: 0,
        };
        let json = serde_json::to_string(&q).unwrap();
        assert!(json.contains("questionText"));
        assert!(json.contains("correctAnswer"));
    }
}
