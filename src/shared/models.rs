use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod schema {
    diesel::table! {
        users (id) {
            id -> Uuid,
            first_name -> Text,
            last_name -> Text,
            email -> Text,
            image -> Nullable<Text>,
            role -> Text,
            created_at -> Timestamptz,
        }
    }
}

pub use schema::*;

/// Account rows are written by the outer auth layer; this service reads
/// them for instructor and student summaries and owns only their teardown.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserRole {
    Student,
    Instructor,
    Admin,
}

impl From<&str> for UserRole {
    fn from(value: &str) -> Self {
        match value {
            "Instructor" => Self::Instructor,
            "Admin" => Self::Admin,
            _ => Self::Student,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "Student"),
            Self::Instructor => write!(f, "Instructor"),
            Self::Admin => write!(f, "Admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    #[test]
    fn test_user_role_from_str() {
        test_util::setup();
        assert_eq!(UserRole::from("Instructor"), UserRole::Instructor);
        assert_eq!(UserRole::from("Admin"), UserRole::Admin);
        assert_eq!(UserRole::from("Student"), UserRole::Student);
        assert_eq!(UserRole::from("anything else"), UserRole::Student);
    }

    #[test]
    fn test_user_role_display_round_trip() {
        test_util::setup();
        for role in [UserRole::Student, UserRole::Instructor, UserRole::Admin] {
            assert_eq!(UserRole::from(role.to_string().as_str()), role);
        }
    }
}
