// Database models for AISSAM
use diesel::prelude::*;

use super::schema::*;

/// School-year values accepted at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    First,
    Second,
    Third,
}

impl Grade {
    pub fn parse(value: &str) -> Option<Grade> {
        match value {
            "고1" => Some(Grade::First),
            "고2" => Some(Grade::Second),
            "고3" => Some(Grade::Third),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::First => "고1",
            Grade::Second => "고2",
            Grade::Third => "고3",
        }
    }
}

#[derive(Queryable, Clone, Debug)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub hashed_password: String,   // bcrypt, stored as UTF-8 text
    pub grade: String,             // "고1", "고2", "고3"
    pub created_at: i64,           // Unix timestamp
}

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub hashed_password: &'a str,
    pub grade: &'a str,
    pub created_at: i64,
}

#[derive(Queryable, Clone, Debug)]
pub struct Subject {
    pub id: i32,
    pub name: String,              // 수학, 영어, 국어, 사회탐구, 과학탐구
    pub color: String,             // Hex color code
    pub icon: String,              // Icon name
}

#[derive(Insertable, Debug)]
#[diesel(table_name = subjects)]
pub struct NewSubject<'a> {
    pub name: &'a str,
    pub color: &'a str,
    pub icon: &'a str,
}

#[derive(Queryable, Clone, Debug)]
pub struct ChatSession {
    pub id: i32,
    pub user_id: i32,
    pub subject_id: i32,
    pub title: String,
    pub created_at: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = chat_sessions)]
pub struct NewChatSession<'a> {
    pub user_id: i32,
    pub subject_id: i32,
    pub title: &'a str,
    pub created_at: i64,
}

#[derive(Queryable, Clone, Debug)]
pub struct Message {
    pub id: i32,
    pub session_id: i32,
    pub content: String,
    pub is_user: bool,             // true for student turns, false for AI turns
    pub image_path: Option<String>,
    pub created_at: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub session_id: i32,
    pub content: &'a str,
    pub is_user: bool,
    pub image_path: Option<&'a str>,
    pub created_at: i64,
}

#[derive(Queryable, Clone, Debug)]
pub struct UploadedImage {
    pub id: i32,
    pub session_id: i32,
    pub filename: String,
    pub filepath: String,
    pub created_at: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = uploaded_images)]
pub struct NewUploadedImage<'a> {
    pub session_id: i32,
    pub filename: &'a str,
    pub filepath: &'a str,
    pub created_at: i64,
}
