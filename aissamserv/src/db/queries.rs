// Database query functions for all tables
use diesel::prelude::*;

use crate::db::{
    schema::*, ChatSession, DbPool, Message, NewChatSession, NewMessage, NewSubject, NewUploadedImage,
    NewUser, Subject, User,
};

/// The fixed subject catalog, seeded whenever the table is empty.
const DEFAULT_SUBJECTS: [(&str, &str, &str); 5] = [
    ("수학", "#3B82F6", "calculator"),
    ("영어", "#EF4444", "globe"),
    ("국어", "#10B981", "book"),
    ("사회탐구", "#F97316", "building"),
    ("과학탐구", "#8B5CF6", "beaker"),
];

// ==================== USER QUERIES ====================

pub fn insert_user(db: &DbPool, new_user: NewUser) -> Result<User, Box<dyn std::error::Error>> {
    use diesel::insert_into;

    let mut conn = db.lock().unwrap();
    let user = insert_into(users::table)
        .values(&new_user)
        .get_result::<User>(&mut *conn)?;

    Ok(user)
}

pub fn find_user_by_email(db: &DbPool, email: &str) -> Result<Option<User>, Box<dyn std::error::Error>> {
    let mut conn = db.lock().unwrap();
    let result = users::table
        .filter(users::email.eq(email))
        .first::<User>(&mut *conn)
        .optional()?;

    Ok(result)
}

pub fn find_user_by_id(db: &DbPool, user_id: i32) -> Result<Option<User>, Box<dyn std::error::Error>> {
    let mut conn = db.lock().unwrap();
    let result = users::table
        .find(user_id)
        .first::<User>(&mut *conn)
        .optional()?;

    Ok(result)
}

// ==================== SUBJECT QUERIES ====================

pub fn list_subjects(db: &DbPool) -> Result<Vec<Subject>, Box<dyn std::error::Error>> {
    let mut conn = db.lock().unwrap();
    let results = subjects::table
        .order(subjects::id.asc())
        .load::<Subject>(&mut *conn)?;

    Ok(results)
}

pub fn find_subject(db: &DbPool, subject_id: i32) -> Result<Option<Subject>, Box<dyn std::error::Error>> {
    let mut conn = db.lock().unwrap();
    let result = subjects::table
        .find(subject_id)
        .first::<Subject>(&mut *conn)
        .optional()?;

    Ok(result)
}

/// Seed the fixed five-subject catalog when the table is empty, then return
/// the catalog.
pub fn ensure_default_subjects(db: &DbPool) -> Result<Vec<Subject>, Box<dyn std::error::Error>> {
    use diesel::insert_into;

    {
        let mut conn = db.lock().unwrap();
        let count: i64 = subjects::table.count().get_result(&mut *conn)?;
        if count == 0 {
            for (name, color, icon) in DEFAULT_SUBJECTS {
                insert_into(subjects::table)
                    .values(&NewSubject { name, color, icon })
                    .execute(&mut *conn)?;
            }
            tracing::info!("✅ Seeded default subject catalog");
        }
    }

    list_subjects(db)
}

// ==================== CHAT SESSION QUERIES ====================

pub fn insert_chat_session(
    db: &DbPool,
    new_session: NewChatSession,
) -> Result<ChatSession, Box<dyn std::error::Error>> {
    use diesel::insert_into;

    let mut conn = db.lock().unwrap();
    let session = insert_into(chat_sessions::table)
        .values(&new_session)
        .get_result::<ChatSession>(&mut *conn)?;

    Ok(session)
}

/// Fetch a session only if it belongs to the given user.
pub fn find_session_for_user(
    db: &DbPool,
    session_id: i32,
    user_id: i32,
) -> Result<Option<ChatSession>, Box<dyn std::error::Error>> {
    let mut conn = db.lock().unwrap();
    let result = chat_sessions::table
        .filter(chat_sessions::id.eq(session_id))
        .filter(chat_sessions::user_id.eq(user_id))
        .first::<ChatSession>(&mut *conn)
        .optional()?;

    Ok(result)
}

/// A user's sessions joined with their subject, keeping only sessions that
/// have at least one message, newest first, each with its message count.
pub fn list_sessions_with_activity(
    db: &DbPool,
    user_id: i32,
) -> Result<Vec<(ChatSession, Subject, i64)>, Box<dyn std::error::Error>> {
    let mut conn = db.lock().unwrap();
    let rows: Vec<(ChatSession, Subject)> = chat_sessions::table
        .inner_join(subjects::table)
        .filter(chat_sessions::user_id.eq(user_id))
        .order((chat_sessions::created_at.desc(), chat_sessions::id.desc()))
        .load(&mut *conn)?;

    let mut results = Vec::with_capacity(rows.len());
    for (session, subject) in rows {
        let count: i64 = messages::table
            .filter(messages::session_id.eq(session.id))
            .count()
            .get_result(&mut *conn)?;
        if count > 0 {
            results.push((session, subject, count));
        }
    }

    Ok(results)
}

// ==================== MESSAGE QUERIES ====================

pub fn insert_message(db: &DbPool, new_message: NewMessage) -> Result<Message, Box<dyn std::error::Error>> {
    use diesel::insert_into;

    let mut conn = db.lock().unwrap();
    let message = insert_into(messages::table)
        .values(&new_message)
        .get_result::<Message>(&mut *conn)?;

    Ok(message)
}

/// All messages of a session in chronological order. Same-second rows keep
/// insertion order via the id tiebreak.
pub fn list_session_messages(
    db: &DbPool,
    session_id: i32,
) -> Result<Vec<Message>, Box<dyn std::error::Error>> {
    let mut conn = db.lock().unwrap();
    let results = messages::table
        .filter(messages::session_id.eq(session_id))
        .order((messages::created_at.asc(), messages::id.asc()))
        .load::<Message>(&mut *conn)?;

    Ok(results)
}

pub fn count_session_messages(db: &DbPool, session_id: i32) -> Result<i64, Box<dyn std::error::Error>> {
    let mut conn = db.lock().unwrap();
    let count = messages::table
        .filter(messages::session_id.eq(session_id))
        .count()
        .get_result::<i64>(&mut *conn)?;

    Ok(count)
}

/// The student's most recent text questions in a session, oldest first,
/// capped at `limit`. Image-only turns carry no text and are skipped.
pub fn list_recent_user_questions(
    db: &DbPool,
    session_id: i32,
    limit: i64,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut conn = db.lock().unwrap();
    let mut contents: Vec<String> = messages::table
        .filter(messages::session_id.eq(session_id))
        .filter(messages::is_user.eq(true))
        .filter(messages::content.ne(""))
        .order((messages::created_at.desc(), messages::id.desc()))
        .limit(limit)
        .select(messages::content)
        .load(&mut *conn)?;

    contents.reverse();
    Ok(contents)
}

// ==================== UPLOADED IMAGE QUERIES ====================

/// Best-effort metadata row; callers tolerate failure.
pub fn insert_uploaded_image(
    db: &DbPool,
    new_image: NewUploadedImage,
) -> Result<(), Box<dyn std::error::Error>> {
    use diesel::insert_into;

    let mut conn = db.lock().unwrap();
    insert_into(uploaded_images::table)
        .values(&new_image)
        .execute(&mut *conn)?;

    Ok(())
}
