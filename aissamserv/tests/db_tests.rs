use aissamserv::db::{self, DbPool, NewChatSession, NewMessage, NewUser, User};

// ─── Helpers ───

fn open_memory_db() -> DbPool {
    let db = db::init_db(":memory:").expect("open in-memory db");
    db::run_migrations(&db).expect("run migrations");
    db
}

fn add_user(db: &DbPool, email: &str) -> User {
    db::insert_user(
        db,
        NewUser {
            email,
            name: "김학생",
            hashed_password: "$2b$12$abcdefghijklmnopqrstuv",
            grade: "고2",
            created_at: 1_000,
        },
    )
    .expect("insert user")
}

fn add_session(db: &DbPool, user_id: i32, subject_id: i32, title: &str, created_at: i64) -> i32 {
    db::insert_chat_session(
        db,
        NewChatSession {
            user_id,
            subject_id,
            title,
            created_at,
        },
    )
    .expect("insert session")
    .id
}

fn add_message(db: &DbPool, session_id: i32, content: &str, is_user: bool, created_at: i64) -> i32 {
    db::insert_message(
        db,
        NewMessage {
            session_id,
            content,
            is_user,
            image_path: None,
            created_at,
        },
    )
    .expect("insert message")
    .id
}

// ─── Subjects ───

#[test]
fn default_subjects_seed_once() {
    let db = open_memory_db();

    let first = db::ensure_default_subjects(&db).unwrap();
    assert_eq!(first.len(), 5);
    assert_eq!(first[0].name, "수학");
    assert_eq!(first[4].name, "과학탐구");

    let second = db::ensure_default_subjects(&db).unwrap();
    assert_eq!(second.len(), 5);
    let first_ids: Vec<i32> = first.iter().map(|s| s.id).collect();
    let second_ids: Vec<i32> = second.iter().map(|s| s.id).collect();
    assert_eq!(first_ids, second_ids);
}

// ─── Users ───

#[test]
fn duplicate_email_is_rejected() {
    let db = open_memory_db();
    add_user(&db, "dup@example.com");

    let second = db::insert_user(
        &db,
        NewUser {
            email: "dup@example.com",
            name: "다른 학생",
            hashed_password: "$2b$12$abcdefghijklmnopqrstuv",
            grade: "고1",
            created_at: 2_000,
        },
    );
    assert!(second.is_err());

    // The original row is untouched.
    let user = db::find_user_by_email(&db, "dup@example.com").unwrap().unwrap();
    assert_eq!(user.name, "김학생");
}

#[test]
fn find_user_by_id_roundtrips() {
    let db = open_memory_db();
    let user = add_user(&db, "lookup@example.com");
    let found = db::find_user_by_id(&db, user.id).unwrap().unwrap();
    assert_eq!(found.email, "lookup@example.com");
    assert!(db::find_user_by_id(&db, user.id + 999).unwrap().is_none());
}

// ─── Sessions ───

#[test]
fn session_listing_excludes_empty_sessions_and_sorts_newest_first() {
    let db = open_memory_db();
    let subjects = db::ensure_default_subjects(&db).unwrap();
    let user = add_user(&db, "sessions@example.com");

    let old_active = add_session(&db, user.id, subjects[0].id, "오래된 질문", 100);
    let empty = add_session(&db, user.id, subjects[1].id, "빈 세션", 200);
    let new_active = add_session(&db, user.id, subjects[2].id, "새 질문", 300);

    add_message(&db, old_active, "질문", true, 101);
    add_message(&db, old_active, "답변", false, 102);
    add_message(&db, new_active, "질문", true, 301);

    let listed = db::list_sessions_with_activity(&db, user.id).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].0.id, new_active);
    assert_eq!(listed[0].2, 1);
    assert_eq!(listed[1].0.id, old_active);
    assert_eq!(listed[1].2, 2);
    assert!(listed.iter().all(|(s, _, _)| s.id != empty));

    // Joined subject matches the session's subject.
    assert_eq!(listed[1].1.id, subjects[0].id);
}

#[test]
fn session_ownership_is_enforced_in_lookup() {
    let db = open_memory_db();
    let subjects = db::ensure_default_subjects(&db).unwrap();
    let owner = add_user(&db, "owner@example.com");
    let other = add_user(&db, "other@example.com");

    let session = add_session(&db, owner.id, subjects[0].id, "내 세션", 100);

    assert!(db::find_session_for_user(&db, session, owner.id).unwrap().is_some());
    assert!(db::find_session_for_user(&db, session, other.id).unwrap().is_none());
}

// ─── Messages ───

#[test]
fn message_order_is_stable_for_same_second_turns() {
    let db = open_memory_db();
    let subjects = db::ensure_default_subjects(&db).unwrap();
    let user = add_user(&db, "order@example.com");
    let session = add_session(&db, user.id, subjects[0].id, "질문", 100);

    // User and AI turns land within the same second.
    add_message(&db, session, "x^2 풀이는?", true, 500);
    add_message(&db, session, "이렇게 풉니다.", false, 500);
    add_message(&db, session, "더 알려주세요", true, 501);

    let messages = db::list_session_messages(&db, session).unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["x^2 풀이는?", "이렇게 풉니다.", "더 알려주세요"]);

    // Re-fetch yields the identical ordering.
    let again = db::list_session_messages(&db, session).unwrap();
    let again_ids: Vec<i32> = again.iter().map(|m| m.id).collect();
    let ids: Vec<i32> = messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, again_ids);
}

#[test]
fn recent_questions_keep_student_text_turns_only() {
    let db = open_memory_db();
    let subjects = db::ensure_default_subjects(&db).unwrap();
    let user = add_user(&db, "pattern@example.com");
    let session = add_session(&db, user.id, subjects[0].id, "질문", 100);

    for i in 1..=12 {
        add_message(&db, session, &format!("질문 {i}"), true, 100 + i);
        add_message(&db, session, &format!("답변 {i}"), false, 100 + i);
    }
    // Image-only turn carries no text.
    add_message(&db, session, "", true, 200);

    let questions = db::list_recent_user_questions(&db, session, 10).unwrap();
    assert_eq!(questions.len(), 10);
    assert_eq!(questions.first().unwrap(), "질문 3");
    assert_eq!(questions.last().unwrap(), "질문 12");
    assert!(questions.iter().all(|q| !q.starts_with("답변")));
}

#[test]
fn uploaded_image_metadata_is_independent_of_messages() {
    let db = open_memory_db();
    let subjects = db::ensure_default_subjects(&db).unwrap();
    let user = add_user(&db, "image@example.com");
    let session = add_session(&db, user.id, subjects[0].id, "질문", 100);

    db::insert_uploaded_image(
        &db,
        aissamserv::db::NewUploadedImage {
            session_id: session,
            filename: "problem.png",
            filepath: "uploads/20250101_000000_ab12cd34_problem.png",
            created_at: 100,
        },
    )
    .expect("metadata insert");

    // Message flow does not depend on the metadata row existing.
    assert_eq!(db::count_session_messages(&db, session).unwrap(), 0);
}
