use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use chrono::{Local, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use aissam::auth::{self, TokenService};
use aissam::tutor;

use crate::ai::AiService;
use crate::db::{self, DbPool, Grade, NewChatSession, NewMessage, NewUploadedImage, NewUser};
use crate::media::{self, MediaStore};

// ==================== REQUEST / RESPONSE TYPES ====================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub grade: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub grade: String,
}

impl UserResponse {
    fn from_user(user: &db::User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            grade: user.grade.clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String, // Email address
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Serialize)]
pub struct SubjectResponse {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub icon: String,
}

impl SubjectResponse {
    fn from_subject(subject: &db::Subject) -> Self {
        SubjectResponse {
            id: subject.id,
            name: subject.name.clone(),
            color: subject.color.clone(),
            icon: subject.icon.clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct ChatSessionRequest {
    pub subject_id: i32,
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct ChatSessionResponse {
    pub id: i32,
    pub user_id: i32,
    pub subject_id: i32,
    pub subject: SubjectResponse,
    pub title: String,
    pub message_count: i64,
    pub created_at: i64,
}

impl ChatSessionResponse {
    fn new(session: &db::ChatSession, subject: &db::Subject, message_count: i64) -> Self {
        ChatSessionResponse {
            id: session.id,
            user_id: session.user_id,
            subject_id: session.subject_id,
            subject: SubjectResponse::from_subject(subject),
            title: session.title.clone(),
            message_count,
            created_at: session.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub id: i32,
    pub session_id: i32,
    pub content: String,
    pub is_user: bool,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub created_at: i64,
}

#[derive(Serialize)]
pub struct AnalysisResponse {
    pub analysis: String,
}

// ==================== HELPERS ====================

fn detail(status: actix_web::http::StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "detail": message }))
}

fn bad_request(message: &str) -> HttpResponse {
    detail(actix_web::http::StatusCode::BAD_REQUEST, message)
}

fn unauthorized(message: &str) -> HttpResponse {
    detail(actix_web::http::StatusCode::UNAUTHORIZED, message)
}

fn not_found(message: &str) -> HttpResponse {
    detail(actix_web::http::StatusCode::NOT_FOUND, message)
}

fn internal_error(message: &str) -> HttpResponse {
    detail(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, message)
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the caller from the bearer token. Invalid and expired tokens are
/// both rejected with 401.
fn authenticate(req: &HttpRequest, tokens: &TokenService, db: &DbPool) -> Result<db::User, HttpResponse> {
    let token = match bearer_token(req) {
        Some(t) => t,
        None => return Err(unauthorized("Not authenticated")),
    };

    let user_id = match tokens.resolve(token) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!("Token rejected: {}", e);
            let status = actix_web::http::StatusCode::from_u16(e.status_code())
                .unwrap_or(actix_web::http::StatusCode::UNAUTHORIZED);
            return Err(detail(status, &e.to_string()));
        }
    };

    match db::find_user_by_id(db, user_id) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(unauthorized("User no longer exists")),
        Err(e) => {
            tracing::error!("Failed to load user {}: {:?}", user_id, e);
            Err(internal_error("Internal server error"))
        }
    }
}

fn message_response(message: &db::Message, media: &MediaStore) -> MessageResponse {
    let file_name = message
        .image_path
        .as_deref()
        .map(media::file_name_of);

    MessageResponse {
        id: message.id,
        session_id: message.session_id,
        content: message.content.clone(),
        is_user: message.is_user,
        image_path: file_name.map(MediaStore::relative_url),
        image_url: file_name.map(|n| media.public_url(n)),
        created_at: message.created_at,
    }
}

// ==================== HANDLERS ====================

pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "message": "AISSAM API is running" }))
}

pub async fn register(db: web::Data<DbPool>, body: web::Json<RegisterRequest>) -> HttpResponse {
    let email = body.email.trim();
    let name = body.name.trim();

    if !email.contains('@') || !email.contains('.') {
        return bad_request("Invalid email address");
    }
    if name.is_empty() {
        return bad_request("Name is required");
    }
    if body.password.chars().count() < 8 {
        return bad_request("Password must be at least 8 characters");
    }
    let grade = match Grade::parse(body.grade.trim()) {
        Some(g) => g,
        None => return bad_request("Invalid grade"),
    };

    match db::find_user_by_email(&db, email) {
        Ok(Some(_)) => return bad_request("Email already registered"),
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Failed to check for existing user: {:?}", e);
            return internal_error("Failed to create user");
        }
    }

    let hashed_password = match auth::hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Password hashing failed: {:?}", e);
            return internal_error("Failed to create user");
        }
    };

    let new_user = NewUser {
        email,
        name,
        hashed_password: &hashed_password,
        grade: grade.as_str(),
        created_at: Utc::now().timestamp(),
    };

    match db::insert_user(&db, new_user) {
        Ok(user) => {
            tracing::info!("✅ User registered: {}", user.email);
            HttpResponse::Ok().json(UserResponse::from_user(&user))
        }
        Err(e) => {
            tracing::error!("Failed to create user: {:?}", e);
            internal_error("Failed to create user")
        }
    }
}

pub async fn login(
    db: web::Data<DbPool>,
    tokens: web::Data<TokenService>,
    form: web::Form<LoginForm>,
) -> HttpResponse {
    let user = match db::find_user_by_email(&db, form.username.trim()) {
        Ok(Some(user)) if auth::verify_password(&form.password, &user.hashed_password) => user,
        Ok(_) => {
            return HttpResponse::Unauthorized()
                .insert_header((header::WWW_AUTHENTICATE, "Bearer"))
                .json(serde_json::json!({ "detail": "Incorrect email or password" }));
        }
        Err(e) => {
            tracing::error!("Failed to look up user for login: {:?}", e);
            return internal_error("Internal server error");
        }
    };

    match tokens.issue(user.id) {
        Ok(access_token) => HttpResponse::Ok().json(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        }),
        Err(e) => {
            tracing::error!("Failed to issue token: {}", e);
            internal_error("Internal server error")
        }
    }
}

pub async fn me(req: HttpRequest, db: web::Data<DbPool>, tokens: web::Data<TokenService>) -> HttpResponse {
    match authenticate(&req, &tokens, &db) {
        Ok(user) => HttpResponse::Ok().json(UserResponse::from_user(&user)),
        Err(resp) => resp,
    }
}

pub async fn subjects(db: web::Data<DbPool>) -> HttpResponse {
    match db::ensure_default_subjects(&db) {
        Ok(subjects) => HttpResponse::Ok().json(
            subjects
                .iter()
                .map(SubjectResponse::from_subject)
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            tracing::error!("Failed to load subjects: {:?}", e);
            internal_error("Internal server error")
        }
    }
}

pub async fn create_chat_session(
    req: HttpRequest,
    db: web::Data<DbPool>,
    tokens: web::Data<TokenService>,
    body: web::Json<ChatSessionRequest>,
) -> HttpResponse {
    let user = match authenticate(&req, &tokens, &db) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let subject = match db::find_subject(&db, body.subject_id) {
        Ok(Some(subject)) => subject,
        Ok(None) => return bad_request("Invalid subject"),
        Err(e) => {
            tracing::error!("Failed to load subject {}: {:?}", body.subject_id, e);
            return internal_error("Internal server error");
        }
    };

    let title = match body.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => format!("{} 질문", Local::now().format("%Y-%m-%d %H:%M")),
    };

    let new_session = NewChatSession {
        user_id: user.id,
        subject_id: subject.id,
        title: &title,
        created_at: Utc::now().timestamp(),
    };

    match db::insert_chat_session(&db, new_session) {
        Ok(session) => {
            tracing::info!("✅ Chat session {} created for user {}", session.id, user.id);
            HttpResponse::Ok().json(ChatSessionResponse::new(&session, &subject, 0))
        }
        Err(e) => {
            tracing::error!("Failed to create chat session: {:?}", e);
            internal_error("Internal server error")
        }
    }
}

pub async fn list_chat_sessions(
    req: HttpRequest,
    db: web::Data<DbPool>,
    tokens: web::Data<TokenService>,
) -> HttpResponse {
    let user = match authenticate(&req, &tokens, &db) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match db::list_sessions_with_activity(&db, user.id) {
        Ok(rows) => HttpResponse::Ok().json(
            rows.iter()
                .map(|(session, subject, count)| ChatSessionResponse::new(session, subject, *count))
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            tracing::error!("Failed to list sessions for user {}: {:?}", user.id, e);
            internal_error("Internal server error")
        }
    }
}

pub async fn get_chat_session(
    req: HttpRequest,
    db: web::Data<DbPool>,
    tokens: web::Data<TokenService>,
    path: web::Path<i32>,
) -> HttpResponse {
    let user = match authenticate(&req, &tokens, &db) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let session_id = path.into_inner();

    let session = match db::find_session_for_user(&db, session_id, user.id) {
        Ok(Some(session)) => session,
        Ok(None) => return not_found("Chat session not found"),
        Err(e) => {
            tracing::error!("Failed to load session {}: {:?}", session_id, e);
            return internal_error("Internal server error");
        }
    };

    let subject = match db::find_subject(&db, session.subject_id) {
        Ok(Some(subject)) => subject,
        Ok(None) => {
            tracing::error!("Session {} references missing subject {}", session.id, session.subject_id);
            return internal_error("Internal server error");
        }
        Err(e) => {
            tracing::error!("Failed to load subject {}: {:?}", session.subject_id, e);
            return internal_error("Internal server error");
        }
    };

    match db::count_session_messages(&db, session.id) {
        Ok(count) => HttpResponse::Ok().json(ChatSessionResponse::new(&session, &subject, count)),
        Err(e) => {
            tracing::error!("Failed to count messages for session {}: {:?}", session.id, e);
            internal_error("Internal server error")
        }
    }
}

/// Pull `message_text` and the optional `image` file out of the multipart
/// form.
async fn read_message_form(
    mut payload: Multipart,
) -> Result<(Option<String>, Option<(String, Vec<u8>)>), actix_multipart::MultipartError> {
    let mut text: Option<String> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let file_name = disposition.get_filename().map(|s| s.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            data.extend_from_slice(&chunk?);
        }

        match name.as_str() {
            "message_text" => text = Some(String::from_utf8_lossy(&data).into_owned()),
            "image" => {
                if let Some(file_name) = file_name {
                    if !data.is_empty() {
                        upload = Some((file_name, data));
                    }
                }
            }
            _ => {}
        }
    }

    Ok((text, upload))
}

pub async fn post_message(
    req: HttpRequest,
    db: web::Data<DbPool>,
    tokens: web::Data<TokenService>,
    ai: web::Data<AiService>,
    media: web::Data<MediaStore>,
    path: web::Path<i32>,
    payload: Multipart,
) -> HttpResponse {
    let user = match authenticate(&req, &tokens, &db) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let session_id = path.into_inner();

    let session = match db::find_session_for_user(&db, session_id, user.id) {
        Ok(Some(session)) => session,
        Ok(None) => return not_found("Chat session not found"),
        Err(e) => {
            tracing::error!("Failed to load session {}: {:?}", session_id, e);
            return internal_error("Internal server error");
        }
    };

    let (text, upload) = match read_message_form(payload).await {
        Ok(parts) => parts,
        Err(e) => {
            tracing::warn!("Malformed multipart payload: {}", e);
            return bad_request("Invalid message payload");
        }
    };

    let content = text.unwrap_or_default();
    if content.trim().is_empty() && upload.is_none() {
        return bad_request("Message text or image required");
    }

    // Store the attachment first; its metadata row is best-effort and never
    // blocks the message flow.
    let stored = match &upload {
        Some((original_name, bytes)) => match media.store(bytes, original_name) {
            Ok(stored) => {
                let metadata = NewUploadedImage {
                    session_id: session.id,
                    filename: original_name.as_str(),
                    filepath: &stored.relative_path,
                    created_at: Utc::now().timestamp(),
                };
                if let Err(e) = db::insert_uploaded_image(&db, metadata) {
                    tracing::warn!("⚠️ Failed to record image metadata: {:?}", e);
                }
                Some(stored)
            }
            Err(e) => {
                tracing::error!("Failed to store upload: {}", e);
                return internal_error("Failed to store image");
            }
        },
        None => None,
    };

    // History read before the new turn lands: the transcript covers prior
    // messages only.
    let history = match db::list_session_messages(&db, session.id) {
        Ok(messages) => messages
            .into_iter()
            .map(|m| tutor::TranscriptEntry::new(m.content, m.is_user))
            .collect::<Vec<_>>(),
        Err(e) => {
            tracing::error!("Failed to load history for session {}: {:?}", session.id, e);
            return internal_error("Internal server error");
        }
    };

    let image_path = stored.as_ref().map(|s| s.relative_path.clone());
    let new_message = NewMessage {
        session_id: session.id,
        content: &content,
        is_user: true,
        image_path: image_path.as_deref(),
        created_at: Utc::now().timestamp(),
    };
    let user_message = match db::insert_message(&db, new_message) {
        Ok(message) => message,
        Err(e) => {
            tracing::error!("Failed to persist user message: {:?}", e);
            return internal_error("Internal server error");
        }
    };

    let subject = match db::find_subject(&db, session.subject_id) {
        Ok(Some(subject)) => subject,
        Ok(None) | Err(_) => {
            tracing::error!("Session {} references missing subject {}", session.id, session.subject_id);
            return internal_error("Internal server error");
        }
    };
    let subject_kind = tutor::Subject::resolve(&subject.name);

    let inline = stored
        .as_ref()
        .and_then(|s| media.prepare_for_model(&s.file_name));

    // Model failures surface as substitute reply text, never as an HTTP
    // error; the turn completes and is stored either way.
    let reply = ai
        .generate_reply(subject_kind, &user_message.content, &history, inline)
        .await;

    let ai_row = NewMessage {
        session_id: session.id,
        content: &reply,
        is_user: false,
        image_path: None,
        created_at: Utc::now().timestamp(),
    };
    let ai_message = match db::insert_message(&db, ai_row) {
        Ok(message) => message,
        Err(e) => {
            tracing::error!("Failed to persist AI message: {:?}", e);
            return internal_error("Internal server error");
        }
    };

    let image_url = stored.as_ref().map(|s| media.public_url(&s.file_name));
    HttpResponse::Ok().json(MessageResponse {
        id: ai_message.id,
        session_id: ai_message.session_id,
        content: ai_message.content,
        is_user: ai_message.is_user,
        image_path: ai_message.image_path,
        image_url,
        created_at: ai_message.created_at,
    })
}

pub async fn list_messages(
    req: HttpRequest,
    db: web::Data<DbPool>,
    tokens: web::Data<TokenService>,
    media: web::Data<MediaStore>,
    path: web::Path<i32>,
) -> HttpResponse {
    let user = match authenticate(&req, &tokens, &db) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let session_id = path.into_inner();

    match db::find_session_for_user(&db, session_id, user.id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Chat session not found"),
        Err(e) => {
            tracing::error!("Failed to load session {}: {:?}", session_id, e);
            return internal_error("Internal server error");
        }
    }

    match db::list_session_messages(&db, session_id) {
        Ok(messages) => HttpResponse::Ok().json(
            messages
                .iter()
                .map(|m| message_response(m, &media))
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            tracing::error!("Failed to list messages for session {}: {:?}", session_id, e);
            internal_error("Internal server error")
        }
    }
}

/// Weak-topic analysis over the caller's recent questions in this session.
/// Fire-and-forget contract: failures and thin history yield an empty
/// analysis, not an error.
pub async fn session_analysis(
    req: HttpRequest,
    db: web::Data<DbPool>,
    tokens: web::Data<TokenService>,
    ai: web::Data<AiService>,
    path: web::Path<i32>,
) -> HttpResponse {
    let user = match authenticate(&req, &tokens, &db) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let session_id = path.into_inner();

    match db::find_session_for_user(&db, session_id, user.id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Chat session not found"),
        Err(e) => {
            tracing::error!("Failed to load session {}: {:?}", session_id, e);
            return internal_error("Internal server error");
        }
    }

    let questions = match db::list_recent_user_questions(&db, session_id, 10) {
        Ok(questions) => questions,
        Err(e) => {
            tracing::error!("Failed to load questions for session {}: {:?}", session_id, e);
            return internal_error("Internal server error");
        }
    };

    let analysis = ai.analyze_pattern(&questions).await;
    HttpResponse::Ok().json(AnalysisResponse { analysis })
}
