// Database initialization and connection management
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use std::sync::{Arc, Mutex};

pub type DbPool = Arc<Mutex<SqliteConnection>>;

/// Open the SQLite database, creating the file if it doesn't exist.
/// SQLite has built-in thread-safety; Arc<Mutex<>> provides shared access.
pub fn init_db(database_url: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    Ok(Arc::new(Mutex::new(SqliteConnection::establish(
        database_url,
    )?)))
}

/// Run migrations on the database
pub fn run_migrations(db: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    use diesel::sql_query;
    use diesel::RunQueryDsl;

    let mut conn = db.lock().unwrap();

    let tables = vec![
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            hashed_password TEXT NOT NULL,
            grade TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS subjects (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            icon TEXT NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS chat_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            user_id INTEGER NOT NULL REFERENCES users(id),
            subject_id INTEGER NOT NULL REFERENCES subjects(id),
            title TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            session_id INTEGER NOT NULL REFERENCES chat_sessions(id),
            content TEXT NOT NULL,
            is_user BOOLEAN NOT NULL DEFAULT 1,
            image_path TEXT,
            created_at INTEGER NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS uploaded_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            session_id INTEGER NOT NULL REFERENCES chat_sessions(id),
            filename TEXT NOT NULL,
            filepath TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
    ];

    for table_sql in tables {
        match sql_query(table_sql).execute(&mut *conn) {
            Ok(_) => tracing::debug!("✅ Table created/verified"),
            Err(e) => tracing::warn!("⚠️ Table creation warning: {:?}", e),
        }
    }

    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
        "CREATE INDEX IF NOT EXISTS idx_chat_sessions_user_id ON chat_sessions(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id)",
        "CREATE INDEX IF NOT EXISTS idx_uploaded_images_session_id ON uploaded_images(session_id)",
    ];

    for index_sql in indexes {
        match sql_query(index_sql).execute(&mut *conn) {
            Ok(_) => tracing::debug!("✅ Index created/verified"),
            Err(e) => tracing::warn!("⚠️ Index creation warning: {:?}", e),
        }
    }

    Ok(())
}
