// Diesel schema definition for the AISSAM database
use diesel::allow_tables_to_appear_in_same_query;
use diesel::joinable;
use diesel::table;

table! {
    users (id) {
        id -> Integer,
        email -> Text,
        name -> Text,
        hashed_password -> Text,
        grade -> Text,
        created_at -> BigInt,
    }
}

table! {
    subjects (id) {
        id -> Integer,
        name -> Text,
        color -> Text,
        icon -> Text,
    }
}

table! {
    chat_sessions (id) {
        id -> Integer,
        user_id -> Integer,
        subject_id -> Integer,
        title -> Text,
        created_at -> BigInt,
    }
}

table! {
    messages (id) {
        id -> Integer,
        session_id -> Integer,
        content -> Text,
        is_user -> Bool,
        image_path -> Nullable<Text>,
        created_at -> BigInt,
    }
}

table! {
    uploaded_images (id) {
        id -> Integer,
        session_id -> Integer,
        filename -> Text,
        filepath -> Text,
        created_at -> BigInt,
    }
}

joinable!(chat_sessions -> users (user_id));
joinable!(chat_sessions -> subjects (subject_id));
joinable!(messages -> chat_sessions (session_id));
joinable!(uploaded_images -> chat_sessions (session_id));

allow_tables_to_appear_in_same_query!(
    users,
    subjects,
    chat_sessions,
    messages,
    uploaded_images,
);
