use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Row shape of the `users` table where the stored hash is needed.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // Argon2 hash, never plaintext
}

/// Transient handle to a stored user. Carries no credential material and is
/// dropped with the request.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
        }
    }
}
