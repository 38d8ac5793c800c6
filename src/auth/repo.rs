use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password;
pub use crate::auth::repo_types::{User, UserRow};

/// Failures surfaced by the credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("password hashing failed: {0}")]
    Hash(#[source] anyhow::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

// PostgreSQL unique_violation
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

impl User {
    /// Hash the plaintext and insert a new user, returning its handle.
    ///
    /// There is no prior existence check: the unique index on `email` closes
    /// the check-then-act race, and its violation is reported as
    /// [`StoreError::DuplicateEmail`].
    pub async fn create(db: &PgPool, email: &str, password: &str) -> Result<User, StoreError> {
        let password_hash = password::hash_password(password).map_err(StoreError::Hash)?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email
            "#,
        )
        .bind(email)
        .bind(&password_hash)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(user)
    }

    /// Find a user by exact email, returning the handle together with the
    /// stored hash the caller needs for verification.
    pub async fn find_by_email(
        db: &PgPool,
        email: &str,
    ) -> Result<Option<(User, String)>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(row.map(|r| {
            let hash = r.password_hash.clone();
            (User::from(r), hash)
        }))
    }

    /// Find a user by id.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}
