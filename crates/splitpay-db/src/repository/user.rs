//! # User Repository
//!
//! Users are created lazily the first time an identity-provider subject
//! performs an authenticated action, and are never deleted.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use splitpay_core::User;

/// Profile fields reported by the identity provider.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub external_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Gets a user by internal ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, external_id, name, email, phone, created_at
            FROM users
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Returns the user for an identity-provider subject, creating it on
    /// first sight.
    ///
    /// Profile fields the provider now reports fill in or replace stored
    /// ones; a field the provider omits keeps its stored value.
    pub async fn get_or_create(&self, profile: &NewUser) -> DbResult<User> {
        debug!(external_id = %profile.external_id, "Resolving user");

        sqlx::query(
            r#"
            INSERT INTO users (id, external_id, name, email, phone, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(external_id) DO UPDATE SET
                name  = COALESCE(excluded.name, users.name),
                email = COALESCE(excluded.email, users.email),
                phone = COALESCE(excluded.phone, users.phone)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&profile.external_id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(super::now())
        .execute(&self.pool)
        .await?;

        sqlx::query_as::<_, User>(
            r#"
            SELECT id, external_id, name, email, phone, created_at
            FROM users
            WHERE external_id = ?1
            "#,
        )
        .bind(&profile.external_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", &profile.external_id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
