//! Handle database requests.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::user::User;

#[derive(Clone)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert [`User`] into database.
    pub async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users (id, display_name, email, push_token, locale)
                VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.push_token)
        .bind(&user.locale)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Find current user using `id` field.
    pub async fn find_by_id(&self, user_id: &str) -> Result<User> {
        sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServerError::UserNotExist {
                id: user_id.to_owned(),
            })
    }

    /// Whether a profile exists for `user_id`.
    pub async fn exists(&self, user_id: &str) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Ids in `user_ids` that do not resolve to a profile.
    pub async fn missing(&self, user_ids: &[String]) -> Result<Vec<String>> {
        let missing: Vec<(String,)> = sqlx::query_as(
            r#"SELECT wanted.id FROM UNNEST($1::text[]) AS wanted(id)
                WHERE NOT EXISTS (SELECT 1 FROM users WHERE users.id = wanted.id)"#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(missing.into_iter().map(|row| row.0).collect())
    }

    /// Update mutable profile fields.
    pub async fn update(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"UPDATE users
                SET display_name = $1, email = $2, push_token = $3, locale = $4,
                    updated_at = NOW()
                WHERE id = $5"#,
        )
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.push_token)
        .bind(&user.locale)
        .bind(&user.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Point the user at a group.
    pub async fn set_group(&self, user_id: &str, group_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"UPDATE users SET group_id = $1, updated_at = NOW() WHERE id = $2"#,
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Resolve the push tokens of `user_ids`, ignoring users without one.
    pub async fn push_tokens(&self, user_ids: &[String]) -> Result<Vec<String>> {
        let tokens: Vec<(String,)> = sqlx::query_as(
            r#"SELECT push_token FROM users
                WHERE id = ANY($1) AND push_token IS NOT NULL"#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens.into_iter().map(|t| t.0).collect())
    }
}
