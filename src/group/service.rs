//! Group membership lifecycle.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::group::{CodeRegistry, Group, GroupRepository, normalize_meta};
use crate::user::{User, UserRepository};

/// Creates groups, admits users via invite codes, removes users and keeps
/// the admin set consistent.
#[derive(Clone)]
pub struct MembershipManager {
    pool: Pool<Postgres>,
    groups: GroupRepository,
    users: UserRepository,
    codes: CodeRegistry,
}

impl MembershipManager {
    /// Create a new [`MembershipManager`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            groups: GroupRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            codes: CodeRegistry::new(pool.clone()),
            pool,
        }
    }

    pub fn groups(&self) -> &GroupRepository {
        &self.groups
    }

    pub fn codes(&self) -> &CodeRegistry {
        &self.codes
    }

    /// Create a group with `creator` as its sole admin and first member.
    pub async fn create_group(
        &self,
        creator: &User,
        display_name: &str,
        currency: &str,
    ) -> Result<Group> {
        let (display_name, currency) = normalize_meta(display_name, currency);
        if display_name.is_empty() {
            return Err(ServerError::MissingField {
                field: "displayName",
            });
        }

        let group_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO groups (id, display_name, currency, admins)
                VALUES ($1, $2, $3, $4)"#,
        )
        .bind(group_id)
        .bind(&display_name)
        .bind(&currency)
        .bind(vec![creator.id.clone()])
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE users SET group_id = $1, updated_at = NOW() WHERE id = $2"#,
        )
        .bind(group_id)
        .bind(&creator.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%group_id, creator = creator.id, "created group");

        self.groups.find_by_id(group_id).await
    }

    /// Rename a group or change its currency. Admins only.
    pub async fn update_group(
        &self,
        user: &User,
        display_name: &str,
        currency: &str,
    ) -> Result<Group> {
        let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;
        let group = self.groups.find_by_id(group_id).await?;
        if !group.has_admin(&user.id) {
            return Err(ServerError::Unauthorized);
        }

        let (display_name, currency) = normalize_meta(display_name, currency);
        if display_name.is_empty() {
            return Err(ServerError::MissingField {
                field: "displayName",
            });
        }

        self.groups
            .update_meta(group_id, &display_name, &currency)
            .await?;

        tracing::info!(%group_id, "updated group");

        self.groups.find_by_id(group_id).await
    }

    /// Admit `user` into the group a valid invite code resolves to.
    pub async fn join_group(&self, user: &User, code: &str) -> Result<Group> {
        let group_code = self.codes.validate(code).await?;

        self.users.set_group(&user.id, group_code.group_id).await?;

        tracing::info!(
            user_id = user.id,
            group_id = %group_code.group_id,
            "user joined group"
        );

        self.groups.find_by_id(group_code.group_id).await
    }

    /// Remove `user` from their group.
    ///
    /// If the user is the sole admin, one arbitrary remaining member is
    /// promoted; with nobody left the admin list is cleared and the group
    /// kept, owner-less. The user's bought-but-unbilled items do not
    /// survive the departure. Returns the remaining member ids.
    pub async fn leave_group(&self, user: &User) -> Result<Vec<String>> {
        let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;

        let mut tx = self.pool.begin().await?;

        let (admins,): (Vec<String>,) = sqlx::query_as(
            r#"SELECT admins FROM groups WHERE id = $1 FOR UPDATE"#,
        )
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServerError::GroupNotExist { id: group_id })?;

        let remaining: Vec<String> = sqlx::query_as::<_, (String,)>(
            r#"SELECT id FROM users WHERE group_id = $1 AND id <> $2
                ORDER BY created_at FOR UPDATE"#,
        )
        .bind(group_id)
        .bind(&user.id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| row.0)
        .collect();

        if admins.iter().any(|admin| admin == &user.id) {
            let mut new_admins: Vec<String> =
                admins.into_iter().filter(|a| a != &user.id).collect();
            if new_admins.is_empty() {
                // promote one arbitrary remaining member, if any.
                new_admins.extend(remaining.first().cloned());
            }

            sqlx::query(
                r#"UPDATE groups SET admins = $1, updated_at = NOW()
                    WHERE id = $2"#,
            )
            .bind(&new_admins)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        }

        // unbilled personal purchases don't survive departure.
        sqlx::query(
            r#"DELETE FROM list_items
                WHERE group_id = $1 AND bought_by = $2
                    AND bought_at IS NOT NULL AND bill_id IS NULL"#,
        )
        .bind(group_id)
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE users SET group_id = NULL, updated_at = NOW()
                WHERE id = $1"#,
        )
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = user.id, %group_id, "user left group");

        Ok(remaining)
    }
}
