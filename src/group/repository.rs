//! Handle database requests.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::group::Group;

#[derive(Clone)]
pub struct GroupRepository {
    pool: Pool<Postgres>,
}

impl GroupRepository {
    /// Create a new [`GroupRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Find a group by id, with its derived member list attached.
    pub async fn find_by_id(&self, group_id: Uuid) -> Result<Group> {
        let mut group = sqlx::query_as::<_, Group>(
            r#"SELECT * FROM groups WHERE id = $1"#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServerError::GroupNotExist { id: group_id })?;

        group.members = self.member_ids(group_id).await?;
        Ok(group)
    }

    /// Membership is a pure query, never a stored column.
    pub async fn member_ids(&self, group_id: Uuid) -> Result<Vec<String>> {
        let ids: Vec<(String,)> = sqlx::query_as(
            r#"SELECT id FROM users WHERE group_id = $1 ORDER BY created_at"#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|row| row.0).collect())
    }

    /// Update display name and currency.
    pub async fn update_meta(
        &self,
        group_id: Uuid,
        display_name: &str,
        currency: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE groups
                SET display_name = $1, currency = $2, updated_at = NOW()
                WHERE id = $3"#,
        )
        .bind(display_name)
        .bind(currency)
        .bind(group_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
