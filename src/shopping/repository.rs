//! Handle database requests.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::shopping::ListItem;

#[derive(Clone)]
pub struct ItemRepository {
    pool: Pool<Postgres>,
}

impl ItemRepository {
    /// Create a new [`ItemRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert [`ListItem`] into database.
    pub async fn insert(&self, item: &ListItem) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO list_items
                (id, group_id, title, category, count, price, requested_by, requested_for)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(item.id)
        .bind(item.group_id)
        .bind(&item.title)
        .bind(&item.category)
        .bind(item.count)
        .bind(item.price)
        .bind(&item.requested_by)
        .bind(&item.requested_for)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Find an item inside a group. Items are only ever addressed through
    /// their owning group.
    pub async fn find_in_group(
        &self,
        group_id: Uuid,
        item_id: Uuid,
    ) -> Result<ListItem> {
        sqlx::query_as::<_, ListItem>(
            r#"SELECT * FROM list_items WHERE group_id = $1 AND id = $2"#,
        )
        .bind(group_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServerError::ItemNotExist)
    }

    /// The group's items not yet bought.
    pub async fn active_in_group(&self, group_id: Uuid) -> Result<Vec<ListItem>> {
        Ok(sqlx::query_as::<_, ListItem>(
            r#"SELECT * FROM list_items
                WHERE group_id = $1 AND bought_at IS NULL
                ORDER BY created_at"#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Partial update of the mutable columns. The owning group and any
    /// bill reference are never touched here.
    pub async fn update_fields(&self, item: &ListItem) -> Result<()> {
        sqlx::query(
            r#"UPDATE list_items
                SET title = $1, category = $2, count = $3, price = $4,
                    requested_for = $5, updated_at = NOW()
                WHERE group_id = $6 AND id = $7"#,
        )
        .bind(&item.title)
        .bind(&item.category)
        .bind(item.count)
        .bind(item.price)
        .bind(&item.requested_for)
        .bind(item.group_id)
        .bind(item.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Clear the purchase mark.
    pub async fn clear_purchase(&self, group_id: Uuid, item_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"UPDATE list_items
                SET bought_by = NULL, bought_at = NULL, updated_at = NOW()
                WHERE group_id = $1 AND id = $2"#,
        )
        .bind(group_id)
        .bind(item_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
