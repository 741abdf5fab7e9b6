//! Shopping-list lifecycle: request, purchase, revert.

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::shopping::{ItemRepository, ListItem, ShoppingList};
use crate::user::{User, UserRepository};

/// Fields accepted when creating or updating an item.
#[derive(Clone, Debug, Default)]
pub struct ItemChange {
    pub title: Option<String>,
    pub category: Option<String>,
    pub count: Option<i64>,
    pub price: Option<i64>,
    pub requested_for: Option<Vec<String>>,
}

/// Creates and edits list items, records batch purchases and reverts
/// un-billed ones.
#[derive(Clone)]
pub struct ShoppingListLedger {
    pool: Pool<Postgres>,
    items: ItemRepository,
    users: UserRepository,
}

impl ShoppingListLedger {
    /// Create a new [`ShoppingListLedger`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            items: ItemRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
        }
    }

    /// The group's un-bought items with their count.
    pub async fn active_list(&self, group_id: Uuid) -> Result<ShoppingList> {
        let list_items = self.items.active_in_group(group_id).await?;

        Ok(ShoppingList {
            count: list_items.len() as i64,
            list_items,
        })
    }

    /// Request a new item on behalf of `requested_for`.
    pub async fn create_item(
        &self,
        requester: &User,
        title: &str,
        category: &str,
        count: i64,
        price: i64,
        requested_for: Vec<String>,
    ) -> Result<ListItem> {
        let group_id = requester.group_id.ok_or(ServerError::Unauthorized)?;

        self.check_requested_for(&requested_for).await?;

        let item = ListItem {
            id: Uuid::new_v4(),
            group_id,
            title: title.to_owned(),
            category: category.to_owned(),
            count,
            price,
            requested_by: requester.id.clone(),
            requested_for,
            ..Default::default()
        };

        self.items.insert(&item).await?;

        tracing::debug!(item_id = %item.id, %group_id, "created list item");

        self.items.find_in_group(group_id, item.id).await
    }

    /// Partial update of an item's mutable fields.
    ///
    /// The owning group and the bill reference are not mutable here.
    pub async fn update_item(
        &self,
        user: &User,
        item_id: Uuid,
        change: ItemChange,
    ) -> Result<ListItem> {
        let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;
        let mut item = self.items.find_in_group(group_id, item_id).await?;

        if let Some(title) = change.title {
            item.title = title;
        }
        if let Some(category) = change.category {
            item.category = category;
        }
        if let Some(count) = change.count {
            item.count = count;
        }
        if let Some(price) = change.price {
            item.price = price;
        }
        if let Some(requested_for) = change.requested_for {
            self.check_requested_for(&requested_for).await?;
            item.requested_for = requested_for;
        }

        self.items.update_fields(&item).await?;

        self.items.find_in_group(group_id, item_id).await
    }

    /// Atomically mark all of `item_ids` bought by `user`, now.
    ///
    /// All-or-nothing: every id must resolve inside the user's group or
    /// nothing is marked. Already-bought items are re-stamped to the new
    /// buyer and timestamp.
    pub async fn buy_items(&self, user: &User, item_ids: &[Uuid]) -> Result<()> {
        let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;

        let mut tx = self.pool.begin().await?;

        let matched: (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM (
                    SELECT id FROM list_items
                    WHERE group_id = $1 AND id = ANY($2)
                    FOR UPDATE
                ) AS locked"#,
        )
        .bind(group_id)
        .bind(item_ids)
        .fetch_one(&mut *tx)
        .await?;

        if matched.0 as usize != item_ids.len() {
            return Err(ServerError::ItemNotExist);
        }

        sqlx::query(
            r#"UPDATE list_items
                SET bought_by = $1, bought_at = $2, updated_at = NOW()
                WHERE group_id = $3 AND id = ANY($4)"#,
        )
        .bind(&user.id)
        .bind(Utc::now())
        .bind(group_id)
        .bind(item_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            buyer = user.id,
            %group_id,
            count = item_ids.len(),
            "bought list items"
        );

        Ok(())
    }

    /// Undo a purchase that has not been billed yet.
    pub async fn revert_purchase(
        &self,
        user: &User,
        item_id: Uuid,
    ) -> Result<ListItem> {
        let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;
        let item = self.items.find_in_group(group_id, item_id).await?;

        // billed purchases are final.
        if item.bill_id.is_some() {
            return Err(ServerError::ItemHasBill { id: item_id });
        }

        self.items.clear_purchase(group_id, item_id).await?;

        self.items.find_in_group(group_id, item_id).await
    }

    async fn check_requested_for(&self, requested_for: &[String]) -> Result<()> {
        if requested_for.is_empty() {
            return Err(ServerError::MissingField {
                field: "requestedFor",
            });
        }

        let missing = self.users.missing(requested_for).await?;
        if let Some(id) = missing.into_iter().next() {
            return Err(ServerError::UserNotExist { id });
        }

        Ok(())
    }
}
