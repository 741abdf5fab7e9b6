//! Handle database requests.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::bill::Bill;
use crate::shopping::ListItem;

use crate::error::Result;

#[derive(Clone)]
pub struct BillRepository {
    pool: Pool<Postgres>,
}

impl BillRepository {
    /// Create a new [`BillRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// The group's bills, oldest first, without their derived items.
    pub async fn all_in_group(&self, group_id: Uuid) -> Result<Vec<Bill>> {
        Ok(sqlx::query_as::<_, Bill>(
            r#"SELECT * FROM bills WHERE group_id = $1 ORDER BY created_at"#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// The items stamped with `bill_id`, oldest first.
    pub async fn items_of(&self, bill_id: Uuid) -> Result<Vec<ListItem>> {
        Ok(sqlx::query_as::<_, ListItem>(
            r#"SELECT * FROM list_items WHERE bill_id = $1 ORDER BY created_at"#,
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
