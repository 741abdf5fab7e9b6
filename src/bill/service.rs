//! Bill creation and settlement over bought items.

use chrono::NaiveDate;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::bill::{Bill, BillList, BillRepository};
use crate::error::{Result, ServerError};
use crate::user::{User, UserRepository};

/// Turns a user's bought-but-unbilled items into bills and serves a
/// group's billing history with recomputed sums.
#[derive(Clone)]
pub struct BillAggregator {
    pool: Pool<Postgres>,
    bills: BillRepository,
    users: UserRepository,
}

impl BillAggregator {
    /// Create a new [`BillAggregator`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            bills: BillRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
        }
    }

    /// Bill everything `user` has bought and not yet billed.
    ///
    /// Item selection, bill insertion and item stamping happen in one
    /// transaction. A user with nothing bought still gets an (empty) bill.
    pub async fn create_for_user(
        &self,
        user: &User,
        due_date: Option<NaiveDate>,
        sent_to: Vec<String>,
    ) -> Result<Bill> {
        let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;

        if !sent_to.is_empty() {
            let missing = self.users.missing(&sent_to).await?;
            if let Some(id) = missing.into_iter().next() {
                return Err(ServerError::UserNotExist { id });
            }
        }

        let mut tx = self.pool.begin().await?;

        let item_ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"SELECT id FROM list_items
                WHERE group_id = $1 AND bought_by = $2
                    AND bought_at IS NOT NULL AND bill_id IS NULL
                FOR UPDATE"#,
        )
        .bind(group_id)
        .bind(&user.id)
        .fetch_all(&mut *tx)
        .await?;

        let bill: Bill = sqlx::query_as(
            r#"INSERT INTO bills (id, group_id, created_by, sent_to, due_date)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(group_id)
        .bind(&user.id)
        .bind(&sent_to)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await?;

        let item_ids: Vec<Uuid> = item_ids.into_iter().map(|row| row.0).collect();

        sqlx::query(
            r#"UPDATE list_items SET bill_id = $1, updated_at = NOW()
                WHERE id = ANY($2)"#,
        )
        .bind(bill.id)
        .bind(&item_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            bill_id = %bill.id,
            %group_id,
            items = item_ids.len(),
            "created bill"
        );

        let items = self.bills.items_of(bill.id).await?;

        Ok(bill.with_items(items))
    }

    /// The group's bills, oldest first, each with its items and sum.
    pub async fn list_for_group(&self, group_id: Uuid) -> Result<BillList> {
        let rows = self.bills.all_in_group(group_id).await?;

        let mut bills = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.bills.items_of(row.id).await?;
            bills.push(row.with_items(items));
        }

        Ok(BillList {
            count: bills.len() as i64,
            bills,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::BILL_STATE_TODO;
    use crate::shopping::ShoppingListLedger;
    use crate::tests_support::{seed_group, seed_member};

    #[sqlx::test]
    async fn bill_collects_bought_items_and_sums(pool: Pool<Postgres>) {
        let ledger = ShoppingListLedger::new(pool.clone());
        let aggregator = BillAggregator::new(pool.clone());
        let group_id = seed_group(&pool).await;
        let user = seed_member(&pool, "a", group_id).await;

        let item = ledger
            .create_item(&user, "Milk", "Groceries", 2, 150, vec![user.id.clone()])
            .await
            .unwrap();
        ledger.buy_items(&user, &[item.id]).await.unwrap();

        let bill = aggregator
            .create_for_user(&user, None, vec![user.id.clone()])
            .await
            .unwrap();

        assert_eq!(bill.group_id, group_id);
        assert_eq!(bill.created_by, user.id);
        assert_eq!(bill.state, BILL_STATE_TODO);
        assert_eq!(bill.sum, 300);
        assert_eq!(bill.bought_items.len(), 1);
        assert_eq!(bill.bought_items[0].bill_id, Some(bill.id));

        // billed purchases can no longer be reverted.
        match ledger.revert_purchase(&user, item.id).await {
            Err(ServerError::ItemHasBill { id }) => assert_eq!(id, item.id),
            other => panic!("expected ItemHasBill, got {other:?}"),
        }
    }

    #[sqlx::test]
    async fn empty_selection_still_creates_a_bill(pool: Pool<Postgres>) {
        let aggregator = BillAggregator::new(pool.clone());
        let group_id = seed_group(&pool).await;
        let user = seed_member(&pool, "a", group_id).await;

        let bill = aggregator
            .create_for_user(&user, None, vec![])
            .await
            .unwrap();

        assert_eq!(bill.sum, 0);
        assert!(bill.bought_items.is_empty());

        let list = aggregator.list_for_group(group_id).await.unwrap();
        assert_eq!(list.count, 1);
        assert_eq!(list.bills[0].id, bill.id);

        // listing derives items and sums, it never mutates.
        let again = aggregator.list_for_group(group_id).await.unwrap();
        assert_eq!(again, list);
    }

    #[sqlx::test]
    async fn bill_skips_other_buyers_and_billed_items(pool: Pool<Postgres>) {
        let ledger = ShoppingListLedger::new(pool.clone());
        let aggregator = BillAggregator::new(pool.clone());
        let group_id = seed_group(&pool).await;
        let user = seed_member(&pool, "a", group_id).await;
        let other = seed_member(&pool, "b", group_id).await;

        let mine = ledger
            .create_item(&user, "Milk", "Groceries", 1, 100, vec![user.id.clone()])
            .await
            .unwrap();
        let theirs = ledger
            .create_item(&other, "Soap", "Household", 1, 80, vec![other.id.clone()])
            .await
            .unwrap();
        let pending = ledger
            .create_item(&user, "Eggs", "Groceries", 1, 250, vec![user.id.clone()])
            .await
            .unwrap();

        ledger.buy_items(&user, &[mine.id]).await.unwrap();
        ledger.buy_items(&other, &[theirs.id]).await.unwrap();

        let first = aggregator
            .create_for_user(&user, None, vec![])
            .await
            .unwrap();
        assert_eq!(first.sum, 100);
        assert_eq!(first.bought_items[0].id, mine.id);

        // already-billed items never end up on a second bill.
        ledger.buy_items(&user, &[pending.id]).await.unwrap();
        let second = aggregator
            .create_for_user(&user, None, vec![])
            .await
            .unwrap();
        assert_eq!(second.sum, 250);
        assert_eq!(second.bought_items[0].id, pending.id);

        let list = aggregator.list_for_group(group_id).await.unwrap();
        assert_eq!(list.count, 2);
        assert_eq!(list.bills[0].id, first.id);
        assert_eq!(list.bills[1].id, second.id);
    }

    #[sqlx::test]
    async fn bill_rejects_unknown_recipients(pool: Pool<Postgres>) {
        let aggregator = BillAggregator::new(pool.clone());
        let group_id = seed_group(&pool).await;
        let user = seed_member(&pool, "a", group_id).await;

        match aggregator
            .create_for_user(
                &user,
                None,
                vec!["nobodynobodynobodynobody0000".into()],
            )
            .await
        {
            Err(ServerError::UserNotExist { id }) => {
                assert_eq!(id, "nobodynobodynobodynobody0000")
            },
            other => panic!("expected UserNotExist, got {other:?}"),
        }
    }
}
