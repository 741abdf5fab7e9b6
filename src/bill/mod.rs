mod repository;
mod service;

pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shopping::ListItem;

/// Initial settlement state; the column stays free-form for future states.
pub const BILL_STATE_TODO: &str = "todo";

/// Immutable settlement record over a user's bought-but-unbilled items.
///
/// `bought_items` and `sum` are derived: the items whose `bill_id` points
/// here, and their price×count total in minor currency units. The item set
/// is fixed at creation.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: Uuid,
    pub group_id: Uuid,
    pub created_by: String,
    pub sent_to: Vec<String>,
    pub due_date: Option<chrono::NaiveDate>,
    pub state: String,
    #[sqlx(skip)]
    pub bought_items: Vec<ListItem>,
    #[sqlx(skip)]
    pub sum: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Bill {
    /// Attach the derived item list and recompute the sum.
    pub(crate) fn with_items(mut self, items: Vec<ListItem>) -> Self {
        self.sum = items.iter().map(|item| item.price * item.count).sum();
        self.bought_items = items;
        self
    }
}

/// Bills of a group, as served to clients.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillList {
    pub count: i64,
    pub bills: Vec<Bill>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_is_price_times_count() {
        let bill = Bill::default().with_items(vec![
            ListItem {
                price: 150,
                count: 2,
                ..Default::default()
            },
            ListItem {
                price: 99,
                count: 1,
                ..Default::default()
            },
        ]);
        assert_eq!(bill.sum, 399);
    }

    #[test]
    fn empty_bill_sums_to_zero() {
        assert_eq!(Bill::default().with_items(vec![]).sum, 0);
    }
}
