mod repository;
mod service;

pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A requested-then-purchased shopping entry.
///
/// Lifecycle: Requested (`bought_by` empty) → Bought (`bought_by`/`bought_at`
/// set) → Billed (`bill_id` set). A billed item never leaves that state.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub id: Uuid,
    pub group_id: Uuid,
    pub title: String,
    pub category: String,
    pub count: i64,
    /// Unit price in minor currency units.
    pub price: i64,
    pub requested_by: String,
    pub requested_for: Vec<String>,
    pub bought_by: Option<String>,
    pub bought_at: Option<chrono::DateTime<chrono::Utc>>,
    pub bill_id: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// The un-bought part of a group's list, as served to clients.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    pub count: i64,
    pub list_items: Vec<ListItem>,
}
