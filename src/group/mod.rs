mod code;
mod repository;
mod service;

pub use code::*;
pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Currency used when a group is created or updated with a blank one.
pub const DEFAULT_CURRENCY: &str = "€";

/// Household unit sharing a shopping list and bills.
///
/// `members` is never persisted: it is the set of users whose `group_id`
/// points here, attached by the repository on load.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub display_name: String,
    pub currency: String,
    pub admins: Vec<String>,
    #[sqlx(skip)]
    pub members: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Group {
    pub fn has_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|admin| admin == user_id)
    }
}

/// Trim a display name and currency, falling back to [`DEFAULT_CURRENCY`].
pub(crate) fn normalize_meta(
    display_name: &str,
    currency: &str,
) -> (String, String) {
    let display_name = display_name.trim().to_owned();
    let currency = currency.trim();
    let currency = if currency.is_empty() {
        DEFAULT_CURRENCY.to_owned()
    } else {
        currency.to_owned()
    };

    (display_name, currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_currency_defaults_to_euro() {
        let (name, currency) = normalize_meta("  Kitchen Crew ", "");
        assert_eq!(name, "Kitchen Crew");
        assert_eq!(currency, "€");

        let (_, currency) = normalize_meta("Kitchen Crew", "  ");
        assert_eq!(currency, "€");
    }

    #[test]
    fn explicit_currency_is_kept() {
        let (_, currency) = normalize_meta("Kitchen Crew", " CHF ");
        assert_eq!(currency, "CHF");
    }

    #[test]
    fn admin_membership_checks() {
        let group = Group {
            admins: vec!["a".repeat(28)],
            members: vec!["a".repeat(28), "b".repeat(28)],
            ..Default::default()
        };
        assert!(group.has_admin(&"a".repeat(28)));
        assert!(!group.has_admin(&"b".repeat(28)));
    }
}
