mod repository;

pub use repository::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of identity-provider ids.
pub const USER_ID_LENGTH: usize = 28;

/// User as saved on database.
///
/// The id is issued by the external identity provider; profiles are created
/// on first login and never deleted in-core.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    pub locale: Option<String>,
    pub group_id: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Check the shape of an identity-provider id before any lookup.
pub fn is_valid_user_id(id: &str) -> bool {
    id.len() == USER_ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_format() {
        assert!(is_valid_user_id("1234567890fakefirebaseid0001"));
        assert!(!is_valid_user_id("too-short"));
        assert!(!is_valid_user_id("1234567890fakefirebaseid00012"));
        assert!(!is_valid_user_id("1234567890fake!irebaseid0001"));
    }
}
