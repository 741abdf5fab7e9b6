//! Time-limited invite codes for groups.

use std::sync::LazyLock;

use chrono::{Duration, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{Result, ServerError};

pub const CODE_LENGTH: usize = 12;
pub const CODE_VALID_DAYS: i64 = 3;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Wire format of an invite code. Checked before any lookup.
static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{12}$").unwrap());

/// Invite token granting membership in a group.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
#[serde(rename_all = "camelCase")]
pub struct GroupCode {
    pub code: String,
    pub group_id: Uuid,
    pub valid_until: chrono::DateTime<chrono::Utc>,
}

pub fn is_valid_code_format(code: &str) -> bool {
    CODE_PATTERN.is_match(code)
}

/// Issues, invalidates and validates invite codes.
#[derive(Clone)]
pub struct CodeRegistry {
    pool: Pool<Postgres>,
}

impl CodeRegistry {
    /// Create a new [`CodeRegistry`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Mint a fresh code for `group_id`, superseding every earlier one.
    ///
    /// Old codes are expiry-stamped, not deleted: they stay queryable but
    /// inert. The group row is locked for the whole transaction, so two
    /// concurrent issuers serialize instead of each stamping a snapshot
    /// that misses the other's insert.
    pub async fn issue(&self, group_id: Uuid) -> Result<GroupCode> {
        let group_code = GroupCode {
            code: generate_code(),
            group_id,
            valid_until: Utc::now() + Duration::days(CODE_VALID_DAYS),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query_as::<_, (Uuid,)>(
            r#"SELECT id FROM groups WHERE id = $1 FOR UPDATE"#,
        )
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServerError::GroupNotExist { id: group_id })?;

        sqlx::query(
            r#"UPDATE group_codes SET valid_until = NOW() WHERE group_id = $1"#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO group_codes (code, group_id, valid_until)
                VALUES ($1, $2, $3)"#,
        )
        .bind(&group_code.code)
        .bind(group_code.group_id)
        .bind(group_code.valid_until)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(%group_id, "issued group code");

        Ok(group_code)
    }

    /// Resolve a client-supplied code to its group.
    pub async fn validate(&self, code: &str) -> Result<GroupCode> {
        if !is_valid_code_format(code) {
            return Err(ServerError::InvalidIdentifier {
                value: code.to_owned(),
            });
        }

        let group_code = sqlx::query_as::<_, GroupCode>(
            r#"SELECT * FROM group_codes WHERE code = $1"#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServerError::CodeNotExist {
            code: code.to_owned(),
        })?;

        if Utc::now() > group_code.valid_until {
            return Err(ServerError::CodeExpired {
                code: code.to_owned(),
            });
        }

        Ok(group_code)
    }
}

fn generate_code() -> String {
    let mut rng = OsRng;
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_matches_wire_format() {
        for _ in 0..32 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(is_valid_code_format(&code), "bad code: {code}");
        }
    }

    #[test]
    fn format_rejects_before_lookup() {
        assert!(!is_valid_code_format("abcd1234efgh")); // lowercase
        assert!(!is_valid_code_format("ABCD1234")); // short
        assert!(!is_valid_code_format("ABCD1234EFGH5")); // long
        assert!(!is_valid_code_format("ABCD-234EFGH")); // symbol
        assert!(is_valid_code_format("ABCD1234EFGH"));
    }

    #[sqlx::test]
    async fn issue_supersedes_previous_code(pool: Pool<Postgres>) {
        let registry = CodeRegistry::new(pool.clone());
        let group_id = crate::tests_support::seed_group(&pool).await;

        let first = registry.issue(group_id).await.unwrap();
        assert!(registry.validate(&first.code).await.is_ok());

        let second = registry.issue(group_id).await.unwrap();
        assert_ne!(first.code, second.code);
        assert!(registry.validate(&second.code).await.is_ok());

        // the superseded code now fails with CodeExpired.
        match registry.validate(&first.code).await {
            Err(crate::error::ServerError::CodeExpired { code }) => {
                assert_eq!(code, first.code)
            },
            other => panic!("expected CodeExpired, got {other:?}"),
        }

        // exactly one code per group may be valid at any time.
        let (valid,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM group_codes
                WHERE group_id = $1 AND valid_until > NOW()"#,
        )
        .bind(group_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(valid, 1);
    }

    #[sqlx::test]
    async fn issue_requires_existing_group(pool: Pool<Postgres>) {
        let registry = CodeRegistry::new(pool);
        match registry.issue(Uuid::new_v4()).await {
            Err(crate::error::ServerError::GroupNotExist { .. }) => {},
            other => panic!("expected GroupNotExist, got {other:?}"),
        }
    }

    #[sqlx::test]
    async fn validate_distinguishes_missing_and_expired(pool: Pool<Postgres>) {
        let registry = CodeRegistry::new(pool.clone());
        let group_id = crate::tests_support::seed_group(&pool).await;

        match registry.validate("ZZZZZZZZZZZZ").await {
            Err(crate::error::ServerError::CodeNotExist { .. }) => {},
            other => panic!("expected CodeNotExist, got {other:?}"),
        }

        let issued = registry.issue(group_id).await.unwrap();
        assert!(
            issued.valid_until - Utc::now() > Duration::days(CODE_VALID_DAYS) - Duration::minutes(1)
        );

        sqlx::query(
            r#"UPDATE group_codes SET valid_until = NOW() - INTERVAL '1 hour'
                WHERE code = $1"#,
        )
        .bind(&issued.code)
        .execute(&pool)
        .await
        .unwrap();

        match registry.validate(&issued.code).await {
            Err(crate::error::ServerError::CodeExpired { .. }) => {},
            other => panic!("expected CodeExpired, got {other:?}"),
        }
    }
}
