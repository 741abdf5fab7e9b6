//! Seed helpers shared by database-backed tests.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::user::{USER_ID_LENGTH, User, UserRepository};

/// Register a profile whose id is `letter` repeated to full length.
pub async fn seed_user(pool: &Pool<Postgres>, letter: &str) -> User {
    let users = UserRepository::new(pool.clone());
    let user = User {
        id: letter.repeat(USER_ID_LENGTH / letter.len()),
        display_name: format!("User {letter}"),
        ..Default::default()
    };
    users.insert(&user).await.unwrap();
    users.find_by_id(&user.id).await.unwrap()
}

/// Register a profile and place it in `group_id`.
pub async fn seed_member(
    pool: &Pool<Postgres>,
    letter: &str,
    group_id: Uuid,
) -> User {
    let users = UserRepository::new(pool.clone());
    let user = seed_user(pool, letter).await;
    users.set_group(&user.id, group_id).await.unwrap();
    users.find_by_id(&user.id).await.unwrap()
}

/// Insert a bare group row, bypassing the membership layer.
pub async fn seed_group(pool: &Pool<Postgres>) -> Uuid {
    let group_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO groups (id, display_name, admins)
            VALUES ($1, 'Flat 7', '{}')"#,
    )
    .bind(group_id)
    .execute(pool)
    .await
    .unwrap();
    group_id
}

/// Insert a requested item for `user_id`.
pub async fn seed_item(pool: &Pool<Postgres>, group_id: Uuid, user_id: &str) {
    sqlx::query(
        r#"INSERT INTO list_items
            (id, group_id, title, category, count, price, requested_by, requested_for)
            VALUES ($1, $2, 'Milk', 'Groceries', 1, 120, $3, $4)"#,
    )
    .bind(Uuid::new_v4())
    .bind(group_id)
    .bind(user_id)
    .bind(vec![user_id.to_owned()])
    .execute(pool)
    .await
    .unwrap();
}

/// Insert an item already bought by `user_id`, not yet billed.
pub async fn seed_bought_item(
    pool: &Pool<Postgres>,
    group_id: Uuid,
    user_id: &str,
) {
    sqlx::query(
        r#"INSERT INTO list_items
            (id, group_id, title, category, count, price,
             requested_by, requested_for, bought_by, bought_at)
            VALUES ($1, $2, 'Bread', 'Groceries', 1, 240, $3, $4, $3, NOW())"#,
    )
    .bind(Uuid::new_v4())
    .bind(group_id)
    .bind(user_id)
    .bind(vec![user_id.to_owned()])
    .execute(pool)
    .await
    .unwrap();
}
