//! Shopping-list HTTP API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::group::GroupRepository;
use crate::notify::Event;
use crate::router::Valid;
use crate::shopping::{
    ItemChange, ListItem, ShoppingList, ShoppingListLedger,
};
use crate::user::{User, UserRepository};
use crate::{AppState, ServerError};

#[derive(Debug, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    #[validate(length(
        min = 1,
        max = 150,
        message = "Title must be 1 to 150 characters long."
    ))]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[validate(range(min = 1, message = "Count must be at least 1."))]
    pub count: i64,
    #[validate(range(min = 0, message = "Price must not be negative."))]
    pub price: i64,
    pub requested_for: Vec<String>,
}

#[derive(Debug, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub id: Uuid,
    #[validate(length(
        min = 1,
        max = 150,
        message = "Title must be 1 to 150 characters long."
    ))]
    pub title: Option<String>,
    pub category: Option<String>,
    #[validate(range(min = 1, message = "Count must be at least 1."))]
    pub count: Option<i64>,
    #[validate(range(min = 0, message = "Price must not be negative."))]
    pub price: Option<i64>,
    pub requested_for: Option<Vec<String>>,
}

#[derive(Debug, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyBody {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertBody {
    pub id: Uuid,
}

/// Tell the other group members the list changed.
async fn notify_group(state: &AppState, user: &User) {
    let Some(group_id) = user.group_id else {
        return;
    };

    let users = UserRepository::new(state.db.postgres.clone());
    let members = match GroupRepository::new(state.db.postgres.clone())
        .member_ids(group_id)
        .await
    {
        Ok(members) => members,
        Err(err) => {
            tracing::warn!(error = %err, "notification not delivered");
            return;
        },
    };

    if let Err(err) = state
        .notify
        .send(&users, &members, Event::ShoppingListChanged)
        .await
    {
        tracing::warn!(error = %err, "notification not delivered");
    }
}

/// Handler to fetch the group's un-bought items.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<ShoppingList>, ServerError> {
    let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;

    let ledger = ShoppingListLedger::new(state.db.postgres.clone());
    let list = ledger.active_list(group_id).await?;

    Ok(Json(list))
}

/// Handler to put a new item on the list.
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<CreateBody>,
) -> Result<(StatusCode, Json<ListItem>), ServerError> {
    let ledger = ShoppingListLedger::new(state.db.postgres.clone());
    let item = ledger
        .create_item(
            &user,
            &body.title,
            &body.category,
            body.count,
            body.price,
            body.requested_for,
        )
        .await?;

    notify_group(&state, &user).await;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Handler for partial item updates.
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<UpdateBody>,
) -> Result<Json<ListItem>, ServerError> {
    let ledger = ShoppingListLedger::new(state.db.postgres.clone());
    let item = ledger
        .update_item(
            &user,
            body.id,
            ItemChange {
                title: body.title,
                category: body.category,
                count: body.count,
                price: body.price,
                requested_for: body.requested_for,
            },
        )
        .await?;

    notify_group(&state, &user).await;

    Ok(Json(item))
}

/// Handler to mark a batch of items bought by the caller.
pub async fn buy(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<BuyBody>,
) -> Result<StatusCode, ServerError> {
    if body.ids.is_empty() {
        return Err(ServerError::MissingField { field: "ids" });
    }

    let ledger = ShoppingListLedger::new(state.db.postgres.clone());
    ledger.buy_items(&user, &body.ids).await?;

    notify_group(&state, &user).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Handler to undo an un-billed purchase.
pub async fn revert(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<RevertBody>,
) -> Result<Json<ListItem>, ServerError> {
    let ledger = ShoppingListLedger::new(state.db.postgres.clone());
    let item = ledger.revert_purchase(&user, body.id).await?;

    notify_group(&state, &user).await;

    Ok(Json(item))
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::router::group::tests::setup_group;
    use crate::router::user::tests::ALICE;
    use crate::*;
    use axum::http::Method;
    use http_body_util::BodyExt;
    use serde_json::json;
    use sqlx::{Pool, Postgres};

    /// Put one item on `id`'s list through the API.
    pub(crate) async fn create_item(app: Router, id: &str) -> ListItem {
        let response = make_request(
            app,
            Method::POST,
            "/group/shoppinglist",
            Some(id),
            json!({
                "title": "Milk",
                "category": "Groceries",
                "count": 2,
                "price": 150,
                "requestedFor": [id],
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[sqlx::test]
    async fn test_create_and_list(pool: Pool<Postgres>) {
        let app = app(router::state(pool));
        setup_group(app.clone(), ALICE).await;
        let item = create_item(app.clone(), ALICE).await;

        assert_eq!(item.title, "Milk");
        assert_eq!(item.requested_by, ALICE);

        let response = make_request(
            app,
            Method::GET,
            "/group/shoppinglist",
            Some(ALICE),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let list: ShoppingList = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.count, 1);
        assert_eq!(list.list_items[0].id, item.id);
    }

    #[sqlx::test]
    async fn test_create_rejects_blank_title(pool: Pool<Postgres>) {
        let app = app(router::state(pool));
        setup_group(app.clone(), ALICE).await;

        let response = make_request(
            app,
            Method::POST,
            "/group/shoppinglist",
            Some(ALICE),
            json!({
                "title": "",
                "count": 1,
                "price": 100,
                "requestedFor": [ALICE],
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    async fn test_buy_then_revert(pool: Pool<Postgres>) {
        let app = app(router::state(pool));
        setup_group(app.clone(), ALICE).await;
        let item = create_item(app.clone(), ALICE).await;

        let response = make_request(
            app.clone(),
            Method::POST,
            "/group/shoppinglist/buy",
            Some(ALICE),
            json!({ "ids": [item.id] }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = make_request(
            app,
            Method::POST,
            "/group/shoppinglist/revert",
            Some(ALICE),
            json!({ "id": item.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let item: ListItem = serde_json::from_slice(&body).unwrap();
        assert_eq!(item.bought_by, None);
    }

    #[sqlx::test]
    async fn test_buy_unknown_item(pool: Pool<Postgres>) {
        let app = app(router::state(pool));
        setup_group(app.clone(), ALICE).await;

        let response = make_request(
            app,
            Method::POST,
            "/group/shoppinglist/buy",
            Some(ALICE),
            json!({ "ids": [uuid::Uuid::new_v4()] }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
