//! Bills HTTP API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::bill::{Bill, BillAggregator, BillList};
use crate::group::GroupRepository;
use crate::notify::Event;
use crate::router::Valid;
use crate::user::{User, UserRepository};
use crate::{AppState, ServerError};

#[derive(Debug, Default, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub sent_to: Vec<String>,
}

/// Handler to bill the caller's bought-but-unbilled items.
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<Bill>), ServerError> {
    let aggregator = BillAggregator::new(state.db.postgres.clone());
    let bill = aggregator
        .create_for_user(&user, body.due_date, body.sent_to)
        .await?;

    if let Some(group_id) = user.group_id {
        let users = UserRepository::new(state.db.postgres.clone());
        match GroupRepository::new(state.db.postgres.clone())
            .member_ids(group_id)
            .await
        {
            Ok(members) => {
                if let Err(err) =
                    state.notify.send(&users, &members, Event::BillsChanged).await
                {
                    tracing::warn!(error = %err, "notification not delivered");
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "notification not delivered")
            },
        }
    }

    Ok((StatusCode::CREATED, Json(bill)))
}

/// Handler to fetch the group's billing history.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<BillList>, ServerError> {
    let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;

    let aggregator = BillAggregator::new(state.db.postgres.clone());
    let bills = aggregator.list_for_group(group_id).await?;

    Ok(Json(bills))
}
