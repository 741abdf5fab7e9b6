//! Group lifecycle HTTP API: create, update, invite, join, leave.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::group::{Group, GroupCode, MembershipManager};
use crate::notify::Event;
use crate::router::Valid;
use crate::user::{User, UserRepository};
use crate::{AppState, ServerError};

#[derive(Debug, Default, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[validate(length(
        max = 150,
        message = "Name must be at most 150 characters long."
    ))]
    pub display_name: String,
    #[validate(length(
        max = 4,
        message = "Currency must be at most 4 characters long."
    ))]
    #[serde(default)]
    pub currency: String,
}

/// Deliver `event` to `recipients`, logging instead of failing the request.
async fn notify(
    state: &AppState,
    recipients: &[String],
    event: Event,
) {
    let users = UserRepository::new(state.db.postgres.clone());
    if let Err(err) = state.notify.send(&users, recipients, event).await {
        tracing::warn!(error = %err, ?event, "notification not delivered");
    }
}

/// Handler to create a group owned by the caller.
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<Group>), ServerError> {
    let manager = MembershipManager::new(state.db.postgres.clone());
    let group = manager
        .create_group(&user, &body.display_name, &body.currency)
        .await?;

    Ok((StatusCode::CREATED, Json(group)))
}

/// Handler to fetch the caller's group.
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Group>, ServerError> {
    let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;

    let manager = MembershipManager::new(state.db.postgres.clone());
    let group = manager.groups().find_by_id(group_id).await?;

    Ok(Json(group))
}

/// Handler to update group metadata. Admins only.
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<Body>,
) -> Result<Json<Group>, ServerError> {
    let manager = MembershipManager::new(state.db.postgres.clone());
    let group = manager
        .update_group(&user, &body.display_name, &body.currency)
        .await?;

    notify(&state, &group.members, Event::GroupDataChanged).await;

    Ok(Json(group))
}

/// Handler to mint a fresh invite code, superseding earlier ones.
pub async fn create_code(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<(StatusCode, Json<GroupCode>), ServerError> {
    let group_id = user.group_id.ok_or(ServerError::Unauthorized)?;

    let manager = MembershipManager::new(state.db.postgres.clone());
    let code = manager.codes().issue(group_id).await?;

    Ok((StatusCode::CREATED, Json(code)))
}

/// Handler to join the group an invite code resolves to.
pub async fn join(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(code): Path<String>,
) -> Result<Json<Group>, ServerError> {
    let manager = MembershipManager::new(state.db.postgres.clone());
    let group = manager.join_group(&user, &code).await?;

    notify(&state, &group.members, Event::GroupNewMember).await;

    Ok(Json(group))
}

/// Handler to leave the caller's group.
pub async fn leave(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, ServerError> {
    let manager = MembershipManager::new(state.db.postgres.clone());
    let remaining = manager.leave_group(&user).await?;

    notify(&state, &remaining, Event::GroupMemberLeft).await;

    Ok(StatusCode::NO_CONTENT)
}
