//! Register, fetch and update user profiles.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::notify::Event;
use crate::router::{ME_ROUTE, Valid, principal_id};
use crate::user::{User, UserRepository};
use crate::{AppState, ServerError};

fn already_registered() -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(
        "id",
        ValidationError::new("id")
            .with_message("User is already registered.".into()),
    );
    errors
}

#[derive(Debug, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub id: String,
    #[validate(length(
        min = 3,
        max = 20,
        message = "Name must be 3 to 20 characters long."
    ))]
    pub display_name: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: Option<String>,
    #[validate(length(
        equal = 152,
        message = "Push token must be 152 characters long."
    ))]
    pub push_token: Option<String>,
    #[validate(length(
        min = 2,
        max = 5,
        message = "Locale must be a BCP 47 tag."
    ))]
    pub locale: Option<String>,
}

#[derive(Debug, Default, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    #[validate(length(
        min = 3,
        max = 20,
        message = "Name must be 3 to 20 characters long."
    ))]
    pub display_name: Option<String>,
    #[validate(email(message = "Email must be formatted."))]
    pub email: Option<String>,
    #[validate(length(
        equal = 152,
        message = "Push token must be 152 characters long."
    ))]
    pub push_token: Option<String>,
    #[validate(length(
        min = 2,
        max = 5,
        message = "Locale must be a BCP 47 tag."
    ))]
    pub locale: Option<String>,
}

/// Handler to register the calling identity.
///
/// The profile id must be the caller's own.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Valid(body): Valid<RegisterBody>,
) -> Result<(StatusCode, Json<User>), ServerError> {
    let principal = principal_id(&headers)?;
    if principal != body.id {
        return Err(ServerError::Unauthorized);
    }

    let users = UserRepository::new(state.db.postgres.clone());
    if users.exists(&body.id).await? {
        return Err(already_registered().into());
    }

    let user = User {
        id: body.id,
        display_name: body.display_name,
        email: body.email,
        push_token: body.push_token,
        locale: body.locale,
        ..Default::default()
    };
    users.insert(&user).await?;

    tracing::info!(user_id = user.id, "registered user");

    let user = users.find_by_id(&user.id).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Handler to fetch a profile, `@me` being the caller's own.
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<User>,
    user_id: Option<Path<String>>,
) -> Result<Json<User>, ServerError> {
    let user_id = match user_id {
        Some(Path(user_id)) if user_id != ME_ROUTE => user_id,
        _ => return Ok(Json(principal)),
    };

    let user = UserRepository::new(state.db.postgres.clone())
        .find_by_id(&user_id)
        .await?;
    Ok(Json(user))
}

/// Handler to update the caller's own profile.
pub async fn update(
    State(state): State<AppState>,
    Extension(mut user): Extension<User>,
    Valid(body): Valid<UpdateBody>,
) -> Result<Json<User>, ServerError> {
    if let Some(display_name) = body.display_name {
        user.display_name = display_name;
    }
    if let Some(email) = body.email {
        user.email = Some(email);
    }
    if let Some(push_token) = body.push_token {
        user.push_token = Some(push_token);
    }
    if let Some(locale) = body.locale {
        user.locale = Some(locale);
    }

    let users = UserRepository::new(state.db.postgres.clone());
    users.update(&user).await?;

    if let Some(group_id) = user.group_id {
        let members = crate::group::GroupRepository::new(state.db.postgres.clone())
            .member_ids(group_id)
            .await?;
        if let Err(err) = state
            .notify
            .send(&users, &members, Event::GroupDataChanged)
            .await
        {
            tracing::warn!(error = %err, "notification not delivered");
        }
    }

    let user = users.find_by_id(&user.id).await?;
    Ok(Json(user))
}
