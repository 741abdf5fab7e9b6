//! HTTP routes.

pub mod bill;
pub mod group;
pub mod shopping;
pub mod status;
pub mod user;

use axum::Json;
use axum::extract::{FromRequest, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{Result, ServerError};
use crate::user::{User, UserRepository, is_valid_user_id};
use crate::AppState;

const BEARER: &str = "Bearer ";
pub(crate) const ME_ROUTE: &str = "@me";

/// JSON body extractor running `validator` checks before the handler.
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// The identity-provider id presented by the caller.
///
/// The token itself is verified upstream; what arrives here is the opaque
/// subject id, shape-checked before it touches the database.
pub(crate) fn principal_id(headers: &HeaderMap) -> Result<String> {
    let id = headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(ServerError::Unauthorized)?;
    let id = id.strip_prefix(BEARER).unwrap_or(id);

    if !is_valid_user_id(id) {
        return Err(ServerError::Unauthorized);
    }

    Ok(id.to_owned())
}

/// Custom middleware for authentification.
///
/// Resolves the caller to a registered profile and stores it in the
/// request extensions. Unregistered callers are rejected; registration
/// itself stays outside this layer.
pub(crate) async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let user_id = principal_id(req.headers())?;

    // an unknown id is a bad credential; anything else (a failing
    // database, say) must surface as the server error it is.
    let user = match UserRepository::new(state.db.postgres.clone())
        .find_by_id(&user_id)
        .await
    {
        Ok(user) => user,
        Err(ServerError::UserNotExist { .. }) => {
            return Err(ServerError::Unauthorized);
        },
        Err(err) => return Err(err),
    };

    req.extensions_mut().insert::<User>(user);
    Ok(next.run(req).await)
}

/// MUST NEVER be used in production.
#[cfg(test)]
pub fn state(pool: sqlx::PgPool) -> AppState {
    use std::sync::Arc;

    AppState {
        config: Arc::new(crate::config::Configuration::default()),
        db: crate::database::Database { postgres: pool },
        notify: crate::notify::Notifier::default(),
    }
}
