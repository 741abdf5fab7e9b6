//! flatledger is a coordination backend for shared households: one
//! shopping list and the bills that settle it.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
mod bill;
mod database;
pub mod error;
mod group;
mod notify;
mod router;
mod shopping;
pub mod telemetry;
mod user;

pub mod config;

#[cfg(test)]
pub mod tests_support;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post, put};
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    auth: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        request = request.header(header::AUTHORIZATION, auth);
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub notify: notify::Notifier,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    let users_router = Router::new()
        // `GET /users/:ID` goes to `get`. Authorization required.
        .route("/{user_id}", get(router::user::get))
        .route("/@me", get(router::user::get))
        // `PATCH /users/@me` goes to `update`. Authorization required.
        .route("/@me", axum::routing::patch(router::user::update))
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            router::auth,
        ))
        // `PUT /users` registers the calling identity.
        .route("/", put(router::user::register));

    let group_router = Router::new()
        .route(
            "/",
            post(router::group::create)
                .get(router::group::get)
                .put(router::group::update),
        )
        .route("/code", post(router::group::create_code))
        .route("/join/{code}", post(router::group::join))
        .route("/leave", post(router::group::leave))
        .route(
            "/shoppinglist",
            get(router::shopping::list)
                .post(router::shopping::create)
                .put(router::shopping::update),
        )
        .route("/shoppinglist/buy", post(router::shopping::buy))
        .route("/shoppinglist/revert", post(router::shopping::revert))
        .route(
            "/bills",
            get(router::bill::list).post(router::bill::create),
        )
        // every group route acts on behalf of a registered caller.
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            router::auth,
        ));

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .nest("/users", users_router)
        .nest("/group", group_router)
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    // `CONFIG_PATH` overrides the default `config.yaml` location.
    let path = std::env::var("CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_default();
    let config = config::Configuration::default().path(path).read()?;

    let db = match config.postgres {
        Some(ref config) => {
            database::Database::new(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    // handle push notification delivery.
    let notify = if let Some(cfg) = &config.push {
        notify::Notifier::new(cfg)
    } else {
        notify::Notifier::default()
    };

    Ok(AppState { config, db, notify })
}
