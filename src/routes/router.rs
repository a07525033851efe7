use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::Method,
    middleware,
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{self, CorsLayer},
    trace::TraceLayer,
};
use tracing::info_span;

use crate::core::error;
use crate::core::state::AppState;
use crate::routes::users;
use crate::utils;

pub(crate) fn routes(state: AppState) -> Router {
    // Every record operation sits behind the token authorizer; the
    // handlers re-check ownership per record.
    let user_router = Router::new()
        .route("/", get(users::list).post(users::create))
        .route(
            "/{id}",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            utils::auth::authorize,
        ));

    Router::new()
        .route("/", get(|| async { "OK" }))
        .nest("/users", user_router)
        .with_state(state)
        .route_layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                        let matched_path = request
                            .extensions()
                            .get::<MatchedPath>()
                            .map(MatchedPath::as_str);

                        info_span!(
                            "request",
                            method = ?request.method(),
                            matched_path,
                        )
                    }),
                )
                .layer(HandleErrorLayer::new(error::handle_middleware_errors))
                .buffer(128)
                .rate_limit(50, Duration::from_secs(1))
                .layer(
                    CorsLayer::new()
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                        .allow_origin(cors::Any),
                ),
        )
}
