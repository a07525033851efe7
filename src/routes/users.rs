use axum::Extension;
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum_macros::debug_handler;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::authorizer::IdentityContext;
use crate::core::error::Error;
use crate::core::state::AppState;
use crate::types::request::{NewUserData, UpdateUserData};
use crate::types::response::Deleted;
use crate::types::user::UserRecord;

#[instrument(skip(state, identity))]
pub(crate) async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
) -> Result<Json<Vec<UserRecord>>, Error> {
    let records = state.records.list_all(&identity).await?;

    Ok(Json(records))
}

#[debug_handler]
#[instrument(skip(state, identity, params))]
pub(crate) async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Json(params): Json<NewUserData>,
) -> Result<(StatusCode, Json<UserRecord>), Error> {
    let record = state.records.create(&identity, params).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

#[instrument(skip(state, identity))]
pub(crate) async fn get(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserRecord>, Error> {
    let record = state.records.get(&identity, id).await?;

    Ok(Json(record))
}

#[instrument(skip(state, identity, params))]
pub(crate) async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateUserData>,
) -> Result<Json<UserRecord>, Error> {
    let record = state.records.update(&identity, id, params).await?;

    Ok(Json(record))
}

#[instrument(skip(state, identity))]
pub(crate) async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, Error> {
    let outcome = state.records.delete(&identity, id).await?;

    Ok(Json(outcome))
}
