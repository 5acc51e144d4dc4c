use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::AuthUser;
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::rewards::grading::RoadmapInput;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_roadmap))
        .route("/:id", get(get_roadmap))
}

async fn register_roadmap(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RoadmapInput>,
) -> Result<axum::response::Response, AppError> {
    let outcome = state
        .rewards()
        .grader()
        .register_roadmap(&auth.user_id, req)
        .await?;
    state
        .rewards()
        .ledger()
        .refresh_display_name(&auth.user_id, auth.display_name.as_deref())
        .await;
    if outcome.created {
        Ok(created(outcome).into_response())
    } else {
        Ok(ok(outcome).into_response())
    }
}

async fn get_roadmap(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.rewards().grader().roadmap_view(&auth.user_id, &id)?;
    Ok(ok(view))
}
