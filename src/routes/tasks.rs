use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;

use crate::auth::AuthUser;
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::rewards::grading::GradeRequest;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/grade", post(grade_task))
}

async fn grade_task(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<GradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.rewards().grader().grade_task(&auth.user_id, req).await?;
    state
        .rewards()
        .ledger()
        .refresh_display_name(&auth.user_id, auth.display_name.as_deref())
        .await;
    Ok(ok(outcome))
}
