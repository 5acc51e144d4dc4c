use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::constants::XP_PER_LEVEL;
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::rewards::badges::{self, BadgeStatus};
use crate::rewards::types::UserProgress;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_stats).post(apply_action))
        .route("/badges", get(get_badges))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsView {
    #[serde(flatten)]
    progress: UserProgress,
    /// Total XP at which the next level starts.
    next_level_xp: u64,
}

async fn get_stats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let progress = state
        .rewards()
        .ledger()
        .snapshot(&auth.user_id, auth.display_name.as_deref())
        .await?;
    let next_level_xp = u64::from(progress.level).saturating_mul(XP_PER_LEVEL);
    Ok(ok(StatsView {
        progress,
        next_level_xp,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyActionRequest {
    action: String,
    #[serde(default)]
    value: Option<u32>,
}

async fn apply_action(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ApplyActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ledger = state.rewards().ledger();
    let outcome = ledger
        .apply_action(&auth.user_id, &req.action, req.value)
        .await?;
    ledger
        .refresh_display_name(&auth.user_id, auth.display_name.as_deref())
        .await;
    Ok(ok(outcome))
}

async fn get_badges(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let progress = state
        .rewards()
        .ledger()
        .snapshot(&auth.user_id, auth.display_name.as_deref())
        .await?;
    let catalog: Vec<BadgeStatus> = badges::catalog_for(&progress);
    Ok(ok(catalog))
}
