use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::rewards::quests::DailyQuestView;
use crate::rewards::types::QuestType;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_daily_quests).post(post_daily_quests))
}

fn default_increment() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum QuestActionRequest {
    #[serde(rename_all = "camelCase")]
    UpdateProgress {
        progress_type: QuestType,
        #[serde(default = "default_increment")]
        increment: u32,
    },
    #[serde(rename_all = "camelCase")]
    Claim { quest_id: String },
}

async fn get_daily_quests(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let quests = state.rewards().quests();
    let date = quests.today(Utc::now());
    let set = quests.get_or_init(&auth.user_id, &date)?;
    Ok(ok(DailyQuestView::from(set)))
}

async fn post_daily_quests(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<QuestActionRequest>,
) -> Result<axum::response::Response, AppError> {
    let quests = state.rewards().quests();
    let date = quests.today(Utc::now());

    let response = match req {
        QuestActionRequest::UpdateProgress {
            progress_type,
            increment,
        } => {
            let set = quests.update_progress(&auth.user_id, &date, progress_type, increment)?;
            ok(DailyQuestView::from(set)).into_response()
        }
        QuestActionRequest::Claim { quest_id } => {
            let outcome = quests.claim(&auth.user_id, &date, &quest_id).await?;
            state
                .rewards()
                .ledger()
                .refresh_display_name(&auth.user_id, auth.display_name.as_deref())
                .await;
            ok(outcome).into_response()
        }
    };
    Ok(response)
}
