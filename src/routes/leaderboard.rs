use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::constants::{DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT};
use crate::extractors::QueryParams;
use crate::response::{ok, AppError};
use crate::rewards::leaderboard::{rank_changes, LeaderboardEntry, LeaderboardWindow, RankChange};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_leaderboard))
        .route("/stream", get(stream_leaderboard))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardQuery {
    #[serde(default)]
    window: LeaderboardWindow,
    limit: Option<usize>,
}

impl LeaderboardQuery {
    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, MAX_LEADERBOARD_LIMIT)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardView {
    window: LeaderboardWindow,
    entries: Vec<LeaderboardEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    changes: Option<Vec<RankChange>>,
}

async fn get_leaderboard(
    _auth: AuthUser,
    State(state): State<AppState>,
    QueryParams(q): QueryParams<LeaderboardQuery>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.rewards().leaderboard().ranking(q.window, q.limit())?;
    Ok(ok(LeaderboardView {
        window: q.window,
        entries,
        changes: None,
    }))
}

/// Pushes the ranking whenever it changes between polls, with rank deltas against the
/// previous push on this connection.
async fn stream_leaderboard(
    auth: AuthUser,
    State(state): State<AppState>,
    QueryParams(q): QueryParams<LeaderboardQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let guard = state
        .try_acquire_sse()
        .ok_or_else(|| AppError::too_many_requests("Too many SSE connections"))?;

    let window = q.window;
    let limit = q.limit();
    let poll = Duration::from_secs(state.config().rewards.leaderboard_poll_secs);
    let mut shutdown_rx = state.shutdown_rx();
    tracing::debug!(user_id = %auth.user_id, ?window, "Leaderboard stream opened");

    let stream = async_stream::stream! {
        let _guard = guard;
        let mut interval = tokio::time::interval(poll);
        let mut previous: Option<Vec<LeaderboardEntry>> = None;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let entries = match state.rewards().leaderboard().ranking(window, limit) {
                        Ok(entries) => entries,
                        Err(e) => {
                            tracing::warn!(error = %e, "Leaderboard poll failed");
                            continue;
                        }
                    };
                    if previous.as_ref() == Some(&entries) {
                        continue;
                    }

                    let changes = previous.as_ref().map(|prev| {
                        let previous_ids: Vec<&str> = prev.iter().map(|e| e.id.as_str()).collect();
                        let current_ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
                        rank_changes(&previous_ids, &current_ids)
                    });
                    let view = LeaderboardView { window, entries: entries.clone(), changes };

                    if let Ok(json) = serde_json::to_string(&view) {
                        yield Ok(Event::default().event("leaderboard").data(json));
                    }
                    previous = Some(entries);
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
