use axum::{extract::State, response::Json, routing::get, Extension, Router};
use serde::Serialize;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{AuthError, Session};
use crate::models::{
    summarize_exit_velocity, AssignedDrill, ExitVelocitySummary, Metric, Player, PlayerProfile,
    SharedNote,
};

/// Routes for the signed-in player. The player is always the token subject.
pub fn player_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/metrics", get(metrics))
        .route("/notes", get(notes))
        .route("/drills", get(drills))
}

#[derive(Debug, Serialize)]
pub struct PlayerDashboard {
    pub player: PlayerProfile,
    pub exit_velocity: ExitVelocitySummary,
    pub metrics: Vec<Metric>,
    pub notes: Vec<SharedNote>,
    pub assignments: Vec<AssignedDrill>,
}

/// A deleted player's token stays signed but no longer maps to an account
async fn current_player(state: &AppState, session: &Session) -> Result<Player, ApiError> {
    state
        .players
        .get_player(session.account_id)
        .await?
        .ok_or(ApiError::Auth(AuthError::AccountNotFound))
}

async fn shared_notes(state: &AppState, player: &Player) -> Result<Vec<SharedNote>, ApiError> {
    let notes = state.notes.shared_notes_for_player(player.id).await?;
    Ok(notes.into_iter().map(SharedNote::from).collect())
}

#[tracing::instrument(skip_all, fields(player_id = %session.account_id))]
async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<PlayerDashboard>, ApiError> {
    let player = current_player(&state, &session).await?;

    let metrics = state.metrics.metrics_for_player(player.id).await?;
    let notes = shared_notes(&state, &player).await?;
    let assignments = state.drills.assignments_for_player(player.id).await?;

    Ok(Json(PlayerDashboard {
        player: player.profile(),
        exit_velocity: summarize_exit_velocity(&metrics),
        metrics,
        notes,
        assignments,
    }))
}

#[tracing::instrument(skip_all, fields(player_id = %session.account_id))]
async fn metrics(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Metric>>, ApiError> {
    let player = current_player(&state, &session).await?;
    Ok(Json(state.metrics.metrics_for_player(player.id).await?))
}

#[tracing::instrument(skip_all, fields(player_id = %session.account_id))]
async fn notes(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<SharedNote>>, ApiError> {
    let player = current_player(&state, &session).await?;
    Ok(Json(shared_notes(&state, &player).await?))
}

#[tracing::instrument(skip_all, fields(player_id = %session.account_id))]
async fn drills(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<AssignedDrill>>, ApiError> {
    let player = current_player(&state, &session).await?;
    Ok(Json(state.drills.assignments_for_player(player.id).await?))
}
