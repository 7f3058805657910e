use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{AccountInfo, Session};
use crate::models::{
    group_into_clients, summarize_exit_velocity, validate_name, validate_sms_body, AssignDrill,
    AssignedDrill, ClientGroup, CreateDrill, CreateInstructor, CreateMetric, CreateNote,
    CreatePlayer, Drill, DrillAssignment, ExitVelocitySummary, Instructor, Metric, Note, Player,
    PlayerQuery, PlayerSummary, UpdateDrill, UpdateNote, UpdatePlayer, DEFAULT_INSTRUCTOR_NAME,
};
use crate::services::{ImportOptions, ImportReport, SmsOutcome, MAX_IMPORT_BYTES};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

type PlayerPath = WithRejection<Path<Uuid>, ApiError>;

pub fn instructor_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/players", get(list_players).post(create_player))
        .route(
            "/players/:player_id",
            get(get_player).put(update_player).delete(delete_player),
        )
        .route("/players/:player_id/login-code", post(regenerate_login_code))
        .route(
            "/players/:player_id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route("/players/:player_id/metrics", post(record_metric))
        .route("/players/:player_id/notes", post(create_note))
        .route("/players/:player_id/drills", post(assign_drill))
        .route("/players/:player_id/sms", post(send_sms))
        .route("/metrics/:metric_id", delete(delete_metric))
        .route("/notes/:note_id", put(update_note).delete(delete_note))
        .route("/assignments/:assignment_id", delete(unassign_drill))
        .route("/drills", get(list_drills).post(create_drill))
        .route(
            "/drills/:drill_id",
            get(get_drill).put(update_drill).delete(delete_drill),
        )
        .route("/import", post(import_roster))
        .route("/instructors", post(create_instructor))
}

#[derive(Debug, Serialize)]
pub struct InstructorDashboard {
    pub instructor: AccountInfo,
    pub total_players: usize,
    pub favorites: Vec<PlayerSummary>,
    pub clients: Vec<ClientGroup>,
    pub sms_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct PlayerListResponse {
    pub players: Vec<PlayerSummary>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct PlayerCreatedResponse {
    pub player: PlayerSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsOutcome>,
}

#[derive(Debug, Serialize)]
pub struct PlayerDetail {
    pub player: PlayerSummary,
    pub exit_velocity: ExitVelocitySummary,
    pub metrics: Vec<Metric>,
    pub notes: Vec<Note>,
    pub assignments: Vec<AssignedDrill>,
}

#[derive(Debug, Serialize)]
pub struct LoginCodeResponse {
    pub player_id: Uuid,
    pub login_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsOutcome>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub player_id: Uuid,
    pub is_favorite: bool,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub note: Note,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsOutcome>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub assignment: DrillAssignment,
    pub sms: SmsOutcome,
}

#[derive(Debug, Deserialize)]
pub struct SendSmsRequest {
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotifyQuery {
    #[serde(default)]
    pub notify: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub notify: bool,
}

fn page_bounds(query: &PlayerQuery) -> Result<(i64, i64), ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if offset < 0 {
        return Err(ApiError::Validation("offset cannot be negative".to_string()));
    }

    Ok((limit, offset))
}

async fn require_player(state: &AppState, player_id: Uuid) -> Result<Player, ApiError> {
    state
        .players
        .get_player(player_id)
        .await?
        .ok_or(ApiError::NotFound("Player"))
}

fn deleted(found: bool, what: &'static str) -> Result<StatusCode, ApiError> {
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(what))
    }
}

/// Roster grouped into clients by age, with this instructor's favorites
#[tracing::instrument(skip(state, session), fields(instructor_id = %session.account_id))]
async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<InstructorDashboard>, ApiError> {
    let players = state.players.all_players(session.account_id).await?;
    let favorites: Vec<PlayerSummary> = players.iter().filter(|p| p.is_favorite).cloned().collect();

    Ok(Json(InstructorDashboard {
        instructor: session.account(),
        total_players: players.len(),
        favorites,
        clients: group_into_clients(players),
        sms_enabled: state.sms.is_enabled(),
    }))
}

#[tracing::instrument(skip(state, session, query))]
async fn list_players(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Query(query), _): WithRejection<Query<PlayerQuery>, ApiError>,
) -> Result<Json<PlayerListResponse>, ApiError> {
    let (limit, offset) = page_bounds(&query)?;
    let players = state
        .players
        .list_players(session.account_id, &query, limit, offset)
        .await?;

    Ok(Json(PlayerListResponse {
        players,
        limit,
        offset,
    }))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_player(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(request), _): WithRejection<Json<CreatePlayer>, ApiError>,
) -> Result<(StatusCode, Json<PlayerCreatedResponse>), ApiError> {
    let new_player = request
        .validate(Some(session.account_id))
        .map_err(ApiError::validation)?;
    let player = state.players.create_player(new_player).await?;

    let sms = if request.notify {
        let body = state.sms.login_code_message(&player.name, &player.login_code);
        Some(state.sms.send(player.phone.as_deref(), &body).await)
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(PlayerCreatedResponse {
            player: player.summary(false),
            sms,
        }),
    ))
}

/// Everything recorded for one player
#[tracing::instrument(skip(state, session))]
async fn get_player(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Path(player_id), _): PlayerPath,
) -> Result<Json<PlayerDetail>, ApiError> {
    let player = require_player(&state, player_id).await?;
    let is_favorite = state
        .players
        .is_favorite(session.account_id, player_id)
        .await?;

    let metrics = state.metrics.metrics_for_player(player_id).await?;
    let notes = state.notes.notes_for_player(player_id).await?;
    let assignments = state.drills.assignments_for_player(player_id).await?;

    Ok(Json(PlayerDetail {
        player: player.summary(is_favorite),
        exit_velocity: summarize_exit_velocity(&metrics),
        metrics,
        notes,
        assignments,
    }))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_player(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Path(player_id), _): PlayerPath,
    WithRejection(Json(request), _): WithRejection<Json<UpdatePlayer>, ApiError>,
) -> Result<Json<PlayerSummary>, ApiError> {
    let changes = request.validate().map_err(ApiError::validation)?;
    if changes.is_empty() {
        return Err(ApiError::Validation("No changes supplied".to_string()));
    }

    let player = state
        .players
        .update_player(player_id, changes)
        .await?
        .ok_or(ApiError::NotFound("Player"))?;
    let is_favorite = state
        .players
        .is_favorite(session.account_id, player_id)
        .await?;

    tracing::info!(player_id = %player_id, "updated player");
    Ok(Json(player.summary(is_favorite)))
}

#[tracing::instrument(skip(state))]
async fn delete_player(
    State(state): State<AppState>,
    WithRejection(Path(player_id), _): PlayerPath,
) -> Result<StatusCode, ApiError> {
    let found = state.players.delete_player(player_id).await?;
    if found {
        tracing::info!(player_id = %player_id, "deleted player");
    }
    deleted(found, "Player")
}

/// Issue a new code; the previous one stops working immediately
#[tracing::instrument(skip(state, query))]
async fn regenerate_login_code(
    State(state): State<AppState>,
    WithRejection(Path(player_id), _): PlayerPath,
    WithRejection(Query(query), _): WithRejection<Query<NotifyQuery>, ApiError>,
) -> Result<Json<LoginCodeResponse>, ApiError> {
    let player = state
        .players
        .regenerate_login_code(player_id)
        .await?
        .ok_or(ApiError::NotFound("Player"))?;

    let sms = if query.notify {
        let body = state.sms.login_code_message(&player.name, &player.login_code);
        Some(state.sms.send(player.phone.as_deref(), &body).await)
    } else {
        None
    };

    Ok(Json(LoginCodeResponse {
        player_id: player.id,
        login_code: player.login_code,
        sms,
    }))
}

#[tracing::instrument(skip(state, session))]
async fn add_favorite(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Path(player_id), _): PlayerPath,
) -> Result<Json<FavoriteResponse>, ApiError> {
    require_player(&state, player_id).await?;
    state
        .players
        .add_favorite(session.account_id, player_id)
        .await?;

    Ok(Json(FavoriteResponse {
        player_id,
        is_favorite: true,
    }))
}

#[tracing::instrument(skip(state, session))]
async fn remove_favorite(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Path(player_id), _): PlayerPath,
) -> Result<Json<FavoriteResponse>, ApiError> {
    require_player(&state, player_id).await?;
    state
        .players
        .remove_favorite(session.account_id, player_id)
        .await?;

    Ok(Json(FavoriteResponse {
        player_id,
        is_favorite: false,
    }))
}

#[tracing::instrument(skip(state, request))]
async fn record_metric(
    State(state): State<AppState>,
    WithRejection(Path(player_id), _): PlayerPath,
    WithRejection(Json(request), _): WithRejection<Json<CreateMetric>, ApiError>,
) -> Result<(StatusCode, Json<Metric>), ApiError> {
    request.validate().map_err(ApiError::validation)?;
    require_player(&state, player_id).await?;

    let metric = state.metrics.record_metric(player_id, &request).await?;
    Ok((StatusCode::CREATED, Json(metric)))
}

#[tracing::instrument(skip(state))]
async fn delete_metric(
    State(state): State<AppState>,
    WithRejection(Path(metric_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<StatusCode, ApiError> {
    let found = state.metrics.delete_metric(metric_id).await?;
    deleted(found, "Metric")
}

#[tracing::instrument(skip(state, session, request))]
async fn create_note(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Path(player_id), _): PlayerPath,
    WithRejection(Json(request), _): WithRejection<Json<CreateNote>, ApiError>,
) -> Result<(StatusCode, Json<NoteResponse>), ApiError> {
    let text = request.validated_text().map_err(ApiError::validation)?;
    let player = require_player(&state, player_id).await?;

    let note = state
        .notes
        .create_note(player_id, session.account_id, &text, request.shared)
        .await?;
    tracing::info!(note_id = %note.id, player_id = %player_id, shared = note.shared, "created note");

    let sms = if note.shared {
        let body = state.sms.shared_note_message(&player.name);
        Some(state.sms.send(player.phone.as_deref(), &body).await)
    } else {
        None
    };

    Ok((StatusCode::CREATED, Json(NoteResponse { note, sms })))
}

/// Edit a note; flipping it to shared texts the player
#[tracing::instrument(skip(state, request))]
async fn update_note(
    State(state): State<AppState>,
    WithRejection(Path(note_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateNote>, ApiError>,
) -> Result<Json<NoteResponse>, ApiError> {
    let changes = request.validate().map_err(ApiError::validation)?;
    let existing = state
        .notes
        .get_note(note_id)
        .await?
        .ok_or(ApiError::NotFound("Note"))?;

    let note = state
        .notes
        .update_note(note_id, changes.text.as_deref(), changes.shared)
        .await?
        .ok_or(ApiError::NotFound("Note"))?;

    let sms = if note.shared && !existing.shared {
        match state.players.get_player(note.player_id).await? {
            Some(player) => {
                let body = state.sms.shared_note_message(&player.name);
                Some(state.sms.send(player.phone.as_deref(), &body).await)
            }
            None => None,
        }
    } else {
        None
    };

    Ok(Json(NoteResponse { note, sms }))
}

#[tracing::instrument(skip(state))]
async fn delete_note(
    State(state): State<AppState>,
    WithRejection(Path(note_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<StatusCode, ApiError> {
    let found = state.notes.delete_note(note_id).await?;
    deleted(found, "Note")
}

#[tracing::instrument(skip(state, session, request))]
async fn assign_drill(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Path(player_id), _): PlayerPath,
    WithRejection(Json(request), _): WithRejection<Json<AssignDrill>, ApiError>,
) -> Result<(StatusCode, Json<AssignmentResponse>), ApiError> {
    let note = request.validated_note().map_err(ApiError::validation)?;
    let player = require_player(&state, player_id).await?;
    let drill = state
        .drills
        .get_drill(request.drill_id)
        .await?
        .ok_or(ApiError::NotFound("Drill"))?;

    let assignment = state
        .drills
        .assign_drill(player_id, session.account_id, drill.id, note.as_deref())
        .await?;

    let body = state.sms.drill_assigned_message(&player.name, &drill.title);
    let sms = state.sms.send(player.phone.as_deref(), &body).await;

    Ok((
        StatusCode::CREATED,
        Json(AssignmentResponse { assignment, sms }),
    ))
}

#[tracing::instrument(skip(state))]
async fn unassign_drill(
    State(state): State<AppState>,
    WithRejection(Path(assignment_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<StatusCode, ApiError> {
    let found = state.drills.unassign(assignment_id).await?;
    deleted(found, "Assignment")
}

/// Text a player a custom message
#[tracing::instrument(skip(state, request))]
async fn send_sms(
    State(state): State<AppState>,
    WithRejection(Path(player_id), _): PlayerPath,
    WithRejection(Json(request), _): WithRejection<Json<SendSmsRequest>, ApiError>,
) -> Result<Json<SmsOutcome>, ApiError> {
    let body = validate_sms_body(&request.body).map_err(ApiError::validation)?;
    let player = require_player(&state, player_id).await?;

    Ok(Json(state.sms.send(player.phone.as_deref(), &body).await))
}

#[tracing::instrument(skip(state))]
async fn list_drills(State(state): State<AppState>) -> Result<Json<Vec<Drill>>, ApiError> {
    Ok(Json(state.drills.list_drills().await?))
}

#[tracing::instrument(skip(state, request))]
async fn create_drill(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateDrill>, ApiError>,
) -> Result<(StatusCode, Json<Drill>), ApiError> {
    let fields = request.validate().map_err(ApiError::validation)?;
    let drill = state.drills.create_drill(&fields).await?;
    Ok((StatusCode::CREATED, Json(drill)))
}

#[tracing::instrument(skip(state))]
async fn get_drill(
    State(state): State<AppState>,
    WithRejection(Path(drill_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<Drill>, ApiError> {
    let drill = state
        .drills
        .get_drill(drill_id)
        .await?
        .ok_or(ApiError::NotFound("Drill"))?;
    Ok(Json(drill))
}

#[tracing::instrument(skip(state, request))]
async fn update_drill(
    State(state): State<AppState>,
    WithRejection(Path(drill_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateDrill>, ApiError>,
) -> Result<Json<Drill>, ApiError> {
    let changes = request.validate().map_err(ApiError::validation)?;
    let drill = state
        .drills
        .update_drill(drill_id, changes)
        .await?
        .ok_or(ApiError::NotFound("Drill"))?;
    Ok(Json(drill))
}

#[tracing::instrument(skip(state))]
async fn delete_drill(
    State(state): State<AppState>,
    WithRejection(Path(drill_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<StatusCode, ApiError> {
    let found = state.drills.delete_drill(drill_id).await?;
    deleted(found, "Drill")
}

/// Bulk-add players from a CSV upload (multipart field `file`)
#[tracing::instrument(skip(state, session, query, multipart))]
async fn import_roster(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Query(query), _): WithRejection<Query<ImportQuery>, ApiError>,
    WithRejection(mut multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<Json<ImportReport>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let data = field.bytes().await?;
        if data.len() > MAX_IMPORT_BYTES {
            return Err(ApiError::PayloadTooLarge(MAX_IMPORT_BYTES));
        }
        upload = Some(data);
        break;
    }

    let data = upload.ok_or_else(|| {
        ApiError::Validation("Upload a CSV file in the 'file' field".to_string())
    })?;

    let report = state
        .roster_import
        .import(
            &data,
            session.account_id,
            ImportOptions {
                strict: query.strict,
                notify: query.notify,
            },
        )
        .await?;

    Ok(Json(report))
}

/// Add another instructor; the generated login code is returned once here
#[tracing::instrument(skip(state, request))]
async fn create_instructor(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateInstructor>, ApiError>,
) -> Result<(StatusCode, Json<Instructor>), ApiError> {
    let name = match request.name.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_INSTRUCTOR_NAME.to_string(),
        Some(name) => validate_name(name).map_err(ApiError::validation)?,
    };

    let instructor = state.instructors.create_instructor(&name).await?;
    Ok((StatusCode::CREATED, Json(instructor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn page_bounds_defaults_and_limits() {
        assert_eq!(page_bounds(&PlayerQuery::default()).unwrap(), (50, 0));

        let query = PlayerQuery {
            limit: Some(100),
            offset: Some(200),
            ..Default::default()
        };
        assert_eq!(page_bounds(&query).unwrap(), (100, 200));

        for limit in [0, 101, -1] {
            let query = PlayerQuery {
                limit: Some(limit),
                ..Default::default()
            };
            assert_matches!(page_bounds(&query), Err(ApiError::Validation(_)));
        }

        let query = PlayerQuery {
            offset: Some(-5),
            ..Default::default()
        };
        assert_matches!(page_bounds(&query), Err(ApiError::Validation(_)));
    }

    #[test]
    fn deleted_maps_missing_rows_to_not_found() {
        assert_eq!(deleted(true, "Note").unwrap(), StatusCode::NO_CONTENT);
        assert_matches!(deleted(false, "Note"), Err(ApiError::NotFound("Note")));
    }
}
