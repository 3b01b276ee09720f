//! REST endpoints for events, guests, scripts, calls, and inbound webhooks.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::dispatch::{CallDispatcher, VoiceChoice};
use crate::error::{DatabaseError, Error};
use crate::guests::{is_e164, parse_guest_csv};
use crate::model::{NewEvent, NewGuest};
use crate::providers::VoiceCloneClient;
use crate::script::ScriptTemplater;
use crate::store::Database;
use crate::webhook::WebhookProcessor;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub dispatcher: Arc<CallDispatcher>,
    pub webhooks: Arc<WebhookProcessor>,
    pub templater: Arc<ScriptTemplater>,
    /// None when voice cloning is not configured.
    pub voice_clone: Option<Arc<VoiceCloneClient>>,
}

/// Build the Axum router with all REST and webhook routes.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/events", post(create_event).get(list_events))
        .route("/api/events/{id}", get(get_event))
        .route("/api/events/{id}/guests", post(add_guests))
        .route("/api/events/{id}/script", get(get_script).post(save_script))
        .route("/api/events/{id}/calls", post(dispatch_calls))
        .route("/api/events/{id}/summary", get(rsvp_summary))
        .route("/api/events/{id}/voice", post(clone_voice))
        .route("/vapi/callback", post(vapi_callback))
        .route("/webhook", post(webhook))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Handler-level error mapped onto an HTTP status and JSON body.
enum ApiError {
    BadRequest(String),
    Unavailable(String),
    Service(Error),
}

impl<E: Into<Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError::Service(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            ApiError::Service(Error::Webhook(e)) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Service(Error::Database(DatabaseError::NotFound { entity, id })) => (
                StatusCode::NOT_FOUND,
                format!("{entity} {id} not found"),
            ),
            ApiError::Service(Error::Database(DatabaseError::Constraint(message))) => {
                (StatusCode::BAD_REQUEST, message)
            }
            ApiError::Service(Error::Provider(e)) => {
                error!(error = %e, "Provider request failed");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            ApiError::Service(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (
            status,
            Json(serde_json::json!({"status": "error", "message": message})),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "callvite"
    }))
}

// ── Events ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateEventRequest {
    user_email: String,
    host_name: String,
    event_type: String,
    /// `YYYY-MM-DD`.
    event_date: String,
    /// `HH:MM` or `HH:MM:SS`.
    event_time: String,
    /// Free-form, e.g. "3 hours".
    #[serde(default)]
    duration: String,
    location: String,
    rsvp_deadline: String,
    #[serde(default)]
    cultural_preferences: Option<String>,
    #[serde(default)]
    special_instructions: Option<String>,
    #[serde(default)]
    guest_list_csv_path: Option<String>,
    #[serde(default)]
    background_music_url: Option<String>,
}

fn parse_date(value: &str, field: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{field} must be YYYY-MM-DD, got {value:?}")))
}

fn parse_time(value: &str, field: &str) -> ApiResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ApiError::BadRequest(format!("{field} must be HH:MM, got {value:?}")))
}

fn required(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    let new_event = NewEvent {
        user_email: required(&request.user_email, "user_email")?,
        host_name: required(&request.host_name, "host_name")?,
        event_type: required(&request.event_type, "event_type")?,
        event_date: parse_date(&request.event_date, "event_date")?,
        event_time: parse_time(&request.event_time, "event_time")?,
        duration: request.duration.trim().to_string(),
        location: required(&request.location, "location")?,
        cultural_preferences: request.cultural_preferences,
        special_instructions: request.special_instructions,
        rsvp_deadline: parse_date(&request.rsvp_deadline, "rsvp_deadline")?,
        voice_sample_id: None,
        guest_list_csv_path: request.guest_list_csv_path,
        background_music_url: request.background_music_url,
    };

    let event = state.db.create_event(&new_event).await?;
    info!(event_id = event.id, host = %event.host_name, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
struct ListEventsQuery {
    email: String,
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<impl IntoResponse> {
    let events = state.db.events_for_user(&query.email).await?;
    Ok(Json(events))
}

async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let event = state.db.get_event(event_id).await?;
    Ok(Json(event))
}

// ── Guests ──────────────────────────────────────────────────────────────

/// Guests arrive either as an inline list or as a path to an uploaded CSV.
#[derive(Debug, Deserialize)]
struct AddGuestsRequest {
    #[serde(default)]
    guests: Vec<NewGuest>,
    #[serde(default)]
    csv_path: Option<String>,
}

async fn add_guests(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(request): Json<AddGuestsRequest>,
) -> ApiResult<impl IntoResponse> {
    // Fail early so guests are never attached to a missing event.
    state.db.get_event(event_id).await?;

    let mut entries = Vec::new();
    for guest in request.guests {
        let name = required(&guest.guest_name, "guest_name")?;
        let number = guest.phone_number.trim().to_string();
        if !is_e164(&number) {
            return Err(ApiError::BadRequest(format!(
                "phone number must be E.164 (+ followed by digits), got {number:?}"
            )));
        }
        entries.push(NewGuest {
            guest_name: name,
            phone_number: number,
        });
    }

    if let Some(csv_path) = &request.csv_path {
        for guest in parse_guest_csv(FsPath::new(csv_path)) {
            if is_e164(&guest.phone_number) {
                entries.push(guest);
            } else {
                warn!(
                    name = %guest.guest_name,
                    phone = %guest.phone_number,
                    "Skipping CSV guest with invalid phone number"
                );
            }
        }
    }

    if entries.is_empty() {
        return Err(ApiError::BadRequest(
            "no valid guests in request".to_string(),
        ));
    }

    let created = state.db.add_guests(event_id, &entries).await?;
    info!(event_id, count = created.len(), "Guests added");
    Ok((StatusCode::CREATED, Json(created)))
}

// ── Scripts ─────────────────────────────────────────────────────────────

async fn get_script(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let event = state.db.get_event(event_id).await?;
    let (script, edited) = match event.final_invitation_script.as_deref() {
        Some(saved) if !saved.trim().is_empty() => (saved.to_string(), true),
        _ => (state.templater.generate(&event), false),
    };
    Ok(Json(serde_json::json!({"script": script, "edited": edited})))
}

#[derive(Debug, Deserialize)]
struct SaveScriptRequest {
    script: String,
}

async fn save_script(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(request): Json<SaveScriptRequest>,
) -> ApiResult<impl IntoResponse> {
    let script = required(&request.script, "script")?;
    state.db.update_event_script(event_id, &script).await?;
    info!(event_id, "Invitation script saved");
    Ok(Json(serde_json::json!({"status": "saved"})))
}

// ── Calls ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct DispatchRequest {
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    batch: bool,
}

async fn dispatch_calls(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(request): Json<DispatchRequest>,
) -> ApiResult<impl IntoResponse> {
    let choice = VoiceChoice::parse(request.voice.as_deref().unwrap_or_default());
    let outcome = state
        .dispatcher
        .dispatch_event(event_id, choice, request.batch)
        .await?;
    Ok(Json(outcome))
}

async fn rsvp_summary(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.db.get_event(event_id).await?;
    let summary = state.db.rsvp_summary(event_id).await?;
    Ok(Json(summary))
}

// ── Voice cloning ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CloneVoiceRequest {
    sample_path: String,
}

async fn clone_voice(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(request): Json<CloneVoiceRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(client) = &state.voice_clone else {
        return Err(ApiError::Unavailable(
            "voice cloning is not configured".to_string(),
        ));
    };

    let event = state.db.get_event(event_id).await?;
    let voice_id = client
        .create_custom_voice(FsPath::new(&request.sample_path), &event.host_name)
        .await?;
    state.db.update_event_voice_sample(event_id, &voice_id).await?;
    Ok(Json(serde_json::json!({"voice_sample_id": voice_id})))
}

// ── Webhooks ────────────────────────────────────────────────────────────

async fn vapi_callback(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResult<impl IntoResponse> {
    state.webhooks.process_callback(&payload).await?;
    Ok(Json(serde_json::json!({"status": "Callback processed"})))
}

async fn webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResult<impl IntoResponse> {
    state.webhooks.process_event(&payload).await?;
    Ok(Json(serde_json::json!({"status": "Event received"})))
}
