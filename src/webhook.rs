//! Inbound call-provider webhooks.
//!
//! Two payload shapes arrive here: a flat callback with `status` and
//! `metadata` at the top level, and a structured envelope wrapping a
//! `message` with a `type` discriminator. Both correlate back to a guest
//! and event through string IDs echoed in `metadata`; a payload whose IDs
//! are missing or malformed is rejected before anything is persisted,
//! because a dropped webhook means a lost RSVP.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{DatabaseError, Error, WebhookError};
use crate::model::{CallStatus, NewRsvp, RsvpResponse};
use crate::store::Database;

const NO_TRANSCRIPTION_SUMMARY: &str = "Call ended, no transcription received.";
const FAILED_CALL_SUMMARY: &str = "Vapi call failed";

/// Applies webhook payloads to guest and RSVP state.
pub struct WebhookProcessor {
    db: Arc<dyn Database>,
}

impl WebhookProcessor {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Handle the flat callback shape posted to `/vapi/callback`.
    pub async fn process_callback(&self, payload: &Value) -> Result<(), Error> {
        let metadata = payload.get("metadata").unwrap_or(&Value::Null);
        let guest_id = parse_correlation_id(metadata, "guestId")?;
        let event_id = parse_correlation_id(metadata, "eventId")?;

        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match status {
            "ended" | "success" => {
                if let Some(text) = transcript_text(payload) {
                    let response = classify_transcript(&text);
                    info!(guest_id, event_id, response = response.as_str(), "RSVP from transcript");
                    self.db
                        .create_rsvp(
                            guest_id,
                            event_id,
                            &NewRsvp {
                                response,
                                summary: Some(text),
                                special_request: None,
                                reminder_request: None,
                            },
                        )
                        .await?;
                    self.db
                        .update_guest_call_status(guest_id, CallStatus::RsvpReceived)
                        .await?;
                } else {
                    info!(guest_id, event_id, "Call ended without transcription");
                    self.db
                        .update_guest_call_status(guest_id, CallStatus::NoResponse)
                        .await?;
                    self.db
                        .create_rsvp(
                            guest_id,
                            event_id,
                            &NewRsvp {
                                response: RsvpResponse::NoResponse,
                                summary: Some(NO_TRANSCRIPTION_SUMMARY.to_string()),
                                special_request: None,
                                reminder_request: None,
                            },
                        )
                        .await?;
                }
            }
            "failed" => {
                warn!(guest_id, event_id, "Provider reported call failure");
                self.db
                    .update_guest_call_status(guest_id, CallStatus::FailedApiError)
                    .await?;
                let summary = payload
                    .get("summary")
                    .and_then(Value::as_str)
                    .or_else(|| payload.get("errorMessage").and_then(Value::as_str))
                    .unwrap_or(FAILED_CALL_SUMMARY)
                    .to_string();
                self.db
                    .create_rsvp(
                        guest_id,
                        event_id,
                        &NewRsvp {
                            response: RsvpResponse::CallFailed,
                            summary: Some(summary),
                            special_request: None,
                            reminder_request: None,
                        },
                    )
                    .await?;
            }
            other => {
                debug!(guest_id, status = other, "Ignoring callback status");
            }
        }

        Ok(())
    }

    /// Handle the structured envelope posted to `/webhook`.
    ///
    /// Some senders post the inner message directly; `message` falls back
    /// to the whole payload when the wrapper is absent.
    pub async fn process_event(&self, payload: &Value) -> Result<(), Error> {
        let message = payload.get("message").unwrap_or(payload);
        let kind = message
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match kind {
            "status-update" => self.apply_status_update(message).await,
            "end-of-call-report" => self.apply_call_report(message).await,
            other => {
                debug!(kind = other, "Ignoring webhook event type");
                Ok(())
            }
        }
    }

    /// `status-update` is only used to catch failures. A failure never
    /// overwrites `Called - RSVP Received`: the report webhook may have
    /// landed first and the RSVP is already on record.
    async fn apply_status_update(&self, message: &Value) -> Result<(), Error> {
        let status = message
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if status != "failed" {
            return Ok(());
        }

        let metadata = message
            .pointer("/call/metadata")
            .unwrap_or(&Value::Null);
        let guest_id = parse_correlation_id(metadata, "guestId")?;

        let guest = match self.db.get_guest(guest_id).await {
            Ok(guest) => guest,
            Err(DatabaseError::NotFound { .. }) => {
                warn!(guest_id, "Status update for unknown guest");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if guest.call_status == CallStatus::RsvpReceived {
            info!(guest_id, "RSVP already received, keeping call status");
            return Ok(());
        }

        info!(guest_id, "Marking call failed from status update");
        self.db
            .update_guest_call_status(guest_id, CallStatus::FailedStatusUpdate)
            .await?;
        Ok(())
    }

    /// `end-of-call-report` is the authoritative RSVP source.
    async fn apply_call_report(&self, message: &Value) -> Result<(), Error> {
        let metadata = message
            .pointer("/call/metadata")
            .unwrap_or(&Value::Null);
        let guest_id = parse_correlation_id(metadata, "guestId")?;
        let event_id = parse_correlation_id(metadata, "eventId")?;

        let analysis = message.get("analysis").unwrap_or(&Value::Null);
        let structured = analysis.get("structuredData").unwrap_or(&Value::Null);

        let response = structured
            .get("rsvp_response")
            .and_then(Value::as_str)
            .map(normalize_response)
            .unwrap_or(RsvpResponse::NoResponse);

        let rsvp = NewRsvp {
            response,
            summary: analysis
                .get("summary")
                .and_then(Value::as_str)
                .map(str::to_string),
            special_request: structured
                .get("special_request")
                .and_then(Value::as_str)
                .map(str::to_string),
            reminder_request: structured
                .get("reminder_call_details")
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        info!(guest_id, event_id, response = rsvp.response.as_str(), "RSVP from call report");
        self.db.create_rsvp(guest_id, event_id, &rsvp).await?;
        self.db
            .update_guest_call_status(guest_id, CallStatus::RsvpReceived)
            .await?;
        Ok(())
    }
}

/// Pull a correlation ID out of webhook metadata.
///
/// Providers echo the IDs back as strings; a bare integer is tolerated
/// too. Empty strings count as missing.
fn parse_correlation_id(metadata: &Value, field: &'static str) -> Result<i64, WebhookError> {
    match metadata.get(field) {
        None | Some(Value::Null) => Err(WebhookError::MissingId { field }),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| WebhookError::MalformedId {
            field,
            value: n.to_string(),
        }),
        Some(Value::String(s)) if s.is_empty() => Err(WebhookError::MissingId { field }),
        Some(Value::String(s)) => s.parse::<i64>().map_err(|_| WebhookError::MalformedId {
            field,
            value: s.clone(),
        }),
        Some(other) => Err(WebhookError::MalformedId {
            field,
            value: other.to_string(),
        }),
    }
}

/// First non-empty transcript-like field in the flat callback payload.
fn transcript_text(payload: &Value) -> Option<String> {
    ["transcription", "transcript", "summary"]
        .iter()
        .filter_map(|key| payload.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Best-effort RSVP classification of free-form transcript text.
///
/// Substring checks run in a fixed order: yes, no, then maybe. The order
/// matters ("no" also matches inside "not sure").
fn classify_transcript(text: &str) -> RsvpResponse {
    let lowered = text.to_lowercase();
    if lowered.contains("yes") {
        RsvpResponse::Yes
    } else if lowered.contains("no") {
        RsvpResponse::No
    } else if lowered.contains("maybe") || lowered.contains("not sure") {
        RsvpResponse::Maybe
    } else {
        RsvpResponse::NoResponse
    }
}

/// Normalize a structured `rsvp_response` value. Anything outside
/// {Yes, No, Maybe} collapses to No Response.
fn normalize_response(raw: &str) -> RsvpResponse {
    match raw.trim().to_lowercase().as_str() {
        "yes" => RsvpResponse::Yes,
        "no" => RsvpResponse::No,
        "maybe" => RsvpResponse::Maybe,
        _ => RsvpResponse::NoResponse,
    }
}
