//! Core domain types — events, guests, RSVPs, and their lifecycle states.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an event.
///
/// The string forms are stable wire/database values; `Failed` carries a
/// human-readable reason appended after `"Failed - "`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EventStatus {
    Draft,
    Processing,
    CallsInitiated,
    ProcessedNoGuests,
    Failed(String),
}

impl EventStatus {
    pub fn as_db_string(&self) -> String {
        match self {
            EventStatus::Draft => "draft".to_string(),
            EventStatus::Processing => "processing".to_string(),
            EventStatus::CallsInitiated => "Calls Initiated".to_string(),
            EventStatus::ProcessedNoGuests => "Processed - No Guests".to_string(),
            EventStatus::Failed(reason) => format!("Failed - {reason}"),
        }
    }
}

impl From<EventStatus> for String {
    fn from(status: EventStatus) -> Self {
        status.as_db_string()
    }
}

impl From<String> for EventStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "processing" => EventStatus::Processing,
            "Calls Initiated" => EventStatus::CallsInitiated,
            "Processed - No Guests" => EventStatus::ProcessedNoGuests,
            other => match other.strip_prefix("Failed - ") {
                Some(reason) => EventStatus::Failed(reason.to_string()),
                None => EventStatus::Draft,
            },
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_string())
    }
}

/// Lifecycle state of the outbound call attempt for one guest.
///
/// Distinct from the RSVP content: a guest can have an RSVP row while the
/// call status tracks how the call itself went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum CallStatus {
    NotCalled,
    Initiated,
    RsvpReceived,
    NoResponse,
    FailedApiError,
    FailedStatusUpdate,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::NotCalled => "Not Called",
            CallStatus::Initiated => "Called - Initiated",
            CallStatus::RsvpReceived => "Called - RSVP Received",
            CallStatus::NoResponse => "Called - No Response",
            CallStatus::FailedApiError => "Failed - API Error",
            CallStatus::FailedStatusUpdate => "Failed - VAPI Status Update",
        }
    }
}

impl From<CallStatus> for String {
    fn from(status: CallStatus) -> Self {
        status.as_str().to_string()
    }
}

impl From<String> for CallStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Called - Initiated" => CallStatus::Initiated,
            "Called - RSVP Received" => CallStatus::RsvpReceived,
            "Called - No Response" => CallStatus::NoResponse,
            "Failed - API Error" => CallStatus::FailedApiError,
            "Failed - VAPI Status Update" => CallStatus::FailedStatusUpdate,
            _ => CallStatus::NotCalled,
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A guest's answer to the invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RsvpResponse {
    Yes,
    No,
    Maybe,
    NoResponse,
    CallFailed,
}

impl RsvpResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpResponse::Yes => "Yes",
            RsvpResponse::No => "No",
            RsvpResponse::Maybe => "Maybe",
            RsvpResponse::NoResponse => "No Response",
            RsvpResponse::CallFailed => "Call Failed",
        }
    }
}

impl From<RsvpResponse> for String {
    fn from(response: RsvpResponse) -> Self {
        response.as_str().to_string()
    }
}

impl From<String> for RsvpResponse {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Yes" => RsvpResponse::Yes,
            "No" => RsvpResponse::No,
            "Maybe" => RsvpResponse::Maybe,
            "Call Failed" => RsvpResponse::CallFailed,
            _ => RsvpResponse::NoResponse,
        }
    }
}

impl std::fmt::Display for RsvpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planned event, created from the intake form and mutated as the
/// invitation workflow advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub host_name: String,
    pub event_type: String,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    /// Free-form duration text, e.g. "3 hours".
    pub duration: String,
    pub location: String,
    pub cultural_preferences: Option<String>,
    pub special_instructions: Option<String>,
    pub rsvp_deadline: NaiveDate,
    pub user_email: String,
    /// Provider-side voice model ID when the host cloned their voice.
    pub voice_sample_id: Option<String>,
    pub status: EventStatus,
    pub guest_list_csv_path: Option<String>,
    pub background_music_url: Option<String>,
    /// The finalized (possibly user-edited) invitation script.
    pub final_invitation_script: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub host_name: String,
    pub event_type: String,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub duration: String,
    pub location: String,
    #[serde(default)]
    pub cultural_preferences: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
    pub rsvp_deadline: NaiveDate,
    pub user_email: String,
    #[serde(default)]
    pub voice_sample_id: Option<String>,
    #[serde(default)]
    pub guest_list_csv_path: Option<String>,
    #[serde(default)]
    pub background_music_url: Option<String>,
}

/// A guest on an event's list. Owned by the event; deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub id: i64,
    pub event_id: i64,
    pub guest_name: String,
    /// E.164 phone number, validated before persistence.
    pub phone_number: String,
    pub call_status: CallStatus,
}

/// Fields supplied when adding a guest to an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGuest {
    pub guest_name: String,
    pub phone_number: String,
}

/// One recorded call outcome for a guest. Append-only: a re-called guest
/// gets a second row rather than an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rsvp {
    pub id: i64,
    pub guest_id: i64,
    pub event_id: i64,
    pub response: RsvpResponse,
    pub summary: Option<String>,
    pub special_request: Option<String>,
    pub reminder_request: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when recording an RSVP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRsvp {
    pub response: RsvpResponse,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub special_request: Option<String>,
    #[serde(default)]
    pub reminder_request: Option<String>,
}

/// Aggregated RSVP counts for an event.
///
/// `pending` is the number of guests with no Yes/No/Maybe row yet,
/// clamped at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvpSummary {
    pub yes: i64,
    pub no: i64,
    pub maybe: i64,
    pub pending: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_status_round_trips_through_db_strings() {
        let cases = vec![
            EventStatus::Draft,
            EventStatus::Processing,
            EventStatus::CallsInitiated,
            EventStatus::ProcessedNoGuests,
            EventStatus::Failed("Script Generation Error".to_string()),
        ];
        for status in cases {
            let s = status.as_db_string();
            assert_eq!(EventStatus::from(s), status);
        }
    }

    #[test]
    fn failed_status_preserves_reason() {
        let status = EventStatus::from("Failed - Guest Creation Issue".to_string());
        assert_eq!(
            status,
            EventStatus::Failed("Guest Creation Issue".to_string())
        );
        assert_eq!(status.as_db_string(), "Failed - Guest Creation Issue");
    }

    #[test]
    fn unknown_event_status_falls_back_to_draft() {
        assert_eq!(EventStatus::from("Pending".to_string()), EventStatus::Draft);
    }

    #[test]
    fn call_status_strings_are_exact() {
        assert_eq!(CallStatus::NotCalled.as_str(), "Not Called");
        assert_eq!(CallStatus::Initiated.as_str(), "Called - Initiated");
        assert_eq!(CallStatus::RsvpReceived.as_str(), "Called - RSVP Received");
        assert_eq!(CallStatus::NoResponse.as_str(), "Called - No Response");
        assert_eq!(CallStatus::FailedApiError.as_str(), "Failed - API Error");
        assert_eq!(
            CallStatus::FailedStatusUpdate.as_str(),
            "Failed - VAPI Status Update"
        );
    }

    #[test]
    fn call_status_round_trips() {
        for status in [
            CallStatus::NotCalled,
            CallStatus::Initiated,
            CallStatus::RsvpReceived,
            CallStatus::NoResponse,
            CallStatus::FailedApiError,
            CallStatus::FailedStatusUpdate,
        ] {
            assert_eq!(CallStatus::from(status.as_str().to_string()), status);
        }
    }

    #[test]
    fn rsvp_response_serializes_to_wire_strings() {
        let json = serde_json::to_string(&RsvpResponse::NoResponse).unwrap();
        assert_eq!(json, "\"No Response\"");
        let back: RsvpResponse = serde_json::from_str("\"Call Failed\"").unwrap();
        assert_eq!(back, RsvpResponse::CallFailed);
    }

    #[test]
    fn unknown_rsvp_response_becomes_no_response() {
        assert_eq!(
            RsvpResponse::from("Definitely".to_string()),
            RsvpResponse::NoResponse
        );
    }
}
