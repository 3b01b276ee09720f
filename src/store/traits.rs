//! Unified `Database` trait — single async interface for all persistence.
//!
//! Handlers and the dispatcher depend on this trait rather than on the
//! libSQL backend directly, so tests can substitute an in-memory instance
//! (or a stub) without touching the HTTP layer.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::model::{
    CallStatus, Event, EventStatus, Guest, NewEvent, NewGuest, NewRsvp, Rsvp, RsvpSummary,
};

/// Backend-agnostic database trait covering events, guests, and RSVPs.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Events ──────────────────────────────────────────────────────

    /// Insert a new event in `Draft` status. Returns the stored row.
    async fn create_event(&self, new: &NewEvent) -> Result<Event, DatabaseError>;

    /// Get an event by ID. `NotFound` if it does not exist.
    async fn get_event(&self, id: i64) -> Result<Event, DatabaseError>;

    /// List events created by a user, most recent first.
    async fn events_for_user(&self, user_email: &str) -> Result<Vec<Event>, DatabaseError>;

    /// Update an event's lifecycle status.
    async fn update_event_status(
        &self,
        id: i64,
        status: &EventStatus,
    ) -> Result<(), DatabaseError>;

    /// Store the finalized (possibly user-edited) invitation script.
    async fn update_event_script(&self, id: i64, script: &str) -> Result<(), DatabaseError>;

    /// Attach a cloned-voice model ID to an event.
    async fn update_event_voice_sample(
        &self,
        id: i64,
        voice_sample_id: &str,
    ) -> Result<(), DatabaseError>;

    // ── Guests ──────────────────────────────────────────────────────

    /// Insert one guest for an event. Returns the stored row.
    async fn create_guest(&self, event_id: i64, new: &NewGuest) -> Result<Guest, DatabaseError>;

    /// Insert a batch of guests for an event, preserving input order.
    async fn add_guests(
        &self,
        event_id: i64,
        guests: &[NewGuest],
    ) -> Result<Vec<Guest>, DatabaseError>;

    /// Get a guest by ID. `NotFound` if it does not exist.
    async fn get_guest(&self, id: i64) -> Result<Guest, DatabaseError>;

    /// List an event's guests in insertion order.
    async fn guests_for_event(&self, event_id: i64) -> Result<Vec<Guest>, DatabaseError>;

    /// Update a guest's call status.
    async fn update_guest_call_status(
        &self,
        id: i64,
        status: CallStatus,
    ) -> Result<(), DatabaseError>;

    // ── RSVPs ───────────────────────────────────────────────────────

    /// Record an RSVP row. Append-only: a re-called guest gets a new row.
    async fn create_rsvp(
        &self,
        guest_id: i64,
        event_id: i64,
        new: &NewRsvp,
    ) -> Result<Rsvp, DatabaseError>;

    /// List all RSVP rows for an event, most recent first.
    async fn rsvps_for_event(&self, event_id: i64) -> Result<Vec<Rsvp>, DatabaseError>;

    /// Aggregate Yes/No/Maybe counts; `pending` is guests without any such
    /// row, clamped at zero.
    async fn rsvp_summary(&self, event_id: i64) -> Result<RsvpSummary, DatabaseError>;
}
