//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Foreign keys are switched
//! on per connection so guest and RSVP rows cascade when an event is
//! deleted.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::model::{
    CallStatus, Event, EventStatus, Guest, NewEvent, NewGuest, NewRsvp, Rsvp, RsvpSummary,
};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path).build().await.map_err(|e| {
            DatabaseError::Connection(format!("Failed to open libSQL database: {e}"))
        })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.enable_foreign_keys().await?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.enable_foreign_keys().await?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn enable_foreign_keys(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to enable foreign keys: {e}")))?;
        Ok(())
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_date(s: &str, column: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::Query(format!("bad {column} value {s:?}: {e}")))
}

fn parse_time(s: &str, column: &str) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| DatabaseError::Query(format!("bad {column} value {s:?}: {e}")))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn get_text(row: &libsql::Row, idx: i32, column: &str) -> Result<String, DatabaseError> {
    row.get(idx)
        .map_err(|e| DatabaseError::Query(format!("column {column}: {e}")))
}

fn get_i64(row: &libsql::Row, idx: i32, column: &str) -> Result<i64, DatabaseError> {
    row.get(idx)
        .map_err(|e| DatabaseError::Query(format!("column {column}: {e}")))
}

/// Map a libsql Row to an Event. Column order matches EVENT_COLUMNS.
fn row_to_event(row: &libsql::Row) -> Result<Event, DatabaseError> {
    let event_date = parse_date(&get_text(row, 3, "event_date")?, "event_date")?;
    let event_time = parse_time(&get_text(row, 4, "event_time")?, "event_time")?;
    let rsvp_deadline = parse_date(&get_text(row, 9, "rsvp_deadline")?, "rsvp_deadline")?;
    let status = EventStatus::from(get_text(row, 12, "status")?);
    let created_at = parse_datetime(&get_text(row, 16, "created_at")?);

    Ok(Event {
        id: get_i64(row, 0, "id")?,
        host_name: get_text(row, 1, "host_name")?,
        event_type: get_text(row, 2, "event_type")?,
        event_date,
        event_time,
        duration: get_text(row, 5, "duration")?,
        location: get_text(row, 6, "location")?,
        cultural_preferences: row.get(7).ok(),
        special_instructions: row.get(8).ok(),
        rsvp_deadline,
        user_email: get_text(row, 10, "user_email")?,
        voice_sample_id: row.get(11).ok(),
        status,
        guest_list_csv_path: row.get(13).ok(),
        background_music_url: row.get(14).ok(),
        final_invitation_script: row.get(15).ok(),
        created_at,
    })
}

/// Map a libsql Row to a Guest. Column order matches GUEST_COLUMNS.
fn row_to_guest(row: &libsql::Row) -> Result<Guest, DatabaseError> {
    Ok(Guest {
        id: get_i64(row, 0, "id")?,
        event_id: get_i64(row, 1, "event_id")?,
        guest_name: get_text(row, 2, "guest_name")?,
        phone_number: get_text(row, 3, "phone_number")?,
        call_status: CallStatus::from(get_text(row, 4, "call_status")?),
    })
}

/// Map a libsql Row to an Rsvp. Column order matches RSVP_COLUMNS.
fn row_to_rsvp(row: &libsql::Row) -> Result<Rsvp, DatabaseError> {
    Ok(Rsvp {
        id: get_i64(row, 0, "id")?,
        guest_id: get_i64(row, 1, "guest_id")?,
        event_id: get_i64(row, 2, "event_id")?,
        response: crate::model::RsvpResponse::from(get_text(row, 3, "response")?),
        summary: row.get(4).ok(),
        special_request: row.get(5).ok(),
        reminder_request: row.get(6).ok(),
        created_at: parse_datetime(&get_text(row, 7, "created_at")?),
    })
}

/// Classify an insert/update failure. Foreign-key violations surface as
/// `Constraint` so callers can 404 a bad parent ID instead of 500ing.
fn exec_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("FOREIGN KEY") || msg.contains("constraint") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

// ── Trait implementation ────────────────────────────────────────────

const EVENT_COLUMNS: &str = "id, host_name, event_type, event_date, event_time, duration, \
     location, cultural_preferences, special_instructions, rsvp_deadline, user_email, \
     voice_sample_id, status, guest_list_csv_path, background_music_url, \
     final_invitation_script, created_at";

const GUEST_COLUMNS: &str = "id, event_id, guest_name, phone_number, call_status";

const RSVP_COLUMNS: &str =
    "id, guest_id, event_id, response, summary, special_request, reminder_request, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Events ──────────────────────────────────────────────────────

    async fn create_event(&self, new: &NewEvent) -> Result<Event, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO events (host_name, event_type, event_date, event_time, duration, \
             location, cultural_preferences, special_instructions, rsvp_deadline, user_email, \
             voice_sample_id, status, guest_list_csv_path, background_music_url, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                new.host_name.clone(),
                new.event_type.clone(),
                new.event_date.format("%Y-%m-%d").to_string(),
                new.event_time.format("%H:%M:%S").to_string(),
                new.duration.clone(),
                new.location.clone(),
                opt_text(new.cultural_preferences.as_deref()),
                opt_text(new.special_instructions.as_deref()),
                new.rsvp_deadline.format("%Y-%m-%d").to_string(),
                new.user_email.clone(),
                opt_text(new.voice_sample_id.as_deref()),
                EventStatus::Draft.as_db_string(),
                opt_text(new.guest_list_csv_path.as_deref()),
                opt_text(new.background_music_url.as_deref()),
                Utc::now().to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| exec_error("create_event", e))?;

        let id = conn.last_insert_rowid();
        debug!(event_id = id, host = %new.host_name, "Event created");
        self.get_event(id).await
    }

    async fn get_event(&self, id: i64) -> Result<Event, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_event: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_event(&row),
            Ok(None) => Err(DatabaseError::NotFound {
                entity: "event".to_string(),
                id,
            }),
            Err(e) => Err(DatabaseError::Query(format!("get_event: {e}"))),
        }
    }

    async fn events_for_user(&self, user_email: &str) -> Result<Vec<Event>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE user_email = ?1 \
                     ORDER BY created_at DESC, id DESC"
                ),
                params![user_email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("events_for_user: {e}")))?;

        let mut events = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_event(&row) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!("Skipping event row: {e}");
                }
            }
        }
        Ok(events)
    }

    async fn update_event_status(
        &self,
        id: i64,
        status: &EventStatus,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE events SET status = ?1 WHERE id = ?2",
                params![status.as_db_string(), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_event_status: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "event".to_string(),
                id,
            });
        }
        debug!(event_id = id, status = %status, "Event status updated");
        Ok(())
    }

    async fn update_event_script(&self, id: i64, script: &str) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE events SET final_invitation_script = ?1 WHERE id = ?2",
                params![script, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_event_script: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "event".to_string(),
                id,
            });
        }
        Ok(())
    }

    async fn update_event_voice_sample(
        &self,
        id: i64,
        voice_sample_id: &str,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE events SET voice_sample_id = ?1 WHERE id = ?2",
                params![voice_sample_id, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_event_voice_sample: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "event".to_string(),
                id,
            });
        }
        Ok(())
    }

    // ── Guests ──────────────────────────────────────────────────────

    async fn create_guest(&self, event_id: i64, new: &NewGuest) -> Result<Guest, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO guests (event_id, guest_name, phone_number, call_status) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event_id,
                new.guest_name.clone(),
                new.phone_number.clone(),
                CallStatus::NotCalled.as_str(),
            ],
        )
        .await
        .map_err(|e| exec_error("create_guest", e))?;

        let id = conn.last_insert_rowid();
        self.get_guest(id).await
    }

    async fn add_guests(
        &self,
        event_id: i64,
        guests: &[NewGuest],
    ) -> Result<Vec<Guest>, DatabaseError> {
        let mut created = Vec::with_capacity(guests.len());
        for new in guests {
            created.push(self.create_guest(event_id, new).await?);
        }
        debug!(event_id, count = created.len(), "Guests added");
        Ok(created)
    }

    async fn get_guest(&self, id: i64) -> Result<Guest, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {GUEST_COLUMNS} FROM guests WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_guest: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_guest(&row),
            Ok(None) => Err(DatabaseError::NotFound {
                entity: "guest".to_string(),
                id,
            }),
            Err(e) => Err(DatabaseError::Query(format!("get_guest: {e}"))),
        }
    }

    async fn guests_for_event(&self, event_id: i64) -> Result<Vec<Guest>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {GUEST_COLUMNS} FROM guests WHERE event_id = ?1 ORDER BY id ASC"),
                params![event_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("guests_for_event: {e}")))?;

        let mut guests = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_guest(&row) {
                Ok(guest) => guests.push(guest),
                Err(e) => {
                    tracing::warn!("Skipping guest row: {e}");
                }
            }
        }
        Ok(guests)
    }

    async fn update_guest_call_status(
        &self,
        id: i64,
        status: CallStatus,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE guests SET call_status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_guest_call_status: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "guest".to_string(),
                id,
            });
        }
        debug!(guest_id = id, status = %status, "Guest call status updated");
        Ok(())
    }

    // ── RSVPs ───────────────────────────────────────────────────────

    async fn create_rsvp(
        &self,
        guest_id: i64,
        event_id: i64,
        new: &NewRsvp,
    ) -> Result<Rsvp, DatabaseError> {
        let guest = self.get_guest(guest_id).await?;
        if guest.event_id != event_id {
            return Err(DatabaseError::Constraint(format!(
                "guest {guest_id} does not belong to event {event_id}"
            )));
        }

        let conn = self.conn();
        conn.execute(
            "INSERT INTO rsvps (guest_id, event_id, response, summary, special_request, \
             reminder_request, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                guest_id,
                event_id,
                new.response.as_str(),
                opt_text(new.summary.as_deref()),
                opt_text(new.special_request.as_deref()),
                opt_text(new.reminder_request.as_deref()),
                Utc::now().to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| exec_error("create_rsvp", e))?;

        let id = conn.last_insert_rowid();
        let mut rows = conn
            .query(
                &format!("SELECT {RSVP_COLUMNS} FROM rsvps WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_rsvp readback: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                debug!(guest_id, event_id, response = %new.response, "RSVP recorded");
                row_to_rsvp(&row)
            }
            Ok(None) => Err(DatabaseError::NotFound {
                entity: "rsvp".to_string(),
                id,
            }),
            Err(e) => Err(DatabaseError::Query(format!("create_rsvp readback: {e}"))),
        }
    }

    async fn rsvps_for_event(&self, event_id: i64) -> Result<Vec<Rsvp>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {RSVP_COLUMNS} FROM rsvps WHERE event_id = ?1 \
                     ORDER BY created_at DESC, id DESC"
                ),
                params![event_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("rsvps_for_event: {e}")))?;

        let mut rsvps = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_rsvp(&row) {
                Ok(rsvp) => rsvps.push(rsvp),
                Err(e) => {
                    tracing::warn!("Skipping RSVP row: {e}");
                }
            }
        }
        Ok(rsvps)
    }

    async fn rsvp_summary(&self, event_id: i64) -> Result<RsvpSummary, DatabaseError> {
        let conn = self.conn();

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM guests WHERE event_id = ?1",
                params![event_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("rsvp_summary guest count: {e}")))?;
        let total_guests: i64 = match rows.next().await {
            Ok(Some(row)) => row.get(0).unwrap_or(0),
            _ => 0,
        };

        let mut summary = RsvpSummary::default();
        if total_guests == 0 {
            return Ok(summary);
        }

        let mut rows = conn
            .query(
                "SELECT response, COUNT(*) FROM rsvps WHERE event_id = ?1 GROUP BY response",
                params![event_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("rsvp_summary response counts: {e}")))?;

        let mut responded = 0i64;
        while let Ok(Some(row)) = rows.next().await {
            let response: String = row.get(0).unwrap_or_default();
            let count: i64 = row.get(1).unwrap_or(0);
            match response.to_lowercase().as_str() {
                "yes" => {
                    summary.yes = count;
                    responded += count;
                }
                "no" => {
                    summary.no = count;
                    responded += count;
                }
                "maybe" => {
                    summary.maybe = count;
                    responded += count;
                }
                _ => {}
            }
        }

        summary.pending = (total_guests - responded).max(0);
        Ok(summary)
    }
}
