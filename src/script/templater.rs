//! Invitation script templater.
//!
//! Loads a static prompt template containing bracketed placeholders
//! (`[HostName]`, `[EventDate]`, ...) and substitutes values computed from
//! an event. The guest name is deliberately left as `{{GuestName}}` so the
//! dispatcher can personalize per guest. Extraction of arrival time and
//! dress code from special instructions is best-effort keyword matching
//! with safe defaults, not NLP.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{Duration, NaiveDate, NaiveTime};
use regex::Regex;

use crate::error::ScriptError;
use crate::model::Event;
use crate::script::GUEST_NAME_TOKEN;

/// Minutes before the event start guests are asked to arrive, absent an
/// explicit override in the special instructions.
const DEFAULT_ARRIVAL_LEAD_MINUTES: i64 = 15;

fn arrival_override_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)arriv\w*\W{0,12}?(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)")
            .unwrap()
    })
}

/// Fills the invitation prompt template from event fields.
#[derive(Debug)]
pub struct ScriptTemplater {
    template: String,
}

impl ScriptTemplater {
    /// Load the prompt template from disk.
    ///
    /// An unreadable template is fatal for script generation, so this
    /// surfaces an explicit error instead of falling back to anything.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let template =
            std::fs::read_to_string(path).map_err(|e| ScriptError::TemplateUnavailable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { template })
    }

    /// Build a templater from an in-memory template string.
    pub fn from_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Generate the system prompt for an event.
    ///
    /// Every `[Bracket]` placeholder is substituted; `{{GuestName}}` is the
    /// only token left unresolved.
    pub fn generate(&self, event: &Event) -> String {
        let mut script = self.template.clone();
        for (placeholder, value) in placeholder_values(event) {
            script = script.replace(placeholder, &value);
        }
        script
    }

    /// Opening line spoken when the call connects.
    pub fn first_message(&self, event: &Event, assistant_name: &str) -> String {
        format!(
            "Hello, this is {assistant_name} from CallVite, calling on behalf of {host}. \
             May I speak with {GUEST_NAME_TOKEN}, please?",
            host = non_empty(&event.host_name, "the host"),
        )
    }

    /// Closing line spoken before the assistant hangs up.
    pub fn end_call_message(&self, event: &Event) -> String {
        format!(
            "Thank you so much, {GUEST_NAME_TOKEN}! {host} hopes to see you at the {event_type} \
             on {date}. Have a great day!",
            host = non_empty(&event.host_name, "The host"),
            event_type = non_empty(&event.event_type, "event"),
            date = format_long_date(event.event_date),
        )
    }
}

fn placeholder_values(event: &Event) -> Vec<(&'static str, String)> {
    let special_instructions = event.special_instructions.as_deref().unwrap_or("");
    vec![
        (
            "[HostName]",
            non_empty(&event.host_name, "the host").to_string(),
        ),
        (
            "[EventType]",
            non_empty(&event.event_type, "an event").to_string(),
        ),
        ("[EventDate]", format_long_date(event.event_date)),
        ("[EventTime]", format_time(event.event_time)),
        (
            "[Duration]",
            non_empty(&event.duration, "a few hours").to_string(),
        ),
        (
            "[Location]",
            non_empty(&event.location, "the venue").to_string(),
        ),
        (
            "[CulturalPreferences]",
            non_empty(
                event.cultural_preferences.as_deref().unwrap_or(""),
                "none mentioned",
            )
            .to_string(),
        ),
        (
            "[SpecialInstructions]",
            non_empty(special_instructions, "None").to_string(),
        ),
        ("[RsvpDeadline]", format_long_date(event.rsvp_deadline)),
        (
            "[ArrivalTime]",
            arrival_time(event.event_time, special_instructions),
        ),
        ("[DressCode]", dress_code(special_instructions)),
        (
            "[AlternateDate]",
            format_long_date(event.event_date + Duration::days(1)),
        ),
        ("[AlternateTime]", format_time(event.event_time)),
    ]
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { fallback } else { trimmed }
}

/// Long human-readable date, e.g. "Friday, June 20, 2025".
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// 12-hour time, e.g. "7:30 PM".
pub fn format_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Arrival time: an explicit numeric override near the word "arrive" in
/// the special instructions wins; otherwise 15 minutes before start.
fn arrival_time(event_time: NaiveTime, special_instructions: &str) -> String {
    if let Some(caps) = arrival_override_re().captures(special_instructions)
        && let Some(token) = caps.get(1)
    {
        return token.as_str().trim().to_string();
    }
    format_time(event_time - Duration::minutes(DEFAULT_ARRIVAL_LEAD_MINUTES))
}

/// Dress code: the text after "dress code" up to the next period or
/// semicolon, or "not specified".
fn dress_code(special_instructions: &str) -> String {
    let lower = special_instructions.to_lowercase();
    let Some(idx) = lower.find("dress code") else {
        return "not specified".to_string();
    };
    let rest = &special_instructions[idx + "dress code".len()..];
    let clause = rest
        .split(['.', ';'])
        .next()
        .unwrap_or("")
        .trim_start_matches([':', '-', ' '])
        .trim();
    let clause = clause.strip_prefix("is ").unwrap_or(clause).trim();
    if clause.is_empty() {
        "not specified".to_string()
    } else {
        clause.to_string()
    }
}
