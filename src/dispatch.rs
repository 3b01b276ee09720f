//! Call dispatcher — turns a finalized script into outbound calls.
//!
//! Per guest: substitute the guest name into the script, pick a voice,
//! submit the call, and record the outcome on the guest row. Provider
//! failures are converted into a `Failed - API Error` call status and are
//! never propagated to the caller.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::VoiceConfig;
use crate::error::Error;
use crate::model::{CallStatus, Event, EventStatus, Guest};
use crate::providers::{
    BatchCallRequest, CallCustomer, CallMetadata, CallProvider, CallRequest, VoiceSpec,
};
use crate::script::{GUEST_NAME_TOKEN, ScriptTemplater};
use crate::store::Database;

/// Assistant display name for the male preset voice.
const MALE_ASSISTANT_NAME: &str = "Rohan";
/// Assistant display name for the female preset voice and all fallbacks.
const FEMALE_ASSISTANT_NAME: &str = "Eva";

/// Host's voice selection for an event's calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceChoice {
    Male,
    Female,
    Custom,
}

impl VoiceChoice {
    /// Parse a form/API value. Unknown strings fall back to the female
    /// preset rather than erroring.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "male" => VoiceChoice::Male,
            "custom" => VoiceChoice::Custom,
            _ => VoiceChoice::Female,
        }
    }
}

/// Counts from one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DispatchOutcome {
    pub attempted: usize,
    pub initiated: usize,
    pub failed: usize,
}

/// Orchestrates outbound calls for an event's guest list.
pub struct CallDispatcher {
    db: Arc<dyn Database>,
    provider: Arc<dyn CallProvider>,
    templater: Arc<ScriptTemplater>,
    voices: VoiceConfig,
}

impl CallDispatcher {
    pub fn new(
        db: Arc<dyn Database>,
        provider: Arc<dyn CallProvider>,
        templater: Arc<ScriptTemplater>,
        voices: VoiceConfig,
    ) -> Self {
        Self {
            db,
            provider,
            templater,
            voices,
        }
    }

    /// Dispatch calls to every guest of an event.
    ///
    /// Advances the event status through `processing` to `Calls Initiated`
    /// (or `Processed - No Guests` / `Failed - <reason>`). Per-guest call
    /// failures do not fail the run.
    pub async fn dispatch_event(
        &self,
        event_id: i64,
        choice: VoiceChoice,
        batch: bool,
    ) -> Result<DispatchOutcome, Error> {
        let event = self.db.get_event(event_id).await?;
        let guests = self.db.guests_for_event(event_id).await?;

        if guests.is_empty() {
            info!(event_id, "No guests to call");
            self.db
                .update_event_status(event_id, &EventStatus::ProcessedNoGuests)
                .await?;
            return Ok(DispatchOutcome::default());
        }

        self.db
            .update_event_status(event_id, &EventStatus::Processing)
            .await?;

        // The user-edited final script wins; otherwise generate fresh.
        // Either way the guest-name token is the only thing substituted
        // per guest, so edited-out placeholders stay edited out.
        let script = match &event.final_invitation_script {
            Some(script) if !script.trim().is_empty() => script.clone(),
            _ => self.templater.generate(&event),
        };

        let outcome = if batch {
            self.dispatch_batch(&event, &guests, &script, choice).await
        } else {
            self.dispatch_sequential(&event, &guests, &script, choice)
                .await
        };

        self.db
            .update_event_status(event_id, &EventStatus::CallsInitiated)
            .await?;
        info!(
            event_id,
            attempted = outcome.attempted,
            initiated = outcome.initiated,
            failed = outcome.failed,
            "Dispatch complete"
        );
        Ok(outcome)
    }

    /// Place one call per guest, updating each guest's status exactly once.
    async fn dispatch_sequential(
        &self,
        event: &Event,
        guests: &[Guest],
        script: &str,
        choice: VoiceChoice,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for guest in guests {
            outcome.attempted += 1;
            let request = self.build_request(event, guest, script, choice);
            let status = match self.provider.create_call(&request).await {
                Ok(call_id) => {
                    info!(guest_id = guest.id, call_id = %call_id, "Call initiated");
                    CallStatus::Initiated
                }
                Err(e) => {
                    warn!(guest_id = guest.id, error = %e, "Call failed");
                    CallStatus::FailedApiError
                }
            };
            if status == CallStatus::Initiated {
                outcome.initiated += 1;
            } else {
                outcome.failed += 1;
            }
            if let Err(e) = self.db.update_guest_call_status(guest.id, status).await {
                error!(guest_id = guest.id, error = %e, "Failed to record call status");
            }
        }
        outcome
    }

    /// Submit all guests in one provider request; results align positionally
    /// with the customers, and a guest without a result is a failure.
    async fn dispatch_batch(
        &self,
        event: &Event,
        guests: &[Guest],
        script: &str,
        choice: VoiceChoice,
    ) -> DispatchOutcome {
        let calls: Vec<CallRequest> = guests
            .iter()
            .map(|guest| self.build_request(event, guest, script, choice))
            .collect();
        let request = BatchCallRequest {
            name: format!("{} invitations", non_empty(&event.event_type, "Event")),
            calls,
        };

        let call_ids = match self.provider.create_batch_call(&request).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(event_id = event.id, error = %e, "Batch call failed");
                Vec::new()
            }
        };

        let mut outcome = DispatchOutcome::default();
        for (i, guest) in guests.iter().enumerate() {
            outcome.attempted += 1;
            let status = match call_ids.get(i) {
                Some(Some(call_id)) => {
                    info!(guest_id = guest.id, call_id = %call_id, "Call initiated");
                    CallStatus::Initiated
                }
                _ => {
                    warn!(guest_id = guest.id, "No call id for guest in batch result");
                    CallStatus::FailedApiError
                }
            };
            if status == CallStatus::Initiated {
                outcome.initiated += 1;
            } else {
                outcome.failed += 1;
            }
            if let Err(e) = self.db.update_guest_call_status(guest.id, status).await {
                error!(guest_id = guest.id, error = %e, "Failed to record call status");
            }
        }
        outcome
    }

    fn build_request(
        &self,
        event: &Event,
        guest: &Guest,
        script: &str,
        choice: VoiceChoice,
    ) -> CallRequest {
        let (voice, voice_sample_id) = self.select_voice(choice, event);
        let assistant_name = assistant_name(choice, event);
        CallRequest {
            customer: CallCustomer {
                number: guest.phone_number.clone(),
                name: guest.guest_name.clone(),
            },
            first_message: personalize(
                &self.templater.first_message(event, &assistant_name),
                &guest.guest_name,
            ),
            end_call_message: personalize(&self.templater.end_call_message(event), &guest.guest_name),
            system_prompt: personalize(script, &guest.guest_name),
            assistant_name,
            voice,
            background_sound_url: event.background_music_url.clone(),
            metadata: CallMetadata {
                guest_id: guest.id.to_string(),
                event_id: event.id.to_string(),
                voice_sample_id,
            },
        }
    }

    /// Map the voice choice to provider voice config. Custom without a
    /// cloned sample falls back to the female preset.
    fn select_voice(&self, choice: VoiceChoice, event: &Event) -> (VoiceSpec, Option<String>) {
        let preset = |voice_id: &str| VoiceSpec {
            provider: self.voices.provider.clone(),
            voice_id: voice_id.to_string(),
        };
        match choice {
            VoiceChoice::Male => (preset(&self.voices.male_voice_id), None),
            VoiceChoice::Female => (preset(&self.voices.female_voice_id), None),
            VoiceChoice::Custom => match &event.voice_sample_id {
                Some(sample) if !sample.trim().is_empty() => (
                    VoiceSpec {
                        provider: "lmnt".to_string(),
                        voice_id: sample.clone(),
                    },
                    Some(sample.clone()),
                ),
                _ => {
                    warn!(
                        event_id = event.id,
                        "Custom voice requested but no sample cloned; using female preset"
                    );
                    (preset(&self.voices.female_voice_id), None)
                }
            },
        }
    }
}

/// Substitute the guest-name token.
fn personalize(text: &str, guest_name: &str) -> String {
    text.replace(GUEST_NAME_TOKEN, guest_name)
}

fn assistant_name(choice: VoiceChoice, event: &Event) -> String {
    match choice {
        VoiceChoice::Male => MALE_ASSISTANT_NAME.to_string(),
        VoiceChoice::Custom => {
            let host = event.host_name.trim();
            if host.is_empty() {
                FEMALE_ASSISTANT_NAME.to_string()
            } else {
                host.to_string()
            }
        }
        VoiceChoice::Female => FEMALE_ASSISTANT_NAME.to_string(),
    }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { fallback } else { trimmed }
}
