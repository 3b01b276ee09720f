//! Third-party provider clients — outbound calls and voice cloning.
//!
//! Providers are opaque HTTP services; the rest of the crate talks to them
//! through the `CallProvider` trait so tests can stub the network away.

pub mod vapi;
pub mod voice_clone;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use vapi::VapiClient;
pub use voice_clone::VoiceCloneClient;

/// Voice configuration sent with a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSpec {
    pub provider: String,
    pub voice_id: String,
}

/// The person being dialed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallCustomer {
    /// E.164 phone number.
    pub number: String,
    pub name: String,
}

/// Correlation metadata echoed back verbatim in webhook callbacks.
///
/// IDs are carried as strings: the provider round-trips them opaquely and
/// the webhook handler parses them back to integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMetadata {
    pub guest_id: String,
    pub event_id: String,
    pub voice_sample_id: Option<String>,
}

/// Everything needed to place one personalized outbound call.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub customer: CallCustomer,
    /// Display name the assistant introduces itself with.
    pub assistant_name: String,
    pub first_message: String,
    pub end_call_message: String,
    /// Fully personalized system prompt for this guest.
    pub system_prompt: String,
    pub voice: VoiceSpec,
    pub background_sound_url: Option<String>,
    pub metadata: CallMetadata,
}

/// A batch of personalized calls submitted as one provider request.
#[derive(Debug, Clone)]
pub struct BatchCallRequest {
    /// Display name for the whole batch, e.g. "Housewarming invitations".
    pub name: String,
    pub calls: Vec<CallRequest>,
}

/// Outbound-call provider abstraction.
#[async_trait]
pub trait CallProvider: Send + Sync {
    /// Place a single call. Returns the provider call ID.
    async fn create_call(&self, request: &CallRequest) -> Result<String, ProviderError>;

    /// Place all calls in one provider request.
    ///
    /// The returned vector aligns positionally with `request.calls`; `None`
    /// means the provider produced no call ID for that customer.
    async fn create_batch_call(
        &self,
        request: &BatchCallRequest,
    ) -> Result<Vec<Option<String>>, ProviderError>;
}
