//! Vapi outbound-call client.
//!
//! Posts call requests to `{base}/call` with Bearer auth. Call IDs come
//! back in a `results` array aligned with the submitted customers.

use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::debug;

use async_trait::async_trait;

use crate::config::VapiConfig;
use crate::error::ProviderError;
use crate::providers::{BatchCallRequest, CallProvider, CallRequest};

const PROVIDER_NAME: &str = "vapi";

/// HTTP client for the Vapi call API.
pub struct VapiClient {
    config: VapiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    #[serde(default)]
    results: Vec<CallResultRow>,
}

#[derive(Debug, Deserialize)]
struct CallResultRow {
    id: Option<String>,
}

impl VapiClient {
    pub fn new(config: VapiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn call_url(&self) -> String {
        format!("{}/call", self.config.base_url.trim_end_matches('/'))
    }

    /// Per-customer entry carrying its own overrides and metadata so each
    /// guest's call is personalized even inside a batch request.
    fn customer_json(call: &CallRequest) -> serde_json::Value {
        let mut overrides = serde_json::json!({
            "name": call.assistant_name,
            "firstMessage": call.first_message,
            "endCallMessage": call.end_call_message,
            "model": {
                "provider": "openai",
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": call.system_prompt}
                ],
            },
            "voice": {
                "provider": call.voice.provider,
                "voiceId": call.voice.voice_id,
            },
        });
        if let Some(url) = &call.background_sound_url {
            overrides["backgroundSound"] = serde_json::Value::String(url.clone());
        }

        let mut metadata = serde_json::json!({
            "guestId": call.metadata.guest_id,
            "eventId": call.metadata.event_id,
        });
        if let Some(sample) = &call.metadata.voice_sample_id {
            metadata["voiceSampleId"] = serde_json::Value::String(sample.clone());
        }

        serde_json::json!({
            "numberE164CheckEnabled": false,
            "number": call.customer.number,
            "name": call.customer.name,
            "assistantOverrides": overrides,
            "metadata": metadata,
        })
    }

    async fn post_call(&self, payload: &serde_json::Value) -> Result<CallResponse, ProviderError> {
        let response = self
            .client
            .post(self.call_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER_NAME.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                provider: PROVIDER_NAME.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<CallResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl CallProvider for VapiClient {
    async fn create_call(&self, request: &CallRequest) -> Result<String, ProviderError> {
        let payload = serde_json::json!({
            "name": format!("{} Invitation call", request.customer.name),
            "assistantId": self.config.assistant_id,
            "phoneNumberId": self.config.phone_number_id,
            "customers": [Self::customer_json(request)],
        });

        let parsed = self.post_call(&payload).await?;
        let call_id = parsed
            .results
            .first()
            .and_then(|r| r.id.clone())
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: "no call id in results".to_string(),
            })?;

        debug!(number = %request.customer.number, call_id = %call_id, "Outbound call created");
        Ok(call_id)
    }

    async fn create_batch_call(
        &self,
        request: &BatchCallRequest,
    ) -> Result<Vec<Option<String>>, ProviderError> {
        let customers: Vec<serde_json::Value> =
            request.calls.iter().map(Self::customer_json).collect();
        let payload = serde_json::json!({
            "name": request.name,
            "assistantId": self.config.assistant_id,
            "phoneNumberId": self.config.phone_number_id,
            "customers": customers,
        });

        let parsed = self.post_call(&payload).await?;
        debug!(
            submitted = request.calls.len(),
            returned = parsed.results.len(),
            "Batch call created"
        );
        Ok(parsed.results.into_iter().map(|r| r.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CallCustomer, CallMetadata, VoiceSpec};
    use secrecy::SecretString;

    fn sample_request() -> CallRequest {
        CallRequest {
            customer: CallCustomer {
                number: "+15551234567".to_string(),
                name: "Liam".to_string(),
            },
            assistant_name: "Eva".to_string(),
            first_message: "Hello Liam".to_string(),
            end_call_message: "Goodbye".to_string(),
            system_prompt: "You are inviting Liam.".to_string(),
            voice: VoiceSpec {
                provider: "11labs".to_string(),
                voice_id: "female_voice_id".to_string(),
            },
            background_sound_url: None,
            metadata: CallMetadata {
                guest_id: "7".to_string(),
                event_id: "3".to_string(),
                voice_sample_id: None,
            },
        }
    }

    #[test]
    fn customer_json_carries_overrides_and_metadata() {
        let json = VapiClient::customer_json(&sample_request());
        assert_eq!(json["numberE164CheckEnabled"], false);
        assert_eq!(json["number"], "+15551234567");
        assert_eq!(json["metadata"]["guestId"], "7");
        assert_eq!(json["metadata"]["eventId"], "3");
        assert!(json["metadata"].get("voiceSampleId").is_none());
        assert_eq!(json["assistantOverrides"]["firstMessage"], "Hello Liam");
        assert_eq!(
            json["assistantOverrides"]["voice"]["voiceId"],
            "female_voice_id"
        );
        assert!(json["assistantOverrides"].get("backgroundSound").is_none());
    }

    #[test]
    fn customer_json_includes_voice_sample_when_custom() {
        let mut request = sample_request();
        request.metadata.voice_sample_id = Some("voice-abc".to_string());
        request.background_sound_url = Some("https://cdn.example.com/music.mp3".to_string());
        let json = VapiClient::customer_json(&request);
        assert_eq!(json["metadata"]["voiceSampleId"], "voice-abc");
        assert_eq!(
            json["assistantOverrides"]["backgroundSound"],
            "https://cdn.example.com/music.mp3"
        );
    }

    #[test]
    fn call_url_joins_base_cleanly() {
        let client = VapiClient::new(VapiConfig {
            api_key: SecretString::from("key".to_string()),
            base_url: "https://api.vapi.ai/".to_string(),
            assistant_id: "asst_1".to_string(),
            phone_number_id: "pn_1".to_string(),
        });
        assert_eq!(client.call_url(), "https://api.vapi.ai/call");
    }

    #[test]
    fn response_parse_tolerates_missing_results() {
        let parsed: CallResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());

        let parsed: CallResponse =
            serde_json::from_str(r#"{"results": [{"id": "call_1"}, {}]}"#).unwrap();
        assert_eq!(parsed.results[0].id.as_deref(), Some("call_1"));
        assert!(parsed.results[1].id.is_none());
    }
}
