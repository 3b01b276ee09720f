//! LMNT voice-cloning client.
//!
//! Uploads an audio sample as a multipart request and returns the provider
//! voice ID, which the dispatcher later sends as the custom voice.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use tracing::info;

use crate::config::VoiceCloneConfig;
use crate::error::ProviderError;

const PROVIDER_NAME: &str = "lmnt";

/// HTTP client for the LMNT voice API.
pub struct VoiceCloneClient {
    config: VoiceCloneConfig,
    client: reqwest::Client,
}

impl VoiceCloneClient {
    pub fn new(config: VoiceCloneConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn voice_url(&self) -> String {
        format!(
            "{}/v1/ai/voice",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Create an instant custom voice from an audio sample on disk.
    pub async fn create_custom_voice(
        &self,
        file_path: &Path,
        host_name: &str,
    ) -> Result<String, ProviderError> {
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sample.wav")
            .to_string();
        let file_bytes = tokio::fs::read(file_path).await?;

        let metadata = serde_json::json!({
            "name": format!("{host_name}_voice"),
            "type": "instant",
            "enhance": false,
            "gender": "unknown",
            "description": format!("Custom voice for {host_name}'s event"),
        });

        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string()).mime_str("application/json").map_err(
                    |e| ProviderError::RequestFailed {
                        provider: PROVIDER_NAME.to_string(),
                        reason: e.to_string(),
                    },
                )?,
            )
            .part(
                "files",
                Part::bytes(file_bytes)
                    .file_name(file_name)
                    .mime_str("audio/wav")
                    .map_err(|e| ProviderError::RequestFailed {
                        provider: PROVIDER_NAME.to_string(),
                        reason: e.to_string(),
                    })?,
            );

        let response = self
            .client
            .post(self.voice_url())
            .header("X-API-Key", self.config.api_key.expose_secret())
            .multipart(form)
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

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: PROVIDER_NAME.to_string(),
                    reason: e.to_string(),
                })?;

        let voice_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: "no voice id in response".to_string(),
            })?
            .to_string();

        info!(host = host_name, voice_id = %voice_id, "Custom voice created");
        Ok(voice_id)
    }
}
