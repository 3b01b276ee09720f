//! Configuration — env-var driven, with provider resource IDs kept out of logic.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default outbound phone-number resource carried over from the original
/// deployment; override with `VAPI_PHONE_NUMBER_ID`.
const DEFAULT_PHONE_NUMBER_ID: &str = "bbb6faa5-8983-4411-b7a1-cd4f159fc4ae";

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Path to the local libSQL database file.
    pub db_path: PathBuf,
    /// Path to the invitation prompt template.
    pub template_path: PathBuf,
    pub vapi: VapiConfig,
    pub voices: VoiceConfig,
    /// Voice cloning is optional; absent when no API key is configured.
    pub voice_clone: Option<VoiceCloneConfig>,
}

/// Outbound-call provider configuration.
#[derive(Debug, Clone)]
pub struct VapiConfig {
    pub api_key: SecretString,
    pub base_url: String,
    /// Provider-side assistant resource used for every call.
    pub assistant_id: String,
    /// Provider-side phone-number resource calls originate from.
    pub phone_number_id: String,
}

/// Preset voice IDs for the non-custom voice choices.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Voice provider name sent in call payloads.
    pub provider: String,
    pub male_voice_id: String,
    pub female_voice_id: String,
}

/// Voice-cloning provider configuration.
#[derive(Debug, Clone)]
pub struct VoiceCloneConfig {
    pub api_key: SecretString,
    pub base_url: String,
}

impl Config {
    /// Build configuration from environment variables.
    ///
    /// `VAPI_API_KEY` and `VAPI_ASSISTANT_ID` are required; everything else
    /// has a default. `LMNT_API_KEY` enables the voice-cloning endpoint.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = env_or("CALLVITE_PORT", "8080")
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "CALLVITE_PORT".to_string(),
                message: format!("{e}"),
            })?;

        let vapi = VapiConfig {
            api_key: SecretString::from(required("VAPI_API_KEY")?),
            base_url: env_or("VAPI_BASE_URL", "https://api.vapi.ai"),
            assistant_id: required("VAPI_ASSISTANT_ID")?,
            phone_number_id: env_or("VAPI_PHONE_NUMBER_ID", DEFAULT_PHONE_NUMBER_ID),
        };

        let voices = VoiceConfig {
            provider: env_or("CALLVITE_VOICE_PROVIDER", "11labs"),
            male_voice_id: env_or("CALLVITE_MALE_VOICE_ID", "male_voice_id"),
            female_voice_id: env_or("CALLVITE_FEMALE_VOICE_ID", "female_voice_id"),
        };

        let voice_clone = std::env::var("LMNT_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(|key| VoiceCloneConfig {
                api_key: SecretString::from(key),
                base_url: env_or("LMNT_BASE_URL", "https://api.lmnt.com"),
            });

        Ok(Self {
            port,
            db_path: PathBuf::from(env_or("CALLVITE_DB_PATH", "./data/callvite.db")),
            template_path: PathBuf::from(env_or(
                "CALLVITE_TEMPLATE_PATH",
                "prompts/invitation.txt",
            )),
            vapi,
            voices,
            voice_clone,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}
