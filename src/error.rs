//! Error types for CallVite.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: i64 },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Script templating errors.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Prompt template unreadable at {path}: {reason}")]
    TemplateUnavailable { path: String, reason: String },
}

/// Third-party provider errors (telephony, voice cloning).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} rejected the request with status {status}: {body}")]
    Rejected {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Webhook correlation errors. These map to HTTP 400: the payload could
/// not be tied back to a guest/event, so nothing is persisted.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing {field} in webhook metadata")]
    MissingId { field: &'static str },

    #[error("Invalid {field} in webhook metadata: {value:?}")]
    MalformedId { field: &'static str, value: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
