use std::sync::Arc;

use callvite::api::{AppState, app_routes};
use callvite::config::Config;
use callvite::dispatch::CallDispatcher;
use callvite::providers::{VapiClient, VoiceCloneClient};
use callvite::script::ScriptTemplater;
use callvite::store::{Database, LibSqlBackend};
use callvite::webhook::WebhookProcessor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export VAPI_API_KEY=... and VAPI_ASSISTANT_ID=...");
        std::process::exit(1);
    });

    eprintln!("📞 CallVite v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/events", config.port);
    eprintln!("   Webhooks: /vapi/callback, /webhook");

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Script template ─────────────────────────────────────────────────
    // A missing template is fatal: every generated script depends on it.
    let templater = Arc::new(ScriptTemplater::load(&config.template_path).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }));
    eprintln!("   Template: {}", config.template_path.display());

    // ── Providers ───────────────────────────────────────────────────────
    let provider = Arc::new(VapiClient::new(config.vapi.clone()));
    let voice_clone = config
        .voice_clone
        .clone()
        .map(|vc| Arc::new(VoiceCloneClient::new(vc)));
    eprintln!(
        "   Voice cloning: {}",
        if voice_clone.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    let dispatcher = Arc::new(CallDispatcher::new(
        Arc::clone(&db),
        provider,
        Arc::clone(&templater),
        config.voices.clone(),
    ));
    let webhooks = Arc::new(WebhookProcessor::new(Arc::clone(&db)));

    // ── HTTP server ─────────────────────────────────────────────────────
    let app = app_routes(AppState {
        db,
        dispatcher,
        webhooks,
        templater,
        voice_clone,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "CallVite server started");
    axum::serve(listener, app).await?;

    Ok(())
}
