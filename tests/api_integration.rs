//! Integration tests for the CallVite REST API.
//!
//! Each test spins up an Axum server on a random port with an in-memory
//! database and a stubbed call provider, then exercises the real HTTP
//! contract end to end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use callvite::api::{AppState, app_routes};
use callvite::config::VoiceConfig;
use callvite::dispatch::CallDispatcher;
use callvite::error::ProviderError;
use callvite::model::{CallStatus, EventStatus};
use callvite::providers::{BatchCallRequest, CallProvider, CallRequest};
use callvite::script::ScriptTemplater;
use callvite::store::{Database, LibSqlBackend};
use callvite::webhook::WebhookProcessor;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stub call provider: hands out sequential call IDs and records every
/// request so tests can assert on what would have gone over the wire.
#[derive(Default)]
struct StubProvider {
    requests: Mutex<Vec<CallRequest>>,
}

#[async_trait]
impl CallProvider for StubProvider {
    async fn create_call(&self, request: &CallRequest) -> Result<String, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(format!("call_{}", requests.len()))
    }

    async fn create_batch_call(
        &self,
        request: &BatchCallRequest,
    ) -> Result<Vec<Option<String>>, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let mut ids = Vec::new();
        for call in &request.calls {
            requests.push(call.clone());
            ids.push(Some(format!("call_{}", requests.len())));
        }
        Ok(ids)
    }
}

struct TestServer {
    port: u16,
    db: Arc<LibSqlBackend>,
    provider: Arc<StubProvider>,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

async fn start_server() -> TestServer {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let provider = Arc::new(StubProvider::default());
    let templater = Arc::new(ScriptTemplater::from_template(include_str!(
        "../prompts/invitation.txt"
    )));
    let voices = VoiceConfig {
        provider: "11labs".to_string(),
        male_voice_id: "male_voice_id".to_string(),
        female_voice_id: "female_voice_id".to_string(),
    };

    let shared_db: Arc<dyn Database> = db.clone();
    let dispatcher = Arc::new(CallDispatcher::new(
        shared_db.clone(),
        provider.clone(),
        templater.clone(),
        voices,
    ));
    let webhooks = Arc::new(WebhookProcessor::new(shared_db.clone()));

    let app = app_routes(AppState {
        db: shared_db,
        dispatcher,
        webhooks,
        templater,
        voice_clone: None,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        port,
        db,
        provider,
        client: reqwest::Client::new(),
    }
}

fn event_payload() -> Value {
    json!({
        "user_email": "asha@example.com",
        "host_name": "Asha",
        "event_type": "Housewarming",
        "event_date": "2025-06-20",
        "event_time": "19:00",
        "duration": "3 hours",
        "location": "12 Rose Lane",
        "rsvp_deadline": "2025-06-15",
        "special_instructions": "Shoes off at the door",
    })
}

async fn create_event(server: &TestServer) -> i64 {
    let resp = server
        .client
        .post(server.url("/api/events"))
        .json(&event_payload())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

async fn add_guest(server: &TestServer, event_id: i64, name: &str, phone: &str) -> i64 {
    let resp = server
        .client
        .post(server.url(&format!("/api/events/{event_id}/guests")))
        .json(&json!({"guests": [{"guest_name": name, "phone_number": phone}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Vec<Value> = resp.json().await.unwrap();
    body[0]["id"].as_i64().unwrap()
}

// ── Health and events ────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let resp = reqwest::get(server.url("/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "callvite");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_fetch_and_list_events() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let event_id = create_event(&server).await;

        let resp = reqwest::get(server.url(&format!("/api/events/{event_id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["host_name"], "Asha");
        assert_eq!(body["status"], "draft");

        let resp = reqwest::get(server.url("/api/events?email=asha@example.com"))
            .await
            .unwrap();
        let listed: Vec<Value> = resp.json().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["id"].as_i64(), Some(event_id));

        let resp = reqwest::get(server.url("/api/events?email=other@example.com"))
            .await
            .unwrap();
        let listed: Vec<Value> = resp.json().await.unwrap();
        assert!(listed.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn bad_event_date_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let mut payload = event_payload();
        payload["event_date"] = json!("20-06-2025");

        let resp = server
            .client
            .post(server.url("/api/events"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_event_returns_404() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let resp = reqwest::get(server.url("/api/events/999")).await.unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

// ── Guests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_phone_number_rejected_with_400() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let event_id = create_event(&server).await;

        let resp = server
            .client
            .post(server.url(&format!("/api/events/{event_id}/guests")))
            .json(&json!({"guests": [{"guest_name": "Liam", "phone_number": "555-1234"}]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let guests = server.db.guests_for_event(event_id).await.unwrap();
        assert!(guests.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn guests_require_an_existing_event() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let resp = server
            .client
            .post(server.url("/api/events/42/guests"))
            .json(&json!({"guests": [{"guest_name": "Liam", "phone_number": "+15551234567"}]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

// ── Scripts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn script_preview_resolves_placeholders() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let event_id = create_event(&server).await;

        let resp = reqwest::get(server.url(&format!("/api/events/{event_id}/script")))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["edited"], false);

        let script = body["script"].as_str().unwrap();
        assert!(script.contains("Asha"));
        assert!(script.contains("{{GuestName}}"));
        // Every bracket placeholder must have been substituted.
        assert!(!script.contains('['), "unresolved placeholder in: {script}");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn saved_script_wins_over_generated() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let event_id = create_event(&server).await;

        let resp = server
            .client
            .post(server.url(&format!("/api/events/{event_id}/script")))
            .json(&json!({"script": "Hi {{GuestName}}, party at my place!"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = reqwest::get(server.url(&format!("/api/events/{event_id}/script")))
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["edited"], true);
        assert_eq!(body["script"], "Hi {{GuestName}}, party at my place!");
    })
    .await
    .expect("test timed out");
}

// ── Calls and webhooks ───────────────────────────────────────────────

#[tokio::test]
async fn dispatch_marks_guests_initiated() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let event_id = create_event(&server).await;
        let guest_id = add_guest(&server, event_id, "Liam", "+15551234567").await;

        let resp = server
            .client
            .post(server.url(&format!("/api/events/{event_id}/calls")))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let outcome: Value = resp.json().await.unwrap();
        assert_eq!(outcome["attempted"], 1);
        assert_eq!(outcome["initiated"], 1);
        assert_eq!(outcome["failed"], 0);

        let guest = server.db.get_guest(guest_id).await.unwrap();
        assert_eq!(guest.call_status, CallStatus::Initiated);

        let event = server.db.get_event(event_id).await.unwrap();
        assert_eq!(event.status, EventStatus::CallsInitiated);

        let requests = server.provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].first_message.contains("Liam"));
        assert_eq!(requests[0].metadata.guest_id, guest_id.to_string());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn end_to_end_rsvp_flow() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let event_id = create_event(&server).await;
        let guest_id = add_guest(&server, event_id, "Liam", "+15551234567").await;

        server
            .client
            .post(server.url(&format!("/api/events/{event_id}/calls")))
            .json(&json!({}))
            .send()
            .await
            .unwrap();

        let resp = server
            .client
            .post(server.url("/webhook"))
            .json(&json!({
                "message": {
                    "type": "end-of-call-report",
                    "call": {"metadata": {
                        "guestId": guest_id.to_string(),
                        "eventId": event_id.to_string(),
                    }},
                    "analysis": {
                        "summary": "Sounds great",
                        "structuredData": {"rsvp_response": "yes"},
                    },
                },
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "Event received");

        let rsvps = server.db.rsvps_for_event(event_id).await.unwrap();
        assert_eq!(rsvps.len(), 1);
        assert_eq!(rsvps[0].response.as_str(), "Yes");
        assert_eq!(rsvps[0].summary.as_deref(), Some("Sounds great"));

        let guest = server.db.get_guest(guest_id).await.unwrap();
        assert_eq!(guest.call_status, CallStatus::RsvpReceived);

        let resp = reqwest::get(server.url(&format!("/api/events/{event_id}/summary")))
            .await
            .unwrap();
        let summary: Value = resp.json().await.unwrap();
        assert_eq!(summary["yes"], 1);
        assert_eq!(summary["pending"], 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn webhook_missing_guest_id_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let event_id = create_event(&server).await;
        add_guest(&server, event_id, "Liam", "+15551234567").await;

        let resp = server
            .client
            .post(server.url("/webhook"))
            .json(&json!({
                "message": {
                    "type": "end-of-call-report",
                    "call": {"metadata": {"eventId": event_id.to_string()}},
                    "analysis": {"structuredData": {"rsvp_response": "yes"}},
                },
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        assert!(server.db.rsvps_for_event(event_id).await.unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_callback_marks_guest_and_logs_rsvp() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let event_id = create_event(&server).await;
        let guest_id = add_guest(&server, event_id, "Liam", "+15551234567").await;

        let resp = server
            .client
            .post(server.url("/vapi/callback"))
            .json(&json!({
                "status": "failed",
                "errorMessage": "carrier rejected",
                "metadata": {
                    "guestId": guest_id.to_string(),
                    "eventId": event_id.to_string(),
                },
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let guest = server.db.get_guest(guest_id).await.unwrap();
        assert_eq!(guest.call_status, CallStatus::FailedApiError);

        let rsvps = server.db.rsvps_for_event(event_id).await.unwrap();
        assert_eq!(rsvps[0].response.as_str(), "Call Failed");
    })
    .await
    .expect("test timed out");
}

// ── Voice cloning ────────────────────────────────────────────────────

#[tokio::test]
async fn voice_cloning_unconfigured_returns_503() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let event_id = create_event(&server).await;

        let resp = server
            .client
            .post(server.url(&format!("/api/events/{event_id}/voice")))
            .json(&json!({"sample_path": "/tmp/sample.wav"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);
    })
    .await
    .expect("test timed out");
}
