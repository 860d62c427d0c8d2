//! Test fixtures and payload builders

use std::sync::atomic::{AtomicU64, Ordering};

use gateway_client::{GatewayEndpoint, GatewayOptions, GatewayResult};
use gateway_common::ReconnectConfig;
use gateway_core::{Credential, GatewayPayload};
use serde_json::json;

/// Counter for unique session ids
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Token the fake gateway expects
pub const TEST_TOKEN: &str = "integration-token";

pub fn test_credential() -> Credential {
    Credential::bot(TEST_TOKEN)
}

/// Client options with short, deterministic backoff
pub fn test_options(url: &str) -> GatewayResult<GatewayOptions> {
    Ok(GatewayOptions::new(GatewayEndpoint::parse(url)?).with_reconnect(ReconnectConfig {
        base_delay_ms: 50,
        max_delay_ms: 200,
        jitter: 0.0,
        max_attempts: None,
    }))
}

/// READY dispatch pointing resumes back at the same gateway
pub fn ready(session_id: &str, resume_url: &str, seq: u64) -> GatewayPayload {
    GatewayPayload::dispatch(
        "READY",
        seq,
        json!({
            "session_id": session_id,
            "resume_gateway_url": resume_url,
            "user": {"id": "1", "username": "tester"},
        }),
    )
}

pub fn message_create(seq: u64, content: &str) -> GatewayPayload {
    GatewayPayload::dispatch(
        "MESSAGE_CREATE",
        seq,
        json!({"id": format!("msg-{seq}"), "channel_id": "100", "content": content}),
    )
}
