//! Handshake payload builders
//!
//! Pure constructors for the Identify (op 2) and Resume (op 6) bodies.
//! Both return `None` when there is no usable credential.

use gateway_core::{ClientState, Credential, IdentifyPayload, PresencePayload, ResumePayload};

use crate::session::Session;

/// Build the fresh-session Identify body
#[must_use]
pub fn identify(credential: Option<&Credential>) -> Option<IdentifyPayload> {
    let credential = credential.filter(|c| c.is_usable())?;
    let full_client = !credential.account.is_service_account();

    Some(IdentifyPayload {
        token: credential.token.expose().to_string(),
        properties: credential.properties.clone(),
        // Stream compression is negotiated through the connect URL
        compress: false,
        large_threshold: None,
        shard: None,
        presence: PresencePayload::default(),
        client_state: full_client.then(ClientState::placeholder),
        capabilities: full_client.then_some(credential.capabilities),
        intents: credential.intents.bits(),
    })
}

/// Build the Resume body for the given session
///
/// Also returns `None` if the session was never assigned an id.
#[must_use]
pub fn resume(credential: Option<&Credential>, session: &Session) -> Option<ResumePayload> {
    let credential = credential.filter(|c| c.is_usable())?;
    let session_id = session.id.clone()?;

    Some(ResumePayload {
        token: credential.token.expose().to_string(),
        session_id,
        seq: session.sequence,
    })
}
