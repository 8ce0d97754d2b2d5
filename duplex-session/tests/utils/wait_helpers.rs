use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

use duplex_core::{ChatMessage, RoomDocument, RoomId};
use duplex_session::{ChatSession, ConnectionStatus, NegotiationState, SessionEvent};

use super::TestWorld;

/// Timeout for the full offer/answer/candidate exchange (ms).
pub const CONNECTION_TIMEOUT_MS: u64 = 5000;

/// Timeout for a single message or event to show up (ms).
pub const EVENT_TIMEOUT_MS: u64 = 3000;

async fn wait_watch<T>(
    rx: &mut watch::Receiver<T>,
    timeout_ms: u64,
    what: &str,
    predicate: impl FnMut(&T) -> bool,
) -> Result<()> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), rx.wait_for(predicate))
        .await
        .with_context(|| format!("Timeout waiting for {}", what))?
        .with_context(|| format!("Session gone while waiting for {}", what))?;
    Ok(())
}

/// Wait until presence and negotiation both report the peer connected.
pub async fn wait_for_connected(session: &ChatSession) -> Result<()> {
    wait_watch(
        &mut session.status(),
        CONNECTION_TIMEOUT_MS,
        "presence CONNECTED",
        |s| *s == ConnectionStatus::Connected,
    )
    .await?;
    wait_watch(
        &mut session.state(),
        CONNECTION_TIMEOUT_MS,
        "negotiation CONNECTED",
        |s| *s == NegotiationState::Connected,
    )
    .await
}

pub async fn wait_for_state(session: &ChatSession, state: NegotiationState) -> Result<()> {
    wait_watch(&mut session.state(), EVENT_TIMEOUT_MS, "negotiation state", |s| {
        *s == state
    })
    .await
}

pub async fn wait_for_messages(session: &ChatSession, count: usize) -> Result<Vec<ChatMessage>> {
    let mut rx = session.watch_messages();
    wait_watch(&mut rx, EVENT_TIMEOUT_MS, "messages", |log| log.len() >= count).await?;
    let log = rx.borrow().clone();
    Ok(log)
}

/// Receive events until one matches, skipping the rest.
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut predicate: impl FnMut(&SessionEvent) -> bool,
) -> Result<SessionEvent> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);
    loop {
        let received = tokio::time::timeout_at(deadline, events.recv())
            .await
            .context("Timeout waiting for event")?;
        match received {
            Ok(event) if predicate(&event) => return Ok(event),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("[WaitHelper] Skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => anyhow::bail!("Event stream closed"),
        }
    }
}

/// Poll the store until the room document satisfies `predicate`
/// (`None` stands for an absent room).
pub async fn wait_for_room(
    world: &TestWorld,
    room_id: &RoomId,
    mut predicate: impl FnMut(Option<&RoomDocument>) -> bool,
) -> Result<Option<RoomDocument>> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);
    loop {
        let doc = world.room(room_id).await;
        if predicate(doc.as_ref()) {
            return Ok(doc);
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("Timeout waiting for room {}", room_id);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
