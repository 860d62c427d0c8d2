//! Heartbeat controller
//!
//! Decides when to beat and when the connection is dead. It never touches the
//! transport; the state machine relays what it returns.

use gateway_core::GatewayPayload;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::Instant;

/// Per-connection heartbeat phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPhase {
    /// No connection
    Idle,
    /// Connected, Hello not yet received
    AwaitingInterval,
    /// Beating at the server's interval
    Beating,
}

/// What the controller wants done on a tick
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatSignal {
    /// Send this heartbeat, then tick again after the interval
    Beat(GatewayPayload),
    /// The previous beat was never acknowledged
    Zombied,
}

pub struct HeartbeatController {
    phase: HeartbeatPhase,
    interval: Option<Duration>,
    pending_ack: bool,
    last_sent: Option<Instant>,
    latency: Option<Duration>,
    rng: StdRng,
}

impl HeartbeatController {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic first-beat jitter for tests
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            phase: HeartbeatPhase::Idle,
            interval: None,
            pending_ack: false,
            last_sent: None,
            latency: None,
            rng,
        }
    }

    /// A transport opened; wait for Hello
    pub fn arm(&mut self) {
        self.reset();
        self.phase = HeartbeatPhase::AwaitingInterval;
    }

    /// Start beating at the given interval
    ///
    /// Returns the delay until the first tick, a random fraction of the
    /// interval so that clients reconnecting together do not beat together.
    pub fn on_hello(&mut self, interval: Duration) -> Duration {
        self.phase = HeartbeatPhase::Beating;
        self.interval = Some(interval);
        self.pending_ack = false;
        interval.mul_f64(self.rng.gen::<f64>())
    }

    /// Regular timer tick
    pub fn on_tick(&mut self, sequence: Option<u64>, now: Instant) -> Option<HeartbeatSignal> {
        if self.phase != HeartbeatPhase::Beating {
            return None;
        }

        if self.pending_ack {
            // Go quiet so the death is reported once
            self.phase = HeartbeatPhase::Idle;
            self.pending_ack = false;
            return Some(HeartbeatSignal::Zombied);
        }

        Some(HeartbeatSignal::Beat(self.beat(sequence, now)))
    }

    /// Server asked for a heartbeat right away; the regular timer is unaffected
    pub fn beat_now(&mut self, sequence: Option<u64>, now: Instant) -> GatewayPayload {
        self.beat(sequence, now)
    }

    fn beat(&mut self, sequence: Option<u64>, now: Instant) -> GatewayPayload {
        self.pending_ack = true;
        self.last_sent = Some(now);
        GatewayPayload::heartbeat(sequence)
    }

    /// Heartbeat acknowledged
    pub fn on_ack(&mut self, now: Instant) {
        if let Some(sent) = self.last_sent {
            self.latency = Some(now.saturating_duration_since(sent));
        }
        self.pending_ack = false;
    }

    /// Connection gone
    pub fn reset(&mut self) {
        self.phase = HeartbeatPhase::Idle;
        self.interval = None;
        self.pending_ack = false;
        self.last_sent = None;
    }

    #[must_use]
    pub fn phase(&self) -> HeartbeatPhase {
        self.phase
    }

    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    #[must_use]
    pub fn is_pending_ack(&self) -> bool {
        self.pending_ack
    }

    /// Round trip of the last acknowledged beat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}

impl Default for HeartbeatController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeartbeatController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatController")
            .field("phase", &self.phase)
            .field("interval", &self.interval)
            .field("pending_ack", &self.pending_ack)
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}
