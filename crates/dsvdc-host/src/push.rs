//! Push throttling and alive-sign heartbeat for value inputs.
//!
//! Binary and sensor inputs share the same rate-limiting rules:
//!
//! * `changes_only_interval` suppresses re-pushes of an unchanged
//!   value within the window.
//! * `min_push_interval` rate-limits pushes; a change inside the
//!   window is deferred to `last_push + min_push_interval`, replacing
//!   any earlier deferred push.
//! * `alive_sign_interval` re-pushes the current state as a heartbeat
//!   whenever no other push happened within the interval.
//!
//! The throttle only decides and tracks; the owning input performs
//! the actual `VDC_SEND_PUSH_PROPERTY` send.

use std::time::Duration;

use tokio::time::Instant;

use crate::context::{HostContext, InputPath, TimerEvent, TimerHandle};

/// Value fingerprint used for changes-only suppression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PushKey {
    Binary(Option<bool>, Option<i64>),
    Sensor(Option<f64>),
}

/// Outcome of a throttling decision.
#[derive(Debug, PartialEq)]
pub(crate) enum PushDecision {
    Send,
    Drop,
    Defer(Duration),
}

#[derive(Debug, Default)]
pub(crate) struct PushThrottle {
    pub min_push_interval: Duration,
    pub changes_only_interval: Duration,
    pub alive_sign_interval: Duration,
    last_push: Option<Instant>,
    last_key: Option<PushKey>,
    alive_timer: Option<TimerHandle>,
    deferred: Option<TimerHandle>,
}

impl PushThrottle {
    pub fn new(
        min_push_interval: Duration,
        changes_only_interval: Duration,
        alive_sign_interval: Duration,
    ) -> Self {
        Self {
            min_push_interval,
            changes_only_interval,
            alive_sign_interval,
            ..Default::default()
        }
    }

    /// Decide what to do with a push of `key` at `now`.
    pub fn decide(&self, now: Instant, key: &PushKey, force: bool) -> PushDecision {
        if force {
            return PushDecision::Send;
        }
        let Some(last_push) = self.last_push else {
            return PushDecision::Send;
        };
        let elapsed = now.duration_since(last_push);

        if !self.changes_only_interval.is_zero()
            && self.last_key.as_ref() == Some(key)
            && elapsed < self.changes_only_interval
        {
            return PushDecision::Drop;
        }

        if !self.min_push_interval.is_zero() && elapsed < self.min_push_interval {
            return PushDecision::Defer(self.min_push_interval - elapsed);
        }

        PushDecision::Send
    }

    /// Record a completed push and re-arm the alive timer.
    pub fn record_push(&mut self, ctx: &HostContext, path: &InputPath, key: PushKey) {
        self.last_push = Some(Instant::now());
        self.last_key = Some(key);
        self.deferred = None;
        self.rearm_alive(ctx, path);
    }

    /// Schedule (or replace) the deferred push timer.
    pub fn schedule_deferred(&mut self, ctx: &HostContext, path: &InputPath, delay: Duration) {
        self.deferred = Some(ctx.spawn_timer(delay, TimerEvent::DeferredPush(path.clone())));
    }

    /// (Re)start the alive-sign timer after a push. A zero interval
    /// disables the heartbeat.
    pub fn rearm_alive(&mut self, ctx: &HostContext, path: &InputPath) {
        if self.alive_sign_interval.is_zero() {
            self.alive_timer = None;
            return;
        }
        self.alive_timer = Some(ctx.spawn_timer(
            self.alive_sign_interval,
            TimerEvent::AlivePush(path.clone()),
        ));
    }

    /// Cancel both timers (vanish, session disconnect, removal).
    pub fn cancel_timers(&mut self) {
        self.alive_timer = None;
        self.deferred = None;
    }

    /// Forget push history (used when a new session starts so the
    /// first push is never throttled against the previous session).
    pub fn reset(&mut self) {
        self.cancel_timers();
        self.last_push = None;
        self.last_key = None;
    }
}
