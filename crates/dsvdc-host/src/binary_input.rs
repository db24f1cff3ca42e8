//! Binary (digital) inputs of a vdSD.
//!
//! Three property groups are visible to the vdSM:
//! `binaryInputDescriptions` (read-only hardware characteristics),
//! `binaryInputSettings` (writable, persisted) and
//! `binaryInputStates` (volatile, never persisted).
//!
//! Hardware feeds values in via [`BinaryInput::update_value`] /
//! [`BinaryInput::update_extended_value`]; while the owning vdSD is
//! announced the input pushes `binaryInputStates` changes, throttled
//! by the shared push engine.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use dsvdc_proto::{DsUid, Message, PropTree, PropValue, tree_to_elements};

use crate::context::{HostContext, InputKind, InputPath};
use crate::enums::{BinaryInputType, BinaryInputUsage, InputError};
use crate::macros::with;
use crate::persist::BinaryInputRecord;
use crate::push::{PushDecision, PushKey, PushThrottle};
use crate::session::SessionHandle;

/// `inputType` description value: value is only available by polling.
pub const INPUT_TYPE_POLL_ONLY: i64 = 0;
/// `inputType` description value: input reports changes by itself.
pub const INPUT_TYPE_DETECTS_CHANGES: i64 = 1;

pub struct BinaryInput {
    ctx: HostContext,
    ds_index: u8,
    // Description (read-only, persisted).
    name: String,
    input_type: i64,
    input_usage: BinaryInputUsage,
    hardwired_function: BinaryInputType,
    update_interval: Duration,
    // Settings (writable, persisted).
    group: i64,
    sensor_function: BinaryInputType,
    throttle: PushThrottle,
    // State (volatile).
    value: Option<bool>,
    extended_value: Option<i64>,
    error: InputError,
    last_update: Option<Instant>,
    // Set while attached / announced.
    path: Option<InputPath>,
    session: Option<SessionHandle>,
}

impl BinaryInput {
    pub fn new(ctx: &HostContext, ds_index: u8) -> Self {
        Self {
            ctx: ctx.clone(),
            ds_index,
            name: String::new(),
            input_type: INPUT_TYPE_DETECTS_CHANGES,
            input_usage: BinaryInputUsage::Undefined,
            hardwired_function: BinaryInputType::Generic,
            update_interval: Duration::ZERO,
            group: 0,
            sensor_function: BinaryInputType::Generic,
            // Binary inputs default to unthrottled pushes.
            throttle: PushThrottle::new(Duration::ZERO, Duration::ZERO, Duration::ZERO),
            value: None,
            extended_value: None,
            error: InputError::Ok,
            last_update: None,
            path: None,
            session: None,
        }
    }

    with!(input_type, i64);
    with!(input_usage, BinaryInputUsage);
    with!(hardwired_function, BinaryInputType);
    with!(group, i64);
    with!(sensor_function, BinaryInputType);

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_update_interval(mut self, seconds: f64) -> Self {
        self.update_interval = Duration::from_secs_f64(seconds);
        self
    }

    pub fn with_alive_sign_interval(mut self, seconds: f64) -> Self {
        self.throttle.alive_sign_interval = Duration::from_secs_f64(seconds);
        self
    }

    pub fn with_min_push_interval(mut self, seconds: f64) -> Self {
        self.throttle.min_push_interval = Duration::from_secs_f64(seconds);
        self
    }

    pub fn with_changes_only_interval(mut self, seconds: f64) -> Self {
        self.throttle.changes_only_interval = Duration::from_secs_f64(seconds);
        self
    }

    pub fn ds_index(&self) -> u8 {
        self.ds_index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> i64 {
        self.group
    }

    pub fn sensor_function(&self) -> BinaryInputType {
        self.sensor_function
    }

    pub fn value(&self) -> Option<bool> {
        self.value
    }

    pub fn extended_value(&self) -> Option<i64> {
        self.extended_value
    }

    pub fn error(&self) -> InputError {
        self.error
    }

    /// Seconds since the last value update, `None` when unknown.
    pub fn age(&self) -> Option<f64> {
        self.last_update
            .map(|at| Instant::now().duration_since(at).as_secs_f64())
    }

    // ---- state updates (device side) ---------------------------------

    /// Set the boolean value and push (throttled). Clears any
    /// extended value.
    pub async fn update_value(&mut self, value: Option<bool>) {
        self.value = value;
        self.extended_value = None;
        self.last_update = Some(Instant::now());
        debug!("binaryInput[{}] value -> {value:?}", self.ds_index);
        self.push_state(false).await;
    }

    /// Set the extended (integer) value and push (throttled). Clears
    /// the boolean value.
    pub async fn update_extended_value(&mut self, value: Option<i64>) {
        self.extended_value = value;
        self.value = None;
        self.last_update = Some(Instant::now());
        debug!("binaryInput[{}] extendedValue -> {value:?}", self.ds_index);
        self.push_state(false).await;
    }

    /// Set the error status and push (throttled).
    pub async fn update_error(&mut self, error: InputError) {
        self.error = error;
        debug!("binaryInput[{}] error -> {error:?}", self.ds_index);
        self.push_state(false).await;
    }

    // ---- push engine -------------------------------------------------

    fn state_key(&self) -> PushKey {
        PushKey::Binary(self.value, self.extended_value)
    }

    pub(crate) async fn push_state(&mut self, force: bool) {
        if self.session.is_none() {
            return;
        }
        let Some(path) = self.path.clone() else {
            return;
        };
        let key = self.state_key();
        match self.throttle.decide(Instant::now(), &key, force) {
            PushDecision::Send => self.do_push().await,
            PushDecision::Drop => {
                debug!(
                    "binaryInput[{}]: unchanged within changesOnlyInterval, dropping push",
                    self.ds_index
                );
            }
            PushDecision::Defer(delay) => {
                debug!(
                    "binaryInput[{}]: within minPushInterval, deferring push by {delay:?}",
                    self.ds_index
                );
                self.throttle.schedule_deferred(&self.ctx, &path, delay);
            }
        }
    }

    pub(crate) async fn do_push(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let Some(path) = self.path.clone() else {
            return;
        };

        let mut states = PropTree::new();
        states.insert(self.ds_index.to_string(), self.state_props().into());
        let mut tree = PropTree::new();
        tree.insert("binaryInputStates".into(), states.into());

        let msg = Message::push_property(&path.vdsd.to_string(), tree_to_elements(&tree));
        if let Err(err) = session.send_notification(msg).await {
            warn!("binaryInput[{}]: failed to push state: {err}", self.ds_index);
        }
        let key = self.state_key();
        let ctx = self.ctx.clone();
        self.throttle.record_push(&ctx, &path, key);
    }

    // ---- lifecycle ---------------------------------------------------

    pub(crate) fn attach(&mut self, vdsd_dsuid: &DsUid) {
        self.path = Some(InputPath {
            vdsd: *vdsd_dsuid,
            kind: InputKind::Binary,
            index: self.ds_index,
        });
    }

    /// Called on announcement: store the session and arm the alive
    /// timer.
    pub(crate) fn start_session(&mut self, session: SessionHandle) {
        self.session = Some(session);
        self.throttle.reset();
        if let Some(path) = self.path.clone() {
            self.throttle.rearm_alive(&self.ctx, &path);
        }
    }

    /// Called on vanish / session end: stop timers, drop the session.
    pub(crate) fn stop_session(&mut self) {
        self.throttle.cancel_timers();
        self.session = None;
    }

    // ---- property dicts ----------------------------------------------

    /// `binaryInputDescriptions[N]` property dict.
    pub fn description_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("name".into(), self.name.clone().into());
        tree.insert("dsIndex".into(), PropValue::Int(self.ds_index as i64));
        tree.insert("inputType".into(), PropValue::Int(self.input_type));
        tree.insert("inputUsage".into(), PropValue::Int(self.input_usage.into()));
        tree.insert(
            "hardwiredFunction".into(),
            PropValue::Int(self.hardwired_function.into()),
        );
        tree.insert(
            "updateInterval".into(),
            self.update_interval.as_secs_f64().into(),
        );
        tree.insert(
            "aliveSignInterval".into(),
            self.throttle.alive_sign_interval.as_secs_f64().into(),
        );
        tree
    }

    /// `binaryInputSettings[N]` property dict.
    pub fn settings_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("group".into(), PropValue::Int(self.group));
        tree.insert(
            "sensorFunction".into(),
            PropValue::Int(self.sensor_function.into()),
        );
        tree.insert(
            "minPushInterval".into(),
            self.throttle.min_push_interval.as_secs_f64().into(),
        );
        tree.insert(
            "changesOnlyInterval".into(),
            self.throttle.changes_only_interval.as_secs_f64().into(),
        );
        tree
    }

    /// `binaryInputStates[N]` property dict. The extended value takes
    /// precedence over the boolean one.
    pub fn state_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        if let Some(extended) = self.extended_value {
            tree.insert("extendedValue".into(), PropValue::Int(extended));
        } else {
            tree.insert("value".into(), self.value.into());
        }
        tree.insert("age".into(), self.age().into());
        tree.insert("error".into(), PropValue::Int(self.error.into()));
        tree
    }

    /// Apply writable settings; unknown keys are ignored.
    pub(crate) fn apply_settings(&mut self, incoming: &PropTree) {
        let mut changed = false;
        if let Some(v) = incoming.get("group").and_then(PropValue::as_i64) {
            self.group = v;
            changed = true;
        }
        if let Some(v) = incoming.get("sensorFunction").and_then(PropValue::as_i64) {
            if let Some(function) = BinaryInputType::from_i64(v) {
                self.sensor_function = function;
                changed = true;
            }
        }
        if let Some(v) = incoming.get("minPushInterval").and_then(PropValue::as_f64) {
            self.throttle.min_push_interval = Duration::from_secs_f64(v.max(0.0));
            changed = true;
        }
        if let Some(v) = incoming
            .get("changesOnlyInterval")
            .and_then(PropValue::as_f64)
        {
            self.throttle.changes_only_interval = Duration::from_secs_f64(v.max(0.0));
            changed = true;
        }
        if changed {
            self.ctx.schedule_save();
        }
    }

    // ---- persistence -------------------------------------------------

    pub(crate) fn to_record(&self) -> BinaryInputRecord {
        BinaryInputRecord {
            ds_index: self.ds_index,
            name: self.name.clone(),
            input_type: self.input_type,
            input_usage: self.input_usage.into(),
            hardwired_function: self.hardwired_function.into(),
            update_interval: self.update_interval.as_secs_f64(),
            alive_sign_interval: self.throttle.alive_sign_interval.as_secs_f64(),
            group: self.group,
            sensor_function: self.sensor_function.into(),
            min_push_interval: self.throttle.min_push_interval.as_secs_f64(),
            changes_only_interval: self.throttle.changes_only_interval.as_secs_f64(),
        }
    }

    pub(crate) fn from_record(ctx: &HostContext, record: &BinaryInputRecord) -> Self {
        Self::new(ctx, record.ds_index)
            .with_name(&record.name)
            .with_input_type(record.input_type)
            .with_input_usage(
                BinaryInputUsage::from_i64(record.input_usage)
                    .unwrap_or(BinaryInputUsage::Undefined),
            )
            .with_hardwired_function(
                BinaryInputType::from_i64(record.hardwired_function)
                    .unwrap_or(BinaryInputType::Generic),
            )
            .with_update_interval(record.update_interval)
            .with_alive_sign_interval(record.alive_sign_interval)
            .with_group(record.group)
            .with_sensor_function(
                BinaryInputType::from_i64(record.sensor_function)
                    .unwrap_or(BinaryInputType::Generic),
            )
            .with_min_push_interval(record.min_push_interval)
            .with_changes_only_interval(record.changes_only_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SaveScheduler;
    use std::sync::Weak;

    fn test_ctx() -> HostContext {
        HostContext::new(Weak::new(), SaveScheduler::new(None, Duration::from_secs(1)))
    }

    #[tokio::test(start_paused = true)]
    async fn extended_value_clears_boolean() {
        let mut bi = BinaryInput::new(&test_ctx(), 0);
        bi.update_value(Some(true)).await;
        assert_eq!(bi.value(), Some(true));
        bi.update_extended_value(Some(2)).await;
        assert_eq!(bi.value(), None);
        assert_eq!(bi.extended_value(), Some(2));
        // And back.
        bi.update_value(Some(false)).await;
        assert_eq!(bi.extended_value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn state_props_prefer_extended_value() {
        let mut bi = BinaryInput::new(&test_ctx(), 1);
        bi.update_extended_value(Some(2)).await;
        let state = bi.state_props();
        assert!(state.contains_key("extendedValue"));
        assert!(!state.contains_key("value"));

        bi.update_value(Some(true)).await;
        let state = bi.state_props();
        assert_eq!(state["value"], PropValue::Bool(true));
        assert!(!state.contains_key("extendedValue"));
    }

    #[tokio::test(start_paused = true)]
    async fn settings_apply_ignores_unknown_keys() {
        let mut bi = BinaryInput::new(&test_ctx(), 0);
        let mut incoming = PropTree::new();
        incoming.insert("group".into(), PropValue::Int(3));
        incoming.insert("minPushInterval".into(), 2.5f64.into());
        incoming.insert("noSuchSetting".into(), PropValue::Int(9));
        bi.apply_settings(&incoming);
        assert_eq!(bi.group(), 3);
        assert_eq!(bi.throttle.min_push_interval, Duration::from_secs_f64(2.5));
    }

    #[tokio::test(start_paused = true)]
    async fn record_round_trip() {
        let bi = BinaryInput::new(&test_ctx(), 2)
            .with_name("PIR")
            .with_sensor_function(BinaryInputType::Presence)
            .with_min_push_interval(1.0)
            .with_alive_sign_interval(300.0);
        let record = bi.to_record();
        let restored = BinaryInput::from_record(&test_ctx(), &record);
        assert_eq!(restored.name(), "PIR");
        assert_eq!(restored.sensor_function(), BinaryInputType::Presence);
        assert_eq!(restored.throttle.alive_sign_interval, Duration::from_secs(300));
        // State is volatile.
        assert_eq!(restored.value(), None);
        assert!(restored.age().is_none());
    }
}
