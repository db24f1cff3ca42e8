//! Analogue (continuous-value) sensor inputs of a vdSD.
//!
//! Same shape as binary inputs (`sensorDescriptions` /
//! `sensorSettings` / `sensorStates`) with a float value plus
//! optional context information in the volatile state. Sensors
//! default to a 2 s `minPushInterval` so chatty hardware does not
//! flood the vdSM.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use dsvdc_proto::{DsUid, Message, PropTree, PropValue, tree_to_elements};

use crate::context::{HostContext, InputKind, InputPath};
use crate::enums::{InputError, SensorType, SensorUsage};
use crate::macros::with;
use crate::persist::SensorInputRecord;
use crate::push::{PushDecision, PushKey, PushThrottle};
use crate::session::SessionHandle;

/// Default `minPushInterval` for sensors.
pub const DEFAULT_SENSOR_MIN_PUSH_INTERVAL: Duration = Duration::from_secs(2);

pub struct SensorInput {
    ctx: HostContext,
    ds_index: u8,
    // Description (read-only, persisted).
    name: String,
    sensor_type: SensorType,
    sensor_usage: SensorUsage,
    min: f64,
    max: f64,
    resolution: f64,
    update_interval: Duration,
    // Settings (writable, persisted).
    group: i64,
    throttle: PushThrottle,
    // State (volatile).
    value: Option<f64>,
    context_id: Option<i64>,
    context_msg: Option<String>,
    error: InputError,
    last_update: Option<Instant>,
    // Set while attached / announced.
    path: Option<InputPath>,
    session: Option<SessionHandle>,
}

impl SensorInput {
    pub fn new(ctx: &HostContext, ds_index: u8) -> Self {
        Self {
            ctx: ctx.clone(),
            ds_index,
            name: String::new(),
            sensor_type: SensorType::None,
            sensor_usage: SensorUsage::Undefined,
            min: 0.0,
            max: 100.0,
            resolution: 1.0,
            update_interval: Duration::ZERO,
            group: 0,
            throttle: PushThrottle::new(
                DEFAULT_SENSOR_MIN_PUSH_INTERVAL,
                Duration::ZERO,
                Duration::ZERO,
            ),
            value: None,
            context_id: None,
            context_msg: None,
            error: InputError::Ok,
            last_update: None,
            path: None,
            session: None,
        }
    }

    with!(sensor_type, SensorType);
    with!(sensor_usage, SensorUsage);
    with!(min, f64);
    with!(max, f64);
    with!(resolution, f64);
    with!(group, i64);

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

    pub fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    pub fn group(&self) -> i64 {
        self.group
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn error(&self) -> InputError {
        self.error
    }

    pub fn age(&self) -> Option<f64> {
        self.last_update
            .map(|at| Instant::now().duration_since(at).as_secs_f64())
    }

    // ---- state updates (device side) ---------------------------------

    /// Store a new reading and push (throttled).
    pub async fn update_value(&mut self, value: Option<f64>) {
        self.value = value;
        self.last_update = Some(Instant::now());
        debug!("sensor[{}] value -> {value:?}", self.ds_index);
        self.push_state(false).await;
    }

    /// Store a reading with context information (e.g. which register
    /// of a multi-value sensor produced it) and push.
    pub async fn update_value_with_context(
        &mut self,
        value: Option<f64>,
        context_id: Option<i64>,
        context_msg: Option<String>,
    ) {
        self.context_id = context_id;
        self.context_msg = context_msg;
        self.update_value(value).await;
    }

    pub async fn update_error(&mut self, error: InputError) {
        self.error = error;
        debug!("sensor[{}] error -> {error:?}", self.ds_index);
        self.push_state(false).await;
    }

    // ---- push engine -------------------------------------------------

    fn state_key(&self) -> PushKey {
        PushKey::Sensor(self.value)
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
                    "sensor[{}]: unchanged within changesOnlyInterval, dropping push",
                    self.ds_index
                );
            }
            PushDecision::Defer(delay) => {
                debug!(
                    "sensor[{}]: within minPushInterval, deferring push by {delay:?}",
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
        tree.insert("sensorStates".into(), states.into());

        let msg = Message::push_property(&path.vdsd.to_string(), tree_to_elements(&tree));
        if let Err(err) = session.send_notification(msg).await {
            warn!("sensor[{}]: failed to push state: {err}", self.ds_index);
        }
        let key = self.state_key();
        let ctx = self.ctx.clone();
        self.throttle.record_push(&ctx, &path, key);
    }

    // ---- lifecycle ---------------------------------------------------

    pub(crate) fn attach(&mut self, vdsd_dsuid: &DsUid) {
        self.path = Some(InputPath {
            vdsd: *vdsd_dsuid,
            kind: InputKind::Sensor,
            index: self.ds_index,
        });
    }

    pub(crate) fn start_session(&mut self, session: SessionHandle) {
        self.session = Some(session);
        self.throttle.reset();
        if let Some(path) = self.path.clone() {
            self.throttle.rearm_alive(&self.ctx, &path);
        }
    }

    pub(crate) fn stop_session(&mut self) {
        self.throttle.cancel_timers();
        self.session = None;
    }

    // ---- property dicts ----------------------------------------------

    /// `sensorDescriptions[N]` property dict.
    pub fn description_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("name".into(), self.name.clone().into());
        tree.insert("dsIndex".into(), PropValue::Int(self.ds_index as i64));
        tree.insert("sensorType".into(), PropValue::Int(self.sensor_type.into()));
        tree.insert(
            "sensorUsage".into(),
            PropValue::Int(self.sensor_usage.into()),
        );
        tree.insert("min".into(), self.min.into());
        tree.insert("max".into(), self.max.into());
        tree.insert("resolution".into(), self.resolution.into());
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

    /// `sensorSettings[N]` property dict.
    pub fn settings_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("group".into(), PropValue::Int(self.group));
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

    /// `sensorStates[N]` property dict.
    pub fn state_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("value".into(), self.value.into());
        tree.insert("age".into(), self.age().into());
        if let Some(context_id) = self.context_id {
            tree.insert("contextId".into(), PropValue::Int(context_id));
        }
        if let Some(ref context_msg) = self.context_msg {
            tree.insert("contextMsg".into(), context_msg.clone().into());
        }
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

    pub(crate) fn to_record(&self) -> SensorInputRecord {
        SensorInputRecord {
            ds_index: self.ds_index,
            name: self.name.clone(),
            sensor_type: self.sensor_type.into(),
            sensor_usage: self.sensor_usage.into(),
            min: self.min,
            max: self.max,
            resolution: self.resolution,
            update_interval: self.update_interval.as_secs_f64(),
            alive_sign_interval: self.throttle.alive_sign_interval.as_secs_f64(),
            group: self.group,
            min_push_interval: self.throttle.min_push_interval.as_secs_f64(),
            changes_only_interval: self.throttle.changes_only_interval.as_secs_f64(),
        }
    }

    pub(crate) fn from_record(ctx: &HostContext, record: &SensorInputRecord) -> Self {
        Self::new(ctx, record.ds_index)
            .with_name(&record.name)
            .with_sensor_type(SensorType::from_i64(record.sensor_type).unwrap_or(SensorType::None))
            .with_sensor_usage(
                SensorUsage::from_i64(record.sensor_usage).unwrap_or(SensorUsage::Undefined),
            )
            .with_min(record.min)
            .with_max(record.max)
            .with_resolution(record.resolution)
            .with_update_interval(record.update_interval)
            .with_alive_sign_interval(record.alive_sign_interval)
            .with_group(record.group)
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
    async fn sensors_default_to_two_second_min_push() {
        let si = SensorInput::new(&test_ctx(), 0);
        assert_eq!(si.throttle.min_push_interval, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn context_appears_in_state_props() {
        let mut si = SensorInput::new(&test_ctx(), 0).with_sensor_type(SensorType::Temperature);
        si.update_value_with_context(Some(21.5), Some(2), Some("register B".into()))
            .await;
        let state = si.state_props();
        assert_eq!(state["value"], PropValue::Double(21.5));
        assert_eq!(state["contextId"], PropValue::Int(2));
        assert_eq!(state["contextMsg"].as_str(), Some("register B"));
    }

    #[tokio::test(start_paused = true)]
    async fn age_tracks_updates() {
        let mut si = SensorInput::new(&test_ctx(), 0);
        assert!(si.age().is_none());
        si.update_value(Some(1.0)).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!((si.age().unwrap() - 5.0).abs() < 0.1);
    }

    #[tokio::test(start_paused = true)]
    async fn record_round_trip() {
        let si = SensorInput::new(&test_ctx(), 1)
            .with_name("Room Temperature")
            .with_sensor_type(SensorType::Temperature)
            .with_min(-20.0)
            .with_max(60.0)
            .with_resolution(0.1);
        let restored = SensorInput::from_record(&test_ctx(), &si.to_record());
        assert_eq!(restored.name(), "Room Temperature");
        assert_eq!(restored.sensor_type(), SensorType::Temperature);
        assert_eq!(restored.min, -20.0);
        assert_eq!(restored.value(), None);
    }
}
