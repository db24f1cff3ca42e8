//! The single output of a vdSD, its channels and its scene table.
//!
//! Channel values flow in two directions:
//!
//! * vdSM → device: `setOutputChannelValue` notifications buffer
//!   values on the channels (`age` pending) until one with
//!   `apply_now` (or the field absent) flushes the batch through the
//!   registered [`ChannelHandler`] and confirms all ages.
//! * device → vdSM: [`Output::update_channel_value`] stores a
//!   confirmed value and, when `pushChanges` is set, pushes the
//!   `channelStates[dsIndex]` subtree.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;

use dsvdc_proto::{DsUid, Message, PropTree, PropValue, tree_to_elements};

use crate::channel::OutputChannel;
use crate::context::HostContext;
use crate::enums::{
    HeatingSystemCapability, HeatingSystemType, OutputChannelType, OutputError, OutputFunction,
    OutputMode, OutputUsage,
};
use crate::error::HostError;
use crate::macros::with;
use crate::persist::OutputRecord;
use crate::scenes::SceneTable;
use crate::session::SessionHandle;

/// Device-side sink for channel values the vdSM asked to apply.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    /// Called once per apply batch with the combined
    /// `{channelType → value}` updates. Errors are logged; the batch
    /// still counts as applied so no channel stays pending forever.
    async fn on_channels_applied(&self, updates: &BTreeMap<i64, f64>) -> Result<(), HostError>;
}

/// Standard channels auto-created per output function.
fn function_channels(function: OutputFunction) -> &'static [OutputChannelType] {
    use OutputChannelType::*;
    match function {
        OutputFunction::OnOff | OutputFunction::Dimmer => &[Brightness],
        OutputFunction::DimmerColorTemp => &[Brightness, ColorTemperature],
        OutputFunction::FullColorDimmer => &[Brightness, Hue, Saturation, ColorTemperature, CieX, CieY],
        // Positional, bipolar and internally controlled outputs get
        // their channels from the integrator.
        _ => &[],
    }
}

/// Snapshot taken before a scene call so it can be undone.
#[derive(Debug)]
struct SceneUndo {
    scene: u8,
    values: Vec<(u8, Option<f64>, Option<tokio::time::Instant>)>,
}

/// An apply batch extracted under the tree lock; the callback runs
/// without the lock held.
pub(crate) struct PendingApply {
    pub handler: Option<Arc<dyn ChannelHandler>>,
    pub updates: BTreeMap<i64, f64>,
    pub indices: Vec<u8>,
}

pub struct Output {
    ctx: HostContext,
    // Description (read-only, persisted).
    function: OutputFunction,
    output_usage: OutputUsage,
    name: String,
    default_group: i64,
    variable_ramp: bool,
    max_power: Option<f64>,
    active_cooling_mode: Option<bool>,
    // Settings (writable, persisted).
    mode: OutputMode,
    active_group: i64,
    groups: BTreeSet<i64>,
    push_changes: bool,
    on_threshold: Option<f64>,
    min_brightness: Option<f64>,
    dim_time_up: Option<i64>,
    dim_time_down: Option<i64>,
    dim_time_up_alt1: Option<i64>,
    dim_time_down_alt1: Option<i64>,
    dim_time_up_alt2: Option<i64>,
    dim_time_down_alt2: Option<i64>,
    heating_system_capability: Option<HeatingSystemCapability>,
    heating_system_type: Option<HeatingSystemType>,
    // Volatile state.
    local_priority: bool,
    error: OutputError,
    // Channels and scenes.
    channels: BTreeMap<u8, OutputChannel>,
    scenes: SceneTable,
    pending: BTreeMap<u8, f64>,
    last_call: Option<SceneUndo>,
    handler: Option<Arc<dyn ChannelHandler>>,
    // Set while the owning vdSD is announced.
    vdsd_dsuid: Option<DsUid>,
    session: Option<SessionHandle>,
}

impl Output {
    pub fn new(ctx: &HostContext, function: OutputFunction) -> Self {
        let mut channels = BTreeMap::new();
        for (index, channel_type) in function_channels(function).iter().enumerate() {
            let index = index as u8;
            channels.insert(index, OutputChannel::new(*channel_type as i64, index));
        }
        let scenes = SceneTable::with_defaults(&channel_ranges(&channels));
        Self {
            ctx: ctx.clone(),
            function,
            output_usage: OutputUsage::Undefined,
            name: String::new(),
            default_group: 0,
            variable_ramp: false,
            max_power: None,
            active_cooling_mode: None,
            mode: OutputMode::Default,
            active_group: 0,
            groups: BTreeSet::new(),
            push_changes: false,
            on_threshold: None,
            min_brightness: None,
            dim_time_up: None,
            dim_time_down: None,
            dim_time_up_alt1: None,
            dim_time_down_alt1: None,
            dim_time_up_alt2: None,
            dim_time_down_alt2: None,
            heating_system_capability: None,
            heating_system_type: None,
            local_priority: false,
            error: OutputError::Ok,
            channels,
            scenes,
            pending: BTreeMap::new(),
            last_call: None,
            handler: None,
            vdsd_dsuid: None,
            session: None,
        }
    }

    with!(output_usage, OutputUsage);
    with!(default_group, i64);
    with!(variable_ramp, bool);
    with!(max_power, Option<f64>);
    with!(active_cooling_mode, Option<bool>);
    with!(mode, OutputMode);
    with!(active_group, i64);
    with!(push_changes, bool);
    with!(heating_system_capability, Option<HeatingSystemCapability>);
    with!(heating_system_type, Option<HeatingSystemType>);

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn function(&self) -> OutputFunction {
        self.function
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn push_changes(&self) -> bool {
        self.push_changes
    }

    pub fn set_push_changes(&mut self, value: bool) {
        self.push_changes = value;
        self.ctx.schedule_save();
    }

    pub fn groups(&self) -> &BTreeSet<i64> {
        &self.groups
    }

    pub fn add_group(&mut self, group: i64) {
        self.groups.insert(group);
        self.ctx.schedule_save();
    }

    pub fn remove_group(&mut self, group: i64) {
        self.groups.remove(&group);
        self.ctx.schedule_save();
    }

    pub fn local_priority(&self) -> bool {
        self.local_priority
    }

    pub fn set_local_priority(&mut self, value: bool) {
        self.local_priority = value;
    }

    pub fn error(&self) -> OutputError {
        self.error
    }

    pub fn set_error(&mut self, error: OutputError) {
        self.error = error;
    }

    /// Register the device-side sink invoked when the vdSM applies
    /// buffered channel values.
    pub fn set_channel_handler(&mut self, handler: Arc<dyn ChannelHandler>) {
        self.handler = Some(handler);
    }

    // ---- channels ----------------------------------------------------

    pub fn channels(&self) -> impl Iterator<Item = &OutputChannel> {
        self.channels.values()
    }

    pub fn channel(&self, ds_index: u8) -> Option<&OutputChannel> {
        self.channels.get(&ds_index)
    }

    pub fn channel_by_type(&self, channel_type: i64) -> Option<&OutputChannel> {
        self.channels
            .values()
            .find(|ch| ch.channel_type() == channel_type)
    }

    /// Add a channel; its dsIndex must be unused. Scene presets are
    /// extended to cover the new channel.
    pub fn add_channel(&mut self, channel: OutputChannel) -> Result<(), HostError> {
        if self.channels.contains_key(&channel.ds_index()) {
            return Err(HostError::InvalidState("channel dsIndex already in use"));
        }
        self.scenes.extend_defaults(&[(
            channel.ds_index(),
            channel.min(),
            channel.max(),
        )]);
        self.channels.insert(channel.ds_index(), channel);
        self.ctx.schedule_save();
        Ok(())
    }

    pub fn remove_channel(&mut self, ds_index: u8) -> Option<OutputChannel> {
        let removed = self.channels.remove(&ds_index);
        if removed.is_some() {
            self.pending.remove(&ds_index);
            self.ctx.schedule_save();
        }
        removed
    }

    /// Device-side channel update: clamp, store confirmed and push
    /// `channelStates[dsIndex]` when `pushChanges` is enabled.
    pub async fn update_channel_value(&mut self, ds_index: u8, value: f64) {
        let Some(channel) = self.channels.get_mut(&ds_index) else {
            return;
        };
        let clamped = channel.set_value_confirmed(value);
        debug!("channel[{ds_index}] device-side update -> {clamped}");
        if self.push_changes {
            self.push_channel_state(ds_index).await;
        }
    }

    async fn push_channel_state(&self, ds_index: u8) {
        let (Some(session), Some(dsuid)) = (&self.session, &self.vdsd_dsuid) else {
            return;
        };
        let Some(channel) = self.channels.get(&ds_index) else {
            return;
        };
        let mut states = PropTree::new();
        states.insert(ds_index.to_string(), channel.state_props().into());
        let mut tree = PropTree::new();
        tree.insert("channelStates".into(), states.into());

        let msg = Message::push_property(&dsuid.to_string(), tree_to_elements(&tree));
        if let Err(err) = session.send_notification(msg).await {
            warn!("failed to push channelStates[{ds_index}]: {err}");
        }
    }

    // ---- apply-now buffering -----------------------------------------

    /// Buffer a vdSM channel write, addressed by channel type id
    /// (standard) with a dsIndex fallback. Returns false when no
    /// channel matches.
    pub(crate) fn buffer_channel_value(&mut self, channel: i64, value: f64) -> bool {
        let ds_index = self
            .channels
            .values()
            .find(|ch| ch.channel_type() == channel)
            .map(|ch| ch.ds_index())
            .or_else(|| {
                u8::try_from(channel)
                    .ok()
                    .filter(|idx| self.channels.contains_key(idx))
            });
        let Some(ds_index) = ds_index else {
            return false;
        };
        if let Some(ch) = self.channels.get_mut(&ds_index) {
            let clamped = ch.set_value_pending(value);
            self.pending.insert(ds_index, clamped);
            debug!("channel[{ds_index}] vdSM-side set -> {clamped} (pending)");
        }
        true
    }

    /// Take the buffered batch for an apply. Confirmation happens via
    /// [`Output::confirm_applied`] after the handler ran.
    pub(crate) fn take_pending_apply(&mut self) -> Option<PendingApply> {
        if self.pending.is_empty() {
            return None;
        }
        let mut updates = BTreeMap::new();
        let mut indices = Vec::new();
        for (ds_index, value) in std::mem::take(&mut self.pending) {
            if let Some(ch) = self.channels.get(&ds_index) {
                updates.insert(ch.channel_type(), value);
                indices.push(ds_index);
            }
        }
        Some(PendingApply {
            handler: self.handler.clone(),
            updates,
            indices,
        })
    }

    /// Stamp ages on the flushed channels once the device callback
    /// returned (or failed; the values count as applied either way to
    /// avoid a permanently pending age).
    pub(crate) fn confirm_applied(&mut self, indices: &[u8]) {
        for ds_index in indices {
            if let Some(ch) = self.channels.get_mut(ds_index) {
                ch.confirm_applied();
            }
        }
    }

    // ---- scenes ------------------------------------------------------

    pub fn scene_table(&self) -> &SceneTable {
        &self.scenes
    }

    pub fn scene_table_mut(&mut self) -> &mut SceneTable {
        &mut self.scenes
    }

    /// Apply scene `scene` to the channels. Entries marked dontCare
    /// (as a whole or per channel) leave the output untouched. Values
    /// are stored as hardware-confirmed.
    pub fn call_scene(&mut self, scene: u8) {
        let Some(targets) = self.scenes.channels_for_call(scene) else {
            debug!("callScene({scene}): dontCare, no effect");
            return;
        };
        self.last_call = Some(SceneUndo {
            scene,
            values: self
                .channels
                .values()
                .map(|ch| (ch.ds_index(), ch.value(), ch.confirmed_at()))
                .collect(),
        });
        for (ds_index, value) in targets {
            if let Some(ch) = self.channels.get_mut(&ds_index) {
                ch.set_value_confirmed(value);
            }
        }
        debug!("callScene({scene}) applied");
    }

    /// Snapshot the current channel values into scene `scene`.
    pub fn save_scene(&mut self, scene: u8) {
        let current: Vec<(u8, Option<f64>)> = self
            .channels
            .values()
            .map(|ch| (ch.ds_index(), ch.value()))
            .collect();
        self.scenes.save(scene, &current);
        self.ctx.schedule_save();
        debug!("saveScene({scene}) stored");
    }

    /// Revert the most recent `call_scene` if it was for `scene`.
    pub fn undo_scene(&mut self, scene: u8) {
        match self.last_call.take() {
            Some(undo) if undo.scene == scene => {
                for (ds_index, value, confirmed_at) in undo.values {
                    if let Some(ch) = self.channels.get_mut(&ds_index) {
                        ch.restore(value, confirmed_at);
                    }
                }
                debug!("undoScene({scene}) restored previous values");
            }
            Some(undo) => {
                // Not the scene that was last called; keep the snapshot.
                self.last_call = Some(undo);
            }
            None => debug!("undoScene({scene}): nothing to undo"),
        }
    }

    /// `callSceneMin`: apply the scene only when the output is not
    /// already active (all channel values unknown or at minimum).
    pub fn call_min_scene(&mut self, scene: u8) {
        let active = self
            .channels
            .values()
            .any(|ch| ch.value().map_or(false, |v| v > ch.min()));
        if !active {
            self.call_scene(scene);
        }
    }

    // ---- property dicts ----------------------------------------------

    /// `outputDescription` property dict.
    pub fn description_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("function".into(), PropValue::Int(self.function.into()));
        tree.insert("outputUsage".into(), PropValue::Int(self.output_usage.into()));
        tree.insert("name".into(), self.name.clone().into());
        tree.insert("defaultGroup".into(), PropValue::Int(self.default_group));
        tree.insert("variableRamp".into(), self.variable_ramp.into());
        if let Some(max_power) = self.max_power {
            tree.insert("maxPower".into(), max_power.into());
        }
        if let Some(cooling) = self.active_cooling_mode {
            tree.insert("activeCoolingMode".into(), cooling.into());
        }
        tree
    }

    /// `outputSettings` property dict.
    pub fn settings_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("mode".into(), PropValue::Int(self.mode.into()));
        tree.insert("activeGroup".into(), PropValue::Int(self.active_group));
        tree.insert("pushChanges".into(), self.push_changes.into());
        let groups: PropTree = self
            .groups
            .iter()
            .map(|gid| (gid.to_string(), PropValue::Bool(true)))
            .collect();
        tree.insert("groups".into(), groups.into());
        if let Some(v) = self.on_threshold {
            tree.insert("onThreshold".into(), v.into());
        }
        if let Some(v) = self.min_brightness {
            tree.insert("minBrightness".into(), v.into());
        }
        for (key, value) in [
            ("dimTimeUp", self.dim_time_up),
            ("dimTimeDown", self.dim_time_down),
            ("dimTimeUpAlt1", self.dim_time_up_alt1),
            ("dimTimeDownAlt1", self.dim_time_down_alt1),
            ("dimTimeUpAlt2", self.dim_time_up_alt2),
            ("dimTimeDownAlt2", self.dim_time_down_alt2),
        ] {
            if let Some(v) = value {
                tree.insert(key.into(), PropValue::Int(v));
            }
        }
        if let Some(v) = self.heating_system_capability {
            tree.insert("heatingSystemCapability".into(), PropValue::Int(v.into()));
        }
        if let Some(v) = self.heating_system_type {
            tree.insert("heatingSystemType".into(), PropValue::Int(v.into()));
        }
        tree
    }

    /// `outputState` property dict (volatile).
    pub fn state_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("localPriority".into(), self.local_priority.into());
        tree.insert("error".into(), PropValue::Int(self.error.into()));
        tree
    }

    pub fn channel_descriptions(&self) -> PropTree {
        self.channels
            .values()
            .map(|ch| (ch.ds_index().to_string(), ch.description_props().into()))
            .collect()
    }

    pub fn channel_settings(&self) -> PropTree {
        self.channels
            .values()
            .map(|ch| (ch.ds_index().to_string(), ch.settings_props().into()))
            .collect()
    }

    pub fn channel_states(&self) -> PropTree {
        self.channels
            .values()
            .map(|ch| (ch.ds_index().to_string(), ch.state_props().into()))
            .collect()
    }

    // ---- setProperty -------------------------------------------------

    /// Apply writable settings from a setProperty request. Unknown
    /// keys are silently ignored.
    pub(crate) fn apply_settings(&mut self, incoming: &PropTree) {
        if let Some(v) = incoming.get("mode").and_then(PropValue::as_i64) {
            if let Some(mode) = OutputMode::from_i64(v) {
                self.mode = mode;
            }
        }
        if let Some(v) = incoming.get("activeGroup").and_then(PropValue::as_i64) {
            self.active_group = v;
        }
        if let Some(v) = incoming.get("pushChanges").and_then(PropValue::as_bool) {
            self.push_changes = v;
        }
        if let Some(PropValue::Dict(groups)) = incoming.get("groups") {
            // Partial merge: {gid: true} adds, {gid: false} removes.
            for (gid, member) in groups {
                let Ok(gid) = gid.parse::<i64>() else {
                    continue;
                };
                match member.as_bool() {
                    Some(true) => {
                        self.groups.insert(gid);
                    }
                    Some(false) => {
                        self.groups.remove(&gid);
                    }
                    None => {}
                }
            }
        }
        if let Some(v) = incoming.get("onThreshold").and_then(PropValue::as_f64) {
            self.on_threshold = Some(v);
        }
        if let Some(v) = incoming.get("minBrightness").and_then(PropValue::as_f64) {
            self.min_brightness = Some(v);
        }
        for (key, slot) in [
            ("dimTimeUp", &mut self.dim_time_up),
            ("dimTimeDown", &mut self.dim_time_down),
            ("dimTimeUpAlt1", &mut self.dim_time_up_alt1),
            ("dimTimeDownAlt1", &mut self.dim_time_down_alt1),
            ("dimTimeUpAlt2", &mut self.dim_time_up_alt2),
            ("dimTimeDownAlt2", &mut self.dim_time_down_alt2),
        ] {
            if let Some(v) = incoming.get(key).and_then(PropValue::as_i64) {
                *slot = Some(v);
            }
        }
        if let Some(v) = incoming
            .get("heatingSystemCapability")
            .and_then(PropValue::as_i64)
        {
            self.heating_system_capability = HeatingSystemCapability::from_i64(v);
        }
        if let Some(v) = incoming
            .get("heatingSystemType")
            .and_then(PropValue::as_i64)
        {
            self.heating_system_type = HeatingSystemType::from_i64(v);
        }
        self.ctx.schedule_save();
    }

    /// Apply writable state from a setProperty request (only
    /// `localPriority` is writable).
    pub(crate) fn apply_state(&mut self, incoming: &PropTree) {
        if let Some(v) = incoming.get("localPriority").and_then(PropValue::as_bool) {
            self.local_priority = v;
        }
    }

    // ---- session management ------------------------------------------

    pub(crate) fn start_session(&mut self, vdsd_dsuid: DsUid, session: SessionHandle) {
        self.vdsd_dsuid = Some(vdsd_dsuid);
        self.session = Some(session);
    }

    pub(crate) fn stop_session(&mut self) {
        self.session = None;
        self.vdsd_dsuid = None;
        self.pending.clear();
    }

    // ---- persistence -------------------------------------------------

    pub(crate) fn to_record(&self) -> OutputRecord {
        OutputRecord {
            function: self.function.into(),
            output_usage: self.output_usage.into(),
            name: self.name.clone(),
            default_group: self.default_group,
            variable_ramp: self.variable_ramp,
            max_power: self.max_power,
            active_cooling_mode: self.active_cooling_mode,
            mode: self.mode.into(),
            active_group: self.active_group,
            push_changes: self.push_changes,
            groups: if self.groups.is_empty() {
                None
            } else {
                Some(self.groups.iter().copied().collect())
            },
            on_threshold: self.on_threshold,
            min_brightness: self.min_brightness,
            dim_time_up: self.dim_time_up,
            dim_time_down: self.dim_time_down,
            dim_time_up_alt1: self.dim_time_up_alt1,
            dim_time_down_alt1: self.dim_time_down_alt1,
            dim_time_up_alt2: self.dim_time_up_alt2,
            dim_time_down_alt2: self.dim_time_down_alt2,
            heating_system_capability: self.heating_system_capability.map(Into::into),
            heating_system_type: self.heating_system_type.map(Into::into),
            channels: Some(self.channels.values().map(|ch| ch.to_record()).collect()),
            scenes: Some(self.scenes.to_records()),
        }
    }

    pub(crate) fn from_record(ctx: &HostContext, record: &OutputRecord) -> Self {
        let function =
            OutputFunction::from_i64(record.function).unwrap_or(OutputFunction::OnOff);
        let mut output = Self::new(ctx, function);
        output.output_usage =
            OutputUsage::from_i64(record.output_usage).unwrap_or(OutputUsage::Undefined);
        output.name = record.name.clone();
        output.default_group = record.default_group;
        output.variable_ramp = record.variable_ramp;
        output.max_power = record.max_power;
        output.active_cooling_mode = record.active_cooling_mode;
        output.mode = OutputMode::from_i64(record.mode).unwrap_or(OutputMode::Default);
        output.active_group = record.active_group;
        output.push_changes = record.push_changes;
        output.groups = record.groups.clone().unwrap_or_default().into_iter().collect();
        output.on_threshold = record.on_threshold;
        output.min_brightness = record.min_brightness;
        output.dim_time_up = record.dim_time_up;
        output.dim_time_down = record.dim_time_down;
        output.dim_time_up_alt1 = record.dim_time_up_alt1;
        output.dim_time_down_alt1 = record.dim_time_down_alt1;
        output.dim_time_up_alt2 = record.dim_time_up_alt2;
        output.dim_time_down_alt2 = record.dim_time_down_alt2;
        output.heating_system_capability = record
            .heating_system_capability
            .and_then(HeatingSystemCapability::from_i64);
        output.heating_system_type = record
            .heating_system_type
            .and_then(HeatingSystemType::from_i64);

        if let Some(channels) = &record.channels {
            output.channels = channels
                .iter()
                .map(|ch| (ch.ds_index, OutputChannel::from_record(ch)))
                .collect();
            output.scenes = SceneTable::with_defaults(&channel_ranges(&output.channels));
        }
        if let Some(scenes) = &record.scenes {
            output.scenes.apply_records(scenes);
        }
        output
    }
}

fn channel_ranges(channels: &BTreeMap<u8, OutputChannel>) -> Vec<(u8, f64, f64)> {
    channels
        .values()
        .map(|ch| (ch.ds_index(), ch.min(), ch.max()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HostContext, SaveScheduler};
    use crate::enums::scene;
    use std::sync::Weak;

    fn test_ctx() -> HostContext {
        HostContext::new(Weak::new(), SaveScheduler::new(None, std::time::Duration::from_secs(1)))
    }

    #[tokio::test(start_paused = true)]
    async fn dimmer_gets_brightness_channel() {
        let out = Output::new(&test_ctx(), OutputFunction::Dimmer);
        assert_eq!(out.channels().count(), 1);
        let ch = out.channel(0).unwrap();
        assert_eq!(ch.channel_type(), OutputChannelType::Brightness as i64);
    }

    #[tokio::test(start_paused = true)]
    async fn full_color_dimmer_gets_six_channels() {
        let out = Output::new(&test_ctx(), OutputFunction::FullColorDimmer);
        assert_eq!(out.channels().count(), 6);
        assert!(out.channel_by_type(OutputChannelType::CieY as i64).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn scene_defaults_for_dimmer() {
        let out = Output::new(&test_ctx(), OutputFunction::Dimmer);
        let table = out.scene_table();
        let off = table.get(scene::PRESET_0).unwrap();
        assert!(!off.dont_care);
        assert_eq!(off.channels[&0].value, 0.0);
        let on = table.get(scene::PRESET_1).unwrap();
        assert_eq!(on.channels[&0].value, 100.0);
        assert!(table.get(scene::PRESET_2).unwrap().dont_care);
    }

    #[tokio::test(start_paused = true)]
    async fn save_then_call_scene() {
        let mut out = Output::new(&test_ctx(), OutputFunction::Dimmer);
        out.update_channel_value(0, 73.0).await;
        out.save_scene(scene::PRESET_2);
        let entry = out.scene_table().get(scene::PRESET_2).unwrap();
        assert_eq!(entry.channels[&0].value, 73.0);
        assert!(!entry.channels[&0].dont_care);

        out.update_channel_value(0, 10.0).await;
        out.call_scene(scene::PRESET_2);
        assert_eq!(out.channel(0).unwrap().value(), Some(73.0));
    }

    #[tokio::test(start_paused = true)]
    async fn dont_care_scene_call_is_noop() {
        let mut out = Output::new(&test_ctx(), OutputFunction::Dimmer);
        out.update_channel_value(0, 42.0).await;
        out.call_scene(scene::PRESET_2);
        assert_eq!(out.channel(0).unwrap().value(), Some(42.0));
    }

    #[tokio::test(start_paused = true)]
    async fn undo_restores_previous_values() {
        let mut out = Output::new(&test_ctx(), OutputFunction::Dimmer);
        out.update_channel_value(0, 42.0).await;
        out.call_scene(scene::PRESET_1);
        assert_eq!(out.channel(0).unwrap().value(), Some(100.0));
        out.undo_scene(scene::PRESET_1);
        assert_eq!(out.channel(0).unwrap().value(), Some(42.0));
    }

    #[tokio::test(start_paused = true)]
    async fn apply_now_batches_pending_values() {
        let mut out = Output::new(&test_ctx(), OutputFunction::FullColorDimmer);
        assert!(out.buffer_channel_value(OutputChannelType::Brightness as i64, 80.0));
        assert!(out.buffer_channel_value(OutputChannelType::Hue as i64, 120.0));
        assert!(out.buffer_channel_value(OutputChannelType::Saturation as i64, 50.0));

        // Ages pending until the apply.
        assert!(out.channel(0).unwrap().age().is_none());

        let batch = out.take_pending_apply().unwrap();
        assert_eq!(batch.updates.len(), 3);
        assert_eq!(
            batch.updates[&(OutputChannelType::Brightness as i64)],
            80.0
        );
        out.confirm_applied(&batch.indices);
        assert!(out.channel(0).unwrap().age().is_some());
        assert!(out.take_pending_apply().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_channel_write_is_rejected() {
        let mut out = Output::new(&test_ctx(), OutputFunction::Dimmer);
        assert!(!out.buffer_channel_value(OutputChannelType::AudioVolume as i64, 1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn settings_merge_groups_partially() {
        let mut out = Output::new(&test_ctx(), OutputFunction::Dimmer);
        out.add_group(1);
        out.add_group(2);

        let mut groups = PropTree::new();
        groups.insert("2".into(), false.into());
        groups.insert("5".into(), true.into());
        let mut incoming = PropTree::new();
        incoming.insert("groups".into(), groups.into());
        incoming.insert("pushChanges".into(), true.into());
        incoming.insert("bogusSetting".into(), PropValue::Int(1));
        out.apply_settings(&incoming);

        assert!(out.groups().contains(&1));
        assert!(!out.groups().contains(&2));
        assert!(out.groups().contains(&5));
        assert!(out.push_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn record_round_trip_keeps_scenes() {
        let ctx = test_ctx();
        let mut out = Output::new(&ctx, OutputFunction::Dimmer)
            .with_name("Lamp")
            .with_push_changes(true);
        out.update_channel_value(0, 85.0).await;
        out.save_scene(scene::PRESET_1);

        let record = out.to_record();
        let restored = Output::from_record(&ctx, &record);
        assert_eq!(restored.name(), "Lamp");
        assert!(restored.push_changes());
        let entry = restored.scene_table().get(scene::PRESET_1).unwrap();
        assert_eq!(entry.channels[&0].value, 85.0);
        // Volatile values do not survive.
        assert_eq!(restored.channel(0).unwrap().value(), None);
        assert!(restored.channel(0).unwrap().age().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn call_min_scene_only_fires_when_inactive() {
        let mut out = Output::new(&test_ctx(), OutputFunction::Dimmer);
        out.save_scene(scene::MINIMUM); // store current (None -> empty)
        out.update_channel_value(0, 60.0).await;
        out.call_min_scene(scene::PRESET_1);
        // Output already active: untouched.
        assert_eq!(out.channel(0).unwrap().value(), Some(60.0));

        out.update_channel_value(0, 0.0).await;
        out.call_min_scene(scene::PRESET_1);
        assert_eq!(out.channel(0).unwrap().value(), Some(100.0));
    }
}
