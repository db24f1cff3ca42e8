//! Output channels: one controllable dimension of a device output.

use tokio::time::Instant;

use dsvdc_proto::{PropTree, PropValue};

use crate::enums::OutputChannelType;
use crate::persist::ChannelRecord;

/// Metadata defaults for a standard channel type.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub resolution: f64,
}

/// Default metadata per standard channel type. Device-specific ids
/// (192-239) have no entry and keep caller-supplied metadata.
pub fn channel_spec(channel_type: i64) -> Option<ChannelSpec> {
    use OutputChannelType::*;
    let spec = |name, min, max: f64, resolution| ChannelSpec {
        name,
        min,
        max,
        resolution,
    };
    let known = OutputChannelType::from_i64(channel_type)?;
    Some(match known {
        Brightness => spec("brightness", 0.0, 100.0, 100.0 / 255.0),
        Hue => spec("hue", 0.0, 360.0, 360.0 / 255.0),
        Saturation => spec("saturation", 0.0, 100.0, 100.0 / 255.0),
        ColorTemperature => spec("colortemp", 100.0, 1000.0, 900.0 / 255.0),
        CieX => spec("x", 0.0, 10000.0, 10000.0 / 255.0),
        CieY => spec("y", 0.0, 10000.0, 10000.0 / 255.0),
        ShadePositionOutside => spec("shadePositionOutside", 0.0, 100.0, 100.0 / 255.0),
        ShadePositionIndoor => spec("shadePositionIndoor", 0.0, 100.0, 100.0 / 255.0),
        ShadeOpeningAngleOutside => spec("shadeOpeningAngleOutside", 0.0, 100.0, 100.0 / 255.0),
        ShadeOpeningAngleIndoor => spec("shadeOpeningAngleIndoor", 0.0, 100.0, 100.0 / 255.0),
        Transparency => spec("transparency", 0.0, 100.0, 100.0 / 255.0),
        HeatingPower => spec("heatingPower", 0.0, 100.0, 100.0 / 255.0),
        HeatingValve => spec("heatingValve", 0.0, 100.0, 100.0 / 255.0),
        CoolingCapacity => spec("coolingCapacity", 0.0, 100.0, 100.0 / 255.0),
        CoolingValve => spec("coolingValve", 0.0, 100.0, 100.0 / 255.0),
        AirFlowIntensity => spec("airFlowIntensity", 0.0, 100.0, 100.0 / 255.0),
        AirFlowDirection => spec("airFlowDirection", 0.0, 2.0, 1.0),
        AirFlapPosition => spec("airFlapPosition", 0.0, 100.0, 100.0 / 255.0),
        AirLouverPosition => spec("airLouverPosition", 0.0, 100.0, 100.0 / 255.0),
        AirLouverAuto => spec("airLouverAuto", 0.0, 1.0, 1.0),
        AirFlowAuto => spec("airFlowAuto", 0.0, 1.0, 1.0),
        AudioVolume => spec("audioVolume", 0.0, 100.0, 100.0 / 255.0),
        AudioBass => spec("audioBass", 0.0, 100.0, 100.0 / 255.0),
        AudioTreble => spec("audioTreble", 0.0, 100.0, 100.0 / 255.0),
        AudioBalance => spec("audioBalance", 0.0, 100.0, 100.0 / 255.0),
        WaterTemperature => spec("waterTemperature", 0.0, 150.0, 150.0 / 255.0),
        WaterFlow => spec("waterFlow", 0.0, 100.0, 100.0 / 255.0),
        PowerState => spec("powerState", 0.0, 3.0, 1.0),
        WindSpeedRate => spec("windSpeedRate", 0.0, 100.0, 100.0 / 255.0),
        PowerLevel => spec("powerLevel", 0.0, 100.0, 100.0 / 255.0),
        Default => spec("default", 0.0, 100.0, 1.0),
    })
}

/// One output channel.
///
/// Description metadata is persisted; `value` and the confirmation
/// timestamp are volatile. `age` is `None` while a vdSM-written value
/// is still pending hardware confirmation.
#[derive(Debug)]
pub struct OutputChannel {
    channel_type: i64,
    ds_index: u8,
    name: String,
    min: f64,
    max: f64,
    resolution: f64,
    value: Option<f64>,
    confirmed_at: Option<Instant>,
}

impl OutputChannel {
    pub fn new(channel_type: i64, ds_index: u8) -> Self {
        let spec = channel_spec(channel_type);
        Self {
            channel_type,
            ds_index,
            name: spec
                .map(|s| s.name.to_string())
                .unwrap_or_else(|| format!("channel_{ds_index}")),
            min: spec.map_or(0.0, |s| s.min),
            max: spec.map_or(100.0, |s| s.max),
            resolution: spec.map_or(1.0, |s| s.resolution),
            value: None,
            confirmed_at: None,
        }
    }

    pub fn with_range(mut self, min: f64, max: f64, resolution: f64) -> Self {
        self.min = min;
        self.max = max;
        self.resolution = resolution;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn channel_type(&self) -> i64 {
        self.channel_type
    }

    pub fn ds_index(&self) -> u8 {
        self.ds_index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Seconds since the value was last confirmed by hardware, or
    /// `None` while unconfirmed.
    pub fn age(&self) -> Option<f64> {
        self.confirmed_at
            .map(|at| Instant::now().duration_since(at).as_secs_f64())
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Store a vdSM-written value; the confirmation timestamp is
    /// cleared until the device applies it.
    pub(crate) fn set_value_pending(&mut self, value: f64) -> f64 {
        let clamped = self.clamp(value);
        self.value = Some(clamped);
        self.confirmed_at = None;
        clamped
    }

    /// Store a device-confirmed value (device-side update or scene
    /// call) and stamp the age.
    pub(crate) fn set_value_confirmed(&mut self, value: f64) -> f64 {
        let clamped = self.clamp(value);
        self.value = Some(clamped);
        self.confirmed_at = Some(Instant::now());
        clamped
    }

    /// Mark the currently stored value as applied to hardware.
    pub(crate) fn confirm_applied(&mut self) {
        self.confirmed_at = Some(Instant::now());
    }

    pub(crate) fn restore(&mut self, value: Option<f64>, confirmed_at: Option<Instant>) {
        self.value = value;
        self.confirmed_at = confirmed_at;
    }

    pub(crate) fn confirmed_at(&self) -> Option<Instant> {
        self.confirmed_at
    }

    /// `channelDescriptions[N]` property dict.
    pub fn description_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("name".into(), self.name.clone().into());
        tree.insert("channelType".into(), PropValue::Int(self.channel_type));
        tree.insert("dsIndex".into(), PropValue::Int(self.ds_index as i64));
        tree.insert("min".into(), self.min.into());
        tree.insert("max".into(), self.max.into());
        tree.insert("resolution".into(), self.resolution.into());
        tree
    }

    /// `channelSettings[N]` property dict (no per-channel settings
    /// are defined).
    pub fn settings_props(&self) -> PropTree {
        PropTree::new()
    }

    /// `channelStates[N]` property dict.
    pub fn state_props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("value".into(), self.value.into());
        tree.insert("age".into(), self.age().into());
        tree
    }

    pub(crate) fn to_record(&self) -> ChannelRecord {
        ChannelRecord {
            channel_type: self.channel_type,
            ds_index: self.ds_index,
            name: self.name.clone(),
            min: self.min,
            max: self.max,
            resolution: self.resolution,
        }
    }

    pub(crate) fn from_record(record: &ChannelRecord) -> Self {
        let mut channel = Self::new(record.channel_type, record.ds_index);
        channel.name = record.name.clone();
        channel.min = record.min;
        channel.max = record.max;
        channel.resolution = record.resolution;
        channel
    }
}
