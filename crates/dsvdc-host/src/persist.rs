//! Persisted-state records.
//!
//! These structs define the on-disk YAML layout. Only descriptions,
//! writable settings and structural topology are stored; volatile
//! state (values, ages, errors, click state, pending buffers, scene
//! history) never appears here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Top-level mapping of the state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(rename = "vdcHost")]
    pub vdc_host: HostRecord,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRecord {
    #[serde(rename = "dSUID")]
    pub dsuid: String,
    pub mac: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub model_version: Option<String>,
    #[serde(rename = "modelUID")]
    pub model_uid: Option<String>,
    pub hardware_version: Option<String>,
    pub hardware_guid: Option<String>,
    pub hardware_model_guid: Option<String>,
    pub vendor_name: Option<String>,
    pub vendor_guid: Option<String>,
    pub oem_guid: Option<String>,
    pub oem_model_guid: Option<String>,
    #[serde(rename = "configURL")]
    pub config_url: Option<String>,
    pub device_icon_name: Option<String>,
    pub vdcs: Option<Vec<VdcRecord>>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdcRecord {
    #[serde(rename = "dSUID")]
    pub dsuid: String,
    pub implementation_id: String,
    pub name: Option<String>,
    pub model: Option<String>,
    pub model_version: Option<String>,
    #[serde(rename = "modelUID")]
    pub model_uid: Option<String>,
    pub hardware_version: Option<String>,
    pub hardware_guid: Option<String>,
    pub hardware_model_guid: Option<String>,
    pub vendor_name: Option<String>,
    pub vendor_guid: Option<String>,
    pub oem_guid: Option<String>,
    pub oem_model_guid: Option<String>,
    #[serde(rename = "configURL")]
    pub config_url: Option<String>,
    pub device_icon_name: Option<String>,
    pub device_class: Option<String>,
    pub device_class_version: Option<String>,
    pub capabilities: Option<CapabilitiesRecord>,
    #[serde(rename = "zoneID")]
    pub zone_id: Option<i64>,
    pub devices: Option<Vec<DeviceRecord>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesRecord {
    pub metering: bool,
    pub identification: bool,
    pub dynamic_definitions: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(rename = "baseDsUID")]
    pub base_dsuid: String,
    pub vdsds: Vec<VdsdRecord>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdsdRecord {
    pub subdevice_index: u8,
    #[serde(rename = "dSUID")]
    pub dsuid: String,
    pub primary_group: i64,
    pub name: Option<String>,
    pub model: Option<String>,
    pub model_version: Option<String>,
    #[serde(rename = "modelUID")]
    pub model_uid: Option<String>,
    pub hardware_version: Option<String>,
    pub hardware_guid: Option<String>,
    pub hardware_model_guid: Option<String>,
    pub vendor_name: Option<String>,
    pub vendor_guid: Option<String>,
    pub oem_guid: Option<String>,
    pub oem_model_guid: Option<String>,
    #[serde(rename = "configURL")]
    pub config_url: Option<String>,
    pub device_icon_name: Option<String>,
    pub device_class: Option<String>,
    pub device_class_version: Option<String>,
    #[serde(rename = "zoneID")]
    pub zone_id: Option<i64>,
    pub model_features: Option<Vec<String>>,
    pub binary_inputs: Option<Vec<BinaryInputRecord>>,
    pub sensor_inputs: Option<Vec<SensorInputRecord>>,
    pub button_inputs: Option<Vec<ButtonInputRecord>>,
    pub output: Option<OutputRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryInputRecord {
    pub ds_index: u8,
    pub name: String,
    pub input_type: i64,
    pub input_usage: i64,
    pub hardwired_function: i64,
    pub update_interval: f64,
    pub alive_sign_interval: f64,
    // Writable settings.
    pub group: i64,
    pub sensor_function: i64,
    pub min_push_interval: f64,
    pub changes_only_interval: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorInputRecord {
    pub ds_index: u8,
    pub name: String,
    pub sensor_type: i64,
    pub sensor_usage: i64,
    pub min: f64,
    pub max: f64,
    pub resolution: f64,
    pub update_interval: f64,
    pub alive_sign_interval: f64,
    // Writable settings.
    pub group: i64,
    pub min_push_interval: f64,
    pub changes_only_interval: f64,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonInputRecord {
    pub ds_index: u8,
    pub name: String,
    pub supports_local_key_mode: bool,
    #[serde(rename = "buttonID")]
    pub button_id: Option<i64>,
    pub button_type: i64,
    #[serde(rename = "buttonElementID")]
    pub button_element_id: i64,
    // Writable settings.
    pub group: i64,
    pub function: i64,
    pub mode: i64,
    pub channel: i64,
    pub sets_local_priority: bool,
    pub calls_present: bool,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub function: i64,
    pub output_usage: i64,
    pub name: String,
    pub default_group: i64,
    pub variable_ramp: bool,
    pub max_power: Option<f64>,
    pub active_cooling_mode: Option<bool>,
    // Writable settings.
    pub mode: i64,
    pub active_group: i64,
    pub push_changes: bool,
    pub groups: Option<Vec<i64>>,
    pub on_threshold: Option<f64>,
    pub min_brightness: Option<f64>,
    pub dim_time_up: Option<i64>,
    pub dim_time_down: Option<i64>,
    pub dim_time_up_alt1: Option<i64>,
    pub dim_time_down_alt1: Option<i64>,
    pub dim_time_up_alt2: Option<i64>,
    pub dim_time_down_alt2: Option<i64>,
    pub heating_system_capability: Option<i64>,
    pub heating_system_type: Option<i64>,
    pub channels: Option<Vec<ChannelRecord>>,
    pub scenes: Option<Vec<SceneRecord>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub channel_type: i64,
    pub ds_index: u8,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub resolution: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRecord {
    pub index: u8,
    pub dont_care: bool,
    pub ignore_local_priority: bool,
    pub effect: i64,
    /// Channel dsIndex → stored value.
    pub channels: BTreeMap<u8, SceneChannelRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneChannelRecord {
    pub value: f64,
    pub dont_care: bool,
}
