//! vdSD (virtual dS device) and the physical Device wrapper.
//!
//! A [`Vdsd`] is the API-visible unit with its own dSUID, announced
//! individually. A [`Device`] groups one or more vdSDs sharing the
//! first 16 dSUID bytes (byte 16 is the sub-device index) and is the
//! unit of announcement and structural update: vdSDs cannot be added
//! to or removed from an announced device; the runtime vanishes and
//! re-announces instead (see `VdcHost::update_device`).

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use dsvdc_proto::{DsUid, PropTree, PropValue};

use crate::binary_input::BinaryInput;
use crate::button_input::ButtonInput;
use crate::common::CommonProps;
use crate::context::HostContext;
use crate::enums::ColorGroup;
use crate::error::HostError;
use crate::macros::{with, with_common};
use crate::output::Output;
use crate::persist::{DeviceRecord, VdsdRecord};
use crate::sensor_input::SensorInput;
use crate::session::SessionHandle;

/// Entity type string of a vdSD.
pub const ENTITY_TYPE_VDSD: &str = "vdSD";

pub struct Vdsd {
    ctx: HostContext,
    dsuid: DsUid,
    subdevice_index: u8,
    common: CommonProps,
    primary_group: ColorGroup,
    zone_id: i64,
    model_features: BTreeSet<String>,
    binary_inputs: BTreeMap<u8, BinaryInput>,
    sensor_inputs: BTreeMap<u8, SensorInput>,
    button_inputs: BTreeMap<u8, ButtonInput>,
    output: Option<Output>,
    active: bool,
    announced: bool,
}

impl Vdsd {
    /// Create a vdSD for sub-device `subdevice_index` of the device
    /// with base dSUID `base`.
    pub fn new(ctx: &HostContext, base: &DsUid, subdevice_index: u8) -> Self {
        Self {
            ctx: ctx.clone(),
            dsuid: base.with_subdevice(subdevice_index),
            subdevice_index,
            common: CommonProps {
                name: format!("Device {subdevice_index}"),
                model: "dsvdc device".into(),
                ..Default::default()
            },
            primary_group: ColorGroup::Black,
            zone_id: 0,
            model_features: BTreeSet::new(),
            binary_inputs: BTreeMap::new(),
            sensor_inputs: BTreeMap::new(),
            button_inputs: BTreeMap::new(),
            output: None,
            active: true,
            announced: false,
        }
    }

    with!(primary_group, ColorGroup);
    with!(zone_id, i64);
    with_common!(model_version, Option<String>);
    with_common!(model_uid, Option<String>);
    with_common!(hardware_version, Option<String>);
    with_common!(hardware_guid, Option<String>);
    with_common!(hardware_model_guid, Option<String>);
    with_common!(vendor_name, Option<String>);
    with_common!(vendor_guid, Option<String>);
    with_common!(oem_guid, Option<String>);
    with_common!(oem_model_guid, Option<String>);
    with_common!(config_url, Option<String>);
    with_common!(device_icon_16, Option<Vec<u8>>);
    with_common!(device_icon_name, Option<String>);
    with_common!(device_class, Option<String>);
    with_common!(device_class_version, Option<String>);

    pub fn with_name(mut self, name: &str) -> Self {
        self.common.name = name.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.common.model = model.to_string();
        self
    }

    pub fn with_model_feature(mut self, feature: &str) -> Self {
        self.model_features.insert(feature.to_string());
        self
    }

    pub fn dsuid(&self) -> &DsUid {
        &self.dsuid
    }

    pub fn subdevice_index(&self) -> u8 {
        self.subdevice_index
    }

    pub fn name(&self) -> &str {
        &self.common.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.common.name = name.to_string();
        self.ctx.schedule_save();
    }

    pub fn primary_group(&self) -> ColorGroup {
        self.primary_group
    }

    pub fn zone_id(&self) -> i64 {
        self.zone_id
    }

    pub fn set_zone_id(&mut self, zone_id: i64) {
        self.zone_id = zone_id;
        self.ctx.schedule_save();
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn model_features(&self) -> &BTreeSet<String> {
        &self.model_features
    }

    pub fn add_model_feature(&mut self, feature: &str) {
        self.model_features.insert(feature.to_string());
        self.ctx.schedule_save();
    }

    pub fn remove_model_feature(&mut self, feature: &str) {
        self.model_features.remove(feature);
        self.ctx.schedule_save();
    }

    // ---- components --------------------------------------------------

    /// Register a binary input; its dsIndex must be unique among the
    /// binary inputs of this vdSD.
    pub fn add_binary_input(&mut self, mut input: BinaryInput) -> Result<(), HostError> {
        if self.binary_inputs.contains_key(&input.ds_index()) {
            return Err(HostError::InvalidState("binary input dsIndex already in use"));
        }
        input.attach(&self.dsuid);
        debug!(
            "added binaryInput[{}] '{}' to vdSD {}",
            input.ds_index(),
            input.name(),
            self.dsuid
        );
        self.binary_inputs.insert(input.ds_index(), input);
        self.ctx.schedule_save();
        Ok(())
    }

    pub fn add_sensor_input(&mut self, mut input: SensorInput) -> Result<(), HostError> {
        if self.sensor_inputs.contains_key(&input.ds_index()) {
            return Err(HostError::InvalidState("sensor input dsIndex already in use"));
        }
        input.attach(&self.dsuid);
        self.sensor_inputs.insert(input.ds_index(), input);
        self.ctx.schedule_save();
        Ok(())
    }

    pub fn add_button_input(&mut self, mut input: ButtonInput) -> Result<(), HostError> {
        if self.button_inputs.contains_key(&input.ds_index()) {
            return Err(HostError::InvalidState("button input dsIndex already in use"));
        }
        input.attach(&self.dsuid);
        self.button_inputs.insert(input.ds_index(), input);
        self.ctx.schedule_save();
        Ok(())
    }

    /// Set the single output of this vdSD. A vdSD has at most one;
    /// independent outputs belong in separate vdSDs.
    pub fn set_output(&mut self, output: Output) {
        self.output = Some(output);
        self.ctx.schedule_save();
    }

    pub fn remove_binary_input(&mut self, ds_index: u8) -> Option<BinaryInput> {
        let mut removed = self.binary_inputs.remove(&ds_index);
        if let Some(input) = removed.as_mut() {
            input.stop_session();
            self.ctx.schedule_save();
        }
        removed
    }

    pub fn remove_sensor_input(&mut self, ds_index: u8) -> Option<SensorInput> {
        let mut removed = self.sensor_inputs.remove(&ds_index);
        if let Some(input) = removed.as_mut() {
            input.stop_session();
            self.ctx.schedule_save();
        }
        removed
    }

    pub fn remove_button_input(&mut self, ds_index: u8) -> Option<ButtonInput> {
        let mut removed = self.button_inputs.remove(&ds_index);
        if let Some(input) = removed.as_mut() {
            input.stop_session();
            self.ctx.schedule_save();
        }
        removed
    }

    pub fn binary_input(&self, ds_index: u8) -> Option<&BinaryInput> {
        self.binary_inputs.get(&ds_index)
    }

    pub fn binary_input_mut(&mut self, ds_index: u8) -> Option<&mut BinaryInput> {
        self.binary_inputs.get_mut(&ds_index)
    }

    pub fn sensor_input(&self, ds_index: u8) -> Option<&SensorInput> {
        self.sensor_inputs.get(&ds_index)
    }

    pub fn sensor_input_mut(&mut self, ds_index: u8) -> Option<&mut SensorInput> {
        self.sensor_inputs.get_mut(&ds_index)
    }

    pub fn button_input(&self, ds_index: u8) -> Option<&ButtonInput> {
        self.button_inputs.get(&ds_index)
    }

    pub fn button_input_mut(&mut self, ds_index: u8) -> Option<&mut ButtonInput> {
        self.button_inputs.get_mut(&ds_index)
    }

    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    pub fn output_mut(&mut self) -> Option<&mut Output> {
        self.output.as_mut()
    }

    // ---- announcement state ------------------------------------------

    /// Mark announced and hand the session to every component so they
    /// can push autonomously.
    pub(crate) fn mark_announced(&mut self, session: &SessionHandle) {
        self.announced = true;
        for input in self.binary_inputs.values_mut() {
            input.start_session(session.clone());
        }
        for input in self.sensor_inputs.values_mut() {
            input.start_session(session.clone());
        }
        for input in self.button_inputs.values_mut() {
            input.start_session(session.clone());
        }
        if let Some(output) = self.output.as_mut() {
            output.start_session(self.dsuid, session.clone());
        }
    }

    /// Drop the session everywhere and stop all per-input timers.
    pub(crate) fn reset_announcement(&mut self) {
        self.announced = false;
        for input in self.binary_inputs.values_mut() {
            input.stop_session();
        }
        for input in self.sensor_inputs.values_mut() {
            input.stop_session();
        }
        for input in self.button_inputs.values_mut() {
            input.stop_session();
        }
        if let Some(output) = self.output.as_mut() {
            output.stop_session();
        }
    }

    /// Re-derive this vdSD's dSUID from a new device base and update
    /// the component timer paths.
    pub(crate) fn rebase(&mut self, base: &DsUid) {
        self.dsuid = base.with_subdevice(self.subdevice_index);
        for input in self.binary_inputs.values_mut() {
            input.attach(&self.dsuid);
        }
        for input in self.sensor_inputs.values_mut() {
            input.attach(&self.dsuid);
        }
        for input in self.button_inputs.values_mut() {
            input.attach(&self.dsuid);
        }
    }

    // ---- timer routing -----------------------------------------------

    pub(crate) fn binary_inputs_mut(&mut self) -> impl Iterator<Item = &mut BinaryInput> {
        self.binary_inputs.values_mut()
    }

    pub(crate) fn sensor_inputs_mut(&mut self) -> impl Iterator<Item = &mut SensorInput> {
        self.sensor_inputs.values_mut()
    }

    // ---- properties --------------------------------------------------

    /// All properties of this vdSD for getProperty.
    pub fn get_properties(&self) -> PropTree {
        let mut tree = PropTree::new();
        self.common
            .fill_props(&mut tree, &self.dsuid, ENTITY_TYPE_VDSD, self.active);
        tree.insert(
            "primaryGroup".into(),
            PropValue::Int(self.primary_group.into()),
        );
        tree.insert("zoneID".into(), PropValue::Int(self.zone_id));
        let features: PropTree = self
            .model_features
            .iter()
            .map(|f| (f.clone(), PropValue::Bool(true)))
            .collect();
        tree.insert("modelFeatures".into(), features.into());

        if !self.binary_inputs.is_empty() {
            tree.insert(
                "binaryInputDescriptions".into(),
                indexed(self.binary_inputs.values().map(|i| (i.ds_index(), i.description_props()))),
            );
            tree.insert(
                "binaryInputSettings".into(),
                indexed(self.binary_inputs.values().map(|i| (i.ds_index(), i.settings_props()))),
            );
            tree.insert(
                "binaryInputStates".into(),
                indexed(self.binary_inputs.values().map(|i| (i.ds_index(), i.state_props()))),
            );
        }
        if !self.sensor_inputs.is_empty() {
            tree.insert(
                "sensorDescriptions".into(),
                indexed(self.sensor_inputs.values().map(|i| (i.ds_index(), i.description_props()))),
            );
            tree.insert(
                "sensorSettings".into(),
                indexed(self.sensor_inputs.values().map(|i| (i.ds_index(), i.settings_props()))),
            );
            tree.insert(
                "sensorStates".into(),
                indexed(self.sensor_inputs.values().map(|i| (i.ds_index(), i.state_props()))),
            );
        }
        if !self.button_inputs.is_empty() {
            tree.insert(
                "buttonInputDescriptions".into(),
                indexed(self.button_inputs.values().map(|i| (i.ds_index(), i.description_props()))),
            );
            tree.insert(
                "buttonInputSettings".into(),
                indexed(self.button_inputs.values().map(|i| (i.ds_index(), i.settings_props()))),
            );
            tree.insert(
                "buttonInputStates".into(),
                indexed(self.button_inputs.values().map(|i| (i.ds_index(), i.state_props()))),
            );
        }
        if let Some(output) = &self.output {
            tree.insert("outputDescription".into(), output.description_props().into());
            tree.insert("outputSettings".into(), output.settings_props().into());
            tree.insert("outputState".into(), output.state_props().into());
            tree.insert("channelDescriptions".into(), output.channel_descriptions().into());
            tree.insert("channelSettings".into(), output.channel_settings().into());
            tree.insert("channelStates".into(), output.channel_states().into());
        }
        tree
    }

    /// Apply a setProperty tree: writable scalars plus nested
    /// settings groups. Unknown keys are silently ignored; volatile
    /// state (other than `outputState.localPriority`) is not writable.
    pub(crate) fn apply_set_property(&mut self, incoming: &PropTree) {
        if let Some(name) = incoming.get("name").and_then(PropValue::as_str) {
            self.common.name = name.to_string();
            self.ctx.schedule_save();
        }
        if let Some(zone_id) = incoming.get("zoneID").and_then(PropValue::as_i64) {
            self.zone_id = zone_id;
            self.ctx.schedule_save();
        }
        if let Some(PropValue::Dict(settings)) = incoming.get("binaryInputSettings") {
            for (index, entry) in settings {
                if let (Ok(index), Some(entry)) = (index.parse::<u8>(), entry.as_dict()) {
                    if let Some(input) = self.binary_inputs.get_mut(&index) {
                        input.apply_settings(entry);
                    }
                }
            }
        }
        if let Some(PropValue::Dict(settings)) = incoming.get("sensorSettings") {
            for (index, entry) in settings {
                if let (Ok(index), Some(entry)) = (index.parse::<u8>(), entry.as_dict()) {
                    if let Some(input) = self.sensor_inputs.get_mut(&index) {
                        input.apply_settings(entry);
                    }
                }
            }
        }
        if let Some(PropValue::Dict(settings)) = incoming.get("buttonInputSettings") {
            for (index, entry) in settings {
                if let (Ok(index), Some(entry)) = (index.parse::<u8>(), entry.as_dict()) {
                    if let Some(input) = self.button_inputs.get_mut(&index) {
                        input.apply_settings(entry);
                    }
                }
            }
        }
        if let Some(PropValue::Dict(settings)) = incoming.get("outputSettings") {
            if let Some(output) = self.output.as_mut() {
                output.apply_settings(settings);
            }
        }
        if let Some(PropValue::Dict(state)) = incoming.get("outputState") {
            if let Some(output) = self.output.as_mut() {
                output.apply_state(state);
            }
        }
    }

    // ---- persistence -------------------------------------------------

    pub(crate) fn to_record(&self) -> VdsdRecord {
        VdsdRecord {
            subdevice_index: self.subdevice_index,
            dsuid: self.dsuid.to_string(),
            primary_group: self.primary_group.into(),
            name: Some(self.common.name.clone()),
            model: Some(self.common.model.clone()),
            model_version: self.common.model_version.clone(),
            model_uid: Some(self.common.model_uid()),
            hardware_version: self.common.hardware_version.clone(),
            hardware_guid: self.common.hardware_guid.clone(),
            hardware_model_guid: self.common.hardware_model_guid.clone(),
            vendor_name: self.common.vendor_name.clone(),
            vendor_guid: self.common.vendor_guid.clone(),
            oem_guid: self.common.oem_guid.clone(),
            oem_model_guid: self.common.oem_model_guid.clone(),
            config_url: self.common.config_url.clone(),
            device_icon_name: self.common.device_icon_name.clone(),
            device_class: self.common.device_class.clone(),
            device_class_version: self.common.device_class_version.clone(),
            zone_id: Some(self.zone_id),
            model_features: if self.model_features.is_empty() {
                None
            } else {
                Some(self.model_features.iter().cloned().collect())
            },
            binary_inputs: if self.binary_inputs.is_empty() {
                None
            } else {
                Some(self.binary_inputs.values().map(|i| i.to_record()).collect())
            },
            sensor_inputs: if self.sensor_inputs.is_empty() {
                None
            } else {
                Some(self.sensor_inputs.values().map(|i| i.to_record()).collect())
            },
            button_inputs: if self.button_inputs.is_empty() {
                None
            } else {
                Some(self.button_inputs.values().map(|i| i.to_record()).collect())
            },
            output: self.output.as_ref().map(|o| o.to_record()),
        }
    }

    pub(crate) fn from_record(ctx: &HostContext, base: &DsUid, record: &VdsdRecord) -> Self {
        let mut vdsd = Self::new(ctx, base, record.subdevice_index);
        if let Some(group) = ColorGroup::from_i64(record.primary_group) {
            vdsd.primary_group = group;
        }
        if let Some(name) = &record.name {
            vdsd.common.name = name.clone();
        }
        if let Some(model) = &record.model {
            vdsd.common.model = model.clone();
        }
        vdsd.common.model_version = record.model_version.clone();
        vdsd.common.model_uid = record.model_uid.clone();
        vdsd.common.hardware_version = record.hardware_version.clone();
        vdsd.common.hardware_guid = record.hardware_guid.clone();
        vdsd.common.hardware_model_guid = record.hardware_model_guid.clone();
        vdsd.common.vendor_name = record.vendor_name.clone();
        vdsd.common.vendor_guid = record.vendor_guid.clone();
        vdsd.common.oem_guid = record.oem_guid.clone();
        vdsd.common.oem_model_guid = record.oem_model_guid.clone();
        vdsd.common.config_url = record.config_url.clone();
        vdsd.common.device_icon_name = record.device_icon_name.clone();
        vdsd.common.device_class = record.device_class.clone();
        vdsd.common.device_class_version = record.device_class_version.clone();
        vdsd.zone_id = record.zone_id.unwrap_or(0);
        vdsd.model_features = record
            .model_features
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();
        for input in record.binary_inputs.as_deref().unwrap_or_default() {
            let mut restored = BinaryInput::from_record(ctx, input);
            restored.attach(&vdsd.dsuid);
            vdsd.binary_inputs.insert(input.ds_index, restored);
        }
        for input in record.sensor_inputs.as_deref().unwrap_or_default() {
            let mut restored = SensorInput::from_record(ctx, input);
            restored.attach(&vdsd.dsuid);
            vdsd.sensor_inputs.insert(input.ds_index, restored);
        }
        for input in record.button_inputs.as_deref().unwrap_or_default() {
            let mut restored = ButtonInput::from_record(ctx, input);
            restored.attach(&vdsd.dsuid);
            vdsd.button_inputs.insert(input.ds_index, restored);
        }
        vdsd.output = record
            .output
            .as_ref()
            .map(|record| Output::from_record(ctx, record));
        vdsd
    }
}

fn indexed(entries: impl Iterator<Item = (u8, PropTree)>) -> PropValue {
    entries
        .map(|(index, props)| (index.to_string(), PropValue::Dict(props)))
        .collect::<PropTree>()
        .into()
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// One physical hardware device: a group of vdSDs sharing a base
/// dSUID.
pub struct Device {
    ctx: HostContext,
    dsuid: DsUid,
    vdsds: BTreeMap<u8, Vdsd>,
    announced: bool,
}

impl Device {
    pub fn new(ctx: &HostContext, dsuid: DsUid) -> Self {
        Self {
            ctx: ctx.clone(),
            dsuid: dsuid.device_base(),
            vdsds: BTreeMap::new(),
            announced: false,
        }
    }

    /// Base dSUID (sub-device index 0).
    pub fn dsuid(&self) -> &DsUid {
        &self.dsuid
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    pub fn vdsds(&self) -> impl Iterator<Item = &Vdsd> {
        self.vdsds.values()
    }

    pub fn vdsds_mut(&mut self) -> impl Iterator<Item = &mut Vdsd> {
        self.vdsds.values_mut()
    }

    pub fn vdsd(&self, subdevice_index: u8) -> Option<&Vdsd> {
        self.vdsds.get(&subdevice_index)
    }

    pub fn vdsd_mut(&mut self, subdevice_index: u8) -> Option<&mut Vdsd> {
        self.vdsds.get_mut(&subdevice_index)
    }

    /// Register a vdSD. The device must not be announced (use the
    /// host's `update_device` for structural changes) and the vdSD
    /// must share this device's base dSUID.
    pub fn add_vdsd(&mut self, vdsd: Vdsd) -> Result<(), HostError> {
        if self.announced {
            return Err(HostError::InvalidState(
                "cannot add vdSD to an announced device, use update_device",
            ));
        }
        if !vdsd.dsuid().same_device(&self.dsuid) {
            return Err(HostError::InvalidState(
                "vdSD dSUID does not share the device base",
            ));
        }
        debug!(
            "added vdSD '{}' (sub-device {}) to device {}",
            vdsd.name(),
            vdsd.subdevice_index(),
            self.dsuid
        );
        self.vdsds.insert(vdsd.subdevice_index(), vdsd);
        self.ctx.schedule_save();
        Ok(())
    }

    /// Remove a vdSD by sub-device index; forbidden while announced.
    pub fn remove_vdsd(&mut self, subdevice_index: u8) -> Result<Option<Vdsd>, HostError> {
        if self.announced {
            return Err(HostError::InvalidState(
                "cannot remove vdSD from an announced device, use update_device",
            ));
        }
        let removed = self.vdsds.remove(&subdevice_index);
        if removed.is_some() {
            self.ctx.schedule_save();
        }
        Ok(removed)
    }

    /// Change the base dSUID, re-deriving every contained vdSD.
    pub fn set_dsuid(&mut self, dsuid: DsUid) -> Result<(), HostError> {
        if self.announced {
            return Err(HostError::InvalidState(
                "cannot change the dSUID of an announced device",
            ));
        }
        self.dsuid = dsuid.device_base();
        for vdsd in self.vdsds.values_mut() {
            vdsd.rebase(&self.dsuid);
        }
        self.ctx.schedule_save();
        Ok(())
    }

    pub(crate) fn set_announced(&mut self, announced: bool) {
        self.announced = announced;
    }

    /// Reset announcement state on this device and all vdSDs
    /// (session end).
    pub(crate) fn reset_announcement(&mut self) {
        for vdsd in self.vdsds.values_mut() {
            vdsd.reset_announcement();
        }
        self.announced = false;
    }

    // ---- persistence -------------------------------------------------

    pub(crate) fn to_record(&self) -> DeviceRecord {
        DeviceRecord {
            base_dsuid: self.dsuid.to_string(),
            vdsds: self.vdsds.values().map(|v| v.to_record()).collect(),
        }
    }

    pub(crate) fn from_record(ctx: &HostContext, record: &DeviceRecord) -> Option<Self> {
        let base: DsUid = record.base_dsuid.parse().ok()?;
        let mut device = Self::new(ctx, base);
        for vdsd_record in &record.vdsds {
            let vdsd = Vdsd::from_record(ctx, &device.dsuid, vdsd_record);
            device.vdsds.insert(vdsd.subdevice_index(), vdsd);
        }
        Some(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SaveScheduler;
    use crate::enums::OutputFunction;
    use dsvdc_proto::dsuid::namespace;
    use std::sync::Weak;
    use std::time::Duration;

    fn test_ctx() -> HostContext {
        HostContext::new(Weak::new(), SaveScheduler::new(None, Duration::from_secs(1)))
    }

    fn base() -> DsUid {
        DsUid::from_name_in_space("device-1", &namespace::VDC)
    }

    #[tokio::test(start_paused = true)]
    async fn vdsd_derives_dsuid_from_base() {
        let ctx = test_ctx();
        let vdsd = Vdsd::new(&ctx, &base(), 2);
        assert_eq!(vdsd.dsuid().subdevice_index(), 2);
        assert!(vdsd.dsuid().same_device(&base()));
    }

    #[tokio::test(start_paused = true)]
    async fn device_rejects_foreign_vdsd() {
        let ctx = test_ctx();
        let mut device = Device::new(&ctx, base());
        let foreign = DsUid::from_name_in_space("other", &namespace::VDC);
        let vdsd = Vdsd::new(&ctx, &foreign, 0);
        assert!(device.add_vdsd(vdsd).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn announced_device_is_structurally_frozen() {
        let ctx = test_ctx();
        let mut device = Device::new(&ctx, base());
        device.add_vdsd(Vdsd::new(&ctx, &base(), 0)).unwrap();
        device.set_announced(true);
        assert!(device.add_vdsd(Vdsd::new(&ctx, &base(), 1)).is_err());
        assert!(device.remove_vdsd(0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rebase_rederives_children() {
        let ctx = test_ctx();
        let mut device = Device::new(&ctx, base());
        device.add_vdsd(Vdsd::new(&ctx, &base(), 0)).unwrap();
        device.add_vdsd(Vdsd::new(&ctx, &base(), 1)).unwrap();

        let new_base = DsUid::from_name_in_space("renumbered", &namespace::VDC);
        device.set_dsuid(new_base).unwrap();
        for vdsd in device.vdsds() {
            assert!(vdsd.dsuid().same_device(&new_base));
        }
        assert_eq!(device.vdsd(1).unwrap().dsuid().subdevice_index(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_input_index_rejected() {
        let ctx = test_ctx();
        let mut vdsd = Vdsd::new(&ctx, &base(), 0);
        vdsd.add_binary_input(BinaryInput::new(&ctx, 0)).unwrap();
        assert!(vdsd.add_binary_input(BinaryInput::new(&ctx, 0)).is_err());
        // Other kinds have their own index spaces.
        vdsd.add_sensor_input(SensorInput::new(&ctx, 0)).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn properties_include_component_groups() {
        let ctx = test_ctx();
        let mut vdsd = Vdsd::new(&ctx, &base(), 0).with_model_feature("blink");
        vdsd.add_binary_input(BinaryInput::new(&ctx, 0)).unwrap();
        vdsd.set_output(Output::new(&ctx, OutputFunction::Dimmer));

        let props = vdsd.get_properties();
        assert_eq!(props["type"].as_str(), Some(ENTITY_TYPE_VDSD));
        assert!(props.contains_key("binaryInputDescriptions"));
        assert!(props.contains_key("binaryInputStates"));
        assert!(props.contains_key("outputDescription"));
        assert!(props.contains_key("channelDescriptions"));
        let features = props["modelFeatures"].as_dict().unwrap();
        assert_eq!(features["blink"], PropValue::Bool(true));
    }

    #[tokio::test(start_paused = true)]
    async fn record_round_trip_preserves_topology() {
        let ctx = test_ctx();
        let mut device = Device::new(&ctx, base());
        let mut vdsd = Vdsd::new(&ctx, &base(), 0)
            .with_name("Kitchen Light")
            .with_primary_group(ColorGroup::Yellow);
        vdsd.add_binary_input(BinaryInput::new(&ctx, 0)).unwrap();
        vdsd.set_output(Output::new(&ctx, OutputFunction::Dimmer));
        device.add_vdsd(vdsd).unwrap();

        let record = device.to_record();
        let restored = Device::from_record(&ctx, &record).unwrap();
        assert_eq!(restored.dsuid(), device.dsuid());
        let restored_vdsd = restored.vdsd(0).unwrap();
        assert_eq!(restored_vdsd.name(), "Kitchen Light");
        assert_eq!(restored_vdsd.primary_group(), ColorGroup::Yellow);
        assert!(restored_vdsd.binary_input(0).is_some());
        assert!(restored_vdsd.output().is_some());
    }
}
