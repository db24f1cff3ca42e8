//! vDC: a logical virtual Device Connector grouping devices of one
//! implementation.

use std::collections::BTreeMap;

use log::debug;

use dsvdc_proto::dsuid::namespace;
use dsvdc_proto::{DsUid, PropTree, PropValue};

use crate::common::CommonProps;
use crate::context::HostContext;
use crate::macros::with_common;
use crate::persist::{CapabilitiesRecord, VdcRecord};
use crate::vdsd::{Device, Vdsd};

/// Entity type string of a vDC.
pub const ENTITY_TYPE_VDC: &str = "vDC";

/// Boolean capability flags of a vDC.
#[derive(Debug, Clone, Copy, Default)]
pub struct VdcCapabilities {
    /// The vDC provides metering data.
    pub metering: bool,
    /// The vDC can identify itself (e.g. blink a LED).
    pub identification: bool,
    /// The vDC supports dynamic device definitions.
    pub dynamic_definitions: bool,
}

impl VdcCapabilities {
    fn props(&self) -> PropTree {
        let mut tree = PropTree::new();
        tree.insert("metering".into(), self.metering.into());
        tree.insert("identification".into(), self.identification.into());
        tree.insert("dynamicDefinitions".into(), self.dynamic_definitions.into());
        tree
    }

    fn to_record(self) -> CapabilitiesRecord {
        CapabilitiesRecord {
            metering: self.metering,
            identification: self.identification,
            dynamic_definitions: self.dynamic_definitions,
        }
    }

    fn from_record(record: &CapabilitiesRecord) -> Self {
        Self {
            metering: record.metering,
            identification: record.identification,
            dynamic_definitions: record.dynamic_definitions,
        }
    }
}

pub struct Vdc {
    ctx: HostContext,
    dsuid: DsUid,
    implementation_id: String,
    common: CommonProps,
    capabilities: VdcCapabilities,
    zone_id: i64,
    devices: BTreeMap<DsUid, Device>,
    active: bool,
    announced: bool,
}

impl Vdc {
    /// Create a vDC. Without an explicit dSUID (see
    /// [`Vdc::with_dsuid`]) the identity is derived from
    /// `implementation_id` via UUIDv5 in the vDC namespace, so the
    /// same id always yields the same dSUID. Non-digitalSTROM
    /// implementations use an `"x-"`-prefixed id.
    pub fn new(ctx: &HostContext, implementation_id: &str) -> Self {
        Self {
            ctx: ctx.clone(),
            dsuid: DsUid::from_name_in_space(implementation_id, &namespace::VDC),
            implementation_id: implementation_id.to_string(),
            common: CommonProps {
                name: implementation_id.to_string(),
                model: "dsvdc vDC".into(),
                ..Default::default()
            },
            capabilities: VdcCapabilities::default(),
            zone_id: 0,
            devices: BTreeMap::new(),
            active: true,
            announced: false,
        }
    }

    pub fn with_dsuid(mut self, dsuid: DsUid) -> Self {
        self.dsuid = dsuid;
        self
    }

    pub fn with_capabilities(mut self, capabilities: VdcCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_zone_id(mut self, zone_id: i64) -> Self {
        self.zone_id = zone_id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.common.name = name.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.common.model = model.to_string();
        self
    }

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

    pub fn dsuid(&self) -> &DsUid {
        &self.dsuid
    }

    pub fn implementation_id(&self) -> &str {
        &self.implementation_id
    }

    pub fn name(&self) -> &str {
        &self.common.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.common.name = name.to_string();
        self.ctx.schedule_save();
    }

    pub fn zone_id(&self) -> i64 {
        self.zone_id
    }

    pub fn set_zone_id(&mut self, zone_id: i64) {
        self.zone_id = zone_id;
        self.ctx.schedule_save();
    }

    pub fn capabilities(&self) -> VdcCapabilities {
        self.capabilities
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    pub(crate) fn set_announced(&mut self, announced: bool) {
        self.announced = announced;
    }

    // ---- devices -----------------------------------------------------

    /// Register a device; keyed (and replaced) by its base dSUID.
    pub fn add_device(&mut self, device: Device) {
        let dsuid = *device.dsuid();
        debug!("added device {dsuid} to vDC '{}'", self.common.name);
        self.devices.insert(dsuid, device);
        self.ctx.schedule_save();
    }

    pub fn remove_device(&mut self, dsuid: &DsUid) -> Option<Device> {
        let removed = self.devices.remove(&dsuid.device_base());
        if let Some(device) = &removed {
            debug!("removed device {} from vDC '{}'", device.dsuid(), self.common.name);
            self.ctx.schedule_save();
        }
        removed
    }

    pub fn device(&self, dsuid: &DsUid) -> Option<&Device> {
        self.devices.get(&dsuid.device_base())
    }

    pub fn device_mut(&mut self, dsuid: &DsUid) -> Option<&mut Device> {
        self.devices.get_mut(&dsuid.device_base())
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.values_mut()
    }

    /// Find a vdSD anywhere in this vDC by its full dSUID.
    pub fn find_vdsd(&self, dsuid: &DsUid) -> Option<&Vdsd> {
        self.devices
            .get(&dsuid.device_base())
            .and_then(|device| device.vdsd(dsuid.subdevice_index()))
            .filter(|vdsd| vdsd.dsuid() == dsuid)
    }

    pub fn find_vdsd_mut(&mut self, dsuid: &DsUid) -> Option<&mut Vdsd> {
        self.devices
            .get_mut(&dsuid.device_base())
            .and_then(|device| device.vdsd_mut(dsuid.subdevice_index()))
            .filter(|vdsd| vdsd.dsuid() == dsuid)
    }

    /// Reset announcement state of this vDC and everything below
    /// (session end).
    pub(crate) fn reset_announcement(&mut self) {
        self.announced = false;
        for device in self.devices.values_mut() {
            device.reset_announcement();
        }
    }

    // ---- properties --------------------------------------------------

    pub fn get_properties(&self) -> PropTree {
        let mut tree = PropTree::new();
        self.common
            .fill_props(&mut tree, &self.dsuid, ENTITY_TYPE_VDC, self.active);
        tree.insert(
            "implementationId".into(),
            self.implementation_id.clone().into(),
        );
        tree.insert("capabilities".into(), self.capabilities.props().into());
        tree.insert("zoneID".into(), PropValue::Int(self.zone_id));
        tree
    }

    /// Writable properties: `name` and `zoneID`.
    pub(crate) fn apply_set_property(&mut self, incoming: &PropTree) {
        if let Some(name) = incoming.get("name").and_then(PropValue::as_str) {
            self.common.name = name.to_string();
            self.ctx.schedule_save();
        }
        if let Some(zone_id) = incoming.get("zoneID").and_then(PropValue::as_i64) {
            self.zone_id = zone_id;
            self.ctx.schedule_save();
        }
    }

    // ---- persistence -------------------------------------------------

    pub(crate) fn to_record(&self) -> VdcRecord {
        VdcRecord {
            dsuid: self.dsuid.to_string(),
            implementation_id: self.implementation_id.clone(),
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
            capabilities: Some(self.capabilities.to_record()),
            zone_id: Some(self.zone_id),
            devices: if self.devices.is_empty() {
                None
            } else {
                Some(self.devices.values().map(|d| d.to_record()).collect())
            },
        }
    }

    pub(crate) fn from_record(ctx: &HostContext, record: &VdcRecord) -> Self {
        let mut vdc = Self::new(ctx, &record.implementation_id);
        if let Ok(dsuid) = record.dsuid.parse() {
            vdc.dsuid = dsuid;
        }
        if let Some(name) = &record.name {
            vdc.common.name = name.clone();
        }
        if let Some(model) = &record.model {
            vdc.common.model = model.clone();
        }
        vdc.common.model_version = record.model_version.clone();
        vdc.common.model_uid = record.model_uid.clone();
        vdc.common.hardware_version = record.hardware_version.clone();
        vdc.common.hardware_guid = record.hardware_guid.clone();
        vdc.common.hardware_model_guid = record.hardware_model_guid.clone();
        vdc.common.vendor_name = record.vendor_name.clone();
        vdc.common.vendor_guid = record.vendor_guid.clone();
        vdc.common.oem_guid = record.oem_guid.clone();
        vdc.common.oem_model_guid = record.oem_model_guid.clone();
        vdc.common.config_url = record.config_url.clone();
        vdc.common.device_icon_name = record.device_icon_name.clone();
        vdc.common.device_class = record.device_class.clone();
        vdc.common.device_class_version = record.device_class_version.clone();
        if let Some(capabilities) = &record.capabilities {
            vdc.capabilities = VdcCapabilities::from_record(capabilities);
        }
        vdc.zone_id = record.zone_id.unwrap_or(0);
        for device_record in record.devices.as_deref().unwrap_or_default() {
            if let Some(device) = Device::from_record(ctx, device_record) {
                vdc.devices.insert(*device.dsuid(), device);
            }
        }
        vdc
    }
}
