//! Descriptive properties shared by every addressable entity.

use dsvdc_proto::dsuid::namespace;
use dsvdc_proto::{DsUid, PropTree, PropValue};

/// Common property set of host, vDC and vdSD entities.
///
/// `None` means "not set"; unset properties still appear as NULL in
/// getProperty responses but are omitted from persisted state.
#[derive(Debug, Clone, Default)]
pub struct CommonProps {
    pub name: String,
    pub model: String,
    pub model_version: Option<String>,
    pub model_uid: Option<String>,
    pub hardware_version: Option<String>,
    pub hardware_guid: Option<String>,
    pub hardware_model_guid: Option<String>,
    pub vendor_name: Option<String>,
    pub vendor_guid: Option<String>,
    pub oem_guid: Option<String>,
    pub oem_model_guid: Option<String>,
    pub config_url: Option<String>,
    pub device_icon_16: Option<Vec<u8>>,
    pub device_icon_name: Option<String>,
    pub device_class: Option<String>,
    pub device_class_version: Option<String>,
}

impl CommonProps {
    /// `modelUID`, derived deterministically from the model name when
    /// not explicitly set (UUIDv5 in the vDC namespace).
    pub fn model_uid(&self) -> String {
        match &self.model_uid {
            Some(uid) => uid.clone(),
            None => derive_model_uid(&self.model),
        }
    }

    /// Fill `tree` with the common properties for `dsuid` and the
    /// entity-type string.
    pub fn fill_props(&self, tree: &mut PropTree, dsuid: &DsUid, entity_type: &str, active: bool) {
        let dsuid_str = dsuid.to_string();
        tree.insert("dSUID".into(), dsuid_str.clone().into());
        tree.insert("displayId".into(), dsuid_str.into());
        tree.insert("type".into(), entity_type.into());
        tree.insert("name".into(), self.name.clone().into());
        tree.insert("model".into(), self.model.clone().into());
        tree.insert("modelVersion".into(), self.model_version.clone().into());
        tree.insert("modelUID".into(), self.model_uid().into());
        tree.insert(
            "hardwareVersion".into(),
            self.hardware_version.clone().into(),
        );
        tree.insert("hardwareGuid".into(), self.hardware_guid.clone().into());
        tree.insert(
            "hardwareModelGuid".into(),
            self.hardware_model_guid.clone().into(),
        );
        tree.insert("vendorName".into(), self.vendor_name.clone().into());
        tree.insert("vendorGuid".into(), self.vendor_guid.clone().into());
        tree.insert("oemGuid".into(), self.oem_guid.clone().into());
        tree.insert("oemModelGuid".into(), self.oem_model_guid.clone().into());
        tree.insert("configURL".into(), self.config_url.clone().into());
        tree.insert(
            "deviceIcon16".into(),
            match &self.device_icon_16 {
                Some(bytes) => PropValue::Bytes(bytes.clone()),
                None => PropValue::Null,
            },
        );
        tree.insert(
            "deviceIconName".into(),
            self.device_icon_name.clone().into(),
        );
        tree.insert("deviceClass".into(), self.device_class.clone().into());
        tree.insert(
            "deviceClassVersion".into(),
            self.device_class_version.clone().into(),
        );
        tree.insert("active".into(), active.into());
    }
}

/// Deterministic `modelUID` from a model name.
pub fn derive_model_uid(model: &str) -> String {
    DsUid::from_name_in_space(model, &namespace::VDC).to_string()
}
