//! The vDC host: top-level entity, builder and owned entity tree.
//!
//! [`HostBuilder`] assembles the configuration (restoring persisted
//! state when a state path is given) and produces a [`VdcHost`]. The
//! host owns the whole entity tree behind one async mutex; sessions,
//! timers and integrator code all mutate it through that lock, which
//! gives the cooperative consistency model: between awaits the tree
//! is always in a consistent state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::{Mutex, MutexGuard};

use dsvdc_proto::{DsUid, PropTree, PropValue};

use crate::common::CommonProps;
use crate::context::{
    DEFAULT_AUTO_SAVE_DELAY, HostContext, InputKind, SaveScheduler, SharedState, TimerEvent,
};
use crate::error::HostError;
use crate::macros::with;
use crate::output::PendingApply;
use crate::persist::{HostRecord, StateFile};
use crate::session::SessionHandle;
use crate::store::{PropertyStore, StoreError};
use crate::vdc::Vdc;
use crate::vdsd::Vdsd;

/// Entity type string of the vDC host.
pub const ENTITY_TYPE_VDC_HOST: &str = "vDChost";

/// Default TCP port of the vDC API socket.
pub const DEFAULT_VDC_PORT: u16 = 8444;

/// Builder for a [`VdcHost`].
///
/// Must be built inside a tokio runtime (the host schedules its
/// initial auto-save at construction).
#[derive(Debug, Default)]
pub struct HostBuilder {
    mac: Option<String>,
    port: Option<u16>,
    dsuid: Option<DsUid>,
    name: Option<String>,
    model: Option<String>,
    model_version: Option<String>,
    model_uid: Option<String>,
    hardware_version: Option<String>,
    hardware_guid: Option<String>,
    hardware_model_guid: Option<String>,
    vendor_name: Option<String>,
    vendor_guid: Option<String>,
    oem_guid: Option<String>,
    oem_model_guid: Option<String>,
    config_url: Option<String>,
    device_icon_16: Option<Vec<u8>>,
    device_icon_name: Option<String>,
    state_path: Option<PathBuf>,
    auto_save_delay: Option<Duration>,
    node_name: Option<String>,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    with!(mac, Option<String>);
    with!(port, Option<u16>);
    with!(dsuid, Option<DsUid>);
    with!(name, Option<String>);
    with!(model, Option<String>);
    with!(model_version, Option<String>);
    with!(model_uid, Option<String>);
    with!(hardware_version, Option<String>);
    with!(hardware_guid, Option<String>);
    with!(hardware_model_guid, Option<String>);
    with!(vendor_name, Option<String>);
    with!(vendor_guid, Option<String>);
    with!(oem_guid, Option<String>);
    with!(oem_model_guid, Option<String>);
    with!(config_url, Option<String>);
    with!(device_icon_16, Option<Vec<u8>>);
    with!(device_icon_name, Option<String>);
    with!(state_path, Option<PathBuf>);
    with!(auto_save_delay, Option<Duration>);
    with!(node_name, Option<String>);

    /// Build the host, restoring persisted state when available.
    pub fn build(self) -> Result<VdcHost, HostError> {
        let store = self.state_path.map(PropertyStore::new);
        let restored = store.as_ref().and_then(|s| s.load());
        let restored_host = restored.map(|state| state.vdc_host);

        let mac = match self
            .mac
            .or_else(|| restored_host.as_ref().and_then(|h| h.mac.clone()))
        {
            Some(mac) => mac,
            None => default_mac(),
        };

        let dsuid = match self.dsuid {
            Some(dsuid) => dsuid,
            None => match restored_host.as_ref().and_then(|h| h.dsuid.parse().ok()) {
                Some(dsuid) => dsuid,
                None => DsUid::from_vdc_mac(&mac)?,
            },
        };

        let port = self
            .port
            .or_else(|| restored_host.as_ref().and_then(|h| h.port))
            .unwrap_or(DEFAULT_VDC_PORT);

        let node_name = self.node_name.unwrap_or_else(default_node_name);
        let name = self
            .name
            .or_else(|| restored_host.as_ref().and_then(|h| h.name.clone()))
            .unwrap_or_else(|| format!("vDC host on {node_name}"));
        let model = self
            .model
            .or_else(|| restored_host.as_ref().and_then(|h| h.model.clone()))
            .unwrap_or_else(|| "dsvdc host".to_string());

        let pick = |explicit: Option<String>, from_record: fn(&HostRecord) -> Option<String>| {
            explicit.or_else(|| restored_host.as_ref().and_then(from_record))
        };
        let common = CommonProps {
            name,
            model,
            model_version: pick(self.model_version, |h| h.model_version.clone()),
            model_uid: pick(self.model_uid, |h| h.model_uid.clone()),
            hardware_version: pick(self.hardware_version, |h| h.hardware_version.clone()),
            hardware_guid: Some(
                pick(self.hardware_guid, |h| h.hardware_guid.clone())
                    .unwrap_or_else(|| format!("macaddress:{mac}")),
            ),
            hardware_model_guid: pick(self.hardware_model_guid, |h| h.hardware_model_guid.clone()),
            vendor_name: pick(self.vendor_name, |h| h.vendor_name.clone()),
            vendor_guid: pick(self.vendor_guid, |h| h.vendor_guid.clone()),
            oem_guid: pick(self.oem_guid, |h| h.oem_guid.clone()),
            oem_model_guid: pick(self.oem_model_guid, |h| h.oem_model_guid.clone()),
            config_url: pick(self.config_url, |h| h.config_url.clone()),
            device_icon_16: self.device_icon_16,
            device_icon_name: pick(self.device_icon_name, |h| h.device_icon_name.clone()),
            device_class: None,
            device_class_version: None,
        };

        let saves = SaveScheduler::new(store, self.auto_save_delay.unwrap_or(DEFAULT_AUTO_SAVE_DELAY));
        let shared: SharedState = Arc::new_cyclic(|weak| {
            let ctx = HostContext::new(weak.clone(), saves.clone());
            let mut state = HostState {
                ctx: ctx.clone(),
                dsuid,
                mac,
                port,
                common,
                active: true,
                vdcs: Default::default(),
                session: None,
            };
            if let Some(record) = restored_host.as_ref() {
                for vdc_record in record.vdcs.as_deref().unwrap_or_default() {
                    let vdc = Vdc::from_record(&ctx, vdc_record);
                    state.vdcs.insert(*vdc.dsuid(), vdc);
                }
            }
            Mutex::new(state)
        });

        // Construction and restore are done; from here on tracked
        // mutations trigger the debounced save. One initial save
        // captures defaults and derived values.
        saves.set_enabled(true);
        let ctx = HostContext::new(Arc::downgrade(&shared), saves);
        ctx.schedule_save();

        info!("vDC host built (dSUID {dsuid}, port {port})");
        Ok(VdcHost {
            shared,
            ctx,
            runtime: std::sync::Mutex::new(None),
            dsuid,
            port,
            node_name,
        })
    }
}

/// Tree root owned by the host mutex.
pub struct HostState {
    pub(crate) ctx: HostContext,
    dsuid: DsUid,
    mac: String,
    port: u16,
    common: CommonProps,
    active: bool,
    vdcs: std::collections::BTreeMap<DsUid, Vdc>,
    pub(crate) session: Option<SessionHandle>,
}

impl HostState {
    pub fn dsuid(&self) -> &DsUid {
        &self.dsuid
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn name(&self) -> &str {
        &self.common.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.common.name = name.to_string();
        self.ctx.schedule_save();
    }

    /// Context handle for constructing entities that will live in
    /// this tree.
    pub fn context(&self) -> HostContext {
        self.ctx.clone()
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    // ---- vDC registry ------------------------------------------------

    /// Register a vDC; keyed (and replaced) by its dSUID.
    pub fn add_vdc(&mut self, vdc: Vdc) {
        info!("registered vDC '{}' (dSUID {})", vdc.name(), vdc.dsuid());
        self.vdcs.insert(*vdc.dsuid(), vdc);
        self.ctx.schedule_save();
    }

    pub fn remove_vdc(&mut self, dsuid: &DsUid) -> Option<Vdc> {
        let removed = self.vdcs.remove(dsuid);
        if removed.is_some() {
            self.ctx.schedule_save();
        }
        removed
    }

    pub fn vdc(&self, dsuid: &DsUid) -> Option<&Vdc> {
        self.vdcs.get(dsuid)
    }

    pub fn vdc_mut(&mut self, dsuid: &DsUid) -> Option<&mut Vdc> {
        self.vdcs.get_mut(dsuid)
    }

    pub fn vdcs(&self) -> impl Iterator<Item = &Vdc> {
        self.vdcs.values()
    }

    pub fn vdcs_mut(&mut self) -> impl Iterator<Item = &mut Vdc> {
        self.vdcs.values_mut()
    }

    /// Find a vdSD anywhere in the tree by its full dSUID.
    pub fn find_vdsd(&self, dsuid: &DsUid) -> Option<&Vdsd> {
        self.vdcs.values().find_map(|vdc| vdc.find_vdsd(dsuid))
    }

    pub fn find_vdsd_mut(&mut self, dsuid: &DsUid) -> Option<&mut Vdsd> {
        self.vdcs
            .values_mut()
            .find_map(|vdc| vdc.find_vdsd_mut(dsuid))
    }

    // ---- properties --------------------------------------------------

    pub fn get_properties(&self) -> PropTree {
        let mut tree = PropTree::new();
        self.common
            .fill_props(&mut tree, &self.dsuid, ENTITY_TYPE_VDC_HOST, self.active);
        tree.insert("mac".into(), self.mac.clone().into());
        tree.insert("port".into(), PropValue::Int(self.port as i64));
        tree
    }

    /// Resolve a textual dSUID to the addressed entity's properties.
    pub fn entity_properties(&self, dsuid_str: &str) -> Option<PropTree> {
        let dsuid: DsUid = dsuid_str.parse().ok()?;
        if dsuid == self.dsuid {
            return Some(self.get_properties());
        }
        if let Some(vdc) = self.vdcs.get(&dsuid) {
            return Some(vdc.get_properties());
        }
        self.find_vdsd(&dsuid).map(|vdsd| vdsd.get_properties())
    }

    /// Apply a setProperty tree to the addressed entity. Returns
    /// false for unknown dSUIDs; unknown property names are ignored.
    pub fn apply_set_property(&mut self, dsuid_str: &str, incoming: &PropTree) -> bool {
        let Ok(dsuid) = dsuid_str.parse::<DsUid>() else {
            return false;
        };
        if dsuid == self.dsuid {
            if let Some(name) = incoming.get("name").and_then(PropValue::as_str) {
                self.set_name(name);
            }
            return true;
        }
        if let Some(vdc) = self.vdcs.get_mut(&dsuid) {
            vdc.apply_set_property(incoming);
            return true;
        }
        if let Some(vdsd) = self.find_vdsd_mut(&dsuid) {
            vdsd.apply_set_property(incoming);
            return true;
        }
        false
    }

    // ---- scene / channel notifications -------------------------------

    pub(crate) fn handle_call_scene(&mut self, dsuid_str: &str, scene: i32) {
        if let Some(output) = self.output_for(dsuid_str) {
            if let Ok(scene) = u8::try_from(scene) {
                output.call_scene(scene);
            }
        }
    }

    pub(crate) fn handle_save_scene(&mut self, dsuid_str: &str, scene: i32) {
        if let Some(output) = self.output_for(dsuid_str) {
            if let Ok(scene) = u8::try_from(scene) {
                output.save_scene(scene);
            }
        }
    }

    pub(crate) fn handle_undo_scene(&mut self, dsuid_str: &str, scene: i32) {
        if let Some(output) = self.output_for(dsuid_str) {
            if let Ok(scene) = u8::try_from(scene) {
                output.undo_scene(scene);
            }
        }
    }

    pub(crate) fn handle_call_min_scene(&mut self, dsuid_str: &str, scene: i32) {
        if let Some(output) = self.output_for(dsuid_str) {
            if let Ok(scene) = u8::try_from(scene) {
                output.call_min_scene(scene);
            }
        }
    }

    pub(crate) fn handle_set_local_prio(&mut self, dsuid_str: &str) {
        if let Some(output) = self.output_for(dsuid_str) {
            output.set_local_priority(true);
        }
    }

    /// Buffer a vdSM channel write; when the batch should be applied
    /// the pending set is handed back so the dispatcher can run the
    /// device callback without holding the tree lock.
    pub(crate) fn buffer_output_channel(
        &mut self,
        dsuid_str: &str,
        channel: i32,
        value: f64,
        apply_now: bool,
    ) -> Option<PendingApply> {
        let output = self.output_for(dsuid_str)?;
        if !output.buffer_channel_value(channel as i64, value) {
            warn!("setOutputChannelValue: no channel {channel} on {dsuid_str}");
        }
        if apply_now {
            output.take_pending_apply()
        } else {
            None
        }
    }

    pub(crate) fn confirm_output_channels(&mut self, dsuid_str: &str, indices: &[u8]) {
        if let Some(output) = self.output_for(dsuid_str) {
            output.confirm_applied(indices);
        }
    }

    fn output_for(&mut self, dsuid_str: &str) -> Option<&mut crate::output::Output> {
        let dsuid: DsUid = dsuid_str.parse().ok()?;
        self.find_vdsd_mut(&dsuid)?.output_mut()
    }

    // ---- session lifecycle -------------------------------------------

    pub(crate) fn set_session(&mut self, session: SessionHandle) {
        self.session = Some(session);
    }

    /// Session ended: clear the session and reset announcement state
    /// everywhere so the next session re-announces from scratch.
    pub(crate) fn reset_announcements(&mut self) {
        self.session = None;
        for vdc in self.vdcs.values_mut() {
            vdc.reset_announcement();
        }
    }

    // ---- timer routing -----------------------------------------------

    pub(crate) async fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::AlivePush(path) => {
                let Some(vdsd) = self.find_vdsd_mut(&path.vdsd) else {
                    return;
                };
                match path.kind {
                    InputKind::Binary => {
                        if let Some(input) = vdsd.binary_input_mut(path.index) {
                            input.push_state(true).await;
                        }
                    }
                    InputKind::Sensor => {
                        if let Some(input) = vdsd.sensor_input_mut(path.index) {
                            input.push_state(true).await;
                        }
                    }
                    InputKind::Button => {}
                }
            }
            TimerEvent::DeferredPush(path) => {
                let Some(vdsd) = self.find_vdsd_mut(&path.vdsd) else {
                    return;
                };
                match path.kind {
                    InputKind::Binary => {
                        if let Some(input) = vdsd.binary_input_mut(path.index) {
                            input.do_push().await;
                        }
                    }
                    InputKind::Sensor => {
                        if let Some(input) = vdsd.sensor_input_mut(path.index) {
                            input.do_push().await;
                        }
                    }
                    InputKind::Button => {}
                }
            }
            TimerEvent::Click(path, kind) => {
                let Some(vdsd) = self.find_vdsd_mut(&path.vdsd) else {
                    return;
                };
                if let Some(button) = vdsd.button_input_mut(path.index) {
                    button.on_click_timer(kind).await;
                }
            }
        }
    }

    // ---- persistence -------------------------------------------------

    /// Snapshot the persisted subset of the tree.
    pub fn state_file(&self) -> StateFile {
        StateFile {
            vdc_host: HostRecord {
                dsuid: self.dsuid.to_string(),
                mac: Some(self.mac.clone()),
                port: Some(self.port),
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
                vdcs: if self.vdcs.is_empty() {
                    None
                } else {
                    Some(self.vdcs.values().map(|v| v.to_record()).collect())
                },
            },
        }
    }
}

/// Public handle owning the host tree.
///
/// Clone-free by design: the runtime (`start`/`stop`) and integrator
/// code share the tree through [`VdcHost::lock`].
pub struct VdcHost {
    pub(crate) shared: SharedState,
    pub(crate) ctx: HostContext,
    pub(crate) runtime: std::sync::Mutex<Option<crate::runtime::RuntimeHandles>>,
    dsuid: DsUid,
    port: u16,
    node_name: String,
}

impl VdcHost {
    pub fn builder() -> HostBuilder {
        HostBuilder::new()
    }

    pub fn dsuid(&self) -> &DsUid {
        &self.dsuid
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Context handle for constructing entities.
    pub fn context(&self) -> HostContext {
        self.ctx.clone()
    }

    /// Lock the entity tree for reading or mutation.
    pub async fn lock(&self) -> MutexGuard<'_, HostState> {
        self.shared.lock().await
    }

    /// Cancel any pending debounced save and write synchronously.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.ctx.saves.flush(&self.shared).await
    }
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// MAC of the first usable network interface, or a stable random
/// fallback (persisted through the state file afterwards).
fn default_mac() -> String {
    if let Ok(entries) = std::fs::read_dir("/sys/class/net") {
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy() == "lo" {
                continue;
            }
            if let Ok(address) = std::fs::read_to_string(entry.path().join("address")) {
                let address = address.trim().to_uppercase();
                if !address.is_empty() && address != "00:00:00:00:00:00" {
                    return address;
                }
            }
        }
    }
    // Locally administered random MAC.
    let bytes = uuid::Uuid::new_v4();
    let b = bytes.as_bytes();
    format!(
        "02:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        b[0], b[1], b[2], b[3], b[4]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary_input::BinaryInput;
    use crate::enums::{ColorGroup, OutputFunction, scene};
    use crate::output::Output;
    use crate::vdsd::Device;
    use dsvdc_proto::dsuid::namespace;
    use dsvdc_proto::match_query;
    use dsvdc_proto::property::query_name;

    async fn demo_host() -> VdcHost {
        HostBuilder::new()
            .with_mac("AA:BB:CC:DD:EE:FF".to_string())
            .with_name("Test Gateway".to_string())
            .with_node_name("testhost".to_string())
            .build()
            .unwrap()
    }

    async fn add_demo_device(host: &VdcHost) -> DsUid {
        let ctx = host.context();
        let mut state = host.lock().await;
        let mut vdc = Vdc::new(&ctx, "x-demo-light");
        let base = DsUid::from_name_in_space("lamp-1", &namespace::VDC);
        let mut device = Device::new(&ctx, base);
        let mut vdsd = Vdsd::new(&ctx, &base, 0)
            .with_name("Lamp")
            .with_primary_group(ColorGroup::Yellow);
        vdsd.add_binary_input(BinaryInput::new(&ctx, 0)).unwrap();
        vdsd.set_output(Output::new(&ctx, OutputFunction::Dimmer));
        device.add_vdsd(vdsd).unwrap();
        vdc.add_device(device);
        state.add_vdc(vdc);
        base
    }

    #[tokio::test(start_paused = true)]
    async fn host_dsuid_derived_from_mac() {
        let host = demo_host().await;
        let expected = DsUid::from_vdc_mac("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(host.dsuid(), &expected);
        let state = host.lock().await;
        assert_eq!(
            state.get_properties()["hardwareGuid"].as_str(),
            Some("macaddress:AA:BB:CC:DD:EE:FF")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wildcard_query_lists_host_properties() {
        let host = demo_host().await;
        let state = host.lock().await;
        let props = state.entity_properties(&host.dsuid().to_string()).unwrap();
        let matched = match_query(&props, &[query_name("")]);
        let names: Vec<_> = matched.iter().map(|e| e.name.as_str()).collect();
        for expected in ["dSUID", "displayId", "type", "name", "model", "active"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert_eq!(props["type"].as_str(), Some(ENTITY_TYPE_VDC_HOST));
    }

    #[tokio::test(start_paused = true)]
    async fn entity_resolution_walks_the_tree() {
        let host = demo_host().await;
        let base = add_demo_device(&host).await;
        let state = host.lock().await;

        let vdc_dsuid = DsUid::from_name_in_space("x-demo-light", &namespace::VDC);
        assert!(state.entity_properties(&vdc_dsuid.to_string()).is_some());
        let vdsd_props = state
            .entity_properties(&base.with_subdevice(0).to_string())
            .unwrap();
        assert_eq!(vdsd_props["name"].as_str(), Some("Lamp"));
        assert!(state.entity_properties(&"00".repeat(17)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn set_property_updates_writable_fields() {
        let host = demo_host().await;
        let base = add_demo_device(&host).await;
        let mut state = host.lock().await;

        let mut incoming = PropTree::new();
        incoming.insert("name".into(), "Renamed Lamp".into());
        incoming.insert("zoneID".into(), PropValue::Int(11));
        incoming.insert("ignoredKey".into(), PropValue::Int(1));
        assert!(state.apply_set_property(&base.with_subdevice(0).to_string(), &incoming));
        let vdsd = state.find_vdsd(&base.with_subdevice(0)).unwrap();
        assert_eq!(vdsd.name(), "Renamed Lamp");
        assert_eq!(vdsd.zone_id(), 11);

        assert!(!state.apply_set_property(&"11".repeat(17), &incoming));
    }

    #[tokio::test(start_paused = true)]
    async fn scene_notifications_reach_the_output() {
        let host = demo_host().await;
        let base = add_demo_device(&host).await;
        let vdsd_dsuid = base.with_subdevice(0).to_string();
        let mut state = host.lock().await;

        // Drive the channel, save into a free preset, then call it.
        state
            .find_vdsd_mut(&base.with_subdevice(0))
            .unwrap()
            .output_mut()
            .unwrap()
            .update_channel_value(0, 73.0)
            .await;
        state.handle_save_scene(&vdsd_dsuid, scene::PRESET_2 as i32);
        state
            .find_vdsd_mut(&base.with_subdevice(0))
            .unwrap()
            .output_mut()
            .unwrap()
            .update_channel_value(0, 5.0)
            .await;
        state.handle_call_scene(&vdsd_dsuid, scene::PRESET_2 as i32);

        let value = state
            .find_vdsd(&base.with_subdevice(0))
            .unwrap()
            .output()
            .unwrap()
            .channel(0)
            .unwrap()
            .value();
        assert_eq!(value, Some(73.0));
    }

    #[tokio::test(start_paused = true)]
    async fn buffered_channel_writes_apply_once(){
        let host = demo_host().await;
        let base = add_demo_device(&host).await;
        let vdsd_dsuid = base.with_subdevice(0).to_string();
        let mut state = host.lock().await;

        assert!(state
            .buffer_output_channel(&vdsd_dsuid, 1, 40.0, false)
            .is_none());
        let batch = state
            .buffer_output_channel(&vdsd_dsuid, 1, 60.0, true)
            .unwrap();
        assert_eq!(batch.updates.len(), 1);
        assert_eq!(batch.updates[&1], 60.0);
        state.confirm_output_channels(&vdsd_dsuid, &batch.indices);

        let vdsd = state.find_vdsd(&base.with_subdevice(0)).unwrap();
        assert_eq!(vdsd.output().unwrap().channel(0).unwrap().value(), Some(60.0));
        assert!(vdsd.output().unwrap().channel(0).unwrap().age().is_some());
    }
}
