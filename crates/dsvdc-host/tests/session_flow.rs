//! End-to-end session scenarios over an in-memory transport.

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use dsvdc_host::enums::{ColorGroup, OutputChannelType, OutputFunction, scene};
use dsvdc_host::host::{ENTITY_TYPE_VDC_HOST, VdcHost};
use dsvdc_host::output::ChannelHandler;
use dsvdc_host::session::SessionState;
use dsvdc_host::{BinaryInput, Device, Output, Vdc, Vdsd};
use dsvdc_proto::dsuid::namespace;
use dsvdc_proto::messages::{
    MessageType, ResultCode, VdsmNotificationCallScene, VdsmNotificationSetOutputChannelValue,
};
use dsvdc_proto::{DsUid, Message, PropTree, PropValue, elements_to_tree};

use support::TestVdsm;

fn demo_host() -> VdcHost {
    VdcHost::builder()
        .with_mac("AA:BB:CC:DD:EE:FF".to_string())
        .with_name("Test Gateway".to_string())
        .with_node_name("testhost".to_string())
        .build()
        .expect("host builds")
}

async fn add_dimmer_device(host: &VdcHost, seed: &str) -> DsUid {
    let ctx = host.context();
    let mut state = host.lock().await;
    let mut vdc = Vdc::new(&ctx, "x-test-light");
    let base = DsUid::from_name_in_space(seed, &namespace::VDC);
    let mut device = Device::new(&ctx, base);
    let mut vdsd = Vdsd::new(&ctx, &base, 0)
        .with_name("Lamp")
        .with_primary_group(ColorGroup::Yellow);
    vdsd.add_binary_input(
        BinaryInput::new(&ctx, 0)
            .with_name("contact")
            .with_min_push_interval(2.0),
    )
    .expect("add input");
    vdsd.set_output(Output::new(&ctx, OutputFunction::FullColorDimmer));
    device.add_vdsd(vdsd).expect("add vdsd");
    vdc.add_device(device);
    state.add_vdc(vdc);
    base
}

#[tokio::test(start_paused = true)]
async fn hello_with_api_v1_is_rejected() {
    let host = demo_host();
    let mut vdsm = TestVdsm::connect(&host);

    let response = vdsm.hello(1, 1).await;
    assert_eq!(response.kind(), Some(MessageType::GenericResponse));
    assert_eq!(response.message_id, 1);
    assert_eq!(response.result_code(), Some(ResultCode::ErrIncompatibleApi));

    // Session closes; nothing further arrives.
    tokio::task::yield_now().await;
    assert_eq!(vdsm.session.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn message_before_hello_is_refused() {
    let host = demo_host();
    let mut vdsm = TestVdsm::connect(&host);

    let response = vdsm
        .get_all_properties(&host.dsuid().to_string(), 4)
        .await;
    assert_eq!(
        response.result_code(),
        Some(ResultCode::ErrServiceNotAvailable)
    );
    assert_eq!(response.message_id, 4);
}

#[tokio::test(start_paused = true)]
async fn hello_ping_pong_and_bye() {
    let host = demo_host();
    let host_dsuid = host.dsuid().to_string();
    let mut vdsm = TestVdsm::connect(&host);

    let hello = vdsm.hello(2, 1).await;
    assert_eq!(hello.kind(), Some(MessageType::VdcResponseHello));
    assert_eq!(hello.message_id, 1);
    assert_eq!(
        hello.vdc_response_hello.as_ref().map(|h| h.dsuid.as_str()),
        Some(host_dsuid.as_str())
    );

    vdsm.ping(&host_dsuid).await;
    let pong = vdsm.recv().await;
    assert_eq!(pong.kind(), Some(MessageType::VdcSendPong));
    assert_eq!(pong.message_id, 0);
    assert_eq!(
        pong.vdc_send_pong.as_ref().map(|p| p.dsuid.as_str()),
        Some(host_dsuid.as_str())
    );
    assert_eq!(vdsm.session.ping_count(), 1);

    let bye = vdsm.bye(2).await;
    assert_eq!(bye.result_code(), Some(ResultCode::ErrOk));
    assert_eq!(bye.message_id, 2);
    tokio::task::yield_now().await;
    assert_eq!(vdsm.session.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn wildcard_get_property_lists_host_basics() {
    let host = demo_host();
    let mut vdsm = TestVdsm::connect(&host);
    vdsm.hello(2, 1).await;

    let response = vdsm
        .get_all_properties(&host.dsuid().to_string(), 7)
        .await;
    assert_eq!(response.kind(), Some(MessageType::VdcResponseGetProperty));
    assert_eq!(response.message_id, 7);
    let tree = elements_to_tree(
        &response
            .vdc_response_get_property
            .as_ref()
            .expect("payload")
            .properties,
    );
    for key in ["dSUID", "displayId", "type", "name", "model", "active"] {
        assert!(tree.contains_key(key), "missing {key}");
    }
    assert_eq!(tree["type"].as_str(), Some(ENTITY_TYPE_VDC_HOST));
}

#[tokio::test(start_paused = true)]
async fn get_property_on_unknown_dsuid_is_not_found() {
    let host = demo_host();
    let mut vdsm = TestVdsm::connect(&host);
    vdsm.hello(2, 1).await;

    let response = vdsm.get_all_properties(&"11".repeat(17), 2).await;
    assert_eq!(response.result_code(), Some(ResultCode::ErrNotFound));
}

#[tokio::test(start_paused = true)]
async fn announce_runs_after_hello_and_ids_continue_from_last_known() {
    let host = demo_host();
    let base = add_dimmer_device(&host, "lamp-announce").await;
    let mut vdsm = TestVdsm::connect(&host);

    // Hello with a high id: the host's next request id continues
    // above it.
    vdsm.hello(2, 5).await;
    let announce_vdc = vdsm.accept_announcement().await;
    assert_eq!(announce_vdc.kind(), Some(MessageType::VdcSendAnnounceVdc));
    assert_eq!(announce_vdc.message_id, 6);

    let announce_device = vdsm.accept_announcement().await;
    assert_eq!(
        announce_device.kind(),
        Some(MessageType::VdcSendAnnounceDevice)
    );
    assert_eq!(announce_device.message_id, 7);
    let payload = announce_device.vdc_send_announce_device.expect("payload");
    assert_eq!(payload.dsuid, base.with_subdevice(0).to_string());

    // Let the announce task mark everything announced.
    tokio::task::yield_now().await;
    let state = host.lock().await;
    assert!(state.vdcs().all(|vdc| vdc.is_announced()));
    let vdsd = state.find_vdsd(&base.with_subdevice(0)).expect("vdsd");
    assert!(vdsd.is_announced());
}

#[tokio::test(start_paused = true)]
async fn vanish_sends_one_notification_per_vdsd() {
    let host = demo_host();
    let base = add_dimmer_device(&host, "lamp-vanish").await;
    let mut vdsm = TestVdsm::connect(&host);

    vdsm.hello(2, 1).await;
    vdsm.accept_announcement().await;
    vdsm.accept_announcement().await;
    tokio::task::yield_now().await;

    host.vanish_device(&base).await.expect("vanish");
    let vanish = vdsm.recv().await;
    assert_eq!(vanish.kind(), Some(MessageType::VdcSendVanish));
    assert_eq!(vanish.message_id, 0);
    assert_eq!(
        vanish.vdc_send_vanish.as_ref().map(|v| v.dsuid.as_str()),
        Some(base.with_subdevice(0).to_string().as_str())
    );

    let state = host.lock().await;
    let vdsd = state.find_vdsd(&base.with_subdevice(0)).expect("vdsd");
    assert!(!vdsd.is_announced());
}

#[tokio::test(start_paused = true)]
async fn set_property_renames_vdsd() {
    let host = demo_host();
    let base = add_dimmer_device(&host, "lamp-setprop").await;
    let mut vdsm = TestVdsm::connect(&host);
    vdsm.hello(2, 1).await;
    vdsm.accept_announcement().await;
    vdsm.accept_announcement().await;

    let mut tree = PropTree::new();
    tree.insert("name".into(), "Ceiling Lamp".into());
    tree.insert("zoneID".into(), PropValue::Int(3));
    let response = vdsm
        .set_properties(&base.with_subdevice(0).to_string(), &tree, 9)
        .await;
    assert_eq!(response.result_code(), Some(ResultCode::ErrOk));

    let state = host.lock().await;
    let vdsd = state.find_vdsd(&base.with_subdevice(0)).expect("vdsd");
    assert_eq!(vdsd.name(), "Ceiling Lamp");
    assert_eq!(vdsd.zone_id(), 3);
}

#[tokio::test(start_paused = true)]
async fn binary_input_pushes_are_rate_limited() {
    let host = demo_host();
    let base = add_dimmer_device(&host, "lamp-throttle").await;
    let mut vdsm = TestVdsm::connect(&host);
    vdsm.hello(2, 1).await;
    vdsm.accept_announcement().await;
    vdsm.accept_announcement().await;
    tokio::task::yield_now().await;

    let started = tokio::time::Instant::now();

    // First update pushes immediately.
    {
        let mut state = host.lock().await;
        state
            .find_vdsd_mut(&base.with_subdevice(0))
            .expect("vdsd")
            .binary_input_mut(0)
            .expect("input")
            .update_value(Some(true))
            .await;
    }
    let push = vdsm.recv().await;
    assert_eq!(push.kind(), Some(MessageType::VdcSendPushProperty));
    let tree = elements_to_tree(&push.vdc_send_push_property.as_ref().expect("p").properties);
    let states = tree["binaryInputStates"].as_dict().expect("states");
    let entry = states["0"].as_dict().expect("entry");
    assert_eq!(entry["value"], PropValue::Bool(true));

    // Second update within minPushInterval (2 s) gets deferred.
    tokio::time::advance(Duration::from_millis(500)).await;
    {
        let mut state = host.lock().await;
        state
            .find_vdsd_mut(&base.with_subdevice(0))
            .expect("vdsd")
            .binary_input_mut(0)
            .expect("input")
            .update_value(Some(false))
            .await;
    }

    let deferred = vdsm.recv().await;
    assert_eq!(deferred.kind(), Some(MessageType::VdcSendPushProperty));
    let tree = elements_to_tree(
        &deferred
            .vdc_send_push_property
            .as_ref()
            .expect("p")
            .properties,
    );
    let states = tree["binaryInputStates"].as_dict().expect("states");
    let entry = states["0"].as_dict().expect("entry");
    assert_eq!(entry["value"], PropValue::Bool(false));
    // The deferred push arrived at roughly first-push + interval.
    let elapsed = tokio::time::Instant::now().duration_since(started);
    assert!(elapsed >= Duration::from_millis(1900), "pushed after {elapsed:?}");
}

struct CountingHandler {
    calls: Mutex<Vec<BTreeMap<i64, f64>>>,
}

#[async_trait]
impl ChannelHandler for CountingHandler {
    async fn on_channels_applied(
        &self,
        updates: &BTreeMap<i64, f64>,
    ) -> Result<(), dsvdc_host::HostError> {
        self.calls.lock().await.push(updates.clone());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn buffered_channel_values_apply_once() {
    let host = demo_host();
    let base = add_dimmer_device(&host, "lamp-applynow").await;
    let handler = Arc::new(CountingHandler {
        calls: Mutex::new(Vec::new()),
    });
    {
        let mut state = host.lock().await;
        state
            .find_vdsd_mut(&base.with_subdevice(0))
            .expect("vdsd")
            .output_mut()
            .expect("output")
            .set_channel_handler(handler.clone());
    }

    let mut vdsm = TestVdsm::connect(&host);
    vdsm.hello(2, 1).await;
    vdsm.accept_announcement().await;
    vdsm.accept_announcement().await;
    tokio::task::yield_now().await;

    let vdsd_dsuid = base.with_subdevice(0).to_string();
    let write = |channel: OutputChannelType, value: f64, apply_now: Option<bool>| {
        let mut msg = Message::new(MessageType::VdsmNotificationSetOutputChannelValue);
        msg.vdsm_notification_set_output_channel_value =
            Some(VdsmNotificationSetOutputChannelValue {
                dsuid: vdsd_dsuid.clone(),
                channel: channel as i32,
                value,
                apply_now,
            });
        msg
    };
    let first = write(OutputChannelType::Brightness, 80.0, Some(false));
    let second = write(OutputChannelType::Hue, 120.0, Some(false));
    let third = write(OutputChannelType::Saturation, 55.0, None);
    vdsm.send(first).await;
    vdsm.send(second).await;
    vdsm.send(third).await;

    // Let the notifications drain through the dispatcher.
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    let calls = handler.calls.lock().await;
    assert_eq!(calls.len(), 1, "handler must run exactly once");
    let updates = &calls[0];
    assert_eq!(updates.len(), 3);
    assert_eq!(updates[&(OutputChannelType::Brightness as i64)], 80.0);
    assert_eq!(updates[&(OutputChannelType::Hue as i64)], 120.0);
    assert_eq!(updates[&(OutputChannelType::Saturation as i64)], 55.0);
    drop(calls);

    let state = host.lock().await;
    let output = state
        .find_vdsd(&base.with_subdevice(0))
        .expect("vdsd")
        .output()
        .expect("output");
    assert_eq!(output.channel(0).expect("ch").value(), Some(80.0));
    assert!(output.channel(0).expect("ch").age().is_some());
}

#[tokio::test(start_paused = true)]
async fn call_scene_notification_drives_the_output() {
    let host = demo_host();
    let base = add_dimmer_device(&host, "lamp-scene").await;
    let mut vdsm = TestVdsm::connect(&host);
    vdsm.hello(2, 1).await;
    vdsm.accept_announcement().await;
    vdsm.accept_announcement().await;
    tokio::task::yield_now().await;

    let mut msg = Message::new(MessageType::VdsmNotificationCallScene);
    msg.vdsm_notification_call_scene = Some(VdsmNotificationCallScene {
        dsuid: base.with_subdevice(0).to_string(),
        scene: scene::PRESET_1 as i32,
        force: false,
    });
    vdsm.send(msg).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    let state = host.lock().await;
    let output = state
        .find_vdsd(&base.with_subdevice(0))
        .expect("vdsd")
        .output()
        .expect("output");
    // PRESET_1 default: all channels at max (brightness 100).
    assert_eq!(output.channel(0).expect("ch").value(), Some(100.0));
}
