//! Save / restore scenarios across host rebuilds.

use std::fs;
use std::path::PathBuf;

use dsvdc_host::enums::{ColorGroup, OutputFunction, scene};
use dsvdc_host::host::VdcHost;
use dsvdc_host::{Device, Output, Vdc, Vdsd};
use dsvdc_proto::DsUid;
use dsvdc_proto::dsuid::namespace;

fn host_on(path: &PathBuf) -> VdcHost {
    VdcHost::builder()
        .with_mac("AA:BB:CC:DD:EE:FF".to_string())
        .with_name("Persistent Gateway".to_string())
        .with_node_name("testhost".to_string())
        .with_state_path(path.clone())
        .build()
        .expect("host builds")
}

async fn populate(host: &VdcHost) -> DsUid {
    let ctx = host.context();
    let mut state = host.lock().await;
    let mut vdc = Vdc::new(&ctx, "x-persist-light").with_name("Light vDC");
    let base = DsUid::from_name_in_space("persist-lamp", &namespace::VDC);
    let mut device = Device::new(&ctx, base);
    let mut vdsd = Vdsd::new(&ctx, &base, 0)
        .with_name("Color Lamp")
        .with_primary_group(ColorGroup::Yellow)
        .with_model_feature("blink");
    vdsd.set_output(
        Output::new(&ctx, OutputFunction::FullColorDimmer)
            .with_name("bulb")
            .with_push_changes(true),
    );
    device.add_vdsd(vdsd).expect("add vdsd");
    vdc.add_device(device);
    state.add_vdc(vdc);
    base
}

#[tokio::test(start_paused = true)]
async fn full_color_scene_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.yaml");

    let base = {
        let host = host_on(&path);
        let base = populate(&host).await;
        {
            let mut state = host.lock().await;
            let output = state
                .find_vdsd_mut(&base.with_subdevice(0))
                .expect("vdsd")
                .output_mut()
                .expect("output");
            output.update_channel_value(0, 85.0).await;
            output.save_scene(scene::PRESET_1);
        }
        host.flush().await.expect("flush");
        base
    };

    // A fresh host on the same state path restores the whole tree.
    let restored = host_on(&path);
    let state = restored.lock().await;
    let vdsd = state.find_vdsd(&base.with_subdevice(0)).expect("vdsd restored");
    assert_eq!(vdsd.name(), "Color Lamp");
    assert!(vdsd.model_features().contains("blink"));

    let output = vdsd.output().expect("output restored");
    assert_eq!(output.name(), "bulb");
    assert!(output.push_changes());
    assert_eq!(output.channels().count(), 6);

    let entry = output.scene_table().get(scene::PRESET_1).expect("scene");
    assert!(!entry.dont_care);
    assert_eq!(entry.channels[&0].value, 85.0);
    assert!(!entry.channels[&0].dont_care);

    // Volatile state starts fresh.
    let brightness = output.channel(0).expect("channel");
    assert_eq!(brightness.value(), None);
    assert!(brightness.age().is_none());
}

#[tokio::test(start_paused = true)]
async fn settings_and_identity_survive_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.yaml");

    let (dsuid, vdc_dsuid) = {
        let host = host_on(&path);
        populate(&host).await;
        let vdc_dsuid = {
            let mut state = host.lock().await;
            let vdc_dsuid = *state.vdcs().next().expect("vdc").dsuid();
            state.vdc_mut(&vdc_dsuid).expect("vdc").set_zone_id(42);
            vdc_dsuid
        };
        host.flush().await.expect("flush");
        (*host.dsuid(), vdc_dsuid)
    };

    let restored = host_on(&path);
    // Identity is stable across restarts.
    assert_eq!(restored.dsuid(), &dsuid);
    let state = restored.lock().await;
    assert_eq!(state.name(), "Persistent Gateway");
    assert_eq!(state.vdc(&vdc_dsuid).expect("vdc").zone_id(), 42);
    assert_eq!(state.vdc(&vdc_dsuid).expect("vdc").name(), "Light vDC");
}

#[tokio::test(start_paused = true)]
async fn corrupt_primary_recovers_from_backup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.yaml");

    {
        let host = host_on(&path);
        populate(&host).await;
        host.flush().await.expect("first flush");
        // Second flush creates the .bak copy of the first state.
        host.lock().await.set_name("Renamed Gateway");
        host.flush().await.expect("second flush");
    }

    fs::write(&path, "{{{ definitely not yaml").expect("corrupt");

    let restored = host_on(&path);
    let state = restored.lock().await;
    // Backup carried the pre-rename state.
    assert_eq!(state.name(), "Persistent Gateway");
    assert!(state.vdcs().count() == 1);
}
