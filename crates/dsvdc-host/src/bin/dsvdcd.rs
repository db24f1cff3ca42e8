//! Minimal vDC host daemon.
//!
//! Starts a host with one demo vDC so a dSS/vdSM can discover and
//! integrate it; real integrations build their own device tree on
//! top of the library.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

use dsvdc_host::enums::{ColorGroup, OutputFunction};
use dsvdc_host::host::VdcHost;
use dsvdc_host::runtime::{LogAdvertiser, StartOptions};
use dsvdc_host::{Device, Output, Vdc, Vdsd};
use dsvdc_proto::DsUid;
use dsvdc_proto::dsuid::namespace;

#[derive(Parser, Debug)]
#[command(name = "dsvdcd", about = "digitalSTROM vDC host daemon")]
struct Args {
    /// TCP port for the vDC API socket.
    #[arg(long, default_value_t = 8444)]
    port: u16,

    /// Address to bind the listener to.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Path of the YAML state file (omit to disable persistence).
    #[arg(long)]
    state: Option<PathBuf>,

    /// User-facing host name.
    #[arg(long)]
    name: Option<String>,

    /// Add a demo dimmer device for integration testing.
    #[arg(long)]
    demo_device: bool,
}

#[tokio::main]
async fn main() -> Result<(), dsvdc_host::HostError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut builder = VdcHost::builder().with_port(args.port);
    if let Some(state) = args.state {
        builder = builder.with_state_path(state);
    }
    if let Some(name) = args.name {
        builder = builder.with_name(name);
    }
    let host = builder.build()?;

    {
        let ctx = host.context();
        let mut state = host.lock().await;
        let mut vdc = Vdc::new(&ctx, "x-dsvdc-demo").with_name("dsvdc demo vDC");
        if args.demo_device {
            let base = DsUid::from_name_in_space("dsvdcd-demo-dimmer", &namespace::VDC);
            let mut device = Device::new(&ctx, base);
            let mut vdsd = Vdsd::new(&ctx, &base, 0)
                .with_name("Demo Dimmer")
                .with_primary_group(ColorGroup::Yellow);
            vdsd.set_output(Output::new(&ctx, OutputFunction::Dimmer).with_name("demo"));
            device.add_vdsd(vdsd)?;
            vdc.add_device(device);
        }
        state.add_vdc(vdc);
    }

    let addr = host
        .start(StartOptions {
            bind_address: args.bind,
            advertiser: Some(Arc::new(LogAdvertiser)),
            handler: None,
        })
        .await?;
    info!("dsvdcd ready on {addr}");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    host.stop().await?;
    Ok(())
}
