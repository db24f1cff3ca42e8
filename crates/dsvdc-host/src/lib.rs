//! Core of a digitalSTROM vDC (virtual Device Connector) host.
//!
//! A [`VdcHost`](host::VdcHost) exposes virtualised smart-home
//! devices to a digitalSTROM server through its vdSM: it speaks the
//! length-prefixed protobuf vDC API over TCP (one session at a time),
//! advertises itself via a pluggable DNS-SD seam, maintains the
//! persistent entity tree (host → vDC → Device → vdSD → inputs /
//! output / channels) and drives push throttling, alive heartbeats,
//! click detection and the per-output scene tables.
//!
//! ```no_run
//! use dsvdc_host::host::VdcHost;
//! use dsvdc_host::runtime::StartOptions;
//! use dsvdc_host::vdc::Vdc;
//!
//! # async fn demo() -> Result<(), dsvdc_host::error::HostError> {
//! let host = VdcHost::builder()
//!     .with_name("Demo Gateway".to_string())
//!     .with_state_path("/var/lib/dsvdc/state.yaml".into())
//!     .build()?;
//! {
//!     let ctx = host.context();
//!     let mut state = host.lock().await;
//!     state.add_vdc(Vdc::new(&ctx, "x-demo-light"));
//! }
//! host.start(StartOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod binary_input;
pub mod button_input;
pub mod channel;
pub mod common;
pub mod context;
pub mod enums;
pub mod error;
pub mod host;
pub mod output;
pub mod persist;
pub mod push;
pub mod runtime;
pub mod scenes;
pub mod sensor_input;
pub mod session;
pub mod store;
pub mod vdc;
pub mod vdsd;

mod macros;

pub use binary_input::BinaryInput;
pub use button_input::{ButtonInput, ClickDetectorConfig, button_group};
pub use channel::OutputChannel;
pub use error::HostError;
pub use host::{HostBuilder, VdcHost};
pub use output::{ChannelHandler, Output};
pub use runtime::{DnsSdAdvertiser, MessageHandler, ServiceRecord, StartOptions};
pub use sensor_input::SensorInput;
pub use session::{SessionHandle, SessionState, VdcSession};
pub use store::PropertyStore;
pub use vdc::{Vdc, VdcCapabilities};
pub use vdsd::{Device, Vdsd};
