//! Host runtime: TCP listener, session dispatch, announcement flows
//! and the DNS-SD advertiser seam.
//!
//! The listener accepts vdSM connections on the host port and
//! enforces the one-session policy: a new connection gracefully
//! closes the previous session before its hello is processed. The
//! per-session dispatcher answers get/set-property and the scene and
//! channel notifications from the entity tree; everything else is
//! forwarded to an optional user [`MessageHandler`].

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use dsvdc_proto::messages::{MessageType, ResultCode};
use dsvdc_proto::{DsUid, Message, elements_to_tree, match_query};

use crate::context::SharedState;
use crate::error::HostError;
use crate::host::VdcHost;
use crate::session::{
    DEFAULT_REQUEST_TIMEOUT, SessionHandle, SessionHooks, VdcSession,
};
use crate::vdsd::Device;

/// DNS-SD service type of vDC hosts.
pub const VDC_SERVICE_TYPE: &str = "_ds-vdc._tcp.local.";

/// What a DNS-SD backend needs to announce.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    /// Always [`VDC_SERVICE_TYPE`].
    pub service_type: String,
    /// `"<host name> on <node name>"`.
    pub instance_name: String,
    /// `"<node name>.local."`.
    pub server: String,
    pub port: u16,
    /// Single `dSUID=<34 hex>` entry.
    pub txt: Vec<(String, String)>,
}

/// Seam for the DNS-SD library integration.
#[async_trait]
pub trait DnsSdAdvertiser: Send + Sync {
    async fn register(&self, record: &ServiceRecord) -> Result<(), HostError>;
    async fn unregister(&self) -> Result<(), HostError>;
}

/// Stand-in advertiser that only logs; useful in tests and when no
/// mDNS responder is available.
pub struct LogAdvertiser;

#[async_trait]
impl DnsSdAdvertiser for LogAdvertiser {
    async fn register(&self, record: &ServiceRecord) -> Result<(), HostError> {
        info!(
            "would announce {} '{}' on port {} ({:?})",
            record.service_type, record.instance_name, record.port, record.txt
        );
        Ok(())
    }

    async fn unregister(&self) -> Result<(), HostError> {
        info!("would unannounce the vDC host service");
        Ok(())
    }
}

/// User callback for messages the host does not handle itself
/// (identify, control values, dim channel, remove, generic requests).
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(
        &self,
        session: &SessionHandle,
        msg: Message,
    ) -> Result<Option<Message>, HostError>;
}

/// Options for [`VdcHost::start`].
pub struct StartOptions {
    pub bind_address: String,
    pub advertiser: Option<Arc<dyn DnsSdAdvertiser>>,
    pub handler: Option<Arc<dyn MessageHandler>>,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            advertiser: None,
            handler: None,
        }
    }
}

pub(crate) struct RuntimeHandles {
    accept_task: JoinHandle<()>,
    conn_slot: Arc<Mutex<Option<SessionHandle>>>,
    advertiser: Option<Arc<dyn DnsSdAdvertiser>>,
}

/// Per-session dispatcher bridging sessions to the entity tree.
#[derive(Clone)]
struct HostDispatcher {
    shared: SharedState,
    user: Option<Arc<dyn MessageHandler>>,
}

#[async_trait]
impl SessionHooks for HostDispatcher {
    async fn on_message(
        &self,
        session: &SessionHandle,
        msg: Message,
    ) -> Result<Option<Message>, HostError> {
        match msg.kind() {
            Some(MessageType::VdsmRequestGetProperty) => {
                let request = msg.vdsm_request_get_property.clone().unwrap_or_default();
                let state = self.shared.lock().await;
                match state.entity_properties(&request.dsuid) {
                    Some(props) => Ok(Some(Message::get_property_response(
                        msg.message_id,
                        match_query(&props, &request.query),
                    ))),
                    None => Ok(Some(Message::generic_response(
                        msg.message_id,
                        ResultCode::ErrNotFound,
                        &format!("entity {} not found", request.dsuid),
                    ))),
                }
            }
            Some(MessageType::VdsmRequestSetProperty) => {
                let request = msg.vdsm_request_set_property.clone().unwrap_or_default();
                let incoming = elements_to_tree(&request.properties);
                let mut state = self.shared.lock().await;
                if state.apply_set_property(&request.dsuid, &incoming) {
                    Ok(Some(Message::generic_response(
                        msg.message_id,
                        ResultCode::ErrOk,
                        "",
                    )))
                } else {
                    Ok(Some(Message::generic_response(
                        msg.message_id,
                        ResultCode::ErrNotFound,
                        &format!("entity {} not found", request.dsuid),
                    )))
                }
            }
            Some(MessageType::VdsmNotificationCallScene) => {
                if let Some(notification) = &msg.vdsm_notification_call_scene {
                    let mut state = self.shared.lock().await;
                    state.handle_call_scene(&notification.dsuid, notification.scene);
                }
                Ok(None)
            }
            Some(MessageType::VdsmNotificationSaveScene) => {
                if let Some(notification) = &msg.vdsm_notification_save_scene {
                    let mut state = self.shared.lock().await;
                    state.handle_save_scene(&notification.dsuid, notification.scene);
                }
                Ok(None)
            }
            Some(MessageType::VdsmNotificationUndoScene) => {
                if let Some(notification) = &msg.vdsm_notification_undo_scene {
                    let mut state = self.shared.lock().await;
                    state.handle_undo_scene(&notification.dsuid, notification.scene);
                }
                Ok(None)
            }
            Some(MessageType::VdsmNotificationCallMinScene) => {
                if let Some(notification) = &msg.vdsm_notification_call_min_scene {
                    let mut state = self.shared.lock().await;
                    state.handle_call_min_scene(&notification.dsuid, notification.scene);
                }
                Ok(None)
            }
            Some(MessageType::VdsmNotificationSetLocalPrio) => {
                if let Some(notification) = &msg.vdsm_notification_set_local_prio {
                    let mut state = self.shared.lock().await;
                    state.handle_set_local_prio(&notification.dsuid);
                }
                Ok(None)
            }
            Some(MessageType::VdsmNotificationSetOutputChannelValue) => {
                let Some(notification) = msg.vdsm_notification_set_output_channel_value.clone()
                else {
                    return Ok(None);
                };
                // An absent apply_now means "apply now".
                let apply_now = notification.apply_now.unwrap_or(true);
                let batch = {
                    let mut state = self.shared.lock().await;
                    state.buffer_output_channel(
                        &notification.dsuid,
                        notification.channel,
                        notification.value,
                        apply_now,
                    )
                };
                if let Some(batch) = batch {
                    // Run the device callback without holding the tree
                    // lock so it can call back into the host.
                    if let Some(handler) = &batch.handler {
                        if let Err(err) = handler.on_channels_applied(&batch.updates).await {
                            warn!("on_channels_applied failed: {err}; confirming anyway");
                        }
                    }
                    let mut state = self.shared.lock().await;
                    state.confirm_output_channels(&notification.dsuid, &batch.indices);
                }
                Ok(None)
            }
            _ => match &self.user {
                Some(user) => user.handle_message(session, msg).await,
                None => {
                    debug!("no handler for {:?}, ignoring", msg.kind());
                    if msg.message_id > 0 {
                        Ok(Some(Message::generic_response(
                            msg.message_id,
                            ResultCode::ErrNotImplemented,
                            "not implemented",
                        )))
                    } else {
                        Ok(None)
                    }
                }
            },
        }
    }

    async fn on_session_active(&self, session: &SessionHandle) {
        {
            let mut state = self.shared.lock().await;
            state.set_session(session.clone());
        }
        // Announce from a separate task; announcements await
        // correlated responses, which the session read loop delivers.
        let shared = self.shared.clone();
        let session = session.clone();
        tokio::spawn(async move {
            announce_all(&shared, &session).await;
        });
    }

    async fn on_session_closed(&self, _session: &SessionHandle) {
        let mut state = self.shared.lock().await;
        state.reset_announcements();
    }
}

/// Announce every unannounced vDC, then every device below the
/// announced ones. Failures are logged; the affected entity simply
/// stays unannounced.
pub(crate) async fn announce_all(shared: &SharedState, session: &SessionHandle) {
    let vdc_dsuids: Vec<DsUid> = {
        let state = shared.lock().await;
        state
            .vdcs()
            .filter(|vdc| !vdc.is_announced())
            .map(|vdc| *vdc.dsuid())
            .collect()
    };

    for vdc_dsuid in vdc_dsuids {
        let request = Message::announce_vdc(&vdc_dsuid.to_string());
        match session.send_request(request, DEFAULT_REQUEST_TIMEOUT).await {
            Ok(response) if response.result_code() == Some(ResultCode::ErrOk) => {
                info!("vDC {vdc_dsuid} announced");
                let mut state = shared.lock().await;
                if let Some(vdc) = state.vdc_mut(&vdc_dsuid) {
                    vdc.set_announced(true);
                }
            }
            Ok(response) => {
                warn!(
                    "vDC {vdc_dsuid} announcement rejected: {:?}",
                    response.result_code()
                );
            }
            Err(err) => {
                warn!("vDC {vdc_dsuid} announcement failed: {err}");
            }
        }
    }

    let devices: Vec<(DsUid, DsUid)> = {
        let state = shared.lock().await;
        state
            .vdcs()
            .filter(|vdc| vdc.is_announced())
            .flat_map(|vdc| {
                let vdc_dsuid = *vdc.dsuid();
                vdc.devices()
                    .filter(|device| !device.is_announced())
                    .map(move |device| (vdc_dsuid, *device.dsuid()))
            })
            .collect()
    };

    for (vdc_dsuid, device_dsuid) in devices {
        if let Err(err) = announce_device_inner(shared, session, &vdc_dsuid, &device_dsuid).await {
            warn!("device {device_dsuid} announcement failed: {err}");
        }
    }
}

/// Announce every vdSD of one device; the device counts as announced
/// when all of them were accepted.
async fn announce_device_inner(
    shared: &SharedState,
    session: &SessionHandle,
    vdc_dsuid: &DsUid,
    device_dsuid: &DsUid,
) -> Result<usize, HostError> {
    let vdsd_dsuids: Vec<DsUid> = {
        let state = shared.lock().await;
        let device = state
            .vdc(vdc_dsuid)
            .and_then(|vdc| vdc.device(device_dsuid))
            .ok_or_else(|| HostError::UnknownEntity(device_dsuid.to_string()))?;
        device.vdsds().map(|vdsd| *vdsd.dsuid()).collect()
    };
    if vdsd_dsuids.is_empty() {
        return Err(HostError::InvalidState("cannot announce a device with no vdSDs"));
    }

    let mut announced = 0usize;
    for vdsd_dsuid in &vdsd_dsuids {
        let request =
            Message::announce_device(&vdsd_dsuid.to_string(), &vdc_dsuid.to_string());
        match session.send_request(request, DEFAULT_REQUEST_TIMEOUT).await {
            Ok(response) if response.result_code() == Some(ResultCode::ErrOk) => {
                let mut state = shared.lock().await;
                if let Some(vdsd) = state.find_vdsd_mut(vdsd_dsuid) {
                    vdsd.mark_announced(session);
                    announced += 1;
                    info!("vdSD {vdsd_dsuid} announced");
                }
            }
            Ok(response) => warn!(
                "vdSD {vdsd_dsuid} announcement rejected: {:?}",
                response.result_code()
            ),
            Err(err) => warn!("vdSD {vdsd_dsuid} announcement failed: {err}"),
        }
    }

    let mut state = shared.lock().await;
    if let Some(device) = state
        .vdc_mut(vdc_dsuid)
        .and_then(|vdc| vdc.device_mut(device_dsuid))
    {
        device.set_announced(announced == vdsd_dsuids.len());
    }
    Ok(announced)
}

/// Send a vanish notification per announced vdSD of the device and
/// reset its announcement state.
async fn vanish_device_inner(
    shared: &SharedState,
    session: &SessionHandle,
    device_dsuid: &DsUid,
) -> Result<(), HostError> {
    let vdsd_dsuids: Vec<DsUid> = {
        let state = shared.lock().await;
        let device = find_device(&state, device_dsuid)
            .ok_or_else(|| HostError::UnknownEntity(device_dsuid.to_string()))?;
        device
            .vdsds()
            .filter(|vdsd| vdsd.is_announced())
            .map(|vdsd| *vdsd.dsuid())
            .collect()
    };

    for vdsd_dsuid in &vdsd_dsuids {
        if let Err(err) = session
            .send_notification(Message::vanish(&vdsd_dsuid.to_string()))
            .await
        {
            warn!("vanish for {vdsd_dsuid} failed: {err}");
        }
        let mut state = shared.lock().await;
        if let Some(vdsd) = state.find_vdsd_mut(vdsd_dsuid) {
            vdsd.reset_announcement();
        }
    }

    let mut state = shared.lock().await;
    for vdc in state.vdcs_mut() {
        if let Some(device) = vdc.device_mut(device_dsuid) {
            device.reset_announcement();
        }
    }
    info!("device {device_dsuid}: all vdSDs vanished");
    Ok(())
}

fn find_device<'a>(
    state: &'a crate::host::HostState,
    device_dsuid: &DsUid,
) -> Option<&'a Device> {
    state.vdcs().find_map(|vdc| vdc.device(device_dsuid))
}

impl VdcHost {
    /// Start the TCP listener (and DNS-SD announcement when an
    /// advertiser is supplied). Returns the bound address.
    pub async fn start(&self, options: StartOptions) -> Result<SocketAddr, HostError> {
        if self.runtime_slot().lock().expect("runtime lock").is_some() {
            return Err(HostError::InvalidState("host already started"));
        }

        let listener = TcpListener::bind((options.bind_address.as_str(), self.port())).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "TCP server listening on {local_addr} (dSUID {})",
            self.dsuid()
        );

        let dispatcher = Arc::new(HostDispatcher {
            shared: self.shared.clone(),
            user: options.handler,
        });
        let conn_slot: Arc<Mutex<Option<SessionHandle>>> = Arc::new(Mutex::new(None));

        let host_dsuid = self.dsuid().to_string();
        let accept_slot = conn_slot.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("accept failed: {err}");
                        continue;
                    }
                };
                info!("new TCP connection from {peer}");

                // One session at a time: close the previous one before
                // the new session reads its hello.
                if let Some(previous) = accept_slot.lock().await.take() {
                    info!("closing existing session with {:?}", previous.vdsm_dsuid());
                    previous.close().await;
                }

                let (reader, writer) = stream.into_split();
                let session =
                    VdcSession::new(reader, writer, host_dsuid.clone(), peer.to_string());
                *accept_slot.lock().await = Some(session.handle());

                let hooks: Arc<dyn SessionHooks> = dispatcher.clone();
                tokio::spawn(session.run(hooks));
            }
        });

        if let Some(advertiser) = &options.advertiser {
            let record = self.service_record(local_addr.port()).await;
            advertiser.register(&record).await?;
        }

        let runtime = self.runtime_slot();
        *runtime.lock().expect("runtime lock") = Some(RuntimeHandles {
            accept_task,
            conn_slot,
            advertiser: options.advertiser,
        });
        Ok(local_addr)
    }

    /// Stop listening, close the active session, unregister DNS-SD
    /// and flush pending saves.
    pub async fn stop(&self) -> Result<(), HostError> {
        let handles = {
            let runtime = self.runtime_slot();
            let mut guard = runtime.lock().expect("runtime lock");
            guard.take()
        };
        if let Some(handles) = handles {
            handles.accept_task.abort();
            if let Some(session) = handles.conn_slot.lock().await.take() {
                session.close().await;
            }
            if let Some(advertiser) = handles.advertiser {
                advertiser.unregister().await?;
            }
        }
        {
            let mut state = self.shared.lock().await;
            state.reset_announcements();
        }
        self.flush().await.map_err(HostError::Store)?;
        info!("vDC host stopped");
        Ok(())
    }

    async fn service_record(&self, port: u16) -> ServiceRecord {
        let name = {
            let state = self.shared.lock().await;
            state.name().to_string()
        };
        ServiceRecord {
            service_type: VDC_SERVICE_TYPE.to_string(),
            instance_name: format!("{name} on {}", self.node_name()),
            server: format!("{}.local.", self.node_name()),
            port,
            txt: vec![("dSUID".to_string(), self.dsuid().to_string())],
        }
    }

    /// Announce one device (all of its vdSDs) on the active session.
    pub async fn announce_device(&self, device_dsuid: &DsUid) -> Result<usize, HostError> {
        let session = self.active_session().await?;
        let vdc_dsuid = {
            let state = self.shared.lock().await;
            state
                .vdcs()
                .find(|vdc| vdc.device(device_dsuid).is_some())
                .map(|vdc| *vdc.dsuid())
                .ok_or_else(|| HostError::UnknownEntity(device_dsuid.to_string()))?
        };
        announce_device_inner(&self.shared, &session, &vdc_dsuid, device_dsuid).await
    }

    /// Vanish one device: one notification per announced vdSD.
    pub async fn vanish_device(&self, device_dsuid: &DsUid) -> Result<(), HostError> {
        let session = self.active_session().await?;
        vanish_device_inner(&self.shared, &session, device_dsuid).await
    }

    /// Structural update of an announced device: vanish, apply
    /// `modify`, re-announce and persist.
    pub async fn update_device<F>(
        &self,
        device_dsuid: &DsUid,
        modify: F,
    ) -> Result<usize, HostError>
    where
        F: FnOnce(&mut Device),
    {
        let session = self.active_session().await?;
        vanish_device_inner(&self.shared, &session, device_dsuid).await?;

        let vdc_dsuid = {
            let state = self.shared.lock().await;
            state
                .vdcs()
                .find(|vdc| vdc.device(device_dsuid).is_some())
                .map(|vdc| *vdc.dsuid())
                .ok_or_else(|| HostError::UnknownEntity(device_dsuid.to_string()))?
        };
        {
            let mut state = self.shared.lock().await;
            let device = state
                .vdc_mut(&vdc_dsuid)
                .and_then(|vdc| vdc.device_mut(device_dsuid))
                .ok_or_else(|| HostError::UnknownEntity(device_dsuid.to_string()))?;
            modify(device);
        }

        let announced =
            announce_device_inner(&self.shared, &session, &vdc_dsuid, device_dsuid).await?;
        self.ctx.schedule_save();
        Ok(announced)
    }

    async fn active_session(&self) -> Result<SessionHandle, HostError> {
        let state = self.shared.lock().await;
        state
            .session()
            .filter(|session| session.is_active())
            .cloned()
            .ok_or(HostError::InvalidState("no active session"))
    }

    pub(crate) fn runtime_slot(&self) -> &StdMutex<Option<RuntimeHandles>> {
        &self.runtime
    }

    /// Attach a session on an arbitrary byte stream.
    ///
    /// The TCP accept loop uses the same wiring internally; this is
    /// the entry point for custom transports and for driving a host
    /// in tests without a socket.
    pub fn attach_session<R, W>(
        &self,
        reader: R,
        writer: W,
        peer: &str,
        handler: Option<Arc<dyn MessageHandler>>,
    ) -> SessionHandle
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let dispatcher = Arc::new(HostDispatcher {
            shared: self.shared.clone(),
            user: handler,
        });
        let session = VdcSession::new(
            reader,
            writer,
            self.dsuid().to_string(),
            peer.to_string(),
        );
        let handle = session.handle();
        let hooks: Arc<dyn SessionHooks> = dispatcher;
        tokio::spawn(session.run(hooks));
        handle
    }
}
