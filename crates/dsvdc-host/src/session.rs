//! Protocol state machine for one vdSM ↔ vDC host session.
//!
//! Lifecycle: the vdSM opens a TCP connection and sends `hello`; the
//! host validates the API version and answers with its own dSUID.
//! While `ACTIVE` the session answers ping with pong, correlates
//! incoming `GENERIC_RESPONSE` messages to pending outgoing requests,
//! and hands everything else to the installed [`SessionHooks`]. The
//! session ends on bye, connection loss or an explicit [`SessionHandle::close`].
//!
//! Message-id scheme: both sides track the highest id seen; the next
//! outgoing request uses `last_known + 1`, notifications use id 0.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify, oneshot};

use dsvdc_proto::framing::{receive_message, send_message};
use dsvdc_proto::messages::{MessageType, ResultCode};
use dsvdc_proto::{CodecError, Message};

use crate::error::HostError;

/// The API version implemented by this crate.
pub const SUPPORTED_API_VERSION: u32 = 2;

/// Default timeout for correlated outgoing requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the vdSM to send hello.
    AwaitingHello,
    /// Session established and operational.
    Active,
    /// Session terminated.
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("cannot send: session is {0:?}")]
    NotActive(SessionState),
    #[error("request timed out")]
    Timeout,
    #[error("session closed while awaiting response")]
    Closed,
}

/// Callbacks a session invokes for everything it does not handle
/// internally (hello, ping, bye and response correlation are internal).
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Called for each operational message. A returned message is
    /// sent back on the session; an error is answered with
    /// `ERR_MESSAGE_UNKNOWN`.
    async fn on_message(
        &self,
        session: &SessionHandle,
        msg: Message,
    ) -> Result<Option<Message>, HostError>;

    /// Called after a hello handshake completed (also on re-hello).
    async fn on_session_active(&self, _session: &SessionHandle) {}

    /// Called once when the session reaches `Closed`.
    async fn on_session_closed(&self, _session: &SessionHandle) {}
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type BoxedReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

struct SessionShared {
    host_dsuid: String,
    peer: String,
    writer: Mutex<BoxedWriter>,
    state: StdMutex<SessionState>,
    vdsm_dsuid: StdMutex<Option<String>>,
    api_version: StdMutex<Option<u32>>,
    last_known_id: AtomicU32,
    ping_count: AtomicU64,
    pending: StdMutex<HashMap<u32, oneshot::Sender<Message>>>,
    close_notify: Notify,
}

/// Clonable handle for sending on (and closing) a session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock().expect("session state lock")
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// dSUID of the connected vdSM (`None` before hello).
    pub fn vdsm_dsuid(&self) -> Option<String> {
        self.shared.vdsm_dsuid.lock().expect("session lock").clone()
    }

    /// API version negotiated during hello.
    pub fn api_version(&self) -> Option<u32> {
        *self.shared.api_version.lock().expect("session lock")
    }

    /// Highest message id seen (received or sent) so far.
    pub fn last_known_message_id(&self) -> u32 {
        self.shared.last_known_id.load(Ordering::SeqCst)
    }

    /// Number of ping/pong exchanges completed in this session.
    pub fn ping_count(&self) -> u64 {
        self.shared.ping_count.load(Ordering::SeqCst)
    }

    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    fn set_state(&self, state: SessionState) {
        *self.shared.state.lock().expect("session state lock") = state;
    }

    fn track_message_id(&self, id: u32) {
        if id > 0 {
            self.shared.last_known_id.fetch_max(id, Ordering::SeqCst);
        }
    }

    fn next_message_id(&self) -> u32 {
        self.shared.last_known_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn write(&self, msg: &Message) -> Result<(), SessionError> {
        let mut writer = self.shared.writer.lock().await;
        send_message(&mut *writer, msg).await?;
        debug!(
            "sent {:?} (msg_id={}) to {}",
            msg.kind(),
            msg.message_id,
            self.shared.peer
        );
        Ok(())
    }

    /// Send a request and await the correlated response.
    ///
    /// Assigns the next message id, registers a pending slot and waits
    /// for the matching `GENERIC_RESPONSE` (or whatever correlated
    /// message arrives) up to `timeout`.
    pub async fn send_request(
        &self,
        mut msg: Message,
        timeout: Duration,
    ) -> Result<Message, SessionError> {
        let state = self.state();
        if state != SessionState::Active {
            return Err(SessionError::NotActive(state));
        }

        let id = self.next_message_id();
        msg.message_id = id;
        let (tx, rx) = oneshot::channel();
        self.shared
            .pending
            .lock()
            .expect("pending lock")
            .insert(id, tx);

        if let Err(err) = self.write(&msg).await {
            self.shared.pending.lock().expect("pending lock").remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                self.shared.pending.lock().expect("pending lock").remove(&id);
                Err(SessionError::Timeout)
            }
        }
    }

    /// Send a fire-and-forget notification (`message_id = 0`).
    pub async fn send_notification(&self, mut msg: Message) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::Active {
            return Err(SessionError::NotActive(state));
        }
        msg.message_id = 0;
        self.write(&msg).await
    }

    /// Low-level send that neither assigns nor clears the message id;
    /// an explicit id is tracked so the counter stays consistent.
    pub async fn send_message(&self, msg: Message) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::Active {
            return Err(SessionError::NotActive(state));
        }
        self.track_message_id(msg.message_id);
        self.write(&msg).await
    }

    /// Terminate the session: fail all pending requests, mark the
    /// state `Closed` and unblock the read loop.
    pub async fn close(&self) {
        self.set_state(SessionState::Closed);
        self.fail_pending();
        // notify_one stores a permit, so the read loop wakes even when
        // it is not parked in select yet.
        self.shared.close_notify.notify_one();
        let mut writer = self.shared.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    fn fail_pending(&self) {
        // Dropping the senders fails every waiting request.
        self.shared.pending.lock().expect("pending lock").clear();
    }

    fn complete_pending(&self, id: u32, msg: Message) -> Option<Message> {
        let sender = self.shared.pending.lock().expect("pending lock").remove(&id);
        match sender {
            Some(tx) => {
                let _ = tx.send(msg);
                None
            }
            None => Some(msg),
        }
    }
}

/// One vdSM ↔ host session: a read loop plus its [`SessionHandle`].
pub struct VdcSession {
    handle: SessionHandle,
    reader: BoxedReader,
}

impl VdcSession {
    pub fn new<R, W>(reader: R, writer: W, host_dsuid: String, peer: String) -> Self
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(SessionShared {
            host_dsuid,
            peer,
            writer: Mutex::new(Box::new(writer)),
            state: StdMutex::new(SessionState::AwaitingHello),
            vdsm_dsuid: StdMutex::new(None),
            api_version: StdMutex::new(None),
            last_known_id: AtomicU32::new(0),
            ping_count: AtomicU64::new(0),
            pending: StdMutex::new(HashMap::new()),
            close_notify: Notify::new(),
        });
        Self {
            handle: SessionHandle { shared },
            reader: Box::new(reader),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Run the session until it ends (bye, connection loss or close).
    pub async fn run(mut self, hooks: Arc<dyn SessionHooks>) {
        let handle = self.handle.clone();
        info!("session started for {}", handle.peer());

        loop {
            if handle.state() == SessionState::Closed {
                break;
            }
            let received = tokio::select! {
                _ = handle.shared.close_notify.notified() => break,
                received = receive_message(&mut self.reader) => received,
            };
            match received {
                Ok(Some(msg)) => {
                    if self.dispatch(msg, &hooks).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("connection from {} closed (EOF)", handle.peer());
                    break;
                }
                Err(err) => {
                    warn!("connection error from {}: {err}", handle.peer());
                    break;
                }
            }
        }

        handle.set_state(SessionState::Closed);
        handle.fail_pending();
        {
            let mut writer = handle.shared.writer.lock().await;
            let _ = writer.shutdown().await;
        }
        hooks.on_session_closed(&handle).await;
        info!(
            "session ended for {} (vdSM {})",
            handle.peer(),
            handle.vdsm_dsuid().unwrap_or_else(|| "<unknown>".into())
        );
    }

    /// Route one incoming message. Returns `Err` when the connection
    /// is no longer usable.
    async fn dispatch(
        &self,
        msg: Message,
        hooks: &Arc<dyn SessionHooks>,
    ) -> Result<(), SessionError> {
        let handle = &self.handle;
        handle.track_message_id(msg.message_id);
        let kind = msg.kind();
        debug!(
            "received {kind:?} (msg_id={}) from {}",
            msg.message_id,
            handle.peer()
        );

        // Correlate responses to pending outgoing requests first.
        let msg = if kind == Some(MessageType::GenericResponse) && msg.message_id > 0 {
            match handle.complete_pending(msg.message_id, msg) {
                Some(unmatched) => unmatched,
                None => return Ok(()),
            }
        } else {
            msg
        };

        // Hello is allowed in any state except Closed.
        if kind == Some(MessageType::VdsmRequestHello) {
            return self.handle_hello(msg, hooks).await;
        }

        if handle.state() == SessionState::AwaitingHello {
            warn!("received {kind:?} before hello");
            return handle
                .write(&Message::generic_response(
                    msg.message_id,
                    ResultCode::ErrServiceNotAvailable,
                    "session not initialised, send hello first",
                ))
                .await;
        }

        match kind {
            Some(MessageType::VdsmSendPing) => self.handle_ping(msg).await,
            Some(MessageType::VdsmSendBye) => self.handle_bye(msg).await,
            _ => {
                let message_id = msg.message_id;
                match hooks.on_message(handle, msg).await {
                    Ok(Some(response)) => handle.write(&response).await,
                    Ok(None) => Ok(()),
                    Err(err) => {
                        warn!("message handler failed for {kind:?}: {err}");
                        handle
                            .write(&Message::generic_response(
                                message_id,
                                ResultCode::ErrMessageUnknown,
                                "internal error processing message",
                            ))
                            .await
                    }
                }
            }
        }
    }

    async fn handle_hello(
        &self,
        msg: Message,
        hooks: &Arc<dyn SessionHooks>,
    ) -> Result<(), SessionError> {
        let handle = &self.handle;
        let hello = msg.vdsm_request_hello.clone().unwrap_or_default();
        info!(
            "hello from vdSM {} (API v{}) via {}",
            hello.dsuid,
            hello.api_version,
            handle.peer()
        );

        if hello.api_version < SUPPORTED_API_VERSION {
            warn!(
                "incompatible API version {} (need >= {SUPPORTED_API_VERSION})",
                hello.api_version
            );
            let result = handle
                .write(&Message::generic_response(
                    msg.message_id,
                    ResultCode::ErrIncompatibleApi,
                    &format!(
                        "incompatible API version {} (need >= {SUPPORTED_API_VERSION})",
                        hello.api_version
                    ),
                ))
                .await;
            handle.set_state(SessionState::Closed);
            return result.and(Err(SessionError::NotActive(SessionState::Closed)));
        }

        if handle.state() == SessionState::Active {
            info!("re-hello, resetting session");
        }
        *handle.shared.vdsm_dsuid.lock().expect("session lock") = Some(hello.dsuid.clone());
        *handle.shared.api_version.lock().expect("session lock") = Some(hello.api_version);
        handle.set_state(SessionState::Active);

        handle
            .write(&Message::hello_response(
                msg.message_id,
                &handle.shared.host_dsuid,
            ))
            .await?;
        info!("session established with vdSM {}", hello.dsuid);

        hooks.on_session_active(handle).await;
        Ok(())
    }

    async fn handle_ping(&self, msg: Message) -> Result<(), SessionError> {
        let handle = &self.handle;
        let target = msg
            .vdsm_send_ping
            .as_ref()
            .map(|p| p.dsuid.clone())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| handle.shared.host_dsuid.clone());
        let count = handle.shared.ping_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("ping #{count} for {target}, sending pong");
        handle.write(&Message::pong(&target)).await
    }

    async fn handle_bye(&self, msg: Message) -> Result<(), SessionError> {
        let handle = &self.handle;
        info!("bye from vdSM {:?}", handle.vdsm_dsuid());
        let result = handle
            .write(&Message::generic_response(
                msg.message_id,
                ResultCode::ErrOk,
                "",
            ))
            .await;
        handle.set_state(SessionState::Closed);
        result.and(Err(SessionError::NotActive(SessionState::Closed)))
    }
}
