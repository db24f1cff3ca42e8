//! In-memory vdSM counterpart used to drive a host in tests.

use tokio::io::{DuplexStream, ReadHalf, WriteHalf, duplex, split};

use dsvdc_host::host::VdcHost;
use dsvdc_host::session::SessionHandle;
use dsvdc_proto::messages::{
    MessageType, ResultCode, VdsmRequestGetProperty, VdsmRequestHello, VdsmRequestSetProperty,
    VdsmSendBye, VdsmSendPing,
};
use dsvdc_proto::property::query_name;
use dsvdc_proto::{Message, PropTree, receive_message, send_message, tree_to_elements};

pub const VDSM_DSUID: &str = "AABBCCDDEEFF00112233445566778899AA";

pub struct TestVdsm {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
    pub session: SessionHandle,
}

impl TestVdsm {
    /// Wire a fresh in-memory connection into the host.
    pub fn connect(host: &VdcHost) -> Self {
        let (client, server) = duplex(16 * 1024);
        let (server_reader, server_writer) = split(server);
        let session = host.attach_session(server_reader, server_writer, "test-vdsm", None);
        let (reader, writer) = split(client);
        Self {
            reader,
            writer,
            session,
        }
    }

    pub async fn send(&mut self, msg: Message) {
        send_message(&mut self.writer, &msg).await.expect("send");
    }

    pub async fn recv(&mut self) -> Message {
        receive_message(&mut self.reader)
            .await
            .expect("receive")
            .expect("unexpected EOF")
    }

    /// Returns `None` on clean EOF.
    #[allow(dead_code)]
    pub async fn try_recv(&mut self) -> Option<Message> {
        receive_message(&mut self.reader).await.ok().flatten()
    }

    /// Perform the hello handshake and return the response.
    pub async fn hello(&mut self, api_version: u32, message_id: u32) -> Message {
        let mut msg = Message::new(MessageType::VdsmRequestHello);
        msg.message_id = message_id;
        msg.vdsm_request_hello = Some(VdsmRequestHello {
            dsuid: VDSM_DSUID.to_string(),
            api_version,
        });
        self.send(msg).await;
        self.recv().await
    }

    pub async fn ping(&mut self, dsuid: &str) {
        let mut msg = Message::new(MessageType::VdsmSendPing);
        msg.vdsm_send_ping = Some(VdsmSendPing {
            dsuid: dsuid.to_string(),
        });
        self.send(msg).await;
    }

    pub async fn bye(&mut self, message_id: u32) -> Message {
        let mut msg = Message::new(MessageType::VdsmSendBye);
        msg.message_id = message_id;
        msg.vdsm_send_bye = Some(VdsmSendBye {
            dsuid: VDSM_DSUID.to_string(),
        });
        self.send(msg).await;
        self.recv().await
    }

    /// Wildcard getProperty on `dsuid`.
    pub async fn get_all_properties(&mut self, dsuid: &str, message_id: u32) -> Message {
        let mut msg = Message::new(MessageType::VdsmRequestGetProperty);
        msg.message_id = message_id;
        msg.vdsm_request_get_property = Some(VdsmRequestGetProperty {
            dsuid: dsuid.to_string(),
            query: vec![query_name("")],
        });
        self.send(msg).await;
        self.recv().await
    }

    pub async fn set_properties(&mut self, dsuid: &str, tree: &PropTree, message_id: u32) -> Message {
        let mut msg = Message::new(MessageType::VdsmRequestSetProperty);
        msg.message_id = message_id;
        msg.vdsm_request_set_property = Some(VdsmRequestSetProperty {
            dsuid: dsuid.to_string(),
            properties: tree_to_elements(tree),
        });
        self.send(msg).await;
        self.recv().await
    }

    /// Accept the next incoming announce request with `ERR_OK` and
    /// return it.
    pub async fn accept_announcement(&mut self) -> Message {
        let request = self.recv().await;
        assert!(
            matches!(
                request.kind(),
                Some(MessageType::VdcSendAnnounceVdc) | Some(MessageType::VdcSendAnnounceDevice)
            ),
            "expected an announcement, got {:?}",
            request.kind()
        );
        self.send(Message::generic_response(
            request.message_id,
            ResultCode::ErrOk,
            "",
        ))
        .await;
        request
    }
}
