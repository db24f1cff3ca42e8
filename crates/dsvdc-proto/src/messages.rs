//! vDC API protobuf messages.
//!
//! The wire schema is defined here with hand-written prost structs
//! instead of a generated module; field tags and enum values are part
//! of the protocol contract and must not change, as deployed vdSMs
//! depend on them bit-exactly.
//!
//! Every frame carries one [`Message`]: a `type` discriminator, a
//! `message_id` (0 for notifications) and at most one populated
//! per-type submessage.

/// Message kind discriminator (`Type` enum on the wire).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    GenericResponse = 1,
    VdsmRequestHello = 2,
    VdcResponseHello = 3,
    VdsmRequestGetProperty = 4,
    VdcResponseGetProperty = 5,
    VdsmRequestSetProperty = 6,
    // 7 is reserved: setProperty is answered with GENERIC_RESPONSE.
    VdsmSendPing = 8,
    VdcSendPong = 9,
    VdcSendAnnounceDevice = 10,
    VdcSendVanish = 11,
    VdcSendPushProperty = 12,
    VdsmSendRemove = 13,
    VdsmSendBye = 14,
    VdsmNotificationCallScene = 15,
    VdsmNotificationSaveScene = 16,
    VdsmNotificationUndoScene = 17,
    VdsmNotificationSetLocalPrio = 18,
    VdsmNotificationCallMinScene = 19,
    VdsmNotificationIdentify = 20,
    VdsmNotificationSetControlValue = 21,
    VdcSendIdentify = 22,
    VdcSendAnnounceVdc = 23,
    VdsmNotificationDimChannel = 24,
    VdsmNotificationSetOutputChannelValue = 25,
    VdsmRequestGenericRequest = 26,
}

/// Result codes carried in [`GenericResponse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, prost::Enumeration)]
#[repr(i32)]
pub enum ResultCode {
    ErrOk = 0,
    ErrMessageUnknown = 1,
    ErrIncompatibleApi = 2,
    ErrServiceNotAvailable = 3,
    ErrInsufficientStorage = 4,
    ErrForbidden = 5,
    ErrNotImplemented = 6,
    ErrNoContentForArray = 7,
    ErrInvalidValueType = 8,
    ErrMissingSubmessage = 9,
    ErrMissingData = 10,
    ErrNotFound = 11,
    ErrNotAuthorized = 12,
}

/// Error category reported alongside a result code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, prost::Enumeration)]
#[repr(i32)]
pub enum ErrorType {
    Failed = 0,
    Overloaded = 1,
    Disconnected = 2,
    Unimplemented = 3,
}

/// One scalar property value. At most one field is set; a value with
/// no field set is an explicit NULL.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PropertyValue {
    #[prost(bool, optional, tag = "1")]
    pub v_bool: Option<bool>,
    #[prost(uint64, optional, tag = "2")]
    pub v_uint64: Option<u64>,
    #[prost(int64, optional, tag = "3")]
    pub v_int64: Option<i64>,
    #[prost(double, optional, tag = "4")]
    pub v_double: Option<f64>,
    #[prost(string, optional, tag = "5")]
    pub v_string: Option<String>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub v_bytes: Option<Vec<u8>>,
}

/// One node of a property tree. For a nested dictionary the `value`
/// field is unset and `elements` carries the sub-elements.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PropertyElement {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<PropertyValue>,
    #[prost(message, repeated, tag = "3")]
    pub elements: Vec<PropertyElement>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GenericResponse {
    #[prost(enumeration = "ResultCode", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub description: String,
    #[prost(enumeration = "ErrorType", optional, tag = "3")]
    pub error_type: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmRequestHello {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(uint32, tag = "2")]
    pub api_version: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdcResponseHello {
    #[prost(string, tag = "1")]
    pub dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmRequestGetProperty {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(message, repeated, tag = "2")]
    pub query: Vec<PropertyElement>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdcResponseGetProperty {
    #[prost(message, repeated, tag = "1")]
    pub properties: Vec<PropertyElement>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmRequestSetProperty {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(message, repeated, tag = "2")]
    pub properties: Vec<PropertyElement>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmSendPing {
    #[prost(string, tag = "1")]
    pub dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdcSendPong {
    #[prost(string, tag = "1")]
    pub dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdcSendAnnounceDevice {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(string, tag = "2")]
    pub vdc_dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdcSendAnnounceVdc {
    #[prost(string, tag = "1")]
    pub dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdcSendVanish {
    #[prost(string, tag = "1")]
    pub dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdcSendPushProperty {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(message, repeated, tag = "2")]
    pub properties: Vec<PropertyElement>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdcSendIdentify {
    #[prost(string, tag = "1")]
    pub dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmSendRemove {
    #[prost(string, tag = "1")]
    pub dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmSendBye {
    #[prost(string, tag = "1")]
    pub dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmNotificationCallScene {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(int32, tag = "2")]
    pub scene: i32,
    #[prost(bool, tag = "3")]
    pub force: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmNotificationSaveScene {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(int32, tag = "2")]
    pub scene: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmNotificationUndoScene {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(int32, tag = "2")]
    pub scene: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmNotificationSetLocalPrio {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(int32, tag = "2")]
    pub scene: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmNotificationCallMinScene {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(int32, tag = "2")]
    pub scene: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmNotificationIdentify {
    #[prost(string, tag = "1")]
    pub dsuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmNotificationSetControlValue {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(double, tag = "3")]
    pub value: f64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmNotificationDimChannel {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(int32, tag = "2")]
    pub channel: i32,
    /// -1 = dim down, 0 = stop, 1 = dim up.
    #[prost(int32, tag = "3")]
    pub mode: i32,
    #[prost(int32, tag = "4")]
    pub area: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmNotificationSetOutputChannelValue {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    /// Output channel type id (standard ids 0-191, device-specific
    /// 192-239).
    #[prost(int32, tag = "2")]
    pub channel: i32,
    #[prost(double, tag = "3")]
    pub value: f64,
    /// Absent means "apply now".
    #[prost(bool, optional, tag = "4")]
    pub apply_now: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VdsmRequestGenericRequest {
    #[prost(string, tag = "1")]
    pub dsuid: String,
    #[prost(string, tag = "2")]
    pub method_name: String,
    #[prost(message, repeated, tag = "3")]
    pub params: Vec<PropertyElement>,
}

/// Top-level envelope for every frame on the wire.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Message {
    #[prost(enumeration = "MessageType", tag = "1")]
    pub message_type: i32,
    /// 0 for notifications; > 0 for correlated requests/responses.
    #[prost(uint32, tag = "2")]
    pub message_id: u32,
    #[prost(message, optional, tag = "3")]
    pub generic_response: Option<GenericResponse>,
    #[prost(message, optional, tag = "100")]
    pub vdsm_request_hello: Option<VdsmRequestHello>,
    #[prost(message, optional, tag = "101")]
    pub vdc_response_hello: Option<VdcResponseHello>,
    #[prost(message, optional, tag = "102")]
    pub vdsm_request_get_property: Option<VdsmRequestGetProperty>,
    #[prost(message, optional, tag = "103")]
    pub vdc_response_get_property: Option<VdcResponseGetProperty>,
    #[prost(message, optional, tag = "104")]
    pub vdsm_request_set_property: Option<VdsmRequestSetProperty>,
    #[prost(message, optional, tag = "105")]
    pub vdsm_send_ping: Option<VdsmSendPing>,
    #[prost(message, optional, tag = "106")]
    pub vdc_send_pong: Option<VdcSendPong>,
    #[prost(message, optional, tag = "107")]
    pub vdc_send_announce_device: Option<VdcSendAnnounceDevice>,
    #[prost(message, optional, tag = "108")]
    pub vdc_send_vanish: Option<VdcSendVanish>,
    #[prost(message, optional, tag = "109")]
    pub vdc_send_push_property: Option<VdcSendPushProperty>,
    #[prost(message, optional, tag = "110")]
    pub vdsm_send_remove: Option<VdsmSendRemove>,
    #[prost(message, optional, tag = "111")]
    pub vdsm_send_bye: Option<VdsmSendBye>,
    #[prost(message, optional, tag = "112")]
    pub vdsm_notification_call_scene: Option<VdsmNotificationCallScene>,
    #[prost(message, optional, tag = "113")]
    pub vdsm_notification_save_scene: Option<VdsmNotificationSaveScene>,
    #[prost(message, optional, tag = "114")]
    pub vdsm_notification_undo_scene: Option<VdsmNotificationUndoScene>,
    #[prost(message, optional, tag = "115")]
    pub vdsm_notification_set_local_prio: Option<VdsmNotificationSetLocalPrio>,
    #[prost(message, optional, tag = "116")]
    pub vdsm_notification_call_min_scene: Option<VdsmNotificationCallMinScene>,
    #[prost(message, optional, tag = "117")]
    pub vdsm_notification_identify: Option<VdsmNotificationIdentify>,
    #[prost(message, optional, tag = "118")]
    pub vdsm_notification_set_control_value: Option<VdsmNotificationSetControlValue>,
    #[prost(message, optional, tag = "119")]
    pub vdc_send_identify: Option<VdcSendIdentify>,
    #[prost(message, optional, tag = "120")]
    pub vdc_send_announce_vdc: Option<VdcSendAnnounceVdc>,
    #[prost(message, optional, tag = "121")]
    pub vdsm_notification_dim_channel: Option<VdsmNotificationDimChannel>,
    #[prost(message, optional, tag = "122")]
    pub vdsm_notification_set_output_channel_value: Option<VdsmNotificationSetOutputChannelValue>,
    #[prost(message, optional, tag = "123")]
    pub vdsm_request_generic_request: Option<VdsmRequestGenericRequest>,
}

impl Message {
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type: message_type as i32,
            ..Default::default()
        }
    }

    /// The decoded message kind, or `None` for unknown discriminators.
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::try_from(self.message_type).ok()
    }

    pub fn generic_response(message_id: u32, code: ResultCode, description: &str) -> Self {
        let mut msg = Self::new(MessageType::GenericResponse);
        msg.message_id = message_id;
        msg.generic_response = Some(GenericResponse {
            code: code as i32,
            description: description.to_string(),
            error_type: None,
        });
        msg
    }

    pub fn hello_response(message_id: u32, host_dsuid: &str) -> Self {
        let mut msg = Self::new(MessageType::VdcResponseHello);
        msg.message_id = message_id;
        msg.vdc_response_hello = Some(VdcResponseHello {
            dsuid: host_dsuid.to_string(),
        });
        msg
    }

    pub fn pong(dsuid: &str) -> Self {
        let mut msg = Self::new(MessageType::VdcSendPong);
        msg.vdc_send_pong = Some(VdcSendPong {
            dsuid: dsuid.to_string(),
        });
        msg
    }

    pub fn announce_vdc(dsuid: &str) -> Self {
        let mut msg = Self::new(MessageType::VdcSendAnnounceVdc);
        msg.vdc_send_announce_vdc = Some(VdcSendAnnounceVdc {
            dsuid: dsuid.to_string(),
        });
        msg
    }

    pub fn announce_device(dsuid: &str, vdc_dsuid: &str) -> Self {
        let mut msg = Self::new(MessageType::VdcSendAnnounceDevice);
        msg.vdc_send_announce_device = Some(VdcSendAnnounceDevice {
            dsuid: dsuid.to_string(),
            vdc_dsuid: vdc_dsuid.to_string(),
        });
        msg
    }

    pub fn vanish(dsuid: &str) -> Self {
        let mut msg = Self::new(MessageType::VdcSendVanish);
        msg.vdc_send_vanish = Some(VdcSendVanish {
            dsuid: dsuid.to_string(),
        });
        msg
    }

    pub fn push_property(dsuid: &str, properties: Vec<PropertyElement>) -> Self {
        let mut msg = Self::new(MessageType::VdcSendPushProperty);
        msg.vdc_send_push_property = Some(VdcSendPushProperty {
            dsuid: dsuid.to_string(),
            properties,
        });
        msg
    }

    pub fn get_property_response(message_id: u32, properties: Vec<PropertyElement>) -> Self {
        let mut msg = Self::new(MessageType::VdcResponseGetProperty);
        msg.message_id = message_id;
        msg.vdc_response_get_property = Some(VdcResponseGetProperty { properties });
        msg
    }

    /// The result code of a generic response, if this is one.
    pub fn result_code(&self) -> Option<ResultCode> {
        self.generic_response
            .as_ref()
            .and_then(|r| ResultCode::try_from(r.code).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;

    #[test]
    fn envelope_round_trip() {
        let mut msg = Message::new(MessageType::VdsmRequestHello);
        msg.message_id = 42;
        msg.vdsm_request_hello = Some(VdsmRequestHello {
            dsuid: "AA".repeat(17),
            api_version: 2,
        });
        let bytes = msg.encode_to_vec();
        let decoded = Message::decode(&bytes[..]).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.kind(), Some(MessageType::VdsmRequestHello));
    }

    #[test]
    fn notification_defaults_to_id_zero() {
        let msg = Message::pong("00".repeat(17).as_str());
        assert_eq!(msg.message_id, 0);
        assert_eq!(msg.kind(), Some(MessageType::VdcSendPong));
    }

    #[test]
    fn result_code_accessor() {
        let msg = Message::generic_response(7, ResultCode::ErrNotFound, "no such entity");
        assert_eq!(msg.result_code(), Some(ResultCode::ErrNotFound));
        assert_eq!(msg.message_id, 7);
    }

    #[test]
    fn unknown_type_yields_none() {
        let mut msg = Message::default();
        msg.message_type = 999;
        let decoded = Message::decode(&msg.encode_to_vec()[..]).unwrap();
        assert_eq!(decoded.kind(), None);
    }
}
