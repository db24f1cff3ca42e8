//! Wire layer of the digitalSTROM vDC API.
//!
//! This crate contains everything a vDC host and its tests need to
//! talk the protocol without any entity semantics: the dSUID identity
//! type, the protobuf message set, the 2-byte length framing, and the
//! property-element codec with query matching.

pub mod dsuid;
pub mod framing;
pub mod messages;
pub mod property;

pub use dsuid::{DsUid, DsUidError, DsUidKind};
pub use framing::{CodecError, MAX_MESSAGE_LENGTH, receive_message, send_message};
pub use messages::{Message, MessageType, ResultCode};
pub use property::{PropTree, PropValue, elements_to_tree, match_query, tree_to_elements};
