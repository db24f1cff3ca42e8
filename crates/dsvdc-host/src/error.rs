use dsvdc_proto::{CodecError, DsUidError};

use crate::session::SessionError;
use crate::store::StoreError;

/// Top-level error of the host crate.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    DsUid(#[from] DsUidError),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
