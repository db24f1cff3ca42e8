//! Length-prefixed framing for the vDC API TCP transport.
//!
//! Every message on the socket is a 2-byte big-endian length header
//! followed by that many bytes of protobuf payload. The length must
//! be non-zero and at most [`MAX_MESSAGE_LENGTH`].

use prost::Message as _;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::messages::Message;

/// Maximum payload length the 2-byte header allows per the protocol.
pub const MAX_MESSAGE_LENGTH: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("message too large: {0} bytes (max {MAX_MESSAGE_LENGTH})")]
    TooLarge(usize),
    #[error("received zero-length frame")]
    ZeroLength,
    #[error("short read inside a frame")]
    ShortRead,
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Serialize `msg` and write one frame.
pub async fn send_message<W>(writer: &mut W, msg: &Message) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let payload = msg.encode_to_vec();
    if payload.len() > MAX_MESSAGE_LENGTH {
        return Err(CodecError::TooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and deserialize the next frame.
///
/// Returns `Ok(None)` when the remote closed the connection cleanly
/// (EOF before the first header byte). An EOF anywhere inside a frame
/// is a [`CodecError::ShortRead`].
pub async fn receive_message<R>(reader: &mut R) -> Result<Option<Message>, CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 2];
    match reader.read(&mut header[..1]).await? {
        0 => return Ok(None),
        _ => {}
    }
    reader
        .read_exact(&mut header[1..])
        .await
        .map_err(map_short_read)?;

    let length = u16::from_be_bytes(header) as usize;
    if length == 0 {
        return Err(CodecError::ZeroLength);
    }
    if length > MAX_MESSAGE_LENGTH {
        return Err(CodecError::TooLarge(length));
    }

    let mut payload = vec![0u8; length];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(map_short_read)?;

    Ok(Some(Message::decode(&payload[..])?))
}

fn map_short_read(err: std::io::Error) -> CodecError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        CodecError::ShortRead
    } else {
        CodecError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{MessageType, ResultCode};

    #[tokio::test]
    async fn frame_round_trip() {
        let msg = Message::generic_response(3, ResultCode::ErrOk, "");
        let mut buf = Vec::new();
        send_message(&mut buf, &msg).await.unwrap();
        assert_eq!(
            u16::from_be_bytes([buf[0], buf[1]]) as usize,
            buf.len() - 2
        );

        let mut cursor = &buf[..];
        let decoded = receive_message(&mut cursor).await.unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn eof_before_header_is_clean_close() {
        let mut empty: &[u8] = &[];
        assert!(receive_message(&mut empty).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_inside_frame_is_short_read() {
        let mut truncated: &[u8] = &[0x00, 0x10, 0xAA];
        match receive_message(&mut truncated).await {
            Err(CodecError::ShortRead) => {}
            other => panic!("expected ShortRead, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_length_frame_rejected() {
        let mut frame: &[u8] = &[0x00, 0x00];
        assert!(matches!(
            receive_message(&mut frame).await,
            Err(CodecError::ZeroLength)
        ));
    }

    #[tokio::test]
    async fn oversize_header_rejected() {
        // 0x7FFF > 16384
        let mut frame: &[u8] = &[0x7F, 0xFF];
        assert!(matches!(
            receive_message(&mut frame).await,
            Err(CodecError::TooLarge(_))
        ));
    }

    #[tokio::test]
    async fn oversize_message_rejected_on_send() {
        let mut msg = Message::new(MessageType::VdcSendPushProperty);
        msg.vdc_send_push_property = Some(crate::messages::VdcSendPushProperty {
            dsuid: "00".repeat(17),
            properties: vec![crate::messages::PropertyElement {
                name: "blob".into(),
                value: Some(crate::messages::PropertyValue {
                    v_bytes: Some(vec![0u8; MAX_MESSAGE_LENGTH + 1]),
                    ..Default::default()
                }),
                elements: vec![],
            }],
        });
        let mut buf = Vec::new();
        assert!(matches!(
            send_message(&mut buf, &msg).await,
            Err(CodecError::TooLarge(_))
        ));
    }
}
