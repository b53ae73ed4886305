use crate::error::{PgasError, Result};
use crate::protocol::header::{HEADER_SIZE, Header, Lane};
use crate::protocol::message::PgasMessage;
use crate::types::PROTOCOL_VERSION;

/// Encode a `PgasMessage` into a framed byte buffer: `[header][rkyv payload]`.
pub fn encode_message(msg: &PgasMessage) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| PgasError::EncodeFailed(e.to_string()))?;

    if payload.len() > u32::MAX as usize {
        return Err(PgasError::EncodeFailed(format!(
            "payload too large for framed header: {} bytes exceeds u32::MAX",
            payload.len()
        )));
    }

    let header = Header {
        payload_length: payload.len() as u32,
        version: PROTOCOL_VERSION,
        lane: Lane::of(msg),
    };

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a framed byte buffer back into a `(Header, PgasMessage)`.
///
/// Frames whose payload exceeds `max_payload` bytes, whose version differs
/// from ours, or whose lane does not match the message are rejected.
pub fn decode_message(buf: &[u8], max_payload: usize) -> Result<(Header, PgasMessage)> {
    if buf.len() < HEADER_SIZE {
        return Err(PgasError::DecodeFailed(format!(
            "buffer too short: {} < {HEADER_SIZE}",
            buf.len()
        )));
    }

    let header_bytes: &[u8; HEADER_SIZE] = buf[..HEADER_SIZE]
        .try_into()
        .map_err(|_| PgasError::DecodeFailed("header slice length mismatch".into()))?;

    let header = Header::decode(header_bytes)
        .ok_or_else(|| PgasError::DecodeFailed("invalid header: unknown lane".into()))?;

    if header.version != PROTOCOL_VERSION {
        return Err(PgasError::ProtocolMismatch {
            local: PROTOCOL_VERSION,
            remote: header.version,
        });
    }

    let payload_len = header.payload_length as usize;
    if payload_len > max_payload {
        return Err(PgasError::DecodeFailed(format!(
            "payload of {payload_len} bytes exceeds limit of {max_payload}"
        )));
    }

    let payload_end = HEADER_SIZE + payload_len;
    if buf.len() < payload_end {
        return Err(PgasError::DecodeFailed(format!(
            "buffer too short for payload: {} < {payload_end}",
            buf.len()
        )));
    }

    // Archived data must be aligned; the payload sits at an arbitrary offset.
    let mut payload = rkyv::util::AlignedVec::<16>::with_capacity(payload_len);
    payload.extend_from_slice(&buf[HEADER_SIZE..payload_end]);
    let msg = rkyv::from_bytes::<PgasMessage, rkyv::rancor::Error>(&payload)
        .map_err(|e| PgasError::DecodeFailed(e.to_string()))?;
    if Lane::of(&msg) != header.lane {
        return Err(PgasError::DecodeFailed(format!(
            "message on lane {:?} does not belong to it",
            header.lane
        )));
    }

    Ok((header, msg))
}
