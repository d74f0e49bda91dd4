//! Control-point payload codec
//!
//! Every value pushed to the bitsnap characteristic is framed as:
//! ```text
//! [ 0x00 ][ 0x02 ][ value ]
//! ```
//!
//! The first two bytes are a fixed header, the third is the output level.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Exact length of a control-point write
pub const PAYLOAD_LEN: usize = 3;

/// Fixed header preceding the value byte
pub const PAYLOAD_HEADER: [u8; 2] = [0x00, 0x02];

/// Errors that can occur while decoding a control-point frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid payload length: {0} bytes (expected {PAYLOAD_LEN})")]
    InvalidLength(usize),

    #[error("Invalid payload header: {0:02x?}")]
    InvalidHeader([u8; 2]),
}

/// Encode a value into the 3-byte write payload
pub fn encode(value: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(PAYLOAD_LEN);
    buf.put_slice(&PAYLOAD_HEADER);
    buf.put_u8(value);
    buf.freeze()
}

/// Decode a write payload back into its value
pub fn decode(payload: &[u8]) -> Result<u8, CodecError> {
    if payload.len() != PAYLOAD_LEN {
        return Err(CodecError::InvalidLength(payload.len()));
    }

    let header = [payload[0], payload[1]];
    if header != PAYLOAD_HEADER {
        return Err(CodecError::InvalidHeader(header));
    }

    Ok(payload[2])
}
