//! Frame codec for the control channel.
//!
//! A frame is a 4-byte little-endian unsigned length followed by that many
//! bytes of UTF-8 JSON. Frames longer than the configured maximum are
//! rejected by the codec with [`std::io::ErrorKind::InvalidData`], after
//! which the stream cannot be resynchronised and must be closed.

use bytes::Bytes;
use honeyfs_core::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::codec::LengthDelimitedCodec;

/// Width of the length prefix in bytes.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Builds the length-delimited codec used on both ends of the channel.
#[must_use]
pub fn frame_codec(max_frame_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .little_endian()
        .length_field_length(LENGTH_PREFIX_BYTES)
        .max_frame_length(max_frame_bytes)
        .new_codec()
}

/// Serialises a message into a frame payload.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the value cannot be serialised.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| Error::protocol(format!("failed to encode frame: {e}")))
}

/// Parses a frame payload.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the payload is not valid JSON for `T`.
pub fn decode_json<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|e| Error::protocol(format!("malformed frame: {e}")))
}
