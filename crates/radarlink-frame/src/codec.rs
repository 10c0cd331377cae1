use bytes::{Buf, BufMut, BytesMut};

use crate::error::DecodeError;

/// Magic word marking the start of every frame on the wire.
pub const MAGIC_WORD: [u8; 8] = [2, 1, 4, 3, 6, 5, 8, 7];

/// Frame header after the magic word: 8 × u32 = 32 bytes.
pub const HEADER_SIZE: usize = 32;

/// Magic word plus header: 40 bytes.
pub const FULL_HEADER_SIZE: usize = MAGIC_WORD.len() + HEADER_SIZE;

/// Default ceiling on a single frame's TLV payload: 64 KiB.
///
/// The densest sensor configuration produces well under 16 KiB per frame.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// Fixed frame header, decoded from the 32 bytes following the magic word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    pub version: u32,
    /// Bytes on the wire for the whole frame, magic word included.
    pub total_packet_length: u32,
    pub platform: u32,
    pub frame_number: u32,
    /// Sensor CPU cycle count at frame start.
    pub time: u32,
    pub num_detected_objects: u32,
    pub num_tlvs: u32,
    pub subframe_number: u32,
}

impl FrameHeader {
    /// TLV payload length implied by `total_packet_length`.
    ///
    /// Negative or zero for corrupted headers.
    pub fn payload_len(&self) -> i64 {
        i64::from(self.total_packet_length) - FULL_HEADER_SIZE as i64
    }
}

/// Decode a frame header from the bytes following the magic word.
///
/// Wire format (all little-endian u32):
/// ```text
/// ┌─────────┬─────────────┬──────────┬─────────┬──────┬────────┬─────────┬──────────┐
/// │ version │ total_len   │ platform │ frame # │ time │ # objs │ # TLVs  │ subframe │
/// └─────────┴─────────────┴──────────┴─────────┴──────┴────────┴─────────┴──────────┘
/// ```
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::MalformedHeader {
            len: bytes.len(),
            expected: HEADER_SIZE,
        });
    }

    let mut src = &bytes[..HEADER_SIZE];
    Ok(FrameHeader {
        version: src.get_u32_le(),
        total_packet_length: src.get_u32_le(),
        platform: src.get_u32_le(),
        frame_number: src.get_u32_le(),
        time: src.get_u32_le(),
        num_detected_objects: src.get_u32_le(),
        num_tlvs: src.get_u32_le(),
        subframe_number: src.get_u32_le(),
    })
}

/// Encode a frame header (without the magic word).
pub fn encode_header(header: &FrameHeader, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_u32_le(header.version);
    dst.put_u32_le(header.total_packet_length);
    dst.put_u32_le(header.platform);
    dst.put_u32_le(header.frame_number);
    dst.put_u32_le(header.time);
    dst.put_u32_le(header.num_detected_objects);
    dst.put_u32_le(header.num_tlvs);
    dst.put_u32_le(header.subframe_number);
}

/// Configuration for the byte-stream synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Largest TLV payload accepted, in bytes. Default: 64 KiB.
    ///
    /// A corrupted length field beyond this is discarded instead of
    /// allocating for it.
    pub max_payload_len: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_payload_len: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> FrameHeader {
        FrameHeader {
            version: 0x0306_0000,
            total_packet_length: 1_000,
            platform: 0xA6843,
            frame_number: u32::MAX,
            time: 0xDEAD_BEEF,
            num_detected_objects: 17,
            num_tlvs: 5,
            subframe_number: 0,
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample_header();
        let mut buf = BytesMut::new();
        encode_header(&header, &mut buf);

        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(decode_header(&buf).unwrap(), header);
    }

    #[test]
    fn test_header_field_order_is_little_endian() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[4..8].copy_from_slice(&0x0102_0304u32.to_le_bytes());
        bytes[24..28].copy_from_slice(&3u32.to_le_bytes());

        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.total_packet_length, 0x0102_0304);
        assert_eq!(header.num_tlvs, 3);
        assert_eq!(header.version, 0);
    }

    #[test]
    fn test_decode_header_too_short() {
        let err = decode_header(&[0u8; 31]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedHeader {
                len: 31,
                expected: HEADER_SIZE
            }
        );
    }

    #[test]
    fn test_decode_header_ignores_trailing_bytes() {
        let mut buf = BytesMut::new();
        encode_header(&sample_header(), &mut buf);
        buf.put_slice(&[0xFF; 8]);

        assert_eq!(decode_header(&buf).unwrap(), sample_header());
    }

    #[test]
    fn test_payload_len() {
        let mut header = sample_header();
        assert_eq!(header.payload_len(), 960);

        header.total_packet_length = 40;
        assert_eq!(header.payload_len(), 0);

        header.total_packet_length = 12;
        assert_eq!(header.payload_len(), -28);
    }

    #[test]
    fn test_full_header_size() {
        assert_eq!(FULL_HEADER_SIZE, 40);
    }
}
