//! Frame synchronization and TLV decoding for radar sensor byte streams.
//!
//! Every frame on the wire is:
//! - An 8-byte magic word (`02 01 04 03 06 05 08 07`) for stream synchronization
//! - A 32-byte little-endian header (eight u32 fields)
//! - `num_tlvs` Type-Length-Value records
//!
//! [`FrameSynchronizer`] cuts [`RawFrame`]s out of a byte source;
//! [`decode_frame`] turns a raw payload into a [`ParsedFrame`]. Decoding is
//! pure and never touches I/O.

pub mod codec;
pub mod encode;
pub mod error;
pub mod sync;
pub mod tlv;

pub use codec::{
    decode_header, encode_header, FrameHeader, SyncConfig, DEFAULT_MAX_PAYLOAD, FULL_HEADER_SIZE,
    HEADER_SIZE, MAGIC_WORD,
};
pub use encode::{FrameBuilder, TlvRecord};
pub use error::{DecodeError, FrameError, Result};
pub use sync::{FrameSynchronizer, MagicWordDetector, RawFrame, SyncStats};
pub use tlv::{
    decode_frame, decode_frame_at, decode_tlv_header, ParsedFrame, Point, PointIndex, PointUnits,
    Target, TargetHeight, TlvHeader, TlvType, UNKNOWN_TID,
};
