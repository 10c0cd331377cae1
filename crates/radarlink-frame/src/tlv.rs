//! TLV record decoding.
//!
//! Every frame payload is a sequence of `header.num_tlvs` records, each an
//! 8-byte TLV header followed by `length` bytes of body. Bodies are decoded
//! into typed records by kind; anything outside the five known kinds rejects
//! the frame.

use std::time::Instant;

use bytes::Buf;

use crate::codec::FrameHeader;
use crate::error::DecodeError;

/// TLV header: type (4) + length (4) = 8 bytes.
pub const TLV_HEADER_SIZE: usize = 8;

/// Unit prefix of a point cloud: 5 × f32.
pub const POINT_UNITS_SIZE: usize = 20;

/// One compressed point: i8 + i8 + 3 × i16.
pub const POINT_SIZE: usize = 8;

/// One tracked target: tid + 9 kinematic f32 + 16 covariance f32 + 2 f32.
pub const TARGET_SIZE: usize = 112;

/// One target height record: u8 + 2 × f32.
pub const TARGET_HEIGHT_SIZE: usize = 9;

/// Presence indication body: one i32.
pub const PRESENCE_SIZE: usize = 4;

/// Track id carried by points whose assignment has not arrived.
pub const UNKNOWN_TID: u32 = 255;

/// The record kinds a frame may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TlvType {
    TargetList = 1010,
    TargetIndex = 1011,
    TargetHeight = 1012,
    PointCloud = 1020,
    PresenceIndication = 1021,
}

impl TlvType {
    /// Wire type code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Human-readable record name.
    pub fn name(self) -> &'static str {
        match self {
            TlvType::TargetList => "target list",
            TlvType::TargetIndex => "target index",
            TlvType::TargetHeight => "target height",
            TlvType::PointCloud => "point cloud",
            TlvType::PresenceIndication => "presence indication",
        }
    }
}

impl TryFrom<u32> for TlvType {
    type Error = DecodeError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1010 => Ok(TlvType::TargetList),
            1011 => Ok(TlvType::TargetIndex),
            1012 => Ok(TlvType::TargetHeight),
            1020 => Ok(TlvType::PointCloud),
            1021 => Ok(TlvType::PresenceIndication),
            other => Err(DecodeError::UnknownTlv(other)),
        }
    }
}

/// Header preceding each TLV body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvHeader {
    pub tlv_type: u32,
    /// Body length in bytes, excluding this header.
    pub length: i32,
}

/// Decode a TLV header from the start of `bytes`.
pub fn decode_tlv_header(bytes: &[u8]) -> Result<TlvHeader, DecodeError> {
    ensure_len("TLV header", TLV_HEADER_SIZE, bytes.len())?;
    let mut src = bytes;
    Ok(TlvHeader {
        tlv_type: src.get_u32_le(),
        length: src.get_i32_le(),
    })
}

/// Scale factors applied to a point cloud's index values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointUnits {
    pub elevation: f32,
    pub azimuth: f32,
    pub doppler: f32,
    pub range: f32,
    pub snr: f32,
}

/// A point as transmitted: spherical coordinates in unit steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointIndex {
    pub elevation: i8,
    pub azimuth: i8,
    pub doppler: i16,
    pub range: i16,
    pub snr: i16,
}

impl PointIndex {
    /// Scale by `units` and convert to Cartesian coordinates.
    pub fn to_point(&self, units: &PointUnits) -> Point {
        let elevation = f64::from(units.elevation) * f64::from(self.elevation);
        let azimuth = f64::from(units.azimuth) * f64::from(self.azimuth);
        let range = f64::from(units.range) * f64::from(self.range);

        Point {
            x: range * azimuth.sin() * elevation.cos(),
            y: range * azimuth.cos() * elevation.cos(),
            z: range * elevation.sin(),
            doppler: f64::from(units.doppler) * f64::from(self.doppler),
            snr: f64::from(units.snr) * f64::from(self.snr),
            tid: UNKNOWN_TID,
        }
    }
}

/// A detected point in sensor Cartesian space (meters, m/s).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub doppler: f64,
    pub snr: f64,
    /// Track this point belongs to; [`UNKNOWN_TID`] until backfilled.
    pub tid: u32,
}

impl Point {
    /// The same point assigned to track `tid`.
    pub fn with_tid(self, tid: u32) -> Self {
        Self { tid, ..self }
    }
}

/// A tracked target as reported by the sensor's tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub tid: u32,
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub acceleration: [f32; 3],
    /// 4×4 error covariance, row-major.
    pub error_covariance: [f32; 16],
    pub gating_gain: f32,
    pub confidence: f32,
}

/// Vertical extent of a tracked target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetHeight {
    pub target_id: u8,
    pub max_z: f32,
    pub min_z: f32,
}

/// A fully decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFrame {
    pub header: FrameHeader,
    pub points: Vec<Point>,
    pub targets: Vec<Target>,
    pub target_heights: Vec<TargetHeight>,
    /// Track ids for the points of the *previous* frame, when present.
    pub target_indices: Option<Vec<u32>>,
    pub presence: bool,
    /// Monotonic time at which the frame was decoded.
    pub arrival: Instant,
}

impl ParsedFrame {
    fn empty(header: FrameHeader, arrival: Instant) -> Self {
        Self {
            header,
            points: Vec::new(),
            targets: Vec::new(),
            target_heights: Vec::new(),
            target_indices: None,
            presence: false,
            arrival,
        }
    }

    /// The same frame with point `i` assigned to track `ids[i]`.
    ///
    /// Returns `None` when `ids` does not cover the point cloud exactly.
    pub fn with_track_ids(mut self, ids: &[u32]) -> Option<Self> {
        if ids.len() != self.points.len() {
            return None;
        }
        self.points = self
            .points
            .into_iter()
            .zip(ids)
            .map(|(point, &tid)| point.with_tid(tid))
            .collect();
        Some(self)
    }
}

/// Decode a frame payload, stamping it with the current monotonic time.
pub fn decode_frame(payload: &[u8], header: &FrameHeader) -> Result<ParsedFrame, DecodeError> {
    decode_frame_at(payload, header, Instant::now())
}

/// Decode a frame payload with an explicit arrival time.
///
/// Reads exactly `header.num_tlvs` records. A later record of the same kind
/// replaces an earlier one.
pub fn decode_frame_at(
    payload: &[u8],
    header: &FrameHeader,
    arrival: Instant,
) -> Result<ParsedFrame, DecodeError> {
    let mut frame = ParsedFrame::empty(*header, arrival);
    let mut cursor = payload;

    for _ in 0..header.num_tlvs {
        let tlv = decode_tlv_header(cursor)?;
        cursor = &cursor[TLV_HEADER_SIZE..];

        let len = usize::try_from(tlv.length).map_err(|_| DecodeError::InvalidLength(tlv.length))?;
        ensure_len("TLV body", len, cursor.len())?;
        let (body, rest) = cursor.split_at(len);

        match TlvType::try_from(tlv.tlv_type)? {
            TlvType::PointCloud => frame.points = decode_point_cloud(body)?,
            TlvType::TargetList => frame.targets = decode_targets(body),
            TlvType::TargetIndex => frame.target_indices = Some(decode_target_indices(body)),
            TlvType::TargetHeight => frame.target_heights = decode_target_heights(body),
            TlvType::PresenceIndication => frame.presence = decode_presence(body)?,
        }
        cursor = rest;
    }

    Ok(frame)
}

/// Decode a point cloud body: unit prefix followed by whole points.
pub fn decode_point_cloud(body: &[u8]) -> Result<Vec<Point>, DecodeError> {
    ensure_len("point cloud units", POINT_UNITS_SIZE, body.len())?;
    let (mut prefix, points) = body.split_at(POINT_UNITS_SIZE);
    let units = PointUnits {
        elevation: prefix.get_f32_le(),
        azimuth: prefix.get_f32_le(),
        doppler: prefix.get_f32_le(),
        range: prefix.get_f32_le(),
        snr: prefix.get_f32_le(),
    };

    Ok(points
        .chunks_exact(POINT_SIZE)
        .map(|mut raw| {
            PointIndex {
                elevation: raw.get_i8(),
                azimuth: raw.get_i8(),
                doppler: raw.get_i16_le(),
                range: raw.get_i16_le(),
                snr: raw.get_i16_le(),
            }
            .to_point(&units)
        })
        .collect())
}

/// Decode a target list body.
pub fn decode_targets(body: &[u8]) -> Vec<Target> {
    body.chunks_exact(TARGET_SIZE)
        .map(|mut raw| {
            let tid = raw.get_u32_le();
            let position = read_f32s(&mut raw);
            let velocity = read_f32s(&mut raw);
            let acceleration = read_f32s(&mut raw);
            let error_covariance = read_f32s(&mut raw);
            Target {
                tid,
                position,
                velocity,
                acceleration,
                error_covariance,
                gating_gain: raw.get_f32_le(),
                confidence: raw.get_f32_le(),
            }
        })
        .collect()
}

/// Decode a target index body: one track id per byte.
pub fn decode_target_indices(body: &[u8]) -> Vec<u32> {
    body.iter().map(|&tid| u32::from(tid)).collect()
}

/// Decode a target height body.
pub fn decode_target_heights(body: &[u8]) -> Vec<TargetHeight> {
    body.chunks_exact(TARGET_HEIGHT_SIZE)
        .map(|mut raw| TargetHeight {
            target_id: raw.get_u8(),
            max_z: raw.get_f32_le(),
            min_z: raw.get_f32_le(),
        })
        .collect()
}

/// Decode a presence indication body.
pub fn decode_presence(body: &[u8]) -> Result<bool, DecodeError> {
    ensure_len("presence indication", PRESENCE_SIZE, body.len())?;
    let mut src = body;
    Ok(src.get_i32_le() > 0)
}

fn read_f32s<const N: usize>(src: &mut &[u8]) -> [f32; N] {
    let mut out = [0f32; N];
    for value in &mut out {
        *value = src.get_f32_le();
    }
    out
}

fn ensure_len(what: &'static str, needed: usize, available: usize) -> Result<(), DecodeError> {
    if available < needed {
        return Err(DecodeError::Truncated {
            what,
            needed,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::*;

    const EPS: f64 = 1e-9;

    fn header_with_tlvs(num_tlvs: u32) -> FrameHeader {
        FrameHeader {
            num_tlvs,
            ..FrameHeader::default()
        }
    }

    fn put_tlv(dst: &mut BytesMut, tlv_type: u32, body: &[u8]) {
        dst.put_u32_le(tlv_type);
        dst.put_i32_le(body.len() as i32);
        dst.put_slice(body);
    }

    fn unit_cloud(points: &[(i8, i8, i16, i16, i16)]) -> Vec<u8> {
        let mut body = BytesMut::new();
        for _ in 0..5 {
            body.put_f32_le(1.0);
        }
        for &(elev, azim, doppler, range, snr) in points {
            body.put_i8(elev);
            body.put_i8(azim);
            body.put_i16_le(doppler);
            body.put_i16_le(range);
            body.put_i16_le(snr);
        }
        body.to_vec()
    }

    #[test]
    fn tlv_type_codes() {
        for kind in [
            TlvType::TargetList,
            TlvType::TargetIndex,
            TlvType::TargetHeight,
            TlvType::PointCloud,
            TlvType::PresenceIndication,
        ] {
            assert_eq!(TlvType::try_from(kind.code()).unwrap(), kind);
        }
        assert_eq!(
            TlvType::try_from(1013).unwrap_err(),
            DecodeError::UnknownTlv(1013)
        );
    }

    #[test]
    fn point_on_boresight() {
        let points = decode_point_cloud(&unit_cloud(&[(0, 0, 0, 10, 0)])).unwrap();
        assert_eq!(points.len(), 1);
        let p = points[0];
        assert!(p.x.abs() < EPS);
        assert!((p.y - 10.0).abs() < EPS);
        assert!(p.z.abs() < EPS);
        assert_eq!(p.tid, UNKNOWN_TID);
    }

    #[test]
    fn point_scaled_by_units() {
        let mut body = BytesMut::new();
        body.put_f32_le(0.0); // elevation
        body.put_f32_le(std::f32::consts::FRAC_PI_2 / 4.0); // azimuth
        body.put_f32_le(0.5); // doppler
        body.put_f32_le(0.25); // range
        body.put_f32_le(0.1); // snr
        body.put_i8(0);
        body.put_i8(4);
        body.put_i16_le(-6);
        body.put_i16_le(8);
        body.put_i16_le(30);

        let p = decode_point_cloud(&body).unwrap()[0];
        assert!((p.x - 2.0).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
        assert!((p.doppler + 3.0).abs() < EPS);
        assert!((p.snr - 3.0).abs() < 1e-6);
    }

    #[test]
    fn point_elevation_lifts_z() {
        let mut body = BytesMut::new();
        body.put_f32_le(std::f32::consts::FRAC_PI_2);
        for _ in 0..4 {
            body.put_f32_le(1.0);
        }
        body.put_slice(&[1, 0, 0, 0, 5, 0, 0, 0]);

        let p = decode_point_cloud(&body).unwrap()[0];
        assert!((p.z - 5.0).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
    }

    #[test]
    fn point_cloud_without_units_is_truncated() {
        let err = decode_point_cloud(&[0u8; 19]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                what: "point cloud units",
                needed: 20,
                available: 19
            }
        );
    }

    #[test]
    fn point_cloud_ignores_partial_trailing_point() {
        let mut body = unit_cloud(&[(0, 0, 0, 1, 0), (0, 0, 0, 2, 0)]);
        body.extend_from_slice(&[0xAA; 5]);
        assert_eq!(decode_point_cloud(&body).unwrap().len(), 2);
    }

    #[test]
    fn target_fields_at_offsets() {
        let mut body = BytesMut::new();
        body.put_u32_le(42);
        for i in 0..9 {
            body.put_f32_le(i as f32);
        }
        for i in 0..16 {
            body.put_f32_le(100.0 + i as f32);
        }
        body.put_f32_le(3.5);
        body.put_f32_le(0.9);
        assert_eq!(body.len(), TARGET_SIZE);

        let targets = decode_targets(&body);
        assert_eq!(targets.len(), 1);
        let t = &targets[0];
        assert_eq!(t.tid, 42);
        assert_eq!(t.position, [0.0, 1.0, 2.0]);
        assert_eq!(t.velocity, [3.0, 4.0, 5.0]);
        assert_eq!(t.acceleration, [6.0, 7.0, 8.0]);
        assert_eq!(t.error_covariance[0], 100.0);
        assert_eq!(t.error_covariance[15], 115.0);
        assert_eq!(t.gating_gain, 3.5);
        assert_eq!(t.confidence, 0.9);
    }

    #[test]
    fn target_heights_and_indices() {
        let mut body = BytesMut::new();
        body.put_u8(7);
        body.put_f32_le(1.8);
        body.put_f32_le(0.1);
        body.put_u8(9);
        body.put_f32_le(1.2);
        body.put_f32_le(0.0);

        let heights = decode_target_heights(&body);
        assert_eq!(heights.len(), 2);
        assert_eq!(heights[0].target_id, 7);
        assert_eq!(heights[0].max_z, 1.8);
        assert_eq!(heights[1].min_z, 0.0);

        assert_eq!(decode_target_indices(&[5, 6, 255]), vec![5, 6, 255]);
    }

    #[test]
    fn presence_is_positive_value() {
        assert!(decode_presence(&1i32.to_le_bytes()).unwrap());
        assert!(!decode_presence(&0i32.to_le_bytes()).unwrap());
        assert!(!decode_presence(&(-4i32).to_le_bytes()).unwrap());
        assert!(decode_presence(&[1, 0]).is_err());
    }

    #[test]
    fn decode_all_record_kinds() {
        let mut payload = BytesMut::new();
        put_tlv(&mut payload, 1020, &unit_cloud(&[(0, 0, 0, 3, 0), (0, 0, 0, 4, 0)]));
        put_tlv(&mut payload, 1011, &[1, 2, 3]);
        put_tlv(&mut payload, 1021, &1i32.to_le_bytes());
        put_tlv(&mut payload, 1012, &[4, 0, 0, 0x80, 0x3F, 0, 0, 0, 0]);
        put_tlv(&mut payload, 1010, &[0u8; TARGET_SIZE * 2]);

        let arrival = Instant::now();
        let frame = decode_frame_at(&payload, &header_with_tlvs(5), arrival).unwrap();
        assert_eq!(frame.points.len(), 2);
        assert_eq!(frame.target_indices, Some(vec![1, 2, 3]));
        assert!(frame.presence);
        assert_eq!(frame.target_heights[0].max_z, 1.0);
        assert_eq!(frame.targets.len(), 2);
        assert_eq!(frame.arrival, arrival);
    }

    #[test]
    fn decode_reads_exactly_num_tlvs() {
        let mut payload = BytesMut::new();
        put_tlv(&mut payload, 1021, &1i32.to_le_bytes());
        put_tlv(&mut payload, 9999, &[0; 4]);

        let frame = decode_frame(&payload, &header_with_tlvs(1)).unwrap();
        assert!(frame.presence);
        assert!(frame.target_indices.is_none());
    }

    #[test]
    fn decode_rejects_unknown_tlv() {
        let mut payload = BytesMut::new();
        put_tlv(&mut payload, 1021, &1i32.to_le_bytes());
        put_tlv(&mut payload, 1030, &[0; 4]);

        let err = decode_frame(&payload, &header_with_tlvs(2)).unwrap_err();
        assert_eq!(err, DecodeError::UnknownTlv(1030));
    }

    #[test]
    fn decode_rejects_missing_tlvs() {
        let mut payload = BytesMut::new();
        put_tlv(&mut payload, 1021, &1i32.to_le_bytes());

        let err = decode_frame(&payload, &header_with_tlvs(2)).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                what: "TLV header",
                ..
            }
        ));
    }

    #[test]
    fn decode_rejects_overlong_tlv() {
        let mut payload = BytesMut::new();
        payload.put_u32_le(1011);
        payload.put_i32_le(10);
        payload.put_slice(&[1, 2, 3]);

        let err = decode_frame(&payload, &header_with_tlvs(1)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                what: "TLV body",
                needed: 10,
                available: 3
            }
        );
    }

    #[test]
    fn decode_rejects_negative_length() {
        let mut payload = BytesMut::new();
        payload.put_u32_le(1011);
        payload.put_i32_le(-1);

        let err = decode_frame(&payload, &header_with_tlvs(1)).unwrap_err();
        assert_eq!(err, DecodeError::InvalidLength(-1));
    }

    #[test]
    fn with_track_ids_backfills_new_points() {
        let mut payload = BytesMut::new();
        put_tlv(&mut payload, 1020, &unit_cloud(&[(0, 0, 0, 1, 0), (0, 0, 0, 2, 0)]));
        let frame = decode_frame(&payload, &header_with_tlvs(1)).unwrap();
        let original = frame.clone();

        let tagged = frame.with_track_ids(&[8, 9]).unwrap();
        assert_eq!(tagged.points[0].tid, 8);
        assert_eq!(tagged.points[1].tid, 9);
        assert_eq!(tagged.points[1].y, original.points[1].y);

        assert!(original.with_track_ids(&[1]).is_none());
    }
}
