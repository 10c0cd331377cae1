use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{encode_header, FrameHeader, FULL_HEADER_SIZE, MAGIC_WORD};
use crate::tlv::{PointIndex, PointUnits, Target, TargetHeight, TlvType, TLV_HEADER_SIZE};

/// One TLV record to encode.
#[derive(Debug, Clone, PartialEq)]
pub enum TlvRecord {
    PointCloud {
        units: PointUnits,
        points: Vec<PointIndex>,
    },
    TargetList(Vec<Target>),
    TargetIndex(Vec<u8>),
    TargetHeight(Vec<TargetHeight>),
    Presence(i32),
    /// Arbitrary type code and body, for records the decoder does not know.
    Raw { tlv_type: u32, body: Bytes },
}

impl TlvRecord {
    fn tlv_type(&self) -> u32 {
        match self {
            TlvRecord::PointCloud { .. } => TlvType::PointCloud.code(),
            TlvRecord::TargetList(_) => TlvType::TargetList.code(),
            TlvRecord::TargetIndex(_) => TlvType::TargetIndex.code(),
            TlvRecord::TargetHeight(_) => TlvType::TargetHeight.code(),
            TlvRecord::Presence(_) => TlvType::PresenceIndication.code(),
            TlvRecord::Raw { tlv_type, .. } => *tlv_type,
        }
    }

    fn put_body(&self, dst: &mut BytesMut) {
        match self {
            TlvRecord::PointCloud { units, points } => {
                dst.put_f32_le(units.elevation);
                dst.put_f32_le(units.azimuth);
                dst.put_f32_le(units.doppler);
                dst.put_f32_le(units.range);
                dst.put_f32_le(units.snr);
                for p in points {
                    dst.put_i8(p.elevation);
                    dst.put_i8(p.azimuth);
                    dst.put_i16_le(p.doppler);
                    dst.put_i16_le(p.range);
                    dst.put_i16_le(p.snr);
                }
            }
            TlvRecord::TargetList(targets) => {
                for t in targets {
                    dst.put_u32_le(t.tid);
                    t.position
                        .iter()
                        .chain(&t.velocity)
                        .chain(&t.acceleration)
                        .chain(&t.error_covariance)
                        .for_each(|v| dst.put_f32_le(*v));
                    dst.put_f32_le(t.gating_gain);
                    dst.put_f32_le(t.confidence);
                }
            }
            TlvRecord::TargetIndex(ids) => dst.put_slice(ids),
            TlvRecord::TargetHeight(heights) => {
                for h in heights {
                    dst.put_u8(h.target_id);
                    dst.put_f32_le(h.max_z);
                    dst.put_f32_le(h.min_z);
                }
            }
            TlvRecord::Presence(value) => dst.put_i32_le(*value),
            TlvRecord::Raw { body, .. } => dst.put_slice(body),
        }
    }

    /// Encode the TLV header and body.
    pub fn encode(&self, dst: &mut BytesMut) {
        let mut body = BytesMut::new();
        self.put_body(&mut body);

        dst.reserve(TLV_HEADER_SIZE + body.len());
        dst.put_u32_le(self.tlv_type());
        dst.put_i32_le(body.len() as i32);
        dst.put_slice(&body);
    }
}

/// Assembles wire frames from typed records.
///
/// `total_packet_length` and `num_tlvs` are derived from the records; every
/// other header field is taken from the template header.
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    header: FrameHeader,
    records: Vec<TlvRecord>,
}

impl FrameBuilder {
    /// Start a frame with the given frame number.
    pub fn new(frame_number: u32) -> Self {
        Self {
            header: FrameHeader {
                frame_number,
                ..FrameHeader::default()
            },
            records: Vec::new(),
        }
    }

    /// Replace the template header.
    pub fn header(mut self, header: FrameHeader) -> Self {
        self.header = header;
        self
    }

    /// Append a record.
    pub fn record(mut self, record: TlvRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Append a point cloud.
    pub fn point_cloud(self, units: PointUnits, points: Vec<PointIndex>) -> Self {
        self.record(TlvRecord::PointCloud { units, points })
    }

    /// Append a target index list.
    pub fn target_indices(self, ids: &[u8]) -> Self {
        self.record(TlvRecord::TargetIndex(ids.to_vec()))
    }

    /// Append a presence indication.
    pub fn presence(self, present: bool) -> Self {
        self.record(TlvRecord::Presence(i32::from(present)))
    }

    /// Encode the TLV payload and the header describing it.
    pub fn encode_payload(&self) -> (FrameHeader, Bytes) {
        let mut payload = BytesMut::new();
        for record in &self.records {
            record.encode(&mut payload);
        }

        let header = FrameHeader {
            total_packet_length: (FULL_HEADER_SIZE + payload.len()) as u32,
            num_tlvs: self.records.len() as u32,
            ..self.header
        };
        (header, payload.freeze())
    }

    /// Encode the whole frame (magic word, header, payload).
    pub fn encode(&self, dst: &mut BytesMut) {
        let (header, payload) = self.encode_payload();
        dst.reserve(FULL_HEADER_SIZE + payload.len());
        dst.put_slice(&MAGIC_WORD);
        encode_header(&header, dst);
        dst.put_slice(&payload);
    }

    /// Encode the whole frame into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode(&mut dst);
        dst.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_header, HEADER_SIZE};
    use crate::tlv::{decode_frame, UNKNOWN_TID};

    fn units() -> PointUnits {
        PointUnits {
            elevation: 0.01,
            azimuth: 0.01,
            doppler: 0.05,
            range: 0.025,
            snr: 0.04,
        }
    }

    #[test]
    fn header_describes_payload() {
        let builder = FrameBuilder::new(12)
            .point_cloud(units(), vec![PointIndex::default(); 3])
            .target_indices(&[1, 2])
            .presence(true);

        let (header, payload) = builder.encode_payload();
        assert_eq!(header.frame_number, 12);
        assert_eq!(header.num_tlvs, 3);
        assert_eq!(header.payload_len(), payload.len() as i64);
        // 8 + 20 + 24, 8 + 2, 8 + 4
        assert_eq!(payload.len(), 52 + 10 + 12);
    }

    #[test]
    fn wire_frame_starts_with_magic_word() {
        let wire = FrameBuilder::new(1).presence(false).to_bytes();
        assert_eq!(&wire[..8], &MAGIC_WORD);

        let header = decode_header(&wire[8..8 + HEADER_SIZE]).unwrap();
        assert_eq!(header.total_packet_length as usize, wire.len());
    }

    #[test]
    fn encoded_records_decode() {
        let target = Target {
            tid: 3,
            position: [1.0, 2.0, 0.5],
            velocity: [0.1, 0.0, 0.0],
            acceleration: [0.0; 3],
            error_covariance: [0.25; 16],
            gating_gain: 2.0,
            confidence: 0.75,
        };
        let height = TargetHeight {
            target_id: 3,
            max_z: 1.7,
            min_z: 0.2,
        };
        let builder = FrameBuilder::new(5)
            .point_cloud(
                units(),
                vec![PointIndex {
                    range: 40,
                    ..PointIndex::default()
                }],
            )
            .record(TlvRecord::TargetList(vec![target.clone()]))
            .record(TlvRecord::TargetHeight(vec![height]))
            .target_indices(&[3])
            .presence(true);

        let (header, payload) = builder.encode_payload();
        let frame = decode_frame(&payload, &header).unwrap();

        assert_eq!(frame.points.len(), 1);
        assert!((frame.points[0].y - 1.0).abs() < 1e-6);
        assert_eq!(frame.points[0].tid, UNKNOWN_TID);
        assert_eq!(frame.targets, vec![target]);
        assert_eq!(frame.target_heights, vec![height]);
        assert_eq!(frame.target_indices, Some(vec![3]));
        assert!(frame.presence);
    }

    #[test]
    fn raw_record_keeps_type_code() {
        let (_, payload) = FrameBuilder::new(0)
            .record(TlvRecord::Raw {
                tlv_type: 7,
                body: Bytes::from_static(b"abc"),
            })
            .encode_payload();
        assert_eq!(&payload[..4], &7u32.to_le_bytes());
        assert_eq!(&payload[4..8], &3i32.to_le_bytes());
        assert_eq!(&payload[8..], b"abc");
    }
}
