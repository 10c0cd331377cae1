use std::time::{Duration, Instant};

use radarlink_frame::{DecodeError, ParsedFrame};
use serde::Serialize;
use tracing::{debug, warn};

/// A confirmed frame ready for downstream consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedEvent {
    pub frame: ParsedFrame,
    /// Time between this frame's arrival and the arrival of the frame
    /// emitted before it. Zero for the first frame of a pairing cycle.
    pub delta: Duration,
}

/// Counters kept by a [`TrackPairer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PairerStats {
    /// Frames offered, including decode failures.
    pub accepted: u64,
    /// Frames emitted downstream.
    pub emitted: u64,
    /// Pending frames dropped because their track ids could not be confirmed.
    pub discarded: u64,
    /// Frames that failed to decode.
    pub decode_failures: u64,
    /// Frames whose ids had nothing pending to apply to; the frame itself is kept.
    pub orphaned: u64,
}

/// Holds one decoded frame back until the next frame confirms its track ids.
///
/// The sensor reports the track id of every point one frame late: the
/// target index record in frame N describes the point cloud of frame N-1.
/// `accept` therefore emits the previously pending frame, never the one it
/// was just given.
#[derive(Debug, Default)]
pub struct TrackPairer {
    pending: Option<ParsedFrame>,
    /// Arrival of the frame that was pending before the current one.
    previous_arrival: Option<Instant>,
    stats: PairerStats,
}

impl TrackPairer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer the next decode result; returns the frame it confirms, if any.
    pub fn accept(&mut self, decoded: Result<ParsedFrame, DecodeError>) -> Option<PairedEvent> {
        self.stats.accepted += 1;

        let frame = match decoded {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.decode_failures += 1;
                debug!(error = %err, "frame failed to decode");
                self.discard("decode failure");
                return None;
            }
        };

        if self.pending.is_none() {
            if let Some(ids) = frame.target_indices.as_ref() {
                debug!(
                    frame_number = frame.header.frame_number,
                    ids = ids.len(),
                    "track ids arrived with no pending frame, ignoring them"
                );
                self.stats.orphaned += 1;
                self.previous_arrival = None;
                self.pending = Some(frame);
                return None;
            }
        }

        let pending = match (self.pending.take(), frame.target_indices.as_deref()) {
            (None, _) => None,
            (Some(pending), None) => Some(pending),
            (Some(pending), Some(ids)) => {
                let frame_number = pending.header.frame_number;
                let points = pending.points.len();
                match pending.with_track_ids(ids) {
                    Some(paired) => Some(paired),
                    None => {
                        warn!(
                            frame_number,
                            points,
                            ids = ids.len(),
                            "track id count does not match pending point cloud, dropping both frames"
                        );
                        self.stats.discarded += 1;
                        self.previous_arrival = None;
                        return None;
                    }
                }
            }
        };

        let event = pending.map(|pending| {
            let delta = self
                .previous_arrival
                .map(|earlier| pending.arrival.saturating_duration_since(earlier))
                .unwrap_or(Duration::ZERO);
            self.previous_arrival = Some(pending.arrival);
            self.stats.emitted += 1;
            PairedEvent {
                frame: pending,
                delta,
            }
        });

        self.pending = Some(frame);
        event
    }

    /// The frame awaiting confirmation.
    pub fn pending(&self) -> Option<&ParsedFrame> {
        self.pending.as_ref()
    }

    pub fn stats(&self) -> PairerStats {
        self.stats
    }

    fn discard(&mut self, reason: &'static str) {
        if let Some(pending) = self.pending.take() {
            warn!(
                frame_number = pending.header.frame_number,
                reason, "discarding pending frame"
            );
            self.stats.discarded += 1;
        }
        self.previous_arrival = None;
    }
}

#[cfg(test)]
mod tests {
    use radarlink_frame::{decode_frame_at, FrameBuilder, PointIndex, PointUnits, UNKNOWN_TID};

    use super::*;

    fn units() -> PointUnits {
        PointUnits {
            elevation: 0.01,
            azimuth: 0.01,
            doppler: 0.05,
            range: 0.025,
            snr: 0.04,
        }
    }

    fn frame(number: u32, points: usize, ids: Option<&[u8]>, arrival: Instant) -> ParsedFrame {
        let mut builder = FrameBuilder::new(number).point_cloud(
            units(),
            (0..points)
                .map(|i| PointIndex {
                    range: 10 + i as i16,
                    ..PointIndex::default()
                })
                .collect(),
        );
        if let Some(ids) = ids {
            builder = builder.target_indices(ids);
        }
        let (header, payload) = builder.encode_payload();
        decode_frame_at(&payload, &header, arrival).unwrap()
    }

    fn tids(event: &PairedEvent) -> Vec<u32> {
        event.frame.points.iter().map(|p| p.tid).collect()
    }

    #[test]
    fn first_frame_is_held() {
        let mut pairer = TrackPairer::new();
        assert!(pairer.accept(Ok(frame(1, 3, None, Instant::now()))).is_none());
        assert_eq!(pairer.pending().unwrap().header.frame_number, 1);
    }

    #[test]
    fn indices_backfill_pending_frame() {
        let t0 = Instant::now();
        let mut pairer = TrackPairer::new();

        assert!(pairer.accept(Ok(frame(1, 3, None, t0))).is_none());
        let event = pairer
            .accept(Ok(frame(2, 2, Some(&[5, 6, 7]), t0 + Duration::from_millis(50))))
            .expect("frame 1 should be emitted");

        assert_eq!(event.frame.header.frame_number, 1);
        assert_eq!(tids(&event), vec![5, 6, 7]);
        assert_eq!(event.delta, Duration::ZERO);
        assert_eq!(pairer.pending().unwrap().header.frame_number, 2);
    }

    #[test]
    fn frame_without_indices_emits_pending_unchanged() {
        let t0 = Instant::now();
        let mut pairer = TrackPairer::new();

        pairer.accept(Ok(frame(1, 2, None, t0)));
        let event = pairer
            .accept(Ok(frame(2, 1, None, t0 + Duration::from_millis(50))))
            .unwrap();
        assert_eq!(tids(&event), vec![UNKNOWN_TID, UNKNOWN_TID]);
    }

    #[test]
    fn mismatched_indices_drop_both_frames() {
        let t0 = Instant::now();
        let mut pairer = TrackPairer::new();

        pairer.accept(Ok(frame(1, 3, None, t0)));
        let emitted = pairer.accept(Ok(frame(2, 1, Some(&[1, 2]), t0)));

        assert!(emitted.is_none());
        assert!(pairer.pending().is_none());
        assert_eq!(pairer.stats().discarded, 1);

        // The next frame starts a fresh cycle.
        assert!(pairer.accept(Ok(frame(3, 1, None, t0))).is_none());
        assert_eq!(pairer.pending().unwrap().header.frame_number, 3);
    }

    #[test]
    fn decode_failure_discards_pending() {
        let mut pairer = TrackPairer::new();

        assert!(pairer.accept(Ok(frame(1, 2, None, Instant::now()))).is_none());
        assert!(pairer.accept(Err(DecodeError::UnknownTlv(9999))).is_none());

        assert!(pairer.pending().is_none());
        let stats = pairer.stats();
        assert_eq!(stats.emitted, 0);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.decode_failures, 1);
    }

    #[test]
    fn indices_without_pending_are_ignored() {
        let mut pairer = TrackPairer::new();
        assert!(pairer
            .accept(Ok(frame(1, 2, Some(&[4]), Instant::now())))
            .is_none());
        assert_eq!(pairer.pending().unwrap().header.frame_number, 1);
        assert_eq!(pairer.stats().orphaned, 1);
    }

    #[test]
    fn tracked_stream_recovers_after_corrupt_frame() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut pairer = TrackPairer::new();

        assert!(pairer.accept(Ok(frame(1, 2, None, t0))).is_none());
        let first = pairer
            .accept(Ok(frame(2, 2, Some(&[1, 1]), t0 + ms(50))))
            .unwrap();
        assert_eq!(first.frame.header.frame_number, 1);

        // Frame 3 is corrupt: frame 2 goes with it.
        assert!(pairer.accept(Err(DecodeError::UnknownTlv(9999))).is_none());
        assert!(pairer
            .accept(Ok(frame(4, 2, Some(&[1, 1]), t0 + ms(150))))
            .is_none());

        let event = pairer
            .accept(Ok(frame(5, 2, Some(&[3, 4]), t0 + ms(200))))
            .expect("frame 4 should be emitted");
        assert_eq!(event.frame.header.frame_number, 4);
        assert_eq!(tids(&event), vec![3, 4]);
        assert_eq!(event.delta, Duration::ZERO);

        for n in 6..50u32 {
            let event = pairer
                .accept(Ok(frame(n, 2, Some(&[1, 1]), t0 + ms(50 * u64::from(n)))))
                .expect("every tracked frame should be emitted");
            assert_eq!(event.frame.header.frame_number, n - 1);
        }

        let stats = pairer.stats();
        assert_eq!(stats.emitted, 46);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.orphaned, 1);
    }

    #[test]
    fn delta_measures_spacing_of_emitted_frames() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut pairer = TrackPairer::new();

        pairer.accept(Ok(frame(1, 1, None, t0)));
        let first = pairer.accept(Ok(frame(2, 1, None, t0 + ms(40)))).unwrap();
        let second = pairer.accept(Ok(frame(3, 1, None, t0 + ms(90)))).unwrap();
        let third = pairer.accept(Ok(frame(4, 1, None, t0 + ms(150)))).unwrap();

        assert_eq!(first.delta, Duration::ZERO);
        assert_eq!(second.delta, ms(40));
        assert_eq!(third.delta, ms(50));
    }

    #[test]
    fn discard_resets_delta() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut pairer = TrackPairer::new();

        pairer.accept(Ok(frame(1, 1, None, t0)));
        pairer.accept(Ok(frame(2, 1, None, t0 + ms(40))));
        pairer.accept(Err(DecodeError::InvalidLength(-1)));
        pairer.accept(Ok(frame(4, 1, None, t0 + ms(200))));
        let event = pairer.accept(Ok(frame(5, 1, None, t0 + ms(240)))).unwrap();

        assert_eq!(event.frame.header.frame_number, 4);
        assert_eq!(event.delta, Duration::ZERO);
    }
}
