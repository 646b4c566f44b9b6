//! Bounded frame bus for real-time pose delivery.
//!
//! Carries landmark frames from the capture pump to the classify task with
//! bounded latency. The camera side never blocks: when the classifier lags,
//! new frames are dropped and counted rather than queued without limit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use fitquest_pose::LandmarkFrame;

/// A landmark frame with ordering metadata.
#[derive(Debug, Clone)]
pub struct FramePacket {
    /// Monotonic sequence number assigned at send time.
    pub seq: u64,
    /// Wall-clock capture timestamp in milliseconds.
    pub ts_ms: i64,
    pub frame: LandmarkFrame,
}

/// Configuration for the frame bus.
#[derive(Debug, Clone)]
pub struct FrameBusConfig {
    /// Target buffer capacity in milliseconds.
    pub capacity_ms: u32,
    /// Expected capture rate, used to size the channel.
    pub expected_fps: u32,
}

impl Default for FrameBusConfig {
    fn default() -> Self {
        Self {
            capacity_ms: 500,
            expected_fps: 30,
        }
    }
}

impl FrameBusConfig {
    fn channel_capacity(&self) -> usize {
        if self.expected_fps == 0 {
            return 8;
        }
        ((self.capacity_ms as usize * self.expected_fps as usize) / 1000).max(8)
    }
}

/// Sender half of the frame bus.
#[derive(Clone)]
pub struct FrameBusSender {
    tx: mpsc::Sender<FramePacket>,
    seq_counter: Arc<AtomicU64>,
    dropped_frames: Arc<AtomicU64>,
}

impl FrameBusSender {
    /// Send a frame, dropping it if the buffer is full.
    ///
    /// Returns `false` when the frame was dropped or the bus is closed.
    pub fn send(&self, ts_ms: i64, frame: LandmarkFrame) -> bool {
        let seq = self.seq_counter.fetch_add(1, Ordering::Relaxed);
        let packet = FramePacket { seq, ts_ms, frame };

        match self.tx.try_send(packet) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
                // Rate-limit logging to avoid spamming at camera rate.
                if dropped % 30 == 1 {
                    tracing::warn!(dropped, seq, "frame bus full, dropping frames");
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("frame bus closed");
                false
            }
        }
    }

    /// Whether the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn current_seq(&self) -> u64 {
        self.seq_counter.load(Ordering::Relaxed)
    }
}

/// Receiver half of the frame bus.
pub struct FrameBusReceiver {
    rx: mpsc::Receiver<FramePacket>,
    /// Sequence of the most recently received packet; `None` until the
    /// first packet arrives (seq 0 is a legitimate first value).
    last_seq: Option<u64>,
    gaps_detected: u64,
}

impl FrameBusReceiver {
    /// Receive the next frame. `None` means every sender is gone.
    pub async fn recv(&mut self) -> Option<FramePacket> {
        let packet = self.rx.recv().await?;
        self.track_seq(packet.seq);
        Some(packet)
    }

    /// Try to receive a frame without blocking.
    pub fn try_recv(&mut self) -> Option<FramePacket> {
        match self.rx.try_recv() {
            Ok(packet) => {
                self.track_seq(packet.seq);
                Some(packet)
            }
            Err(_) => None,
        }
    }

    fn track_seq(&mut self, seq: u64) {
        if let Some(last) = self.last_seq {
            if seq > last + 1 {
                let gap = seq - last - 1;
                self.gaps_detected += gap;
                tracing::debug!(gap, from = last, to = seq, "frame bus gap");
            }
        }
        self.last_seq = Some(seq);
    }

    /// Number of frames known to be missing (dropped upstream).
    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }

    /// Drain all queued frames, keeping only the most recent.
    ///
    /// Useful for catching up after classification lag.
    pub fn drain_to_latest(&mut self) -> Option<FramePacket> {
        let mut latest = None;
        let mut drained = 0;

        while let Some(packet) = self.try_recv() {
            drained += 1;
            latest = Some(packet);
        }

        if drained > 1 {
            tracing::debug!(skipped = drained - 1, "drained stale frames from bus");
        }
        latest
    }
}

/// Frame bus for bounded-latency pose delivery.
pub struct FrameBus {
    sender: FrameBusSender,
    receiver: Option<FrameBusReceiver>,
}

impl FrameBus {
    pub fn new() -> Self {
        Self::with_config(FrameBusConfig::default())
    }

    pub fn with_config(config: FrameBusConfig) -> Self {
        let capacity = config.channel_capacity();
        let (tx, rx) = mpsc::channel(capacity);

        tracing::debug!(
            capacity_ms = config.capacity_ms,
            capacity,
            "created frame bus"
        );

        Self {
            sender: FrameBusSender {
                tx,
                seq_counter: Arc::new(AtomicU64::new(0)),
                dropped_frames: Arc::new(AtomicU64::new(0)),
            },
            receiver: Some(FrameBusReceiver {
                rx,
                last_seq: None,
                gaps_detected: 0,
            }),
        }
    }

    pub fn sender(&self) -> FrameBusSender {
        self.sender.clone()
    }

    /// Take the receiver (can only be called once).
    pub fn take_receiver(&mut self) -> Option<FrameBusReceiver> {
        self.receiver.take()
    }
}

impl Default for FrameBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitquest_pose::{Joint, Landmark};

    fn frame(x: f32) -> LandmarkFrame {
        LandmarkFrame::empty(640, 480).with_joint(Joint::LeftHip, Landmark::new(x, 0.5, 0.9))
    }

    #[test]
    fn test_bus_config_capacity() {
        let config = FrameBusConfig {
            capacity_ms: 500,
            expected_fps: 30,
        };
        assert_eq!(config.channel_capacity(), 15);
    }

    #[tokio::test]
    async fn test_send_recv() {
        let mut bus = FrameBus::new();
        let sender = bus.sender();
        let mut receiver = bus.take_receiver().unwrap();

        sender.send(1000, frame(0.25));

        let packet = receiver.recv().await.unwrap();
        assert_eq!(packet.seq, 0);
        assert_eq!(packet.ts_ms, 1000);
        let hip = packet.frame.joint(Joint::LeftHip).unwrap();
        assert_eq!(hip.x, 0.25);
    }

    #[tokio::test]
    async fn test_sequence_monotonicity() {
        let mut bus = FrameBus::new();
        let sender = bus.sender();
        let mut receiver = bus.take_receiver().unwrap();

        for i in 0..10 {
            sender.send(i * 33, frame(0.5));
        }

        let mut last_seq = 0;
        for _ in 0..10 {
            let packet = receiver.recv().await.unwrap();
            assert!(packet.seq >= last_seq, "sequence must be monotonic");
            last_seq = packet.seq;
        }
    }

    #[test]
    fn test_dropped_frames_counted() {
        let bus = FrameBus::with_config(FrameBusConfig {
            capacity_ms: 250,
            expected_fps: 30,
        });
        let sender = bus.sender();

        for i in 0..40 {
            sender.send(i * 33, frame(0.5));
        }

        assert!(sender.dropped_frames() > 0);
    }

    #[test]
    fn test_closed_after_receiver_drop() {
        let mut bus = FrameBus::new();
        let sender = bus.sender();
        let receiver = bus.take_receiver().unwrap();
        drop(receiver);
        drop(bus);

        assert!(sender.is_closed());
        assert!(!sender.send(0, frame(0.5)));
    }

    #[test]
    fn test_gap_right_after_first_packet_is_counted() {
        let mut bus = FrameBus::new();
        let mut receiver = bus.take_receiver().unwrap();

        // First received packet is seq 0; the next one jumps to 3.
        receiver.track_seq(0);
        assert_eq!(receiver.gaps_detected(), 0);
        receiver.track_seq(3);
        assert_eq!(receiver.gaps_detected(), 2);
    }

    #[test]
    fn test_no_gap_before_first_packet() {
        let mut bus = FrameBus::new();
        let mut receiver = bus.take_receiver().unwrap();

        // A first packet with a high seq is startup, not a gap.
        receiver.track_seq(5);
        assert_eq!(receiver.gaps_detected(), 0);
    }

    #[test]
    fn test_drain_to_latest_skips_old() {
        let mut bus = FrameBus::new();
        let sender = bus.sender();
        let mut receiver = bus.take_receiver().unwrap();

        for i in 0..5 {
            sender.send(i * 100, frame(i as f32 / 10.0));
        }

        let latest = receiver.drain_to_latest().unwrap();
        assert_eq!(latest.ts_ms, 400);
        assert!(receiver.try_recv().is_none());
    }
}
