//! Session lifecycle: countdown, capture pump, classify loop, totals flush.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use fitquest_bus::{FrameBus, FrameBusConfig, FrameBusSender};
use fitquest_detect::{
    CoinReachDetector, CoinTarget, ExerciseKind, MotionDetector, SquatDetector, WalkingDetector,
    ChairSitDetector, DEFAULT_GOAL_REPS,
};
use fitquest_pose::PoseSource;
use fitquest_profile::{ProfileStore, SessionTotals};

use crate::state::{SessionSnapshot, SharedSession};
use crate::{Result, SessionError};

/// Coin collections after which a hand session ends early.
pub const DEFAULT_COIN_CAP: u32 = 15;

/// Per-session parameters. `for_kind` applies the per-exercise defaults.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub kind: ExerciseKind,
    pub user: String,
    /// Get-ready delay before the camera goes live.
    pub countdown: Duration,
    pub time_budget: Duration,
    pub goal_reps: u32,
    pub coin_cap: u32,
    pub bus: FrameBusConfig,
}

impl SessionConfig {
    pub fn for_kind(kind: ExerciseKind, user: impl Into<String>) -> Self {
        let time_budget = match kind {
            ExerciseKind::Squat | ExerciseKind::Hand => Duration::from_secs(120),
            ExerciseKind::Walking | ExerciseKind::ChairSit => Duration::from_secs(60),
        };
        Self {
            kind,
            user: user.into(),
            countdown: Duration::from_secs(5),
            time_budget,
            goal_reps: DEFAULT_GOAL_REPS,
            coin_cap: DEFAULT_COIN_CAP,
            bus: FrameBusConfig::default(),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// The time budget elapsed.
    TimeBudget,
    /// `stop()` or cancellation.
    Stopped,
    /// The coin cap was reached (hand sessions only).
    TargetReached,
    /// The pose source ended cleanly.
    SourceEnded,
    /// The pose source failed; partial totals were still flushed.
    Aborted,
}

/// Controls the classify task.
///
/// Supports restartability: each start() creates a fresh CancellationToken,
/// so stop() + start() works correctly. The running flag is cleared by the
/// task itself once the camera is released and totals are flushed, so
/// `is_running` going false means the session is fully finished.
pub struct SessionHandle {
    running: Arc<AtomicBool>,
    /// Protected by mutex to allow creating fresh tokens on restart.
    cancel_token: Mutex<CancellationToken>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request cancellation. Safe to call any number of times, before or
    /// after the session ends.
    pub fn stop(&self) {
        if let Ok(token) = self.cancel_token.lock() {
            token.cancel();
        }
    }

    /// Arm a fresh cancellation token and mark the session running.
    fn start(&self) -> (CancellationToken, Arc<AtomicBool>) {
        let new_token = CancellationToken::new();
        let child = new_token.child_token();

        if let Ok(mut token) = self.cancel_token.lock() {
            *token = new_token;
        }

        self.running.store(true, Ordering::Release);
        (child, Arc::clone(&self.running))
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns one exercise session at a time: spawns the capture pump and the
/// classify task, exposes the live snapshot, and flushes totals into the
/// profile store when the session ends for any reason.
pub struct SessionController {
    store: Arc<ProfileStore>,
    shared: SharedSession,
    handle: Arc<SessionHandle>,
    task: Mutex<Option<tokio::task::JoinHandle<SessionEnd>>>,
}

impl SessionController {
    pub fn new(store: Arc<ProfileStore>) -> Self {
        Self {
            store,
            shared: SharedSession::new(),
            handle: Arc::new(SessionHandle::new()),
            task: Mutex::new(None),
        }
    }

    /// Start a session for `config.user`. Must be called within a tokio
    /// runtime. Fails if a session is already active or the user is unknown.
    pub fn start(&self, config: SessionConfig, source: Box<dyn PoseSource>) -> Result<()> {
        if self.handle.is_running() {
            return Err(SessionError::AlreadyActive);
        }
        self.store.get_user(&config.user)?;

        if config.kind == ExerciseKind::Squat {
            if let Some(reduction) = self
                .store
                .apply_missed_day_penalty(&config.user, &today_string())?
            {
                tracing::info!(user = %config.user, reduction, "missed-day penalty applied");
            }
        }

        let (detector, coin_target) = build_session_detector(&config);
        self.shared.begin(config.kind, detector.status(), coin_target);

        let (cancel, running) = self.handle.start();
        let task = tokio::spawn(run_session(
            config,
            source,
            detector,
            self.shared.clone(),
            Arc::clone(&self.store),
            cancel,
            running,
        ));
        *self.task.lock().expect("session task mutex poisoned") = Some(task);
        Ok(())
    }

    /// Request the running session to stop. Idempotent; a no-op when no
    /// session is active.
    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_running()
    }

    /// Read-only copy of the live counters, for the render loop.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot()
    }

    /// Wait for the current session to finish and return how it ended.
    pub async fn wait(&self) -> Option<SessionEnd> {
        let task = self.task.lock().expect("session task mutex poisoned").take();
        match task {
            Some(task) => task.await.ok(),
            None => None,
        }
    }
}

fn build_session_detector(config: &SessionConfig) -> (Box<dyn MotionDetector>, Option<CoinTarget>) {
    match config.kind {
        ExerciseKind::Hand => {
            let detector = CoinReachDetector::new();
            let target = detector.target();
            (Box::new(detector), Some(target))
        }
        ExerciseKind::Squat => (Box::new(SquatDetector::new(config.goal_reps)), None),
        ExerciseKind::Walking => (Box::new(WalkingDetector::new()), None),
        ExerciseKind::ChairSit => (Box::new(ChairSitDetector::new()), None),
    }
}

fn today_string() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

async fn run_session(
    config: SessionConfig,
    source: Box<dyn PoseSource>,
    mut detector: Box<dyn MotionDetector>,
    shared: SharedSession,
    store: Arc<ProfileStore>,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
) -> SessionEnd {
    // The camera only goes live after the get-ready countdown.
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            running.store(false, Ordering::Release);
            tracing::info!("session cancelled during countdown");
            return SessionEnd::Stopped;
        }
        _ = tokio::time::sleep(config.countdown) => {}
    }

    let mut bus = FrameBus::with_config(config.bus.clone());
    let sender = bus.sender();
    let mut receiver = bus.take_receiver().expect("fresh bus has a receiver");
    // The capture thread must hold the only sender, so the bus closing is
    // what signals end-of-stream to the classify loop.
    drop(bus);

    let source_failed = Arc::new(AtomicBool::new(false));
    let capture = spawn_capture(source, sender, Arc::clone(&source_failed));

    let deadline = tokio::time::Instant::now() + config.time_budget;
    tracing::info!(kind = %config.kind, user = %config.user, "session started");

    let end = loop {
        let packet = tokio::select! {
            biased;
            _ = cancel.cancelled() => break SessionEnd::Stopped,
            _ = tokio::time::sleep_until(deadline) => break SessionEnd::TimeBudget,
            packet = receiver.recv() => packet,
        };

        let Some(packet) = packet else {
            break if source_failed.load(Ordering::Acquire) {
                SessionEnd::Aborted
            } else {
                SessionEnd::SourceEnded
            };
        };

        let events = detector.process(&packet.frame);
        shared.apply_frame(detector.status(), &events, config.goal_reps);

        if config.kind == ExerciseKind::Hand && detector.count() >= config.coin_cap {
            break SessionEnd::TargetReached;
        }
    };

    // Closing the bus tells the capture thread to drop the source; joining
    // it waits out any in-flight frame, so the camera is released exactly
    // once before totals are flushed.
    drop(receiver);
    let _ = tokio::task::spawn_blocking(move || capture.join()).await;

    let totals = SessionTotals::for_session(
        config.kind,
        today_string(),
        detector.count(),
        config.goal_reps,
    );
    if let Err(e) = store.record_session(&config.user, &totals) {
        tracing::error!(error = %e, user = %config.user, "failed to record session totals");
    }

    running.store(false, Ordering::Release);
    tracing::info!(
        ?end,
        count = totals.count,
        coins = totals.coins_earned,
        "session finished"
    );
    end
}

/// Pump frames from the pose source onto the bus at the source's native
/// rate. The thread owns the source; it exits when the source ends or fails
/// or when the bus closes, and the camera handle is released with it.
fn spawn_capture(
    mut source: Box<dyn PoseSource>,
    sender: FrameBusSender,
    source_failed: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut frames_read = 0u64;
        loop {
            match source.next_frame() {
                Ok(Some(frame)) => {
                    frames_read += 1;
                    // No person on this tick: nothing for the classifier.
                    // Still check for bus closure, or an empty scene would
                    // keep this thread spinning past the session's end.
                    if !frame.has_person() {
                        if sender.is_closed() {
                            tracing::debug!(frames_read, "frame bus closed, stopping capture");
                            break;
                        }
                        continue;
                    }
                    let ts_ms = chrono::Utc::now().timestamp_millis();
                    if !sender.send(ts_ms, frame) && sender.is_closed() {
                        tracing::debug!(frames_read, "frame bus closed, stopping capture");
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!(frames_read, "pose source ended");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "pose source failed, aborting capture");
                    source_failed.store(true, Ordering::Release);
                    break;
                }
            }
        }
    })
}
