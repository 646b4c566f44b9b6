//! Shared session state between the classify task and the render side.
//!
//! One mutex guards everything a frame can change, so a counter increment
//! and its paired progress recomputation are observed together or not at
//! all. The classify task is the sole writer; readers only ever take a
//! [`SessionSnapshot`] copy, so the critical section stays a handful of
//! field writes per frame.

use serde::Serialize;
use std::sync::{Arc, Mutex};

use fitquest_detect::{CoinTarget, ExerciseKind, MotionEvent};

/// Read-only copy of the live counters for the render loop.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub kind: Option<ExerciseKind>,
    /// The active exercise's running count (reps, bursts, sits or coins).
    pub count: u32,
    /// Detector state label ("Squatting", "Calibrating...", ...).
    pub status: String,
    /// Squat goal progress; absent for other exercises.
    pub progress_percent: Option<f32>,
    /// The live coin target during hand sessions.
    pub coin_target: Option<CoinTarget>,
    pub frames_processed: u64,
}

#[derive(Debug, Default)]
struct SessionFields {
    kind: Option<ExerciseKind>,
    count: u32,
    status: String,
    progress_percent: Option<f32>,
    coin_target: Option<CoinTarget>,
    frames_processed: u64,
}

/// Handle to the shared session state. Clones share the same record.
#[derive(Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionFields>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the record for a fresh session.
    pub fn begin(&self, kind: ExerciseKind, status: &str, coin_target: Option<CoinTarget>) {
        let mut fields = self.inner.lock().expect("session state mutex poisoned");
        *fields = SessionFields {
            kind: Some(kind),
            status: status.to_string(),
            coin_target,
            ..SessionFields::default()
        };
    }

    /// Apply one processed frame: the detector's state label plus whatever
    /// events fired. Counter and progress land under the same lock hold.
    pub fn apply_frame(&self, status: &str, events: &[MotionEvent], goal_reps: u32) {
        let mut fields = self.inner.lock().expect("session state mutex poisoned");
        fields.frames_processed += 1;
        if fields.status != status {
            fields.status.clear();
            fields.status.push_str(status);
        }

        for event in events {
            match event {
                MotionEvent::RepCompleted { total } => {
                    fields.count = *total;
                    fields.progress_percent =
                        Some((*total as f32 * 100.0 / goal_reps.max(1) as f32).min(100.0));
                }
                MotionEvent::BurstStarted { total }
                | MotionEvent::SitCompleted { total } => {
                    fields.count = *total;
                }
                MotionEvent::CoinCollected { total, next } => {
                    fields.count = *total;
                    fields.coin_target = Some(*next);
                }
                MotionEvent::CalibrationCompleted => {}
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let fields = self.inner.lock().expect("session state mutex poisoned");
        SessionSnapshot {
            kind: fields.kind,
            count: fields.count,
            status: fields.status.clone(),
            progress_percent: fields.progress_percent,
            coin_target: fields.coin_target,
            frames_processed: fields.frames_processed,
        }
    }
}
