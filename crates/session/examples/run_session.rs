//! Example: run a scripted squat session and watch the live counters.
//!
//! Run with: cargo run -p fitquest-session --example run_session

use std::sync::Arc;
use std::time::Duration;

use fitquest_detect::ExerciseKind;
use fitquest_pose::{Joint, Landmark, LandmarkFrame, ReplaySource};
use fitquest_profile::ProfileStore;
use fitquest_session::{SessionConfig, SessionController};

/// Frame with both knees at the given flexion angle.
fn squat_frame(angle_deg: f32) -> LandmarkFrame {
    let mut frame = LandmarkFrame::empty(640, 480);
    for (knee_x, hip, knee, ankle) in [
        (0.35, Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle),
        (0.65, Joint::RightHip, Joint::RightKnee, Joint::RightAnkle),
    ] {
        frame.set_joint(hip, Landmark::new(knee_x, 0.3, 0.95));
        frame.set_joint(knee, Landmark::new(knee_x, 0.5, 0.95));
        let bearing = (angle_deg - 90.0).to_radians();
        frame.set_joint(
            ankle,
            Landmark::new(knee_x + 0.2 * bearing.cos(), 0.5 + 0.2 * bearing.sin(), 0.95),
        );
    }
    frame
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter("fitquest=debug,info")
        .init();

    let store = Arc::new(ProfileStore::open_in_memory()?);
    store.create_user("demo", 30)?;

    let controller = SessionController::new(Arc::clone(&store));

    let mut config = SessionConfig::for_kind(ExerciseKind::Squat, "demo");
    config.countdown = Duration::from_secs(1);
    config.time_budget = Duration::from_secs(15);

    // Script six squat reps at roughly camera rate.
    let mut frames = Vec::new();
    for _ in 0..6 {
        frames.extend(std::iter::repeat_with(|| squat_frame(150.0)).take(10));
        frames.extend(std::iter::repeat_with(|| squat_frame(85.0)).take(10));
    }
    frames.extend(std::iter::repeat_with(|| squat_frame(150.0)).take(10));
    let source = ReplaySource::new(frames).with_frame_delay(Duration::from_millis(33));

    controller.start(config, Box::new(source))?;
    println!("Session started. Get ready...\n");

    // Render loop: read the shared counters on a fixed display tick.
    while controller.is_active() {
        let s = controller.snapshot();
        println!(
            "[{}] {:14} | reps: {:2} | progress: {}",
            chrono::Local::now().format("%H:%M:%S"),
            s.status,
            s.count,
            s.progress_percent
                .map(|p| format!("{p:.0}%"))
                .unwrap_or_else(|| "-".into()),
        );
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let end = controller.wait().await;
    let user = store.get_user("demo")?;
    println!(
        "\nSession over ({end:?}): {} coins, {:.0}% progress",
        user.coins, user.progress
    );
    Ok(())
}
