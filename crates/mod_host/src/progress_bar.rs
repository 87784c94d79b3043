//! Preload progress bar: raw progress in, smoothed bar out.

use mod_loader::{ProgressSink, SmoothedProgress};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

const FRAME: Duration = Duration::from_millis(16);
const WIDTH: usize = 30;

/// Forwards raw progress reports to the renderer task.
pub struct ProgressBar {
    tx: watch::Sender<f32>,
}

impl ProgressBar {
    pub fn new() -> (Self, watch::Receiver<f32>) {
        let (tx, rx) = watch::channel(0.0);
        (Self { tx }, rx)
    }
}

impl ProgressSink for ProgressBar {
    fn report(&self, progress: f32) {
        self.tx.send_replace(progress);
    }
}

/// Animates the bar until the smoothed value reaches 100%, or until the
/// sending side goes away.
pub fn spawn_renderer(mut rx: watch::Receiver<f32>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut smoothed = SmoothedProgress::default();
        let mut frames = interval(FRAME);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_frame = Instant::now();
        let mut last_percent = None;

        loop {
            frames.tick().await;
            let now = Instant::now();
            smoothed.command(*rx.borrow_and_update());
            let shown = smoothed.tick(now - last_frame);
            last_frame = now;

            let percent = percent(shown);
            if last_percent != Some(percent) {
                debug!("Preloading {}", render(shown));
                last_percent = Some(percent);
            }
            if percent >= 100 {
                info!("📦 Preloading {}", render(1.0));
                break;
            }
            if rx.has_changed().is_err() {
                break;
            }
        }
    })
}

fn percent(progress: f32) -> u32 {
    (progress.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// `[#######.......]  50%`
pub fn render(progress: f32) -> String {
    let filled = (progress.clamp(0.0, 1.0) * WIDTH as f32).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(WIDTH - filled),
        percent(progress)
    )
}
