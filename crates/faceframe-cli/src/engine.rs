use faceframe_core::{
    capture, CaptureError, CaptureSettings, CapturedImage, FrameReport, GuidanceSession,
    LandmarkSource,
};
use faceframe_hw::FrameFeed;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};

/// Pause after a failed frame read before trying again.
const FEED_RETRY_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("no frame received from the camera yet")]
    NoFrameYet,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Latest processed frame, published after every iteration of the loop.
#[derive(Clone)]
pub struct LiveFrame {
    pub report: FrameReport,
    pub image: Arc<RgbImage>,
}

/// Messages sent from the UI side to the engine thread.
enum EngineRequest {
    Capture {
        settings: CaptureSettings,
        reply: oneshot::Sender<Result<CapturedImage, EngineError>>,
    },
}

/// Handle to the frame loop. Dropping it stops the loop.
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    frames: watch::Receiver<Option<LiveFrame>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Receiver that wakes on every published frame. Holds `None` until the
    /// first frame has been processed.
    pub fn subscribe(&self) -> watch::Receiver<Option<LiveFrame>> {
        self.frames.clone()
    }

    pub fn latest(&self) -> Option<LiveFrame> {
        self.frames.borrow().clone()
    }

    /// Encode the most recent raw frame. Independent of the current guidance.
    pub async fn capture(&self, settings: CaptureSettings) -> Result<CapturedImage, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Capture {
                settings,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Stop the loop and wait for the thread to release the camera.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Spawn the frame loop on a dedicated OS thread.
///
/// Each iteration serves pending capture requests, pulls one frame from
/// `feed`, runs it through `session` and publishes the report. Feed errors
/// are logged and retried; the loop ends when the feed is exhausted, the
/// handle is shut down, or the handle is dropped.
///
/// The stop flag is only checked between reads, so `feed` must return
/// within a bounded time. [`faceframe_hw::Camera`] gives up after its frame
/// timeout with a transient error.
pub fn spawn_engine<F, S>(mut feed: F, mut session: GuidanceSession<S>) -> Result<EngineHandle, EngineError>
where
    F: FrameFeed + Send + 'static,
    S: LandmarkSource + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);
    let (frames_tx, frames_rx) = watch::channel::<Option<LiveFrame>>(None);
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let thread = std::thread::Builder::new()
        .name("faceframe-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            let mut latest: Option<Arc<RgbImage>> = None;
            let mut feed_errors = 0u64;

            'frames: while !thread_stop.load(Ordering::Relaxed) {
                loop {
                    match rx.try_recv() {
                        Ok(EngineRequest::Capture { settings, reply }) => {
                            let _ = reply.send(run_capture(latest.as_deref(), &settings));
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => break 'frames,
                    }
                }

                let frame = match feed.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        tracing::info!("frame feed ended");
                        break;
                    }
                    Err(e) if e.is_transient() => {
                        tracing::debug!(error = %e, "no frame yet");
                        continue;
                    }
                    Err(e) => {
                        feed_errors += 1;
                        tracing::warn!(error = %e, errors = feed_errors, "frame read failed");
                        std::thread::sleep(FEED_RETRY_BACKOFF);
                        continue;
                    }
                };
                let sequence = frame.sequence;
                let image = match frame.into_rgb_image() {
                    Ok(image) => image,
                    Err(e) => {
                        tracing::warn!(error = %e, sequence, "dropping malformed frame");
                        continue;
                    }
                };

                let report = session.process(&image);
                let image = Arc::new(image);
                latest = Some(Arc::clone(&image));
                frames_tx.send_replace(Some(LiveFrame { report, image }));
            }

            session.into_source();
            tracing::info!(feed_errors, "engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle {
        tx,
        frames: frames_rx,
        stop,
        thread: Some(thread),
    })
}

fn run_capture(
    latest: Option<&RgbImage>,
    settings: &CaptureSettings,
) -> Result<CapturedImage, EngineError> {
    let frame = latest.ok_or(EngineError::NoFrameYet)?;
    let shot = capture(frame, settings)?;
    tracing::info!(
        width = shot.width,
        height = shot.height,
        bytes = shot.jpeg.len(),
        mirrored = settings.mirrored(),
        brightness = settings.brightness_percent(),
        "frame captured"
    );
    Ok(shot)
}
