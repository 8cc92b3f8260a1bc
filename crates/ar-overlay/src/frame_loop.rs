//! The capture → detect → composite → display loop.

use crate::{AssetLibrary, Compositor, FrameSink, FrameSource};
use ar_overlay_aruco::{draw_detections, MarkerDetector};
use image::RgbImage;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Cooperative cancellation flag, checked once per frame.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The stop handle was set.
    Cancelled,
    /// The sink asked to quit.
    QuitRequested,
    /// The source ran out of frames.
    EndOfStream,
    CaptureFailed(String),
    DisplayFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::QuitRequested => f.write_str("quit requested"),
            Self::EndOfStream => f.write_str("end of stream"),
            Self::CaptureFailed(e) => write!(f, "capture failed: {e}"),
            Self::DisplayFailed(e) => write!(f, "display failed: {e}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

/// What happened to one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub detections: usize,
    pub composited: usize,
    /// Detections whose id has no asset.
    pub unknown_ids: usize,
    pub composite_failures: usize,
}

/// Totals over a whole run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: usize,
    pub composited: usize,
    pub unknown_ids: usize,
    pub composite_failures: usize,
    pub reason: StopReason,
}

impl fmt::Display for LoopSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} markers composited, {} unknown ids, {} failures ({})",
            self.frames, self.composited, self.unknown_ids, self.composite_failures, self.reason
        )
    }
}

/// Detect markers in `frame` and composite the asset of every known id,
/// in detection order, onto the same frame.
///
/// Detections without an asset are skipped; a failed composite is logged and
/// the remaining detections are still processed.
pub fn augment_frame<D: MarkerDetector + ?Sized>(
    frame: &mut RgbImage,
    detector: &mut D,
    assets: &AssetLibrary,
    compositor: &Compositor,
    draw_outlines: bool,
) -> FrameReport {
    let detections = detector.detect(frame);
    let mut report = FrameReport {
        detections: detections.len(),
        ..FrameReport::default()
    };
    if draw_outlines {
        draw_detections(frame, &detections);
    }

    for det in &detections {
        let Some(asset) = assets.get(det.id) else {
            log::debug!("marker {} has no asset", det.id);
            report.unknown_ids += 1;
            continue;
        };
        match compositor.composite(frame, &det.quad, det.id, asset) {
            Ok(()) => report.composited += 1,
            Err(e) => {
                log::warn!("marker {}: {e}", det.id);
                report.composite_failures += 1;
            }
        }
    }
    report
}

/// Pulls frames from a source until it ends, the sink asks to quit, or the
/// stop handle is set.
pub struct FrameLoop<'a, S, D, K> {
    source: S,
    detector: D,
    assets: &'a AssetLibrary,
    compositor: Compositor,
    sink: K,
    stop: StopHandle,
    wait: Duration,
    draw_outlines: bool,
    state: LoopState,
}

impl<'a, S, D, K> FrameLoop<'a, S, D, K>
where
    S: FrameSource,
    D: MarkerDetector,
    K: FrameSink,
{
    pub fn new(
        source: S,
        detector: D,
        assets: &'a AssetLibrary,
        compositor: Compositor,
        sink: K,
    ) -> Self {
        Self {
            source,
            detector,
            assets,
            compositor,
            sink,
            stop: StopHandle::new(),
            wait: Duration::ZERO,
            draw_outlines: false,
            state: LoopState::Running,
        }
    }

    /// How long the sink may wait for a quit request after each frame.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_outlines(mut self, draw: bool) -> Self {
        self.draw_outlines = draw;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Run one frame through detection and compositing.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn process_frame(&mut self, frame: &mut RgbImage) -> FrameReport {
        augment_frame(
            frame,
            &mut self.detector,
            self.assets,
            &self.compositor,
            self.draw_outlines,
        )
    }

    pub fn run(&mut self) -> LoopSummary {
        self.state = LoopState::Running;
        let mut summary = LoopSummary {
            frames: 0,
            composited: 0,
            unknown_ids: 0,
            composite_failures: 0,
            reason: StopReason::EndOfStream,
        };

        let reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Cancelled;
            }

            let mut frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::EndOfStream,
                Err(e) => {
                    log::error!("{e}");
                    break StopReason::CaptureFailed(e.to_string());
                }
            };

            let report = self.process_frame(&mut frame);
            log::debug!(
                "frame {}: {} detections, {} composited",
                summary.frames,
                report.detections,
                report.composited
            );
            summary.frames += 1;
            summary.composited += report.composited;
            summary.unknown_ids += report.unknown_ids;
            summary.composite_failures += report.composite_failures;

            if let Err(e) = self.sink.show(&frame) {
                log::error!("{e}");
                break StopReason::DisplayFailed(e.to_string());
            }
            if self.sink.poll_quit(self.wait) {
                break StopReason::QuitRequested;
            }
        };

        summary.reason = reason.clone();
        self.state = LoopState::Stopped(reason);
        log::info!("{summary}");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CaptureError, CollectSink, DisplayError, NullSink, VecSource};
    use ar_overlay_aruco::Detection;
    use ar_overlay_core::Quad;
    use image::Rgb;

    /// Reports the same detections for every frame.
    struct Fixed(Vec<Detection>);

    impl MarkerDetector for Fixed {
        fn detect(&mut self, _frame: &RgbImage) -> Vec<Detection> {
            self.0.clone()
        }
    }

    fn det(id: u32, quad: Quad) -> Detection {
        Detection {
            id,
            quad,
            hamming: 0,
        }
    }

    fn square() -> Quad {
        Quad::from_xy([[4.0, 4.0], [20.0, 4.0], [20.0, 20.0], [4.0, 20.0]])
    }

    fn frames(n: usize) -> VecSource {
        VecSource::new((0..n).map(|_| RgbImage::from_pixel(32, 32, Rgb([10, 10, 10]))))
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
            Err(CaptureError::ListDir {
                path: "cam".into(),
                source: std::io::Error::other("unplugged"),
            })
        }
    }

    struct FailingSink;

    impl FrameSink for FailingSink {
        fn show(&mut self, _frame: &RgbImage) -> Result<(), DisplayError> {
            Err(DisplayError::CreateDir {
                path: "win".into(),
                source: std::io::Error::other("closed"),
            })
        }
    }

    #[test]
    fn counts_known_unknown_and_failed() {
        let assets: AssetLibrary = [(1, RgbImage::from_pixel(4, 4, Rgb([0, 200, 0])))]
            .into_iter()
            .collect();
        let degenerate = Quad::from_xy([[1.0, 1.0], [1.0, 1.0], [9.0, 9.0], [1.0, 9.0]]);
        let detector = Fixed(vec![det(1, square()), det(2, square()), det(1, degenerate)]);

        let mut fl = FrameLoop::new(
            frames(3),
            detector,
            &assets,
            Compositor::without_label(),
            CollectSink::new(),
        );
        let summary = fl.run();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.composited, 3);
        assert_eq!(summary.unknown_ids, 3);
        assert_eq!(summary.composite_failures, 3);
        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(fl.state(), &LoopState::Stopped(StopReason::EndOfStream));

        let sink = fl.into_sink();
        assert_eq!(sink.frames.len(), 3);
        assert_eq!(sink.frames[0].get_pixel(10, 10).0, [0, 200, 0]);
        assert_eq!(sink.frames[0].get_pixel(28, 28).0, [10, 10, 10]);
    }

    #[test]
    fn stop_handle_cancels_before_next_frame() {
        let assets = AssetLibrary::new();
        let mut fl = FrameLoop::new(
            frames(5),
            Fixed(Vec::new()),
            &assets,
            Compositor::default(),
            NullSink,
        );
        fl.stop_handle().stop();
        let summary = fl.run();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.reason, StopReason::Cancelled);
    }

    #[test]
    fn sink_quit_stops_loop() {
        let assets = AssetLibrary::new();
        let mut fl = FrameLoop::new(
            frames(5),
            Fixed(Vec::new()),
            &assets,
            Compositor::default(),
            CollectSink::quit_after(2),
        );
        let summary = fl.run();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.reason, StopReason::QuitRequested);
    }

    #[test]
    fn capture_and_display_failures_end_cleanly() {
        let assets = AssetLibrary::new();
        let summary = FrameLoop::new(
            FailingSource,
            Fixed(Vec::new()),
            &assets,
            Compositor::default(),
            NullSink,
        )
        .run();
        assert!(matches!(summary.reason, StopReason::CaptureFailed(_)));
        assert_eq!(summary.frames, 0);

        let summary = FrameLoop::new(
            frames(2),
            Fixed(Vec::new()),
            &assets,
            Compositor::default(),
            FailingSink,
        )
        .run();
        assert!(matches!(summary.reason, StopReason::DisplayFailed(_)));
        assert_eq!(summary.frames, 1);
    }

    #[test]
    fn outlines_are_drawn_for_unknown_markers() {
        let assets = AssetLibrary::new();
        let mut detector = Fixed(vec![det(9, square())]);
        let mut frame = RgbImage::from_pixel(32, 32, Rgb([10, 10, 10]));
        let report = augment_frame(&mut frame, &mut detector, &assets, &Compositor::default(), true);
        assert_eq!(report.unknown_ids, 1);
        assert_ne!(frame.get_pixel(4, 12).0, [10, 10, 10]);
        assert_eq!(frame.get_pixel(12, 12).0, [10, 10, 10]);
    }
}
