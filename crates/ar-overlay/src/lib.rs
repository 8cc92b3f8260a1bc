//! Replace square fiducial markers in video frames with images.
//!
//! Each frame goes through the same steps: find markers with a
//! [`MarkerDetector`](aruco::MarkerDetector), look up the image stored for
//! each marker id in an [`AssetLibrary`], and let the [`Compositor`] warp that
//! image onto the marker's four corners. [`FrameLoop`] drives this over a
//! [`FrameSource`] and hands every frame to a [`FrameSink`].
//!
//! ## Quickstart
//!
//! ```no_run
//! use ar_overlay::aruco::{Dictionary, QuadDetector, QuadDetectorParams};
//! use ar_overlay::{load_assets, Compositor, DirectorySink, FrameLoop, ImageSequenceSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dict = Dictionary::load_json("codebook.json")?;
//! let detector = QuadDetector::new(dict, QuadDetectorParams::default())?;
//! let assets = load_assets("markers")?;
//! let source = ImageSequenceSource::open("frames", false)?;
//! let sink = DirectorySink::create("out")?;
//!
//! let mut frame_loop = FrameLoop::new(source, detector, &assets, Compositor::default(), sink);
//! let summary = frame_loop.run();
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `ar_overlay::core`: quads, homographies, warping primitives.
//! - `ar_overlay::aruco`: dictionaries and the marker detector.
//! - [`assets`], [`compositor`], [`frame_loop`], [`io`], [`config`]: the
//!   overlay pipeline itself.

pub use ar_overlay_aruco as aruco;
pub use ar_overlay_core as core;

pub mod assets;
pub mod compositor;
pub mod config;
pub mod frame_loop;
pub mod io;
mod label;

pub use assets::{load_assets, AssetError, AssetLibrary, SkippedAsset};
pub use compositor::{CompositeError, Compositor, LabelStyle};
pub use config::{ConfigError, DictionarySelection, OverlayConfig};
pub use frame_loop::{
    augment_frame, FrameLoop, FrameReport, LoopState, LoopSummary, StopHandle, StopReason,
};
pub use io::{
    CaptureError, CollectSink, DirectorySink, DisplayError, FrameSink, FrameSource,
    ImageSequenceSource, NullSink, VecSource,
};

pub use ar_overlay_aruco::{Detection, MarkerDetector, MarkerId};
pub use ar_overlay_core::Quad;
