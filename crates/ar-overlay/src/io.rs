//! Frame sources and sinks.
//!
//! Capture and display are collaborators the loop only talks to through
//! [`FrameSource`] and [`FrameSink`]. Image sequences on disk and in-memory
//! buffers are provided here; a camera or window backend plugs in by
//! implementing the same traits.

use image::RgbImage;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("cannot list frames in {}: {source}", path.display())]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode frame {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum DisplayError {
    #[error("cannot create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write frame {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Produces frames until the stream ends (`Ok(None)`) or capture fails.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError>;
}

/// Consumes finished frames.
pub trait FrameSink {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError>;

    /// Wait up to `wait` for a quit request; `true` ends the loop.
    fn poll_quit(&mut self, wait: Duration) -> bool {
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        false
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        (**self).next_frame()
    }
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        (**self).show(frame)
    }

    fn poll_quit(&mut self, wait: Duration) -> bool {
        (**self).poll_quit(wait)
    }
}

/// Image files of a directory, in file-name order.
#[derive(Clone, Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    looping: bool,
}

impl ImageSequenceSource {
    /// List the image files in `dir`. With `looping`, the sequence restarts
    /// after the last frame instead of ending.
    pub fn open(dir: impl AsRef<Path>, looping: bool) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let list_err = |source| CaptureError::ListDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(list_err)? {
            let path = entry.map_err(list_err)?.path();
            if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
                paths.push(path);
            }
        }
        paths.sort();

        log::info!("{} frames in {}", paths.len(), dir.display());
        Ok(Self::from_paths(paths, looping))
    }

    pub fn from_paths(paths: Vec<PathBuf>, looping: bool) -> Self {
        Self {
            paths,
            next: 0,
            looping,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        if self.next >= self.paths.len() {
            if !self.looping || self.paths.is_empty() {
                return Ok(None);
            }
            self.next = 0;
        }

        let path = &self.paths[self.next];
        self.next += 1;
        let img = image::open(path).map_err(|source| CaptureError::Decode {
            path: path.clone(),
            source,
        })?;
        Ok(Some(img.to_rgb8()))
    }
}

/// Frames held in memory.
#[derive(Clone, Debug, Default)]
pub struct VecSource {
    frames: VecDeque<RgbImage>,
}

impl VecSource {
    pub fn new(frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        Ok(self.frames.pop_front())
    }
}

/// Writes every frame as `frame_NNNNNN.png` into a directory.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: usize,
}

impl DirectorySink {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, DisplayError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| DisplayError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, written: 0 })
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl FrameSink for DirectorySink {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame.save(&path).map_err(|source| DisplayError::Write {
            path: path.clone(),
            source,
        })?;
        log::debug!("wrote {}", path.display());
        self.written += 1;
        Ok(())
    }
}

/// Discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn show(&mut self, _frame: &RgbImage) -> Result<(), DisplayError> {
        Ok(())
    }

    fn poll_quit(&mut self, _wait: Duration) -> bool {
        false
    }
}

/// Keeps every frame it is shown. Optionally asks to quit once it holds
/// `quit_after` frames.
#[derive(Clone, Debug, Default)]
pub struct CollectSink {
    pub frames: Vec<RgbImage>,
    pub quit_after: Option<usize>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quit_after(n: usize) -> Self {
        Self {
            frames: Vec::new(),
            quit_after: Some(n),
        }
    }
}

impl FrameSink for CollectSink {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn poll_quit(&mut self, _wait: Duration) -> bool {
        self.quit_after.is_some_and(|n| self.frames.len() >= n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frames(dir: &Path, names: &[&str]) {
        for (i, name) in names.iter().enumerate() {
            RgbImage::from_pixel(4, 3, Rgb([i as u8, 0, 0]))
                .save(dir.join(name))
                .expect("save frame");
        }
    }

    #[test]
    fn sequence_is_sorted_and_ends() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_frames(dir.path(), &["b.png", "a.png"]);
        fs::write(dir.path().join("notes.txt"), "skip me").expect("write");

        let mut src = ImageSequenceSource::open(dir.path(), false).expect("open");
        assert_eq!(src.len(), 2);
        // a.png was written second
        assert_eq!(src.next_frame().expect("frame").map(|f| f.get_pixel(0, 0)[0]), Some(1));
        assert_eq!(src.next_frame().expect("frame").map(|f| f.get_pixel(0, 0)[0]), Some(0));
        assert!(src.next_frame().expect("end").is_none());
    }

    #[test]
    fn looping_sequence_restarts() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_frames(dir.path(), &["0.png"]);
        let mut src = ImageSequenceSource::open(dir.path(), true).expect("open");
        for _ in 0..3 {
            assert!(src.next_frame().expect("frame").is_some());
        }
    }

    #[test]
    fn looping_empty_sequence_ends() {
        let mut src = ImageSequenceSource::from_paths(Vec::new(), true);
        assert!(src.next_frame().expect("end").is_none());
    }

    #[test]
    fn undecodable_frame_is_a_capture_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("broken.png"), b"not a png").expect("write");
        let mut src = ImageSequenceSource::open(dir.path(), false).expect("open");
        assert!(matches!(
            src.next_frame(),
            Err(CaptureError::Decode { .. })
        ));
    }

    #[test]
    fn directory_sink_numbers_frames() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out");
        let mut sink = DirectorySink::create(&out).expect("sink");
        let frame = RgbImage::new(2, 2);
        sink.show(&frame).expect("show");
        sink.show(&frame).expect("show");
        assert_eq!(sink.written(), 2);
        assert!(out.join("frame_000000.png").is_file());
        assert!(out.join("frame_000001.png").is_file());
    }

    #[test]
    fn collect_sink_requests_quit() {
        let mut sink = CollectSink::quit_after(1);
        assert!(!sink.poll_quit(Duration::ZERO));
        sink.show(&RgbImage::new(1, 1)).expect("show");
        assert!(sink.poll_quit(Duration::ZERO));
    }
}
