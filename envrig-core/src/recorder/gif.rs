use crate::{
    error::{Error, Result},
    frame::Frame,
    recorder::{Recorder, check_dimensions},
};
use image::{
    Delay, DynamicImage, Frame as ImageFrame, ImageResult,
    codecs::gif::{GifEncoder, Repeat},
};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

// NeuQuant sampling factor, 1 is the slowest and best, 30 the fastest
const QUANTIZER_SPEED: i32 = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GifConfig {
    pub filename: PathBuf,
    pub fps: f32,
    #[serde(default)]
    pub max_frames: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub path: PathBuf,
    pub frames: usize,
    pub duration: Duration,
}

/// Encodes every captured episode as a looping animated GIF.
///
/// Saving an empty trace is a no-op: nothing is written and `save` returns `Ok(None)`. Writes go
/// to a sibling `*.partial` file that is renamed over `filename` once complete, so a failed save
/// never leaves a truncated artifact behind.
#[derive(Debug)]
pub struct GifRecorder {
    filename: PathBuf,
    fps: f32,
    max_frames: Option<usize>,
    trace: Vec<Frame>,
    dropped: usize,
    last_recording: Option<Recording>,
}

impl GifRecorder {
    pub fn new(filename: impl Into<PathBuf>, fps: f32) -> Result<Self> {
        if !fps.is_finite() || fps <= 0. {
            return Err(Error::configuration(format!(
                "fps must be a positive number, got {fps}"
            )));
        }
        Ok(Self {
            filename: filename.into(),
            fps,
            max_frames: None,
            trace: vec![],
            dropped: 0,
            last_recording: None,
        })
    }

    pub fn from_config(config: GifConfig) -> Result<Self> {
        let recorder = Self::new(config.filename, config.fps)?;
        Ok(recorder.with_max_frames(config.max_frames))
    }

    /// Caps the number of frames kept per episode. Later frames are dropped.
    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Target of the next `save`, e.g. to give every episode its own file.
    pub fn set_filename(&mut self, filename: impl Into<PathBuf>) {
        self.filename = filename.into();
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn frame_delay(&self) -> Duration {
        Duration::from_secs_f64(1. / self.fps as f64)
    }

    pub fn last_recording(&self) -> Option<&Recording> {
        self.last_recording.as_ref()
    }

    fn partial_path(&self) -> PathBuf {
        let mut name = self.filename.as_os_str().to_owned();
        name.push(".partial");
        PathBuf::from(name)
    }

    fn finalize_error(&self, source: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::RecorderFinalize {
            path: self.filename.clone(),
            source: Box::new(source),
        }
    }

    fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        let partial = self.partial_path();
        let res = fs::write(&partial, bytes).and_then(|_| fs::rename(&partial, &self.filename));
        if res.is_err() {
            // the partial file may or may not exist at this point
            let _ = fs::remove_file(&partial);
        }
        res
    }
}

fn encode_gif(frames: Vec<Frame>, delay: Delay) -> ImageResult<Vec<u8>> {
    let mut bytes = vec![];
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, QUANTIZER_SPEED);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(frames.into_iter().map(|frame| {
            let rgba = DynamicImage::ImageRgb8(frame.into_image()).into_rgba8();
            ImageFrame::from_parts(rgba, 0, 0, delay)
        }))?;
    }
    Ok(bytes)
}

impl Recorder for GifRecorder {
    fn capture(&mut self, frame: Frame) -> Result<()> {
        check_dimensions(&self.trace, &frame)?;
        if self.max_frames.is_some_and(|max| self.trace.len() >= max) {
            if self.dropped == 0 {
                tracing::warn!(
                    max_frames = self.trace.len(),
                    "frame cap reached, dropping the rest of the episode"
                );
            }
            self.dropped += 1;
            return Ok(());
        }
        self.trace.push(frame);
        Ok(())
    }

    fn save(&mut self) -> Result<Option<PathBuf>> {
        let dropped = std::mem::take(&mut self.dropped);
        if self.trace.is_empty() {
            tracing::debug!(path = %self.filename.display(), "no frames captured, nothing to save");
            return Ok(None);
        }
        let frames = std::mem::take(&mut self.trace);
        let n_frames = frames.len();
        let delay = Delay::from_saturating_duration(self.frame_delay());
        let bytes = encode_gif(frames, delay).map_err(|err| self.finalize_error(err))?;
        self.write_atomically(&bytes)
            .map_err(|err| self.finalize_error(err))?;
        let recording = Recording {
            path: self.filename.clone(),
            frames: n_frames,
            duration: self.frame_delay() * n_frames as u32,
        };
        tracing::info!(
            path = %recording.path.display(),
            frames = n_frames,
            dropped,
            "saved recording"
        );
        self.last_recording = Some(recording);
        Ok(Some(self.filename.clone()))
    }

    fn discard(&mut self) {
        self.trace.clear();
        self.dropped = 0;
    }

    fn frame_count(&self) -> usize {
        self.trace.len()
    }
}
