use crate::{
    error::Result,
    frame::Frame,
    recorder::{Recorder, check_dimensions},
};
use std::path::PathBuf;

/// Keeps finalized traces in memory instead of encoding them.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    trace: Vec<Frame>,
    last_trace: Vec<Frame>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames of the most recently saved episode.
    pub fn last_trace(&self) -> &[Frame] {
        &self.last_trace
    }
}

impl Recorder for MemoryRecorder {
    fn capture(&mut self, frame: Frame) -> Result<()> {
        check_dimensions(&self.trace, &frame)?;
        self.trace.push(frame);
        Ok(())
    }

    fn save(&mut self) -> Result<Option<PathBuf>> {
        self.last_trace = std::mem::take(&mut self.trace);
        Ok(None)
    }

    fn discard(&mut self) {
        self.trace.clear();
    }

    fn frame_count(&self) -> usize {
        self.trace.len()
    }
}
