pub mod gif;
pub mod memory;

use crate::{
    error::{Error, Result},
    frame::Frame,
};
use enum_dispatch::enum_dispatch;
use gif::GifRecorder;
use memory::MemoryRecorder;
use std::path::PathBuf;

/// Accumulates the frames of one episode and turns them into an artifact when the episode ends.
#[enum_dispatch]
pub trait Recorder {
    fn capture(&mut self, frame: Frame) -> Result<()>;

    /// Finalizes the current trace and empties it. Returns the path of the written artifact, or
    /// `None` when nothing was written (no frames were captured).
    fn save(&mut self) -> Result<Option<PathBuf>>;

    /// Drops the current trace without writing anything.
    fn discard(&mut self);

    fn frame_count(&self) -> usize;
}

#[enum_dispatch(Recorder)]
pub enum RecorderKind {
    Gif(GifRecorder),
    Memory(MemoryRecorder),
}

// all frames of a trace share the dimensions of the first one
fn check_dimensions(trace: &[Frame], frame: &Frame) -> Result<()> {
    if let Some(first) = trace.first() {
        if first.dimensions() != frame.dimensions() {
            return Err(Error::InvalidFrame(format!(
                "frame of {:?} does not match the trace's {:?}",
                frame.dimensions(),
                first.dimensions()
            )));
        }
    }
    Ok(())
}
