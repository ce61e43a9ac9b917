use envrig_core::{
    Error,
    frame::Frame,
    recorder::{
        Recorder,
        gif::{GifConfig, GifRecorder},
    },
};
use image::{AnimationDecoder, codecs::gif::GifDecoder};
use std::{fs::File, io::BufReader, path::Path};

fn decode(path: &Path) -> anyhow::Result<Vec<image::Frame>> {
    let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
    Ok(decoder.into_frames().collect_frames()?)
}

fn frame(shade: u8) -> Frame {
    Frame::filled(8, 6, [shade, 255 - shade, 64])
}

#[test]
fn saved_gif_holds_every_frame() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("episode.gif");
    let mut recorder = GifRecorder::new(&path, 4.)?;
    for idx in 0..6 {
        recorder.capture(frame(idx * 40))?;
    }
    assert_eq!(recorder.frame_count(), 6);

    let saved = recorder.save()?;
    assert_eq!(saved.as_deref(), Some(path.as_path()));
    assert_eq!(recorder.frame_count(), 0);

    let frames = decode(&path)?;
    assert_eq!(frames.len(), 6);
    let total_ms: f64 = frames
        .iter()
        .map(|f| {
            let (numer, denom) = f.delay().numer_denom_ms();
            numer as f64 / denom as f64
        })
        .sum();
    // 6 frames at 4 fps, gif delays are stored in centiseconds
    assert!((total_ms - 1500.).abs() <= 6. * 10.);
    assert_eq!(frames[0].buffer().dimensions(), (8, 6));

    let recording = recorder.last_recording().expect("recording metadata");
    assert_eq!(recording.frames, 6);
    assert_eq!(recording.duration.as_millis(), 1500);
    assert!(!dir.path().join("episode.gif.partial").exists());
    Ok(())
}

#[test]
fn empty_trace_is_a_no_op() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.gif");
    let mut recorder = GifRecorder::new(&path, 10.)?;
    assert_eq!(recorder.save()?, None);
    assert!(!path.exists());
    assert!(recorder.last_recording().is_none());
    Ok(())
}

#[test]
fn second_save_does_not_rewrite() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("once.gif");
    let mut recorder = GifRecorder::new(&path, 10.)?;
    recorder.capture(frame(0))?;
    assert!(recorder.save()?.is_some());
    assert_eq!(recorder.save()?, None);
    assert_eq!(decode(&path)?.len(), 1);
    Ok(())
}

#[test]
fn fps_must_be_positive() {
    for fps in [0., -1., f32::NAN, f32::INFINITY] {
        assert!(matches!(
            GifRecorder::new("x.gif", fps),
            Err(Error::Configuration(_))
        ));
    }
}

#[test]
fn frames_must_share_dimensions() -> anyhow::Result<()> {
    let mut recorder = GifRecorder::new("unused.gif", 10.)?;
    recorder.capture(frame(0))?;
    let res = recorder.capture(Frame::filled(4, 4, [0, 0, 0]));
    assert!(matches!(res, Err(Error::InvalidFrame(_))));
    assert_eq!(recorder.frame_count(), 1);
    Ok(())
}

#[test]
fn failed_write_leaves_nothing_behind() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("missing").join("episode.gif");
    let mut recorder = GifRecorder::new(&path, 10.)?;
    recorder.capture(frame(0))?;
    let res = recorder.save();
    assert!(matches!(res, Err(Error::RecorderFinalize { .. })));
    assert!(!path.exists());
    assert!(!dir.path().join("missing").join("episode.gif.partial").exists());
    assert_eq!(recorder.frame_count(), 0);
    Ok(())
}

#[test]
fn frame_cap_drops_the_tail() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config: GifConfig = serde_json::from_str(&format!(
        r#"{{ "filename": {:?}, "fps": 20.0, "max_frames": 3 }}"#,
        dir.path().join("capped.gif")
    ))?;
    let mut recorder = GifRecorder::from_config(config)?;
    for idx in 0..10 {
        recorder.capture(frame(idx))?;
    }
    assert_eq!(recorder.frame_count(), 3);
    let path = recorder.save()?.expect("artifact");
    assert_eq!(decode(&path)?.len(), 3);
    Ok(())
}
