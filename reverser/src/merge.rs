/*!
    Combining the two reversed tracks into one container.
*/

use std::path::Path;

use tracing::info;

use media_sink::Muxer;
use media_source::Extractor;
use media_types::{EncodedSample, TrackKind};

use crate::{CancelFlag, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub video_samples: u64,
    pub audio_samples: u64,
}

/// One single-track input and the muxer track it is copied to.
struct Input {
    extractor: Extractor,
    track: usize,
    next: Option<EncodedSample>,
}

impl Input {
    fn open(path: &Path, kind: TrackKind, muxer: &mut Muxer) -> Result<Self> {
        let extractor = Extractor::open_track(path, kind)?;
        let track = muxer.add_track(extractor.descriptor())?;
        Ok(Self {
            extractor,
            track,
            next: None,
        })
    }

    fn peek(&mut self) -> Result<Option<i64>> {
        if self.next.is_none() {
            self.next = self.extractor.read_sample()?;
        }
        Ok(self.next.as_ref().map(EncodedSample::decode_micros))
    }
}

/**
    Copy every sample of a single-track audio container and a single-track
    video container into a new container at `output`.

    Timestamps and flags are carried over unchanged. Samples are written in
    decode-time order across the two tracks; the output is finalized only
    once both inputs are exhausted.
*/
pub fn merge_tracks(
    audio: &Path,
    video: &Path,
    output: &Path,
    cancel: &CancelFlag,
) -> Result<MergeReport> {
    let mut muxer = Muxer::create(output)?;
    let mut video_input = Input::open(video, TrackKind::Video, &mut muxer)?;
    let mut audio_input = Input::open(audio, TrackKind::Audio, &mut muxer)?;
    muxer.start()?;

    loop {
        cancel.check()?;
        let input = match (video_input.peek()?, audio_input.peek()?) {
            (None, None) => break,
            (Some(_), None) => &mut video_input,
            (None, Some(_)) => &mut audio_input,
            (Some(v), Some(a)) if v <= a => &mut video_input,
            (Some(_), Some(_)) => &mut audio_input,
        };
        if let Some(sample) = input.next.take() {
            muxer.write_sample(input.track, &sample)?;
        }
    }

    let stats = muxer.finalize()?;
    let report = MergeReport {
        video_samples: stats.samples.get(video_input.track).copied().unwrap_or_default(),
        audio_samples: stats.samples.get(audio_input.track).copied().unwrap_or_default(),
    };
    info!(
        output = %output.display(),
        video = report.video_samples,
        audio = report.audio_samples,
        "merged reversed tracks"
    );
    Ok(report)
}
