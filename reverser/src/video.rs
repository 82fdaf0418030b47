/*!
    The video branch: draw reversed frames and encode them.
*/

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, info_span, warn};

use media_encode::{EncoderPreset, VideoEncoder, VideoEncoderConfig};
use media_types::{Codec, CodecEvent, EncodedSample, FeedStatus, VideoFrame};

use crate::clock::{self, PresentationClock};
use crate::compositor::{Compositor, FrameProducer, ReverseDrawer, Surface};
use crate::frames::FrameSource;
use crate::track::{SampleSink, TrackWriter};
use crate::{CancelFlag, Pacing, Result, SourceProfile};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Encoding,
    Draining,
    Finalized,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoReport {
    pub frames_produced: u64,
    pub samples_written: u64,
    /// Position of the last produced frame.
    pub last_position: i64,
    /// Frames drawn blank because no source frame was found.
    pub blank_frames: u64,
}

/**
    Drives one encoder from a [`FrameProducer`], usually a [`Compositor`],
    to completion.

    Each iteration first drains one encoder output. Only when the encoder
    has nothing ready is a new frame drawn and submitted, so at most one
    submission is in flight at a time. Once the draw callback declines to
    continue, end of input is signalled and output is drained until the
    encoder reports end of stream.

    Whatever way the loop ends, the compositor, encoder and sink are
    released in that order.
*/
pub struct VideoEncoderLoop<P, E, S, C> {
    compositor: P,
    encoder: E,
    sink: S,
    clock: C,
    timeout: Duration,
    state: LoopState,
}

impl<P, E, S, C> VideoEncoderLoop<P, E, S, C>
where
    P: FrameProducer,
    E: Codec<Input = VideoFrame, Output = EncodedSample>,
    S: SampleSink,
    C: PresentationClock,
{
    pub fn new(compositor: P, encoder: E, sink: S, clock: C, timeout: Duration) -> Self {
        Self {
            compositor,
            encoder,
            sink,
            clock,
            timeout,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /**
        Run to completion. `draw` paints the frame at the given position and
        returns whether another frame should follow.
    */
    pub fn run<F>(mut self, mut draw: F, cancel: &CancelFlag) -> Result<VideoReport>
    where
        F: FnMut(&mut Surface, i64) -> Result<bool>,
    {
        let mut report = VideoReport::default();
        let result = self.drive(&mut draw, cancel, &mut report);
        let closed = self.teardown();

        match (result, closed) {
            (Ok(()), Ok(written)) => {
                report.samples_written = written;
                Ok(report)
            }
            (Err(e), closed) => {
                if let Err(cleanup) = closed {
                    warn!(error = %cleanup, "video output cleanup failed after error");
                }
                Err(e)
            }
            (Ok(()), Err(e)) => Err(e),
        }
    }

    fn drive<F>(
        &mut self,
        draw: &mut F,
        cancel: &CancelFlag,
        report: &mut VideoReport,
    ) -> Result<()>
    where
        F: FnMut(&mut Surface, i64) -> Result<bool>,
    {
        self.encoder.start()?;
        self.state = LoopState::Encoding;

        loop {
            cancel.check()?;

            if self.drain_one()? {
                continue;
            }
            if self.state != LoopState::Encoding {
                if self.state == LoopState::Finalized {
                    return Ok(());
                }
                continue;
            }

            let position = self.clock.next_position();
            let produced = self
                .compositor
                .produce_frame(position, |surface, position| draw(surface, position))?;
            report.frames_produced += 1;
            report.last_position = position;

            while self.encoder.feed(&produced.frame)? == FeedStatus::Busy {
                cancel.check()?;
                self.drain_one()?;
            }

            if !produced.more {
                debug!(
                    frames = report.frames_produced,
                    position,
                    "drawing finished, draining encoder"
                );
                self.encoder.signal_end_of_input()?;
                self.state = LoopState::Draining;
            }
        }
    }

    /// Returns true when the encoder produced something.
    fn drain_one(&mut self) -> Result<bool> {
        match self.encoder.poll(self.timeout)? {
            CodecEvent::FormatChanged(format) => self.sink.register(&format)?,
            CodecEvent::Sample(sample) => self.sink.write(&sample)?,
            CodecEvent::TryAgain => return Ok(false),
            CodecEvent::EndOfStream => {
                self.state = LoopState::Finalized;
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn teardown(&mut self) -> Result<u64> {
        self.compositor.release();
        if let Err(e) = self.encoder.stop() {
            debug!(error = %e, "video encoder stop failed");
        }
        self.encoder.release();
        self.sink.close()
    }
}

/**
    Settings of one video branch run.
*/
#[derive(Clone, Debug)]
pub struct VideoJob<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub profile: &'a SourceProfile,
    pub pacing: Pacing,
    pub frame_cache: usize,
    pub progress_bar: bool,
    pub timeout: Duration,
}

/**
    Produce a single-track container holding the source video reversed.
*/
pub fn reverse_video(job: &VideoJob<'_>, cancel: &CancelFlag) -> Result<VideoReport> {
    let _span = info_span!("video").entered();
    let profile = job.profile;
    info!(
        input = %job.input.display(),
        width = profile.width,
        height = profile.height,
        fps = profile.frame_rate.to_f64(),
        "reversing video"
    );

    let frames = FrameSource::open(job.input, profile.width, profile.height, job.frame_cache)?;
    let mut drawer = ReverseDrawer::new(frames, profile.duration_micros())
        .with_progress_bar(job.progress_bar);

    let encoder = VideoEncoder::new(
        VideoEncoderConfig::h264(profile.width, profile.height, profile.frame_rate)
            .with_bit_rate(profile.video_bit_rate)
            .with_keyframe_interval(Duration::from_secs(1))
            .with_preset(EncoderPreset::Veryfast),
    )?;
    let compositor = Compositor::new(profile.width, profile.height)?;
    let sink = TrackWriter::create(job.output)?;
    let clock = clock::for_pacing(job.pacing, profile.frame_rate);

    let mut report = VideoEncoderLoop::new(compositor, encoder, sink, clock, job.timeout)
        .run(|surface, position| drawer.draw(surface, position), cancel)?;
    report.blank_frames = drawer.unavailable();

    info!(
        frames = report.frames_produced,
        samples = report.samples_written,
        blank = report.blank_frames,
        "video reversed"
    );
    Ok(report)
}
