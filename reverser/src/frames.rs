/*!
    Nearest-frame access to a source video.
*/

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, trace};

use media_decode::VideoDecoder;
use media_source::Extractor;
use media_transform::{ScaleTarget, Scaler};
use media_types::{
    Codec, CodecEvent, EncodedSample, Error as MediaError, FeedStatus, PixelFormat, TrackKind,
    VideoFrame,
};

use crate::Result;

const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/**
    Looks up the frame shown at a point in time.
*/
pub trait FrameProvider {
    /**
        The available frame closest to `micros`, as RGBA at the output size.
        `None` when no frame exists there, which is not an error.
    */
    fn frame_near(&mut self, micros: i64) -> Result<Option<VideoFrame>>;
}

struct Cached {
    micros: i64,
    frame: VideoFrame,
}

/**
    Decodes a video track on demand and answers nearest-frame queries.

    Lookups are approximate: the returned frame is the decoded frame whose
    timestamp is closest to the request. Decoded frames are cached, so
    stepping backwards through a group of pictures decodes it only once as
    long as the cache can hold it.
*/
pub struct FrameSource {
    extractor: Extractor,
    decoder: VideoDecoder,
    scaler: Scaler,
    duration_micros: i64,
    capacity: usize,
    cache: VecDeque<Cached>,
    /// Earliest time the cache answers for; the seek target that filled it.
    window_start: Option<i64>,
    pending: Option<EncodedSample>,
    input_done: bool,
    exhausted: bool,
    seeks: u64,
}

impl FrameSource {
    pub fn open(path: &Path, width: u32, height: u32, capacity: usize) -> Result<Self> {
        let extractor = Extractor::open_track(path, TrackKind::Video)?;
        let duration_micros = extractor
            .descriptor()
            .duration_micros()
            .or(extractor.media_info().duration_micros())
            .filter(|&d| d > 0)
            .ok_or_else(|| MediaError::configuration("source duration is missing or zero"))?;
        let mut decoder = VideoDecoder::new(extractor.codec_config())?;
        decoder.start()?;

        debug!(
            path = %path.display(),
            duration_micros,
            width,
            height,
            capacity,
            "frame source opened"
        );
        Ok(Self {
            extractor,
            decoder,
            scaler: Scaler::new(ScaleTarget::new(width, height, PixelFormat::Rgba)),
            duration_micros,
            // the frames either side of a request must both fit
            capacity: capacity.max(2),
            cache: VecDeque::new(),
            window_start: None,
            pending: None,
            input_done: false,
            exhausted: false,
            seeks: 0,
        })
    }

    pub fn duration_micros(&self) -> i64 {
        self.duration_micros
    }

    /// Seeks performed so far.
    pub fn seeks(&self) -> u64 {
        self.seeks
    }

    fn covers(&self, micros: i64) -> bool {
        let Some(start) = self.window_start else {
            return false;
        };
        let end = match self.cache.back() {
            _ if self.exhausted => i64::MAX,
            Some(last) => last.micros,
            None => return false,
        };
        start <= micros && micros <= end
    }

    /// True when decoding onwards from the cache reaches `micros` without a seek.
    fn ahead_of_cache(&self, micros: i64) -> bool {
        !self.exhausted
            && self.window_start.is_some_and(|start| start <= micros)
            && self.cache.back().is_some_and(|last| last.micros < micros)
    }

    fn seek(&mut self, micros: i64) -> Result<()> {
        trace!(micros, "seeking frame source");
        self.extractor.seek_to(micros)?;
        self.decoder.reset()?;
        self.cache.clear();
        self.pending = None;
        self.input_done = false;
        self.exhausted = false;
        self.window_start = Some(micros);
        self.seeks += 1;
        Ok(())
    }

    fn push(&mut self, frame: VideoFrame) {
        let micros = frame.pts_micros().unwrap_or_else(|| {
            // frames without timestamps follow their predecessor
            self.cache.back().map_or(0, |last| last.micros + 1)
        });
        if self.cache.is_empty() {
            // decoding restarted at the keyframe before the seek target
            self.window_start = self.window_start.map(|start| start.min(micros));
        }
        self.cache.push_back(Cached { micros, frame });
        if self.cache.len() > self.capacity {
            self.cache.pop_front();
            if let Some(first) = self.cache.front() {
                self.window_start = Some(first.micros);
            }
        }
    }

    /// Decode forward until a frame at or after `micros` is cached or input ends.
    fn decode_until(&mut self, micros: i64) -> Result<()> {
        while !self.exhausted && self.cache.back().is_none_or(|last| last.micros < micros) {
            match self.decoder.poll(POLL_TIMEOUT)? {
                CodecEvent::Sample(frame) => self.push(frame),
                CodecEvent::FormatChanged(descriptor) => {
                    trace!(?descriptor, "decoder output format");
                }
                CodecEvent::EndOfStream => self.exhausted = true,
                CodecEvent::TryAgain if self.input_done => {}
                CodecEvent::TryAgain => self.feed_next()?,
            }
        }
        Ok(())
    }

    fn feed_next(&mut self) -> Result<()> {
        let sample = match self.pending.take() {
            Some(sample) => sample,
            None => match self.extractor.read_sample()? {
                Some(sample) => sample,
                None => {
                    self.decoder.signal_end_of_input()?;
                    self.input_done = true;
                    return Ok(());
                }
            },
        };
        if self.decoder.feed(&sample)? == FeedStatus::Busy {
            self.pending = Some(sample);
        }
        Ok(())
    }
}

impl FrameProvider for FrameSource {
    fn frame_near(&mut self, micros: i64) -> Result<Option<VideoFrame>> {
        if micros < 0 || micros > self.duration_micros {
            return Ok(None);
        }
        if !self.covers(micros) && !self.ahead_of_cache(micros) {
            self.seek(micros)?;
        }
        self.decode_until(micros)?;

        let nearest = self
            .cache
            .iter()
            .min_by_key(|cached| (cached.micros - micros).abs());
        match nearest {
            Some(cached) => Ok(Some(self.scaler.convert(&cached.frame)?)),
            None => Ok(None),
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.decoder.release();
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("path", &self.extractor.path())
            .field("duration_micros", &self.duration_micros)
            .field("cached", &self.cache.len())
            .field("seeks", &self.seeks)
            .finish_non_exhaustive()
    }
}
