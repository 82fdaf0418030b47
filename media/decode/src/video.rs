/*!
    Video decoder.
*/

use std::time::Duration;

use ffmpeg_next::{
    codec::{self, decoder::Video as FfmpegVideoDecoder},
    ffi,
    util::frame::video::Video as FfmpegVideoFrame,
};
use tracing::{debug, trace};

use media_source::CodecConfig;
use media_source::convert::{packet_from_sample, pixel_format_from_ffmpeg};
use media_transform::planes::copy_from_ffmpeg;
use media_transform::{ScaleTarget, Scaler};
use media_types::{
    Codec, CodecEvent, CodecId, CodecState, EncodedSample, Error, FeedStatus, FormatGate,
    Lifecycle, MediaParams, PixelFormat, Rational, Result, StreamDescriptor, VideoFrame,
    VideoParams,
};

use crate::{eof_sent, feed_status};

/**
    Decodes compressed video into packed [`VideoFrame`]s.

    Frames in a pixel layout outside [`PixelFormat`] (10-bit, 4:2:2, ...)
    are converted to YUV 4:2:0 at their native size.

    Supports [`reset`](Self::reset) after the feeding extractor seeks.
*/
pub struct VideoDecoder {
    decoder: Option<FfmpegVideoDecoder>,
    lifecycle: Lifecycle,
    time_base: Rational,
    gate: FormatGate<VideoFrame>,
    fallback: Option<Scaler>,
    eof_pending: bool,
    finished: bool,
}

impl VideoDecoder {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        media_source::init()?;

        let context = codec::context::Context::from_parameters(config.parameters())
            .map_err(|e| Error::codec(e.to_string()))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| Error::codec(e.to_string()))?;

        debug!(
            codec = ?decoder.id(),
            width = decoder.width(),
            height = decoder.height(),
            format = ?decoder.format(),
            "video decoder configured"
        );

        Ok(Self {
            decoder: Some(decoder),
            lifecycle: Lifecycle::new("video decoder"),
            time_base: config.time_base(),
            gate: FormatGate::new(),
            fallback: None,
            eof_pending: false,
            finished: false,
        })
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /**
        Discard every buffered packet and frame and accept input again.

        Call after seeking the extractor that feeds this decoder, including
        after end of input was signalled.
    */
    pub fn reset(&mut self) -> Result<()> {
        self.lifecycle.reset()?;
        self.decoder()?.flush();
        self.gate.clear();
        self.eof_pending = false;
        self.finished = false;
        Ok(())
    }

    fn decoder(&mut self) -> Result<&mut FfmpegVideoDecoder> {
        let state = self.lifecycle.state();
        self.decoder
            .as_mut()
            .ok_or_else(|| Error::invalid_state("video decoder", "use", state))
    }

    fn convert_frame(&mut self, frame: &FfmpegVideoFrame) -> Result<VideoFrame> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(Error::invalid_data("video frame has zero dimensions"));
        }

        if let Some(format) = pixel_format_from_ffmpeg(frame.format()) {
            return Ok(VideoFrame::new(
                frame.width(),
                frame.height(),
                format,
                copy_from_ffmpeg(frame, format)?,
                frame.pts().or(frame.timestamp()),
                self.time_base,
            ));
        }

        let target = ScaleTarget::new(frame.width(), frame.height(), PixelFormat::Yuv420p);
        if self.fallback.as_ref().is_some_and(|s| s.target() != target) {
            self.fallback = None;
        }
        let scaler = self.fallback.get_or_insert_with(|| {
            debug!(format = ?frame.format(), "converting decoded frames to yuv420p");
            Scaler::new(target)
        });
        let mut converted = scaler.convert_ffmpeg(frame, self.time_base)?;
        converted.pts = frame.pts().or(frame.timestamp());
        Ok(converted)
    }
}

impl Codec for VideoDecoder {
    type Input = EncodedSample;
    type Output = VideoFrame;

    fn state(&self) -> CodecState {
        self.lifecycle.state()
    }

    fn start(&mut self) -> Result<()> {
        self.lifecycle.start()
    }

    fn feed(&mut self, input: &EncodedSample) -> Result<FeedStatus> {
        self.lifecycle.ensure("feed", &[CodecState::Started])?;
        let packet = packet_from_sample(input);
        let status = feed_status(self.decoder()?.send_packet(&packet))?;
        trace!(pts = input.pts, keyframe = input.is_keyframe(), ?status, "video packet fed");
        Ok(status)
    }

    fn signal_end_of_input(&mut self) -> Result<()> {
        self.lifecycle.end_input()?;
        self.eof_pending = !eof_sent(self.decoder()?.send_eof())?;
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Result<CodecEvent<VideoFrame>> {
        self.lifecycle
            .ensure("poll", &[CodecState::Started, CodecState::Draining])?;

        if let Some(frame) = self.gate.take_stashed() {
            return Ok(CodecEvent::Sample(frame));
        }
        if self.finished {
            return Ok(CodecEvent::EndOfStream);
        }

        let mut decoded = FfmpegVideoFrame::empty();
        let received = self.decoder()?.receive_frame(&mut decoded);
        match received {
            Ok(()) => {
                let frame = self.convert_frame(&decoded)?;
                let time_base = self.time_base;
                Ok(self.gate.admit(frame, |f| describe(time_base, f)))
            }
            Err(ffmpeg_next::Error::Eof) => {
                self.finished = true;
                Ok(CodecEvent::EndOfStream)
            }
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                if self.eof_pending {
                    self.eof_pending = !eof_sent(self.decoder()?.send_eof())?;
                }
                Ok(CodecEvent::TryAgain)
            }
            Err(e) => Err(Error::codec(format!("receive_frame failed: {e}"))),
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.lifecycle.stop()
    }

    fn release(&mut self) {
        self.decoder = None;
        self.fallback = None;
        self.gate.clear();
        self.lifecycle.release();
    }
}

fn describe(time_base: Rational, frame: &VideoFrame) -> StreamDescriptor {
    StreamDescriptor {
        codec_id: CodecId::Raw,
        time_base,
        duration: None,
        bit_rate: None,
        extradata: None,
        media: MediaParams::Video(VideoParams {
            width: frame.width,
            height: frame.height,
            frame_rate: None,
            pixel_format: frame.format,
        }),
    }
}

impl std::fmt::Debug for VideoDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoDecoder")
            .field("state", &self.lifecycle.state())
            .field("time_base", &self.time_base)
            .field("converting", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}
