/*!
    H.264 encoder.
*/

use std::time::Duration;

use ffmpeg_next::{
    Dictionary,
    codec::{self, encoder::Video as FfmpegVideoEncoder},
    ffi,
    format::Pixel,
};
use tracing::{debug, trace};

use media_source::convert::rational_to_ffmpeg;
use media_transform::planes;
use media_types::{
    Codec, CodecEvent, CodecId, CodecState, EncodedSample, Error, FeedStatus, FormatGate,
    Lifecycle, MediaParams, PixelFormat, Rational, Result, StreamDescriptor, TrackKind,
    VideoFrame, VideoParams,
};

use crate::config::VideoEncoderConfig;
use crate::{Timeline, config_sample, eof_sent, extradata, send_status};

/**
    Encodes YUV 4:2:0 frames into H.264.

    Frames must carry a presentation timestamp; timestamps are converted to
    microseconds and must increase strictly from one frame to the next.
*/
pub struct VideoEncoder {
    encoder: Option<FfmpegVideoEncoder>,
    config: VideoEncoderConfig,
    lifecycle: Lifecycle,
    gate: FormatGate<EncodedSample>,
    timeline: Timeline,
    last_pts: Option<i64>,
    eof_pending: bool,
    finished: bool,
}

impl VideoEncoder {
    pub const TIME_BASE: Rational = Rational::MICROS;

    pub fn new(config: VideoEncoderConfig) -> Result<Self> {
        media_source::init()?;

        let codec = ffmpeg_next::encoder::find(codec::Id::H264)
            .ok_or_else(|| Error::unsupported_format("no H.264 encoder available"))?;
        let mut encoder = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| Error::codec(e.to_string()))?;

        encoder.set_width(config.width);
        encoder.set_height(config.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(rational_to_ffmpeg(Self::TIME_BASE));
        encoder.set_frame_rate(Some(rational_to_ffmpeg(config.frame_rate)));
        encoder.set_gop(config.gop_size());
        encoder.set_max_b_frames(0);
        encoder.set_bit_rate(config.bit_rate as usize);
        encoder.set_flags(codec::Flags::GLOBAL_HEADER);

        let mut options = Dictionary::new();
        options.set("preset", config.preset.as_str());

        let encoder = encoder
            .open_with(options)
            .map_err(|e| Error::codec(format!("failed to open H.264 encoder: {e}")))?;

        debug!(
            encoder = codec.name(),
            width = config.width,
            height = config.height,
            gop = config.gop_size(),
            bit_rate = config.bit_rate,
            "video encoder configured"
        );

        Ok(Self {
            encoder: Some(encoder),
            config,
            lifecycle: Lifecycle::new("video encoder"),
            gate: FormatGate::new(),
            timeline: Timeline::default(),
            last_pts: None,
            eof_pending: false,
            finished: false,
        })
    }

    pub fn config(&self) -> &VideoEncoderConfig {
        &self.config
    }

    /// Output format, including the SPS/PPS extradata.
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            codec_id: CodecId::H264,
            time_base: Self::TIME_BASE,
            duration: None,
            bit_rate: Some(self.config.bit_rate),
            extradata: self.encoder.as_ref().and_then(|e| extradata(e)),
            media: MediaParams::Video(VideoParams {
                width: self.config.width,
                height: self.config.height,
                frame_rate: Some(self.config.frame_rate),
                pixel_format: PixelFormat::Yuv420p,
            }),
        }
    }

    fn encoder(&mut self) -> Result<&mut FfmpegVideoEncoder> {
        let state = self.lifecycle.state();
        self.encoder
            .as_mut()
            .ok_or_else(|| Error::invalid_state("video encoder", "use", state))
    }

    fn check_frame(&self, frame: &VideoFrame) -> Result<i64> {
        if frame.format != PixelFormat::Yuv420p
            || frame.width != self.config.width
            || frame.height != self.config.height
        {
            return Err(Error::invalid_data(format!(
                "expected {}x{} yuv420p, got {}x{} {:?}",
                self.config.width, self.config.height, frame.width, frame.height, frame.format
            )));
        }
        let pts = frame
            .pts
            .map(|pts| Rational::rescale(pts, frame.time_base, Self::TIME_BASE))
            .ok_or_else(|| Error::invalid_data("video frame has no timestamp"))?;
        if self.last_pts.is_some_and(|last| pts <= last) {
            return Err(Error::invalid_data(format!(
                "timestamp {pts}us does not follow {}us",
                self.last_pts.unwrap_or_default()
            )));
        }
        Ok(pts)
    }
}

impl Codec for VideoEncoder {
    type Input = VideoFrame;
    type Output = EncodedSample;

    fn state(&self) -> CodecState {
        self.lifecycle.state()
    }

    fn start(&mut self) -> Result<()> {
        self.lifecycle.start()
    }

    fn feed(&mut self, input: &VideoFrame) -> Result<FeedStatus> {
        self.lifecycle.ensure("feed", &[CodecState::Started])?;
        let pts = self.check_frame(input)?;

        let mut frame = planes::to_ffmpeg(input)?;
        frame.set_pts(Some(pts));
        let status = send_status(self.encoder()?.send_frame(&frame))?;
        if status == FeedStatus::Accepted {
            self.last_pts = Some(pts);
        }
        trace!(pts, ?status, "video frame fed");
        Ok(status)
    }

    fn signal_end_of_input(&mut self) -> Result<()> {
        self.lifecycle.end_input()?;
        self.eof_pending = !eof_sent(self.encoder()?.send_eof())?;
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Result<CodecEvent<EncodedSample>> {
        self.lifecycle
            .ensure("poll", &[CodecState::Started, CodecState::Draining])?;

        if let Some(sample) = self.gate.take_stashed() {
            return Ok(CodecEvent::Sample(sample));
        }
        if self.finished {
            return Ok(CodecEvent::EndOfStream);
        }

        let mut packet = ffmpeg_next::Packet::empty();
        let received = self.encoder()?.receive_packet(&mut packet);
        match received {
            Ok(()) => {
                let sample = self.timeline.sample(&packet, Self::TIME_BASE, TrackKind::Video);
                if self.gate.is_announced() {
                    return Ok(CodecEvent::Sample(sample));
                }
                let descriptor = self.descriptor();
                let event = self.gate.admit(sample, |_| descriptor.clone());
                if let Some(data) = descriptor.extradata {
                    self.gate
                        .hold_front(config_sample(data, Self::TIME_BASE, TrackKind::Video));
                }
                Ok(event)
            }
            Err(ffmpeg_next::Error::Eof) => {
                self.finished = true;
                debug!(last_pts = ?self.last_pts, "video encoder drained");
                Ok(CodecEvent::EndOfStream)
            }
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                if self.eof_pending {
                    self.eof_pending = !eof_sent(self.encoder()?.send_eof())?;
                }
                Ok(CodecEvent::TryAgain)
            }
            Err(e) => Err(Error::codec(format!("receive_packet failed: {e}"))),
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.lifecycle.stop()
    }

    fn release(&mut self) {
        self.encoder = None;
        self.gate.clear();
        self.lifecycle.release();
    }
}

impl std::fmt::Debug for VideoEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoEncoder")
            .field("config", &self.config)
            .field("state", &self.lifecycle.state())
            .field("last_pts", &self.last_pts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(width: u32, height: u32) -> Option<VideoEncoder> {
        let config = VideoEncoderConfig::h264(width, height, Rational::new(30, 1))
            .with_preset(crate::EncoderPreset::Ultrafast);
        match VideoEncoder::new(config) {
            Ok(encoder) => Some(encoder),
            Err(e) => {
                eprintln!("skipping: {e}");
                None
            }
        }
    }

    fn grey_frame(width: u32, height: u32, pts_micros: i64) -> VideoFrame {
        VideoFrame::new(
            width,
            height,
            PixelFormat::Yuv420p,
            vec![128; PixelFormat::Yuv420p.frame_size(width, height)],
            Some(pts_micros),
            Rational::MICROS,
        )
    }

    #[test]
    fn feed_before_start_is_invalid_state() {
        let Some(mut encoder) = encoder(64, 64) else { return };
        let err = encoder.feed(&grey_frame(64, 64, 0)).unwrap_err();
        assert!(err.is_invalid_state());
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let Some(mut encoder) = encoder(64, 64) else { return };
        encoder.start().unwrap();
        let err = encoder.feed(&grey_frame(32, 32, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn non_increasing_timestamps_are_rejected() {
        let Some(mut encoder) = encoder(64, 64) else { return };
        encoder.start().unwrap();
        assert_eq!(encoder.feed(&grey_frame(64, 64, 0)).unwrap(), FeedStatus::Accepted);
        assert!(encoder.feed(&grey_frame(64, 64, 0)).is_err());
    }

    #[test]
    fn announces_format_then_config_then_media() {
        let Some(mut encoder) = encoder(64, 64) else { return };
        encoder.start().unwrap();
        for i in 0..10 {
            encoder.feed(&grey_frame(64, 64, i * 33_333)).unwrap();
        }
        encoder.signal_end_of_input().unwrap();

        let mut events = Vec::new();
        loop {
            match encoder.poll(Duration::from_millis(10)).unwrap() {
                CodecEvent::EndOfStream => break,
                CodecEvent::TryAgain => continue,
                event => events.push(event),
            }
        }

        let CodecEvent::FormatChanged(descriptor) = &events[0] else {
            panic!("first event was {:?}", events[0]);
        };
        assert_eq!(descriptor.codec_id, CodecId::H264);
        assert!(descriptor.extradata.is_some());
        assert!(matches!(&events[1], CodecEvent::Sample(s) if s.is_codec_config()));

        let media: Vec<&EncodedSample> = events[2..]
            .iter()
            .filter_map(|e| match e {
                CodecEvent::Sample(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(media.len(), 10);
        assert_eq!(media[0].pts, 0);
        assert!(media[0].is_keyframe());
        assert!(media.windows(2).all(|w| w[0].pts < w[1].pts));

        encoder.stop().unwrap();
        encoder.release();
        assert!(encoder.poll(Duration::ZERO).unwrap_err().is_invalid_state());
    }
}
