/*!
    AAC encoder.
*/

use std::time::Duration;

use ffmpeg_next::{
    codec::{self, encoder::Audio as FfmpegAudioEncoder},
    ffi,
    format::{Sample, sample::Type},
};
use tracing::{debug, trace};

use media_source::convert::channel_layout_for;
use media_transform::SampleConverter;
use media_types::{
    AudioFrame, AudioParams, Codec, CodecEvent, CodecId, CodecState, EncodedSample, Error,
    FeedStatus, FormatGate, Lifecycle, MediaParams, Rational, Result, SampleFormat,
    StreamDescriptor, TrackKind,
};

use crate::config::AudioEncoderConfig;
use crate::{Timeline, config_sample, eof_sent, extradata, initial_padding, send_status};

/// Input frames buffered ahead of the encoder before `feed` pushes back.
const MAX_BUFFERED_FRAMES: usize = 4;

/**
    Encodes interleaved PCM into AAC-LC.

    Input frames may hold any number of samples; they are re-chunked into
    the encoder's fixed frame size. The sample rate and channel count of the
    input must match the configuration. Output timestamps count input samples
    from zero in a `1/sample_rate` time base; the priming packet ahead of them
    is negative, and the last packet's duration covers only real samples, so
    the track plays back exactly the samples that were fed.
*/
pub struct AudioEncoder {
    encoder: Option<FfmpegAudioEncoder>,
    config: AudioEncoderConfig,
    converter: SampleConverter,
    lifecycle: Lifecycle,
    gate: FormatGate<EncodedSample>,
    timeline: Timeline,
    time_base: Rational,
    /// Interleaved bytes not yet handed to the encoder.
    fifo: Vec<u8>,
    input_format: Option<SampleFormat>,
    next_pts: i64,
    eof_sent: bool,
    finished: bool,
}

impl AudioEncoder {
    pub fn new(config: AudioEncoderConfig) -> Result<Self> {
        media_source::init()?;

        let codec = ffmpeg_next::encoder::find(codec::Id::AAC)
            .ok_or_else(|| Error::unsupported_format("no AAC encoder available"))?;
        let mut encoder = codec::context::Context::new_with_codec(codec)
            .encoder()
            .audio()
            .map_err(|e| Error::codec(e.to_string()))?;

        let time_base = Rational::new(1, config.sample_rate as i32);
        encoder.set_rate(config.sample_rate as i32);
        encoder.set_channel_layout(channel_layout_for(config.channels)?);
        encoder.set_format(Sample::F32(Type::Planar));
        encoder.set_time_base(ffmpeg_next::Rational::new(1, config.sample_rate as i32));
        encoder.set_bit_rate(config.bit_rate as usize);
        encoder.set_flags(codec::Flags::GLOBAL_HEADER);

        let encoder = encoder
            .open()
            .map_err(|e| Error::codec(format!("failed to open AAC encoder: {e}")))?;

        debug!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            bit_rate = config.bit_rate,
            frame_size = encoder.frame_size(),
            "audio encoder configured"
        );

        Ok(Self {
            encoder: Some(encoder),
            converter: SampleConverter::new(Sample::F32(Type::Planar)),
            config,
            lifecycle: Lifecycle::new("audio encoder"),
            gate: FormatGate::new(),
            timeline: Timeline::anchored(0),
            time_base,
            fifo: Vec::new(),
            input_format: None,
            next_pts: 0,
            eof_sent: false,
            finished: false,
        })
    }

    pub fn config(&self) -> &AudioEncoderConfig {
        &self.config
    }

    /// Samples per channel in each encoded frame.
    pub fn frame_size(&self) -> usize {
        self.encoder
            .as_ref()
            .map(|e| e.frame_size() as usize)
            .filter(|&size| size > 0)
            .unwrap_or(1024)
    }

    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            codec_id: CodecId::Aac,
            time_base: self.time_base,
            duration: None,
            bit_rate: Some(self.config.bit_rate),
            extradata: self.encoder.as_ref().and_then(|e| extradata(e)),
            media: MediaParams::Audio(AudioParams {
                sample_rate: self.config.sample_rate,
                channels: self.config.channels,
                sample_format: Some(SampleFormat::F32),
                priming: self.priming(),
            }),
        }
    }

    /// Samples of encoder delay ahead of the first input sample.
    pub fn priming(&self) -> u32 {
        self.encoder.as_ref().map_or(0, |e| initial_padding(e))
    }

    fn encoder(&mut self) -> Result<&mut FfmpegAudioEncoder> {
        let state = self.lifecycle.state();
        self.encoder
            .as_mut()
            .ok_or_else(|| Error::invalid_state("audio encoder", "use", state))
    }

    fn bytes_per_frame(&self) -> usize {
        self.input_format
            .map_or(0, |f| f.bytes_per_sample() * self.config.channels as usize)
    }

    fn check_input(&mut self, frame: &AudioFrame) -> Result<()> {
        if frame.sample_rate != self.config.sample_rate || frame.channels != self.config.channels {
            return Err(Error::invalid_data(format!(
                "expected {} Hz x{}, got {} Hz x{}",
                self.config.sample_rate, self.config.channels, frame.sample_rate, frame.channels
            )));
        }
        match self.input_format {
            None => self.input_format = Some(frame.format),
            Some(format) if format != frame.format => {
                return Err(Error::invalid_data(format!(
                    "sample format changed from {format:?} to {:?}",
                    frame.format
                )));
            }
            Some(_) => {}
        }
        Ok(())
    }

    /**
        Hand buffered PCM to the encoder in frame-size chunks until it pushes
        back. While draining, the final short chunk and the flush follow.
    */
    fn pump(&mut self) -> Result<()> {
        let draining = self.lifecycle.state() == CodecState::Draining;
        let bytes_per_frame = self.bytes_per_frame();

        if let Some(format) = self.input_format {
            let chunk = self.frame_size() * bytes_per_frame;
            loop {
                let take = if self.fifo.len() >= chunk {
                    chunk
                } else if draining && !self.fifo.is_empty() {
                    self.fifo.len()
                } else {
                    break;
                };
                let samples = take / bytes_per_frame;
                let pcm = AudioFrame::new(
                    self.fifo[..take].to_vec(),
                    samples,
                    self.config.sample_rate,
                    self.config.channels,
                    format,
                    Some(self.next_pts),
                    self.time_base,
                );
                let frame = self.converter.convert(&pcm)?;
                if send_status(self.encoder()?.send_frame(&frame))? == FeedStatus::Busy {
                    return Ok(());
                }
                self.fifo.drain(..take);
                self.next_pts += samples as i64;
            }
        }

        if draining && !self.eof_sent && self.fifo.is_empty() {
            self.eof_sent = eof_sent(self.encoder()?.send_eof())?;
        }
        Ok(())
    }
}

impl Codec for AudioEncoder {
    type Input = AudioFrame;
    type Output = EncodedSample;

    fn state(&self) -> CodecState {
        self.lifecycle.state()
    }

    fn start(&mut self) -> Result<()> {
        self.lifecycle.start()
    }

    fn feed(&mut self, input: &AudioFrame) -> Result<FeedStatus> {
        self.lifecycle.ensure("feed", &[CodecState::Started])?;
        self.check_input(input)?;

        self.pump()?;
        let limit = MAX_BUFFERED_FRAMES * self.frame_size() * self.bytes_per_frame();
        if self.fifo.len() >= limit {
            return Ok(FeedStatus::Busy);
        }

        self.fifo.extend_from_slice(&input.data);
        self.pump()?;
        trace!(samples = input.samples, buffered = self.fifo.len(), "audio frame fed");
        Ok(FeedStatus::Accepted)
    }

    fn signal_end_of_input(&mut self) -> Result<()> {
        self.lifecycle.end_input()?;
        self.pump()
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
                let mut sample = self.timeline.sample(&packet, self.time_base, TrackKind::Audio);
                // the final frame is padded with silence past the last input sample
                sample.duration = sample.duration.min(self.next_pts - sample.pts).max(0);
                if self.gate.is_announced() {
                    return Ok(CodecEvent::Sample(sample));
                }
                let descriptor = self.descriptor();
                let event = self.gate.admit(sample, |_| descriptor.clone());
                if let Some(data) = descriptor.extradata {
                    self.gate
                        .hold_front(config_sample(data, self.time_base, TrackKind::Audio));
                }
                Ok(event)
            }
            Err(ffmpeg_next::Error::Eof) => {
                self.finished = true;
                debug!(samples = self.next_pts, "audio encoder drained");
                Ok(CodecEvent::EndOfStream)
            }
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                self.pump()?;
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
        self.fifo = Vec::new();
        self.gate.clear();
        self.lifecycle.release();
    }
}

impl std::fmt::Debug for AudioEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEncoder")
            .field("config", &self.config)
            .field("state", &self.lifecycle.state())
            .field("buffered", &self.fifo.len())
            .field("next_pts", &self.next_pts)
            .finish_non_exhaustive()
    }
}
