/*!
    Audio decoder.
*/

use std::time::Duration;

use ffmpeg_next::{
    codec::{self, decoder::Audio as FfmpegAudioDecoder},
    ffi,
    util::frame::audio::Audio as FfmpegAudioFrame,
};
use tracing::{debug, trace};

use media_source::CodecConfig;
use media_source::convert::{packet_from_sample, rational_to_ffmpeg, sample_format_from_ffmpeg};
use media_types::{
    AudioFrame, AudioParams, Codec, CodecEvent, CodecId, CodecState, EncodedSample, Error,
    FeedStatus, FormatGate, Lifecycle, MediaParams, Rational, Result, SampleFormat,
    StreamDescriptor,
};

use crate::{eof_sent, feed_status};

/**
    Decodes compressed audio into interleaved PCM [`AudioFrame`]s.

    The announced format carries the decoder's actual sample rate, channel
    count and sample format, which take precedence over container metadata.

    Output is limited to the track's presentation window: samples before
    zero (encoder priming) and past the end of the last packet (padding of
    the final frame) are dropped.
*/
pub struct AudioDecoder {
    decoder: Option<FfmpegAudioDecoder>,
    lifecycle: Lifecycle,
    time_base: Rational,
    gate: FormatGate<AudioFrame>,
    /// End of the last packet fed, in `time_base` units. `None` once a
    /// packet without a duration was fed.
    end: Option<i64>,
    /// Sample position following the last decoded frame.
    position: i64,
    eof_pending: bool,
    finished: bool,
}

impl AudioDecoder {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        media_source::init()?;

        let mut context = codec::context::Context::from_parameters(config.parameters())
            .map_err(|e| Error::codec(e.to_string()))?;
        // SAFETY: the context is not opened yet and owned here.
        unsafe {
            let ptr = context.as_mut_ptr();
            // priming is trimmed by timestamp in `trim`, not by the decoder
            (*ptr).flags2 |= ffi::AV_CODEC_FLAG2_SKIP_MANUAL as i32;
            (*ptr).pkt_timebase = rational_to_ffmpeg(config.time_base()).into();
        }
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| Error::codec(e.to_string()))?;

        debug!(
            codec = ?decoder.id(),
            sample_rate = decoder.rate(),
            channels = decoder.channels(),
            "audio decoder configured"
        );

        Ok(Self {
            decoder: Some(decoder),
            lifecycle: Lifecycle::new("audio decoder"),
            time_base: config.time_base(),
            gate: FormatGate::new(),
            end: Some(0),
            position: 0,
            eof_pending: false,
            finished: false,
        })
    }

    fn decoder(&mut self) -> Result<&mut FfmpegAudioDecoder> {
        let state = self.lifecycle.state();
        self.decoder
            .as_mut()
            .ok_or_else(|| Error::invalid_state("audio decoder", "use", state))
    }

    fn convert_frame(&self, frame: &FfmpegAudioFrame) -> Result<AudioFrame> {
        let samples = frame.samples();
        let channels = frame.channels() as u16;
        if samples == 0 || channels == 0 {
            return Err(Error::invalid_data("audio frame has no samples"));
        }

        let format = sample_format_from_ffmpeg(frame.format()).ok_or_else(|| {
            Error::unsupported_format(format!("sample format {:?}", frame.format()))
        })?;

        Ok(AudioFrame::new(
            interleave(frame, format, samples, channels)?,
            samples,
            frame.rate(),
            channels,
            format,
            frame.pts(),
            self.time_base,
        ))
    }

    /// Cut a decoded frame to the presentation window. `None` when nothing remains.
    fn trim(&mut self, mut frame: AudioFrame) -> Option<AudioFrame> {
        let rate = Rational::new(1, frame.sample_rate as i32);
        let start = frame
            .pts
            .map_or(self.position, |pts| Rational::rescale(pts, self.time_base, rate));
        self.position = start + frame.samples as i64;
        let end = self.end.map(|end| Rational::rescale(end, self.time_base, rate));

        let (skip, keep) = presentation_window(start, frame.samples, end);
        if keep == 0 {
            trace!(start, samples = frame.samples, "audio frame outside presentation window");
            return None;
        }
        if keep < frame.samples {
            let frame_size = frame.frame_size();
            frame.data = frame.data[skip * frame_size..(skip + keep) * frame_size].to_vec();
            frame.samples = keep;
            frame.pts = Some(Rational::rescale(start + skip as i64, rate, self.time_base));
        }
        Some(frame)
    }
}

/**
    Which part of `samples` samples starting at `start` lies in `[0, end)`.
    Returns the count to skip and the count to keep.
*/
fn presentation_window(start: i64, samples: usize, end: Option<i64>) -> (usize, usize) {
    let first = start.max(0);
    let last = match end {
        Some(end) => (start + samples as i64).min(end),
        None => start + samples as i64,
    };
    if last <= first {
        return (0, 0);
    }
    ((first - start) as usize, (last - first) as usize)
}

impl Codec for AudioDecoder {
    type Input = EncodedSample;
    type Output = AudioFrame;

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
        if status == FeedStatus::Accepted {
            self.end = match self.end {
                Some(end) if input.duration > 0 => Some(end.max(input.pts + input.duration)),
                _ => None,
            };
        }
        trace!(pts = input.pts, ?status, "audio packet fed");
        Ok(status)
    }

    fn signal_end_of_input(&mut self) -> Result<()> {
        self.lifecycle.end_input()?;
        self.eof_pending = !eof_sent(self.decoder()?.send_eof())?;
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Result<CodecEvent<AudioFrame>> {
        self.lifecycle
            .ensure("poll", &[CodecState::Started, CodecState::Draining])?;

        if let Some(frame) = self.gate.take_stashed() {
            return Ok(CodecEvent::Sample(frame));
        }
        if self.finished {
            return Ok(CodecEvent::EndOfStream);
        }

        let mut decoded = FfmpegAudioFrame::empty();
        let received = self.decoder()?.receive_frame(&mut decoded);
        match received {
            Ok(()) => {
                let frame = self.convert_frame(&decoded)?;
                let Some(frame) = self.trim(frame) else {
                    return Ok(CodecEvent::TryAgain);
                };
                let time_base = self.time_base;
                Ok(self.gate.admit(frame, |f| describe(time_base, f)))
            }
            Err(ffmpeg_next::Error::Eof) => {
                self.finished = true;
                debug!("audio decoder drained");
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
        self.gate.clear();
        self.lifecycle.release();
    }
}

fn describe(time_base: Rational, frame: &AudioFrame) -> StreamDescriptor {
    StreamDescriptor {
        codec_id: CodecId::Raw,
        time_base,
        duration: None,
        bit_rate: None,
        extradata: None,
        media: MediaParams::Audio(AudioParams {
            sample_rate: frame.sample_rate,
            channels: frame.channels,
            sample_format: Some(frame.format),
            priming: 0,
        }),
    }
}

/**
    Copy a decoded frame into one interleaved buffer.

    Planar formats keep each channel in its own plane. Only `linesize[0]` is
    meaningful for planar audio, so every plane is read with plane 0's size.
*/
fn interleave(
    frame: &FfmpegAudioFrame,
    format: SampleFormat,
    samples: usize,
    channels: u16,
) -> Result<Vec<u8>> {
    let width = format.bytes_per_sample();
    let channels = channels as usize;
    let total = samples * channels * width;

    if !frame.is_planar() || channels == 1 {
        let packed = frame.data(0);
        if packed.len() < total {
            return Err(Error::invalid_data(format!(
                "packed audio holds {} bytes, expected {total}",
                packed.len()
            )));
        }
        return Ok(packed[..total].to_vec());
    }

    let plane_size = frame.data(0).len();
    if frame.planes() < channels || plane_size < samples * width {
        return Err(Error::invalid_data(format!(
            "planar audio has {} planes of {plane_size} bytes for {channels} channels of {samples} samples",
            frame.planes()
        )));
    }

    let mut output = vec![0u8; total];
    for ch in 0..channels {
        // SAFETY: the frame has at least `channels` planes, each `plane_size` bytes.
        let plane = unsafe { std::slice::from_raw_parts((*frame.as_ptr()).data[ch], plane_size) };
        for (s, chunk) in plane[..samples * width].chunks_exact(width).enumerate() {
            let offset = (s * channels + ch) * width;
            output[offset..offset + width].copy_from_slice(chunk);
        }
    }
    Ok(output)
}

impl std::fmt::Debug for AudioDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDecoder")
            .field("state", &self.lifecycle.state())
            .field("time_base", &self.time_base)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_next::format::{Sample, sample::Type};

    fn planar_stereo(left: &[f32], right: &[f32]) -> FfmpegAudioFrame {
        let mut frame = FfmpegAudioFrame::new(
            Sample::F32(Type::Planar),
            left.len(),
            ffmpeg_next::ChannelLayout::STEREO,
        );
        frame.plane_mut::<f32>(0).copy_from_slice(left);
        frame.plane_mut::<f32>(1).copy_from_slice(right);
        frame
    }

    #[test]
    fn planar_audio_is_interleaved() {
        let frame = planar_stereo(&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0]);
        let bytes = interleave(&frame, SampleFormat::F32, 3, 2).unwrap();
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(values, [1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn priming_and_padding_fall_outside_the_window() {
        // priming packet entirely before zero
        assert_eq!(presentation_window(-1024, 1024, Some(5000)), (0, 0));
        // frame straddling zero
        assert_eq!(presentation_window(-24, 1024, Some(5000)), (24, 1000));
        // padded final frame
        assert_eq!(presentation_window(4096, 1024, Some(5000)), (0, 904));
        assert_eq!(presentation_window(5000, 1024, Some(5000)), (0, 0));
        // unknown end keeps the tail
        assert_eq!(presentation_window(4096, 1024, None), (0, 1024));
    }

    #[test]
    fn packed_audio_is_copied_verbatim() {
        let mut frame =
            FfmpegAudioFrame::new(Sample::I16(Type::Packed), 2, ffmpeg_next::ChannelLayout::STEREO);
        let pcm: Vec<u8> = [1i16, 2, 3, 4].iter().flat_map(|v| v.to_ne_bytes()).collect();
        frame.data_mut(0)[..8].copy_from_slice(&pcm);
        let bytes = interleave(&frame, SampleFormat::S16, 2, 2).unwrap();
        assert_eq!(bytes, pcm);
    }
}
