/*!
    Interleaved PCM to FFmpeg audio frames.
*/

use ffmpeg_next::{
    format::Sample,
    software::resampling::context::Context as ResamplerContext,
    util::frame::audio::Audio as FfmpegAudio,
};

use media_source::convert::{channel_layout_for, sample_format_to_ffmpeg};
use media_types::{AudioFrame, Error, Result, SampleFormat};

/**
    Copy an interleaved frame into a packed FFmpeg frame, carrying its pts.
*/
pub fn to_ffmpeg(frame: &AudioFrame) -> Result<FfmpegAudio> {
    let expected = frame.samples * frame.frame_size();
    if frame.data.len() != expected {
        return Err(Error::invalid_data(format!(
            "audio frame of {} samples holds {} bytes, expected {expected}",
            frame.samples,
            frame.data.len()
        )));
    }

    let mut output = FfmpegAudio::new(
        sample_format_to_ffmpeg(frame.format, false),
        frame.samples,
        channel_layout_for(frame.channels)?,
    );
    output.set_rate(frame.sample_rate);
    output.data_mut(0)[..expected].copy_from_slice(&frame.data);
    output.set_pts(frame.pts);
    Ok(output)
}

/**
    Converts interleaved frames to the sample format an encoder wants
    (typically planar float for AAC). Rate and channel layout are kept.

    The swresample context is rebuilt whenever the input shape changes.
*/
pub struct SampleConverter {
    target: Sample,
    state: Option<ConverterState>,
}

struct ConverterState {
    context: ResamplerContext,
    format: SampleFormat,
    sample_rate: u32,
    channels: u16,
}

impl SampleConverter {
    pub fn new(target: Sample) -> Self {
        Self {
            target,
            state: None,
        }
    }

    pub fn target(&self) -> Sample {
        self.target
    }

    pub fn convert(&mut self, frame: &AudioFrame) -> Result<FfmpegAudio> {
        let packed = to_ffmpeg(frame)?;
        if packed.format() == self.target {
            return Ok(packed);
        }

        let stale = self.state.as_ref().is_none_or(|s| {
            s.format != frame.format
                || s.sample_rate != frame.sample_rate
                || s.channels != frame.channels
        });
        if stale {
            let layout = channel_layout_for(frame.channels)?;
            let context = ResamplerContext::get(
                packed.format(),
                layout,
                frame.sample_rate,
                self.target,
                layout,
                frame.sample_rate,
            )
            .map_err(|e| Error::codec(format!("failed to create sample converter: {e}")))?;
            self.state = Some(ConverterState {
                context,
                format: frame.format,
                sample_rate: frame.sample_rate,
                channels: frame.channels,
            });
        }

        let Some(state) = self.state.as_mut() else {
            return Err(Error::codec("sample converter was not initialized"));
        };

        let mut output = FfmpegAudio::empty();
        state
            .context
            .run(&packed, &mut output)
            .map_err(|e| Error::codec(format!("sample conversion failed: {e}")))?;
        output.set_pts(frame.pts);
        Ok(output)
    }
}

impl std::fmt::Debug for SampleConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleConverter")
            .field("target", &self.target)
            .field("initialized", &self.state.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_next::format::sample::Type;
    use media_types::Rational;

    fn stereo_f32(values: &[f32]) -> AudioFrame {
        let data = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        AudioFrame::new(
            data,
            values.len() / 2,
            48_000,
            2,
            SampleFormat::F32,
            Some(1024),
            Rational::new(1, 48_000),
        )
    }

    #[test]
    fn packed_copy_keeps_pts_and_rate() {
        let frame = to_ffmpeg(&stereo_f32(&[0.5, -0.5, 0.25, -0.25])).unwrap();
        assert_eq!(frame.samples(), 2);
        assert_eq!(frame.rate(), 48_000);
        assert_eq!(frame.pts(), Some(1024));
    }

    #[test]
    fn interleaved_float_becomes_planar() {
        let mut converter = SampleConverter::new(Sample::F32(Type::Planar));
        let frame = converter
            .convert(&stereo_f32(&[0.5, -0.5, 0.25, -0.25]))
            .unwrap();
        assert_eq!(frame.format(), Sample::F32(Type::Planar));
        assert_eq!(frame.samples(), 2);
        assert_eq!(frame.plane::<f32>(0), &[0.5, 0.25]);
        assert_eq!(frame.plane::<f32>(1), &[-0.5, -0.25]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut frame = stereo_f32(&[0.0; 4]);
        frame.data.pop();
        assert!(to_ffmpeg(&frame).is_err());
    }
}
