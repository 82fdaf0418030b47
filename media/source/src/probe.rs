/*!
    Metadata probing.
*/

use std::path::Path;
use std::time::Duration;

use ffmpeg_next::{format::context::Input as InputContext, format::stream::Stream, media::Type};

use media_types::{
    AudioParams, MediaParams, PixelFormat, Result, StreamDescriptor, TrackKind, VideoParams,
};

use crate::convert::{
    codec_id_from_ffmpeg, open_error, pixel_format_from_ffmpeg, rational_from_ffmpeg,
    sample_format_from_ffmpeg,
};

/**
    Container-level metadata: overall duration and the best video and
    audio track, if present.
*/
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MediaInfo {
    pub duration: Option<Duration>,
    pub video: Option<StreamDescriptor>,
    pub audio: Option<StreamDescriptor>,
}

impl MediaInfo {
    pub fn track(&self, kind: TrackKind) -> Option<&StreamDescriptor> {
        match kind {
            TrackKind::Video => self.video.as_ref(),
            TrackKind::Audio => self.audio.as_ref(),
        }
    }

    pub fn duration_micros(&self) -> Option<i64> {
        self.duration.map(|d| d.as_micros() as i64)
    }
}

/**
    Read a file's metadata without decoding any samples.

    Fields the container does not declare are left unset (`None` or zero)
    so the caller can decide on defaults.
*/
pub fn probe<P: AsRef<Path>>(path: P) -> Result<MediaInfo> {
    crate::init()?;
    let input = ffmpeg_next::format::input(&path).map_err(open_error)?;
    Ok(extract_media_info(&input))
}

pub(crate) fn extract_media_info(input: &InputContext) -> MediaInfo {
    let container_duration = (input.duration() > 0)
        .then(|| Duration::from_micros(input.duration() as u64));

    let video = input
        .streams()
        .best(Type::Video)
        .and_then(|stream| describe_stream(&stream, container_duration));
    let audio = input
        .streams()
        .best(Type::Audio)
        .and_then(|stream| describe_stream(&stream, container_duration));

    let duration = container_duration.or_else(|| {
        video
            .as_ref()
            .and_then(|v| v.duration)
            .or_else(|| audio.as_ref().and_then(|a| a.duration))
    });

    MediaInfo {
        duration,
        video,
        audio,
    }
}

/**
    Build a descriptor for one stream. Returns `None` for streams that are
    neither audio nor video, or whose parameters cannot be opened.
*/
pub(crate) fn describe_stream(
    stream: &Stream,
    container_duration: Option<Duration>,
) -> Option<StreamDescriptor> {
    let time_base = rational_from_ffmpeg(stream.time_base());
    let duration = if stream.duration() > 0 {
        Some(time_base.to_duration(stream.duration()))
    } else {
        container_duration
    };

    let parameters = stream.parameters();
    let codec_id = codec_id_from_ffmpeg(parameters.id());
    let context = ffmpeg_next::codec::context::Context::from_parameters(parameters.clone()).ok()?;

    let media = match parameters.medium() {
        Type::Video => {
            let decoder = context.decoder().video().ok()?;
            let frame_rate = [stream.avg_frame_rate(), stream.rate()]
                .into_iter()
                .find(|r| r.numerator() > 0 && r.denominator() > 0)
                .map(rational_from_ffmpeg);
            MediaParams::Video(VideoParams {
                width: decoder.width(),
                height: decoder.height(),
                frame_rate,
                pixel_format: pixel_format_from_ffmpeg(decoder.format())
                    .unwrap_or(PixelFormat::Yuv420p),
            })
        }
        Type::Audio => {
            let decoder = context.decoder().audio().ok()?;
            MediaParams::Audio(AudioParams {
                sample_rate: decoder.rate(),
                channels: decoder.channels(),
                sample_format: sample_format_from_ffmpeg(decoder.format()),
                // SAFETY: reading a plain field of the stream's parameters.
                priming: unsafe { (*parameters.as_ptr()).initial_padding.max(0) as u32 },
            })
        }
        _ => return None,
    };

    // SAFETY: the parameters pointer is owned by the open input context and
    // stays valid for the lifetime of `stream`.
    let (extradata, bit_rate) = unsafe {
        let ptr = parameters.as_ptr();
        let extradata = if (*ptr).extradata_size > 0 && !(*ptr).extradata.is_null() {
            let slice =
                std::slice::from_raw_parts((*ptr).extradata, (*ptr).extradata_size as usize);
            Some(slice.to_vec())
        } else {
            None
        };
        let bit_rate = ((*ptr).bit_rate > 0).then(|| (*ptr).bit_rate as u64);
        (extradata, bit_rate)
    };

    Some(StreamDescriptor {
        codec_id,
        time_base,
        duration,
        bit_rate,
        extradata,
        media,
    })
}
