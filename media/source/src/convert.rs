/*!
    Conversions between `ffmpeg-next` types and `media-types`.

    Shared by the decode, encode, sink and transform crates so the mapping
    tables live in one place.
*/

use ffmpeg_next::{codec, format};

use media_types::{CodecId, EncodedSample, Error, PixelFormat, Rational, SampleFormat};

pub fn rational_from_ffmpeg(r: ffmpeg_next::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

pub fn rational_to_ffmpeg(r: Rational) -> ffmpeg_next::Rational {
    ffmpeg_next::Rational::new(r.num, r.den)
}

pub fn pixel_format_from_ffmpeg(format: format::Pixel) -> Option<PixelFormat> {
    use format::Pixel;

    match format {
        // Full-range 4:2:0 shares the plane layout
        Pixel::YUV420P | Pixel::YUVJ420P => Some(PixelFormat::Yuv420p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        _ => None,
    }
}

pub fn pixel_format_to_ffmpeg(format: PixelFormat) -> format::Pixel {
    use format::Pixel;

    match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Bgra => Pixel::BGRA,
        PixelFormat::Rgb24 => Pixel::RGB24,
    }
}

/**
    Map an FFmpeg sample format to ours. Planar and packed variants map to
    the same value; the decoders interleave planar output.
*/
pub fn sample_format_from_ffmpeg(format: format::Sample) -> Option<SampleFormat> {
    use format::Sample;

    match format {
        Sample::U8(_) => Some(SampleFormat::U8),
        Sample::I16(_) => Some(SampleFormat::S16),
        Sample::I32(_) => Some(SampleFormat::S32),
        Sample::F32(_) => Some(SampleFormat::F32),
        Sample::F64(_) => Some(SampleFormat::F64),
        _ => None,
    }
}

pub fn sample_format_to_ffmpeg(format: SampleFormat, planar: bool) -> format::Sample {
    use format::Sample;
    use format::sample::Type;

    let layout = if planar { Type::Planar } else { Type::Packed };
    match format {
        SampleFormat::U8 => Sample::U8(layout),
        SampleFormat::S16 => Sample::I16(layout),
        SampleFormat::S32 => Sample::I32(layout),
        SampleFormat::F32 => Sample::F32(layout),
        SampleFormat::F64 => Sample::F64(layout),
    }
}

/**
    Channel layout for a channel count. Only mono and stereo are handled.
*/
pub fn channel_layout_for(channels: u16) -> Result<ffmpeg_next::ChannelLayout, Error> {
    match channels {
        1 => Ok(ffmpeg_next::ChannelLayout::MONO),
        2 => Ok(ffmpeg_next::ChannelLayout::STEREO),
        n => Err(Error::unsupported_format(format!("{n} audio channels"))),
    }
}

pub fn codec_id_from_ffmpeg(id: codec::Id) -> CodecId {
    use codec::Id;

    match id {
        Id::H264 => CodecId::H264,
        Id::HEVC => CodecId::H265,
        Id::VP9 => CodecId::Vp9,
        Id::AV1 => CodecId::Av1,
        Id::MPEG4 => CodecId::Mpeg4,
        Id::AAC => CodecId::Aac,
        Id::OPUS => CodecId::Opus,
        Id::MP3 => CodecId::Mp3,
        Id::FLAC => CodecId::Flac,
        Id::PCM_S16LE => CodecId::PcmS16Le,
        _ => CodecId::Unknown,
    }
}

pub fn codec_id_to_ffmpeg(id: CodecId) -> codec::Id {
    use codec::Id;

    match id {
        CodecId::H264 => Id::H264,
        CodecId::H265 => Id::HEVC,
        CodecId::Vp9 => Id::VP9,
        CodecId::Av1 => Id::AV1,
        CodecId::Mpeg4 => Id::MPEG4,
        CodecId::Aac => Id::AAC,
        CodecId::Opus => Id::OPUS,
        CodecId::Mp3 => Id::MP3,
        CodecId::Flac => Id::FLAC,
        CodecId::PcmS16Le => Id::PCM_S16LE,
        _ => Id::None,
    }
}

/**
    Build an FFmpeg packet carrying a copy of the sample's payload, timing
    and keyframe flag. Timestamps stay in the sample's time base.
*/
pub fn packet_from_sample(sample: &EncodedSample) -> ffmpeg_next::Packet {
    let mut packet = if sample.data.is_empty() {
        ffmpeg_next::Packet::empty()
    } else {
        ffmpeg_next::Packet::copy(&sample.data)
    };
    packet.set_pts(Some(sample.pts));
    packet.set_dts(Some(sample.dts));
    packet.set_duration(sample.duration);
    if sample.is_keyframe() {
        packet.set_flags(ffmpeg_next::packet::Flags::KEY);
    }
    packet
}

/**
    Map an error from opening a file, keeping "not found" as an I/O error.
*/
pub fn open_error(e: ffmpeg_next::Error) -> Error {
    match e {
        ffmpeg_next::Error::Other { errno } if errno == ffmpeg_next::ffi::ENOENT => Error::Io(
            std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        ),
        _ => Error::codec(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_ids_map_both_ways() {
        for id in [CodecId::H264, CodecId::Aac, CodecId::Opus, CodecId::Vp9] {
            assert_eq!(codec_id_from_ffmpeg(codec_id_to_ffmpeg(id)), id);
        }
        assert_eq!(codec_id_from_ffmpeg(codec::Id::THEORA), CodecId::Unknown);
    }

    #[test]
    fn planar_and_packed_map_to_the_same_format() {
        use format::sample::Type;

        assert_eq!(
            sample_format_from_ffmpeg(format::Sample::F32(Type::Planar)),
            Some(SampleFormat::F32)
        );
        assert_eq!(
            sample_format_from_ffmpeg(format::Sample::F32(Type::Packed)),
            Some(SampleFormat::F32)
        );
        assert_eq!(
            sample_format_to_ffmpeg(SampleFormat::S16, false),
            format::Sample::I16(Type::Packed)
        );
    }

    #[test]
    fn only_mono_and_stereo_layouts() {
        assert_eq!(channel_layout_for(1).unwrap(), ffmpeg_next::ChannelLayout::MONO);
        assert_eq!(channel_layout_for(2).unwrap(), ffmpeg_next::ChannelLayout::STEREO);
        assert!(matches!(channel_layout_for(6), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn full_range_yuv_is_treated_as_yuv420p() {
        assert_eq!(
            pixel_format_from_ffmpeg(format::Pixel::YUVJ420P),
            Some(PixelFormat::Yuv420p)
        );
        assert_eq!(pixel_format_from_ffmpeg(format::Pixel::GRAY8), None);
    }

    #[test]
    fn packet_carries_timing_and_keyframe() {
        let sample = EncodedSample {
            data: vec![0, 0, 0, 1, 0x65],
            pts: 3000,
            dts: 3000,
            duration: 1500,
            time_base: Rational::new(1, 90_000),
            flags: media_types::SampleFlags::KEYFRAME,
            kind: media_types::TrackKind::Video,
        };
        let packet = packet_from_sample(&sample);
        assert_eq!(packet.pts(), Some(3000));
        assert_eq!(packet.dts(), Some(3000));
        assert_eq!(packet.duration(), 1500);
        assert!(packet.is_key());
        assert_eq!(packet.data(), Some(&sample.data[..]));
    }

    #[test]
    fn missing_file_maps_to_io_error() {
        let err = open_error(ffmpeg_next::Error::Other {
            errno: ffmpeg_next::ffi::ENOENT,
        });
        assert!(matches!(err, Error::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound));
    }
}
