/*!
    Encoders implementing [`media_types::Codec`].

    [`VideoEncoder`] turns YUV 4:2:0 frames into H.264, [`AudioEncoder`]
    turns interleaved PCM into AAC. Both are opened with global headers, so
    their codec configuration travels in the announced
    [`StreamDescriptor`](media_types::StreamDescriptor). It is also delivered
    once as a config-flagged sample right after the announcement, which
    muxers must skip.

    Output timestamps are expressed in the encoder's time base: microseconds
    for video, 1/sample rate for audio. Video starts at zero. Audio keeps the
    encoder's own clock, where the first input sample is at zero and the
    priming packet before it is negative; muxers turn that into an edit list.
*/

mod audio;
mod config;
mod video;

pub use audio::AudioEncoder;
pub use config::{AudioEncoderConfig, EncoderPreset, VideoEncoderConfig};
pub use video::VideoEncoder;

use ffmpeg_next::{codec::context::Context as CodecContext, ffi};
use media_types::{EncodedSample, Error, FeedStatus, Rational, Result, SampleFlags, TrackKind};

pub(crate) fn send_status(
    result: std::result::Result<(), ffmpeg_next::Error>,
) -> Result<FeedStatus> {
    match result {
        Ok(()) => Ok(FeedStatus::Accepted),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => Ok(FeedStatus::Busy),
        Err(e) => Err(Error::codec(format!("send_frame failed: {e}"))),
    }
}

/// False when the flush must be retried after draining output.
pub(crate) fn eof_sent(result: std::result::Result<(), ffmpeg_next::Error>) -> Result<bool> {
    match result {
        Ok(()) | Err(ffmpeg_next::Error::Eof) => Ok(true),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => Ok(false),
        Err(e) => Err(Error::codec(format!("send_eof failed: {e}"))),
    }
}

pub(crate) fn extradata(context: &CodecContext) -> Option<Vec<u8>> {
    // SAFETY: reading fields of a live codec context owned by `context`.
    unsafe {
        let ptr = context.as_ptr();
        if (*ptr).extradata_size > 0 && !(*ptr).extradata.is_null() {
            let size = (*ptr).extradata_size as usize;
            Some(std::slice::from_raw_parts((*ptr).extradata, size).to_vec())
        } else {
            None
        }
    }
}

pub(crate) fn initial_padding(context: &CodecContext) -> u32 {
    // SAFETY: reading a plain field of a live codec context.
    unsafe { (*context.as_ptr()).initial_padding.max(0) as u32 }
}

pub(crate) fn config_sample(data: Vec<u8>, time_base: Rational, kind: TrackKind) -> EncodedSample {
    EncodedSample {
        data,
        pts: 0,
        dts: 0,
        duration: 0,
        time_base,
        flags: SampleFlags {
            codec_config: true,
            ..SampleFlags::default()
        },
        kind,
    }
}

/**
    Maps encoder packets to samples, relative to an origin.

    The default timeline takes its origin from the first packet, so output
    starts at zero.
*/
#[derive(Debug, Default)]
pub(crate) struct Timeline {
    origin: Option<i64>,
}

impl Timeline {
    /// A timeline that leaves timestamps relative to a fixed origin.
    pub(crate) fn anchored(origin: i64) -> Self {
        Self {
            origin: Some(origin),
        }
    }

    pub(crate) fn sample(
        &mut self,
        packet: &ffmpeg_next::Packet,
        time_base: Rational,
        kind: TrackKind,
    ) -> EncodedSample {
        let pts = packet.pts().or(packet.dts()).unwrap_or(0);
        let dts = packet.dts().unwrap_or(pts);
        let origin = *self.origin.get_or_insert(dts.min(pts));
        EncodedSample {
            data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
            pts: pts - origin,
            dts: dts - origin,
            duration: packet.duration(),
            time_base,
            flags: SampleFlags {
                keyframe: packet.is_key(),
                ..SampleFlags::default()
            },
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(pts: i64) -> ffmpeg_next::Packet {
        let mut packet = ffmpeg_next::Packet::copy(&[1, 2, 3]);
        packet.set_pts(Some(pts));
        packet.set_dts(Some(pts));
        packet
    }

    #[test]
    fn timeline_starts_at_zero() {
        let tb = Rational::new(1, 44_100);
        let mut timeline = Timeline::default();
        let first = timeline.sample(&packet(-1024), tb, TrackKind::Audio);
        let second = timeline.sample(&packet(0), tb, TrackKind::Audio);
        assert_eq!(first.pts, 0);
        assert_eq!(second.pts, 1024);
        assert_eq!(second.data, [1, 2, 3]);
    }

    #[test]
    fn anchored_timeline_keeps_priming_negative() {
        let tb = Rational::new(1, 44_100);
        let mut timeline = Timeline::anchored(0);
        let priming = timeline.sample(&packet(-1024), tb, TrackKind::Audio);
        let first = timeline.sample(&packet(0), tb, TrackKind::Audio);
        assert_eq!(priming.pts, -1024);
        assert_eq!(first.pts, 0);
    }

    #[test]
    fn config_sample_is_flagged() {
        let sample = config_sample(vec![0x12, 0x10], Rational::new(1, 48_000), TrackKind::Audio);
        assert!(sample.is_codec_config());
        assert!(!sample.is_keyframe());
    }
}
