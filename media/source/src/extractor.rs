/*!
    Sample extraction from a container.
*/

use std::path::{Path, PathBuf};

use ffmpeg_next::{format::context::Input as InputContext, media::Type};
use tracing::debug;

use media_types::{EncodedSample, Error, Rational, Result, SampleFlags, StreamDescriptor, TrackKind};

use crate::codec_config::CodecConfig;
use crate::convert::{open_error, rational_from_ffmpeg};
use crate::probe::{MediaInfo, describe_stream, extract_media_info};

struct SelectedTrack {
    stream_index: usize,
    kind: TrackKind,
    time_base: Rational,
    descriptor: StreamDescriptor,
    codec_config: CodecConfig,
}

/**
    Reads the compressed samples of one track in container order.

    The track is the container's "best" stream of the requested kind.
*/
pub struct Extractor {
    input: InputContext,
    path: PathBuf,
    media_info: MediaInfo,
    track: SelectedTrack,
}

impl Extractor {
    /**
        Open a file and select its track of the given kind; fails with a
        configuration error if there is none.
    */
    pub fn open_track<P: AsRef<Path>>(path: P, kind: TrackKind) -> Result<Self> {
        crate::init()?;

        let path = path.as_ref().to_path_buf();
        let input = ffmpeg_next::format::input(&path).map_err(open_error)?;
        let media_info = extract_media_info(&input);

        let medium = match kind {
            TrackKind::Video => Type::Video,
            TrackKind::Audio => Type::Audio,
        };
        let track = input
            .streams()
            .best(medium)
            .and_then(|stream| {
                let descriptor = describe_stream(&stream, media_info.duration)?;
                let time_base = rational_from_ffmpeg(stream.time_base());
                Some(SelectedTrack {
                    stream_index: stream.index(),
                    kind,
                    time_base,
                    codec_config: CodecConfig::new(stream.parameters(), time_base, kind),
                    descriptor,
                })
            })
            .ok_or_else(|| {
                Error::configuration(format!("{} has no {kind:?} track", path.display()))
            })?;

        debug!(
            path = %path.display(),
            ?kind,
            stream = track.stream_index,
            duration = ?media_info.duration,
            "opened container"
        );

        Ok(Self {
            input,
            path,
            media_info,
            track,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn media_info(&self) -> &MediaInfo {
        &self.media_info
    }

    /// Descriptor of the selected track.
    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.track.descriptor
    }

    pub fn codec_config(&self) -> &CodecConfig {
        &self.track.codec_config
    }

    /**
        Read the next sample of the selected track.

        Returns `Ok(None)` once the container is exhausted. Samples of
        other streams are skipped.
    */
    pub fn read_sample(&mut self) -> Result<Option<EncodedSample>> {
        loop {
            let Some((stream, packet)) = self.input.packets().next() else {
                return Ok(None);
            };
            let track = &self.track;
            if stream.index() != track.stream_index {
                continue;
            }

            let pts = packet.pts().or(packet.dts()).unwrap_or(0);
            let dts = packet.dts().unwrap_or(pts);
            return Ok(Some(EncodedSample {
                data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
                pts,
                dts,
                duration: packet.duration(),
                time_base: track.time_base,
                flags: SampleFlags {
                    keyframe: packet.is_key(),
                    ..SampleFlags::default()
                },
                kind: track.kind,
            }));
        }
    }

    /**
        Seek to the last keyframe at or before `micros`.

        Decoders fed from this extractor must be reset afterwards.
    */
    pub fn seek_to(&mut self, micros: i64) -> Result<()> {
        // AV_TIME_BASE is microseconds
        let timestamp = micros.max(0);
        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|e| Error::codec(format!("seek to {micros}us failed: {e}")))
    }
}
