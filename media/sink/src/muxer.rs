/*!
    The muxer state machine.
*/

use std::path::{Path, PathBuf};

use ffmpeg_next::{Dictionary, format::context::Output as OutputContext};
use tracing::{debug, trace, warn};

use media_source::convert::{packet_from_sample, rational_from_ffmpeg, rational_to_ffmpeg};
use media_types::{EncodedSample, Error, Rational, Result, StreamDescriptor, TrackKind};

use crate::params;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MuxerState {
    Configured,
    Started,
    Finalized,
    Released,
}

/**
    Number of samples written to each track, by track index.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MuxStats {
    pub samples: Vec<u64>,
}

struct Track {
    stream_index: usize,
    kind: TrackKind,
    /// Stream time base chosen by the container once the header is written.
    time_base: Rational,
    last_dts: Option<i64>,
    written: u64,
}

/**
    Writes encoded samples into a container file.

    ```text
    Configured --add_track*--> Configured --start--> Started --write_sample*--> Started --finalize--> Finalized
    ```

    The container format follows the file extension. A muxer dropped while
    started is finalized on a best-effort basis.
*/
pub struct Muxer {
    output: Option<OutputContext>,
    path: PathBuf,
    state: MuxerState,
    tracks: Vec<Track>,
}

impl Muxer {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        media_source::init()?;

        let path = path.as_ref().to_path_buf();
        let output = ffmpeg_next::format::output(&path)
            .map_err(|e| Error::codec(format!("failed to create {}: {e}", path.display())))?;

        Ok(Self {
            output: Some(output),
            path,
            state: MuxerState::Configured,
            tracks: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> MuxerState {
        self.state
    }

    fn ensure(&self, operation: &'static str, expected: MuxerState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::invalid_state("muxer", operation, self.state))
        }
    }

    fn output(&mut self) -> Result<&mut OutputContext> {
        let state = self.state;
        self.output
            .as_mut()
            .ok_or_else(|| Error::invalid_state("muxer", "use", state))
    }

    /**
        Register a track and return its index. Only valid before [`start`](Self::start).
    */
    pub fn add_track(&mut self, descriptor: &StreamDescriptor) -> Result<usize> {
        self.ensure("add_track", MuxerState::Configured)?;

        let output = self.output()?;
        let mut stream = output
            .add_stream(ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::None))
            .map_err(|e| Error::codec(format!("failed to add stream: {e}")))?;
        params::apply(&mut stream, descriptor)?;
        stream.set_time_base(rational_to_ffmpeg(descriptor.time_base));
        let stream_index = stream.index();

        self.tracks.push(Track {
            stream_index,
            kind: descriptor.kind(),
            time_base: descriptor.time_base,
            last_dts: None,
            written: 0,
        });
        debug!(
            path = %self.path.display(),
            track = self.tracks.len() - 1,
            kind = ?descriptor.kind(),
            codec = ?descriptor.codec_id,
            "track added"
        );
        Ok(self.tracks.len() - 1)
    }

    /**
        Write the container header. Needs at least one track.
    */
    pub fn start(&mut self) -> Result<()> {
        self.ensure("start", MuxerState::Configured)?;
        if self.tracks.is_empty() {
            return Err(Error::invalid_state("muxer", "start", "Configured without tracks"));
        }

        let mut options = Dictionary::new();
        options.set("movflags", "+faststart");
        let output = self.output()?;
        output
            .write_header_with(options)
            .map_err(|e| Error::codec(format!("failed to write header: {e}")))?;

        let output = self.output.as_ref().ok_or_else(|| Error::codec("output closed"))?;
        let time_bases: Vec<Rational> = self
            .tracks
            .iter()
            .map(|track| {
                output
                    .stream(track.stream_index)
                    .map_or(track.time_base, |s| rational_from_ffmpeg(s.time_base()))
            })
            .collect();
        for (track, time_base) in self.tracks.iter_mut().zip(time_bases) {
            track.time_base = time_base;
        }

        self.state = MuxerState::Started;
        debug!(path = %self.path.display(), tracks = self.tracks.len(), "muxer started");
        Ok(())
    }

    /**
        Append one sample to a registered track. Only valid after
        [`start`](Self::start). Within a track, decode timestamps must not
        decrease. Codec configuration samples are skipped: their payload
        already travels in the track's extradata.
    */
    pub fn write_sample(&mut self, track: usize, sample: &EncodedSample) -> Result<()> {
        self.ensure("write_sample", MuxerState::Started)?;
        let count = self.tracks.len();
        let slot = self.tracks.get_mut(track).ok_or_else(|| {
            Error::invalid_data(format!("track {track} not registered ({count} tracks)"))
        })?;

        if sample.is_codec_config() {
            trace!(track, "skipping codec config sample");
            return Ok(());
        }
        if sample.kind != slot.kind {
            return Err(Error::invalid_data(format!(
                "{:?} sample written to {:?} track {track}",
                sample.kind, slot.kind
            )));
        }

        let mut packet = packet_from_sample(sample);
        packet.rescale_ts(rational_to_ffmpeg(sample.time_base), rational_to_ffmpeg(slot.time_base));
        let dts = packet.dts().unwrap_or_default();
        if let Some(last) = slot.last_dts
            && dts < last
        {
            return Err(Error::invalid_data(format!(
                "track {track}: timestamp {dts} goes back from {last}"
            )));
        }
        slot.last_dts = Some(dts);
        slot.written += 1;
        packet.set_stream(slot.stream_index);

        let output = self.output()?;
        packet
            .write_interleaved(output)
            .map_err(|e| Error::codec(format!("failed to write sample: {e}")))
    }

    /**
        Flush interleaving buffers and write the trailer. The file is
        complete and immutable afterwards.
    */
    pub fn finalize(&mut self) -> Result<MuxStats> {
        self.ensure("finalize", MuxerState::Started)?;
        self.output()?
            .write_trailer()
            .map_err(|e| Error::codec(format!("failed to write trailer: {e}")))?;
        self.state = MuxerState::Finalized;

        let stats = self.stats();
        debug!(path = %self.path.display(), samples = ?stats.samples, "muxer finalized");
        Ok(stats)
    }

    pub fn stats(&self) -> MuxStats {
        MuxStats {
            samples: self.tracks.iter().map(|t| t.written).collect(),
        }
    }

    /**
        Close the file. A started muxer is finalized first; a muxer that
        never started leaves an incomplete file behind. Idempotent.
    */
    pub fn release(&mut self) -> Result<()> {
        let result = match self.state {
            MuxerState::Started => self.finalize().map(drop),
            _ => Ok(()),
        };
        self.output = None;
        self.state = MuxerState::Released;
        result
    }
}

impl Drop for Muxer {
    fn drop(&mut self) {
        if self.state == MuxerState::Started
            && let Err(e) = self.release()
        {
            warn!(path = %self.path.display(), error = %e, "failed to finalize muxer on drop");
        }
    }
}

impl std::fmt::Debug for Muxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Muxer")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("tracks", &self.tracks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_types::{AudioParams, CodecId, MediaParams, SampleFlags};

    fn aac_track() -> StreamDescriptor {
        StreamDescriptor {
            codec_id: CodecId::Aac,
            time_base: Rational::new(1, 48_000),
            duration: None,
            bit_rate: Some(192_000),
            // AudioSpecificConfig: AAC-LC, 48 kHz, stereo
            extradata: Some(vec![0x11, 0x90]),
            media: MediaParams::Audio(AudioParams {
                sample_rate: 48_000,
                channels: 2,
                sample_format: None,
                priming: 0,
            }),
        }
    }

    fn sample(pts: i64) -> EncodedSample {
        EncodedSample {
            data: vec![0x21, 0x00, 0x49, 0x90, 0x02, 0x19, 0x00, 0x23, 0x80],
            pts,
            dts: pts,
            duration: 1024,
            time_base: Rational::new(1, 48_000),
            flags: SampleFlags::KEYFRAME,
            kind: TrackKind::Audio,
        }
    }

    fn muxer() -> (tempfile::TempDir, Muxer) {
        let dir = tempfile::tempdir().unwrap();
        let muxer = Muxer::create(dir.path().join("out.mp4")).unwrap();
        (dir, muxer)
    }

    #[test]
    fn write_before_start_is_invalid_state() {
        let (_dir, mut muxer) = muxer();
        let track = muxer.add_track(&aac_track()).unwrap();
        assert!(muxer.write_sample(track, &sample(0)).unwrap_err().is_invalid_state());
    }

    #[test]
    fn add_track_after_start_is_invalid_state() {
        let (_dir, mut muxer) = muxer();
        muxer.add_track(&aac_track()).unwrap();
        muxer.start().unwrap();
        assert!(muxer.add_track(&aac_track()).unwrap_err().is_invalid_state());
        muxer.release().unwrap();
    }

    #[test]
    fn start_without_tracks_is_invalid_state() {
        let (_dir, mut muxer) = muxer();
        assert!(muxer.start().unwrap_err().is_invalid_state());
    }

    #[test]
    fn counts_samples_and_skips_config() {
        let (dir, mut muxer) = muxer();
        let track = muxer.add_track(&aac_track()).unwrap();
        muxer.start().unwrap();

        let mut config = sample(0);
        config.flags = SampleFlags {
            codec_config: true,
            ..SampleFlags::default()
        };
        muxer.write_sample(track, &config).unwrap();
        for i in 0..5 {
            muxer.write_sample(track, &sample(i * 1024)).unwrap();
        }

        let stats = muxer.finalize().unwrap();
        assert_eq!(stats.samples, [5]);
        assert!(dir.path().join("out.mp4").metadata().unwrap().len() > 0);
        assert!(muxer.write_sample(track, &sample(9000)).unwrap_err().is_invalid_state());
    }

    #[test]
    fn decreasing_timestamps_are_rejected() {
        let (_dir, mut muxer) = muxer();
        let track = muxer.add_track(&aac_track()).unwrap();
        muxer.start().unwrap();
        muxer.write_sample(track, &sample(2048)).unwrap();
        assert!(matches!(
            muxer.write_sample(track, &sample(1024)),
            Err(Error::InvalidData(_))
        ));
        muxer.release().unwrap();
    }

    #[test]
    fn unknown_track_is_rejected() {
        let (_dir, mut muxer) = muxer();
        muxer.add_track(&aac_track()).unwrap();
        muxer.start().unwrap();
        assert!(muxer.write_sample(3, &sample(0)).is_err());
        muxer.release().unwrap();
        // release is idempotent and leaves nothing usable
        muxer.release().unwrap();
        assert!(muxer.start().unwrap_err().is_invalid_state());
    }
}
