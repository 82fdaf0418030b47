/*!
    Single-track output of one encoder.
*/

use std::path::Path;

use tracing::debug;

use media_sink::{Muxer, MuxerState};
use media_types::{EncodedSample, StreamDescriptor};

use crate::Result;

/**
    Destination for the output of one encoder.
*/
pub trait SampleSink {
    /// Called once, with the encoder's announced output format.
    fn register(&mut self, format: &StreamDescriptor) -> Result<()>;

    fn write(&mut self, sample: &EncodedSample) -> Result<()>;

    /// Finish the output and return how many samples it holds.
    fn close(&mut self) -> Result<u64>;
}

/**
    Writes one encoder's samples into its own container.

    The track is added and the muxer started when the encoder announces its
    format, since only then is the codec configuration known. Codec
    configuration samples are dropped; their payload travels in the track
    format.
*/
#[derive(Debug)]
pub struct TrackWriter {
    muxer: Muxer,
    track: Option<usize>,
    written: u64,
}

impl TrackWriter {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            muxer: Muxer::create(path)?,
            track: None,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl SampleSink for TrackWriter {
    fn register(&mut self, format: &StreamDescriptor) -> Result<()> {
        if self.track.is_some() {
            return Err(media_types::Error::invalid_state(
                "track writer",
                "register",
                "Registered",
            )
            .into());
        }
        let track = self.muxer.add_track(format)?;
        self.muxer.start()?;
        self.track = Some(track);
        debug!(
            path = %self.muxer.path().display(),
            codec = ?format.codec_id,
            "output track registered"
        );
        Ok(())
    }

    fn write(&mut self, sample: &EncodedSample) -> Result<()> {
        if sample.is_codec_config() {
            return Ok(());
        }
        let track = self.track.ok_or_else(|| {
            media_types::Error::invalid_state("track writer", "write", "Unregistered")
        })?;
        self.muxer.write_sample(track, sample)?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<u64> {
        if self.muxer.state() == MuxerState::Started {
            self.muxer.finalize()?;
        }
        self.muxer.release()?;
        Ok(self.written)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// Keeps samples in memory.
    #[derive(Debug, Default)]
    pub struct MemorySink {
        pub format: Option<StreamDescriptor>,
        pub samples: Vec<EncodedSample>,
        pub closed: bool,
    }

    impl SampleSink for MemorySink {
        fn register(&mut self, format: &StreamDescriptor) -> Result<()> {
            assert!(self.format.is_none(), "registered twice");
            self.format = Some(format.clone());
            Ok(())
        }

        fn write(&mut self, sample: &EncodedSample) -> Result<()> {
            assert!(self.format.is_some(), "sample before format");
            if !sample.is_codec_config() {
                self.samples.push(sample.clone());
            }
            Ok(())
        }

        fn close(&mut self) -> Result<u64> {
            self.closed = true;
            Ok(self.samples.len() as u64)
        }
    }
}
