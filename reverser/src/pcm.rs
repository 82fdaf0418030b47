/*!
    PCM frame reversal.

    A PCM frame is one sample for every channel. Reversal moves whole frames
    and never splits one, so playing the output forwards plays the input
    backwards.
*/

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use media_types::{AudioParams, SampleFormat};

use crate::{CancelFlag, Error, Result};

/// Frames read from the tail of the input per block.
const FRAMES_PER_BLOCK: usize = 16 * 1024;

/**
    Shape of an interleaved PCM stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmLayout {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

impl PcmLayout {
    /// Bytes per frame: bit depth in bytes times channel count.
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /**
        Layout of decoder output. The format the decoder reports wins; when
        it reports none, the bit depth is inferred from the byte count.
    */
    pub fn resolve(params: &AudioParams, total_bytes: u64, duration: Duration) -> Result<Self> {
        match params.sample_format {
            Some(format) => Ok(Self {
                sample_rate: params.sample_rate,
                channels: params.channels,
                format,
            }),
            None => {
                warn!("decoder did not report a sample format, inferring bit depth");
                Self::infer(total_bytes, duration, params.sample_rate, params.channels)
            }
        }
    }

    /**
        Infer the bit depth from how many bytes a known duration occupies,
        `bytes / seconds / sample_rate / channels`, taking the nearest of
        1, 2, 4 and 8 bytes. Decoded audio usually runs a little short of
        the declared duration, so the quotient is rarely a whole number.
    */
    pub fn infer(
        total_bytes: u64,
        duration: Duration,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        let seconds = duration.as_secs_f64();
        if seconds <= 0.0 || sample_rate == 0 || channels == 0 {
            return Err(media_types::Error::configuration(
                "cannot infer pcm bit depth without duration, sample rate and channels",
            )
            .into());
        }
        let bytes = total_bytes as f64 / seconds / sample_rate as f64 / channels as f64;
        let format = match bytes {
            b if (0.5..1.5).contains(&b) => SampleFormat::U8,
            b if (1.5..3.0).contains(&b) => SampleFormat::S16,
            // 32-bit decoder output is float far more often than integer
            b if (3.0..6.0).contains(&b) => SampleFormat::F32,
            b if (6.0..12.0).contains(&b) => SampleFormat::F64,
            other => {
                return Err(media_types::Error::configuration(format!(
                    "inferred pcm bit depth of {other:.2} bytes is not usable"
                ))
                .into());
            }
        };
        debug!(?format, "inferred pcm sample format");
        Ok(Self {
            sample_rate,
            channels,
            format,
        })
    }
}

fn check_aligned(len: u64, frame_size: usize) -> Result<()> {
    if frame_size == 0 || len % frame_size as u64 != 0 {
        return Err(Error::PartialFrame { len, frame_size });
    }
    Ok(())
}

/**
    Reverse the frame order of an in-memory PCM buffer.
*/
pub fn reverse_bytes(data: &[u8], frame_size: usize) -> Result<Vec<u8>> {
    check_aligned(data.len() as u64, frame_size)?;
    let mut reversed = Vec::with_capacity(data.len());
    for frame in data.chunks_exact(frame_size).rev() {
        reversed.extend_from_slice(frame);
    }
    Ok(reversed)
}

/**
    Write the frames of `input` to `output` in reverse order, reading from
    the tail towards the head. Returns the number of bytes written, which
    always equals the input length. `cancel` is checked once per block.
*/
pub fn reverse_file(
    input: &Path,
    output: &Path,
    frame_size: usize,
    cancel: &CancelFlag,
) -> Result<u64> {
    let mut reader = File::open(input)?;
    let len = reader.metadata()?.len();
    check_aligned(len, frame_size)?;

    let mut writer = BufWriter::new(File::create(output)?);
    let block_size = (FRAMES_PER_BLOCK * frame_size) as u64;
    let mut block = Vec::new();
    let mut cursor = len;

    while cursor > 0 {
        cancel.check()?;
        let size = block_size.min(cursor);
        cursor -= size;
        reader.seek(SeekFrom::Start(cursor))?;
        block.resize(size as usize, 0);
        reader.read_exact(&mut block)?;
        for frame in block.chunks_exact(frame_size).rev() {
            writer.write_all(frame)?;
        }
    }
    writer.flush()?;

    debug!(bytes = len, frame_size, "pcm reversed");
    Ok(len)
}
