/*!
    The audio branch: decode, reverse, re-encode.
*/

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, info_span};

use media_decode::AudioDecoder;
use media_encode::{AudioEncoder, AudioEncoderConfig};
use media_source::Extractor;
use media_types::{
    AudioFrame, AudioParams, Codec, EncodedSample, Error as MediaError, Rational, TrackKind,
};

use crate::pcm::{self, PcmLayout};
use crate::pump::{Emitted, Pump};
use crate::track::{SampleSink, TrackWriter};
use crate::{CancelFlag, Result};

/// Samples per channel read back from the reversed PCM per encoder input.
const ENCODE_CHUNK: usize = 4096;

/**
    Settings of one audio branch run.
*/
#[derive(Clone, Debug)]
pub struct AudioJob<'a> {
    pub input: &'a Path,
    pub raw_pcm: &'a Path,
    pub reversed_pcm: &'a Path,
    pub output: &'a Path,
    /// Audio track duration, used only when the decoder reports no sample format.
    pub duration: Duration,
    pub bit_rate: u64,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioReport {
    pub layout: PcmLayout,
    /// Length of the decoded source PCM, equal to the reversed PCM.
    pub pcm_bytes: u64,
    pub samples_written: u64,
}

/**
    Produce a single-track container holding the source audio reversed.
*/
pub fn reverse_audio(job: &AudioJob<'_>, cancel: &CancelFlag) -> Result<AudioReport> {
    let _span = info_span!("audio").entered();
    info!(input = %job.input.display(), "reversing audio");

    let (params, pcm_bytes) = decode_to_pcm(job.input, job.raw_pcm, job.timeout, cancel)?;
    let layout = PcmLayout::resolve(&params, pcm_bytes, job.duration)?;
    debug!(?layout, pcm_bytes, "source audio decoded");

    let reversed = pcm::reverse_file(job.raw_pcm, job.reversed_pcm, layout.frame_size(), cancel)?;
    if reversed != pcm_bytes {
        return Err(MediaError::invalid_data(format!(
            "reversed {reversed} pcm bytes, decoded {pcm_bytes}"
        ))
        .into());
    }

    let samples_written = encode_pcm(
        job.reversed_pcm,
        layout,
        job.output,
        job.bit_rate,
        job.timeout,
        cancel,
    )?;

    info!(samples = samples_written, "audio reversed");
    Ok(AudioReport {
        layout,
        pcm_bytes,
        samples_written,
    })
}

/**
    Decode the audio track of `input` into a raw interleaved PCM file.
    Returns the format the decoder announced and the number of bytes written.
*/
pub fn decode_to_pcm(
    input: &Path,
    output: &Path,
    timeout: Duration,
    cancel: &CancelFlag,
) -> Result<(AudioParams, u64)> {
    let mut extractor = Extractor::open_track(input, TrackKind::Audio)?;
    let mut decoder = AudioDecoder::new(extractor.codec_config())?;
    let mut writer = BufWriter::new(File::create(output)?);

    let result = (|| -> Result<(AudioParams, u64)> {
        decoder.start()?;
        let mut params: Option<AudioParams> = None;
        let mut written = 0u64;
        let mut sink = |emitted: Emitted<AudioFrame>| -> Result<()> {
            match emitted {
                Emitted::Format(descriptor) => {
                    params = descriptor.audio().cloned();
                    debug!(format = ?params, "decoder output format");
                }
                Emitted::Sample(frame) => {
                    let announced = params.as_ref().ok_or_else(|| {
                        MediaError::invalid_data("decoded audio before its format")
                    })?;
                    if frame.channels != announced.channels
                        || frame.sample_rate != announced.sample_rate
                        || Some(frame.format) != announced.sample_format
                    {
                        return Err(MediaError::unsupported_format(format!(
                            "audio format changed mid-stream to {} Hz x{} {:?}",
                            frame.sample_rate, frame.channels, frame.format
                        ))
                        .into());
                    }
                    writer.write_all(&frame.data)?;
                    written += frame.data.len() as u64;
                }
            }
            Ok(())
        };

        let mut pump = Pump::new(&mut decoder, timeout, cancel);
        while let Some(sample) = extractor.read_sample()? {
            pump.feed(&sample, &mut sink)?;
        }
        pump.finish(&mut sink)?;
        drop(sink);

        let params =
            params.ok_or_else(|| MediaError::invalid_data("audio decoder produced nothing"))?;
        Ok((params, written))
    })();

    decoder.release();
    let flushed = writer.flush();
    let decoded = result?;
    flushed?;
    Ok(decoded)
}

/**
    Encode a raw PCM file to AAC in its own container. Returns the number
    of samples written.
*/
pub fn encode_pcm(
    input: &Path,
    layout: PcmLayout,
    output: &Path,
    bit_rate: u64,
    timeout: Duration,
    cancel: &CancelFlag,
) -> Result<u64> {
    let mut encoder = AudioEncoder::new(
        AudioEncoderConfig::aac(layout.sample_rate, layout.channels).with_bit_rate(bit_rate),
    )?;
    let mut writer = TrackWriter::create(output)?;
    let mut reader = BufReader::new(File::open(input)?);

    let result = (|| -> Result<()> {
        encoder.start()?;
        let mut sink = |emitted: Emitted<EncodedSample>| match emitted {
            Emitted::Format(descriptor) => writer.register(&descriptor),
            Emitted::Sample(sample) => writer.write(&sample),
        };

        let frame_size = layout.frame_size();
        let time_base = Rational::new(1, layout.sample_rate as i32);
        let mut chunk = vec![0u8; ENCODE_CHUNK * frame_size];
        let mut position = 0i64;
        let mut pump = Pump::new(&mut encoder, timeout, cancel);
        loop {
            let filled = read_frames(&mut reader, &mut chunk, frame_size)?;
            if filled == 0 {
                break;
            }
            let samples = filled / frame_size;
            let frame = AudioFrame::new(
                chunk[..filled].to_vec(),
                samples,
                layout.sample_rate,
                layout.channels,
                layout.format,
                Some(position),
                time_base,
            );
            pump.feed(&frame, &mut sink)?;
            position += samples as i64;
        }
        pump.finish(&mut sink)
    })();

    encoder.release();
    let closed = writer.close();
    result?;
    closed
}

/// Fill `buf` with whole frames; returns the byte count, zero at end of file.
fn read_frames(reader: &mut impl Read, buf: &mut [u8], frame_size: usize) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled % frame_size != 0 {
        return Err(crate::Error::PartialFrame {
            len: filled as u64,
            frame_size,
        });
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_frames_stops_at_end_of_input() {
        let data: Vec<u8> = (0..10).collect();
        let mut reader = &data[..];
        let mut buf = [0u8; 8];
        assert_eq!(read_frames(&mut reader, &mut buf, 2).unwrap(), 8);
        assert_eq!(read_frames(&mut reader, &mut buf, 2).unwrap(), 2);
        assert_eq!(&buf[..2], &[8, 9]);
        assert_eq!(read_frames(&mut reader, &mut buf, 2).unwrap(), 0);
    }

    #[test]
    fn read_frames_rejects_partial_tail() {
        let data = [0u8; 7];
        let mut reader = &data[..];
        let mut buf = [0u8; 16];
        assert!(matches!(
            read_frames(&mut reader, &mut buf, 4),
            Err(crate::Error::PartialFrame { len: 7, .. })
        ));
    }
}
