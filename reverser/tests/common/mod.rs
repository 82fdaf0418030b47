#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use media_encode::{
    AudioEncoder, AudioEncoderConfig, EncoderPreset, VideoEncoder, VideoEncoderConfig,
};
use media_sink::Muxer;
use media_source::Extractor;
use media_types::{
    AudioFrame, Codec, EncodedSample, PixelFormat, Rational, SampleFormat, StreamDescriptor,
    TrackKind, VideoFrame,
};
use reverser::CancelFlag;
use reverser::pump::{Emitted, Pump};

const TIMEOUT: Duration = Duration::from_millis(10);

pub type Track = (StreamDescriptor, Vec<EncodedSample>);

fn collect(
    track: &mut Option<StreamDescriptor>,
    samples: &mut Vec<EncodedSample>,
) -> impl FnMut(Emitted<EncodedSample>) -> reverser::Result<()> {
    move |emitted| {
        match emitted {
            Emitted::Format(format) => *track = Some(format),
            Emitted::Sample(sample) if !sample.is_codec_config() => samples.push(sample),
            Emitted::Sample(_) => {}
        }
        Ok(())
    }
}

/**
    H.264 frames whose brightness rises with the frame index.
    `None` when this FFmpeg build has no H.264 encoder.
*/
pub fn encode_video(width: u32, height: u32, fps: i32, frames: u32) -> Option<Track> {
    let config = VideoEncoderConfig::h264(width, height, Rational::new(fps, 1))
        .with_bit_rate(2_000_000)
        .with_preset(EncoderPreset::Ultrafast);
    let mut encoder = match VideoEncoder::new(config) {
        Ok(encoder) => encoder,
        Err(e) => {
            eprintln!("skipping: no usable H.264 encoder ({e})");
            return None;
        }
    };
    encoder.start().unwrap();

    let mut format = None;
    let mut samples = Vec::new();
    {
        let cancel = CancelFlag::never();
        let mut sink = collect(&mut format, &mut samples);
        let mut pump = Pump::new(&mut encoder, TIMEOUT, &cancel);
        let luma_size = (width * height) as usize;
        let frame_size = PixelFormat::Yuv420p.frame_size(width, height);
        for i in 0..frames {
            let mut data = vec![128u8; frame_size];
            let luma = (16 + i * 200 / frames.max(1)) as u8;
            data[..luma_size].fill(luma);
            let frame = VideoFrame::new(
                width,
                height,
                PixelFormat::Yuv420p,
                data,
                Some(i as i64),
                Rational::new(1, fps),
            );
            pump.feed(&frame, &mut sink).unwrap();
        }
        pump.finish(&mut sink).unwrap();
    }
    encoder.release();
    Some((format.unwrap(), samples))
}

/// AAC of a 440 Hz tone, `samples` frames long.
pub fn encode_audio(sample_rate: u32, channels: u16, samples: usize) -> Track {
    let mut encoder = AudioEncoder::new(AudioEncoderConfig::aac(sample_rate, channels)).unwrap();
    encoder.start().unwrap();

    let mut format = None;
    let mut encoded = Vec::new();
    {
        let cancel = CancelFlag::never();
        let mut sink = collect(&mut format, &mut encoded);
        let mut pump = Pump::new(&mut encoder, TIMEOUT, &cancel);
        let chunk = 1000;
        let mut written = 0;
        while written < samples {
            let count = chunk.min(samples - written);
            let mut data = Vec::with_capacity(count * channels as usize * 4);
            for n in written..written + count {
                let t = n as f32 / sample_rate as f32;
                let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.25;
                for _ in 0..channels {
                    data.extend_from_slice(&value.to_ne_bytes());
                }
            }
            let frame = AudioFrame::new(
                data,
                count,
                sample_rate,
                channels,
                SampleFormat::F32,
                Some(written as i64),
                Rational::new(1, sample_rate as i32),
            );
            pump.feed(&frame, &mut sink).unwrap();
            written += count;
        }
        pump.finish(&mut sink).unwrap();
    }
    encoder.release();
    (format.unwrap(), encoded)
}

/// Mux tracks into one container, interleaved by decode time. Returns per-track counts.
pub fn write_container(path: &Path, tracks: &[Track]) -> Vec<u64> {
    let mut muxer = Muxer::create(path).unwrap();
    let indices: Vec<usize> = tracks
        .iter()
        .map(|(format, _)| muxer.add_track(format).unwrap())
        .collect();
    muxer.start().unwrap();

    let mut order: Vec<(i64, usize, &EncodedSample)> = tracks
        .iter()
        .enumerate()
        .flat_map(|(t, (_, samples))| samples.iter().map(move |s| (s.decode_micros(), t, s)))
        .collect();
    order.sort_by_key(|&(micros, t, _)| (micros, t));
    for (_, t, sample) in order {
        muxer.write_sample(indices[t], sample).unwrap();
    }
    muxer.finalize().unwrap().samples
}

/// A clip with one video and one audio track. `None` without an H.264 encoder.
pub fn make_clip(path: &Path, width: u32, height: u32, fps: i32, seconds: u32) -> Option<()> {
    let video = encode_video(width, height, fps, fps as u32 * seconds)?;
    let audio = encode_audio(44_100, 2, 44_100 * seconds as usize);
    write_container(path, &[video, audio]);
    Some(())
}

/// Presentation times of a file's samples of one kind, in microseconds, in file order.
pub fn sample_times(path: &Path, kind: TrackKind) -> Vec<i64> {
    let mut extractor = Extractor::open_track(path, kind).unwrap();
    let mut times = Vec::new();
    while let Some(sample) = extractor.read_sample().unwrap() {
        if sample.kind == kind {
            times.push(sample.presentation_micros());
        }
    }
    times
}
