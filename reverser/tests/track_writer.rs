mod common;

use media_types::TrackKind;
use reverser::Error;
use reverser::track::{SampleSink, TrackWriter};

#[test]
fn writes_an_encoded_track_to_its_own_container() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audio.mp4");
    let (format, samples) = common::encode_audio(44_100, 2, 44_100);

    let mut writer = TrackWriter::create(&path).unwrap();
    writer.register(&format).unwrap();
    for sample in &samples {
        writer.write(sample).unwrap();
    }
    assert_eq!(writer.close().unwrap(), samples.len() as u64);

    let times = common::sample_times(&path, TrackKind::Audio);
    assert_eq!(times.len(), samples.len());
    assert!(times.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn out_of_order_use_is_an_invalid_state() {
    let dir = tempfile::tempdir().unwrap();
    let (format, samples) = common::encode_audio(44_100, 1, 4_096);

    let mut writer = TrackWriter::create(&dir.path().join("early.mp4")).unwrap();
    let err: Error = writer.write(&samples[0]).unwrap_err();
    assert!(err.is_invalid_state(), "{err}");

    writer.register(&format).unwrap();
    let err = writer.register(&format).unwrap_err();
    assert!(err.is_invalid_state(), "{err}");

    // through a branch wrapper the classification still holds
    let wrapped = Error::branch(reverser::Branch::Audio, err);
    assert!(wrapped.is_invalid_state());
    assert!(!wrapped.is_configuration());
}

#[test]
fn decreasing_timestamps_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (format, samples) = common::encode_audio(44_100, 1, 8_192);

    let mut writer = TrackWriter::create(&dir.path().join("order.mp4")).unwrap();
    writer.register(&format).unwrap();
    writer.write(&samples[2]).unwrap();
    assert!(writer.write(&samples[1]).is_err());
    writer.close().unwrap();
}

#[test]
fn muxed_audio_decodes_to_exactly_the_samples_encoded() {
    let dir = tempfile::tempdir().unwrap();
    // not a multiple of the AAC frame size
    for (samples, name) in [(10_000, "short.mp4"), (48_000 + 1, "long.mp4")] {
        let path = dir.path().join(name);
        let (format, encoded) = common::encode_audio(48_000, 1, samples);
        assert!(format.audio().unwrap().priming > 0);
        assert!(encoded[0].pts < 0);
        common::write_container(&path, &[(format, encoded)]);

        let (params, bytes) = reverser::audio::decode_to_pcm(
            &path,
            &dir.path().join("decoded.pcm"),
            std::time::Duration::from_millis(10),
            &reverser::CancelFlag::never(),
        )
        .unwrap();
        let frame_size = params.frame_size().unwrap() as u64;
        assert_eq!(bytes, samples as u64 * frame_size, "{name}");
    }
}
